use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use data_loader::{MovieId, RatingIndex, RatingStore, UserId};
use model::{Trainer, TrainerConfig};
use server::{EngineStatus, Provenance, Recommendation, RecommenderService};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::info;

/// ReelRecs - Movie Recommendation Engine
#[derive(Parser)]
#[command(name = "reel-recs")]
#[command(about = "Movie recommendations from a matrix-factorization model", long_about = None)]
struct Cli {
    /// MovieLens ratings file (ratings.dat or ratings.csv)
    #[arg(
        short,
        long,
        env = "REEL_RECS_RATINGS",
        default_value = "data/ml-latest-small/ratings.csv"
    )]
    ratings: PathBuf,

    /// Model artifact to write (train) or serve from (everything else)
    #[arg(
        short,
        long,
        env = "REEL_RECS_ARTIFACT",
        default_value = "models/artifact.json"
    )]
    artifact: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the model and publish the artifact
    Train {
        /// Embedding rank
        #[arg(long, default_value = "20")]
        rank: usize,

        /// Fraction of ratings held out for evaluation (0 disables it)
        #[arg(long, default_value = "0.2")]
        test_ratio: f64,

        /// Seed for the split and the decomposition
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Power iterations of the randomized SVD
        #[arg(long, default_value = "5")]
        power_iterations: usize,

        /// Extra sketch columns of the randomized SVD
        #[arg(long, default_value = "10")]
        oversampling: usize,
    },

    /// Get movie recommendations for a user
    Recommend {
        /// User ID to get recommendations for
        #[arg(long)]
        user_id: UserId,

        /// Number of recommendations to return
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Find movies similar to a movie
    Similar {
        #[arg(long)]
        movie_id: MovieId,

        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Show the most-rated movies
    Popular {
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Run benchmark to test performance
    Benchmark {
        /// Number of requests to make
        #[arg(long, default_value = "1000")]
        requests: usize,

        /// Number of concurrent requests
        #[arg(long, default_value = "10")]
        concurrent: usize,

        /// Recommendations per request
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    println!("Loading ratings from {}...", cli.ratings.display());
    let start = Instant::now();
    let path = cli.ratings.clone();
    let index = tokio::task::spawn_blocking(move || RatingIndex::load_from_file(&path))
        .await
        .context("Loader task panicked")?
        .context("Failed to load ratings")?;
    let (users, movies, ratings) = index.counts();
    println!(
        "{} Loaded {} ratings ({} users, {} movies) in {:?}",
        "✓".green(),
        ratings,
        users,
        movies,
        start.elapsed()
    );
    let store = Arc::new(index);

    match cli.command {
        Commands::Train {
            rank,
            test_ratio,
            seed,
            power_iterations,
            oversampling,
        } => {
            let config = TrainerConfig::default()
                .with_rank(rank)
                .with_test_ratio(test_ratio)
                .with_seed(seed)
                .with_power_iterations(power_iterations)
                .with_oversampling(oversampling);
            handle_train(store, cli.artifact, config).await?
        }
        Commands::Recommend { user_id, limit } => {
            let service = open_service(store, cli.artifact);
            handle_recommend(&service, user_id, limit)?
        }
        Commands::Similar { movie_id, limit } => {
            let service = open_service(store, cli.artifact);
            handle_similar(&service, movie_id, limit)?
        }
        Commands::Popular { limit } => {
            let service = open_service(store, cli.artifact);
            handle_popular(&service, limit)?
        }
        Commands::Benchmark {
            requests,
            concurrent,
            limit,
        } => {
            let users: Vec<UserId> = store.user_ids();
            let service = open_service(store, cli.artifact);
            handle_benchmark(service, users, requests, concurrent, limit).await?
        }
    }

    Ok(())
}

fn open_service(store: Arc<RatingIndex>, artifact: PathBuf) -> RecommenderService {
    let store: Arc<dyn RatingStore> = store;
    let service = RecommenderService::open(store, artifact);
    match service.status() {
        EngineStatus::Loaded => println!(
            "{} Model loaded from {}",
            "✓".green(),
            service.artifact_path().display()
        ),
        status => println!(
            "{} Model {}: {}; serving popular movies",
            "!".yellow(),
            status,
            service.degraded_reason().unwrap_or_default()
        ),
    }
    service
}

/// Handle the 'train' command
async fn handle_train(store: Arc<RatingIndex>, artifact: PathBuf, config: TrainerConfig) -> Result<()> {
    info!("Training with {:?}", config);
    let start = Instant::now();
    let target = artifact.clone();
    let outcome = tokio::task::spawn_blocking(move || Trainer::new(config).train(store.as_ref(), &target))
        .await
        .context("Training task panicked")?
        .context("Training failed")?;

    if let Some(report) = &outcome.evaluation {
        println!("{}", "Holdout evaluation:".bold().blue());
        println!("{report}");
        if let Some(delta) = report.mae_improvement() {
            println!("Improvement over baseline MAE: {:.4}", delta);
        }
    }
    println!(
        "{} Published rank-{} model ({} users, {} movies) to {} in {:?}",
        "✓".green(),
        outcome.artifact.rank,
        outcome.artifact.user_ids.len(),
        outcome.artifact.movie_ids.len(),
        artifact.display(),
        start.elapsed()
    );
    Ok(())
}

/// Handle the 'recommend' command
fn handle_recommend(service: &RecommenderService, user_id: UserId, limit: usize) -> Result<()> {
    let recommendations = service
        .recommend(user_id, limit)
        .with_context(|| format!("Failed to recommend for user {}", user_id))?;
    print_recommendations(user_id, &recommendations);
    Ok(())
}

/// Handle the 'similar' command
fn handle_similar(service: &RecommenderService, movie_id: MovieId, limit: usize) -> Result<()> {
    let similar = service.similar(movie_id, limit)?;
    if similar.is_empty() {
        println!("No similar movies for movie {}", movie_id);
        return Ok(());
    }
    println!("{}", format!("Movies similar to {}:", movie_id).bold().blue());
    for (i, movie) in similar.iter().enumerate() {
        println!(
            "{}. movie {} - similarity {:.3}",
            (i + 1).to_string().green(),
            movie.movie_id,
            movie.score
        );
    }
    Ok(())
}

/// Handle the 'popular' command
fn handle_popular(service: &RecommenderService, limit: usize) -> Result<()> {
    let popular = service.popular(limit)?;
    println!("{}", "Most rated movies:".bold().blue());
    for (i, movie) in popular.iter().enumerate() {
        println!(
            "{}. movie {} - {} ratings",
            (i + 1).to_string().green(),
            movie.movie_id,
            movie.count
        );
    }
    Ok(())
}

/// Handle the 'benchmark' command
async fn handle_benchmark(
    service: RecommenderService,
    users: Vec<UserId>,
    requests: usize,
    concurrent: usize,
    limit: usize,
) -> Result<()> {
    if requests == 0 || concurrent == 0 {
        bail!("requests and concurrent must both be at least 1");
    }
    if users.is_empty() {
        bail!("no users in the ratings file to benchmark with");
    }

    let user_ids: Vec<UserId> = (0..requests)
        .map(|_| users[rand::random_range(0..users.len())])
        .collect();

    let permits = Arc::new(Semaphore::new(concurrent));
    let wall = Instant::now();
    let mut handles = Vec::with_capacity(requests);
    for user in user_ids {
        let service = service.clone();
        let permit = Arc::clone(&permits)
            .acquire_owned()
            .await
            .context("Semaphore closed")?;
        handles.push(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let start = Instant::now();
            service.recommend(user, limit)?;
            Ok::<_, anyhow::Error>(start.elapsed())
        }));
    }

    let mut timings: Vec<Duration> = Vec::with_capacity(requests);
    for handle in handles {
        timings.push(handle.await??);
    }
    let total_time = wall.elapsed();

    timings.sort();
    let sum: Duration = timings.iter().sum();
    let avg_latency = sum / timings.len() as u32;
    let p50 = timings[timings.len() / 2];
    let p95 = timings[(timings.len() as f64 * 0.95) as usize];
    let p99 = timings[(timings.len() as f64 * 0.99) as usize];
    let throughput = requests as f64 / total_time.as_secs_f64();

    println!("{}", "Benchmark results:".bold().blue());
    println!("Model status: {}", service.status());
    println!("Total time: {:?}", total_time);
    println!("Average latency: {:?}", avg_latency);
    println!("P50 latency: {:?}", p50);
    println!("P95 latency: {:?}", p95);
    println!("P99 latency: {:?}", p99);
    println!("Throughput: {:.2} requests/second", throughput);

    Ok(())
}

fn print_recommendations(user_id: UserId, recommendations: &[Recommendation]) {
    println!(
        "{}",
        format!("Recommendations for user {}:", user_id).bold().blue()
    );
    for (i, rec) in recommendations.iter().enumerate() {
        let rank = (i + 1).to_string().green();
        match (rec.provenance, rec.predicted_rating) {
            (Provenance::Personalized, Some(rating)) => println!(
                "{}. movie {} - predicted {:.2} [{}]",
                rank, rec.movie_id, rating, rec.provenance
            ),
            _ => println!(
                "{}. movie {} [{}]",
                rank,
                rec.movie_id,
                rec.provenance.to_string().yellow()
            ),
        }
    }
}
