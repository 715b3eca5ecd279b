use data_loader::RatingIndex;
use std::path::PathBuf;
use std::time::Instant;

fn main() {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data/ml-latest-small/ratings.csv"));

    println!("Loading ratings from {}...\n", path.display());

    let start = Instant::now();
    let index = RatingIndex::load_from_file(&path).expect("Failed to load ratings");
    let elapsed = start.elapsed();

    let (users, movies, ratings) = index.counts();
    let top = index.most_rated(5);

    println!("\n=== Load Complete ===");
    println!("Time taken: {:?}", elapsed);
    println!("Users: {}", users);
    println!("Movies: {}", movies);
    println!("Ratings: {}", ratings);
    println!("Most rated: {:?}", top);
    println!(
        "\nPerformance: {:.0} ratings/second",
        ratings as f64 / elapsed.as_secs_f64()
    );
}
