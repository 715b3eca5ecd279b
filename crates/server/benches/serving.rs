//! Benchmarks for request serving
//!
//! Run with: cargo bench --package server
//!
//! Trains a small synthetic model once, then measures the per-request
//! cost of each query against it.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use data_loader::{RatingIndex, RatingRecord, RatingStore};
use model::{Trainer, TrainerConfig};
use server::RecommenderService;
use std::sync::Arc;
use tempfile::TempDir;

fn synthetic_ratings(users: u32, movies: u32) -> Vec<RatingRecord> {
    let mut out = Vec::new();
    for user in 1..=users {
        for movie in 1..=movies {
            if (user * 13 + movie * 7) % 5 == 0 {
                let rating = 0.5 + ((user + movie * 3) % 10) as f32 * 0.5;
                out.push(RatingRecord::new(user, movie, rating, 0));
            }
        }
    }
    out
}

fn setup() -> (TempDir, RecommenderService) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("artifact.json");
    let store = Arc::new(RatingIndex::from_records(synthetic_ratings(500, 2000)));
    Trainer::new(TrainerConfig::default().with_test_ratio(0.0))
        .train(store.as_ref(), &path)
        .expect("Failed to train benchmark model");
    let store: Arc<dyn RatingStore> = store;
    (dir, RecommenderService::open(store, path))
}

fn bench_recommend(c: &mut Criterion) {
    let (_dir, service) = setup();

    c.bench_function("recommend_known_user", |b| {
        b.iter(|| black_box(service.recommend(black_box(1), black_box(20)).unwrap()))
    });
    c.bench_function("recommend_unknown_user", |b| {
        b.iter(|| black_box(service.recommend(black_box(999_999), black_box(20)).unwrap()))
    });
}

fn bench_similar(c: &mut Criterion) {
    let (_dir, service) = setup();

    c.bench_function("similar", |b| {
        b.iter(|| black_box(service.similar(black_box(1), black_box(20)).unwrap()))
    });
}

criterion_group!(benches, bench_recommend, bench_similar);
criterion_main!(benches);
