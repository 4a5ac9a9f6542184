//! Benchmarks for the MAP-Elites archive and search loop.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use map_elites::{Map, MapElites, MapElitesConfig, PointEnv};

/// Raw cell-store writes at different history depths.
fn bench_map_writes(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_write");
    for history in [1usize, 8] {
        group.bench_with_input(
            BenchmarkId::from_parameter(history),
            &history,
            |b, &history| {
                let mut map = Map::new(vec![32, 32], f64::NEG_INFINITY, history).unwrap();
                let mut i = 0usize;
                b.iter(|| {
                    let ix = [i % 32, (i / 32) % 32];
                    map.set(&ix, i as f64).unwrap();
                    i += 1;
                    black_box(map.get(&ix).unwrap())
                })
            },
        );
    }
    group.finish();
}

/// Full search runs over the toy point environment.
fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    group.sample_size(20);
    for steps in [50usize, 200] {
        group.bench_with_input(BenchmarkId::from_parameter(steps), &steps, |b, &steps| {
            b.iter(|| {
                let env = PointEnv::new(
                    vec![(0.0, 1.0), (0.0, 1.0)],
                    vec![0.5, 0.5],
                    32,
                    0.1,
                    42,
                );
                let config = MapElitesConfig {
                    map_grid_size: 16,
                    seed: Some(42),
                    ..Default::default()
                };
                let mut archive = MapElites::new(env, config).unwrap();
                let outcome = archive.search(10, steps, 0.0).unwrap();
                black_box((outcome.best_fitness, archive.qd_score()))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_map_writes, bench_search);
criterion_main!(benches);
