//! Whole-frame benchmarks.
//!
//! Steps a headless engine over levels of drifting, colliding quads: update,
//! collision pass, flush and draw. The collision pass is pairwise, so this is
//! where it shows up against the per-object work.
//!
//! Run with: `cargo bench --bench engine_frame`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tessera_engine::prelude::*;

fn level(count: usize) -> String {
    let objects: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            let column = (i % 32) as f32;
            let row = (i / 32) as f32;
            serde_json::json!({
                "name": format!("body_{i}"),
                "components": [
                    { "type": "TRANSFORM", "fields": { "position": [column * 20.0, row * 20.0] } },
                    { "type": "MOVEMENT", "fields": { "velocity": [10.0, (i % 7) as f32] } },
                    { "type": "COLLIDER", "fields": { "size": [16.0, 16.0] } },
                    { "type": "GLQUAD", "fields": { "size": [16.0, 16.0] } }
                ]
            })
        })
        .collect();
    serde_json::json!({ "objects": objects }).to_string()
}

fn engine(count: usize) -> Engine {
    let mut resources = ResourceManager::in_memory();
    resources
        .insert_level_json(0, &level(count))
        .expect("bench level should parse");
    let mut engine = Engine::builder(EngineConfig {
        headless: true,
        ..EngineConfig::default()
    })
    .resources(resources)
    .build()
    .expect("default config is valid");
    engine.load_start_level().expect("bench level should load");
    engine
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_step");
    for count in [10usize, 100, 1_000] {
        let mut engine = engine(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| black_box(engine.step().expect("engine is running").collisions.pairs.len()));
        });
    }
    group.finish();
}

fn bench_collision_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("collision_pass");
    for count in [10usize, 100, 1_000] {
        let mut engine = engine(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| black_box(run_collision_pass(engine.objects_mut()).pairs.len()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_step, bench_collision_pass);
criterion_main!(benches);
