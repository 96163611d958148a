//! Benchmarks for recipe execution.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sluice::prelude::*;
use sluice::stages::filters::{FieldAdder, FieldExploder, FieldRenamer, Unique};

fn records(n: i64) -> Vec<Record> {
    (0..n)
        .map(|i| {
            Record::new()
                .with("id", i)
                .with("name", format!("record-{i}"))
                .with("tags", vec!["a", "b"])
        })
        .collect()
}

fn recipe_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("recipe");
    for size in [100_i64, 10_000] {
        group.bench_with_input(BenchmarkId::new("filters", size), &size, |b, &size| {
            let out = CollectingEmitter::new("out");
            let mut recipe = Recipe::builder("bench")
                .filter(FieldRenamer::new([("title", "name")]))
                .filter(FieldAdder::new("source", "bench"))
                .filter(Unique::new())
                .emitter(out)
                .build()
                .unwrap();
            b.iter(|| black_box(recipe.run(IterSource::new(records(size)))));
        });

        group.bench_with_input(BenchmarkId::new("fan_out", size), &size, |b, &size| {
            let mut recipe = Recipe::builder("bench_fan_out")
                .filter(FieldExploder::new("tags"))
                .emitter(CountEmitter::new(1_000_000).unwrap().to_writer(std::io::sink()))
                .emitter(CollectingEmitter::default())
                .build()
                .unwrap();
            b.iter(|| black_box(recipe.run(IterSource::new(records(size)))));
        });
    }
    group.finish();
}

criterion_group!(benches, recipe_benchmark);
criterion_main!(benches);
