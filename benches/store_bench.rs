//! Benchmarks for treekv store operations

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use tempfile::TempDir;
use treekv::{CodecOptions, Store};

fn store_benchmarks(c: &mut Criterion) {
    let value = vec![0xabu8; 4096];

    c.bench_function("put_compressed_4k", |b| {
        let dir = TempDir::new().unwrap();
        let db = Store::new(dir.path()).unwrap();
        b.iter(|| db.put("bench/key", &value).unwrap());
    });

    c.bench_function("put_plain_4k", |b| {
        let dir = TempDir::new().unwrap();
        let db = Store::new(dir.path()).unwrap();
        b.iter(|| db.put_with("bench/key", &value, CodecOptions::plain()).unwrap());
    });

    c.bench_function("get_compressed_4k", |b| {
        let dir = TempDir::new().unwrap();
        let db = Store::new(dir.path()).unwrap();
        db.put("bench/key", &value).unwrap();
        b.iter(|| db.get("bench/key").unwrap());
    });

    c.bench_function("find_1k_keys", |b| {
        let dir = TempDir::new().unwrap();
        let db = Store::new(dir.path()).unwrap();
        for i in 0..1000 {
            db.put_with(&format!("c{}/k{}", i % 10, i), b"v", CodecOptions::plain())
                .unwrap();
        }
        b.iter(|| db.find("^c3/", None, true).unwrap().count());
    });

    c.bench_function("clean_100_empty_dirs", |b| {
        let dir = TempDir::new().unwrap();
        let db = Store::new(dir.path()).unwrap();
        b.iter_batched(
            || {
                for i in 0..100 {
                    db.create_container(&format!("empty/{i}")).ok();
                }
            },
            |_| db.clean().unwrap(),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, store_benchmarks);
criterion_main!(benches);
