//! Binlog benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kvlog_bench::{log_image, transaction};
use kvlog_core::wal::{encode_record, RecordScanner};
use kvlog_core::{BinLog, Config, MemStore};
use kvlog_storage::InMemoryPool;
use std::sync::Arc;
use tempfile::TempDir;

/// Benchmark record encoding.
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_record");

    for size in [64, 256, 1024, 4096].iter() {
        let tx = transaction(1, 4, *size);
        group.throughput(Throughput::Bytes((*size * 4) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &tx, |b, tx| {
            b.iter(|| {
                let record = encode_record(black_box(tx.id()), black_box(tx.tables())).unwrap();
                black_box(record);
            });
        });
    }

    group.finish();
}

/// Benchmark appends through an in-memory pool.
fn bench_inmemory_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("inmemory_append");

    for size in [64, 256, 1024].iter() {
        group.throughput(Throughput::Bytes((*size * 4) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let log = BinLog::open_in_memory(Arc::new(MemStore::new()));
            let tx = transaction(1, 4, size);

            b.iter(|| {
                let offset = log.append(black_box(&tx)).unwrap();
                black_box(offset);
            });
            // Keep the queue from growing without bound between samples.
            log.pending().clear();
        });
    }

    group.finish();
}

/// Benchmark appends to a file.
fn bench_file_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_append");
    group.sample_size(50);

    for size in [256, 1024].iter() {
        group.throughput(Throughput::Bytes((*size * 4) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let temp_dir = TempDir::new().unwrap();
            let path = temp_dir.path().join("binlog");
            let log = BinLog::open(&path, &Config::default(), Arc::new(MemStore::new())).unwrap();
            let tx = transaction(1, 4, size);

            b.iter(|| {
                let offset = log.append(black_box(&tx)).unwrap();
                black_box(offset);
            });
        });
    }

    group.finish();
}

/// Benchmark the resynchronizing scan over clean and damaged logs.
fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");

    for (name, junk) in [("clean", 0), ("damaged", 32)] {
        let image = log_image(1000, 128, junk);
        group.throughput(Throughput::Bytes(image.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &image, |b, image| {
            b.iter(|| black_box(RecordScanner::new(black_box(image)).count()));
        });
    }

    group.finish();
}

/// Benchmark full recovery into a fresh store.
fn bench_recover(c: &mut Criterion) {
    let mut group = c.benchmark_group("recover");
    let image = log_image(1000, 128, 0);
    group.throughput(Throughput::Bytes(image.len() as u64));

    group.bench_function("1000_records", |b| {
        b.iter(|| {
            let pool = Arc::new(InMemoryPool::with_data(image.clone()));
            let log = BinLog::with_pool(pool, &Config::default(), Arc::new(MemStore::new()));
            black_box(log.recover().unwrap());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_encode,
    bench_inmemory_append,
    bench_file_append,
    bench_scan,
    bench_recover
);
criterion_main!(benches);
