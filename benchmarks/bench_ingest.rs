use std::hint::black_box;
use std::io::Write;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::NamedTempFile;

use salescope::aggregate::Aggregates;
use salescope::parallel::{ParallelConfig, ParallelProcessor};
use salescope::{CancelToken, Transaction, TransactionParser};

const HEADER: &str = "transaction_id,date,user_id,country,region,product_id,product_name,category,price,quantity,total_price,stock,added_date";

const COUNTRIES: [&str; 6] = ["USA", "Canada", "Mexico", "Germany", "Japan", "Brazil"];
const PRODUCTS: [&str; 8] = [
    "Laptop", "Mouse", "Desk", "Chair", "Lamp", "Monitor", "Keyboard", "Cable",
];

fn line(i: usize) -> String {
    let quantity = i % 5 + 1;
    let price = (i % 400) as f64 + 0.99;
    format!(
        "T{i},2023-{:02}-{:02},U{},{},Region-{},P{},{},Category-{},{price:.2},{quantity},{:.2},{},2022-11-01",
        i % 12 + 1,
        i % 28 + 1,
        i % 1000,
        COUNTRIES[i % COUNTRIES.len()],
        i % 4,
        i % PRODUCTS.len(),
        PRODUCTS[i % PRODUCTS.len()],
        i % 3,
        price * quantity as f64,
        500 - (i % 500),
    )
}

fn write_source(rows: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    writeln!(file, "{}", HEADER).expect("header");
    for i in 0..rows {
        writeln!(file, "{}", line(i)).expect("row");
    }
    file.flush().expect("flush");
    file
}

fn bench_parse_line(c: &mut Criterion) {
    let input = line(42);
    let mut parser = TransactionParser::new_csv();
    c.bench_function("parse_transaction_line", |b| {
        b.iter(|| {
            black_box(parser.parse(black_box(&input)).ok());
        });
    });
}

fn bench_fold_batch(c: &mut Criterion) {
    let mut parser = TransactionParser::new_csv();
    let batch: Vec<Transaction> = (0..10_000)
        .filter_map(|i| parser.parse(&line(i)).ok())
        .collect();

    let mut group = c.benchmark_group("fold");
    group.throughput(Throughput::Elements(batch.len() as u64));
    group.bench_function("fold_10k_batch", |b| {
        b.iter(|| black_box(Aggregates::from_transactions(black_box(&batch))));
    });
    group.finish();
}

fn bench_ingest_file(c: &mut Criterion) {
    let rows = 100_000;
    let source = write_source(rows);
    let cancel = CancelToken::new();

    let mut group = c.benchmark_group("ingest");
    group.sample_size(10);
    group.throughput(Throughput::Elements(rows as u64));
    for workers in [1usize, 4, 10] {
        let processor = ParallelProcessor::new(ParallelConfig {
            num_workers: workers,
            ..ParallelConfig::default()
        });
        group.bench_with_input(BenchmarkId::new("workers", workers), &workers, |b, _| {
            b.iter(|| {
                let outcome = processor
                    .process(black_box(source.path()), &cancel)
                    .expect("ingest");
                black_box(outcome.data.record_count)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse_line, bench_fold_batch, bench_ingest_file);
criterion_main!(benches);
