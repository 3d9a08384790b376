//! Micro-benchmarks for the tempra hot path.
//!
//! Uses Criterion for statistically rigorous measurement with regression
//! detection and HTML reports.
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench micro              # run all micro-benchmarks
//! cargo bench --bench micro -- parse     # filter by name
//! ```
//!
//! Reports are generated in `target/criterion/report/index.html`.

use criterion::{
    BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main,
};

use rand::Rng;
use std::io::Write as _;
use tempfile::TempDir;

use tempra::engine::{self, AggregateConfig};
use tempra::parser::{RecordParser, SLACK_BYTES};
use tempra::table::{Key16, KeyBlock, StationTable};

// ------------------------------------------------------------------------------------------------
// Helpers
// ------------------------------------------------------------------------------------------------

/// Builds roughly `bytes` worth of records over a 400-station set, slack
/// included, returning `(buffer, data_len)`.
fn record_buffer(bytes: usize) -> (Vec<u8>, usize) {
    let mut rng = rand::rng();
    let stations: Vec<String> = (0..400).map(|i| format!("station-{i:03}")).collect();

    let mut out = Vec::with_capacity(bytes + 128);
    while out.len() < bytes {
        let station = &stations[rng.random_range(0..stations.len())];
        let tenths: i32 = rng.random_range(-999..=999);
        let sign = if tenths < 0 { "-" } else { "" };
        let magnitude = tenths.unsigned_abs();
        out.extend_from_slice(
            format!("{station};{sign}{}.{}\n", magnitude / 10, magnitude % 10).as_bytes(),
        );
    }
    let data_len = out.len();
    out.extend_from_slice(&[0u8; SLACK_BYTES]);
    (out, data_len)
}

/// Writes a measurements file of roughly `bytes` bytes into `dir`.
fn record_file(dir: &TempDir, bytes: usize) -> std::path::PathBuf {
    let (buf, data_len) = record_buffer(bytes);
    let path = dir.path().join("measurements.txt");
    let mut file = std::fs::File::create(&path).expect("create");
    file.write_all(&buf[..data_len]).expect("write");
    path
}

// ------------------------------------------------------------------------------------------------
// Parser
// ------------------------------------------------------------------------------------------------

/// Sustained record-parsing throughput into a reused table.
fn bench_parse(c: &mut Criterion) {
    let (buf, data_len) = record_buffer(1024 * 1024);

    let mut group = c.benchmark_group("parse");
    group.throughput(Throughput::Bytes(data_len as u64));
    group.bench_function("vector_1mib", |b| {
        b.iter_batched(
            StationTable::new,
            |mut table| {
                let mut parser = RecordParser::new();
                parser.parse(black_box(&buf), data_len, &mut table);
                table
            },
            BatchSize::LargeInput,
        );
    });
    group.finish();
}

// ------------------------------------------------------------------------------------------------
// Table
// ------------------------------------------------------------------------------------------------

/// Lookup-heavy load: a bounded key set hammered with updates.
fn bench_table_updates(c: &mut Criterion) {
    let keys: Vec<Key16> = (0..1_000)
        .map(|i| Key16::from_name(format!("key-{i:04}").as_bytes()))
        .collect();

    let mut group = c.benchmark_group("table");
    group.throughput(Throughput::Elements(100_000));
    group.bench_function("narrow_updates_100k", |b| {
        b.iter_batched(
            StationTable::new,
            |mut table| {
                for i in 0..100_000usize {
                    table.accumulate_narrow(black_box(keys[i % keys.len()]), (i % 1999) as i32 - 999);
                }
                table
            },
            BatchSize::LargeInput,
        );
    });
    group.finish();
}

// ------------------------------------------------------------------------------------------------
// End to end
// ------------------------------------------------------------------------------------------------

/// Whole-pipeline throughput over a small on-disk file.
fn bench_aggregate(c: &mut Criterion) {
    let dir = TempDir::new().expect("tempdir");
    let path = record_file(&dir, 4 * 1024 * 1024);
    let config = AggregateConfig::default();

    let mut group = c.benchmark_group("aggregate");
    group.sample_size(20);
    group.throughput(Throughput::Bytes(4 * 1024 * 1024));
    group.bench_function("file_4mib", |b| {
        b.iter(|| engine::aggregate(black_box(&path), &config).expect("aggregate"));
    });
    group.finish();
}

criterion_group!(benches, bench_parse, bench_table_updates, bench_aggregate);
criterion_main!(benches);
