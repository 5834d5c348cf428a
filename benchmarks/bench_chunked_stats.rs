use std::hint::black_box;
use std::io::Write;
use std::path::PathBuf;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::NamedTempFile;

use logshard::chunker::compute_chunks;
use logshard::config::RunSettings;
use logshard::platform::CancelToken;
use logshard::runner::run_task;
use logshard::task::TaskDescriptor;

const ROWS: usize = 100_000;

fn access_log() -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    writeln!(file, "timestamp,ip,method,url,status,response_time").expect("header");
    for i in 0..ROWS {
        writeln!(
            file,
            "2024-01-15 10:{:02}:{:02},10.0.{}.{},GET,/item/{},{},{}",
            (i / 60) % 60,
            i % 60,
            i % 16,
            i % 251,
            i % 1000,
            if i % 9 == 0 { 503 } else { 200 },
            20 + i % 400
        )
        .expect("row");
    }
    file.flush().expect("flush");
    file
}

fn settings(path: PathBuf, workers: usize) -> RunSettings {
    RunSettings {
        file_path: path,
        worker_count: workers,
        top_n: 10,
    }
}

fn bench_compute_chunks(c: &mut Criterion) {
    let file = access_log();
    c.bench_function("compute_chunks_16", |b| {
        b.iter(|| black_box(compute_chunks(black_box(file.path()), 16).expect("chunks")));
    });
}

fn bench_stats_by_workers(c: &mut Criterion) {
    let file = access_log();
    let mut group = c.benchmark_group("stats_by_workers");
    group.throughput(Throughput::Elements(ROWS as u64));
    group.sample_size(20);

    for workers in [1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &workers| {
            let settings = settings(file.path().to_path_buf(), workers);
            b.iter(|| {
                let outcome = run_task(
                    &TaskDescriptor::stats(),
                    &settings,
                    &CancelToken::new(),
                    std::io::sink(),
                )
                .expect("run");
                black_box(outcome.state.total_requests())
            });
        });
    }
    group.finish();
}

fn bench_top_url(c: &mut Criterion) {
    let file = access_log();
    let settings = settings(file.path().to_path_buf(), 4);
    c.bench_function("top_url_4_workers", |b| {
        b.iter(|| {
            let outcome = run_task(
                &TaskDescriptor::top("url"),
                &settings,
                &CancelToken::new(),
                std::io::sink(),
            )
            .expect("run");
            black_box(outcome.state.distinct_values(logshard::Field::Url))
        });
    });
}

criterion_group!(benches, bench_compute_chunks, bench_stats_by_workers, bench_top_url);
criterion_main!(benches);
