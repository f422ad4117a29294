use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::{NaiveDate, TimeZone, Utc};
use promise_audit::{AuditLedger, AuditRecord, AuditSnapshot, InMemoryAuditLedger, Stage};
use promise_core::{CancelSignal, FixedClock, OrderId, PipelineConfig};
use promise_infra::{InMemoryDataProvider, OrderPipeline, ScriptedTransport};
use promise_inventory::InventorySnapshot;
use promise_sales::OrderLine;
use std::sync::Arc;

fn provider(items: usize) -> InMemoryDataProvider {
    let now = Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap();
    InMemoryDataProvider::new().with_inventory(
        (0..items).map(|i| InventorySnapshot::new(format!("ITEM-{i}"), "MAIN", 10_000, 50, now)),
    )
}

fn lines(count: usize, items: usize) -> Vec<OrderLine> {
    let requested = NaiveDate::from_ymd_opt(2026, 11, 16).unwrap();
    (0..count)
        .map(|n| {
            OrderLine::new(
                format!("SO-{}", n / 3),
                format!("{:03}", n % 3 + 1),
                format!("ITEM-{}", n % items),
                (n % 40 + 1) as i64,
                requested,
            )
        })
        .collect()
}

fn pipeline(workers: usize) -> OrderPipeline {
    let config = PipelineConfig::default()
        .with_retry(1, 0)
        .with_reservations(false)
        .with_worker_threads(workers);
    let now = Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap();
    OrderPipeline::new(
        config,
        Arc::new(provider(25)),
        Arc::new(ScriptedTransport::always_ok()),
    )
    .unwrap()
    .with_clock(Arc::new(FixedClock(now)))
}

fn bench_batch_by_workers(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_batch");
    let batch = lines(300, 25);
    group.throughput(Throughput::Elements(batch.len() as u64));

    for workers in [1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::new("workers", workers), &workers, |b, &workers| {
            b.iter(|| {
                let p = pipeline(workers);
                black_box(p.run(black_box(batch.clone()), &CancelSignal::new()))
            });
        });
    }

    group.finish();
}

fn bench_availability_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_availability_only");

    for size in [10, 100, 500] {
        let batch = lines(size, 25);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &batch, |b, batch| {
            b.iter(|| {
                let p = pipeline(4);
                black_box(p.check_availability(black_box(batch.clone()), &CancelSignal::new()))
            });
        });
    }

    group.finish();
}

fn bench_ledger_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_append");

    for count in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let sample = lines(1, 1);
            let line = &sample[0];
            let order = OrderId::new("SO-1");
            b.iter(|| {
                let ledger = InMemoryAuditLedger::new();
                for _ in 0..count {
                    ledger
                        .record(
                            AuditRecord::new(Stage::Ingestion, "accept_line")
                                .order(&order)
                                .input(AuditSnapshot::OrderLine(line)),
                        )
                        .unwrap();
                }
                black_box(ledger.len().unwrap())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_batch_by_workers,
    bench_availability_check,
    bench_ledger_append
);
criterion_main!(benches);
