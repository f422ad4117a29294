use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::{NaiveDate, Utc};
use promise_core::calendar::add_days;
use promise_core::PipelineConfig;
use promise_fulfillment::{
    AvailabilityEngine, DeliveryScheduler, LineRng, SplitPlanner, SupplySnapshot,
};
use promise_inventory::InventorySnapshot;
use promise_purchasing::PurchaseOrder;
use promise_sales::OrderLine;
use std::sync::Arc;

const ITEMS: usize = 50;

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 11, 2).unwrap()
}

/// Snapshot with two inventory rows and three inbound POs per item.
fn snapshot() -> SupplySnapshot {
    let mut snapshot = SupplySnapshot::new(as_of());
    for i in 0..ITEMS {
        let item = format!("ITEM-{i:03}");
        snapshot = snapshot
            .with_inventory([
                InventorySnapshot::new(item.as_str(), "MAIN", 40, 10, Utc::now()),
                InventorySnapshot::new(item.as_str(), "EAST", 25, 5, Utc::now()),
            ])
            .with_purchase_orders((0..3u32).map(|p| {
                PurchaseOrder::new(
                    format!("PO-{i}-{p}"),
                    item.as_str(),
                    60,
                    add_days(as_of(), 5 + p * 7),
                    "MAIN",
                    p != 2,
                )
            }));
    }
    snapshot
}

fn lines(count: usize) -> Vec<OrderLine> {
    (0..count)
        .map(|n| {
            OrderLine::new(
                format!("SO-{}", n / 4),
                format!("{:03}", n % 4),
                format!("ITEM-{:03}", n % ITEMS),
                (n as i64 % 7 + 1) * 15,
                add_days(as_of(), 10 + (n as u32 % 20)),
            )
        })
        .collect()
}

fn bench_single_line(c: &mut Criterion) {
    let mut group = c.benchmark_group("atp_single_line");
    group.sample_size(1000);

    let engine = AvailabilityEngine::new(Arc::new(PipelineConfig::default()));
    let snapshot = snapshot();
    let from_stock = OrderLine::new("SO-1", "001", "ITEM-007", 20, add_days(as_of(), 10));
    let from_po = OrderLine::new("SO-1", "002", "ITEM-007", 150, add_days(as_of(), 30)).with_partial(false);

    group.bench_function("stock", |b| {
        b.iter(|| black_box(engine.compute(black_box(&from_stock), &snapshot)));
    });
    group.bench_function("inbound_po", |b| {
        b.iter(|| black_box(engine.compute(black_box(&from_po), &snapshot)));
    });

    group.finish();
}

fn bench_batch_reservation(c: &mut Criterion) {
    let mut group = c.benchmark_group("atp_batch");
    let snapshot = snapshot();

    for size in [10usize, 100, 1000].iter() {
        let batch = lines(*size);
        group.throughput(Throughput::Elements(*size as u64));

        for reserve in [false, true] {
            let engine = AvailabilityEngine::new(Arc::new(
                PipelineConfig::default().with_reservations(reserve),
            ));
            let label = if reserve { "reserved" } else { "independent" };
            group.bench_with_input(BenchmarkId::new(label, size), &batch, |b, batch| {
                b.iter(|| black_box(engine.compute_all(batch, &snapshot)));
            });
        }
    }

    group.finish();
}

fn bench_decision_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("atp_schedule_split");
    let config = Arc::new(PipelineConfig::default());
    let engine = AvailabilityEngine::new(config.clone());
    let scheduler = DeliveryScheduler::new(config.clone());
    let planner = SplitPlanner::new(config);
    let snapshot = snapshot();
    let batch = lines(100);
    let rng = LineRng::new(0x5eed);

    group.throughput(Throughput::Elements(batch.len() as u64));
    group.bench_function("100_lines", |b| {
        b.iter(|| {
            for line in &batch {
                let atp = engine.compute(line, &snapshot);
                let schedule = scheduler.schedule_line(&atp, line, &rng).unwrap();
                black_box(planner.plan(&atp, &schedule, line).unwrap());
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_single_line,
    bench_batch_reservation,
    bench_decision_chain
);
criterion_main!(benches);
