use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use retailpos_catalog::ProductId;
use retailpos_core::{AggregateId, Discount, ExpectedVersion, Money, TenantId};
use retailpos_events::{EventEnvelope, InMemoryEventBus};
use retailpos_infra::command_dispatcher::CommandDispatcher;
use retailpos_infra::event_store::{EventStore, InMemoryEventStore, UncommittedEvent};
use retailpos_infra::projections::{Projection, StockProjection, StockReadModel};
use retailpos_infra::read_model::InMemoryTenantStore;
use retailpos_inventory::stock::AGGREGATE_TYPE;
use retailpos_inventory::{MovementKind, MovementRecorded, RecordMovement, StockCommand, StockEvent, StockItem};
use retailpos_sales::{CartLine, cart_totals};
use std::sync::Arc;

type Dispatcher = CommandDispatcher<InMemoryEventStore, Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>>;

fn setup() -> (Dispatcher, TenantId) {
    let bus = Arc::new(InMemoryEventBus::new());
    (CommandDispatcher::new(InMemoryEventStore::new(), bus), TenantId::new())
}

fn movement(tenant_id: TenantId, product_id: ProductId, kind: MovementKind, quantity: i64) -> StockCommand {
    StockCommand::RecordMovement(RecordMovement {
        tenant_id,
        product_id,
        kind,
        quantity,
        reference: None,
        note: None,
        occurred_at: Utc::now(),
    })
}

fn record(dispatcher: &Dispatcher, tenant_id: TenantId, id: AggregateId, command: StockCommand) {
    dispatcher
        .dispatch(tenant_id, id, AGGREGATE_TYPE, command, |_, id| StockItem::empty(ProductId::new(id)))
        .unwrap();
}

fn bench_command_execution_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("command_execution_latency");
    group.sample_size(1000);

    group.bench_function("opening_stock_fresh", |b| {
        let (dispatcher, tenant_id) = setup();
        b.iter(|| {
            let id = AggregateId::new();
            let cmd = movement(tenant_id, ProductId::new(id), MovementKind::Opening, black_box(10));
            record(&dispatcher, tenant_id, id, cmd);
        });
    });

    group.bench_function("adjustment_with_history", |b| {
        let (dispatcher, tenant_id) = setup();
        let id = AggregateId::new();
        let product_id = ProductId::new(id);
        record(&dispatcher, tenant_id, id, movement(tenant_id, product_id, MovementKind::Opening, 10));

        b.iter(|| {
            let cmd = movement(tenant_id, product_id, MovementKind::Adjustment, black_box(1));
            record(&dispatcher, tenant_id, id, cmd);
        });
    });

    group.finish();
}

fn movement_event(tenant_id: TenantId, product_id: ProductId, quantity: i64, on_hand_after: i64) -> StockEvent {
    StockEvent::MovementRecorded(MovementRecorded {
        tenant_id,
        product_id,
        kind: MovementKind::Adjustment,
        quantity,
        on_hand_after,
        reference: None,
        note: None,
        occurred_at: Utc::now(),
    })
}

fn bench_event_append_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_append_throughput");

    for batch_size in [1usize, 10, 100, 1000] {
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(BenchmarkId::new("batch_append", batch_size), &batch_size, |b, &size| {
            let store = InMemoryEventStore::new();
            let tenant_id = TenantId::new();
            let id = AggregateId::new();
            let product_id = ProductId::new(id);

            b.iter(|| {
                let events: Vec<UncommittedEvent> = (0..size as i64)
                    .map(|i| {
                        UncommittedEvent::from_typed(
                            tenant_id,
                            id,
                            AGGREGATE_TYPE,
                            uuid::Uuid::now_v7(),
                            &movement_event(tenant_id, product_id, 1, i + 1),
                        )
                        .unwrap()
                    })
                    .collect();
                black_box(store.append(events, ExpectedVersion::Any).unwrap());
            });
        });
    }

    group.finish();
}

fn bench_projection_rebuild_speed(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection_rebuild_speed");

    for event_count in [10i64, 100, 1000, 10000] {
        group.bench_with_input(
            BenchmarkId::new("rebuild_stock_ledger", event_count),
            &event_count,
            |b, &count| {
                let store = InMemoryEventStore::new();
                let tenant_id = TenantId::new();
                let id = AggregateId::new();
                let product_id = ProductId::new(id);

                let mut envelopes = Vec::new();
                for i in 0..count {
                    let uncommitted = UncommittedEvent::from_typed(
                        tenant_id,
                        id,
                        AGGREGATE_TYPE,
                        uuid::Uuid::now_v7(),
                        &movement_event(tenant_id, product_id, 1, i + 1),
                    )
                    .unwrap();
                    let stored = store
                        .append(vec![uncommitted], ExpectedVersion::Exact(i as u64))
                        .unwrap();
                    envelopes.push(stored[0].to_envelope());
                }

                let projection = StockProjection::new(Arc::new(InMemoryTenantStore::<ProductId, StockReadModel>::new()));
                b.iter(|| projection.rebuild_from_scratch(black_box(&envelopes)).unwrap());
            },
        );
    }

    group.finish();
}

fn bench_cart_totals(c: &mut Criterion) {
    let mut group = c.benchmark_group("cart_totals");

    for line_count in [1usize, 10, 100] {
        let lines: Vec<CartLine> = (0..line_count)
            .map(|i| CartLine {
                product_id: ProductId::new(AggregateId::new()),
                code: format!("SKU-{i}"),
                name: format!("Item {i}"),
                quantity: (i % 5 + 1) as i64,
                unit_price: Money::from_minor(199 + i as i64),
                cost_price: Money::from_minor(120),
            })
            .collect();

        group.throughput(Throughput::Elements(line_count as u64));
        group.bench_with_input(BenchmarkId::new("percent_discount", line_count), &lines, |b, lines| {
            b.iter(|| cart_totals(black_box(lines), &Discount::Percent(10), Money::from_minor(100_000)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_command_execution_latency,
    bench_event_append_throughput,
    bench_projection_rebuild_speed,
    bench_cart_totals
);
criterion_main!(benches);
