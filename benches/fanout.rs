use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use locbroker::registry::SubscriberRegistry;
use locbroker::resolver::resolve_location_config;
use locbroker::router::route_positions;
use locbroker::{
    Accuracy, AppState, Coordinate, InMemoryProvider, LocationBroker, LocationSubscriber,
    LocationSubscriberRef, Position, PositionBatch, SubscriberOptions,
};

struct Counter {
    options: SubscriberOptions,
    accuracy: Accuracy,
    positions: AtomicU64,
}

impl LocationSubscriber for Counter {
    fn location_subscriber_options(&self) -> SubscriberOptions {
        self.options
    }

    fn desired_accuracy(&self) -> Accuracy {
        self.accuracy
    }

    fn did_update_locations(&self, positions: &PositionBatch) {
        self.positions.fetch_add(positions.len() as u64, Ordering::Relaxed);
    }
}

fn subscribers(n: usize) -> Vec<LocationSubscriberRef> {
    const MIX: [SubscriberOptions; 4] = [
        SubscriberOptions::CONTINUOUS,
        SubscriberOptions::SIGNIFICANT_CHANGE,
        SubscriberOptions::RECEIVE_ALL_LOCATIONS,
        SubscriberOptions::RECEIVE_ERRORS,
    ];
    (0..n)
        .map(|i| {
            let subscriber: LocationSubscriberRef = Arc::new(Counter {
                options: MIX[i % MIX.len()],
                accuracy: Accuracy::meters(10.0 + (i % 50) as f64),
                positions: AtomicU64::new(0),
            });
            subscriber
        })
        .collect()
}

fn batch(len: usize) -> PositionBatch {
    (0..len)
        .map(|i| Position::new(Coordinate::new(52.0 + i as f64 * 1e-4, 13.0), 5.0))
        .collect::<Vec<_>>()
        .into()
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout/resolve");
    for n in [16usize, 256, 4096] {
        let subs = subscribers(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &subs, |b, subs| {
            b.iter(|| resolve_location_config(subs, AppState::Foreground));
        });
    }
    group.finish();
}

fn bench_route(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout/route_positions");
    let positions = batch(8);
    for n in [16usize, 256, 4096] {
        let mut registry = SubscriberRegistry::new();
        for s in subscribers(n) {
            registry.add_location(s);
        }
        let snapshot = registry.snapshot();
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &snapshot, |b, snapshot| {
            b.iter(|| route_positions(snapshot, AppState::Foreground, &positions));
        });
    }
    group.finish();
}

fn bench_broker_roundtrip(c: &mut Criterion) {
    let provider = Arc::new(InMemoryProvider::new());
    let broker = LocationBroker::new(provider);
    for s in subscribers(256) {
        broker.add_location_subscriber(s);
    }
    broker.sync().unwrap();
    let sink = broker.event_sink();
    let positions: Vec<Position> = batch(8).to_vec();

    c.bench_function("fanout/broker_batch_and_sync", |b| {
        b.iter(|| {
            sink.on_position_batch(positions.clone());
            broker.sync().unwrap();
        });
    });
}

criterion_group!(fanout, bench_resolve, bench_route, bench_broker_roundtrip);
criterion_main!(fanout);
