//! Performance benchmarks for delivery and the subscriber registry.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sensor_broker::{
    fan_out, object_channel, Envelope, ObjectConfig, ObjectEndpoint, ObjectHandle, ObjectId,
    SensorEvent, SensorId, SubscriberList, SubscriberRegistry,
};

fn subscribers(count: i64, config: ObjectConfig) -> (SubscriberList, Vec<ObjectEndpoint>) {
    let mut list = SubscriberList::default();
    let mut endpoints = Vec::new();
    for id in 0..count {
        let (handle, endpoint) = object_channel(ObjectId(id), config);
        list.add(handle);
        endpoints.push(endpoint);
    }
    (list, endpoints)
}

/// Fan one event out to a growing number of consumers that keep up.
fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");
    let event = Envelope::from(SensorEvent::new(SensorId(10), 10500));

    for count in [1, 10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("subscribers", count), &count, |b, &count| {
            let (list, endpoints) = subscribers(count, ObjectConfig::default());
            b.iter(|| {
                black_box(fan_out(&list, &event));
                for endpoint in &endpoints {
                    let _ = endpoint.try_recv();
                }
            });
        });
    }

    group.finish();
}

/// Fan-out where every consumer's queue is already full.
fn bench_fan_out_stalled(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out_stalled");
    let event = Envelope::from(SensorEvent::new(SensorId(10), 1));
    let full = ObjectConfig {
        event_buffer: 1,
        command_buffer: 1,
    };

    for count in [10, 100] {
        group.bench_with_input(BenchmarkId::new("subscribers", count), &count, |b, &count| {
            let (list, _endpoints) = subscribers(count, full);
            fan_out(&list, &event);
            b.iter(|| black_box(fan_out(&list, &event)));
        });
    }

    group.finish();
}

/// Subscribe many objects to many sensors, duplicates included.
fn bench_registry_subscribe(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_subscribe");

    for sensors in [10, 100, 1000] {
        let handles: Vec<ObjectHandle> = (0..20)
            .map(|id| object_channel(ObjectId(id), ObjectConfig::default()).0)
            .collect();

        group.bench_with_input(BenchmarkId::new("sensors", sensors), &sensors, |b, &sensors| {
            b.iter(|| {
                let mut registry = SubscriberRegistry::new();
                for sensor in 0..sensors {
                    for handle in &handles {
                        registry.subscribe(SensorId(sensor), handle.clone());
                    }
                    // Repeated asks are absorbed.
                    registry.subscribe(SensorId(sensor), handles[0].clone());
                }
                black_box(registry.sensor_count())
            });
        });
    }

    group.finish();
}

fn bench_envelope_dispatch(c: &mut Criterion) {
    let envelopes: Vec<Envelope> = (0..1000)
        .map(|i| SensorEvent::new(SensorId(i % 50), i).into())
        .collect();

    c.bench_function("envelope_dispatch", |b| {
        b.iter(|| {
            let mut sum = 0i64;
            for envelope in &envelopes {
                if let Some(event) = envelope.try_as::<SensorEvent>() {
                    sum += event.value;
                }
            }
            black_box(sum)
        });
    });
}

criterion_group!(
    benches,
    bench_fan_out,
    bench_fan_out_stalled,
    bench_registry_subscribe,
    bench_envelope_dispatch
);
criterion_main!(benches);
