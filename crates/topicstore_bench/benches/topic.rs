//! Topic store benchmarks.

use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};
use tempfile::TempDir;
use topicstore_bench::{generate_messages, memory_topic, subscriber, BENCH_TOPIC};
use topicstore_core::{
    CollectingListener, Message, MessageId, MessageStore, PersistenceAdapter, StoreConfig,
    SubscriptionInfo, TopicMessageStore,
};

fn bench_config() -> StoreConfig {
    StoreConfig::new().sync_on_write(false)
}

/// Benchmark publishing into a topic with a growing number of subscribers.
fn bench_publish_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_fan_out");

    for subscribers in [1usize, 4, 16].iter() {
        group.throughput(Throughput::Elements(100));
        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            subscribers,
            |b, &subscribers| {
                b.iter_batched(
                    || (memory_topic(subscribers, &bench_config()), generate_messages(100, 256)),
                    |(store, messages)| {
                        for message in messages {
                            store.add_message(black_box(message)).unwrap();
                        }
                        store
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

/// Benchmark acknowledging a backlog, the last subscriber freeing each message.
fn bench_acknowledge(c: &mut Criterion) {
    let mut group = c.benchmark_group("acknowledge");

    for subscribers in [1usize, 4].iter() {
        group.throughput(Throughput::Elements(100));
        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            subscribers,
            |b, &subscribers| {
                b.iter_batched(
                    || {
                        let store = memory_topic(subscribers, &bench_config());
                        for message in generate_messages(100, 256) {
                            store.add_message(message).unwrap();
                        }
                        store
                    },
                    |store| {
                        for s in 0..subscribers {
                            let client = subscriber(s);
                            for i in 0..100 {
                                let id = MessageId::from(format!("m{i}"));
                                store.acknowledge(&client, None, black_box(&id)).unwrap();
                            }
                        }
                        store
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

/// Benchmark batch recovery of a backlog in windows of `max_count`.
fn bench_recover_next(c: &mut Criterion) {
    let mut group = c.benchmark_group("recover_next");
    let store = memory_topic(1, &bench_config());
    for message in generate_messages(1000, 256) {
        store.add_message(message).unwrap();
    }
    let client = subscriber(0);

    for window in [10usize, 100].iter() {
        group.throughput(Throughput::Elements(*window as u64));
        group.bench_with_input(BenchmarkId::from_parameter(window), window, |b, &window| {
            b.iter(|| {
                let mut listener = CollectingListener::with_capacity(window);
                let delivered = store.recover_next(&client, None, window, &mut listener).unwrap();
                if delivered < window {
                    store.reset_batching(&client, None).unwrap();
                }
                black_box(delivered);
            });
        });
    }

    group.finish();
}

/// Benchmark durable publishing into a directory-backed topic.
fn bench_file_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_publish");

    // Use smaller sample size for synced writes
    group.sample_size(20);

    for sync in [false, true].iter() {
        group.bench_with_input(BenchmarkId::new("sync", sync), sync, |b, &sync| {
            let temp_dir = TempDir::new().unwrap();
            let adapter =
                PersistenceAdapter::open(temp_dir.path(), StoreConfig::new().sync_on_write(sync))
                    .unwrap();
            let store = adapter.topic_store(BENCH_TOPIC).unwrap();
            store
                .add_subscription(SubscriptionInfo::new("c1", None, BENCH_TOPIC), false)
                .unwrap();
            let mut next = 0u64;

            b.iter(|| {
                let id = format!("f{next}");
                next += 1;
                store
                    .add_message(Message::new(id.as_str(), vec![0u8; 256]))
                    .unwrap();
                store
                    .acknowledge("c1", None, &MessageId::from(id))
                    .unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_publish_fan_out,
    bench_acknowledge,
    bench_recover_next,
    bench_file_publish,
);

criterion_main!(benches);
