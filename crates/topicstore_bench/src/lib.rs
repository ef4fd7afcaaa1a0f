//! Benchmark utilities.

use rand::Rng;
use std::sync::Arc;
use topicstore_core::{
    DurableTopicStore, MemorySpace, Message, StoreConfig, SubscriptionInfo, TopicMessageStore,
};

/// Topic every benchmark publishes to.
pub const BENCH_TOPIC: &str = "bench";

/// Generate a random payload of the specified size.
pub fn random_payload(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate `count` messages with sequential ids and random payloads.
pub fn generate_messages(count: usize, payload_size: usize) -> Vec<Message> {
    (0..count)
        .map(|i| Message::new(format!("m{i}"), random_payload(payload_size)))
        .collect()
}

/// Client id of subscriber `i`.
pub fn subscriber(i: usize) -> String {
    format!("client-{i}")
}

/// Opens an in-memory topic with `subscribers` durable subscriptions.
///
/// # Panics
///
/// Panics if the store cannot be opened.
pub fn memory_topic(subscribers: usize, config: &StoreConfig) -> DurableTopicStore {
    let space = Arc::new(MemorySpace::new());
    let store = DurableTopicStore::open(space, BENCH_TOPIC, config).expect("open bench topic");
    for i in 0..subscribers {
        store
            .add_subscription(SubscriptionInfo::new(subscriber(i), None, BENCH_TOPIC), false)
            .expect("subscribe");
    }
    store
}
