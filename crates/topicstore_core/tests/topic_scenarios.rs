//! End-to-end topic store scenarios.

use std::sync::Arc;
use tempfile::tempdir;
use topicstore_core::container::{ListContainer, OrderedLog};
use topicstore_core::topic::{AckEntry, ConsumerRef, TopicContainers};
use topicstore_core::{
    CollectingListener, ContainerSpace, DurableTopicStore, MemorySpace, Message, MessageId,
    MessageStore, PersistenceAdapter, StoreConfig, SubscriptionInfo, SubscriptionKey,
    TopicMessageStore,
};

const TOPIC: &str = "orders";

fn open_store(space: &Arc<MemorySpace>) -> DurableTopicStore {
    let space: Arc<dyn ContainerSpace> = space.clone();
    DurableTopicStore::open(space, TOPIC, &StoreConfig::default()).unwrap()
}

fn subscribe(store: &DurableTopicStore, client: &str) {
    store
        .add_subscription(SubscriptionInfo::new(client, Some("sub"), TOPIC), false)
        .unwrap();
}

fn recover_all(store: &DurableTopicStore, client: &str) -> Vec<String> {
    let mut listener = CollectingListener::new();
    store.recover_all(client, Some("sub"), &mut listener).unwrap();
    listener.ids()
}

fn recover_next(store: &DurableTopicStore, client: &str, max: usize) -> Vec<String> {
    let mut listener = CollectingListener::new();
    store.recover_next(client, Some("sub"), max, &mut listener).unwrap();
    listener.ids()
}

fn ack(store: &DurableTopicStore, client: &str, id: &str) {
    store
        .acknowledge(client, Some("sub"), &MessageId::from(id))
        .unwrap();
}

#[test]
fn two_subscribers_share_one_message() {
    let space = Arc::new(MemorySpace::new());
    let store = open_store(&space);
    subscribe(&store, "a");
    subscribe(&store, "b");

    store.add_message(Message::new("m1", "payload")).unwrap();
    let stats = store.stats().unwrap();
    assert_eq!(stats.messages, 1);
    assert_eq!(stats.ack_entries, 1);

    assert_eq!(recover_all(&store, "a"), vec!["m1"]);
    assert_eq!(recover_all(&store, "b"), vec!["m1"]);

    ack(&store, "a", "m1");
    assert_eq!(store.stats().unwrap().messages, 1);
    ack(&store, "b", "m1");

    let stats = store.stats().unwrap();
    assert_eq!(stats.messages, 0);
    assert_eq!(stats.ack_entries, 0);
}

#[test]
fn late_subscriber_sees_only_later_messages() {
    let space = Arc::new(MemorySpace::new());
    let store = open_store(&space);

    subscribe(&store, "a");
    store.add_message(Message::new("m1", "x")).unwrap();
    subscribe(&store, "b");
    store.add_message(Message::new("m2", "y")).unwrap();

    assert_eq!(recover_all(&store, "b"), vec!["m2"]);
    assert_eq!(recover_next(&store, "b", 10), vec!["m2"]);
    assert_eq!(recover_all(&store, "a"), vec!["m1", "m2"]);
}

#[test]
fn retroactive_flag_does_not_replay_history() {
    let space = Arc::new(MemorySpace::new());
    let store = open_store(&space);
    subscribe(&store, "a");
    store.add_message(Message::new("m1", "x")).unwrap();

    store
        .add_subscription(SubscriptionInfo::new("b", Some("sub"), TOPIC), true)
        .unwrap();

    assert!(recover_all(&store, "b").is_empty());
    let info = store.lookup_subscription("b", Some("sub")).unwrap().unwrap();
    assert!(info.retroactive);
}

#[test]
fn batch_recovery_resumes_after_reload() {
    let space = Arc::new(MemorySpace::new());
    {
        let store = open_store(&space);
        subscribe(&store, "a");
        for id in ["m1", "m2", "m3"] {
            store.add_message(Message::new(id, "x")).unwrap();
        }

        assert_eq!(recover_next(&store, "a", 1), vec!["m1"]);
        assert_eq!(recover_next(&store, "a", 1), vec!["m2"]);
    }

    let store = open_store(&space);
    assert!(store.recovery_report().is_clean());
    assert_eq!(recover_next(&store, "a", 1), vec!["m3"]);
    assert!(recover_next(&store, "a", 1).is_empty());
}

#[test]
fn unsubscribe_releases_outstanding_references() {
    let space = Arc::new(MemorySpace::new());
    let store = open_store(&space);
    subscribe(&store, "a");
    subscribe(&store, "b");
    store.add_message(Message::new("m1", "x")).unwrap();

    store.delete_subscription("a", Some("sub")).unwrap();

    assert!(store.lookup_subscription("a", Some("sub")).unwrap().is_none());
    assert_eq!(store.message_count("a", Some("sub")).unwrap(), 0);
    let stats = store.stats().unwrap();
    assert_eq!(stats.messages, 1);
    assert_eq!(stats.ack_entries, 1);

    let names = TopicContainers::new(TOPIC);
    let cursor = names.cursor(&SubscriptionKey::new("a", Some("sub")));
    assert!(!space.names().unwrap().contains(&cursor));

    ack(&store, "b", "m1");
    assert_eq!(store.stats().unwrap().messages, 0);
}

#[test]
fn reset_batching_redelivers_from_head() {
    let space = Arc::new(MemorySpace::new());
    let store = open_store(&space);
    subscribe(&store, "a");
    for id in ["m1", "m2", "m3"] {
        store.add_message(Message::new(id, "x")).unwrap();
    }

    assert_eq!(recover_next(&store, "a", 2), vec!["m1", "m2"]);
    store.reset_batching("a", Some("sub")).unwrap();
    assert_eq!(recover_next(&store, "a", 10), vec!["m1", "m2", "m3"]);
}

#[test]
fn acknowledging_twice_matches_once() {
    let space = Arc::new(MemorySpace::new());
    let store = open_store(&space);
    subscribe(&store, "a");
    subscribe(&store, "b");
    store.add_message(Message::new("m1", "x")).unwrap();

    ack(&store, "a", "m1");
    let once = store.stats().unwrap();
    ack(&store, "a", "m1");
    ack(&store, "a", "never-published");
    ack(&store, "nobody", "m1");

    let twice = store.stats().unwrap();
    assert_eq!(once.messages, twice.messages);
    assert_eq!(once.ack_entries, twice.ack_entries);
    assert_eq!(once.subscriptions, twice.subscriptions);
}

#[test]
fn acknowledging_the_batch_position_restarts_from_head() {
    let space = Arc::new(MemorySpace::new());
    let store = open_store(&space);
    subscribe(&store, "a");
    for id in ["m1", "m2", "m3"] {
        store.add_message(Message::new(id, "x")).unwrap();
    }

    assert_eq!(recover_next(&store, "a", 2), vec!["m1", "m2"]);
    ack(&store, "a", "m1");
    ack(&store, "a", "m2");

    assert_eq!(recover_next(&store, "a", 10), vec!["m3"]);
}

#[test]
fn partial_fan_out_is_reconciled_on_open() {
    let space = Arc::new(MemorySpace::new());
    {
        let store = open_store(&space);
        subscribe(&store, "a");
        subscribe(&store, "b");
        store.add_message(Message::new("m1", "x")).unwrap();
    }

    // Simulate the crash: b's reference never reached its cursor.
    let names = TopicContainers::new(TOPIC);
    {
        let dyn_space: Arc<dyn ContainerSpace> = space.clone();
        let cursor_name = names.cursor(&SubscriptionKey::new("b", Some("sub")));
        let mut cursor: ListContainer<ConsumerRef> =
            ListContainer::open(dyn_space, &cursor_name, &StoreConfig::default()).unwrap();
        cursor.clear().unwrap();
    }

    let store = open_store(&space);
    assert_eq!(store.recovery_report().corrected_counts, 1);
    assert_eq!(recover_all(&store, "b"), Vec::<String>::new());

    ack(&store, "a", "m1");
    assert_eq!(store.stats().unwrap().messages, 0);
}

#[test]
fn unreferenced_ack_entry_is_released_on_open() {
    let space = Arc::new(MemorySpace::new());
    {
        let store = open_store(&space);
        subscribe(&store, "a");
        store.add_message(Message::new("m1", "x")).unwrap();
        ack(&store, "a", "m1");
        store.add_message(Message::new("m2", "x")).unwrap();
    }

    let names = TopicContainers::new(TOPIC);
    {
        let dyn_space: Arc<dyn ContainerSpace> = space.clone();
        let cursor_name = names.cursor(&SubscriptionKey::new("a", Some("sub")));
        let mut cursor: ListContainer<ConsumerRef> =
            ListContainer::open(dyn_space, &cursor_name, &StoreConfig::default()).unwrap();
        cursor.clear().unwrap();
    }

    let store = open_store(&space);
    let report = *store.recovery_report();
    assert_eq!(report.released_entries, 1);
    let stats = store.stats().unwrap();
    assert_eq!(stats.messages, 0);
    assert_eq!(stats.ack_entries, 0);

    let dyn_space: Arc<dyn ContainerSpace> = space.clone();
    drop(store);
    let acks: ListContainer<AckEntry> =
        ListContainer::open(dyn_space, &names.acks, &StoreConfig::default()).unwrap();
    assert!(acks.is_empty());
}

#[test]
fn directory_store_survives_reopen() {
    let temp = tempdir().unwrap();
    {
        let adapter = PersistenceAdapter::open(temp.path(), StoreConfig::default()).unwrap();
        let store = adapter.topic_store(TOPIC).unwrap();
        subscribe(&store, "a");
        subscribe(&store, "b");
        for id in ["m1", "m2"] {
            store.add_message(Message::new(id, "x")).unwrap();
        }
        ack(&store, "a", "m1");
        assert_eq!(recover_next(&store, "b", 1), vec!["m1"]);
    }

    let adapter = PersistenceAdapter::open(temp.path(), StoreConfig::default()).unwrap();
    let store = adapter.topic_store(TOPIC).unwrap();
    assert!(store.recovery_report().is_clean());
    assert_eq!(recover_all(&store, "a"), vec!["m2"]);
    assert_eq!(recover_next(&store, "b", 10), vec!["m2"]);

    let stats = store.stats().unwrap();
    assert_eq!(stats.messages, 2);
    assert_eq!(stats.subscriptions.len(), 2);
}

#[test]
fn compaction_keeps_stores_consistent() {
    let space = Arc::new(MemorySpace::new());
    let dyn_space: Arc<dyn ContainerSpace> = space.clone();
    let config = StoreConfig::new().compaction_min_dead(8).compaction_ratio(0.5);
    {
        let store = DurableTopicStore::open(Arc::clone(&dyn_space), TOPIC, &config).unwrap();
        subscribe(&store, "a");
        for i in 0..50 {
            let id = format!("m{i}");
            store.add_message(Message::new(id.as_str(), "x")).unwrap();
            if i % 5 != 0 {
                ack(&store, "a", &id);
            }
        }
        assert_eq!(recover_next(&store, "a", 3), vec!["m0", "m5", "m10"]);
    }

    let store = DurableTopicStore::open(dyn_space, TOPIC, &config).unwrap();
    assert!(store.recovery_report().is_clean());
    assert_eq!(store.message_count("a", Some("sub")).unwrap(), 10);
    assert_eq!(recover_next(&store, "a", 2), vec!["m15", "m20"]);
}
