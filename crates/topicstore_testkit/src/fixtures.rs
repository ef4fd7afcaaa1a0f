//! Test fixtures and topic helpers.
//!
//! Provides a topic store with automatic cleanup that can be dropped and
//! reopened over the same storage, plus shorthand for the common calls.

use std::sync::Arc;
use tempfile::TempDir;
use topicstore_core::{
    CollectingListener, ContainerSpace, DirectorySpace, DurableTopicStore, MemorySpace, Message,
    MessageId, MessageStore, StoreConfig, SubscriptionInfo, TopicMessageStore,
};

/// Topic name used by fixtures.
pub const TEST_TOPIC: &str = "test-topic";

/// Subscription name fixtures use for every client.
pub const TEST_SUBSCRIPTION: &str = "durable";

enum Home {
    Memory(Arc<MemorySpace>),
    Directory(TempDir),
}

/// A test topic store with automatic cleanup.
pub struct TestTopic {
    /// The topic store.
    pub store: DurableTopicStore,
    home: Home,
    config: StoreConfig,
}

impl TestTopic {
    /// Creates a topic over a fresh memory space.
    pub fn memory() -> Self {
        Self::memory_with_config(StoreConfig::default())
    }

    /// Creates a topic over a fresh memory space with `config`.
    pub fn memory_with_config(config: StoreConfig) -> Self {
        let space = Arc::new(MemorySpace::new());
        let store = open_store(space.clone(), &config);
        Self {
            store,
            home: Home::Memory(space),
            config,
        }
    }

    /// Creates a topic in a fresh temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = StoreConfig::default();
        let space = DirectorySpace::open(temp_dir.path(), true).expect("Failed to open space");
        let store = open_store(Arc::new(space), &config);
        Self {
            store,
            home: Home::Directory(temp_dir),
            config,
        }
    }

    /// Drops the store and opens it again over the same storage.
    pub fn reopen(self) -> Self {
        let Self {
            store,
            home,
            config,
        } = self;
        drop(store);

        let store = match &home {
            Home::Memory(space) => open_store(space.clone(), &config),
            Home::Directory(dir) => {
                let space = DirectorySpace::open(dir.path(), false).expect("Failed to reopen space");
                open_store(Arc::new(space), &config)
            }
        };
        Self {
            store,
            home,
            config,
        }
    }

    /// Returns the memory space, if this topic lives in memory.
    pub fn memory_space(&self) -> Option<Arc<MemorySpace>> {
        match &self.home {
            Home::Memory(space) => Some(space.clone()),
            Home::Directory(_) => None,
        }
    }

    /// Subscribes `client` under [`TEST_SUBSCRIPTION`].
    pub fn subscribe(&self, client: &str) {
        self.store
            .add_subscription(
                SubscriptionInfo::new(client, Some(TEST_SUBSCRIPTION), TEST_TOPIC),
                false,
            )
            .expect("Failed to subscribe");
    }

    /// Unsubscribes `client`.
    pub fn unsubscribe(&self, client: &str) {
        self.store
            .delete_subscription(client, Some(TEST_SUBSCRIPTION))
            .expect("Failed to unsubscribe");
    }

    /// Publishes a message with id `id`.
    pub fn publish(&self, id: &str) {
        self.store
            .add_message(Message::new(id, format!("payload of {id}")))
            .expect("Failed to publish");
    }

    /// Acknowledges `id` for `client`.
    pub fn ack(&self, client: &str, id: &str) {
        self.store
            .acknowledge(client, Some(TEST_SUBSCRIPTION), &MessageId::from(id))
            .expect("Failed to acknowledge");
    }

    /// Ids of every message pending for `client`, oldest first.
    pub fn recover_all_ids(&self, client: &str) -> Vec<String> {
        let mut listener = CollectingListener::new();
        self.store
            .recover_all(client, Some(TEST_SUBSCRIPTION), &mut listener)
            .expect("Failed to recover");
        listener.ids()
    }

    /// Ids delivered by one `recover_next` call for `client`.
    pub fn recover_next_ids(&self, client: &str, max_count: usize) -> Vec<String> {
        let mut listener = CollectingListener::new();
        self.store
            .recover_next(client, Some(TEST_SUBSCRIPTION), max_count, &mut listener)
            .expect("Failed to recover");
        listener.ids()
    }

    /// Pending message count for `client`.
    pub fn pending(&self, client: &str) -> usize {
        self.store
            .message_count(client, Some(TEST_SUBSCRIPTION))
            .expect("Failed to count")
    }
}

impl std::ops::Deref for TestTopic {
    type Target = DurableTopicStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

fn open_store(space: Arc<dyn ContainerSpace>, config: &StoreConfig) -> DurableTopicStore {
    DurableTopicStore::open(space, TEST_TOPIC, config).expect("Failed to open topic store")
}

/// Runs a test with a temporary in-memory topic.
///
/// # Example
///
/// ```rust
/// use topicstore_testkit::with_memory_topic;
///
/// with_memory_topic(|topic| {
///     topic.subscribe("a");
///     topic.publish("m1");
///     assert_eq!(topic.pending("a"), 1);
/// });
/// ```
pub fn with_memory_topic<F, R>(f: F) -> R
where
    F: FnOnce(&TestTopic) -> R,
{
    let topic = TestTopic::memory();
    f(&topic)
}

/// Runs a test with a temporary directory-backed topic.
pub fn with_file_topic<F, R>(f: F) -> R
where
    F: FnOnce(&TestTopic) -> R,
{
    let topic = TestTopic::file();
    f(&topic)
}
