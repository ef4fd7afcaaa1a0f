//! Persistence adapter: one container space, many topic stores.

use crate::config::StoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::space::{ContainerSpace, DirectorySpace, MemorySpace};
use crate::topic::{topic_of, DurableTopicStore, MessageStore};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

/// Hands out the topic stores of one container space.
///
/// Each topic is opened at most once; later lookups return the same
/// `Arc<DurableTopicStore>`.
///
/// ```rust
/// use topicstore_core::{PersistenceAdapter, MessageStore};
///
/// let adapter = PersistenceAdapter::open_in_memory();
/// let orders = adapter.topic_store("orders").unwrap();
/// assert_eq!(orders.destination(), "orders");
/// assert_eq!(adapter.topic_names().unwrap(), vec!["orders"]);
/// ```
pub struct PersistenceAdapter {
    space: Arc<dyn ContainerSpace>,
    config: StoreConfig,
    topics: RwLock<HashMap<String, Arc<DurableTopicStore>>>,
}

impl PersistenceAdapter {
    /// Opens a directory-backed adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is missing (and `create_if_missing`
    /// is off), is locked by another process, or cannot be created.
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> CoreResult<Self> {
        let space = DirectorySpace::open(path.as_ref(), config.create_if_missing)?;
        tracing::info!(path = %path.as_ref().display(), "persistence adapter opened");
        Ok(Self::with_space(Arc::new(space), config))
    }

    /// Creates an adapter over a fresh in-memory space.
    #[must_use]
    pub fn open_in_memory() -> Self {
        Self::with_space(Arc::new(MemorySpace::new()), StoreConfig::default())
    }

    /// Creates an adapter over an existing space.
    #[must_use]
    pub fn with_space(space: Arc<dyn ContainerSpace>, config: StoreConfig) -> Self {
        Self {
            space,
            config,
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the underlying space.
    #[must_use]
    pub fn space(&self) -> &Arc<dyn ContainerSpace> {
        &self.space
    }

    /// Returns the configuration topic stores are opened with.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the store for `name`, opening or creating it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTopicName` for unusable names, or any error from
    /// opening the store.
    pub fn topic_store(&self, name: &str) -> CoreResult<Arc<DurableTopicStore>> {
        validate_topic_name(name)?;
        if let Some(store) = self.topics.read().get(name) {
            return Ok(Arc::clone(store));
        }

        let mut topics = self.topics.write();
        if let Some(store) = topics.get(name) {
            return Ok(Arc::clone(store));
        }
        let store = Arc::new(DurableTopicStore::open(
            Arc::clone(&self.space),
            name,
            &self.config,
        )?);
        topics.insert(name.to_string(), Arc::clone(&store));
        Ok(store)
    }

    /// Creates the store for a topic that must not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `DestinationAlreadyExists` if the topic is open or has
    /// journals in the space.
    pub fn create_topic_store(&self, name: &str) -> CoreResult<Arc<DurableTopicStore>> {
        validate_topic_name(name)?;
        if self.topic_names()?.iter().any(|topic| topic == name) {
            return Err(CoreError::destination_already_exists(name));
        }
        self.topic_store(name)
    }

    /// Names of every topic that is open or has journals in the space, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the space cannot be listed.
    pub fn topic_names(&self) -> CoreResult<Vec<String>> {
        let mut names: BTreeSet<String> = self.topics.read().keys().cloned().collect();
        for container in self.space.names()? {
            if let Some(topic) = topic_of(&container) {
                names.insert(topic.to_string());
            }
        }
        Ok(names.into_iter().collect())
    }

    /// Deletes a topic and every journal it owns.
    ///
    /// Returns whether the topic existed. Handles to the deleted store that
    /// are still held fail with `DestinationDeleted`.
    ///
    /// # Errors
    ///
    /// Returns an error if a journal cannot be removed.
    pub fn delete_topic_store(&self, name: &str) -> CoreResult<bool> {
        validate_topic_name(name)?;
        let open = self.topics.write().remove(name);
        let mut existed = false;
        if let Some(store) = open {
            store.delete()?;
            existed = true;
        }

        for container in self.space.names()? {
            if topic_of(&container) == Some(name) {
                self.space.remove(&container)?;
                existed = true;
            }
        }

        if existed {
            tracing::info!(destination = name, "topic deleted");
        }
        Ok(existed)
    }
}

impl std::fmt::Debug for PersistenceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceAdapter")
            .field("space", &self.space)
            .field("open_topics", &self.topics.read().len())
            .finish_non_exhaustive()
    }
}

fn validate_topic_name(name: &str) -> CoreResult<()> {
    if name.is_empty() || name.contains('/') {
        return Err(CoreError::InvalidTopicName {
            name: name.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topic::{Message, SubscriptionInfo, TopicMessageStore};
    use tempfile::tempdir;

    #[test]
    fn topic_store_is_shared() {
        let adapter = PersistenceAdapter::open_in_memory();
        let first = adapter.topic_store("orders").unwrap();
        let second = adapter.topic_store("orders").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn invalid_topic_names_rejected() {
        let adapter = PersistenceAdapter::open_in_memory();
        assert!(matches!(
            adapter.topic_store(""),
            Err(CoreError::InvalidTopicName { .. })
        ));
        assert!(matches!(
            adapter.topic_store("a/b"),
            Err(CoreError::InvalidTopicName { .. })
        ));
    }

    #[test]
    fn create_existing_topic_fails() {
        let adapter = PersistenceAdapter::open_in_memory();
        adapter.create_topic_store("orders").unwrap();
        assert!(matches!(
            adapter.create_topic_store("orders"),
            Err(CoreError::DestinationAlreadyExists { .. })
        ));
    }

    #[test]
    fn delete_topic_removes_journals() {
        let adapter = PersistenceAdapter::open_in_memory();
        let store = adapter.topic_store("orders").unwrap();
        store
            .add_subscription(SubscriptionInfo::new("c", None, "orders"), false)
            .unwrap();
        store.add_message(Message::new("m1", "x")).unwrap();
        adapter.topic_store("billing").unwrap();

        assert!(adapter.delete_topic_store("orders").unwrap());
        assert!(!adapter.delete_topic_store("orders").unwrap());
        assert_eq!(adapter.topic_names().unwrap(), vec!["billing"]);
        assert!(store.stats().is_err());
    }

    #[test]
    fn directory_topics_listed_after_reopen() {
        let temp = tempdir().unwrap();
        {
            let adapter = PersistenceAdapter::open(temp.path(), StoreConfig::default()).unwrap();
            adapter.topic_store("orders").unwrap();
            adapter.topic_store("billing").unwrap();
        }

        let adapter = PersistenceAdapter::open(temp.path(), StoreConfig::default()).unwrap();
        assert_eq!(adapter.topic_names().unwrap(), vec!["billing", "orders"]);
    }
}
