//! Topic store façade.

use super::cursor::SubscriberCursor;
use super::listener::RecoveryListener;
use super::reconcile::{reconcile, RecoveryReport};
use super::records::{AckEntry, BatchPosition, ConsumerRef, Message, SubscriptionInfo};
use super::TopicContainers;
use crate::config::StoreConfig;
use crate::container::{KeyedStore, ListContainer, MapContainer, OrderedLog};
use crate::error::{CoreError, CoreResult};
use crate::space::ContainerSpace;
use crate::types::{EntryHandle, MessageId, SubscriptionKey};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Capabilities shared by every message store variant.
pub trait MessageStore: Send + Sync {
    /// Name of the destination this store backs.
    fn destination(&self) -> &str;

    /// Stores a newly published message.
    ///
    /// # Errors
    ///
    /// Returns an error if a write fails. The message is then not stored.
    fn add_message(&self, message: Message) -> CoreResult<()>;

    /// Drops every stored message.
    ///
    /// # Errors
    ///
    /// Returns an error if a write fails.
    fn remove_all_messages(&self) -> CoreResult<()>;

    /// Deletes the store and all of its storage.
    ///
    /// # Errors
    ///
    /// Returns an error if a container cannot be removed.
    fn delete(&self) -> CoreResult<()>;
}

/// Operations of a durable topic store.
///
/// Subscriptions are addressed by client id and optional subscription name.
/// Listeners are called while the topic is locked and must not call back
/// into the same store.
pub trait TopicMessageStore: MessageStore {
    /// Releases the subscriber's reference to `message_id`.
    ///
    /// Unknown subscribers and messages are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if a write fails.
    fn acknowledge(
        &self,
        client_id: &str,
        subscription_name: Option<&str>,
        message_id: &MessageId,
    ) -> CoreResult<()>;

    /// Returns the metadata of a subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the store was deleted.
    fn lookup_subscription(
        &self,
        client_id: &str,
        subscription_name: Option<&str>,
    ) -> CoreResult<Option<SubscriptionInfo>>;

    /// Registers a subscription and opens its cursor.
    ///
    /// Existing metadata is kept. `retroactive` is recorded on new
    /// subscriptions but earlier messages are never delivered.
    ///
    /// # Errors
    ///
    /// Returns an error if a write fails.
    fn add_subscription(&self, info: SubscriptionInfo, retroactive: bool) -> CoreResult<()>;

    /// Removes a subscription and its cursor, releasing every reference the
    /// cursor still held.
    ///
    /// # Errors
    ///
    /// Returns an error if a write fails.
    fn delete_subscription(&self, client_id: &str, subscription_name: Option<&str>) -> CoreResult<()>;

    /// Streams every message in the subscriber's cursor, oldest first, until
    /// the listener returns `false`. Returns the number delivered.
    ///
    /// # Errors
    ///
    /// Returns an error if the store was deleted.
    fn recover_all(
        &self,
        client_id: &str,
        subscription_name: Option<&str>,
        listener: &mut dyn RecoveryListener,
    ) -> CoreResult<usize>;

    /// Streams up to `max_count` messages after the persisted batch position.
    ///
    /// The position is advanced after every delivered message, so a later
    /// call (or a reopened store) continues where this one stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if the position cannot be written.
    fn recover_next(
        &self,
        client_id: &str,
        subscription_name: Option<&str>,
        max_count: usize,
        listener: &mut dyn RecoveryListener,
    ) -> CoreResult<usize>;

    /// Number of unacknowledged messages for the subscriber, 0 if unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the store was deleted.
    fn message_count(&self, client_id: &str, subscription_name: Option<&str>) -> CoreResult<usize>;

    /// Forgets the subscriber's batch position.
    ///
    /// # Errors
    ///
    /// Returns an error if a write fails.
    fn reset_batching(&self, client_id: &str, subscription_name: Option<&str>) -> CoreResult<()>;

    /// Every registered subscription, in registration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store was deleted.
    fn all_subscriptions(&self) -> CoreResult<Vec<SubscriptionInfo>>;

    /// Returns a snapshot of the topic's counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the store was deleted or a journal size cannot be read.
    fn stats(&self) -> CoreResult<TopicStats>;
}

/// Counters of one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicStats {
    /// Topic name.
    pub destination: String,
    /// Stored messages.
    pub messages: usize,
    /// Ack ledger entries.
    pub ack_entries: usize,
    /// Per-subscription counters.
    pub subscriptions: Vec<SubscriptionStats>,
    /// Bytes across every journal of the topic.
    pub journal_bytes: u64,
}

/// Counters of one subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionStats {
    /// Registry key.
    pub key: String,
    /// Unacknowledged messages.
    pub pending: usize,
    /// Persisted batch position, if any.
    pub position: Option<BatchPosition>,
}

/// A durable topic store over a [`ContainerSpace`].
///
/// One mutex serializes every operation, so publish, acknowledge,
/// subscribe and unsubscribe form a single total order per topic.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use topicstore_core::{
///     CollectingListener, DurableTopicStore, MemorySpace, Message, MessageStore,
///     StoreConfig, SubscriptionInfo, TopicMessageStore,
/// };
///
/// let space = Arc::new(MemorySpace::new());
/// let store = DurableTopicStore::open(space, "orders", &StoreConfig::default()).unwrap();
///
/// store.add_subscription(SubscriptionInfo::new("c1", Some("audit"), "orders"), false).unwrap();
/// store.add_message(Message::new("m1", "hello")).unwrap();
///
/// let mut listener = CollectingListener::new();
/// store.recover_next("c1", Some("audit"), 10, &mut listener).unwrap();
/// assert_eq!(listener.ids(), vec!["m1"]);
/// ```
pub struct DurableTopicStore {
    destination: String,
    state: Mutex<Option<TopicState>>,
    recovery: RecoveryReport,
}

impl DurableTopicStore {
    /// Opens the topic `destination` in `space`, creating it if absent.
    ///
    /// With `reconcile_on_open` set, pending counts and references are
    /// repaired before the store is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if a journal cannot be opened or is corrupted.
    pub fn open(
        space: Arc<dyn ContainerSpace>,
        destination: &str,
        config: &StoreConfig,
    ) -> CoreResult<Self> {
        let mut state = TopicState::open(space, destination, config)?;

        let recovery = if config.reconcile_on_open {
            reconcile(&mut state)?
        } else {
            RecoveryReport::default()
        };
        if !recovery.is_clean() {
            tracing::warn!(
                destination,
                repairs = recovery.total_repairs(),
                report = ?recovery,
                "reconciled topic store"
            );
        }

        tracing::info!(
            destination,
            subscriptions = state.cursors.len(),
            messages = state.messages.len(),
            "topic store opened"
        );

        Ok(Self {
            destination: destination.to_string(),
            state: Mutex::new(Some(state)),
            recovery,
        })
    }

    /// Repairs made when this store was opened.
    #[must_use]
    pub fn recovery_report(&self) -> &RecoveryReport {
        &self.recovery
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut TopicState) -> CoreResult<R>) -> CoreResult<R> {
        let mut guard = self.state.lock();
        let state = guard
            .as_mut()
            .ok_or_else(|| CoreError::destination_deleted(&self.destination))?;
        f(state)
    }
}

impl MessageStore for DurableTopicStore {
    fn destination(&self) -> &str {
        &self.destination
    }

    fn add_message(&self, message: Message) -> CoreResult<()> {
        self.with_state(|state| state.add_message(message))
    }

    fn remove_all_messages(&self) -> CoreResult<()> {
        self.with_state(TopicState::remove_all_messages)
    }

    fn delete(&self) -> CoreResult<()> {
        let Some(state) = self.state.lock().take() else {
            return Ok(());
        };
        state.destroy()?;
        tracing::info!(destination = %self.destination, "topic store deleted");
        Ok(())
    }
}

impl TopicMessageStore for DurableTopicStore {
    fn acknowledge(
        &self,
        client_id: &str,
        subscription_name: Option<&str>,
        message_id: &MessageId,
    ) -> CoreResult<()> {
        let key = SubscriptionKey::new(client_id, subscription_name);
        self.with_state(|state| state.acknowledge(&key, message_id))
    }

    fn lookup_subscription(
        &self,
        client_id: &str,
        subscription_name: Option<&str>,
    ) -> CoreResult<Option<SubscriptionInfo>> {
        let key = SubscriptionKey::new(client_id, subscription_name);
        self.with_state(|state| Ok(state.subscriptions.get_by_key(&key).cloned()))
    }

    fn add_subscription(&self, info: SubscriptionInfo, retroactive: bool) -> CoreResult<()> {
        self.with_state(|state| state.add_subscription(info, retroactive))
    }

    fn delete_subscription(&self, client_id: &str, subscription_name: Option<&str>) -> CoreResult<()> {
        let key = SubscriptionKey::new(client_id, subscription_name);
        self.with_state(|state| state.delete_subscription(&key))
    }

    fn recover_all(
        &self,
        client_id: &str,
        subscription_name: Option<&str>,
        listener: &mut dyn RecoveryListener,
    ) -> CoreResult<usize> {
        let key = SubscriptionKey::new(client_id, subscription_name);
        self.with_state(|state| Ok(state.recover_all(&key, listener)))
    }

    fn recover_next(
        &self,
        client_id: &str,
        subscription_name: Option<&str>,
        max_count: usize,
        listener: &mut dyn RecoveryListener,
    ) -> CoreResult<usize> {
        let key = SubscriptionKey::new(client_id, subscription_name);
        self.with_state(|state| state.recover_next(&key, max_count, listener))
    }

    fn message_count(&self, client_id: &str, subscription_name: Option<&str>) -> CoreResult<usize> {
        let key = SubscriptionKey::new(client_id, subscription_name);
        self.with_state(|state| Ok(state.cursors.get(&key).map_or(0, SubscriberCursor::size)))
    }

    fn reset_batching(&self, client_id: &str, subscription_name: Option<&str>) -> CoreResult<()> {
        let key = SubscriptionKey::new(client_id, subscription_name);
        self.with_state(|state| {
            state.positions.remove_key(&key)?;
            Ok(())
        })
    }

    fn all_subscriptions(&self) -> CoreResult<Vec<SubscriptionInfo>> {
        self.with_state(|state| {
            Ok(state
                .subscriptions
                .entries()
                .map(|(_, _, info)| info.clone())
                .collect())
        })
    }

    fn stats(&self) -> CoreResult<TopicStats> {
        self.with_state(|state| state.stats())
    }
}

impl std::fmt::Debug for DurableTopicStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableTopicStore")
            .field("destination", &self.destination)
            .field("deleted", &self.state.lock().is_none())
            .finish_non_exhaustive()
    }
}

/// Everything a topic store mutates under its lock.
pub(super) struct TopicState {
    pub(super) space: Arc<dyn ContainerSpace>,
    pub(super) config: StoreConfig,
    pub(super) names: TopicContainers,
    pub(super) messages: MapContainer<MessageId, Message>,
    pub(super) acks: ListContainer<AckEntry>,
    pub(super) subscriptions: MapContainer<SubscriptionKey, SubscriptionInfo>,
    pub(super) positions: MapContainer<SubscriptionKey, BatchPosition>,
    pub(super) cursors: BTreeMap<SubscriptionKey, SubscriberCursor>,
    /// References taken out of a cursor whose release failed.
    unreleased: Vec<ConsumerRef>,
    /// Cursor logs of deleted subscriptions that could not be removed.
    unremoved: Vec<String>,
}

impl TopicState {
    fn open(space: Arc<dyn ContainerSpace>, destination: &str, config: &StoreConfig) -> CoreResult<Self> {
        let names = TopicContainers::new(destination);

        let messages = MapContainer::open(Arc::clone(&space), &names.messages, config)?;
        let acks = ListContainer::open(Arc::clone(&space), &names.acks, config)?;
        let subscriptions: MapContainer<SubscriptionKey, SubscriptionInfo> =
            MapContainer::open(Arc::clone(&space), &names.subscriptions, config)?;
        let positions = MapContainer::open(Arc::clone(&space), &names.positions, config)?;

        let mut cursors = BTreeMap::new();
        for (_, key, _) in subscriptions.entries() {
            let cursor =
                SubscriberCursor::open(Arc::clone(&space), &names.cursor(key), key.clone(), config)?;
            cursors.insert(key.clone(), cursor);
        }

        Ok(Self {
            space,
            config: config.clone(),
            names,
            messages,
            acks,
            subscriptions,
            positions,
            cursors,
            unreleased: Vec::new(),
            unremoved: Vec::new(),
        })
    }

    /// Finishes work a failed write interrupted.
    ///
    /// Runs before every mutation, so a retried call completes what its
    /// first attempt started.
    fn settle(&mut self) -> CoreResult<()> {
        while let Some(reference) = self.unreleased.last().cloned() {
            self.release(&reference)?;
            self.unreleased.pop();
        }
        while let Some(name) = self.unremoved.last() {
            self.space.remove(name)?;
            self.unremoved.pop();
        }
        Ok(())
    }

    /// Releases a reference already taken out of its cursor.
    ///
    /// On failure the reference is kept for [`Self::settle`].
    fn release_detached(&mut self, reference: ConsumerRef) -> CoreResult<()> {
        if let Err(err) = self.release(&reference) {
            self.unreleased.push(reference);
            return Err(err);
        }
        Ok(())
    }

    fn add_message(&mut self, message: Message) -> CoreResult<()> {
        self.settle()?;
        if self.cursors.is_empty() {
            tracing::info!(message_id = %message.id, "no durable subscribers, message dropped");
            return Ok(());
        }
        if self.messages.contains_key(&message.id) {
            tracing::debug!(message_id = %message.id, "message already stored");
            return Ok(());
        }

        let message_id = message.id.clone();
        let message_entry = self.messages.put(message_id.clone(), message)?;

        let pending = self.cursors.len() as u32;
        let ack_entry = match self.acks.append_last(AckEntry {
            message_entry,
            pending,
        }) {
            Ok(handle) => handle,
            Err(err) => {
                self.undo_publish(message_entry, None, &[]);
                return Err(err);
            }
        };

        let mut placed = Vec::with_capacity(self.cursors.len());
        let mut failure = None;
        for cursor in self.cursors.values_mut() {
            let reference = ConsumerRef {
                ack_entry,
                message_entry,
                message_id: message_id.clone(),
            };
            match cursor.append(reference) {
                Ok(handle) => placed.push((cursor.key().clone(), handle)),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        if let Some(err) = failure {
            self.undo_publish(message_entry, Some(ack_entry), &placed);
            return Err(err);
        }

        tracing::debug!(%message_id, pending, "message published");
        Ok(())
    }

    /// Best-effort removal of a partially published message.
    ///
    /// Whatever cannot be removed here is repaired by reconciliation on the
    /// next open.
    fn undo_publish(
        &mut self,
        message_entry: EntryHandle,
        ack_entry: Option<EntryHandle>,
        placed: &[(SubscriptionKey, EntryHandle)],
    ) {
        let mut clean = true;
        for (key, handle) in placed {
            if let Some(cursor) = self.cursors.get_mut(key) {
                clean &= cursor.remove(*handle).is_ok();
            }
        }
        if let Some(ack_entry) = ack_entry {
            clean &= self.acks.remove(ack_entry).is_ok();
        }
        clean &= self.messages.remove(message_entry).is_ok();

        if !clean {
            tracing::warn!(
                destination = %self.names.topic,
                "partial publish left behind, repaired on next open"
            );
        }
    }

    fn acknowledge(&mut self, key: &SubscriptionKey, message_id: &MessageId) -> CoreResult<()> {
        self.settle()?;
        let Some(cursor) = self.cursors.get_mut(key) else {
            tracing::debug!(subscription = %key, "acknowledge for unknown subscription");
            return Ok(());
        };
        let Some(handle) = cursor.handle_of(message_id) else {
            tracing::debug!(subscription = %key, %message_id, "acknowledge for unknown message");
            return Ok(());
        };

        // The position may not outlive the entry it names.
        let at_position = self
            .positions
            .get_by_key(key)
            .is_some_and(|position| position.entry == handle);
        if at_position || cursor.size() == 1 {
            self.positions.remove_key(key)?;
        }

        match cursor.remove(handle)? {
            Some(reference) => self.release_detached(reference),
            None => Ok(()),
        }
    }

    /// Drops one subscriber's claim on a message.
    ///
    /// The last release deletes the message and then the ack entry, so a
    /// release retried after a failed write finishes the job.
    fn release(&mut self, reference: &ConsumerRef) -> CoreResult<()> {
        let Some(entry) = self.acks.get(reference.ack_entry).copied() else {
            tracing::debug!(message_id = %reference.message_id, "ack entry already released");
            return Ok(());
        };

        if entry.pending <= 1 {
            self.messages.remove(entry.message_entry)?;
            self.acks.remove(reference.ack_entry)?;
            tracing::debug!(message_id = %reference.message_id, "message fully acknowledged");
        } else {
            self.acks.update(
                reference.ack_entry,
                AckEntry {
                    pending: entry.pending - 1,
                    ..entry
                },
            )?;
        }
        Ok(())
    }

    fn add_subscription(&mut self, mut info: SubscriptionInfo, retroactive: bool) -> CoreResult<()> {
        self.settle()?;
        let key = info.key();
        if retroactive {
            tracing::debug!(
                subscription = %key,
                "retroactive delivery unsupported, only new messages are delivered"
            );
        }

        if !self.subscriptions.contains_key(&key) {
            info.retroactive = retroactive;
            self.subscriptions.put(key.clone(), info)?;
            tracing::info!(subscription = %key, "subscription added");
        }

        if !self.cursors.contains_key(&key) {
            let cursor = SubscriberCursor::open(
                Arc::clone(&self.space),
                &self.names.cursor(&key),
                key.clone(),
                &self.config,
            )?;
            self.cursors.insert(key, cursor);
        }
        Ok(())
    }

    fn delete_subscription(&mut self, key: &SubscriptionKey) -> CoreResult<()> {
        self.settle()?;
        self.subscriptions.remove_key(key)?;
        self.positions.remove_key(key)?;

        // Each reference leaves the cursor before it is released, so a retry
        // resumes with the ones still in it.
        let mut released = 0;
        loop {
            let Some(cursor) = self.cursors.get_mut(key) else {
                return Ok(());
            };
            let Some(handle) = cursor.first() else {
                break;
            };
            let Some(reference) = cursor.remove(handle)? else {
                break;
            };
            self.release_detached(reference)?;
            released += 1;
        }

        if let Some(cursor) = self.cursors.remove(key) {
            let name = cursor.name().to_string();
            if let Err(err) = cursor.destroy() {
                self.unremoved.push(name);
                return Err(err);
            }
        }

        tracing::info!(subscription = %key, released, "subscription deleted");
        Ok(())
    }

    fn recover_all(&self, key: &SubscriptionKey, listener: &mut dyn RecoveryListener) -> usize {
        let Some(cursor) = self.cursors.get(key) else {
            return 0;
        };

        let mut delivered = 0;
        for (_, reference) in cursor.iter() {
            let Some(message) = self.messages.get(reference.message_entry) else {
                tracing::warn!(
                    subscription = %key,
                    message_id = %reference.message_id,
                    "message record vanished"
                );
                continue;
            };
            delivered += 1;
            if !listener.accept(message.clone()) {
                break;
            }
        }
        delivered
    }

    fn recover_next(
        &mut self,
        key: &SubscriptionKey,
        max_count: usize,
        listener: &mut dyn RecoveryListener,
    ) -> CoreResult<usize> {
        let Some(cursor) = self.cursors.get(key) else {
            return Ok(0);
        };

        let mut next = match self.positions.get_by_key(key) {
            Some(position) => match resolve_position(cursor, position) {
                Some(handle) => cursor.next(handle),
                None => {
                    tracing::debug!(subscription = %key, "stale batch position, restarting from head");
                    cursor.first()
                }
            },
            None => cursor.first(),
        };

        let mut delivered = 0;
        while let Some(handle) = next {
            if delivered >= max_count || !listener.has_capacity() {
                break;
            }
            next = cursor.next(handle);

            let Some(reference) = cursor.get(handle) else {
                continue;
            };
            let Some(message) = self.messages.get(reference.message_entry) else {
                tracing::warn!(
                    subscription = %key,
                    message_id = %reference.message_id,
                    "message record vanished, resetting batch position"
                );
                self.positions.remove_key(key)?;
                continue;
            };

            let position = BatchPosition {
                entry: handle,
                message_id: reference.message_id.clone(),
            };
            let proceed = listener.accept(message.clone());
            self.positions.put(key.clone(), position)?;
            delivered += 1;
            if !proceed {
                break;
            }
        }
        Ok(delivered)
    }

    fn remove_all_messages(&mut self) -> CoreResult<()> {
        self.settle()?;
        self.messages.clear()?;
        self.acks.clear()?;
        for cursor in self.cursors.values_mut() {
            cursor.clear()?;
        }
        self.positions.clear()?;
        tracing::info!(destination = %self.names.topic, "all messages removed");
        Ok(())
    }

    fn stats(&self) -> CoreResult<TopicStats> {
        let mut journal_bytes = self.messages.stats()?.bytes
            + self.acks.stats()?.bytes
            + self.subscriptions.stats()?.bytes
            + self.positions.stats()?.bytes;

        let mut subscriptions = Vec::with_capacity(self.cursors.len());
        for (_, key, _) in self.subscriptions.entries() {
            let pending = match self.cursors.get(key) {
                Some(cursor) => {
                    journal_bytes += cursor.stats()?.bytes;
                    cursor.size()
                }
                None => 0,
            };
            subscriptions.push(SubscriptionStats {
                key: key.to_string(),
                pending,
                position: self.positions.get_by_key(key).cloned(),
            });
        }

        Ok(TopicStats {
            destination: self.names.topic.clone(),
            messages: self.messages.len(),
            ack_entries: self.acks.size(),
            subscriptions,
            journal_bytes,
        })
    }

    fn destroy(self) -> CoreResult<()> {
        for name in &self.unremoved {
            self.space.remove(name)?;
        }
        self.subscriptions.destroy()?;
        self.positions.destroy()?;
        for cursor in self.cursors.into_values() {
            cursor.destroy()?;
        }
        self.acks.destroy()?;
        self.messages.destroy()
    }
}

/// Returns the position's handle if it still names the same message.
pub(super) fn resolve_position(
    cursor: &SubscriberCursor,
    position: &BatchPosition,
) -> Option<EntryHandle> {
    let handle = cursor.refresh(position.entry)?;
    let reference = cursor.get(handle)?;
    (reference.message_id == position.message_id).then_some(handle)
}
