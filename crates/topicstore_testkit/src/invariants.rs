//! Structural invariant checks over a topic's containers.
//!
//! The checker opens the containers of a topic directly, so it sees exactly
//! what a restart would replay. Use it on a memory space (which can be read
//! while a store is open) or after dropping the store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use topicstore_core::container::{KeyedStore, ListContainer, MapContainer, OrderedLog};
use topicstore_core::topic::{AckEntry, ConsumerRef, TopicContainers};
use topicstore_core::{
    ContainerSpace, CoreResult, EntryHandle, Message, MessageId, StoreConfig, SubscriptionInfo,
    SubscriptionKey,
};

/// Counts read from a topic's containers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicCensus {
    /// Stored messages.
    pub messages: usize,
    /// Ack entries.
    pub ack_entries: usize,
    /// Live references per subscription.
    pub refs: HashMap<String, usize>,
    /// Violated invariants, one line each.
    pub violations: Vec<String>,
}

impl TopicCensus {
    /// Returns whether every invariant holds.
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Reads `topic` from `space` and checks its reference-count invariants.
///
/// Checked:
/// - every reference names a live ack entry with a positive pending count
/// - a message is stored iff an ack entry references it
/// - each ack entry's pending count equals the references to it
/// - references in a cursor are in publication order
///
/// # Errors
///
/// Returns an error if a container cannot be opened.
pub fn census(space: Arc<dyn ContainerSpace>, topic: &str) -> CoreResult<TopicCensus> {
    let names = TopicContainers::new(topic);
    let config = StoreConfig::default();

    let messages: MapContainer<MessageId, Message> =
        MapContainer::open(Arc::clone(&space), &names.messages, &config)?;
    let acks: ListContainer<AckEntry> = ListContainer::open(Arc::clone(&space), &names.acks, &config)?;
    let subscriptions: MapContainer<SubscriptionKey, SubscriptionInfo> =
        MapContainer::open(Arc::clone(&space), &names.subscriptions, &config)?;

    let mut census = TopicCensus {
        messages: messages.len(),
        ack_entries: acks.size(),
        ..TopicCensus::default()
    };
    let mut refs_per_ack: HashMap<EntryHandle, u32> = HashMap::new();

    for (_, key, _) in subscriptions.entries() {
        let cursor: ListContainer<ConsumerRef> =
            ListContainer::open(Arc::clone(&space), &names.cursor(key), &config)?;

        let mut last_ack: Option<EntryHandle> = None;
        for (handle, reference) in cursor.iter() {
            match acks.get(reference.ack_entry) {
                Some(entry) if entry.pending > 0 => {}
                Some(_) => census
                    .violations
                    .push(format!("{key}: {handle} references an ack entry with no pending count")),
                None => census
                    .violations
                    .push(format!("{key}: {handle} references a missing ack entry")),
            }
            if last_ack.is_some_and(|last| last >= reference.ack_entry) {
                census
                    .violations
                    .push(format!("{key}: {handle} is out of publication order"));
            }
            last_ack = Some(reference.ack_entry);
            *refs_per_ack.entry(reference.ack_entry).or_default() += 1;
        }
        census.refs.insert(key.to_string(), cursor.size());
    }

    let mut referenced = HashSet::new();
    for (handle, entry) in acks.iter() {
        referenced.insert(entry.message_entry);
        if messages.get(entry.message_entry).is_none() {
            census
                .violations
                .push(format!("ack {handle} references a missing message"));
        }
        let live = refs_per_ack.get(&handle).copied().unwrap_or(0);
        if live != entry.pending {
            census.violations.push(format!(
                "ack {handle} pending {} but {live} references",
                entry.pending
            ));
        }
    }

    for (handle, id, _) in messages.entries() {
        if !referenced.contains(&handle) {
            census
                .violations
                .push(format!("message {id} at {handle} has no ack entry"));
        }
    }

    Ok(census)
}
