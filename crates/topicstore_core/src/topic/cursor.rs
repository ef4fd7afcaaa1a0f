//! Per-subscriber cursor.

use super::records::ConsumerRef;
use crate::config::StoreConfig;
use crate::container::{JournalStats, ListContainer, OrderedLog};
use crate::error::CoreResult;
use crate::space::ContainerSpace;
use crate::types::{EntryHandle, MessageId, SubscriptionKey};
use std::collections::HashMap;
use std::sync::Arc;

/// One subscriber's durable, ordered view of the messages it still owes an
/// acknowledgment for.
///
/// The log holds [`ConsumerRef`]s in publication order. An in-memory index
/// from message id to cursor handle makes acknowledgment O(1); it is rebuilt
/// whenever the cursor is opened.
#[derive(Debug)]
pub(crate) struct SubscriberCursor {
    key: SubscriptionKey,
    log: ListContainer<ConsumerRef>,
    by_message: HashMap<MessageId, EntryHandle>,
}

impl SubscriberCursor {
    pub(crate) fn open(
        space: Arc<dyn ContainerSpace>,
        name: &str,
        key: SubscriptionKey,
        config: &StoreConfig,
    ) -> CoreResult<Self> {
        let log: ListContainer<ConsumerRef> = ListContainer::open(space, name, config)?;
        let by_message = log
            .iter()
            .map(|(handle, reference)| (reference.message_id.clone(), handle))
            .collect();
        Ok(Self {
            key,
            log,
            by_message,
        })
    }

    pub(crate) fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    pub(crate) fn name(&self) -> &str {
        self.log.name()
    }

    pub(crate) fn append(&mut self, reference: ConsumerRef) -> CoreResult<EntryHandle> {
        let message_id = reference.message_id.clone();
        let handle = self.log.append_last(reference)?;
        self.by_message.insert(message_id, handle);
        Ok(handle)
    }

    /// Handle of the reference to `message_id`, if this cursor holds one.
    pub(crate) fn handle_of(&self, message_id: &MessageId) -> Option<EntryHandle> {
        self.by_message.get(message_id).copied()
    }

    pub(crate) fn remove(&mut self, handle: EntryHandle) -> CoreResult<Option<ConsumerRef>> {
        let removed = self.log.remove(handle)?;
        if let Some(reference) = &removed {
            self.by_message.remove(&reference.message_id);
        }
        Ok(removed)
    }

    pub(crate) fn get(&self, handle: EntryHandle) -> Option<&ConsumerRef> {
        self.log.get(handle)
    }

    pub(crate) fn refresh(&self, handle: EntryHandle) -> Option<EntryHandle> {
        self.log.refresh(handle)
    }

    pub(crate) fn first(&self) -> Option<EntryHandle> {
        self.log.first()
    }

    pub(crate) fn next(&self, handle: EntryHandle) -> Option<EntryHandle> {
        self.log.next(handle)
    }

    pub(crate) fn size(&self) -> usize {
        self.log.size()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (EntryHandle, &ConsumerRef)> {
        self.log.iter()
    }

    pub(crate) fn stats(&self) -> CoreResult<JournalStats> {
        self.log.stats()
    }

    pub(crate) fn clear(&mut self) -> CoreResult<()> {
        self.log.clear()?;
        self.by_message.clear();
        Ok(())
    }

    pub(crate) fn destroy(self) -> CoreResult<()> {
        self.log.destroy()
    }
}
