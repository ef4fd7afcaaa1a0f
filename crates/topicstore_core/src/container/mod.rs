//! Durable containers underneath the topic store.
//!
//! Two container shapes back every topic:
//!
//! - [`KeyedStore`]: records under a key, reachable by key or by handle
//!   ([`MapContainer`]). Used for messages, subscriptions and batch positions.
//! - [`OrderedLog`]: records in insertion order ([`ListContainer`]). Used for
//!   the acknowledgment ledger and each subscriber's cursor.
//!
//! Both are journals in a [`crate::ContainerSpace`]. Every handle a container
//! returns stays valid until its entry is removed; [`OrderedLog::refresh`] and
//! [`KeyedStore::refresh`] tell whether that has happened.

mod journal;
mod list;
mod map;
mod record;

pub use journal::JournalStats;
pub use list::ListContainer;
pub use map::MapContainer;
pub use record::{compute_crc32, JournalRecord, JournalRecordType, JOURNAL_MAGIC, JOURNAL_VERSION};

use crate::error::CoreResult;
use crate::types::EntryHandle;

/// Durable keyed record store.
pub trait KeyedStore<K, V> {
    /// Stores `value` under `key`.
    ///
    /// An existing key is updated in place and keeps its handle.
    fn put(&mut self, key: K, value: V) -> CoreResult<EntryHandle>;

    /// Returns the value at `handle`.
    fn get(&self, handle: EntryHandle) -> Option<&V>;

    /// Returns the value stored under `key`.
    fn get_by_key(&self, key: &K) -> Option<&V>;

    /// Returns the handle of `key`.
    fn handle_of(&self, key: &K) -> Option<EntryHandle>;

    /// Returns whether `key` is present.
    fn contains_key(&self, key: &K) -> bool {
        self.handle_of(key).is_some()
    }

    /// Replaces the value at `handle`, keeping its key.
    ///
    /// # Errors
    ///
    /// `EntryNotFound` if the handle is not live.
    fn update(&mut self, handle: EntryHandle, value: V) -> CoreResult<()>;

    /// Removes the entry at `handle`. Missing handles are a no-op.
    fn remove(&mut self, handle: EntryHandle) -> CoreResult<Option<(K, V)>>;

    /// Removes the entry under `key`. Missing keys are a no-op.
    fn remove_key(&mut self, key: &K) -> CoreResult<Option<V>>;

    /// Re-validates `handle`, returning it while its entry is live.
    fn refresh(&self, handle: EntryHandle) -> Option<EntryHandle>;

    /// Removes every entry.
    fn clear(&mut self) -> CoreResult<()>;

    /// Number of live entries.
    fn len(&self) -> usize;

    /// Returns whether the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates entries in insertion order.
    fn entries<'a>(&'a self) -> impl Iterator<Item = (EntryHandle, &'a K, &'a V)>
    where
        K: 'a,
        V: 'a;
}

/// Durable insertion-ordered log.
pub trait OrderedLog<V> {
    /// Appends `value` after every existing entry.
    fn append_last(&mut self, value: V) -> CoreResult<EntryHandle>;

    /// Returns the value at `handle`.
    fn get(&self, handle: EntryHandle) -> Option<&V>;

    /// Replaces the value at `handle`.
    ///
    /// # Errors
    ///
    /// `EntryNotFound` if the handle is not live.
    fn update(&mut self, handle: EntryHandle, value: V) -> CoreResult<()>;

    /// Removes the entry at `handle`. Missing handles are a no-op.
    fn remove(&mut self, handle: EntryHandle) -> CoreResult<Option<V>>;

    /// Re-validates `handle`, returning it while its entry is live.
    fn refresh(&self, handle: EntryHandle) -> Option<EntryHandle>;

    /// Handle of the oldest entry.
    fn first(&self) -> Option<EntryHandle>;

    /// Handle of the entry after `handle`, which need not be live itself.
    fn next(&self, handle: EntryHandle) -> Option<EntryHandle>;

    /// Number of live entries.
    fn size(&self) -> usize;

    /// Returns whether the log is empty.
    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Removes every entry.
    fn clear(&mut self) -> CoreResult<()>;

    /// Iterates entries oldest first.
    fn iter<'a>(&'a self) -> impl Iterator<Item = (EntryHandle, &'a V)>
    where
        V: 'a;
}
