//! Ordered log container.

use super::journal::{Journal, JournalStats};
use super::OrderedLog;
use crate::config::StoreConfig;
use crate::error::CoreResult;
use crate::space::ContainerSpace;
use crate::types::EntryHandle;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// An [`OrderedLog`] persisted as a journal.
///
/// Handles grow with every append, so handle order is insertion order.
pub struct ListContainer<V> {
    journal: Journal<V>,
}

impl<V> ListContainer<V>
where
    V: Serialize + DeserializeOwned,
{
    /// Opens or creates the log `name` in `space`.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal cannot be opened or is corrupted.
    pub fn open(space: Arc<dyn ContainerSpace>, name: &str, config: &StoreConfig) -> CoreResult<Self> {
        Ok(Self {
            journal: Journal::open(space, name, config)?,
        })
    }

    /// Returns the container name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.journal.name()
    }

    /// Returns journal statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be read.
    pub fn stats(&self) -> CoreResult<JournalStats> {
        self.journal.stats()
    }

    /// Rewrites the journal down to the live entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the replacement cannot be written or swapped in.
    pub fn compact(&mut self) -> CoreResult<()> {
        self.journal.compact()
    }

    /// Deletes the log and its storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the space cannot remove the journal.
    pub fn destroy(self) -> CoreResult<()> {
        self.journal.destroy()
    }
}

impl<V> OrderedLog<V> for ListContainer<V>
where
    V: Serialize + DeserializeOwned,
{
    fn append_last(&mut self, value: V) -> CoreResult<EntryHandle> {
        self.journal.insert(value)
    }

    fn get(&self, handle: EntryHandle) -> Option<&V> {
        self.journal.get(handle)
    }

    fn update(&mut self, handle: EntryHandle, value: V) -> CoreResult<()> {
        self.journal.update(handle, value)
    }

    fn remove(&mut self, handle: EntryHandle) -> CoreResult<Option<V>> {
        self.journal.remove(handle)
    }

    fn refresh(&self, handle: EntryHandle) -> Option<EntryHandle> {
        self.journal.contains(handle).then_some(handle)
    }

    fn first(&self) -> Option<EntryHandle> {
        self.journal.first().map(|(handle, _)| handle)
    }

    fn next(&self, handle: EntryHandle) -> Option<EntryHandle> {
        self.journal.next(handle).map(|(handle, _)| handle)
    }

    fn size(&self) -> usize {
        self.journal.len()
    }

    fn clear(&mut self) -> CoreResult<()> {
        self.journal.clear()
    }

    fn iter<'a>(&'a self) -> impl Iterator<Item = (EntryHandle, &'a V)>
    where
        V: 'a,
    {
        self.journal.iter()
    }
}

impl<V> fmt::Debug for ListContainer<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListContainer")
            .field("name", &self.journal.name())
            .field("size", &self.journal.len())
            .finish()
    }
}
