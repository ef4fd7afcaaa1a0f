//! Keyed map container.

use super::journal::{Journal, JournalStats};
use super::KeyedStore;
use crate::config::StoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::space::ContainerSpace;
use crate::types::EntryHandle;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// A [`KeyedStore`] persisted as a journal of `(key, value)` entries.
///
/// The key index is rebuilt from the journal on open.
pub struct MapContainer<K, V> {
    journal: Journal<(K, V)>,
    index: HashMap<K, EntryHandle>,
}

impl<K, V> MapContainer<K, V>
where
    K: Serialize + DeserializeOwned + Eq + Hash + Clone,
    V: Serialize + DeserializeOwned,
{
    /// Opens or creates the map `name` in `space`.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal cannot be opened, is corrupted, or
    /// holds the same key under two live handles.
    pub fn open(space: Arc<dyn ContainerSpace>, name: &str, config: &StoreConfig) -> CoreResult<Self> {
        let journal: Journal<(K, V)> = Journal::open(space, name, config)?;

        let mut index = HashMap::with_capacity(journal.len());
        for (handle, (key, _)) in journal.iter() {
            if index.insert(key.clone(), handle).is_some() {
                return Err(CoreError::journal_corruption(
                    name,
                    format!("duplicate key at {handle}"),
                ));
            }
        }

        Ok(Self { journal, index })
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

    /// Deletes the map and its storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the space cannot remove the journal.
    pub fn destroy(self) -> CoreResult<()> {
        self.journal.destroy()
    }
}

impl<K, V> KeyedStore<K, V> for MapContainer<K, V>
where
    K: Serialize + DeserializeOwned + Eq + Hash + Clone,
    V: Serialize + DeserializeOwned,
{
    fn put(&mut self, key: K, value: V) -> CoreResult<EntryHandle> {
        if let Some(&handle) = self.index.get(&key) {
            self.journal.update(handle, (key, value))?;
            return Ok(handle);
        }
        let handle = self.journal.insert((key.clone(), value))?;
        self.index.insert(key, handle);
        Ok(handle)
    }

    fn get(&self, handle: EntryHandle) -> Option<&V> {
        self.journal.get(handle).map(|(_, value)| value)
    }

    fn get_by_key(&self, key: &K) -> Option<&V> {
        self.index.get(key).and_then(|handle| self.get(*handle))
    }

    fn handle_of(&self, key: &K) -> Option<EntryHandle> {
        self.index.get(key).copied()
    }

    fn update(&mut self, handle: EntryHandle, value: V) -> CoreResult<()> {
        let key = self
            .journal
            .get(handle)
            .map(|(key, _)| key.clone())
            .ok_or_else(|| CoreError::entry_not_found(self.journal.name(), handle.0))?;
        self.journal.update(handle, (key, value))
    }

    fn remove(&mut self, handle: EntryHandle) -> CoreResult<Option<(K, V)>> {
        let removed = self.journal.remove(handle)?;
        if let Some((key, _)) = &removed {
            self.index.remove(key);
        }
        Ok(removed)
    }

    fn remove_key(&mut self, key: &K) -> CoreResult<Option<V>> {
        let Some(handle) = self.handle_of(key) else {
            return Ok(None);
        };
        Ok(self.remove(handle)?.map(|(_, value)| value))
    }

    fn refresh(&self, handle: EntryHandle) -> Option<EntryHandle> {
        self.journal.contains(handle).then_some(handle)
    }

    fn clear(&mut self) -> CoreResult<()> {
        self.journal.clear()?;
        self.index.clear();
        Ok(())
    }

    fn len(&self) -> usize {
        self.journal.len()
    }

    fn entries<'a>(&'a self) -> impl Iterator<Item = (EntryHandle, &'a K, &'a V)>
    where
        K: 'a,
        V: 'a,
    {
        self.journal
            .iter()
            .map(|(handle, (key, value))| (handle, key, value))
    }
}

impl<K, V> fmt::Debug for MapContainer<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapContainer")
            .field("name", &self.journal.name())
            .field("len", &self.journal.len())
            .finish()
    }
}
