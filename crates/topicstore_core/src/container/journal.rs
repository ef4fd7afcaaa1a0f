//! Append-only container journal.
//!
//! A journal owns one backend from a [`ContainerSpace`] and keeps the live
//! entries of its container in memory. Every mutation is appended to the
//! backend before the in-memory index changes, so the index never runs ahead
//! of what a reopen would replay.
//!
//! ## Replay
//!
//! Records are read front to back. A record cut short by the end of the
//! backend is a torn write: replay stops there and the tail is truncated.
//! Anything else that does not parse is corruption and fails the open.

use crate::config::StoreConfig;
use crate::container::record::{verify_crc, JournalRecord, RecordHeader, HEADER_SIZE};
use crate::error::{CoreError, CoreResult};
use crate::space::ContainerSpace;
use crate::types::EntryHandle;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use topicstore_storage::StorageBackend;

/// Journal statistics, used by compaction and the CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JournalStats {
    /// Live entries.
    pub live: usize,
    /// Mutation records currently in the journal.
    pub records: usize,
    /// Journal size in bytes.
    pub bytes: u64,
}

impl JournalStats {
    /// Records that no longer describe a live entry.
    #[must_use]
    pub fn dead(&self) -> usize {
        self.records.saturating_sub(self.live)
    }
}

/// The journal behind one named container.
pub(crate) struct Journal<T> {
    name: String,
    space: Arc<dyn ContainerSpace>,
    backend: Box<dyn StorageBackend>,
    entries: BTreeMap<u64, T>,
    next_handle: u64,
    records: usize,
    config: StoreConfig,
    /// Set when the backend may hold bytes the index does not reflect.
    poisoned: bool,
}

impl<T> Journal<T> {
    /// Returns the container name.
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn get(&self, handle: EntryHandle) -> Option<&T> {
        self.entries.get(&handle.0)
    }

    pub(crate) fn contains(&self, handle: EntryHandle) -> bool {
        self.entries.contains_key(&handle.0)
    }

    pub(crate) fn first(&self) -> Option<(EntryHandle, &T)> {
        self.entries
            .iter()
            .next()
            .map(|(handle, value)| (EntryHandle(*handle), value))
    }

    /// Returns the first live entry after `handle`.
    ///
    /// `handle` itself need not be live.
    pub(crate) fn next(&self, handle: EntryHandle) -> Option<(EntryHandle, &T)> {
        self.entries
            .range((Bound::Excluded(handle.0), Bound::Unbounded))
            .next()
            .map(|(handle, value)| (EntryHandle(*handle), value))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates live entries in handle order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (EntryHandle, &T)> + '_ {
        self.entries
            .iter()
            .map(|(handle, value)| (EntryHandle(*handle), value))
    }
}

impl<T> Journal<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Opens the container `name` in `space`, replaying its journal.
    pub(crate) fn open(
        space: Arc<dyn ContainerSpace>,
        name: &str,
        config: &StoreConfig,
    ) -> CoreResult<Self> {
        let mut backend = space.open(name)?;
        let replayed = replay(name, backend.as_ref())?;

        let size = backend.size()?;
        if replayed.valid_end < size {
            tracing::warn!(
                container = name,
                offset = replayed.valid_end,
                discarded = size - replayed.valid_end,
                "truncating torn journal tail"
            );
            backend.truncate(replayed.valid_end)?;
        }

        tracing::debug!(
            container = name,
            live = replayed.entries.len(),
            records = replayed.records,
            "journal opened"
        );

        Ok(Self {
            name: name.to_string(),
            space,
            backend,
            entries: replayed.entries,
            next_handle: replayed.next_handle,
            records: replayed.records,
            config: config.clone(),
            poisoned: false,
        })
    }

    /// Stores `value` under a fresh handle.
    pub(crate) fn insert(&mut self, value: T) -> CoreResult<EntryHandle> {
        let handle = self.next_handle;
        let body = topicstore_codec::to_cbor(&value)?;
        self.append(&JournalRecord::Put { handle, body })?;

        self.next_handle += 1;
        self.entries.insert(handle, value);
        Ok(EntryHandle(handle))
    }

    /// Replaces the entry at `handle`.
    ///
    /// Fails with `EntryNotFound` if the handle is not live.
    pub(crate) fn update(&mut self, handle: EntryHandle, value: T) -> CoreResult<()> {
        if !self.entries.contains_key(&handle.0) {
            return Err(CoreError::entry_not_found(&self.name, handle.0));
        }
        let body = topicstore_codec::to_cbor(&value)?;
        self.append(&JournalRecord::Update {
            handle: handle.0,
            body,
        })?;

        self.entries.insert(handle.0, value);
        self.maybe_compact();
        Ok(())
    }

    /// Removes the entry at `handle`, returning it. Missing handles are a no-op.
    pub(crate) fn remove(&mut self, handle: EntryHandle) -> CoreResult<Option<T>> {
        if !self.entries.contains_key(&handle.0) {
            return Ok(None);
        }
        self.append(&JournalRecord::Remove { handle: handle.0 })?;

        let removed = self.entries.remove(&handle.0);
        self.maybe_compact();
        Ok(removed)
    }

    /// Removes every entry. Handles keep counting from where they were.
    pub(crate) fn clear(&mut self) -> CoreResult<()> {
        if self.entries.is_empty() {
            return Ok(());
        }
        self.append(&JournalRecord::Clear)?;

        self.entries.clear();
        self.maybe_compact();
        Ok(())
    }

    pub(crate) fn stats(&self) -> CoreResult<JournalStats> {
        Ok(JournalStats {
            live: self.entries.len(),
            records: self.records,
            bytes: self.backend.size()?,
        })
    }

    /// Rewrites the journal so it holds only the live entries.
    ///
    /// The handle counter is written first, so handles are never reused after
    /// the dead records that advanced it are gone.
    pub(crate) fn compact(&mut self) -> CoreResult<()> {
        self.ensure_writable()?;
        let before = self.stats()?;

        let mut data = JournalRecord::Meta {
            next_handle: self.next_handle,
        }
        .frame()?;
        for (handle, value) in &self.entries {
            let body = topicstore_codec::to_cbor(value)?;
            data.extend_from_slice(
                &JournalRecord::Put {
                    handle: *handle,
                    body,
                }
                .frame()?,
            );
        }

        let mut staged = self.space.create_replacement(&self.name)?;
        staged.append(&data)?;
        staged.flush()?;
        staged.sync()?;
        drop(staged);

        // Past this point the open backend may name the replaced file.
        let reopened = self
            .space
            .commit_replacement(&self.name)
            .and_then(|()| self.space.open(&self.name));
        match reopened {
            Ok(backend) => self.backend = backend,
            Err(err) => {
                tracing::warn!(
                    container = %self.name,
                    error = %err,
                    "compacted journal not reopened, refusing writes until reopen"
                );
                self.poisoned = true;
                return Err(err);
            }
        }
        self.records = self.entries.len();

        tracing::info!(
            container = %self.name,
            live = self.entries.len(),
            reclaimed_records = before.dead(),
            bytes_before = before.bytes,
            bytes_after = data.len(),
            "compacted journal"
        );
        Ok(())
    }

    /// Drops the journal and deletes its storage from the space.
    pub(crate) fn destroy(self) -> CoreResult<()> {
        let Self {
            name,
            space,
            backend,
            ..
        } = self;
        drop(backend);
        space.remove(&name)
    }

    fn append(&mut self, record: &JournalRecord) -> CoreResult<()> {
        self.ensure_writable()?;
        let framed = record.frame()?;
        let end = self.backend.size()?;

        if let Err(err) = self.write_framed(&framed) {
            self.roll_back(end);
            return Err(err);
        }

        self.records += 1;
        Ok(())
    }

    /// Cuts the backend back to `end` after a failed append.
    ///
    /// If the cut fails and bytes past `end` remain, the next record would
    /// land behind a torn frame, so the journal is poisoned instead.
    fn roll_back(&mut self, end: u64) {
        let Err(rollback) = self.backend.truncate(end) else {
            return;
        };
        if matches!(self.backend.size(), Ok(size) if size == end) {
            return;
        }
        tracing::warn!(
            container = %self.name,
            error = %rollback,
            "could not roll back failed journal append, refusing writes until reopen"
        );
        self.poisoned = true;
    }

    fn ensure_writable(&self) -> CoreResult<()> {
        if self.poisoned {
            return Err(CoreError::journal_poisoned(&self.name));
        }
        Ok(())
    }

    fn write_framed(&mut self, framed: &[u8]) -> CoreResult<()> {
        self.backend.append(framed)?;
        self.backend.flush()?;
        if self.config.sync_on_write {
            self.backend.sync()?;
        }
        Ok(())
    }

    fn maybe_compact(&mut self) {
        let dead = self.records.saturating_sub(self.entries.len());
        if !self.config.should_compact(dead, self.records) {
            return;
        }
        // The mutation is already durable; a failed rewrite leaves the old journal in place.
        if let Err(err) = self.compact() {
            tracing::warn!(container = %self.name, error = %err, "journal compaction failed");
        }
    }
}

struct Replayed<T> {
    entries: BTreeMap<u64, T>,
    next_handle: u64,
    records: usize,
    valid_end: u64,
}

fn replay<T: DeserializeOwned>(name: &str, backend: &dyn StorageBackend) -> CoreResult<Replayed<T>> {
    let size = backend.size()?;
    let mut replayed = Replayed {
        entries: BTreeMap::new(),
        next_handle: 0,
        records: 0,
        valid_end: 0,
    };

    let mut offset = 0u64;
    while offset < size {
        let remaining = size - offset;
        if remaining < HEADER_SIZE as u64 {
            break;
        }

        let header_bytes = backend.read_at(offset, HEADER_SIZE)?;
        let header = RecordHeader::parse(&header_bytes).map_err(|e| attribute(e, name))?;
        let framed_len = header.framed_len();
        if remaining < framed_len as u64 {
            break;
        }

        let framed = backend.read_at(offset, framed_len)?;
        verify_crc(&framed)?;
        let payload = &framed[HEADER_SIZE..HEADER_SIZE + header.payload_len];
        let record =
            JournalRecord::decode_payload(header.record_type, payload).map_err(|e| attribute(e, name))?;

        apply(name, &mut replayed, record)?;
        offset += framed_len as u64;
        replayed.valid_end = offset;
    }

    Ok(replayed)
}

fn apply<T: DeserializeOwned>(
    name: &str,
    replayed: &mut Replayed<T>,
    record: JournalRecord,
) -> CoreResult<()> {
    match record {
        JournalRecord::Put { handle, body } => {
            if replayed.entries.contains_key(&handle) {
                return Err(CoreError::journal_corruption(
                    name,
                    format!("handle {handle} put twice"),
                ));
            }
            replayed.entries.insert(handle, topicstore_codec::from_cbor(&body)?);
            replayed.next_handle = replayed.next_handle.max(handle + 1);
        }
        JournalRecord::Update { handle, body } => {
            let slot = replayed.entries.get_mut(&handle).ok_or_else(|| {
                CoreError::journal_corruption(name, format!("update of missing handle {handle}"))
            })?;
            *slot = topicstore_codec::from_cbor(&body)?;
        }
        JournalRecord::Remove { handle } => {
            if replayed.entries.remove(&handle).is_none() {
                return Err(CoreError::journal_corruption(
                    name,
                    format!("removal of missing handle {handle}"),
                ));
            }
        }
        JournalRecord::Clear => replayed.entries.clear(),
        JournalRecord::Meta { next_handle } => {
            replayed.next_handle = replayed.next_handle.max(next_handle);
            return Ok(());
        }
    }
    replayed.records += 1;
    Ok(())
}

/// Names the container in corruption errors raised by the framing layer.
fn attribute(err: CoreError, name: &str) -> CoreError {
    match err {
        CoreError::JournalCorruption { message, .. } => CoreError::journal_corruption(name, message),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::MemorySpace;
    use proptest::prelude::*;

    fn open(space: &Arc<MemorySpace>, config: &StoreConfig) -> Journal<String> {
        let space: Arc<dyn ContainerSpace> = space.clone();
        Journal::open(space, "t/acks", config).unwrap()
    }

    fn no_compaction() -> StoreConfig {
        StoreConfig::new().compaction_min_dead(usize::MAX)
    }

    #[test]
    fn handles_increase_and_are_never_reused() {
        let space = Arc::new(MemorySpace::new());
        let mut journal = open(&space, &no_compaction());

        let a = journal.insert("a".into()).unwrap();
        let b = journal.insert("b".into()).unwrap();
        journal.remove(b).unwrap();
        let c = journal.insert("c".into()).unwrap();

        assert!(a < b && b < c);
        assert_eq!(journal.len(), 2);
    }

    #[test]
    fn reopen_replays_every_mutation() {
        let space = Arc::new(MemorySpace::new());
        let config = no_compaction();
        let (a, c) = {
            let mut journal = open(&space, &config);
            let a = journal.insert("a".into()).unwrap();
            let b = journal.insert("b".into()).unwrap();
            let c = journal.insert("c".into()).unwrap();
            journal.update(a, "a2".into()).unwrap();
            journal.remove(b).unwrap();
            (a, c)
        };

        let journal = open(&space, &config);
        let live: Vec<_> = journal.iter().map(|(h, v)| (h, v.clone())).collect();
        assert_eq!(live, vec![(a, "a2".to_string()), (c, "c".to_string())]);
        assert_eq!(journal.stats().unwrap().records, 5);
    }

    #[test]
    fn clear_survives_reopen_without_resetting_handles() {
        let space = Arc::new(MemorySpace::new());
        let config = no_compaction();
        let old = {
            let mut journal = open(&space, &config);
            let old = journal.insert("x".into()).unwrap();
            journal.clear().unwrap();
            old
        };

        let mut journal = open(&space, &config);
        assert_eq!(journal.len(), 0);
        let fresh = journal.insert("y".into()).unwrap();
        assert!(fresh > old);
    }

    #[test]
    fn next_skips_removed_handles() {
        let space = Arc::new(MemorySpace::new());
        let mut journal = open(&space, &no_compaction());

        let a = journal.insert("a".into()).unwrap();
        let b = journal.insert("b".into()).unwrap();
        let c = journal.insert("c".into()).unwrap();
        journal.remove(b).unwrap();

        assert_eq!(journal.next(a).map(|(h, _)| h), Some(c));
        assert_eq!(journal.next(b).map(|(h, _)| h), Some(c));
        assert!(journal.next(c).is_none());
    }

    #[test]
    fn update_of_missing_handle_fails() {
        let space = Arc::new(MemorySpace::new());
        let mut journal = open(&space, &no_compaction());

        let result = journal.update(EntryHandle(99), "nope".into());
        assert!(matches!(result, Err(CoreError::EntryNotFound { handle: 99, .. })));
        assert_eq!(journal.stats().unwrap().records, 0);
    }

    #[test]
    fn torn_tail_is_truncated_on_open() {
        let space = Arc::new(MemorySpace::new());
        let config = no_compaction();
        {
            let mut journal = open(&space, &config);
            journal.insert("kept".into()).unwrap();
            journal.insert("torn".into()).unwrap();
        }

        let full = space.journal_bytes("t/acks").unwrap();
        let mut backend = space.open("t/acks").unwrap();
        backend.truncate(full.len() as u64 - 3).unwrap();

        let journal = open(&space, &config);
        assert_eq!(journal.len(), 1);
        assert_eq!(journal.first().map(|(_, v)| v.as_str()), Some("kept"));

        let end = journal.stats().unwrap().bytes;
        assert!(end < full.len() as u64 - 3);
    }

    #[test]
    fn corrupted_body_fails_open() {
        let space = Arc::new(MemorySpace::new());
        let config = no_compaction();
        {
            let mut journal = open(&space, &config);
            journal.insert("value".into()).unwrap();
        }

        let mut bytes = space.journal_bytes("t/acks").unwrap();
        bytes[HEADER_SIZE + 9] ^= 0xFF;
        let mut backend = space.open("t/acks").unwrap();
        backend.truncate(0).unwrap();
        backend.append(&bytes).unwrap();

        let space: Arc<dyn ContainerSpace> = space;
        let result = Journal::<String>::open(space, "t/acks", &config);
        assert!(matches!(result, Err(CoreError::ChecksumMismatch { .. })));
    }

    #[test]
    fn compaction_keeps_live_entries_and_handles() {
        let space = Arc::new(MemorySpace::new());
        let config = no_compaction();
        let mut journal = open(&space, &config);

        let handles: Vec<_> = (0..10)
            .map(|i| journal.insert(format!("v{i}")).unwrap())
            .collect();
        for handle in &handles[..8] {
            journal.remove(*handle).unwrap();
        }
        let before = journal.stats().unwrap();
        journal.compact().unwrap();
        let after = journal.stats().unwrap();

        assert!(after.bytes < before.bytes);
        assert_eq!(after.records, 2);
        drop(journal);

        let mut journal = open(&space, &config);
        assert_eq!(journal.get(handles[8]).map(String::as_str), Some("v8"));
        assert_eq!(journal.get(handles[9]).map(String::as_str), Some("v9"));
        let fresh = journal.insert("new".into()).unwrap();
        assert!(fresh > handles[9]);
    }

    #[test]
    fn compaction_triggers_from_config() {
        let space = Arc::new(MemorySpace::new());
        let config = StoreConfig::new().compaction_min_dead(4).compaction_ratio(0.5);
        let mut journal = open(&space, &config);

        for i in 0..4 {
            let handle = journal.insert(format!("v{i}")).unwrap();
            journal.remove(handle).unwrap();
        }

        assert_eq!(journal.stats().unwrap().records, 0);
        assert_eq!(journal.len(), 0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert(String),
        Update(usize, String),
        Remove(usize),
        Clear,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => "[a-z]{0,8}".prop_map(Op::Insert),
            2 => (any::<usize>(), "[a-z]{0,8}").prop_map(|(i, v)| Op::Update(i, v)),
            2 => any::<usize>().prop_map(Op::Remove),
            1 => Just(Op::Clear),
        ]
    }

    proptest! {
        #[test]
        fn replay_matches_live_state(ops in prop::collection::vec(op_strategy(), 0..60)) {
            let space = Arc::new(MemorySpace::new());
            let config = StoreConfig::new().compaction_min_dead(6).compaction_ratio(0.5);
            let mut journal = open(&space, &config);

            for op in ops {
                let handles: Vec<EntryHandle> = journal.iter().map(|(h, _)| h).collect();
                match op {
                    Op::Insert(value) => {
                        journal.insert(value).unwrap();
                    }
                    Op::Update(i, value) if !handles.is_empty() => {
                        journal.update(handles[i % handles.len()], value).unwrap();
                    }
                    Op::Remove(i) if !handles.is_empty() => {
                        journal.remove(handles[i % handles.len()]).unwrap();
                    }
                    Op::Clear => journal.clear().unwrap(),
                    _ => {}
                }
            }

            let expected: Vec<(EntryHandle, String)> =
                journal.iter().map(|(h, v)| (h, v.clone())).collect();
            drop(journal);

            let reopened = open(&space, &config);
            let actual: Vec<(EntryHandle, String)> =
                reopened.iter().map(|(h, v)| (h, v.clone())).collect();
            prop_assert_eq!(actual, expected);
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Fault {
        None,
        /// Appends write half their bytes and fail; truncates fail.
        Tear,
        /// Appends write nothing and fail; truncates fail.
        Refuse,
        /// `open` fails.
        Open,
    }

    #[derive(Debug)]
    struct FaultySpace {
        inner: MemorySpace,
        fault: Arc<parking_lot::Mutex<Fault>>,
    }

    impl FaultySpace {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                inner: MemorySpace::new(),
                fault: Arc::new(parking_lot::Mutex::new(Fault::None)),
            })
        }

        fn inject(&self, fault: Fault) {
            *self.fault.lock() = fault;
        }
    }

    struct FaultyBackend {
        inner: Box<dyn StorageBackend>,
        fault: Arc<parking_lot::Mutex<Fault>>,
    }

    fn injected() -> topicstore_storage::StorageError {
        std::io::Error::new(std::io::ErrorKind::Other, "injected fault").into()
    }

    impl StorageBackend for FaultyBackend {
        fn read_at(&self, offset: u64, len: usize) -> topicstore_storage::StorageResult<Vec<u8>> {
            self.inner.read_at(offset, len)
        }

        fn append(&mut self, data: &[u8]) -> topicstore_storage::StorageResult<u64> {
            match *self.fault.lock() {
                Fault::Tear => {
                    self.inner.append(&data[..data.len() / 2])?;
                    Err(injected())
                }
                Fault::Refuse => Err(injected()),
                _ => self.inner.append(data),
            }
        }

        fn flush(&mut self) -> topicstore_storage::StorageResult<()> {
            self.inner.flush()
        }

        fn size(&self) -> topicstore_storage::StorageResult<u64> {
            self.inner.size()
        }

        fn sync(&mut self) -> topicstore_storage::StorageResult<()> {
            self.inner.sync()
        }

        fn truncate(&mut self, new_size: u64) -> topicstore_storage::StorageResult<()> {
            match *self.fault.lock() {
                Fault::Tear | Fault::Refuse => Err(injected()),
                _ => self.inner.truncate(new_size),
            }
        }
    }

    impl ContainerSpace for FaultySpace {
        fn open(&self, name: &str) -> CoreResult<Box<dyn StorageBackend>> {
            if *self.fault.lock() == Fault::Open {
                return Err(CoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "injected open fault",
                )));
            }
            Ok(Box::new(FaultyBackend {
                inner: self.inner.open(name)?,
                fault: Arc::clone(&self.fault),
            }))
        }

        fn create_replacement(&self, name: &str) -> CoreResult<Box<dyn StorageBackend>> {
            self.inner.create_replacement(name)
        }

        fn commit_replacement(&self, name: &str) -> CoreResult<()> {
            self.inner.commit_replacement(name)
        }

        fn remove(&self, name: &str) -> CoreResult<()> {
            self.inner.remove(name)
        }

        fn names(&self) -> CoreResult<Vec<String>> {
            self.inner.names()
        }
    }

    fn open_faulty(space: &Arc<FaultySpace>, config: &StoreConfig) -> Journal<String> {
        let space: Arc<dyn ContainerSpace> = space.clone();
        Journal::open(space, "t/acks", config).unwrap()
    }

    fn live_values(journal: &Journal<String>) -> Vec<String> {
        journal.iter().map(|(_, v)| v.clone()).collect()
    }

    #[test]
    fn torn_append_that_cannot_be_cut_poisons_until_reopen() {
        let space = FaultySpace::new();
        let config = no_compaction();
        let mut journal = open_faulty(&space, &config);
        journal.insert("kept".into()).unwrap();

        space.inject(Fault::Tear);
        assert!(journal.insert("torn".into()).is_err());
        space.inject(Fault::None);

        let result = journal.insert("after".into());
        assert!(matches!(result, Err(CoreError::JournalPoisoned { .. })));
        assert!(matches!(journal.compact(), Err(CoreError::JournalPoisoned { .. })));
        drop(journal);

        let mut journal = open_faulty(&space, &config);
        assert_eq!(live_values(&journal), vec!["kept"]);
        journal.insert("after".into()).unwrap();
        drop(journal);

        let journal = open_faulty(&space, &config);
        assert_eq!(live_values(&journal), vec!["kept", "after"]);
    }

    #[test]
    fn failed_append_without_bytes_stays_writable() {
        let space = FaultySpace::new();
        let config = no_compaction();
        let mut journal = open_faulty(&space, &config);

        space.inject(Fault::Refuse);
        assert!(journal.insert("refused".into()).is_err());
        space.inject(Fault::None);

        journal.insert("next".into()).unwrap();
        drop(journal);

        let journal = open_faulty(&space, &config);
        assert_eq!(live_values(&journal), vec!["next"]);
    }

    #[test]
    fn compaction_that_cannot_reopen_poisons() {
        let space = FaultySpace::new();
        let config = no_compaction();
        let mut journal = open_faulty(&space, &config);
        let gone = journal.insert("gone".into()).unwrap();
        journal.insert("kept".into()).unwrap();
        journal.remove(gone).unwrap();

        space.inject(Fault::Open);
        assert!(journal.compact().is_err());
        space.inject(Fault::None);

        let result = journal.insert("lost".into());
        assert!(matches!(result, Err(CoreError::JournalPoisoned { .. })));
        drop(journal);

        let journal = open_faulty(&space, &config);
        assert_eq!(live_values(&journal), vec!["kept"]);
        assert_eq!(journal.stats().unwrap().records, 1);
    }

    #[test]
    fn destroy_removes_journal_from_space() {
        let space = Arc::new(MemorySpace::new());
        let mut journal = open(&space, &no_compaction());
        journal.insert("x".into()).unwrap();

        journal.destroy().unwrap();
        assert!(space.journal_bytes("t/acks").is_none());
    }
}
