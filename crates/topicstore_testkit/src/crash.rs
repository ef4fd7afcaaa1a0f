//! Crash injection for topic stores.
//!
//! A [`CrashableSpace`] wraps another container space and hands out
//! [`CrashableBackend`]s that share one write budget. Once the budget is
//! spent the write that crossed it is cut short and every later write,
//! flush, sync or truncate fails, as if the process had died. Reopening a
//! store over the inner space then shows what a restart would find.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use topicstore_core::{DurableTopicStore, MemorySpace, StoreConfig};
//! use topicstore_testkit::crash::CrashableSpace;
//!
//! let inner = Arc::new(MemorySpace::new());
//! let space = Arc::new(CrashableSpace::new(inner.clone()));
//! let store = DurableTopicStore::open(space.clone(), "t", &StoreConfig::default()).unwrap();
//!
//! space.crash_after(0);
//! // every write to `store` now fails; reopen over `inner` to recover
//! # drop(store);
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use topicstore_core::{ContainerSpace, CoreResult};
use topicstore_storage::{StorageBackend, StorageError, StorageResult};

/// Write budget shared by every backend of a crashable space.
#[derive(Debug)]
pub struct CrashSwitch {
    crash_after_bytes: AtomicUsize,
    bytes_written: AtomicUsize,
    crashed: AtomicBool,
}

impl Default for CrashSwitch {
    fn default() -> Self {
        Self {
            crash_after_bytes: AtomicUsize::new(usize::MAX),
            bytes_written: AtomicUsize::new(0),
            crashed: AtomicBool::new(false),
        }
    }
}

impl CrashSwitch {
    /// Allows `bytes` more bytes to be written before crashing.
    pub fn crash_after(&self, bytes: usize) {
        let written = self.bytes_written.load(Ordering::SeqCst);
        self.crash_after_bytes
            .store(written.saturating_add(bytes), Ordering::SeqCst);
    }

    /// Returns whether the crash has happened.
    pub fn has_crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }

    /// Total bytes written through the switch.
    pub fn bytes_written(&self) -> usize {
        self.bytes_written.load(Ordering::SeqCst)
    }

    /// Clears the crash and the budget.
    pub fn reset(&self) {
        self.crash_after_bytes.store(usize::MAX, Ordering::SeqCst);
        self.crashed.store(false, Ordering::SeqCst);
    }

    fn ensure_alive(&self, during: &str) -> StorageResult<()> {
        if self.has_crashed() {
            return Err(simulated(during));
        }
        Ok(())
    }
}

fn simulated(during: &str) -> StorageError {
    StorageError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("simulated crash during {during}"),
    ))
}

/// A storage backend wrapper that can simulate crashes.
pub struct CrashableBackend {
    inner: Box<dyn StorageBackend>,
    switch: Arc<CrashSwitch>,
}

impl CrashableBackend {
    /// Wraps `inner`, charging its writes to `switch`.
    pub fn new(inner: Box<dyn StorageBackend>, switch: Arc<CrashSwitch>) -> Self {
        Self { inner, switch }
    }
}

impl StorageBackend for CrashableBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        self.switch.ensure_alive("write")?;

        let current = self
            .switch
            .bytes_written
            .fetch_add(bytes.len(), Ordering::SeqCst);
        let threshold = self.switch.crash_after_bytes.load(Ordering::SeqCst);

        if current.saturating_add(bytes.len()) > threshold {
            self.switch.crashed.store(true, Ordering::SeqCst);
            let partial_len = threshold.saturating_sub(current);
            if partial_len > 0 {
                let _ = self.inner.append(&bytes[..partial_len]);
            }
            return Err(simulated("partial write"));
        }

        self.inner.append(bytes)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.switch.ensure_alive("flush")?;
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.switch.ensure_alive("sync")?;
        self.inner.sync()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.switch.ensure_alive("truncate")?;
        self.inner.truncate(new_size)
    }
}

/// A container space whose backends crash together.
#[derive(Debug)]
pub struct CrashableSpace {
    inner: Arc<dyn ContainerSpace>,
    switch: Arc<CrashSwitch>,
}

impl CrashableSpace {
    /// Wraps `inner`.
    pub fn new(inner: Arc<dyn ContainerSpace>) -> Self {
        Self {
            inner,
            switch: Arc::new(CrashSwitch::default()),
        }
    }

    /// Returns the shared switch.
    pub fn switch(&self) -> &Arc<CrashSwitch> {
        &self.switch
    }

    /// Allows `bytes` more bytes to be written before crashing.
    pub fn crash_after(&self, bytes: usize) {
        self.switch.crash_after(bytes);
    }

    /// Returns whether the crash has happened.
    pub fn has_crashed(&self) -> bool {
        self.switch.has_crashed()
    }

    fn wrap(&self, backend: Box<dyn StorageBackend>) -> Box<dyn StorageBackend> {
        Box::new(CrashableBackend::new(backend, Arc::clone(&self.switch)))
    }

    fn ensure_alive(&self, during: &str) -> CoreResult<()> {
        self.switch.ensure_alive(during)?;
        Ok(())
    }
}

impl ContainerSpace for CrashableSpace {
    fn open(&self, name: &str) -> CoreResult<Box<dyn StorageBackend>> {
        Ok(self.wrap(self.inner.open(name)?))
    }

    fn create_replacement(&self, name: &str) -> CoreResult<Box<dyn StorageBackend>> {
        self.ensure_alive("compaction")?;
        Ok(self.wrap(self.inner.create_replacement(name)?))
    }

    fn commit_replacement(&self, name: &str) -> CoreResult<()> {
        self.ensure_alive("compaction")?;
        self.inner.commit_replacement(name)
    }

    fn remove(&self, name: &str) -> CoreResult<()> {
        self.ensure_alive("remove")?;
        self.inner.remove(name)
    }

    fn names(&self) -> CoreResult<Vec<String>> {
        self.inner.names()
    }
}
