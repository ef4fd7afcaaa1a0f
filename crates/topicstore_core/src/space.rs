//! Container spaces: physical allocation of container journals.
//!
//! A space maps container names to byte backends. Every topic store keeps
//! its message table, ack ledger, subscription registry, batch positions and
//! one cursor per subscription as separate named containers in one space.
//!
//! On disk a space is a directory:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK                         # Advisory lock for single-process access
//! ├─ orders%2Fmessages.journal    # One journal per container
//! ├─ orders%2Facks.journal
//! └─ orders%2Fsubs%2Fc1%3Asub.journal
//! ```
//!
//! Container names may contain any character; file names escape everything
//! outside `[A-Za-z0-9._-]` as `%XX`. An escaped name longer than 128 bytes
//! is cut to a prefix plus `~` and a SHA-256 digest, and the full name is
//! written next to the journal as `<stem>.name`.

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use topicstore_storage::{FileBackend, InMemoryBackend, StorageBackend};

const LOCK_FILE: &str = "LOCK";
const JOURNAL_EXT: &str = "journal";
const REPLACEMENT_EXT: &str = "compact";
const NAME_EXT: &str = "name";

/// Longest file stem written for a container.
const MAX_STEM_LEN: usize = 128;
const HASHED_PREFIX_LEN: usize = 64;
const HASHED_MARKER: char = '~';

/// Physical allocation of named container journals.
///
/// Implementations must be safe to share between topic stores; each
/// container name is only ever opened by one container at a time.
pub trait ContainerSpace: Send + Sync + fmt::Debug {
    /// Opens the journal for `name`, creating an empty one if absent.
    fn open(&self, name: &str) -> CoreResult<Box<dyn StorageBackend>>;

    /// Creates an empty staging journal that will replace `name` once
    /// [`ContainerSpace::commit_replacement`] is called.
    fn create_replacement(&self, name: &str) -> CoreResult<Box<dyn StorageBackend>>;

    /// Atomically swaps the staging journal in place of `name`.
    fn commit_replacement(&self, name: &str) -> CoreResult<()>;

    /// Deletes the journal for `name`. Deleting a missing journal is a no-op.
    fn remove(&self, name: &str) -> CoreResult<()>;

    /// Returns the names of every journal in the space, sorted.
    fn names(&self) -> CoreResult<Vec<String>>;
}

/// A container space backed by a directory of journal files.
///
/// Holds an exclusive lock on the directory for its whole lifetime.
pub struct DirectorySpace {
    path: PathBuf,
    _lock_file: File,
}

impl DirectorySpace {
    /// Opens or creates a space directory and takes its lock.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (`StoreLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_store(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_store(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::StoreLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the space directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn journal_path(&self, name: &str) -> PathBuf {
        self.path.join(format!("{}.{JOURNAL_EXT}", file_stem(name)))
    }

    fn replacement_path(&self, name: &str) -> PathBuf {
        self.path.join(format!("{}.{REPLACEMENT_EXT}", file_stem(name)))
    }

    fn name_path(&self, stem: &str) -> PathBuf {
        self.path.join(format!("{stem}.{NAME_EXT}"))
    }

    /// Records the full name of a hashed stem, refusing digest collisions.
    fn record_name(&self, name: &str) -> CoreResult<()> {
        let stem = file_stem(name);
        if !is_hashed(&stem) {
            return Ok(());
        }
        let path = self.name_path(&stem);
        if path.exists() {
            let recorded = fs::read_to_string(&path)?;
            if recorded != name {
                return Err(CoreError::invalid_store(format!(
                    "containers {recorded:?} and {name:?} share file stem {stem}"
                )));
            }
            return Ok(());
        }
        fs::write(&path, name)?;
        File::open(&path)?.sync_all()?;
        Ok(())
    }

    fn stem_to_name(&self, stem: &str) -> CoreResult<Option<String>> {
        if !is_hashed(stem) {
            return Ok(unescape_name(stem));
        }
        let path = self.name_path(stem);
        if !path.exists() {
            tracing::warn!(stem, "journal without recorded container name");
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> CoreResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> CoreResult<()> {
        Ok(())
    }
}

impl ContainerSpace for DirectorySpace {
    fn open(&self, name: &str) -> CoreResult<Box<dyn StorageBackend>> {
        let path = self.journal_path(name);
        let existed = path.exists();
        self.record_name(name)?;
        let backend = FileBackend::open(&path)?;
        if !existed {
            self.sync_directory()?;
        }
        Ok(Box::new(backend))
    }

    fn create_replacement(&self, name: &str) -> CoreResult<Box<dyn StorageBackend>> {
        let backend = FileBackend::create_empty(&self.replacement_path(name))?;
        Ok(Box::new(backend))
    }

    fn commit_replacement(&self, name: &str) -> CoreResult<()> {
        fs::rename(self.replacement_path(name), self.journal_path(name))?;
        self.sync_directory()
    }

    fn remove(&self, name: &str) -> CoreResult<()> {
        let path = self.journal_path(name);
        let name_path = self.name_path(&file_stem(name));
        let mut removed = false;
        for path in [path, name_path] {
            if path.exists() {
                fs::remove_file(&path)?;
                removed = true;
            }
        }
        if removed {
            self.sync_directory()?;
        }
        Ok(())
    }

    fn names(&self) -> CoreResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(JOURNAL_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if let Some(name) = self.stem_to_name(stem)? {
                    names.push(name);
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

impl fmt::Debug for DirectorySpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectorySpace")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// A container space held entirely in memory.
///
/// Journals outlive the containers that opened them, so a topic store can
/// be dropped and reopened over the same space to exercise recovery.
#[derive(Debug, Default)]
pub struct MemorySpace {
    journals: Mutex<HashMap<String, InMemoryBackend>>,
    staged: Mutex<HashMap<String, InMemoryBackend>>,
}

impl MemorySpace {
    /// Creates an empty memory space.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the raw journal bytes for `name`, if present.
    #[must_use]
    pub fn journal_bytes(&self, name: &str) -> Option<Vec<u8>> {
        self.journals.lock().get(name).map(InMemoryBackend::data)
    }
}

impl ContainerSpace for MemorySpace {
    fn open(&self, name: &str) -> CoreResult<Box<dyn StorageBackend>> {
        let mut journals = self.journals.lock();
        let backend = journals.entry(name.to_string()).or_default();
        Ok(Box::new(backend.share()))
    }

    fn create_replacement(&self, name: &str) -> CoreResult<Box<dyn StorageBackend>> {
        let staged = InMemoryBackend::new();
        let handle = staged.share();
        self.staged.lock().insert(name.to_string(), staged);
        Ok(Box::new(handle))
    }

    fn commit_replacement(&self, name: &str) -> CoreResult<()> {
        let staged = self.staged.lock().remove(name).ok_or_else(|| {
            CoreError::invalid_store(format!("no staged replacement for {name}"))
        })?;
        let mut journals = self.journals.lock();
        match journals.get(name) {
            Some(existing) => existing.replace_data(staged.data()),
            None => {
                journals.insert(name.to_string(), staged);
            }
        }
        Ok(())
    }

    fn remove(&self, name: &str) -> CoreResult<()> {
        if let Some(backend) = self.journals.lock().remove(name) {
            backend.replace_data(Vec::new());
        }
        Ok(())
    }

    fn names(&self) -> CoreResult<Vec<String>> {
        let mut names: Vec<String> = self.journals.lock().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// Escapes a container name into a portable file stem.
fn escape_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// File stem of the journal for `name`.
fn file_stem(name: &str) -> String {
    let escaped = escape_name(name);
    if escaped.len() <= MAX_STEM_LEN {
        return escaped;
    }
    let digest: String = Sha256::digest(name.as_bytes())
        .iter()
        .take(16)
        .map(|byte| format!("{byte:02x}"))
        .collect();
    format!("{}{HASHED_MARKER}{digest}", &escaped[..HASHED_PREFIX_LEN])
}

/// `~` is always escaped, so only hashed stems contain it.
fn is_hashed(stem: &str) -> bool {
    stem.contains(HASHED_MARKER)
}

/// Reverses [`escape_name`]. Returns `None` for stems it did not produce.
fn unescape_name(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = stem.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn escape_round_trip() {
        let name = "orders/subs/client-1:NOT_SET";
        let escaped = escape_name(name);
        assert!(!escaped.contains('/'));
        assert!(!escaped.contains(':'));
        assert_eq!(unescape_name(&escaped).as_deref(), Some(name));
    }

    #[test]
    fn long_names_get_bounded_stems() {
        let short = "orders/subs/c1:audit";
        assert_eq!(file_stem(short), escape_name(short));

        let long = format!("orders/subs/{}:{}", "client".repeat(20), ":/".repeat(60));
        let stem = file_stem(&long);
        assert!(stem.len() <= MAX_STEM_LEN);
        assert!(is_hashed(&stem));
        assert_ne!(stem, file_stem(&format!("{long}x")));
        assert!(!is_hashed(&escape_name("with~tilde")));
    }

    #[test]
    fn directory_keeps_long_container_names() {
        let temp = tempdir().unwrap();
        let space = DirectorySpace::open(temp.path(), true).unwrap();
        let long = format!("t/subs/{}:{}", "c".repeat(90), "%:".repeat(90));

        space.open(&long).unwrap().append(b"rec").unwrap();
        assert_eq!(space.names().unwrap(), vec![long.clone()]);
        assert_eq!(space.open(&long).unwrap().size().unwrap(), 3);

        let mut staged = space.create_replacement(&long).unwrap();
        staged.append(b"new!").unwrap();
        drop(staged);
        space.commit_replacement(&long).unwrap();
        assert_eq!(space.open(&long).unwrap().size().unwrap(), 4);

        space.remove(&long).unwrap();
        assert!(space.names().unwrap().is_empty());
        let leftovers: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|n| n != LOCK_FILE)
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[test]
    fn unescape_rejects_broken_sequences() {
        assert!(unescape_name("abc%2").is_none());
        assert!(unescape_name("abc%zz").is_none());
    }

    #[test]
    fn directory_open_fails_if_missing_and_no_create() {
        let temp = tempdir().unwrap();
        let result = DirectorySpace::open(&temp.path().join("missing"), false);
        assert!(matches!(result, Err(CoreError::InvalidStore { .. })));
    }

    #[test]
    fn directory_lock_prevents_second_open() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store");

        let _first = DirectorySpace::open(&path, true).unwrap();
        let second = DirectorySpace::open(&path, true);
        assert!(matches!(second, Err(CoreError::StoreLocked)));
    }

    #[test]
    fn directory_lock_released_on_drop() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store");

        drop(DirectorySpace::open(&path, true).unwrap());
        assert!(DirectorySpace::open(&path, true).is_ok());
    }

    #[test]
    fn directory_names_and_remove() {
        let temp = tempdir().unwrap();
        let space = DirectorySpace::open(temp.path(), true).unwrap();

        space.open("t/acks").unwrap();
        space.open("t/subs/c:s").unwrap();
        assert_eq!(space.names().unwrap(), vec!["t/acks", "t/subs/c:s"]);

        space.remove("t/acks").unwrap();
        space.remove("t/never-existed").unwrap();
        assert_eq!(space.names().unwrap(), vec!["t/subs/c:s"]);
    }

    #[test]
    fn directory_replacement_swaps_contents() {
        let temp = tempdir().unwrap();
        let space = DirectorySpace::open(temp.path(), true).unwrap();

        space.open("t/messages").unwrap().append(b"old contents").unwrap();
        let mut staged = space.create_replacement("t/messages").unwrap();
        staged.append(b"new").unwrap();
        staged.sync().unwrap();
        drop(staged);

        space.commit_replacement("t/messages").unwrap();
        let reopened = space.open("t/messages").unwrap();
        assert_eq!(reopened.read_at(0, 3).unwrap(), b"new");
        assert_eq!(space.names().unwrap(), vec!["t/messages"]);
    }

    #[test]
    fn memory_journals_survive_reopen() {
        let space = MemorySpace::new();
        space.open("t/acks").unwrap().append(b"rec").unwrap();

        let reopened = space.open("t/acks").unwrap();
        assert_eq!(reopened.size().unwrap(), 3);
        assert_eq!(space.journal_bytes("t/acks").unwrap(), b"rec");
    }

    #[test]
    fn memory_replacement_is_seen_by_open_handles() {
        let space = MemorySpace::new();
        let mut live = space.open("t/acks").unwrap();
        live.append(b"old contents").unwrap();

        space.create_replacement("t/acks").unwrap().append(b"new").unwrap();
        space.commit_replacement("t/acks").unwrap();

        assert_eq!(live.size().unwrap(), 3);
    }

    #[test]
    fn memory_commit_without_stage_fails() {
        let space = MemorySpace::new();
        assert!(space.commit_replacement("t/acks").is_err());
    }
}
