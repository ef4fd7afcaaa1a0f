//! Error types for the topic store core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in topic store operations.
///
/// Every variant aborts only the call that produced it. Logical
/// inconsistencies between containers (a reference to a vanished message,
/// a stale batch position) are repaired locally and never surface here.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] topicstore_storage::StorageError),

    /// Record codec error.
    #[error("codec error: {0}")]
    Codec(#[from] topicstore_codec::CodecError),

    /// I/O error outside a backend (directory handling, renames).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A container journal is corrupted or has an unsupported format.
    #[error("journal corruption in {container}: {message}")]
    JournalCorruption {
        /// Container whose journal is damaged.
        container: String,
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch detected in a journal record.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the record.
        expected: u32,
        /// Checksum computed over the record.
        actual: u32,
    },

    /// A container journal refuses writes after a failure it could not undo.
    ///
    /// Reopening the store replays the journal and clears the condition.
    #[error("journal {container} refuses writes until reopened")]
    JournalPoisoned {
        /// Container whose journal is poisoned.
        container: String,
    },

    /// An update or removal named an entry handle that does not exist.
    #[error("entry {handle} not found in {container}")]
    EntryNotFound {
        /// Container that was searched.
        container: String,
        /// The missing handle.
        handle: u64,
    },

    /// A topic store for this destination already exists.
    #[error("destination already exists: {destination}")]
    DestinationAlreadyExists {
        /// Name of the destination.
        destination: String,
    },

    /// The topic store was deleted while a handle to it was still held.
    #[error("destination deleted: {destination}")]
    DestinationDeleted {
        /// Name of the destination.
        destination: String,
    },

    /// The topic name cannot be used as a container namespace.
    #[error("invalid topic name: {name:?}")]
    InvalidTopicName {
        /// The rejected name.
        name: String,
    },

    /// Another process holds the store directory.
    #[error("store locked: another process has exclusive access")]
    StoreLocked,

    /// The store directory is missing or unusable.
    #[error("invalid store: {message}")]
    InvalidStore {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates a journal corruption error.
    pub fn journal_corruption(container: impl Into<String>, message: impl Into<String>) -> Self {
        Self::JournalCorruption {
            container: container.into(),
            message: message.into(),
        }
    }

    /// Creates a journal-poisoned error.
    pub fn journal_poisoned(container: impl Into<String>) -> Self {
        Self::JournalPoisoned {
            container: container.into(),
        }
    }

    /// Creates an entry-not-found error.
    pub fn entry_not_found(container: impl Into<String>, handle: u64) -> Self {
        Self::EntryNotFound {
            container: container.into(),
            handle,
        }
    }

    /// Creates a destination-already-exists error.
    pub fn destination_already_exists(destination: impl Into<String>) -> Self {
        Self::DestinationAlreadyExists {
            destination: destination.into(),
        }
    }

    /// Creates a destination-deleted error.
    pub fn destination_deleted(destination: impl Into<String>) -> Self {
        Self::DestinationDeleted {
            destination: destination.into(),
        }
    }

    /// Creates an invalid store error.
    pub fn invalid_store(message: impl Into<String>) -> Self {
        Self::InvalidStore {
            message: message.into(),
        }
    }
}
