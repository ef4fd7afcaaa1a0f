//! CLI command implementations.

pub mod inspect;
pub mod purge;
pub mod verify;

use std::path::Path;
use topicstore_core::{CoreError, PersistenceAdapter, StoreConfig};

/// Errors reported by CLI commands.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// A command that needs `--path` ran without it.
    #[error("store path required for {0}")]
    MissingPath(&'static str),

    /// The named topic has no journals in the store.
    #[error("topic not found: {0}")]
    UnknownTopic(String),

    /// Reconciliation found and repaired damage.
    #[error("verification repaired {0} problem(s)")]
    Repaired(usize),

    /// Output could not be serialized.
    #[error("output error: {0}")]
    Output(#[from] serde_json::Error),

    /// The store rejected an operation.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Opens an existing store directory without creating it.
pub(crate) fn open_existing(path: &Path) -> Result<PersistenceAdapter, CliError> {
    let config = StoreConfig::new().create_if_missing(false);
    Ok(PersistenceAdapter::open(path, config)?)
}

/// Returns `topic` if the store knows it, or every topic when `None`.
pub(crate) fn select_topics(
    adapter: &PersistenceAdapter,
    topic: Option<&str>,
) -> Result<Vec<String>, CliError> {
    let names = adapter.topic_names()?;
    match topic {
        Some(topic) if names.iter().any(|name| name == topic) => Ok(vec![topic.to_string()]),
        Some(topic) => Err(CliError::UnknownTopic(topic.to_string())),
        None => Ok(names),
    }
}
