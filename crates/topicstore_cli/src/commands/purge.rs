//! Purge command implementation.

use super::{open_existing, select_topics, CliError};
use std::path::Path;
use topicstore_core::{MessageStore, PersistenceAdapter, TopicMessageStore};

/// Runs the purge command.
pub fn run(path: &Path, topic: &str) -> Result<(), CliError> {
    let adapter = open_existing(path)?;
    let removed = purge(&adapter, topic)?;
    println!("Purged {removed} message(s) from {topic}");
    Ok(())
}

/// Removes every message of `topic` and returns how many were stored.
pub(crate) fn purge(adapter: &PersistenceAdapter, topic: &str) -> Result<usize, CliError> {
    select_topics(adapter, Some(topic))?;
    let store = adapter.topic_store(topic)?;
    let removed = store.stats()?.messages;
    store.remove_all_messages()?;
    tracing::info!(topic, removed, "topic purged");
    Ok(removed)
}
