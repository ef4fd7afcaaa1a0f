//! Inspect command implementation.

use super::{open_existing, select_topics, CliError};
use serde::Serialize;
use std::path::Path;
use topicstore_core::{PersistenceAdapter, TopicMessageStore, TopicStats};

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Total stored messages across topics.
    pub total_messages: usize,
    /// Total journal bytes across topics.
    pub total_bytes: u64,
    /// Per-topic statistics.
    pub topics: Vec<TopicStats>,
}

/// Runs the inspect command.
pub fn run(path: &Path, topic: Option<&str>, format: &str) -> Result<(), CliError> {
    let adapter = open_existing(path)?;
    let result = inspect(&adapter, path, topic)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

pub(crate) fn inspect(
    adapter: &PersistenceAdapter,
    path: &Path,
    topic: Option<&str>,
) -> Result<InspectResult, CliError> {
    let mut topics = Vec::new();
    for name in select_topics(adapter, topic)? {
        topics.push(adapter.topic_store(&name)?.stats()?);
    }

    Ok(InspectResult {
        path: path.display().to_string(),
        total_messages: topics.iter().map(|t| t.messages).sum(),
        total_bytes: topics.iter().map(|t| t.journal_bytes).sum(),
        topics,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("Topic Store: {}", result.path);
    println!("========================================");
    println!();
    println!("Topics:         {}", result.topics.len());
    println!("Messages:       {}", result.total_messages);
    println!("Journal bytes:  {}", format_bytes(result.total_bytes));

    for topic in &result.topics {
        println!();
        println!("Topic {}", topic.destination);
        println!("  Messages:     {}", topic.messages);
        println!("  Ack entries:  {}", topic.ack_entries);
        println!("  Journals:     {}", format_bytes(topic.journal_bytes));
        if topic.subscriptions.is_empty() {
            println!("  (no subscriptions)");
            continue;
        }
        println!("  {:>24}  {:>8}  {:>12}", "Subscription", "Pending", "Batch at");
        for sub in &topic.subscriptions {
            let position = sub
                .position
                .as_ref()
                .map_or_else(|| "-".to_string(), |p| p.message_id.to_string());
            println!("  {:>24}  {:>8}  {:>12}", sub.key, sub.pending, position);
        }
    }
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} bytes")
    }
}
