//! Verify command implementation.
//!
//! Opening a topic store reconciles its containers, so verification is an
//! open of every topic followed by a look at what had to be repaired.

use super::{open_existing, select_topics, CliError};
use serde::Serialize;
use std::path::Path;
use topicstore_core::{PersistenceAdapter, RecoveryReport};

/// Verification outcome of one topic.
#[derive(Debug, Serialize)]
pub struct TopicVerification {
    /// Topic name.
    pub topic: String,
    /// Repairs made while opening it.
    pub report: RecoveryReport,
}

/// Runs the verify command.
pub fn run(path: &Path, format: &str) -> Result<(), CliError> {
    let adapter = open_existing(path)?;
    let results = verify(&adapter)?;
    let repairs: usize = results.iter().map(|r| r.report.total_repairs()).sum();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&results)?),
        _ => {
            println!("Verifying topic store at {}", path.display());
            println!();
            for result in &results {
                print_report(result);
            }
            println!();
            if repairs == 0 {
                println!("✓ Store verification passed");
            } else {
                println!("✗ Store verification repaired {repairs} problem(s)");
            }
        }
    }

    if repairs == 0 {
        Ok(())
    } else {
        Err(CliError::Repaired(repairs))
    }
}

pub(crate) fn verify(adapter: &PersistenceAdapter) -> Result<Vec<TopicVerification>, CliError> {
    let mut results = Vec::new();
    for topic in select_topics(adapter, None)? {
        let store = adapter.topic_store(&topic)?;
        results.push(TopicVerification {
            topic,
            report: *store.recovery_report(),
        });
    }
    Ok(results)
}

fn print_report(result: &TopicVerification) {
    let report = &result.report;
    if report.is_clean() {
        println!("  {}: ok", result.topic);
        return;
    }

    println!("  {}: {} repair(s)", result.topic, report.total_repairs());
    let lines = [
        ("orphan cursor logs deleted", report.orphan_cursors),
        ("dangling references dropped", report.dangling_refs),
        ("pending counts corrected", report.corrected_counts),
        ("unreferenced ack entries released", report.released_entries),
        ("orphan messages deleted", report.orphan_messages),
        ("stale batch positions cleared", report.cleared_positions),
    ];
    for (label, count) in lines {
        if count > 0 {
            println!("    {label}: {count}");
        }
    }
}
