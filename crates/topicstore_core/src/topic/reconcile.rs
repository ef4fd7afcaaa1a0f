//! Startup reconciliation.
//!
//! Publishing, acknowledging and unsubscribing each touch several containers
//! one write at a time. A crash between two of those writes can leave an ack
//! entry whose pending count disagrees with the references that reached the
//! cursors, a message nobody references, or a cursor log with no
//! subscription. Reconciliation rebuilds pending counts from the references
//! that survived and removes whatever they no longer justify.

use super::records::AckEntry;
use super::store::{resolve_position, TopicState};
use crate::container::{KeyedStore, OrderedLog};
use crate::error::CoreResult;
use crate::types::EntryHandle;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Repairs made while opening a topic store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    /// Cursor logs with no registered subscription, deleted.
    pub orphan_cursors: usize,
    /// References to a missing ack entry or message, dropped.
    pub dangling_refs: usize,
    /// Ack entries whose pending count was rewritten.
    pub corrected_counts: usize,
    /// Ack entries with no live reference, deleted with their message.
    pub released_entries: usize,
    /// Messages no ack entry referenced, deleted.
    pub orphan_messages: usize,
    /// Batch positions that no longer resolved, cleared.
    pub cleared_positions: usize,
}

impl RecoveryReport {
    /// Returns whether nothing needed repair.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.total_repairs() == 0
    }

    /// Total number of repairs.
    #[must_use]
    pub fn total_repairs(&self) -> usize {
        self.orphan_cursors
            + self.dangling_refs
            + self.corrected_counts
            + self.released_entries
            + self.orphan_messages
            + self.cleared_positions
    }
}

pub(super) fn reconcile(state: &mut TopicState) -> CoreResult<RecoveryReport> {
    let mut report = RecoveryReport::default();

    remove_orphan_cursors(state, &mut report)?;
    let live_refs = drop_dangling_refs(state, &mut report)?;
    fix_pending_counts(state, &live_refs, &mut report)?;
    remove_orphan_messages(state, &mut report)?;
    clear_stale_positions(state, &mut report)?;

    Ok(report)
}

fn remove_orphan_cursors(state: &mut TopicState, report: &mut RecoveryReport) -> CoreResult<()> {
    let registered: HashSet<&str> = state.cursors.values().map(|c| c.name()).collect();
    let orphans: Vec<String> = state
        .space
        .names()?
        .into_iter()
        .filter(|name| state.names.is_cursor(name) && !registered.contains(name.as_str()))
        .collect();

    for name in orphans {
        tracing::warn!(container = %name, "deleting cursor log without subscription");
        state.space.remove(&name)?;
        report.orphan_cursors += 1;
    }
    Ok(())
}

/// Drops references that cannot be resolved and counts the rest per ack entry.
fn drop_dangling_refs(
    state: &mut TopicState,
    report: &mut RecoveryReport,
) -> CoreResult<HashMap<EntryHandle, u32>> {
    let mut live_refs: HashMap<EntryHandle, u32> = HashMap::new();

    for cursor in state.cursors.values_mut() {
        let mut dangling = Vec::new();
        for (handle, reference) in cursor.iter() {
            let resolves = state
                .acks
                .get(reference.ack_entry)
                .is_some_and(|entry| entry.message_entry == reference.message_entry)
                && state
                    .messages
                    .get(reference.message_entry)
                    .is_some_and(|message| message.id == reference.message_id);
            if resolves {
                *live_refs.entry(reference.ack_entry).or_default() += 1;
            } else {
                dangling.push(handle);
            }
        }

        for handle in dangling {
            tracing::warn!(subscription = %cursor.key(), %handle, "dropping dangling reference");
            cursor.remove(handle)?;
            report.dangling_refs += 1;
        }
    }
    Ok(live_refs)
}

fn fix_pending_counts(
    state: &mut TopicState,
    live_refs: &HashMap<EntryHandle, u32>,
    report: &mut RecoveryReport,
) -> CoreResult<()> {
    let entries: Vec<(EntryHandle, AckEntry)> =
        state.acks.iter().map(|(handle, entry)| (handle, *entry)).collect();

    for (handle, entry) in entries {
        let live = live_refs.get(&handle).copied().unwrap_or(0);
        if live == 0 {
            tracing::warn!(%handle, pending = entry.pending, "releasing ack entry without references");
            state.acks.remove(handle)?;
            state.messages.remove(entry.message_entry)?;
            report.released_entries += 1;
        } else if live != entry.pending {
            tracing::warn!(%handle, pending = entry.pending, live, "correcting pending count");
            state.acks.update(
                handle,
                AckEntry {
                    pending: live,
                    ..entry
                },
            )?;
            report.corrected_counts += 1;
        }
    }
    Ok(())
}

fn remove_orphan_messages(state: &mut TopicState, report: &mut RecoveryReport) -> CoreResult<()> {
    let referenced: HashSet<EntryHandle> =
        state.acks.iter().map(|(_, entry)| entry.message_entry).collect();
    let orphans: Vec<EntryHandle> = state
        .messages
        .entries()
        .filter(|(handle, _, _)| !referenced.contains(handle))
        .map(|(handle, _, _)| handle)
        .collect();

    for handle in orphans {
        if let Some((id, _)) = state.messages.remove(handle)? {
            tracing::warn!(message_id = %id, "deleting unreferenced message");
            report.orphan_messages += 1;
        }
    }
    Ok(())
}

fn clear_stale_positions(state: &mut TopicState, report: &mut RecoveryReport) -> CoreResult<()> {
    let stale: Vec<_> = state
        .positions
        .entries()
        .filter(|(_, key, position)| {
            state
                .cursors
                .get(*key)
                .and_then(|cursor| resolve_position(cursor, position))
                .is_none()
        })
        .map(|(handle, _, _)| handle)
        .collect();

    for handle in stale {
        if let Some((key, _)) = state.positions.remove(handle)? {
            tracing::warn!(subscription = %key, "clearing stale batch position");
            report.cleared_positions += 1;
        }
    }
    Ok(())
}
