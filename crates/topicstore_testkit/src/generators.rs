//! Property-based test generators using proptest.
//!
//! Provides strategies for topic workloads and a reference model that
//! predicts what a topic store must report after each operation.

use proptest::prelude::*;
use std::collections::BTreeMap;

/// Number of distinct clients workloads draw from.
pub const CLIENTS: usize = 3;

/// Client id for index `i`.
pub fn client_name(i: usize) -> String {
    format!("client-{}", i % CLIENTS)
}

/// One step of a topic workload.
#[derive(Debug, Clone)]
pub enum TopicOp {
    /// Subscribe a client.
    Subscribe(usize),
    /// Unsubscribe a client.
    Unsubscribe(usize),
    /// Publish a new message.
    Publish,
    /// Acknowledge the `n`th pending message of a client.
    Ack(usize, usize),
    /// Acknowledge an id the client already acknowledged or never had.
    AckUnknown(usize),
    /// Batch-recover up to `max` messages for a client.
    RecoverNext(usize, usize),
    /// Forget a client's batch position.
    ResetBatching(usize),
    /// Drop the store and open it again.
    Reopen,
}

/// Strategy for one workload step.
pub fn topic_op_strategy() -> impl Strategy<Value = TopicOp> {
    let client = 0..CLIENTS;
    prop_oneof![
        2 => client.clone().prop_map(TopicOp::Subscribe),
        1 => client.clone().prop_map(TopicOp::Unsubscribe),
        5 => Just(TopicOp::Publish),
        3 => (client.clone(), any::<usize>()).prop_map(|(c, n)| TopicOp::Ack(c, n)),
        1 => client.clone().prop_map(TopicOp::AckUnknown),
        3 => (client.clone(), 0..4usize).prop_map(|(c, m)| TopicOp::RecoverNext(c, m)),
        1 => client.prop_map(TopicOp::ResetBatching),
        1 => Just(TopicOp::Reopen),
    ]
}

/// Strategy for a workload of up to `max_len` steps.
pub fn topic_workload_strategy(max_len: usize) -> impl Strategy<Value = Vec<TopicOp>> {
    prop::collection::vec(topic_op_strategy(), 1..max_len)
}

#[derive(Debug, Clone, Default)]
struct ModelCursor {
    pending: Vec<String>,
    position: Option<String>,
}

/// Reference model of one topic.
///
/// Tracks, per subscriber, the ids it still owes an acknowledgment for and
/// its batch position, and per message the number of subscribers that owe one.
#[derive(Debug, Clone, Default)]
pub struct TopicModel {
    cursors: BTreeMap<String, ModelCursor>,
    pending_counts: BTreeMap<String, usize>,
    next_id: usize,
}

impl TopicModel {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber. Existing subscribers are unchanged.
    pub fn subscribe(&mut self, client: &str) {
        self.cursors.entry(client.to_string()).or_default();
    }

    /// Removes a subscriber, releasing everything it still owed.
    pub fn unsubscribe(&mut self, client: &str) {
        if let Some(cursor) = self.cursors.remove(client) {
            for id in cursor.pending {
                self.release(&id);
            }
        }
    }

    /// Publishes a message, returning its id and whether it was stored.
    ///
    /// Ids are allocated even when nobody is subscribed.
    pub fn publish(&mut self) -> (String, bool) {
        let id = format!("m{}", self.next_id);
        self.next_id += 1;
        if self.cursors.is_empty() {
            return (id, false);
        }
        for cursor in self.cursors.values_mut() {
            cursor.pending.push(id.clone());
        }
        self.pending_counts.insert(id.clone(), self.cursors.len());
        (id, true)
    }

    /// The `n`th (wrapping) pending id of `client`.
    pub fn nth_pending(&self, client: &str, n: usize) -> Option<String> {
        let cursor = self.cursors.get(client)?;
        if cursor.pending.is_empty() {
            return None;
        }
        Some(cursor.pending[n % cursor.pending.len()].clone())
    }

    /// Acknowledges `id` for `client`. Unknown pairs are ignored.
    pub fn ack(&mut self, client: &str, id: &str) {
        let Some(cursor) = self.cursors.get_mut(client) else {
            return;
        };
        let Some(index) = cursor.pending.iter().position(|p| p == id) else {
            return;
        };
        cursor.pending.remove(index);
        if cursor.pending.is_empty() {
            cursor.position = None;
        }
        self.release(id);
    }

    /// Ids one `recover_next(max)` call must deliver, advancing the position.
    pub fn recover_next(&mut self, client: &str, max: usize) -> Vec<String> {
        let Some(cursor) = self.cursors.get_mut(client) else {
            return Vec::new();
        };
        let start = cursor
            .position
            .as_ref()
            .and_then(|pos| cursor.pending.iter().position(|p| p == pos))
            .map_or(0, |index| index + 1);

        let delivered: Vec<String> = cursor.pending.iter().skip(start).take(max).cloned().collect();
        if let Some(last) = delivered.last() {
            cursor.position = Some(last.clone());
        }
        delivered
    }

    /// Forgets the batch position of `client`.
    pub fn reset_batching(&mut self, client: &str) {
        if let Some(cursor) = self.cursors.get_mut(client) {
            cursor.position = None;
        }
    }

    /// Every id pending for `client`, oldest first.
    pub fn pending(&self, client: &str) -> Vec<String> {
        self.cursors
            .get(client)
            .map(|c| c.pending.clone())
            .unwrap_or_default()
    }

    /// Messages that must still be stored.
    pub fn stored_messages(&self) -> usize {
        self.pending_counts.len()
    }

    /// Pending count the ack entry of `id` must hold, if it still exists.
    pub fn pending_count(&self, id: &str) -> Option<usize> {
        self.pending_counts.get(id).copied()
    }

    /// Registered subscribers.
    pub fn subscribers(&self) -> Vec<String> {
        self.cursors.keys().cloned().collect()
    }

    fn release(&mut self, id: &str) {
        if let Some(count) = self.pending_counts.get_mut(id) {
            *count -= 1;
            if *count == 0 {
                self.pending_counts.remove(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_frees_message_after_last_ack() {
        let mut model = TopicModel::new();
        model.subscribe("a");
        model.subscribe("b");
        let (id, stored) = model.publish();
        assert!(stored);
        assert_eq!(model.pending_count(&id), Some(2));

        model.ack("a", &id);
        model.ack("a", &id);
        assert_eq!(model.pending_count(&id), Some(1));
        model.unsubscribe("b");
        assert_eq!(model.stored_messages(), 0);
    }

    #[test]
    fn model_batch_position_restarts_when_acked() {
        let mut model = TopicModel::new();
        model.subscribe("a");
        for _ in 0..3 {
            model.publish();
        }
        assert_eq!(model.recover_next("a", 2), vec!["m0", "m1"]);
        model.ack("a", "m1");
        assert_eq!(model.recover_next("a", 5), vec!["m0", "m2"]);
    }
}
