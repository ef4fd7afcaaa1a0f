//! Durable topic message store.
//!
//! A topic keeps one physical copy of each message and lets every durable
//! subscriber walk its own cursor over the messages it has not acknowledged.
//!
//! ## Containers
//!
//! Each topic lives in these containers of its space:
//!
//! | Container | Shape | Holds |
//! |-----------|-------|-------|
//! | `<topic>/messages` | keyed | [`Message`] by [`MessageId`](crate::MessageId) |
//! | `<topic>/acks` | ordered | [`AckEntry`], one per stored message |
//! | `<topic>/subscriptions` | keyed | [`SubscriptionInfo`] by subscription key |
//! | `<topic>/positions` | keyed | [`BatchPosition`] by subscription key |
//! | `<topic>/subs/<key>` | ordered | [`ConsumerRef`]s of one subscriber |
//!
//! A message is stored once, with an ack entry whose pending count is the
//! number of subscribers present when it was published. Each subscriber's
//! cursor gets a reference to it. Acknowledging or unsubscribing releases a
//! reference; the last release deletes the ack entry and the message.

mod cursor;
mod listener;
mod reconcile;
mod records;
mod store;

pub use listener::{CollectingListener, RecoveryListener};
pub use reconcile::RecoveryReport;
pub use records::{AckEntry, BatchPosition, ConsumerRef, Message, SubscriptionInfo};
pub use store::{DurableTopicStore, MessageStore, SubscriptionStats, TopicMessageStore, TopicStats};

use crate::types::SubscriptionKey;

/// Names of the containers that make up one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicContainers {
    /// Topic name.
    pub topic: String,
    /// Message table.
    pub messages: String,
    /// Acknowledgment ledger.
    pub acks: String,
    /// Subscription registry.
    pub subscriptions: String,
    /// Persisted batch positions.
    pub positions: String,
    cursor_prefix: String,
}

impl TopicContainers {
    /// Container names for `topic`.
    #[must_use]
    pub fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            messages: format!("{topic}/messages"),
            acks: format!("{topic}/acks"),
            subscriptions: format!("{topic}/subscriptions"),
            positions: format!("{topic}/positions"),
            cursor_prefix: format!("{topic}/subs/"),
        }
    }

    /// Name of the cursor log for a subscription.
    #[must_use]
    pub fn cursor(&self, key: &SubscriptionKey) -> String {
        format!("{}{key}", self.cursor_prefix)
    }

    /// Returns whether `name` is a cursor log of this topic.
    #[must_use]
    pub fn is_cursor(&self, name: &str) -> bool {
        name.starts_with(&self.cursor_prefix)
    }
}

/// Returns the topic a container name belongs to.
#[must_use]
pub fn topic_of(container: &str) -> Option<&str> {
    container.split_once('/').map(|(topic, _)| topic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_names_share_topic_prefix() {
        let names = TopicContainers::new("orders");
        let cursor = names.cursor(&SubscriptionKey::new("c1", None));

        assert_eq!(names.acks, "orders/acks");
        assert_eq!(cursor, "orders/subs/c1:NOT_SET");
        assert!(names.is_cursor(&cursor));
        assert!(!names.is_cursor(&names.positions));
        assert_eq!(topic_of(&cursor), Some("orders"));
        assert_eq!(topic_of("bare"), None);
    }
}
