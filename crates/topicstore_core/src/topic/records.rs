//! Records stored in a topic's containers.

use crate::types::{EntryHandle, MessageId, SubscriptionKey};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A published message.
///
/// One record per message, shared by every subscriber that still owes an
/// acknowledgment for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identity.
    pub id: MessageId,
    /// Opaque payload.
    pub payload: Bytes,
}

impl Message {
    /// Creates a message.
    pub fn new(id: impl Into<MessageId>, payload: impl Into<Bytes>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
        }
    }

    /// Creates a message with a generated id.
    pub fn with_generated_id(payload: impl Into<Bytes>) -> Self {
        Self::new(MessageId::generate(), payload)
    }
}

/// Acknowledgment ledger entry, one per stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckEntry {
    /// Handle of the message in the message table.
    pub message_entry: EntryHandle,
    /// Subscribers that have not acknowledged the message yet.
    pub pending: u32,
}

/// A subscriber's reference to one message it has not acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerRef {
    /// Handle of the message's ack ledger entry.
    pub ack_entry: EntryHandle,
    /// Handle of the message in the message table.
    pub message_entry: EntryHandle,
    /// Identity of the referenced message.
    pub message_id: MessageId,
}

/// Durable subscription metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    /// Client that owns the subscription.
    pub client_id: String,
    /// Subscription name, if the client gave one.
    pub subscription_name: Option<String>,
    /// Topic the subscription belongs to.
    pub destination: String,
    /// Whether the subscriber asked for messages published before it
    /// subscribed. Recorded but not acted on.
    pub retroactive: bool,
}

impl SubscriptionInfo {
    /// Creates subscription metadata for a non-retroactive subscription.
    pub fn new(
        client_id: impl Into<String>,
        subscription_name: Option<&str>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            subscription_name: subscription_name.map(str::to_string),
            destination: destination.into(),
            retroactive: false,
        }
    }

    /// Returns the registry key of this subscription.
    #[must_use]
    pub fn key(&self) -> SubscriptionKey {
        SubscriptionKey::new(&self.client_id, self.subscription_name.as_deref())
    }
}

/// Resume point of a subscriber's batch recovery.
///
/// `entry` is the cursor handle of the last message actually delivered.
/// `message_id` detects a handle that resolves to something else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPosition {
    /// Cursor handle of the last delivered reference.
    pub entry: EntryHandle,
    /// Message id that handle pointed to when it was delivered.
    pub message_id: MessageId,
}
