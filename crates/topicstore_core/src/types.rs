//! Core type definitions for the topic store.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, stable reference to an entry in a container.
///
/// Handles are assigned in increasing order within a container and are never
/// reused, so a handle stays valid across compaction until its entry is
/// removed. Use `refresh` on the owning container to re-validate one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryHandle(pub u64);

impl EntryHandle {
    /// Creates a handle from its raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw handle value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry:{}", self.0)
    }
}

/// Unique identity of a published message.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Creates a message id from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random message id.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("ID:{}", uuid::Uuid::new_v4()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identity of a durable subscription within a topic.
///
/// Formed as `client_id + ":" + subscription_name`, with `NOT_SET` standing
/// in for a missing subscription name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriptionKey(String);

impl SubscriptionKey {
    /// Placeholder used when a subscription has no name.
    pub const UNNAMED: &'static str = "NOT_SET";

    /// Builds the key for a client id and optional subscription name.
    #[must_use]
    pub fn new(client_id: &str, subscription_name: Option<&str>) -> Self {
        let name = subscription_name.unwrap_or(Self::UNNAMED);
        Self(format!("{client_id}:{name}"))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
