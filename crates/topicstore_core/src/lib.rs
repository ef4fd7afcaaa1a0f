//! # Topicstore Core
//!
//! Durable message store for publish/subscribe topics.
//!
//! This crate provides:
//! - Journal-backed keyed maps and ordered logs over a [`ContainerSpace`]
//! - The topic store: one shared copy per message, reference counted by an
//!   acknowledgment ledger, with one resumable cursor per durable subscriber
//! - Startup reconciliation of pending counts after a crash
//! - A [`PersistenceAdapter`] that hands out one store per topic
//!
//! ## Example
//!
//! ```rust
//! use topicstore_core::{
//!     CollectingListener, Message, MessageId, MessageStore, PersistenceAdapter,
//!     SubscriptionInfo, TopicMessageStore,
//! };
//!
//! let adapter = PersistenceAdapter::open_in_memory();
//! let topic = adapter.topic_store("prices").unwrap();
//!
//! topic.add_subscription(SubscriptionInfo::new("desk", Some("fx"), "prices"), false).unwrap();
//! topic.add_message(Message::new("m1", "EURUSD 1.09")).unwrap();
//!
//! let mut listener = CollectingListener::new();
//! topic.recover_all("desk", Some("fx"), &mut listener).unwrap();
//! topic.acknowledge("desk", Some("fx"), &MessageId::from("m1")).unwrap();
//! assert_eq!(topic.stats().unwrap().messages, 0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod config;
pub mod container;
mod error;
mod space;
pub mod topic;
mod types;

pub use adapter::PersistenceAdapter;
pub use config::StoreConfig;
pub use error::{CoreError, CoreResult};
pub use space::{ContainerSpace, DirectorySpace, MemorySpace};
pub use topic::{
    CollectingListener, DurableTopicStore, Message, MessageStore, RecoveryListener,
    RecoveryReport, SubscriptionInfo, TopicMessageStore, TopicStats,
};
pub use types::{EntryHandle, MessageId, SubscriptionKey};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
