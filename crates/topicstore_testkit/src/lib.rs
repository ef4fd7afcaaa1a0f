//! # Topicstore Testkit
//!
//! Test utilities for the durable topic store.
//!
//! This crate provides:
//! - Topic fixtures over memory or a temporary directory, with reopen
//! - A crash-injecting container space
//! - An invariant checker that reads a topic's containers directly
//! - proptest strategies for topic workloads and a reference model
//!
//! ## Usage
//!
//! ```rust
//! use topicstore_testkit::prelude::*;
//!
//! let topic = TestTopic::memory();
//! topic.subscribe("a");
//! topic.publish("m1");
//! assert_eq!(topic.recover_all_ids("a"), vec!["m1"]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod invariants;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::invariants::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
pub use invariants::*;
