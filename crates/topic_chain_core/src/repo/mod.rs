//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the topic directory and chain-field storage contracts.
//! - Isolate SQLite query details from the reconcile service.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`TopicNotFound`,
//!   `PostNotFound`) in addition to DB transport errors.

pub mod topic_repo;
