//! Domain model for chained topics.
//!
//! # Responsibility
//! - Define topic/post records referenced by the chain core.
//! - Own the typed chain-link attributes and their reconcile planning.
//!
//! # Invariants
//! - Topic ids are positive and never reused.
//! - `0` and "never set" are the same observable link state.

pub mod chain;
pub mod topic;
