//! Core use-case services.
//!
//! # Responsibility
//! - Drive chain-link reconciliation from topic create/edit flows.
//! - Project topics for outward consumers.

pub mod chain_service;
pub mod events;
pub mod serialize;
