//! Core domain logic for chained forum topics.
//! This crate owns the invariant that a topic's `next_topic` is mirrored by
//! the target's `previous_topic`.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::chain::{
    normalize_proposed_value, ChainField, ChainLinks, InvalidLinkValue, ReconcileAction,
    ReconcileOutcome, UNSET_TOPIC,
};
pub use model::topic::{Post, PostId, Topic, TopicCreateOptions, TopicId};
pub use repo::topic_repo::{
    FieldRevision, RepoError, RepoResult, SqliteTopicRepository, TopicListQuery, TopicRepository,
};
pub use service::chain_service::{
    ChainService, ChainServiceError, TopicRevisionRequest, TopicRevisionResult,
};
pub use service::events::ChainEvent;
pub use service::serialize::TopicView;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
