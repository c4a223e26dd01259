//! Topic and post records.
//!
//! # Responsibility
//! - Define the topic/post shapes the chain core reads and writes.
//! - Carry creation options that may declare initial chain links.
//!
//! # Invariants
//! - `Topic::id` is assigned by storage and immutable afterwards.
//! - Chain links live in `Topic::links`; readers go through its getters.

use crate::model::chain::{ChainField, ChainLinks};
use serde::Deserialize;

/// Storage-assigned topic identifier.
pub type TopicId = i64;

/// Storage-assigned post identifier.
pub type PostId = i64;

/// Discussion topic with its chain links preloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub id: TopicId,
    pub title: String,
    pub links: ChainLinks,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

impl Topic {
    /// `next_topic` with default-to-zero semantics.
    pub fn next_topic(&self) -> TopicId {
        self.links.next_topic()
    }

    /// `previous_topic` with default-to-zero semantics.
    pub fn previous_topic(&self) -> TopicId {
        self.links.previous_topic()
    }
}

/// One post inside a topic. Post number 1 is the topic's first post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: PostId,
    pub topic_id: TopicId,
    pub post_number: i64,
    pub raw: String,
}

/// Options supplied when a topic is created.
///
/// Absent keys deserialize to `None` and are never written; on a fresh
/// topic they stay nil.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TopicCreateOptions {
    pub next_topic: Option<TopicId>,
    pub previous_topic: Option<TopicId>,
}

impl TopicCreateOptions {
    pub fn with_next_topic(next_topic: TopicId) -> Self {
        Self {
            next_topic: Some(next_topic),
            previous_topic: None,
        }
    }

    /// Supplied keys in field order; absent keys are skipped.
    ///
    /// Writers touch only these fields, so a stored value for an absent key
    /// survives a redelivered creation event.
    pub fn present_fields(self) -> impl Iterator<Item = (ChainField, TopicId)> {
        [
            (ChainField::NextTopic, self.next_topic),
            (ChainField::PreviousTopic, self.previous_topic),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.map(|value| (field, value)))
    }
}
