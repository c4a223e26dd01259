//! Outward topic projection.
//!
//! # Invariants
//! - Link values come from the default-to-zero getters, so unset links
//!   always serialize as `0`.
//! - Projection never touches storage.

use crate::model::topic::{Topic, TopicId};
use serde::Serialize;

/// Topic payload exposed to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicView {
    pub id: TopicId,
    pub title: String,
    pub next_topic: TopicId,
    pub previous_topic: TopicId,
}

impl From<&Topic> for TopicView {
    fn from(topic: &Topic) -> Self {
        Self {
            id: topic.id,
            title: topic.title.clone(),
            next_topic: topic.next_topic(),
            previous_topic: topic.previous_topic(),
        }
    }
}
