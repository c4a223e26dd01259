//! Typed events consumed by the chain service.

use crate::model::topic::{Post, TopicCreateOptions, TopicId};

/// Host events that can change a topic's chain links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    /// A topic and its first post were created.
    TopicCreated {
        topic_id: TopicId,
        options: TopicCreateOptions,
    },
    /// A post was edited; `topic_changed` is set when topic-level fields
    /// (title or chain links) were part of the edit.
    PostEdited { post: Post, topic_changed: bool },
}
