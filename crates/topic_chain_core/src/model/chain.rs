//! Chain-link attributes and reconcile planning.
//!
//! # Responsibility
//! - Provide typed `next_topic` / `previous_topic` accessors with
//!   default-to-zero reads.
//! - Decide what a reconcile pass must do for one source topic.
//! - Normalize raw field values proposed by topic edits.
//!
//! # Invariants
//! - Setters never validate; validation belongs to reconcile planning.
//! - A nil write and a zero write both read back as `0`, but stay distinct
//!   in storage.
//! - `next_topic == id` always plans a reset, never a link.
//! - `previous_topic` is not checked for self-reference.

use crate::model::topic::TopicId;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Observable value of an unset link.
pub const UNSET_TOPIC: TopicId = 0;

/// One of the two tracked chain fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainField {
    NextTopic,
    PreviousTopic,
}

impl ChainField {
    pub const ALL: [ChainField; 2] = [ChainField::NextTopic, ChainField::PreviousTopic];

    /// Stable storage/serialization name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NextTopic => "next_topic",
            Self::PreviousTopic => "previous_topic",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "next_topic" => Some(Self::NextTopic),
            "previous_topic" => Some(Self::PreviousTopic),
            _ => None,
        }
    }
}

impl Display for ChainField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chain links of one topic as stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainLinks {
    next_topic: Option<TopicId>,
    previous_topic: Option<TopicId>,
}

impl ChainLinks {
    pub fn new(next_topic: Option<TopicId>, previous_topic: Option<TopicId>) -> Self {
        Self {
            next_topic,
            previous_topic,
        }
    }

    pub fn next_topic(&self) -> TopicId {
        self.next_topic.unwrap_or(UNSET_TOPIC)
    }

    pub fn previous_topic(&self) -> TopicId {
        self.previous_topic.unwrap_or(UNSET_TOPIC)
    }

    pub fn set_next_topic(&mut self, value: Option<TopicId>) {
        self.next_topic = value;
    }

    pub fn set_previous_topic(&mut self, value: Option<TopicId>) {
        self.previous_topic = value;
    }

    /// Stored value, `None` when nil or never written.
    pub fn raw_next_topic(&self) -> Option<TopicId> {
        self.next_topic
    }

    pub fn raw_previous_topic(&self) -> Option<TopicId> {
        self.previous_topic
    }

    /// Reads `field` with default-to-zero semantics.
    pub fn get(&self, field: ChainField) -> TopicId {
        match field {
            ChainField::NextTopic => self.next_topic(),
            ChainField::PreviousTopic => self.previous_topic(),
        }
    }

    pub fn raw(&self, field: ChainField) -> Option<TopicId> {
        match field {
            ChainField::NextTopic => self.next_topic,
            ChainField::PreviousTopic => self.previous_topic,
        }
    }

    pub fn set(&mut self, field: ChainField, value: Option<TopicId>) {
        match field {
            ChainField::NextTopic => self.set_next_topic(value),
            ChainField::PreviousTopic => self.set_previous_topic(value),
        }
    }

    /// Plans the reconcile step for the topic that owns these links.
    pub fn plan_reconcile(&self, topic_id: TopicId) -> ReconcileAction {
        match self.next_topic() {
            UNSET_TOPIC => ReconcileAction::Noop,
            next if next == topic_id => ReconcileAction::ClearSelfReference,
            next => ReconcileAction::LinkTarget(next),
        }
    }
}

/// What one reconcile pass does to storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// No `next_topic` set.
    Noop,
    /// Reset the source's `next_topic` to `0`.
    ClearSelfReference,
    /// Write the source id into the target's `previous_topic`.
    LinkTarget(TopicId),
}

/// Result of one committed reconcile pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Source has no `next_topic`; nothing written.
    NoLink,
    /// Source pointed at itself; its `next_topic` is now `0`.
    SelfReferenceCleared,
    /// Target's `previous_topic` now holds the source id.
    Linked { target: TopicId },
    /// Target does not exist; source left unchanged.
    TargetMissing { target: TopicId },
}

impl ReconcileOutcome {
    /// Short label used in `chain_reconcile` log events.
    pub fn status(&self) -> &'static str {
        match self {
            Self::NoLink => "noop",
            Self::SelfReferenceCleared => "self_reference_cleared",
            Self::Linked { .. } => "linked",
            Self::TargetMissing { .. } => "target_missing",
        }
    }
}

/// Raw field value that cannot be stored as a topic id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidLinkValue {
    pub field: ChainField,
    pub value: String,
}

impl Display for InvalidLinkValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {} value: `{}`", self.field, self.value)
    }
}

impl Error for InvalidLinkValue {}

/// Normalizes a proposed raw field value.
///
/// Blank input becomes `None` (nil), not `Some(0)`. Anything else must be a
/// non-negative integer.
pub fn normalize_proposed_value(
    field: ChainField,
    proposed: &str,
) -> Result<Option<TopicId>, InvalidLinkValue> {
    let trimmed = proposed.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    match trimmed.parse::<TopicId>() {
        Ok(value) if value >= 0 => Ok(Some(value)),
        _ => Err(InvalidLinkValue {
            field,
            value: proposed.to_string(),
        }),
    }
}
