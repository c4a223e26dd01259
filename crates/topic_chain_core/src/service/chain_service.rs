//! Chain-link reconciliation service.
//!
//! # Responsibility
//! - Apply creation options and field revisions to topic chain links.
//! - Propagate `next_topic` into the target's `previous_topic`.
//! - Dispatch typed host events to the matching handler.
//!
//! # Invariants
//! - A self-referencing `next_topic` is reset to `0` in the same pass that
//!   detects it.
//! - A missing target never aborts the triggering flow and never clears the
//!   source's `next_topic`.
//! - Edits with `topic_changed == false` never write chain links.
//! - Storage failures propagate unchanged; nothing is retried here.

use crate::config::CoreConfig;
use crate::model::chain::{normalize_proposed_value, ChainField, InvalidLinkValue, ReconcileOutcome};
use crate::model::topic::{Post, PostId, Topic, TopicCreateOptions, TopicId};
use crate::repo::topic_repo::{FieldRevision, RepoError, TopicListQuery, TopicRepository};
use crate::service::events::ChainEvent;
use crate::service::serialize::TopicView;
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from chain service operations.
#[derive(Debug)]
pub enum ChainServiceError {
    /// Topic title is blank after trim.
    InvalidTitle,
    /// Proposed chain field value is not a topic id.
    InvalidFieldValue(InvalidLinkValue),
    TopicNotFound(TopicId),
    PostNotFound(PostId),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for ChainServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTitle => write!(f, "topic title must not be blank"),
            Self::InvalidFieldValue(err) => write!(f, "{err}"),
            Self::TopicNotFound(id) => write!(f, "topic not found: {id}"),
            Self::PostNotFound(id) => write!(f, "post not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ChainServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidFieldValue(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ChainServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::TopicNotFound(id) => Self::TopicNotFound(id),
            RepoError::PostNotFound(id) => Self::PostNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<InvalidLinkValue> for ChainServiceError {
    fn from(value: InvalidLinkValue) -> Self {
        Self::InvalidFieldValue(value)
    }
}

/// Topic-level fields proposed by one edit of a topic's first post.
///
/// `None` means the field is not part of the edit. A blank string clears the
/// link (nil write).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicRevisionRequest {
    pub title: Option<String>,
    pub next_topic: Option<String>,
    pub previous_topic: Option<String>,
}

impl TopicRevisionRequest {
    fn proposed(&self, field: ChainField) -> Option<&str> {
        match field {
            ChainField::NextTopic => self.next_topic.as_deref(),
            ChainField::PreviousTopic => self.previous_topic.as_deref(),
        }
    }

    fn touches_topic(&self) -> bool {
        self.title.is_some() || self.next_topic.is_some() || self.previous_topic.is_some()
    }
}

/// Result of one topic edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRevisionResult {
    /// Revisions recorded by this edit, in field order.
    pub revisions: Vec<FieldRevision>,
    /// `None` when the edit did not touch topic-level fields.
    pub reconcile: Option<ReconcileOutcome>,
}

/// Chain service facade over repository implementations.
pub struct ChainService<R: TopicRepository> {
    repo: R,
    config: CoreConfig,
}

impl<R: TopicRepository> ChainService<R> {
    /// Creates a service with default configuration.
    pub fn new(repo: R) -> Self {
        Self::with_config(repo, CoreConfig::default())
    }

    pub fn with_config(repo: R, config: CoreConfig) -> Self {
        Self { repo, config }
    }

    /// Creates a topic with its first post, then reconciles its links.
    ///
    /// The topic, its first post and the option keys commit together. The
    /// reconcile pass runs in its own transaction afterwards; if it fails the
    /// topic stays created with its links as supplied, and a later
    /// `reconcile_after_write` or redelivered creation event completes it.
    pub fn create_topic(
        &mut self,
        title: impl Into<String>,
        first_post_raw: &str,
        options: TopicCreateOptions,
    ) -> Result<Topic, ChainServiceError> {
        let title = normalize_title(title.into())?;
        let (topic, _first_post) = self
            .repo
            .create_topic(title.as_str(), first_post_raw, options)?;
        info!(
            "event=topic_create module=chain status=ok topic_id={}",
            topic.id
        );

        self.reconcile_after_write(topic.id)?;
        self.repo
            .get_topic(topic.id)?
            .ok_or(ChainServiceError::TopicNotFound(topic.id))
    }

    /// Writes creation options onto the topic, then reconciles.
    ///
    /// Only the supplied keys are written, so running it again for the same
    /// creation event keeps links that other topics wrote in between.
    pub fn on_topic_created(
        &mut self,
        topic_id: TopicId,
        options: TopicCreateOptions,
    ) -> Result<ReconcileOutcome, ChainServiceError> {
        self.repo.apply_create_options(topic_id, options)?;
        self.reconcile_after_write(topic_id)
    }

    /// Enforces the reciprocal link for `topic_id`'s `next_topic`.
    pub fn reconcile_after_write(
        &mut self,
        topic_id: TopicId,
    ) -> Result<ReconcileOutcome, ChainServiceError> {
        let outcome = self.repo.reconcile_chain_links(topic_id)?;
        match outcome {
            ReconcileOutcome::NoLink => debug!(
                "event=chain_reconcile module=chain status={} topic_id={}",
                outcome.status(),
                topic_id
            ),
            ReconcileOutcome::SelfReferenceCleared => info!(
                "event=chain_reconcile module=chain status={} topic_id={}",
                outcome.status(),
                topic_id
            ),
            ReconcileOutcome::Linked { target } => info!(
                "event=chain_reconcile module=chain status={} topic_id={} target_id={}",
                outcome.status(),
                topic_id,
                target
            ),
            ReconcileOutcome::TargetMissing { target } => warn!(
                "event=chain_reconcile module=chain status={} topic_id={} target_id={} error_code=target_not_found",
                outcome.status(),
                topic_id,
                target
            ),
        }
        Ok(outcome)
    }

    /// Reconciles the post's topic when the edit changed topic-level fields.
    pub fn on_post_edited(
        &mut self,
        post: &Post,
        topic_changed: bool,
    ) -> Result<Option<ReconcileOutcome>, ChainServiceError> {
        if !topic_changed {
            debug!(
                "event=chain_reconcile module=chain status=skipped post_id={} topic_id={}",
                post.id, post.topic_id
            );
            return Ok(None);
        }

        self.reconcile_after_write(post.topic_id).map(Some)
    }

    /// Records and writes a revision of one chain field.
    ///
    /// Blank input is written as nil. Reconciliation follows only when
    /// `reconcile_on_field_revision` is enabled and `field` is `next_topic`;
    /// otherwise the surrounding edit's `on_post_edited` drives it.
    pub fn on_field_revision(
        &mut self,
        topic_id: TopicId,
        field: ChainField,
        proposed: &str,
    ) -> Result<FieldRevision, ChainServiceError> {
        let value = normalize_proposed_value(field, proposed)?;
        let revision = self.repo.apply_field_revision(topic_id, field, value)?;
        log_revision(&revision);

        if self.config.reconcile_on_field_revision && field == ChainField::NextTopic {
            self.reconcile_after_write(topic_id)?;
        }
        Ok(revision)
    }

    /// Applies one edit of a topic's first post.
    ///
    /// All proposed values are validated before anything is written. The
    /// title and every field revision commit in one transaction; the
    /// reconcile pass that follows commits separately.
    pub fn revise_topic(
        &mut self,
        post_id: PostId,
        request: &TopicRevisionRequest,
    ) -> Result<TopicRevisionResult, ChainServiceError> {
        let post = self
            .repo
            .get_post(post_id)?
            .ok_or(ChainServiceError::PostNotFound(post_id))?;

        let title = request.title.clone().map(normalize_title).transpose()?;
        let mut pending = Vec::new();
        for field in ChainField::ALL {
            if let Some(proposed) = request.proposed(field) {
                pending.push((field, normalize_proposed_value(field, proposed)?));
            }
        }

        let revisions = self
            .repo
            .apply_topic_revision(post.topic_id, title.as_deref(), &pending)?;
        for revision in &revisions {
            log_revision(revision);
        }

        let reconcile = self.on_post_edited(&post, request.touches_topic())?;
        Ok(TopicRevisionResult {
            revisions,
            reconcile,
        })
    }

    /// Single consumer for typed host events.
    pub fn handle_event(
        &mut self,
        event: ChainEvent,
    ) -> Result<Option<ReconcileOutcome>, ChainServiceError> {
        match event {
            ChainEvent::TopicCreated { topic_id, options } => {
                self.on_topic_created(topic_id, options).map(Some)
            }
            ChainEvent::PostEdited {
                post,
                topic_changed,
            } => self.on_post_edited(&post, topic_changed),
        }
    }

    pub fn get_topic(&self, topic_id: TopicId) -> Result<Option<Topic>, ChainServiceError> {
        Ok(self.repo.get_topic(topic_id)?)
    }

    pub fn get_post(&self, post_id: PostId) -> Result<Option<Post>, ChainServiceError> {
        Ok(self.repo.get_post(post_id)?)
    }

    pub fn list_topics(&self, query: &TopicListQuery) -> Result<Vec<Topic>, ChainServiceError> {
        Ok(self.repo.list_topics(query)?)
    }

    /// Topic payload for a single topic view.
    pub fn topic_view(&self, topic_id: TopicId) -> Result<Option<TopicView>, ChainServiceError> {
        Ok(self.repo.get_topic(topic_id)?.as_ref().map(TopicView::from))
    }

    /// Topic payloads for a topic list; links come preloaded with the list.
    pub fn list_topic_views(
        &self,
        query: &TopicListQuery,
    ) -> Result<Vec<TopicView>, ChainServiceError> {
        let topics = self.repo.list_topics(query)?;
        Ok(topics.iter().map(TopicView::from).collect())
    }

    pub fn field_revisions(
        &self,
        topic_id: TopicId,
    ) -> Result<Vec<FieldRevision>, ChainServiceError> {
        Ok(self.repo.list_field_revisions(topic_id)?)
    }

}

fn log_revision(revision: &FieldRevision) {
    info!(
        "event=chain_field_revision module=chain status=ok topic_id={} field={} old_value={} new_value={}",
        revision.topic_id,
        revision.field,
        revision.old_value,
        revision
            .new_value
            .map_or_else(|| "nil".to_string(), |value| value.to_string())
    );
}

fn normalize_title(title: String) -> Result<String, ChainServiceError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ChainServiceError::InvalidTitle);
    }
    Ok(trimmed.to_string())
}
