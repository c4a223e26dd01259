//! Topic repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Resolve topics and posts by id (topic directory).
//! - Store chain links in the typed `topic_chain_fields` side-table.
//! - Record field revisions and run the reconcile step transactionally.
//!
//! # Invariants
//! - A topic without a side-table row reads as `next_topic = 0`,
//!   `previous_topic = 0`.
//! - Single-field writes never clobber the other chain field.
//! - Creation options and topic edits commit all of their writes or none.
//! - Reconcile reads the source, resolves the target, and writes the
//!   reciprocal link inside one `BEGIN IMMEDIATE` transaction.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::chain::{ChainField, ChainLinks, ReconcileAction, ReconcileOutcome};
use crate::model::topic::{Post, PostId, Topic, TopicCreateOptions, TopicId};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

const TOPIC_SELECT_SQL: &str = "SELECT
    t.id AS id,
    t.title AS title,
    f.next_topic AS next_topic,
    f.previous_topic AS previous_topic,
    t.created_at AS created_at,
    t.updated_at AS updated_at
FROM topics t
LEFT JOIN topic_chain_fields f ON f.topic_id = t.id";

const TOPICS_DEFAULT_LIMIT: u32 = 30;
const TOPICS_LIMIT_MAX: u32 = 100;

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from topic repository operations.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    TopicNotFound(TopicId),
    PostNotFound(PostId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::TopicNotFound(id) => write!(f, "topic not found: {id}"),
            Self::PostNotFound(id) => write!(f, "post not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "topic repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "topic repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted topic data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for listing topics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicListQuery {
    /// Defaults to 30 and clamps to 100.
    pub limit: Option<u32>,
    pub offset: u32,
}

/// One recorded revision of a chain field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRevision {
    pub id: i64,
    pub topic_id: TopicId,
    pub field: ChainField,
    /// Value read through the default-to-zero getter before the write.
    pub old_value: TopicId,
    /// Value written; `None` is a nil write.
    pub new_value: Option<TopicId>,
    /// Epoch milliseconds.
    pub created_at: i64,
}

/// Repository interface for topics, posts and their chain links.
pub trait TopicRepository {
    /// Creates a topic, its first post and the supplied option keys in one
    /// transaction.
    fn create_topic(
        &mut self,
        title: &str,
        first_post_raw: &str,
        options: TopicCreateOptions,
    ) -> RepoResult<(Topic, Post)>;
    /// Loads one topic with links preloaded.
    fn get_topic(&self, id: TopicId) -> RepoResult<Option<Topic>>;
    /// Lists topics ordered by `id ASC`, links preloaded in the same query.
    fn list_topics(&self, query: &TopicListQuery) -> RepoResult<Vec<Topic>>;
    fn get_post(&self, id: PostId) -> RepoResult<Option<Post>>;
    /// Reads both chain fields of an existing topic.
    fn load_chain_links(&self, id: TopicId) -> RepoResult<ChainLinks>;
    /// Persists both chain fields as given, nil values included.
    fn save_chain_links(&self, id: TopicId, links: &ChainLinks) -> RepoResult<()>;
    /// Writes only the option keys that are present, in one transaction.
    fn apply_create_options(
        &mut self,
        id: TopicId,
        options: TopicCreateOptions,
    ) -> RepoResult<()>;
    /// Records a revision and writes the new value in one transaction.
    fn apply_field_revision(
        &mut self,
        id: TopicId,
        field: ChainField,
        new_value: Option<TopicId>,
    ) -> RepoResult<FieldRevision>;
    /// Applies one topic edit: optional title plus field revisions, all or
    /// nothing.
    fn apply_topic_revision(
        &mut self,
        id: TopicId,
        title: Option<&str>,
        fields: &[(ChainField, Option<TopicId>)],
    ) -> RepoResult<Vec<FieldRevision>>;
    /// Lists revisions of one topic, oldest first.
    fn list_field_revisions(&self, id: TopicId) -> RepoResult<Vec<FieldRevision>>;
    /// Runs one reconcile pass for `id` and commits its writes.
    fn reconcile_chain_links(&mut self, id: TopicId) -> RepoResult<ReconcileOutcome>;
}

/// SQLite-backed topic repository.
pub struct SqliteTopicRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteTopicRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl TopicRepository for SqliteTopicRepository<'_> {
    fn create_topic(
        &mut self,
        title: &str,
        first_post_raw: &str,
        options: TopicCreateOptions,
    ) -> RepoResult<(Topic, Post)> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute("INSERT INTO topics (title) VALUES (?1);", [title])?;
        let topic_id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO posts (topic_id, post_number, raw) VALUES (?1, 1, ?2);",
            params![topic_id, first_post_raw],
        )?;
        let post_id = tx.last_insert_rowid();
        for (field, value) in options.present_fields() {
            write_field(&tx, topic_id, field, Some(value))?;
        }

        let topic = load_topic(&tx, topic_id)?.ok_or(RepoError::TopicNotFound(topic_id))?;
        let post = load_post(&tx, post_id)?.ok_or(RepoError::PostNotFound(post_id))?;
        tx.commit()?;
        Ok((topic, post))
    }

    fn get_topic(&self, id: TopicId) -> RepoResult<Option<Topic>> {
        load_topic(self.conn, id)
    }

    fn list_topics(&self, query: &TopicListQuery) -> RepoResult<Vec<Topic>> {
        let limit = normalize_topic_limit(query.limit);
        let mut stmt = self.conn.prepare(&format!(
            "{TOPIC_SELECT_SQL}
             ORDER BY t.id ASC
             LIMIT ?1 OFFSET ?2;"
        ))?;
        let mut rows = stmt.query(params![i64::from(limit), i64::from(query.offset)])?;
        let mut topics = Vec::new();
        while let Some(row) = rows.next()? {
            topics.push(parse_topic_row(row)?);
        }
        Ok(topics)
    }

    fn get_post(&self, id: PostId) -> RepoResult<Option<Post>> {
        load_post(self.conn, id)
    }

    fn load_chain_links(&self, id: TopicId) -> RepoResult<ChainLinks> {
        load_links(self.conn, id)?.ok_or(RepoError::TopicNotFound(id))
    }

    fn save_chain_links(&self, id: TopicId, links: &ChainLinks) -> RepoResult<()> {
        if !topic_exists(self.conn, id)? {
            return Err(RepoError::TopicNotFound(id));
        }

        self.conn.execute(
            "INSERT INTO topic_chain_fields (topic_id, next_topic, previous_topic)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(topic_id) DO UPDATE SET
                next_topic = excluded.next_topic,
                previous_topic = excluded.previous_topic;",
            params![id, links.raw_next_topic(), links.raw_previous_topic()],
        )?;
        Ok(())
    }

    fn apply_create_options(
        &mut self,
        id: TopicId,
        options: TopicCreateOptions,
    ) -> RepoResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !topic_exists(&tx, id)? {
            return Err(RepoError::TopicNotFound(id));
        }
        for (field, value) in options.present_fields() {
            write_field(&tx, id, field, Some(value))?;
        }
        tx.commit()?;
        Ok(())
    }

    fn apply_field_revision(
        &mut self,
        id: TopicId,
        field: ChainField,
        new_value: Option<TopicId>,
    ) -> RepoResult<FieldRevision> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let revision = record_revision(&tx, id, field, new_value)?;
        tx.commit()?;
        Ok(revision)
    }

    fn apply_topic_revision(
        &mut self,
        id: TopicId,
        title: Option<&str>,
        fields: &[(ChainField, Option<TopicId>)],
    ) -> RepoResult<Vec<FieldRevision>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if let Some(title) = title {
            let changed = tx.execute(
                "UPDATE topics
                 SET
                    title = ?2,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?1;",
                params![id, title],
            )?;
            if changed == 0 {
                return Err(RepoError::TopicNotFound(id));
            }
        }

        let mut revisions = Vec::with_capacity(fields.len());
        for &(field, new_value) in fields {
            revisions.push(record_revision(&tx, id, field, new_value)?);
        }
        tx.commit()?;
        Ok(revisions)
    }

    fn list_field_revisions(&self, id: TopicId) -> RepoResult<Vec<FieldRevision>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, topic_id, field_name, old_value, new_value, created_at
             FROM topic_revisions
             WHERE topic_id = ?1
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([id])?;
        let mut revisions = Vec::new();
        while let Some(row) = rows.next()? {
            revisions.push(parse_revision_row(row)?);
        }
        Ok(revisions)
    }

    fn reconcile_chain_links(&mut self, id: TopicId) -> RepoResult<ReconcileOutcome> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let links = load_links(&tx, id)?.ok_or(RepoError::TopicNotFound(id))?;

        let outcome = match links.plan_reconcile(id) {
            ReconcileAction::Noop => ReconcileOutcome::NoLink,
            ReconcileAction::ClearSelfReference => {
                write_field(&tx, id, ChainField::NextTopic, Some(0))?;
                ReconcileOutcome::SelfReferenceCleared
            }
            ReconcileAction::LinkTarget(target) => {
                if topic_exists(&tx, target)? {
                    write_field(&tx, target, ChainField::PreviousTopic, Some(id))?;
                    ReconcileOutcome::Linked { target }
                } else {
                    ReconcileOutcome::TargetMissing { target }
                }
            }
        };

        tx.commit()?;
        Ok(outcome)
    }
}

/// Normalizes list limit according to the topic list contract.
pub fn normalize_topic_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => TOPICS_DEFAULT_LIMIT,
        Some(value) if value > TOPICS_LIMIT_MAX => TOPICS_LIMIT_MAX,
        Some(value) => value,
    }
}

fn load_topic(conn: &Connection, id: TopicId) -> RepoResult<Option<Topic>> {
    let mut stmt = conn.prepare(&format!("{TOPIC_SELECT_SQL} WHERE t.id = ?1;"))?;
    let mut rows = stmt.query([id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_topic_row(row)?));
    }
    Ok(None)
}

fn load_post(conn: &Connection, id: PostId) -> RepoResult<Option<Post>> {
    let post = conn
        .query_row(
            "SELECT id, topic_id, post_number, raw
             FROM posts
             WHERE id = ?1;",
            [id],
            |row| {
                Ok(Post {
                    id: row.get("id")?,
                    topic_id: row.get("topic_id")?,
                    post_number: row.get("post_number")?,
                    raw: row.get("raw")?,
                })
            },
        )
        .optional()?;
    Ok(post)
}

/// Returns `None` when the topic itself does not exist.
fn load_links(conn: &Connection, id: TopicId) -> RepoResult<Option<ChainLinks>> {
    let links = conn
        .query_row(
            "SELECT f.next_topic, f.previous_topic
             FROM topics t
             LEFT JOIN topic_chain_fields f ON f.topic_id = t.id
             WHERE t.id = ?1;",
            [id],
            |row| {
                Ok(ChainLinks::new(
                    row.get::<_, Option<TopicId>>(0)?,
                    row.get::<_, Option<TopicId>>(1)?,
                ))
            },
        )
        .optional()?;
    Ok(links)
}

/// Inserts a revision row for the current value, then writes `new_value`.
fn record_revision(
    conn: &Connection,
    id: TopicId,
    field: ChainField,
    new_value: Option<TopicId>,
) -> RepoResult<FieldRevision> {
    let old_value = load_links(conn, id)?
        .ok_or(RepoError::TopicNotFound(id))?
        .get(field);

    conn.execute(
        "INSERT INTO topic_revisions (topic_id, field_name, old_value, new_value)
         VALUES (?1, ?2, ?3, ?4);",
        params![id, field.as_str(), old_value, new_value],
    )?;
    let revision_id = conn.last_insert_rowid();
    write_field(conn, id, field, new_value)?;

    let revision = conn.query_row(
        "SELECT id, topic_id, field_name, old_value, new_value, created_at
         FROM topic_revisions
         WHERE id = ?1;",
        [revision_id],
        |row| Ok(parse_revision_row(row)),
    )??;
    Ok(revision)
}

fn write_field(
    conn: &Connection,
    id: TopicId,
    field: ChainField,
    value: Option<TopicId>,
) -> RepoResult<()> {
    let column = field.as_str();
    conn.execute(
        &format!(
            "INSERT INTO topic_chain_fields (topic_id, {column})
             VALUES (?1, ?2)
             ON CONFLICT(topic_id) DO UPDATE SET {column} = excluded.{column};"
        ),
        params![id, value],
    )?;
    Ok(())
}

fn topic_exists(conn: &Connection, id: TopicId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM topics WHERE id = ?1);",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn parse_topic_row(row: &Row<'_>) -> RepoResult<Topic> {
    let id: TopicId = row.get("id")?;
    if id <= 0 {
        return Err(RepoError::InvalidData(format!(
            "invalid topic id `{id}` in topics.id"
        )));
    }

    Ok(Topic {
        id,
        title: row.get("title")?,
        links: ChainLinks::new(row.get("next_topic")?, row.get("previous_topic")?),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_revision_row(row: &Row<'_>) -> RepoResult<FieldRevision> {
    let field_name: String = row.get("field_name")?;
    let field = ChainField::parse(&field_name).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid field name `{field_name}` in topic_revisions.field_name"
        ))
    })?;

    Ok(FieldRevision {
        id: row.get("id")?,
        topic_id: row.get("topic_id")?,
        field,
        old_value: row.get("old_value")?,
        new_value: row.get("new_value")?,
        created_at: row.get("created_at")?,
    })
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in ["topics", "posts", "topic_chain_fields", "topic_revisions"] {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}
