use rusqlite::Connection;
use topic_chain_core::db::open_db_in_memory;
use topic_chain_core::{
    ChainField, ChainService, ChainServiceError, CoreConfig, ReconcileOutcome,
    SqliteTopicRepository, TopicCreateOptions, TopicRevisionRequest,
};

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn revision_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM topic_revisions;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn field_revision_records_old_and_new_values() {
    let mut conn = setup();
    let repo = SqliteTopicRepository::try_new(&mut conn).unwrap();
    let mut service = ChainService::new(repo);
    let first = service
        .create_topic("First", "body", TopicCreateOptions::default())
        .unwrap();
    let second = service
        .create_topic("Second", "body", TopicCreateOptions::default())
        .unwrap();

    let revision = service
        .on_field_revision(first.id, ChainField::NextTopic, &second.id.to_string())
        .unwrap();
    assert_eq!(revision.topic_id, first.id);
    assert_eq!(revision.field, ChainField::NextTopic);
    assert_eq!(revision.old_value, 0);
    assert_eq!(revision.new_value, Some(second.id));

    let history = service.field_revisions(first.id).unwrap();
    assert_eq!(history, vec![revision]);
}

#[test]
fn field_revision_alone_does_not_reconcile_by_default() {
    let mut conn = setup();
    let repo = SqliteTopicRepository::try_new(&mut conn).unwrap();
    let mut service = ChainService::new(repo);
    let first = service
        .create_topic("First", "body", TopicCreateOptions::default())
        .unwrap();
    let second = service
        .create_topic("Second", "body", TopicCreateOptions::default())
        .unwrap();

    service
        .on_field_revision(first.id, ChainField::NextTopic, &second.id.to_string())
        .unwrap();

    assert_eq!(service.get_topic(first.id).unwrap().unwrap().next_topic(), second.id);
    assert_eq!(
        service.get_topic(second.id).unwrap().unwrap().previous_topic(),
        0
    );
}

#[test]
fn field_revision_reconciles_when_configured() {
    let mut conn = setup();
    let repo = SqliteTopicRepository::try_new(&mut conn).unwrap();
    let config = CoreConfig {
        reconcile_on_field_revision: true,
        ..CoreConfig::default()
    };
    let mut service = ChainService::with_config(repo, config);
    let first = service
        .create_topic("First", "body", TopicCreateOptions::default())
        .unwrap();

    service
        .on_field_revision(first.id, ChainField::NextTopic, &first.id.to_string())
        .unwrap();

    assert_eq!(service.get_topic(first.id).unwrap().unwrap().next_topic(), 0);
}

#[test]
fn blank_revision_value_is_written_as_nil() {
    let mut conn = setup();
    let topic_id = {
        let repo = SqliteTopicRepository::try_new(&mut conn).unwrap();
        let mut service = ChainService::new(repo);
        let topic = service
            .create_topic(
                "Linked",
                "body",
                TopicCreateOptions {
                    next_topic: None,
                    previous_topic: Some(3),
                },
            )
            .unwrap();

        let revision = service
            .on_field_revision(topic.id, ChainField::PreviousTopic, "  ")
            .unwrap();
        assert_eq!(revision.old_value, 3);
        assert_eq!(revision.new_value, None);
        assert_eq!(
            service.get_topic(topic.id).unwrap().unwrap().previous_topic(),
            0
        );
        topic.id
    };

    let stored: Option<i64> = conn
        .query_row(
            "SELECT previous_topic FROM topic_chain_fields WHERE topic_id = ?1;",
            [topic_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(stored, None);
}

#[test]
fn invalid_revision_value_records_nothing() {
    let mut conn = setup();
    {
        let repo = SqliteTopicRepository::try_new(&mut conn).unwrap();
        let mut service = ChainService::new(repo);
        let topic = service
            .create_topic("Topic", "body", TopicCreateOptions::default())
            .unwrap();

        let err = service
            .on_field_revision(topic.id, ChainField::NextTopic, "twenty")
            .unwrap_err();
        match err {
            ChainServiceError::InvalidFieldValue(invalid) => {
                assert_eq!(invalid.field, ChainField::NextTopic);
                assert_eq!(invalid.value, "twenty");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(revision_count(&conn), 0);
}

#[test]
fn revision_for_unknown_topic_is_not_found() {
    let mut conn = setup();
    let repo = SqliteTopicRepository::try_new(&mut conn).unwrap();
    let mut service = ChainService::new(repo);

    let err = service
        .on_field_revision(404, ChainField::NextTopic, "1")
        .unwrap_err();
    assert!(matches!(err, ChainServiceError::TopicNotFound(404)));
}

#[test]
fn revise_topic_applies_fields_then_reconciles() {
    let mut conn = setup();
    let repo = SqliteTopicRepository::try_new(&mut conn).unwrap();
    let mut service = ChainService::new(repo);
    let first = service
        .create_topic("First", "body", TopicCreateOptions::default())
        .unwrap();
    let second = service
        .create_topic("Second", "body", TopicCreateOptions::default())
        .unwrap();
    let first_post = service.get_post(1).unwrap().unwrap();
    assert_eq!(first_post.topic_id, first.id);

    let result = service
        .revise_topic(
            first_post.id,
            &TopicRevisionRequest {
                title: Some(" First, revised ".to_string()),
                next_topic: Some(second.id.to_string()),
                previous_topic: None,
            },
        )
        .unwrap();

    assert_eq!(result.revisions.len(), 1);
    assert_eq!(result.revisions[0].field, ChainField::NextTopic);
    assert_eq!(
        result.reconcile,
        Some(ReconcileOutcome::Linked { target: second.id })
    );

    let first = service.get_topic(first.id).unwrap().unwrap();
    assert_eq!(first.title, "First, revised");
    assert_eq!(first.next_topic(), second.id);
    assert_eq!(
        service.get_topic(second.id).unwrap().unwrap().previous_topic(),
        first.id
    );
}

#[test]
fn revise_topic_pointing_at_itself_is_reset() {
    let mut conn = setup();
    let repo = SqliteTopicRepository::try_new(&mut conn).unwrap();
    let mut service = ChainService::new(repo);
    let topic = service
        .create_topic("Loop", "body", TopicCreateOptions::default())
        .unwrap();
    let post = service.get_post(1).unwrap().unwrap();
    assert_eq!(post.topic_id, topic.id);

    let result = service
        .revise_topic(
            post.id,
            &TopicRevisionRequest {
                next_topic: Some(topic.id.to_string()),
                ..TopicRevisionRequest::default()
            },
        )
        .unwrap();

    assert_eq!(result.reconcile, Some(ReconcileOutcome::SelfReferenceCleared));
    assert_eq!(service.get_topic(topic.id).unwrap().unwrap().next_topic(), 0);
    assert_eq!(service.field_revisions(topic.id).unwrap().len(), 1);
}

#[test]
fn revise_topic_without_topic_fields_skips_reconcile() {
    let mut conn = setup();
    let repo = SqliteTopicRepository::try_new(&mut conn).unwrap();
    let mut service = ChainService::new(repo);
    service
        .create_topic("Quiet", "body", TopicCreateOptions::default())
        .unwrap();

    let result = service
        .revise_topic(1, &TopicRevisionRequest::default())
        .unwrap();
    assert!(result.revisions.is_empty());
    assert_eq!(result.reconcile, None);
}

#[test]
fn revise_topic_validates_everything_before_writing() {
    let mut conn = setup();
    {
        let repo = SqliteTopicRepository::try_new(&mut conn).unwrap();
        let mut service = ChainService::new(repo);
        service
            .create_topic("Original", "body", TopicCreateOptions::default())
            .unwrap();

        let err = service
            .revise_topic(
                1,
                &TopicRevisionRequest {
                    title: Some("Renamed".to_string()),
                    next_topic: Some("2".to_string()),
                    previous_topic: Some("not-an-id".to_string()),
                },
            )
            .unwrap_err();
        assert!(matches!(err, ChainServiceError::InvalidFieldValue(_)));
        assert_eq!(service.get_topic(1).unwrap().unwrap().title, "Original");
    }

    assert_eq!(revision_count(&conn), 0);
}

#[test]
fn revise_topic_for_unknown_post_is_not_found() {
    let mut conn = setup();
    let repo = SqliteTopicRepository::try_new(&mut conn).unwrap();
    let mut service = ChainService::new(repo);

    let err = service
        .revise_topic(9, &TopicRevisionRequest::default())
        .unwrap_err();
    assert!(matches!(err, ChainServiceError::PostNotFound(9)));
}

#[test]
fn revise_topic_storage_failure_leaves_topic_untouched() {
    let mut conn = setup();
    conn.execute_batch(
        "CREATE TRIGGER reject_previous_topic_revision
         BEFORE INSERT ON topic_revisions
         WHEN NEW.field_name = 'previous_topic'
         BEGIN
             SELECT RAISE(ABORT, 'previous_topic revisions rejected');
         END;",
    )
    .unwrap();

    {
        let repo = SqliteTopicRepository::try_new(&mut conn).unwrap();
        let mut service = ChainService::new(repo);
        let first = service
            .create_topic("Original", "body", TopicCreateOptions::default())
            .unwrap();
        let second = service
            .create_topic("Second", "body", TopicCreateOptions::default())
            .unwrap();

        let err = service
            .revise_topic(
                1,
                &TopicRevisionRequest {
                    title: Some("Renamed".to_string()),
                    next_topic: Some(second.id.to_string()),
                    previous_topic: Some("5".to_string()),
                },
            )
            .unwrap_err();
        assert!(matches!(err, ChainServiceError::Repo(_)));

        let first = service.get_topic(first.id).unwrap().unwrap();
        assert_eq!(first.title, "Original");
        assert_eq!(first.next_topic(), 0);
        assert_eq!(first.previous_topic(), 0);
        assert_eq!(
            service.get_topic(second.id).unwrap().unwrap().previous_topic(),
            0
        );
    }

    assert_eq!(revision_count(&conn), 0);
}
