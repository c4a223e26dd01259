use topic_chain_core::db::open_db_in_memory;
use topic_chain_core::{
    ChainService, SqliteTopicRepository, TopicCreateOptions, TopicListQuery, TopicView,
};

#[test]
fn topic_view_exposes_both_links() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteTopicRepository::try_new(&mut conn).unwrap();
    let mut service = ChainService::new(repo);
    let first = service
        .create_topic("Part one", "body", TopicCreateOptions::default())
        .unwrap();
    let second = service
        .create_topic(
            "Part two",
            "body",
            TopicCreateOptions::with_next_topic(first.id),
        )
        .unwrap();

    let view = service.topic_view(first.id).unwrap().unwrap();
    assert_eq!(
        view,
        TopicView {
            id: first.id,
            title: "Part one".to_string(),
            next_topic: 0,
            previous_topic: second.id,
        }
    );

    let json = serde_json::to_value(service.topic_view(second.id).unwrap().unwrap()).unwrap();
    assert_eq!(json["next_topic"], first.id);
    assert_eq!(json["previous_topic"], 0);
}

#[test]
fn topic_view_for_unknown_topic_is_none() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteTopicRepository::try_new(&mut conn).unwrap();
    let service = ChainService::new(repo);

    assert!(service.topic_view(1).unwrap().is_none());
}

#[test]
fn reading_views_does_not_write() {
    let mut conn = open_db_in_memory().unwrap();
    {
        let repo = SqliteTopicRepository::try_new(&mut conn).unwrap();
        let mut service = ChainService::new(repo);
        service
            .create_topic("Only", "body", TopicCreateOptions::default())
            .unwrap();
    }
    conn.execute("DELETE FROM topic_chain_fields;", []).unwrap();

    {
        let repo = SqliteTopicRepository::try_new(&mut conn).unwrap();
        let service = ChainService::new(repo);
        let view = service.topic_view(1).unwrap().unwrap();
        assert_eq!((view.next_topic, view.previous_topic), (0, 0));
        service.list_topic_views(&TopicListQuery::default()).unwrap();
    }

    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM topic_chain_fields;", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(rows, 0);
}

#[test]
fn topic_list_views_are_ordered_and_paginated() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteTopicRepository::try_new(&mut conn).unwrap();
    let mut service = ChainService::new(repo);

    let mut ids = Vec::new();
    for index in 0..4 {
        let options = match ids.last() {
            Some(previous) => TopicCreateOptions {
                next_topic: None,
                previous_topic: Some(*previous),
            },
            None => TopicCreateOptions::default(),
        };
        let topic = service
            .create_topic(format!("Part {index}"), "body", options)
            .unwrap();
        ids.push(topic.id);
    }

    let page = service
        .list_topic_views(&TopicListQuery {
            limit: Some(2),
            offset: 1,
        })
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].id, ids[1]);
    assert_eq!(page[0].previous_topic, ids[0]);
    assert_eq!(page[1].id, ids[2]);
    assert_eq!(page[1].previous_topic, ids[1]);

    let all = service.list_topic_views(&TopicListQuery::default()).unwrap();
    assert_eq!(all.len(), 4);
    assert!(all.iter().all(|view| view.next_topic == 0));
}
