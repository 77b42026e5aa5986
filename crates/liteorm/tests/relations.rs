//! Eager loading: one batched query per relation.

mod common;

use common::{Reply, ScriptedHandle};
use liteorm::{Orm, Relation, Row, SessionState, Value};

fn users() -> Vec<Row> {
    vec![
        Row::from_pairs([("id", 1), ("name", 10)]),
        Row::from_pairs([("id", 2), ("name", 20)]),
        Row::from_pairs([("id", 1), ("name", 30)]),
    ]
}

#[tokio::test]
async fn has_many_is_loaded_in_one_query() {
    let handle = ScriptedHandle::named();
    handle
        .reply(Reply::Rows(users()))
        .reply(Reply::Rows(vec![
            Row::from_pairs([("id", 100), ("user_id", 1)]),
            Row::from_pairs([("id", 101), ("user_id", 1)]),
            Row::from_pairs([("id", 102), ("user_id", 3)]),
        ]));
    let orm = Orm::new(&handle);

    let rows = orm
        .table("users")
        .with(Relation::has_many("posts", "posts", "user_id", "id"))
        .get()
        .await
        .unwrap();

    let calls = handle.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[1].sql,
        "SELECT * FROM posts WHERE user_id IN (:user_id, :user_id_2)"
    );
    assert_eq!(calls[1].params, vec![Value::Int(1), Value::Int(2)]);

    assert_eq!(rows[0].related("posts").len(), 2);
    assert!(rows[1].related("posts").is_empty());
    assert_eq!(rows[2].related("posts").len(), 2);
}

#[tokio::test]
async fn has_one_keeps_the_first_child() {
    let handle = ScriptedHandle::named();
    handle
        .reply(Reply::Rows(vec![Row::from_pairs([("id", 1)])]))
        .reply(Reply::Rows(vec![
            Row::from_pairs([("user_id", 1), ("bio", 7)]),
            Row::from_pairs([("user_id", 1), ("bio", 8)]),
        ]));
    let orm = Orm::new(&handle);

    let rows = orm
        .table("users")
        .with(Relation::has_one("profile", "profiles", "user_id", "id"))
        .get()
        .await
        .unwrap();

    let profile = rows[0].related("profile");
    assert_eq!(profile.len(), 1);
    assert_eq!(profile[0].get("bio"), Some(&Value::Int(7)));
}

#[tokio::test]
async fn no_parents_means_no_relation_query() {
    let handle = ScriptedHandle::named();
    let orm = Orm::new(&handle);

    let rows = orm
        .table("users")
        .with(Relation::has_many("posts", "posts", "user_id", "id"))
        .get()
        .await
        .unwrap();

    assert!(rows.is_empty());
    assert_eq!(handle.calls().len(), 1);
}

#[tokio::test]
async fn relation_failure_fails_the_session() {
    let handle = ScriptedHandle::named();
    handle
        .reply(Reply::Rows(vec![Row::from_pairs([("id", 1)])]))
        .reply(Reply::Fail("lost".into()));
    let orm = Orm::new(&handle);
    let mut session = orm.table("users");
    session.with(Relation::has_many("posts", "posts", "user_id", "id"));

    assert!(session.get().await.unwrap_err().is_data_access());
    assert_eq!(session.state(), SessionState::Failed);
}

#[tokio::test]
async fn invalid_relation_is_a_configuration_error() {
    let handle = ScriptedHandle::named();
    let orm = Orm::new(&handle);

    let err = orm
        .table("users")
        .with(Relation::has_many("posts", "posts; DROP", "user_id", "id"))
        .get()
        .await
        .unwrap_err();

    assert!(err.is_configuration());
    assert!(handle.calls().is_empty());
}
