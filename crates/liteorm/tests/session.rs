//! Session lifecycle and terminal methods against a scripted handle.

mod common;

use common::{Reply, ScriptedHandle};
use liteorm::{
    Dialect, FromRow, InsertOutcome, Orm, OrmError, OrmResult, Row, SessionOptions,
    SessionState, Value, record,
};

#[tokio::test]
async fn get_sends_compiled_select_with_bindings() {
    let handle = ScriptedHandle::named();
    handle.reply(Reply::Rows(vec![Row::from_pairs([("id", Value::from(1)), ("name", Value::from("Ada"))])]));
    let orm = Orm::new(&handle);

    let rows = orm
        .table("users")
        .select(&["id", "name"])
        .eq("status", "active")
        .or_where("status", "=", "pending")
        .order_by_desc("id")
        .limit(5)
        .get()
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name"), Some(&Value::from("Ada")));

    let calls = handle.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, "query");
    assert_eq!(
        calls[0].sql,
        "SELECT id, name FROM users WHERE status = :status OR status = :status_2 \
         ORDER BY id DESC LIMIT 5"
    );
    assert_eq!(calls[0].params, vec![Value::from("active"), Value::from("pending")]);
}

#[tokio::test]
async fn second_terminal_call_is_refused() {
    let handle = ScriptedHandle::named();
    let orm = Orm::new(&handle);
    let mut session = orm.table("users");

    session.get().await.unwrap();
    assert_eq!(session.state(), SessionState::Executed);

    let err = session.get().await.unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(handle.calls().len(), 1);

    session.reset().eq("id", 2);
    assert_eq!(session.state(), SessionState::Building);
    session.get().await.unwrap();
    assert_eq!(handle.sql_log()[1], "SELECT * FROM users WHERE id = :id");
}

#[tokio::test]
async fn unbound_session_fails_without_touching_the_handle() {
    let handle = ScriptedHandle::named();
    let orm = Orm::new(&handle);
    let mut session = orm.session();

    let err = session.get().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Configuration error: No table specified. Call table() first."
    );
    assert_eq!(session.state(), SessionState::Failed);
    assert!(handle.calls().is_empty());
}

#[tokio::test]
async fn builder_errors_surface_at_the_terminal_call() {
    let handle = ScriptedHandle::named();
    let orm = Orm::new(&handle);
    let mut session = orm.table("users");
    session.and_where("id", "= 1 OR 1 =", 1);

    let err = session.get().await.unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(session.state(), SessionState::Failed);
    assert!(handle.calls().is_empty());
}

#[tokio::test]
async fn guarded_mutations() {
    let handle = ScriptedHandle::named();
    let orm = Orm::new(&handle);

    let err = orm
        .table("users")
        .update(record! { "email" => "x@y.com" })
        .await
        .unwrap_err();
    assert!(err.is_configuration());

    let err = orm.table("users").delete().await.unwrap_err();
    assert!(err.is_configuration());

    // the soft-delete filter alone is not a condition
    let err = orm.table("users").enable_soft_delete().delete().await.unwrap_err();
    assert!(err.is_configuration());

    let err = orm.table("users").insert(record! {}).await.unwrap_err();
    assert!(err.is_configuration());

    assert!(handle.calls().is_empty());
}

#[tokio::test]
async fn soft_delete_turns_delete_into_update() {
    let handle = ScriptedHandle::named();
    handle.reply(Reply::Affected(3));
    let orm = Orm::new(&handle);

    let n = orm
        .table("posts")
        .enable_soft_delete()
        .and_where("author_id", "=", 7)
        .delete()
        .await
        .unwrap();

    assert_eq!(n, 3);
    let calls = handle.calls();
    assert_eq!(calls[0].method, "execute");
    assert_eq!(
        calls[0].sql,
        "UPDATE posts SET deleted_at = NOW() WHERE deleted_at IS NULL AND (author_id = :author_id)"
    );
    assert_eq!(calls[0].params, vec![Value::Int(7)]);
}

#[tokio::test]
async fn update_returns_affected_rows() {
    let handle = ScriptedHandle::new(Dialect::MySql);
    handle.reply(Reply::Affected(1));
    let orm = Orm::new(&handle);

    let n = orm
        .table("users")
        .eq("id", 9)
        .update(record! { "name" => "Grace", "status" => "active" })
        .await
        .unwrap();

    assert_eq!(n, 1);
    let call = &handle.calls()[0];
    assert_eq!(call.sql, "UPDATE users SET name = ?, status = ? WHERE id = ?");
    assert_eq!(
        call.params,
        vec![Value::from("Grace"), Value::from("active"), Value::Int(9)]
    );
}

#[tokio::test]
async fn count_is_a_single_integer() {
    let handle = ScriptedHandle::named();
    handle.reply(Reply::Rows(vec![Row::from_pairs([("COUNT(id)", 42)])]));
    let orm = Orm::new(&handle);

    let n = orm.table("users").eq("status", "active").count("id").await.unwrap();

    assert_eq!(n, 42);
    assert_eq!(
        handle.sql_log(),
        vec!["SELECT COUNT(id) FROM users WHERE status = :status"]
    );
}

#[tokio::test]
async fn aggregates_over_no_rows() {
    let handle = ScriptedHandle::named();
    handle.reply(Reply::Rows(vec![Row::from_pairs([("COUNT(*)", Value::Null)])]));
    let orm = Orm::new(&handle);

    assert_eq!(orm.table("users").count("*").await.unwrap(), 0);
    assert_eq!(orm.table("orders").sum("total").await.unwrap(), Value::Null);
    assert_eq!(
        handle.sql_log(),
        vec!["SELECT COUNT(*) FROM users", "SELECT SUM(total) FROM orders"]
    );

    let err = orm.table("orders").max("*").await.unwrap_err();
    assert!(err.is_configuration());
}

#[tokio::test]
async fn insert_reports_driver_outcome() {
    let handle = ScriptedHandle::new(Dialect::MySql);
    handle.reply(Reply::Inserted(InsertOutcome {
        affected: 1,
        last_insert_id: Some(Value::Int(17)),
    }));
    let orm = Orm::new(&handle);

    let outcome = orm
        .table("users")
        .insert(record! { "name" => "Ada", "age" => 36 })
        .await
        .unwrap();

    assert_eq!(outcome.last_insert_id, Some(Value::Int(17)));
    let call = &handle.calls()[0];
    assert_eq!(call.method, "insert");
    assert_eq!(call.sql, "INSERT INTO users (name, age) VALUES (?, ?)");
}

#[tokio::test]
async fn postgres_insert_returns_primary_key() {
    let handle = ScriptedHandle::new(Dialect::Postgres);
    handle.reply(Reply::Rows(vec![Row::from_pairs([("id", 5)])]));
    let orm = Orm::new(&handle).options(SessionOptions::new().primary_key("id"));

    let outcome = orm
        .table("users")
        .insert(record! { "name" => "Ada" })
        .await
        .unwrap();

    assert_eq!(outcome.affected, 1);
    assert_eq!(outcome.last_insert_id, Some(Value::Int(5)));
    let call = &handle.calls()[0];
    assert_eq!(call.method, "query");
    assert_eq!(call.sql, "INSERT INTO users (name) VALUES ($1) RETURNING id");
}

#[tokio::test]
async fn handle_failures_are_data_access_errors() {
    let handle = ScriptedHandle::named();
    handle.reply(Reply::Fail("connection reset".into()));
    let orm = Orm::new(&handle);
    let mut session = orm.table("users");

    let err = session.get().await.unwrap_err();
    assert!(err.is_data_access());
    assert!(std::error::Error::source(&err).is_some());
    assert_eq!(session.state(), SessionState::Failed);
}

#[tokio::test]
async fn paginate_uses_one_based_pages() {
    let handle = ScriptedHandle::named();
    let orm = Orm::new(&handle);

    orm.table("posts").order_by("id").paginate(10, 3).await.unwrap();
    orm.table("posts").paginate(10, 0).await.unwrap();

    assert_eq!(
        handle.sql_log(),
        vec![
            "SELECT * FROM posts ORDER BY id ASC LIMIT 10 OFFSET 20",
            "SELECT * FROM posts LIMIT 10 OFFSET 0",
        ]
    );
}

#[tokio::test]
async fn paginate_rejects_an_offset_past_u64() {
    let handle = ScriptedHandle::named();
    let orm = Orm::new(&handle);
    let mut session = orm.table("posts");

    let err = session.paginate(u64::MAX / 2 + 1, 3).await.unwrap_err();

    assert!(err.is_configuration());
    assert!(err.to_string().contains("page offset overflows"), "{err}");
    assert_eq!(session.state(), SessionState::Failed);
    assert!(handle.calls().is_empty());
}

#[derive(Debug, PartialEq)]
struct User {
    id: i64,
    name: String,
}

impl FromRow for User {
    fn from_row(row: &Row) -> OrmResult<Self> {
        Ok(Self {
            id: row.try_get_column("id")?,
            name: row.try_get_column("name")?,
        })
    }
}

#[tokio::test]
async fn typed_fetches() {
    let handle = ScriptedHandle::named();
    handle.reply(Reply::Rows(vec![
        Row::from_pairs([("id", Value::Int(1)), ("name", Value::from("Ada"))]),
        Row::from_pairs([("id", Value::Int(2)), ("name", Value::from("Grace"))]),
    ]));
    let orm = Orm::new(&handle);

    let users: Vec<User> = orm.table("users").fetch_all().await.unwrap();
    assert_eq!(users[1], User { id: 2, name: "Grace".into() });

    let err = orm
        .table("users")
        .eq("id", 99)
        .fetch_one::<User>()
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::NotFound(_)));
    assert_eq!(handle.sql_log()[1], "SELECT * FROM users WHERE id = :id LIMIT 1");
}

#[tokio::test]
async fn first_returns_none_on_empty_result() {
    let handle = ScriptedHandle::named();
    let orm = Orm::new(&handle);
    assert_eq!(orm.table("users").first().await.unwrap(), None);
}
