//! `transaction!` commits on Ok and rolls back on Err.

mod common;

use common::{Reply, ScriptedHandle};
use liteorm::{Orm, OrmError, OrmResult, record};

async fn transfer(orm: &Orm<&ScriptedHandle>, fail: bool) -> OrmResult<u64> {
    liteorm::transaction!(orm.handle(), {
        let n = orm
            .table("accounts")
            .eq("id", 1)
            .update(record! { "balance" => 90 })
            .await?;
        if fail {
            return Err(OrmError::configuration("insufficient funds"));
        }
        Ok::<_, OrmError>(n)
    })
}

#[tokio::test]
async fn commits_on_ok() {
    let handle = ScriptedHandle::named();
    let orm = Orm::new(&handle);

    transfer(&orm, false).await.unwrap();

    assert_eq!(
        handle.sql_log(),
        vec![
            "BEGIN",
            "UPDATE accounts SET balance = :balance WHERE id = :id",
            "COMMIT",
        ]
    );
}

#[tokio::test]
async fn rolls_back_on_err() {
    let handle = ScriptedHandle::named();
    let orm = Orm::new(&handle);

    let err = transfer(&orm, true).await.unwrap_err();

    assert_eq!(err.to_string(), "Configuration error: insufficient funds");
    assert_eq!(handle.sql_log().last().map(String::as_str), Some("ROLLBACK"));
}

#[tokio::test]
async fn rollback_failure_is_reported_with_the_original_error() {
    let handle = ScriptedHandle::named();
    handle
        .reply(Reply::Ok)
        .reply(Reply::Fail("deadlock".into()))
        .reply(Reply::Fail("connection gone".into()));
    let orm = Orm::new(&handle);

    let err = transfer(&orm, false).await.unwrap_err();

    assert!(err.is_data_access());
    let message = err.to_string();
    assert!(message.contains("deadlock"), "{message}");
    assert!(message.contains("rollback failed"), "{message}");
    assert!(message.contains("connection gone"), "{message}");
}

#[tokio::test]
async fn orm_transaction_helpers() {
    let handle = ScriptedHandle::named();
    let orm = Orm::new(&handle);

    orm.begin().await.unwrap();
    orm.rollback().await.unwrap();
    orm.begin().await.unwrap();
    orm.commit().await.unwrap();

    assert_eq!(handle.sql_log(), vec!["BEGIN", "ROLLBACK", "BEGIN", "COMMIT"]);
}
