//! Scripted in-memory handle shared by the integration tests.

#![allow(dead_code)]

use liteorm::{DbHandle, Dialect, InsertOutcome, OrmError, OrmResult, Row, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

/// One canned response, consumed in order by the next handle call.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Whatever the empty queue would answer.
    Ok,
    Rows(Vec<Row>),
    Affected(u64),
    Inserted(InsertOutcome),
    Fail(String),
}

/// What the handle was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: &'static str,
    pub sql: String,
    pub params: Vec<Value>,
}

/// Records every call and replays queued replies.
///
/// With nothing queued, queries return no rows and mutations touch 0 rows.
pub struct ScriptedHandle {
    dialect: Dialect,
    calls: Mutex<Vec<Call>>,
    replies: Mutex<VecDeque<Reply>>,
}

impl ScriptedHandle {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            calls: Mutex::new(Vec::new()),
            replies: Mutex::new(VecDeque::new()),
        }
    }

    pub fn named() -> Self {
        Self::new(Dialect::Named)
    }

    pub fn reply(&self, reply: Reply) -> &Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sql_log(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.sql).collect()
    }

    fn record(&self, method: &'static str, sql: &str, params: &[Value]) -> Option<Reply> {
        self.calls.lock().unwrap().push(Call {
            method,
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        self.replies.lock().unwrap().pop_front()
    }
}

fn failure(message: String) -> OrmError {
    OrmError::data_access(message.clone(), std::io::Error::other(message))
}

impl DbHandle for ScriptedHandle {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        match self.record("query", sql, params) {
            None | Some(Reply::Ok) => Ok(Vec::new()),
            Some(Reply::Rows(rows)) => Ok(rows),
            Some(Reply::Fail(m)) => Err(failure(m)),
            Some(other) => panic!("query got unexpected reply {other:?}"),
        }
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        match self.record("execute", sql, params) {
            None | Some(Reply::Ok) => Ok(0),
            Some(Reply::Affected(n)) => Ok(n),
            Some(Reply::Fail(m)) => Err(failure(m)),
            Some(other) => panic!("execute got unexpected reply {other:?}"),
        }
    }

    async fn insert(&self, sql: &str, params: &[Value]) -> OrmResult<InsertOutcome> {
        match self.record("insert", sql, params) {
            None | Some(Reply::Ok) => Ok(InsertOutcome::default()),
            Some(Reply::Inserted(outcome)) => Ok(outcome),
            Some(Reply::Fail(m)) => Err(failure(m)),
            Some(other) => panic!("insert got unexpected reply {other:?}"),
        }
    }

    async fn batch_execute(&self, sql: &str) -> OrmResult<()> {
        match self.record("batch_execute", sql, &[]) {
            None | Some(Reply::Ok) => Ok(()),
            Some(Reply::Fail(m)) => Err(failure(m)),
            Some(other) => panic!("batch_execute got unexpected reply {other:?}"),
        }
    }
}
