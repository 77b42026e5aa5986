//! Execution adapter: runs a [`CompiledStatement`] on a [`DbHandle`].
//!
//! Every call emits `tracing` events under the `liteorm.sql` target: one
//! before the call (kind, table, SQL, binding count) and one after it
//! (elapsed time and row count, or the error). Bound values are never
//! logged.

use crate::client::{DbHandle, InsertOutcome};
use crate::error::{OrmError, OrmResult};
use crate::qb::{CompiledStatement, StatementKind};
use crate::row::Row;
use crate::value::Value;
use std::time::Instant;
use tracing::{debug, warn};

const LOG_TARGET: &str = "liteorm.sql";

/// Default SQL truncation for log events, in bytes.
pub const DEFAULT_LOG_SQL_MAX: usize = 200;

/// What a statement produced, shaped by its kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    /// SELECT
    Rows(Vec<Row>),
    /// Aggregate: first value of the first row, `Null` when there is none.
    Scalar(Value),
    /// INSERT
    Inserted(InsertOutcome),
    /// UPDATE / DELETE
    Affected(u64),
}

impl ExecutionResult {
    /// Rows returned, or rows touched for mutations.
    pub fn count(&self) -> u64 {
        match self {
            ExecutionResult::Rows(rows) => rows.len() as u64,
            ExecutionResult::Scalar(_) => 1,
            ExecutionResult::Inserted(outcome) => outcome.affected,
            ExecutionResult::Affected(n) => *n,
        }
    }

    pub fn into_rows(self) -> OrmResult<Vec<Row>> {
        match self {
            ExecutionResult::Rows(rows) => Ok(rows),
            other => Err(mismatch("rows", &other)),
        }
    }

    pub fn into_scalar(self) -> OrmResult<Value> {
        match self {
            ExecutionResult::Scalar(v) => Ok(v),
            other => Err(mismatch("a scalar", &other)),
        }
    }

    pub fn into_inserted(self) -> OrmResult<InsertOutcome> {
        match self {
            ExecutionResult::Inserted(outcome) => Ok(outcome),
            other => Err(mismatch("an insert outcome", &other)),
        }
    }

    pub fn into_affected(self) -> OrmResult<u64> {
        match self {
            ExecutionResult::Affected(n) => Ok(n),
            other => Err(mismatch("an affected-row count", &other)),
        }
    }
}

fn mismatch(expected: &str, got: &ExecutionResult) -> OrmError {
    let got = match got {
        ExecutionResult::Rows(_) => "rows",
        ExecutionResult::Scalar(_) => "a scalar",
        ExecutionResult::Inserted(_) => "an insert outcome",
        ExecutionResult::Affected(_) => "an affected-row count",
    };
    OrmError::configuration(format!("Expected {expected}, statement produced {got}"))
}

/// Stateless adapter between compiled statements and a database handle.
///
/// It does not retry. Any failure from the handle comes back as
/// [`OrmError::DataAccess`] with the original error as its source.
#[derive(Debug, Clone, Copy)]
pub struct Executor {
    log_sql_max: Option<usize>,
}

impl Default for Executor {
    fn default() -> Self {
        Self {
            log_sql_max: Some(DEFAULT_LOG_SQL_MAX),
        }
    }
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Truncate logged SQL to `len` bytes. `None` logs it whole.
    pub fn log_sql_max(mut self, len: Option<usize>) -> Self {
        self.log_sql_max = len;
        self
    }

    fn truncate_sql<'a>(&self, sql: &'a str) -> std::borrow::Cow<'a, str> {
        match self.log_sql_max {
            Some(max) if sql.len() > max => {
                let mut end = max;
                while end > 0 && !sql.is_char_boundary(end) {
                    end -= 1;
                }
                format!("{}...", &sql[..end]).into()
            }
            _ => sql.into(),
        }
    }

    /// Run `stmt` on `handle`.
    pub async fn execute<H: DbHandle>(
        &self,
        handle: &H,
        stmt: &CompiledStatement,
    ) -> OrmResult<ExecutionResult> {
        let kind = stmt.kind();
        debug!(
            target: LOG_TARGET,
            kind = %kind,
            table = stmt.table(),
            bindings = stmt.bindings().len(),
            sql = %self.truncate_sql(stmt.sql()),
            "executing statement"
        );

        let started = Instant::now();
        let outcome = dispatch(handle, stmt).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok(result) => {
                debug!(
                    target: LOG_TARGET,
                    kind = %kind,
                    table = stmt.table(),
                    elapsed_ms,
                    rows = result.count(),
                    "statement finished"
                );
                Ok(result)
            }
            Err(err) => {
                let err = into_data_access(err);
                warn!(
                    target: LOG_TARGET,
                    kind = %kind,
                    table = stmt.table(),
                    elapsed_ms,
                    error = %err,
                    "statement failed"
                );
                Err(err)
            }
        }
    }
}

async fn dispatch<H: DbHandle>(
    handle: &H,
    stmt: &CompiledStatement,
) -> OrmResult<ExecutionResult> {
    let sql = stmt.sql();
    let params = stmt.params();

    match stmt.kind() {
        StatementKind::Select => handle.query(sql, &params).await.map(ExecutionResult::Rows),
        StatementKind::Aggregate => {
            let rows = handle.query(sql, &params).await?;
            let value = rows
                .first()
                .and_then(|row| row.get_index(0))
                .cloned()
                .unwrap_or(Value::Null);
            Ok(ExecutionResult::Scalar(value))
        }
        StatementKind::Insert => match stmt.returning() {
            Some(pk) => {
                let rows = handle.query(sql, &params).await?;
                let last_insert_id = rows.first().and_then(|row| row.get(pk)).cloned();
                Ok(ExecutionResult::Inserted(InsertOutcome {
                    affected: rows.len() as u64,
                    last_insert_id,
                }))
            }
            None => handle
                .insert(sql, &params)
                .await
                .map(ExecutionResult::Inserted),
        },
        StatementKind::Update | StatementKind::Delete => handle
            .execute(sql, &params)
            .await
            .map(ExecutionResult::Affected),
    }
}

fn into_data_access(err: OrmError) -> OrmError {
    if err.is_data_access() {
        return err;
    }
    OrmError::data_access(err.to_string(), err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_on_char_boundary() {
        let exec = Executor::new().log_sql_max(Some(5));
        assert_eq!(exec.truncate_sql("SELECT 1"), "SELEC...");
        assert_eq!(exec.truncate_sql("SELé"), "SELé");
        let exec = Executor::new().log_sql_max(Some(4));
        assert_eq!(exec.truncate_sql("SELéct"), "SEL...");
        let exec = Executor::new().log_sql_max(None);
        assert_eq!(exec.truncate_sql("SELECT 1"), "SELECT 1");
    }

    #[test]
    fn result_accessors_check_kind() {
        assert_eq!(ExecutionResult::Affected(3).into_affected().unwrap(), 3);
        assert!(
            ExecutionResult::Affected(3)
                .into_rows()
                .unwrap_err()
                .is_configuration()
        );
    }

    #[test]
    fn wraps_foreign_errors() {
        let err = into_data_access(OrmError::configuration("boom"));
        assert!(err.is_data_access());
        let err = into_data_access(OrmError::data_access_msg("kept"));
        assert_eq!(err.to_string(), "Data access error: kept");
    }
}
