//! Database handle abstraction.

use crate::error::OrmResult;
use crate::qb::Dialect;
use crate::row::Row;
use crate::value::Value;
use std::future::Future;
use std::sync::Arc;

/// Result of an INSERT.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InsertOutcome {
    /// Rows written.
    pub affected: u64,
    /// Generated key, when the driver reports one.
    pub last_insert_id: Option<Value>,
}

/// A trait over anything that can run compiled statements.
///
/// Implemented for `tokio_postgres::Client`, for `deadpool_postgres` pools and
/// pooled clients (`pool` feature) and for [`MySqlHandle`](crate::MySqlHandle)
/// (`mysql` feature). Tests implement it with a scripted double.
///
/// Values arrive in placeholder order; the handle does not interpret SQL.
pub trait DbHandle: Send + Sync {
    /// Placeholder style this handle expects.
    fn dialect(&self) -> Dialect;

    /// Run a statement that returns rows.
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = OrmResult<Vec<Row>>> + Send;

    /// Run a statement and return the number of affected rows.
    fn execute(&self, sql: &str, params: &[Value]) -> impl Future<Output = OrmResult<u64>> + Send;

    /// Run an INSERT.
    ///
    /// The default implementation calls [`DbHandle::execute`] and reports no
    /// generated key.
    fn insert(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = OrmResult<InsertOutcome>> + Send {
        async move {
            let affected = self.execute(sql, params).await?;
            Ok(InsertOutcome {
                affected,
                last_insert_id: None,
            })
        }
    }

    /// Run one or more statements without parameters (DDL, transaction control).
    fn batch_execute(&self, sql: &str) -> impl Future<Output = OrmResult<()>> + Send;

    fn begin(&self) -> impl Future<Output = OrmResult<()>> + Send {
        self.batch_execute("BEGIN")
    }

    fn commit(&self) -> impl Future<Output = OrmResult<()>> + Send {
        self.batch_execute("COMMIT")
    }

    fn rollback(&self) -> impl Future<Output = OrmResult<()>> + Send {
        self.batch_execute("ROLLBACK")
    }
}

impl<T: DbHandle> DbHandle for &T {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = OrmResult<Vec<Row>>> + Send {
        (**self).query(sql, params)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> impl Future<Output = OrmResult<u64>> + Send {
        (**self).execute(sql, params)
    }

    fn insert(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = OrmResult<InsertOutcome>> + Send {
        (**self).insert(sql, params)
    }

    fn batch_execute(&self, sql: &str) -> impl Future<Output = OrmResult<()>> + Send {
        (**self).batch_execute(sql)
    }

    fn begin(&self) -> impl Future<Output = OrmResult<()>> + Send {
        (**self).begin()
    }

    fn commit(&self) -> impl Future<Output = OrmResult<()>> + Send {
        (**self).commit()
    }

    fn rollback(&self) -> impl Future<Output = OrmResult<()>> + Send {
        (**self).rollback()
    }
}

impl<T: DbHandle> DbHandle for Arc<T> {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = OrmResult<Vec<Row>>> + Send {
        (**self).query(sql, params)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> impl Future<Output = OrmResult<u64>> + Send {
        (**self).execute(sql, params)
    }

    fn insert(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = OrmResult<InsertOutcome>> + Send {
        (**self).insert(sql, params)
    }

    fn batch_execute(&self, sql: &str) -> impl Future<Output = OrmResult<()>> + Send {
        (**self).batch_execute(sql)
    }

    fn begin(&self) -> impl Future<Output = OrmResult<()>> + Send {
        (**self).begin()
    }

    fn commit(&self) -> impl Future<Output = OrmResult<()>> + Send {
        (**self).commit()
    }

    fn rollback(&self) -> impl Future<Output = OrmResult<()>> + Send {
        (**self).rollback()
    }
}
