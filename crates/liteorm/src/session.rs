//! Fluent query session and the [`Orm`] entry point.
//!
//! A [`Session`] collects clauses for exactly one statement, then a terminal
//! method (`get`, `insert`, `update`, `delete`, `count`, ...) compiles and runs
//! it on the injected handle.
//!
//! ```ignore
//! let orm = Orm::new(client);
//!
//! let rows = orm
//!     .table("users")
//!     .eq("status", "active")
//!     .order_by_desc("created_at")
//!     .limit(10)
//!     .get()
//!     .await?;
//!
//! let removed = orm
//!     .table("posts")
//!     .enable_soft_delete()
//!     .eq("author_id", 7)
//!     .delete()
//!     .await?;
//! ```
//!
//! Builder misuse (a bad column, a disallowed operator) does not panic. The
//! first error is kept and returned by the next terminal call.

use crate::client::{DbHandle, InsertOutcome};
use crate::config::SessionOptions;
use crate::error::{OrmError, OrmResult};
use crate::exec::{ExecutionResult, Executor};
use crate::qb::{
    AggregateFn, ClauseSet, CompiledStatement, Conjunction, Dialect, JoinKind, JoinSpec,
    OrderDirection, Statement, compile,
};
use crate::relation::Relation;
use crate::row::{FromRow, Row};
use crate::schema::Schema;
use crate::transaction;
use crate::value::{FromValue, Record, Value};

/// Lifecycle of a [`Session`].
///
/// `Unbound -> Building` on `table()`, then exactly one terminal call moves it
/// to `Executed` or `Failed`. [`Session::reset`] goes back to `Building`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unbound,
    Building,
    Executed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Executed | SessionState::Failed)
    }
}

/// Mutable builder for one statement against a borrowed handle.
///
/// Not meant to be shared between tasks; build and run it from one place.
pub struct Session<'h, H> {
    handle: &'h H,
    executor: Executor,
    dialect: Dialect,
    clauses: ClauseSet,
    relations: Vec<Relation>,
    state: SessionState,
    build_error: Option<OrmError>,
}

impl<'h, H: DbHandle> Session<'h, H> {
    pub fn new(handle: &'h H) -> Self {
        Self::with_options(handle, &SessionOptions::default())
    }

    pub fn with_options(handle: &'h H, options: &SessionOptions) -> Self {
        let mut session = Self {
            handle,
            executor: Executor::new().log_sql_max(options.log_sql_max),
            dialect: handle.dialect(),
            clauses: ClauseSet::new(),
            relations: Vec::new(),
            state: SessionState::Unbound,
            build_error: None,
        };
        let result = session
            .clauses
            .set_soft_delete_column(&options.soft_delete_column)
            .and_then(|()| session.clauses.set_primary_key(options.primary_key.as_deref()));
        session.record(result);
        session
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Keep the first builder error; later ones are usually fallout.
    fn record(&mut self, result: OrmResult<()>) {
        if let Err(e) = result
            && self.build_error.is_none()
        {
            self.build_error = Some(e);
        }
    }

    /// Apply a clause change, refusing it once the session is spent.
    fn build(&mut self, f: impl FnOnce(&mut ClauseSet) -> OrmResult<()>) -> &mut Self {
        if self.state.is_terminal() {
            self.record(Err(spent()));
            return self;
        }
        let result = f(&mut self.clauses);
        self.record(result);
        self
    }

    // ==================== builder ====================

    pub fn table(&mut self, name: &str) -> &mut Self {
        if self.state.is_terminal() {
            self.record(Err(spent()));
            return self;
        }
        let result = self.clauses.set_table(name);
        if result.is_ok() {
            self.state = SessionState::Building;
        }
        self.record(result);
        self
    }

    /// Add projection terms. Repeated calls append.
    pub fn select(&mut self, columns: &[&str]) -> &mut Self {
        self.build(|c| c.set_projection(columns))
    }

    pub fn add_select(&mut self, column: &str) -> &mut Self {
        self.build(|c| c.set_projection(&[column]))
    }

    fn join_kind(
        &mut self,
        kind: JoinKind,
        table: &str,
        left: &str,
        op: &str,
        right: &str,
    ) -> &mut Self {
        self.build(|c| {
            c.add_join(JoinSpec::new(kind, table, left, op, right)?);
            Ok(())
        })
    }

    pub fn join(&mut self, table: &str, left: &str, op: &str, right: &str) -> &mut Self {
        self.join_kind(JoinKind::Inner, table, left, op, right)
    }

    pub fn left_join(&mut self, table: &str, left: &str, op: &str, right: &str) -> &mut Self {
        self.join_kind(JoinKind::Left, table, left, op, right)
    }

    pub fn right_join(&mut self, table: &str, left: &str, op: &str, right: &str) -> &mut Self {
        self.join_kind(JoinKind::Right, table, left, op, right)
    }

    /// `AND column op value`
    pub fn and_where(&mut self, column: &str, op: &str, value: impl Into<Value>) -> &mut Self {
        self.build(|c| {
            c.predicates_mut()
                .add_condition(column, op, value, Conjunction::And)
        })
    }

    /// `OR column op value`
    pub fn or_where(&mut self, column: &str, op: &str, value: impl Into<Value>) -> &mut Self {
        self.build(|c| {
            c.predicates_mut()
                .add_condition(column, op, value, Conjunction::Or)
        })
    }

    pub fn eq(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.and_where(column, "=", value)
    }

    pub fn where_null(&mut self, column: &str) -> &mut Self {
        self.build(|c| {
            c.predicates_mut()
                .add_null_check(column, true, Conjunction::And)
        })
    }

    pub fn where_not_null(&mut self, column: &str) -> &mut Self {
        self.build(|c| {
            c.predicates_mut()
                .add_null_check(column, false, Conjunction::And)
        })
    }

    pub fn or_where_null(&mut self, column: &str) -> &mut Self {
        self.build(|c| {
            c.predicates_mut()
                .add_null_check(column, true, Conjunction::Or)
        })
    }

    /// `AND column IN (...)`. An empty list matches nothing.
    pub fn where_in<I>(&mut self, column: &str, values: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.build(|c| c.predicates_mut().add_in(column, values, Conjunction::And))
    }

    pub fn group_by(&mut self, column: &str) -> &mut Self {
        self.build(|c| c.set_group_by(column))
    }

    /// `HAVING column op value`. `column` may be an aggregate call.
    pub fn having(&mut self, column: &str, op: &str, value: impl Into<Value>) -> &mut Self {
        self.build(|c| c.set_having(column, op, value))
    }

    pub fn order_by(&mut self, column: &str) -> &mut Self {
        self.build(|c| c.set_order(column, OrderDirection::Asc))
    }

    pub fn order_by_desc(&mut self, column: &str) -> &mut Self {
        self.build(|c| c.set_order(column, OrderDirection::Desc))
    }

    pub fn limit(&mut self, n: u64) -> &mut Self {
        self.build(|c| {
            c.set_limit(n);
            Ok(())
        })
    }

    pub fn offset(&mut self, n: u64) -> &mut Self {
        self.build(|c| {
            c.set_offset(n);
            Ok(())
        })
    }

    /// Scope reads to live rows and turn `delete()` into a timestamp update.
    pub fn enable_soft_delete(&mut self) -> &mut Self {
        self.build(|c| {
            c.enable_soft_delete();
            Ok(())
        })
    }

    /// Apply a reusable group of clauses.
    ///
    /// ```ignore
    /// fn published(s: &mut Session<'_, Client>) {
    ///     s.where_not_null("published_at");
    /// }
    /// orm.table("posts").scope(published).get().await?;
    /// ```
    pub fn scope<F>(&mut self, f: F) -> &mut Self
    where
        F: FnOnce(&mut Self),
    {
        f(self);
        self
    }

    /// `status = 'active'`
    pub fn active(&mut self) -> &mut Self {
        self.eq("status", "active")
    }

    /// Eager-load `relation` after `get()`.
    pub fn with(&mut self, relation: Relation) -> &mut Self {
        if self.state.is_terminal() {
            self.record(Err(spent()));
            return self;
        }
        let result = relation.validate();
        if result.is_ok() {
            self.relations.push(relation);
        }
        self.record(result);
        self
    }

    // ==================== inspection ====================

    /// Compile without executing. The session state does not change.
    pub fn compile(&self, statement: Statement<'_>) -> OrmResult<CompiledStatement> {
        if let Some(e) = &self.build_error {
            return Err(OrmError::configuration(error_message(e)));
        }
        compile(&self.clauses, statement, self.dialect)
    }

    /// SQL text of the SELECT this session would run.
    pub fn to_sql(&self) -> OrmResult<String> {
        self.compile(Statement::Select).map(|s| s.sql().to_string())
    }

    /// Clear every clause, relation and recorded error.
    ///
    /// The table and soft-delete settings are kept, so the session can be
    /// reused for another statement on the same table.
    pub fn reset(&mut self) -> &mut Self {
        self.clauses.clear_fragments();
        self.relations.clear();
        self.build_error = None;
        self.state = if self.clauses.table().is_some() {
            SessionState::Building
        } else {
            SessionState::Unbound
        };
        self
    }

    // ==================== terminal ====================

    fn begin_terminal(&mut self) -> OrmResult<()> {
        match self.state {
            SessionState::Executed | SessionState::Failed => return Err(spent()),
            SessionState::Unbound => {
                self.state = SessionState::Failed;
                return Err(OrmError::configuration(
                    "No table specified. Call table() first.",
                ));
            }
            SessionState::Building => {}
        }
        if let Some(e) = self.build_error.take() {
            self.state = SessionState::Failed;
            return Err(e);
        }
        Ok(())
    }

    async fn run(&mut self, statement: Statement<'_>) -> OrmResult<ExecutionResult> {
        self.begin_terminal()?;
        let stmt = match compile(&self.clauses, statement, self.dialect) {
            Ok(stmt) => stmt,
            Err(e) => {
                self.state = SessionState::Failed;
                return Err(e);
            }
        };
        let result = self.executor.execute(self.handle, &stmt).await;
        self.state = if result.is_ok() {
            SessionState::Executed
        } else {
            SessionState::Failed
        };
        result
    }

    async fn load_relations(&self, rows: &mut [Row]) -> OrmResult<()> {
        for relation in &self.relations {
            relation.load(self.handle, &self.executor, rows).await?;
        }
        Ok(())
    }

    /// Run the SELECT and eager-load any relations.
    pub async fn get(&mut self) -> OrmResult<Vec<Row>> {
        let mut rows = self.run(Statement::Select).await?.into_rows()?;
        if let Err(e) = self.load_relations(&mut rows).await {
            self.state = SessionState::Failed;
            return Err(e);
        }
        Ok(rows)
    }

    /// First row, with `LIMIT 1`.
    pub async fn first(&mut self) -> OrmResult<Option<Row>> {
        self.limit(1);
        Ok(self.get().await?.into_iter().next())
    }

    pub async fn fetch_all<T: FromRow>(&mut self) -> OrmResult<Vec<T>> {
        self.get().await?.iter().map(T::from_row).collect()
    }

    /// Like [`Session::first`], but a missing row is [`OrmError::NotFound`].
    pub async fn fetch_one<T: FromRow>(&mut self) -> OrmResult<T> {
        let row = self
            .first()
            .await?
            .ok_or_else(|| OrmError::not_found("Expected one row, got none"))?;
        T::from_row(&row)
    }

    /// One page of rows. `page` is 1-based; zero is treated as 1.
    pub async fn paginate(&mut self, per_page: u64, page: u64) -> OrmResult<Vec<Row>> {
        let per_page = per_page.max(1);
        let page = page.max(1);
        match (page - 1).checked_mul(per_page) {
            Some(offset) => {
                self.limit(per_page).offset(offset);
            }
            None => self.record(Err(OrmError::configuration("page offset overflows"))),
        }
        self.get().await
    }

    pub async fn insert(&mut self, data: Record) -> OrmResult<InsertOutcome> {
        self.run(Statement::Insert(&data)).await?.into_inserted()
    }

    /// Rows changed. Requires at least one condition.
    pub async fn update(&mut self, data: Record) -> OrmResult<u64> {
        self.run(Statement::Update(&data)).await?.into_affected()
    }

    /// Rows removed, or stamped when soft deletes are enabled. Requires at
    /// least one condition.
    pub async fn delete(&mut self) -> OrmResult<u64> {
        self.run(Statement::Delete).await?.into_affected()
    }

    async fn aggregate(&mut self, func: AggregateFn, column: &str) -> OrmResult<Value> {
        self.run(Statement::Aggregate { func, column })
            .await?
            .into_scalar()
    }

    /// `COUNT(column)`; pass `"*"` to count rows.
    pub async fn count(&mut self, column: &str) -> OrmResult<i64> {
        match self.aggregate(AggregateFn::Count, column).await? {
            Value::Null => Ok(0),
            value => i64::from_value(&value).map_err(|m| OrmError::decode(column, m)),
        }
    }

    pub async fn sum(&mut self, column: &str) -> OrmResult<Value> {
        self.aggregate(AggregateFn::Sum, column).await
    }

    pub async fn avg(&mut self, column: &str) -> OrmResult<Value> {
        self.aggregate(AggregateFn::Avg, column).await
    }

    pub async fn max(&mut self, column: &str) -> OrmResult<Value> {
        self.aggregate(AggregateFn::Max, column).await
    }

    pub async fn min(&mut self, column: &str) -> OrmResult<Value> {
        self.aggregate(AggregateFn::Min, column).await
    }
}

fn spent() -> OrmError {
    OrmError::configuration("Session already executed; call reset() before reuse")
}

fn error_message(err: &OrmError) -> String {
    match err {
        OrmError::Configuration(m) => m.clone(),
        other => other.to_string(),
    }
}

/// Entry point owning the injected database handle.
///
/// ```ignore
/// let client = liteorm::connect_postgres(config.default_connection()?).await?;
/// let orm = Orm::new(client).options(SessionOptions::new().primary_key("id"));
/// let id = orm
///     .table("users")
///     .insert(record! { "name" => "Ada" })
///     .await?
///     .last_insert_id;
/// ```
pub struct Orm<H> {
    handle: H,
    options: SessionOptions,
}

impl<H: DbHandle> Orm<H> {
    pub fn new(handle: H) -> Self {
        Self {
            handle,
            options: SessionOptions::default(),
        }
    }

    /// Options applied to every session created afterwards.
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }

    pub fn into_handle(self) -> H {
        self.handle
    }

    /// An unbound session; call `table()` before a terminal method.
    pub fn session(&self) -> Session<'_, H> {
        Session::with_options(&self.handle, &self.options)
    }

    pub fn table(&self, name: &str) -> Session<'_, H> {
        let mut session = self.session();
        session.table(name);
        session
    }

    pub fn schema(&self) -> Schema<'_, H> {
        Schema::new(&self.handle)
    }

    pub async fn begin(&self) -> OrmResult<()> {
        transaction::begin(&self.handle).await
    }

    pub async fn commit(&self) -> OrmResult<()> {
        transaction::commit(&self.handle).await
    }

    pub async fn rollback(&self) -> OrmResult<()> {
        transaction::rollback(&self.handle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-only handle; never reached by these tests.
    struct Offline(Dialect);

    impl DbHandle for Offline {
        fn dialect(&self) -> Dialect {
            self.0
        }

        async fn query(&self, _sql: &str, _params: &[Value]) -> OrmResult<Vec<Row>> {
            Err(OrmError::data_access_msg("offline"))
        }

        async fn execute(&self, _sql: &str, _params: &[Value]) -> OrmResult<u64> {
            Err(OrmError::data_access_msg("offline"))
        }

        async fn batch_execute(&self, _sql: &str) -> OrmResult<()> {
            Err(OrmError::data_access_msg("offline"))
        }
    }

    #[test]
    fn table_moves_to_building() {
        let orm = Orm::new(Offline(Dialect::Named));
        let mut s = orm.session();
        assert_eq!(s.state(), SessionState::Unbound);
        s.table("users");
        assert_eq!(s.state(), SessionState::Building);
        assert_eq!(s.to_sql().unwrap(), "SELECT * FROM users");
    }

    #[test]
    fn dialect_comes_from_handle() {
        let orm = Orm::new(Offline(Dialect::Postgres));
        let mut s = orm.table("users");
        s.eq("id", 1);
        assert_eq!(s.dialect(), Dialect::Postgres);
        assert_eq!(s.to_sql().unwrap(), "SELECT * FROM users WHERE id = $1");
    }

    #[test]
    fn first_builder_error_wins() {
        let orm = Orm::new(Offline(Dialect::Named));
        let mut s = orm.table("users");
        s.and_where("email", "<>", "x").order_by("bad column");
        let err = s.to_sql().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("<>"), "{err}");
    }

    #[test]
    fn scope_and_active() {
        let orm = Orm::new(Offline(Dialect::Named));
        let mut s = orm.table("users");
        s.scope(|s| {
            s.active().where_not_null("verified_at");
        });
        assert_eq!(
            s.to_sql().unwrap(),
            "SELECT * FROM users WHERE status = :status AND verified_at IS NOT NULL"
        );
    }

    #[test]
    fn reset_keeps_table_and_soft_delete() {
        let orm = Orm::new(Offline(Dialect::Named));
        let mut s = orm.table("posts");
        s.enable_soft_delete().eq("id", 1).limit(5);
        s.reset();
        assert_eq!(s.state(), SessionState::Building);
        assert_eq!(
            s.to_sql().unwrap(),
            "SELECT * FROM posts WHERE deleted_at IS NULL"
        );
    }

    #[test]
    fn options_apply_to_sessions() {
        let orm = Orm::new(Offline(Dialect::Named))
            .options(SessionOptions::new().soft_delete_column("removed_at"));
        let mut s = orm.table("posts");
        s.enable_soft_delete();
        assert_eq!(
            s.to_sql().unwrap(),
            "SELECT * FROM posts WHERE removed_at IS NULL"
        );

        let orm = Orm::new(Offline(Dialect::Named))
            .options(SessionOptions::new().soft_delete_column("not valid"));
        assert!(orm.table("posts").to_sql().unwrap_err().is_configuration());
    }
}
