//! Clause set → SQL text + ordered bindings.
//!
//! Placeholders are allocated while the SQL is written, walking fragments in
//! the order they appear in the output. Compiling the same clause set twice
//! yields byte-identical SQL and the same binding names.

use crate::error::{OrmError, OrmResult};
use crate::ident;
use crate::qb::binding::{Binding, BindingTable};
use crate::qb::clause::ClauseSet;
use crate::value::{Record, Value};
use std::fmt;

/// MySQL has no OFFSET without LIMIT; this is the documented workaround.
const MYSQL_MAX_LIMIT: u64 = u64::MAX;

/// Placeholder style of the target database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// `:name` tokens (PDO-style named parameters).
    #[default]
    Named,
    /// Positional `?`.
    MySql,
    /// Numbered `$1, $2, ...`.
    Postgres,
}

impl Dialect {
    /// Placeholder text for the binding `name` at 1-based `position`.
    pub fn placeholder(self, name: &str, position: usize) -> String {
        match self {
            Dialect::Named => format!(":{name}"),
            Dialect::MySql => "?".to_string(),
            Dialect::Postgres => format!("${position}"),
        }
    }

    /// Whether INSERT can return the generated key inline.
    pub fn supports_returning(self) -> bool {
        matches!(self, Dialect::Postgres)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Max,
    Min,
}

impl AggregateFn {
    pub fn as_sql(self) -> &'static str {
        match self {
            AggregateFn::Count => "COUNT",
            AggregateFn::Sum => "SUM",
            AggregateFn::Avg => "AVG",
            AggregateFn::Max => "MAX",
            AggregateFn::Min => "MIN",
        }
    }
}

impl fmt::Display for AggregateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// What to compile the clause set into.
#[derive(Debug, Clone, Copy)]
pub enum Statement<'a> {
    Select,
    Insert(&'a Record),
    Update(&'a Record),
    Delete,
    Aggregate { func: AggregateFn, column: &'a str },
}

impl Statement<'_> {
    pub fn kind(&self) -> StatementKind {
        match self {
            Statement::Select => StatementKind::Select,
            Statement::Insert(_) => StatementKind::Insert,
            Statement::Update(_) => StatementKind::Update,
            Statement::Delete => StatementKind::Delete,
            Statement::Aggregate { .. } => StatementKind::Aggregate,
        }
    }
}

/// Kind tag carried by a compiled statement; decides how it is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Aggregate,
}

impl StatementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StatementKind::Select => "select",
            StatementKind::Insert => "insert",
            StatementKind::Update => "update",
            StatementKind::Delete => "delete",
            StatementKind::Aggregate => "aggregate",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of [`compile`]: final SQL plus the values for its placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    kind: StatementKind,
    table: String,
    sql: String,
    bindings: Vec<Binding>,
    returning: Option<String>,
}

impl CompiledStatement {
    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bindings in placeholder order.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Column named in a trailing `RETURNING` clause, if any.
    pub fn returning(&self) -> Option<&str> {
        self.returning.as_deref()
    }

    /// Bound values in placeholder order.
    pub fn params(&self) -> Vec<Value> {
        self.bindings.iter().map(|b| b.value.clone()).collect()
    }
}

impl fmt::Display for CompiledStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Compile `clauses` into one statement for `dialect`.
///
/// Fails with a configuration error when no table is set, when INSERT or
/// UPDATE has nothing to write, or when UPDATE/DELETE has no condition.
pub fn compile(
    clauses: &ClauseSet,
    statement: Statement<'_>,
    dialect: Dialect,
) -> OrmResult<CompiledStatement> {
    let table = clauses
        .table()
        .ok_or_else(|| OrmError::configuration("No table specified. Call table() first."))?
        .to_string();

    let mut bindings = BindingTable::new();
    let mut returning = None;

    let sql = match statement {
        Statement::Select => compile_select(clauses, &table, &mut bindings, dialect),
        Statement::Aggregate { func, column } => {
            compile_aggregate(clauses, &table, func, column, &mut bindings, dialect)?
        }
        Statement::Insert(record) => {
            let (sql, ret) = compile_insert(clauses, &table, record, &mut bindings, dialect)?;
            returning = ret;
            sql
        }
        Statement::Update(record) => {
            compile_update(clauses, &table, record, &mut bindings, dialect)?
        }
        Statement::Delete => compile_delete(clauses, &table, &mut bindings, dialect)?,
    };

    Ok(CompiledStatement {
        kind: statement.kind(),
        table,
        sql,
        bindings: bindings.into_vec(),
        returning,
    })
}

fn compile_select(
    clauses: &ClauseSet,
    table: &str,
    bindings: &mut BindingTable,
    dialect: Dialect,
) -> String {
    let projection = if clauses.projection().is_empty() {
        "*".to_string()
    } else {
        clauses.projection().join(", ")
    };

    let mut sql = format!("SELECT {projection} FROM {table}");
    push_joins(&mut sql, clauses);
    push_where(&mut sql, clauses, bindings, dialect, clauses.soft_delete());
    push_grouping(&mut sql, clauses, bindings, dialect);

    if let Some(order) = clauses.order_by() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order.column);
        sql.push(' ');
        sql.push_str(order.direction.as_sql());
    }

    match (clauses.limit(), clauses.offset()) {
        (Some(limit), offset) => {
            sql.push_str(&format!(" LIMIT {limit}"));
            if let Some(offset) = offset {
                sql.push_str(&format!(" OFFSET {offset}"));
            }
        }
        (None, Some(offset)) if dialect == Dialect::MySql => {
            sql.push_str(&format!(" LIMIT {MYSQL_MAX_LIMIT} OFFSET {offset}"));
        }
        (None, Some(offset)) => sql.push_str(&format!(" OFFSET {offset}")),
        (None, None) => {}
    }

    sql
}

fn compile_aggregate(
    clauses: &ClauseSet,
    table: &str,
    func: AggregateFn,
    column: &str,
    bindings: &mut BindingTable,
    dialect: Dialect,
) -> OrmResult<String> {
    let column = column.trim();
    let target = if column == "*" {
        if func != AggregateFn::Count {
            return Err(OrmError::configuration(format!(
                "{func}(*) is not valid; name a column"
            )));
        }
        "*".to_string()
    } else {
        ident::column(column)?
    };

    let mut sql = format!("SELECT {func}({target}) FROM {table}");
    push_joins(&mut sql, clauses);
    push_where(&mut sql, clauses, bindings, dialect, clauses.soft_delete());
    push_grouping(&mut sql, clauses, bindings, dialect);
    Ok(sql)
}

fn compile_insert(
    clauses: &ClauseSet,
    table: &str,
    record: &Record,
    bindings: &mut BindingTable,
    dialect: Dialect,
) -> OrmResult<(String, Option<String>)> {
    if record.is_empty() {
        return Err(OrmError::configuration("INSERT requires at least one column"));
    }

    let mut columns = Vec::with_capacity(record.len());
    let mut placeholders = Vec::with_capacity(record.len());
    for (column, value) in record.iter() {
        let column = ident::column(column)?;
        placeholders.push(bindings.bind(&column, value.clone(), dialect));
        columns.push(column);
    }

    let mut sql = format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    );

    let returning = match clauses.primary_key() {
        Some(pk) if dialect.supports_returning() => {
            sql.push_str(" RETURNING ");
            sql.push_str(pk);
            Some(pk.to_string())
        }
        _ => None,
    };

    Ok((sql, returning))
}

fn compile_update(
    clauses: &ClauseSet,
    table: &str,
    record: &Record,
    bindings: &mut BindingTable,
    dialect: Dialect,
) -> OrmResult<String> {
    if record.is_empty() {
        return Err(OrmError::configuration("UPDATE requires at least one column"));
    }
    if clauses.predicates().is_empty() {
        return Err(OrmError::configuration(
            "Refusing to UPDATE without a WHERE condition",
        ));
    }

    let mut assignments = Vec::with_capacity(record.len());
    for (column, value) in record.iter() {
        let column = ident::column(column)?;
        let ph = bindings.bind(&column, value.clone(), dialect);
        assignments.push(format!("{column} = {ph}"));
    }

    let mut sql = format!("UPDATE {table} SET {}", assignments.join(", "));
    push_where(&mut sql, clauses, bindings, dialect, false);
    Ok(sql)
}

fn compile_delete(
    clauses: &ClauseSet,
    table: &str,
    bindings: &mut BindingTable,
    dialect: Dialect,
) -> OrmResult<String> {
    if clauses.predicates().is_empty() {
        return Err(OrmError::configuration(
            "Refusing to DELETE without a WHERE condition",
        ));
    }

    let mut sql = if clauses.soft_delete() {
        let col = clauses.soft_delete_column();
        format!("UPDATE {table} SET {col} = NOW()")
    } else {
        format!("DELETE FROM {table}")
    };
    push_where(&mut sql, clauses, bindings, dialect, clauses.soft_delete());
    Ok(sql)
}

fn push_joins(sql: &mut String, clauses: &ClauseSet) {
    for join in clauses.joins() {
        sql.push(' ');
        sql.push_str(&join.to_string());
    }
}

/// Append ` WHERE ...`. With `live_only`, user predicates are wrapped so the
/// soft-delete filter applies to every OR branch.
fn push_where(
    sql: &mut String,
    clauses: &ClauseSet,
    bindings: &mut BindingTable,
    dialect: Dialect,
    live_only: bool,
) {
    let user = clauses.predicates().render(bindings, dialect);
    let condition = match (live_only, user) {
        (true, Some(user)) => Some(format!(
            "{} IS NULL AND ({user})",
            clauses.soft_delete_column()
        )),
        (true, None) => Some(format!("{} IS NULL", clauses.soft_delete_column())),
        (false, user) => user,
    };
    if let Some(condition) = condition {
        sql.push_str(" WHERE ");
        sql.push_str(&condition);
    }
}

fn push_grouping(
    sql: &mut String,
    clauses: &ClauseSet,
    bindings: &mut BindingTable,
    dialect: Dialect,
) {
    if let Some(group) = clauses.group_by() {
        sql.push_str(" GROUP BY ");
        sql.push_str(group);
    }
    if let Some(having) = clauses.having() {
        sql.push_str(" HAVING ");
        sql.push_str(&having.render(bindings, dialect));
    }
}
