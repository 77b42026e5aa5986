//! Per-statement clause state.
//!
//! Singleton fields (table, group by, having, order, limit, offset) are
//! last-write-wins; projection, joins and predicates only ever grow.

use crate::error::{OrmError, OrmResult};
use crate::ident;
use crate::qb::predicate::{Operator, Predicate, PredicateList};
use crate::value::Value;
use std::fmt;

/// Default column used to mark soft-deleted rows.
pub const DEFAULT_SOFT_DELETE_COLUMN: &str = "deleted_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    pub fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
        }
    }
}

/// `<kind> JOIN <table> ON <left_key> <operator> <right_key>`
#[derive(Debug, Clone, PartialEq)]
pub struct JoinSpec {
    pub kind: JoinKind,
    pub table: String,
    pub left_key: String,
    pub operator: Operator,
    pub right_key: String,
}

impl JoinSpec {
    /// Validate and build a join. `table` may carry an alias (`orders o` or
    /// `orders AS o`).
    pub fn new(
        kind: JoinKind,
        table: &str,
        left_key: &str,
        operator: &str,
        right_key: &str,
    ) -> OrmResult<Self> {
        let operator = Operator::parse(operator)?;
        if !operator.is_comparison() {
            return Err(OrmError::configuration(format!(
                "Operator '{operator}' cannot be used in a JOIN condition"
            )));
        }
        Ok(Self {
            kind,
            table: table_ref(table)?,
            left_key: ident::column(left_key)?,
            operator,
            right_key: ident::column(right_key)?,
        })
    }
}

impl fmt::Display for JoinSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ON {} {} {}",
            self.kind.as_sql(),
            self.table,
            self.left_key,
            self.operator,
            self.right_key
        )
    }
}

/// Validate `table`, `table alias` or `table AS alias`.
fn table_ref(s: &str) -> OrmResult<String> {
    let words: Vec<&str> = s.split_whitespace().collect();
    match words.as_slice() {
        [table] => ident::column(table),
        [table, alias] => Ok(format!("{} {}", ident::column(table)?, ident::column(alias)?)),
        [table, kw, alias] if kw.eq_ignore_ascii_case("AS") => Ok(format!(
            "{} AS {}",
            ident::column(table)?,
            ident::column(alias)?
        )),
        _ => Err(OrmError::configuration(format!(
            "Invalid table reference '{s}'"
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn parse(s: &str) -> OrmResult<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(OrderDirection::Asc),
            "DESC" => Ok(OrderDirection::Desc),
            _ => Err(OrmError::configuration(format!(
                "Invalid order direction '{s}'"
            ))),
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderSpec {
    pub column: String,
    pub direction: OrderDirection,
}

/// Everything accumulated for one logical statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ClauseSet {
    table: Option<String>,
    projection: Vec<String>,
    joins: Vec<JoinSpec>,
    predicates: PredicateList,
    group_by: Option<String>,
    having: Option<Predicate>,
    order_by: Option<OrderSpec>,
    limit: Option<u64>,
    offset: Option<u64>,
    soft_delete: bool,
    soft_delete_column: String,
    primary_key: Option<String>,
}

impl Default for ClauseSet {
    fn default() -> Self {
        Self {
            table: None,
            projection: Vec::new(),
            joins: Vec::new(),
            predicates: PredicateList::new(),
            group_by: None,
            having: None,
            order_by: None,
            limit: None,
            offset: None,
            soft_delete: false,
            soft_delete_column: DEFAULT_SOFT_DELETE_COLUMN.to_string(),
            primary_key: None,
        }
    }
}

impl ClauseSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target table. An alias is allowed (`users u`).
    pub fn set_table(&mut self, name: &str) -> OrmResult<()> {
        self.table = Some(table_ref(name)?);
        Ok(())
    }

    /// Append projection terms. An empty projection compiles to `*`.
    pub fn set_projection<S: AsRef<str>>(&mut self, columns: &[S]) -> OrmResult<()> {
        let terms = columns
            .iter()
            .map(|c| ident::projection(c.as_ref()))
            .collect::<OrmResult<Vec<_>>>()?;
        self.projection.extend(terms);
        Ok(())
    }

    pub fn add_join(&mut self, spec: JoinSpec) {
        self.joins.push(spec);
    }

    pub fn predicates_mut(&mut self) -> &mut PredicateList {
        &mut self.predicates
    }

    pub fn set_group_by(&mut self, column: &str) -> OrmResult<()> {
        self.group_by = Some(ident::column(column)?);
        Ok(())
    }

    /// Set the HAVING condition. `column` may be an aggregate call.
    pub fn set_having(&mut self, column: &str, op: &str, value: impl Into<Value>) -> OrmResult<()> {
        let column = ident::having_target(column)?;
        let op = Operator::parse(op)?;
        self.having = Some(Predicate::compare(column, op, value.into())?);
        Ok(())
    }

    pub fn set_order(&mut self, column: &str, direction: OrderDirection) -> OrmResult<()> {
        self.order_by = Some(OrderSpec {
            column: ident::having_target(column)?,
            direction,
        });
        Ok(())
    }

    pub fn set_limit(&mut self, n: u64) {
        self.limit = Some(n);
    }

    pub fn set_offset(&mut self, n: u64) {
        self.offset = Some(n);
    }

    /// Route DELETE to a timestamp UPDATE and scope reads to live rows.
    pub fn enable_soft_delete(&mut self) {
        self.soft_delete = true;
    }

    pub fn set_soft_delete_column(&mut self, column: &str) -> OrmResult<()> {
        self.soft_delete_column = ident::column(column)?;
        Ok(())
    }

    /// Column returned from INSERT on dialects with `RETURNING`.
    pub fn set_primary_key(&mut self, column: Option<&str>) -> OrmResult<()> {
        self.primary_key = column.map(ident::column).transpose()?;
        Ok(())
    }

    /// Drop every fragment but keep the table and the soft-delete settings.
    pub fn clear_fragments(&mut self) {
        self.projection.clear();
        self.joins.clear();
        self.predicates.clear();
        self.group_by = None;
        self.having = None;
        self.order_by = None;
        self.limit = None;
        self.offset = None;
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn projection(&self) -> &[String] {
        &self.projection
    }

    pub fn joins(&self) -> &[JoinSpec] {
        &self.joins
    }

    pub fn predicates(&self) -> &PredicateList {
        &self.predicates
    }

    pub fn group_by(&self) -> Option<&str> {
        self.group_by.as_deref()
    }

    pub fn having(&self) -> Option<&Predicate> {
        self.having.as_ref()
    }

    pub fn order_by(&self) -> Option<&OrderSpec> {
        self.order_by.as_ref()
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn soft_delete(&self) -> bool {
        self.soft_delete
    }

    pub fn soft_delete_column(&self) -> &str {
        &self.soft_delete_column
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }
}
