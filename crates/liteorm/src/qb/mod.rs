//! Query building core.
//!
//! This module holds everything between fluent builder calls and SQL text:
//!
//! - [`PredicateList`]: ordered WHERE fragments joined by AND/OR
//! - [`ClauseSet`]: table, projection, joins, grouping, ordering and paging
//! - [`compile`]: turns a clause set into a [`CompiledStatement`]
//! - [`BindingTable`]: collision-free placeholder tokens, one per value
//!
//! Nothing here touches a database. The same clause set can be compiled for
//! any [`Dialect`], so statements can be inspected without a connection.
//!
//! # Usage
//!
//! ```ignore
//! use liteorm::qb::{compile, ClauseSet, Conjunction, Dialect, Statement};
//!
//! let mut clauses = ClauseSet::new();
//! clauses.set_table("users")?;
//! clauses
//!     .predicates_mut()
//!     .add_condition("status", "=", "active", Conjunction::And)?;
//! clauses.set_limit(10);
//!
//! let stmt = compile(&clauses, Statement::Select, Dialect::Named)?;
//! assert_eq!(stmt.sql(), "SELECT * FROM users WHERE status = :status LIMIT 10");
//! # Ok::<(), liteorm::OrmError>(())
//! ```

mod binding;
mod clause;
mod compile;
mod predicate;

pub use binding::{Binding, BindingTable};
pub use clause::{
    ClauseSet, DEFAULT_SOFT_DELETE_COLUMN, JoinKind, JoinSpec, OrderDirection, OrderSpec,
};
pub use compile::{
    AggregateFn, CompiledStatement, Dialect, Statement, StatementKind, compile,
};
pub use predicate::{Conjunction, Operator, Predicate, PredicateList};
