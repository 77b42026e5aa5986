//! # liteorm
//!
//! A lightweight ORM with a fluent, chainable query session.
//!
//! ## Features
//!
//! - **Injected handle**: every [`Orm`] owns the database handle it was given;
//!   there is no global connection
//! - **Safe by construction**: values always travel as bound parameters,
//!   identifiers and operators are checked against an allow-list
//! - **Safe defaults**: UPDATE and DELETE require a condition, INSERT and
//!   UPDATE require data
//! - **Soft deletes**: `enable_soft_delete()` scopes reads to live rows and
//!   turns DELETE into a timestamp update
//! - **Three placeholder styles**: `:name`, `?` and `$n` from one compiler
//! - **Eager loading** of has-one / has-many relations with one query each
//!
//! ## Session
//!
//! ```ignore
//! use liteorm::prelude::*;
//!
//! let orm = Orm::new(client);
//!
//! // SELECT
//! let users = orm
//!     .table("users")
//!     .select(&["id", "name"])
//!     .eq("status", "active")
//!     .order_by_desc("created_at")
//!     .limit(10)
//!     .get()
//!     .await?;
//!
//! // INSERT
//! orm.table("users")
//!     .insert(record! { "name" => "Ada", "email" => "ada@example.com" })
//!     .await?;
//!
//! // UPDATE
//! orm.table("users")
//!     .eq("id", 7)
//!     .update(record! { "status" => "inactive" })
//!     .await?;
//!
//! // Aggregate
//! let total = orm.table("users").active().count("id").await?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod exec;
pub mod ident;
mod postgres;
pub mod qb;
pub mod relation;
pub mod row;
pub mod schema;
pub mod session;
pub mod transaction;
pub mod validate;
pub mod value;

pub mod prelude;

pub use client::{DbHandle, InsertOutcome};
pub use config::{ConnectionConfig, DatabaseConfig, Driver, SessionOptions, connect_postgres};
pub use error::{OrmError, OrmResult};
pub use exec::{DEFAULT_LOG_SQL_MAX, ExecutionResult, Executor};
pub use relation::{Relation, RelationKind};
pub use row::{FromRow, Row};
pub use schema::{Blueprint, Schema};
pub use session::{Orm, Session, SessionState};
pub use validate::{Rule, ValidationErrors, Validator};
pub use value::{FromValue, Record, Value};

// Re-export the statement types most callers touch
pub use qb::{AggregateFn, CompiledStatement, Dialect, Statement, StatementKind};

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use pool::create_pool;

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(feature = "mysql")]
pub use config::connect_mysql;

#[cfg(feature = "mysql")]
pub use mysql::MySqlHandle;
