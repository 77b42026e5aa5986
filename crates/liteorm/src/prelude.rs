//! Convenient imports for typical `liteorm` usage.
//!
//! ```ignore
//! use liteorm::prelude::*;
//! ```

pub use crate::{
    DbHandle, FromRow, FromValue, Orm, OrmError, OrmResult, Record, Relation, Row, Session,
    Rule, SessionOptions, Validator, Value, record,
};

#[cfg(feature = "pool")]
pub use crate::create_pool;
