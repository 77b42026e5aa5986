//! Transaction helpers.
//!
//! The handle owns the connection, so a transaction is just `BEGIN`, some
//! statements on the same handle, then `COMMIT` or `ROLLBACK`. Use a handle
//! that pins one connection (`tokio_postgres::Client`, a pooled client,
//! [`MySqlHandle`](crate::MySqlHandle)); a bare pool refuses to begin.
//!
//! # Example
//!
//! ```ignore
//! let orm = Orm::new(client);
//!
//! liteorm::transaction!(orm.handle(), {
//!     orm.table("accounts")
//!         .eq("id", 1)
//!         .update(record! { "balance" => 90 })
//!         .await?;
//!     orm.table("accounts")
//!         .eq("id", 2)
//!         .update(record! { "balance" => 110 })
//!         .await?;
//!     Ok(())
//! })?;
//! ```

use crate::client::DbHandle;
use crate::error::{OrmError, OrmResult};
use tracing::debug;

const LOG_TARGET: &str = "liteorm.sql";

pub async fn begin<H: DbHandle>(handle: &H) -> OrmResult<()> {
    debug!(target: LOG_TARGET, "BEGIN");
    handle.begin().await
}

pub async fn commit<H: DbHandle>(handle: &H) -> OrmResult<()> {
    debug!(target: LOG_TARGET, "COMMIT");
    handle.commit().await
}

pub async fn rollback<H: DbHandle>(handle: &H) -> OrmResult<()> {
    debug!(target: LOG_TARGET, "ROLLBACK");
    handle.rollback().await
}

/// Error for a block that failed and whose rollback failed too. The block's
/// error stays the source.
pub fn rollback_failed(error: OrmError, rollback_err: OrmError) -> OrmError {
    OrmError::data_access(
        format!("{error} (rollback failed: {rollback_err})"),
        error,
    )
}

/// Runs the given block inside a database transaction.
///
/// - Begins via [`DbHandle::begin`].
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)`; if the rollback fails too, both errors are
///   reported.
///
/// The block must evaluate to `liteorm::OrmResult<T>`. A failed `BEGIN` or
/// `COMMIT` is returned with `?` from the enclosing function.
#[macro_export]
macro_rules! transaction {
    ($handle:expr, $body:block) => {{
        let __liteorm_handle = &$handle;
        $crate::transaction::begin(__liteorm_handle).await?;

        let __liteorm_tx_result = async { $body }.await;
        match __liteorm_tx_result {
            Ok(value) => {
                $crate::transaction::commit(__liteorm_handle).await?;
                Ok(value)
            }
            Err(error) => match $crate::transaction::rollback(__liteorm_handle).await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::transaction::rollback_failed(error, rollback_err)),
            },
        }
    }};
}
