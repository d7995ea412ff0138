//! PostgreSQL storage implementations.
//!
//! - Boarding ledger (unique per rider, route and service day)
//! - User and route directories (read-only lookups)
//! - QR credentials

pub mod credentials;
pub mod directory;
pub mod ledger;

// Re-exports
pub use credentials::PostgresCredentialStore;
pub use directory::PostgresDirectory;
pub use ledger::PostgresLedgerStore;

use crate::error::StoreError;
use crate::providers::StoreResult;
use sqlx::PgPool;

/// Run the boarding schema migrations.
///
/// # Errors
///
/// Returns [`StoreError::Unavailable`] if a migration fails.
pub async fn migrate(pool: &PgPool) -> StoreResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Unavailable(format!("Migration failed: {e}")))
}

pub(crate) fn database_error(op: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e| match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::Duplicate,
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(format!("{op}: {e}"))
        }
        _ => StoreError::Unavailable(format!("{op}: {e}")),
    }
}
