//! PostgreSQL QR credential storage.

use super::database_error;
use crate::providers::{BoxFuture, CredentialStore, StoreResult};
use shuttle_core::UserId;
use sqlx::PgPool;

/// PostgreSQL-backed [`CredentialStore`]. One row per rider.
#[derive(Clone)]
pub struct PostgresCredentialStore {
    /// PostgreSQL connection pool.
    pool: PgPool,
}

impl PostgresCredentialStore {
    /// Create a new credential store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl CredentialStore for PostgresCredentialStore {
    fn put(&self, user_id: UserId, token: String) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO qr_credentials (user_id, token, issued_at)
                VALUES ($1, $2, NOW())
                ON CONFLICT (user_id)
                DO UPDATE SET token = EXCLUDED.token, issued_at = EXCLUDED.issued_at
                ",
            )
            .bind(user_id.get())
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(database_error("store credential"))?;
            Ok(())
        })
    }

    fn get(&self, user_id: UserId) -> BoxFuture<'_, StoreResult<Option<String>>> {
        Box::pin(async move {
            let row: Option<(String,)> =
                sqlx::query_as("SELECT token FROM qr_credentials WHERE user_id = $1")
                    .bind(user_id.get())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(database_error("load credential"))?;
            Ok(row.map(|(token,)| token))
        })
    }
}
