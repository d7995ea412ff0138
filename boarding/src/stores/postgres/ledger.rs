//! PostgreSQL boarding ledger.
//!
//! The `boarding_records_once_per_day` unique constraint on
//! `(user_id, route_id, service_day)` makes `insert` the authority on
//! duplicates: of two concurrent inserts for the same rider, route and day,
//! exactly one commits and the other surfaces as
//! [`StoreError::Duplicate`](crate::error::StoreError::Duplicate).
//!
//! # Example
//!
//! ```no_run
//! use shuttle_boarding::stores::PostgresLedgerStore;
//! use sqlx::PgPool;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = PgPool::connect("postgresql://localhost/shuttle").await?;
//! let ledger = PostgresLedgerStore::new(pool);
//! # Ok(())
//! # }
//! ```

use super::database_error;
use crate::providers::{BoardingLedgerStore, BoxFuture, StoreResult};
use chrono::{DateTime, NaiveDate, Utc};
use shuttle_core::{BoardingId, BoardingRecord, DayWindow, NewBoarding, RouteId, UserId};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// PostgreSQL-backed [`BoardingLedgerStore`].
#[derive(Clone)]
pub struct PostgresLedgerStore {
    /// PostgreSQL connection pool.
    pool: PgPool,
}

impl PostgresLedgerStore {
    /// Create a new ledger store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &PgRow) -> StoreResult<BoardingRecord> {
        let decode = database_error("decode boarding row");
        Ok(BoardingRecord {
            id: BoardingId(row.try_get::<i64, _>("id").map_err(&decode)?),
            user_id: UserId(row.try_get::<i64, _>("user_id").map_err(&decode)?),
            route_id: RouteId(row.try_get::<i64, _>("route_id").map_err(&decode)?),
            boarding_time: row
                .try_get::<DateTime<Utc>, _>("boarding_time")
                .map_err(&decode)?,
            service_day: row
                .try_get::<NaiveDate, _>("service_day")
                .map_err(&decode)?,
        })
    }
}

impl BoardingLedgerStore for PostgresLedgerStore {
    fn insert(&self, boarding: NewBoarding) -> BoxFuture<'_, StoreResult<BoardingRecord>> {
        Box::pin(async move {
            let (id,): (i64,) = sqlx::query_as(
                r"
                INSERT INTO boarding_records (user_id, route_id, boarding_time, service_day)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                ",
            )
            .bind(boarding.user_id.get())
            .bind(boarding.route_id.get())
            .bind(boarding.boarding_time)
            .bind(boarding.service_day)
            .fetch_one(&self.pool)
            .await
            .map_err(database_error("insert boarding"))?;

            Ok(BoardingRecord::from_new(BoardingId(id), boarding))
        })
    }

    fn exists_between(
        &self,
        user_id: UserId,
        route_id: RouteId,
        window: DayWindow,
    ) -> BoxFuture<'_, StoreResult<bool>> {
        Box::pin(async move {
            let (exists,): (bool,) = sqlx::query_as(
                r"
                SELECT EXISTS (
                    SELECT 1 FROM boarding_records
                    WHERE user_id = $1
                      AND route_id = $2
                      AND boarding_time >= $3
                      AND boarding_time < $4
                )
                ",
            )
            .bind(user_id.get())
            .bind(route_id.get())
            .bind(window.start)
            .bind(window.end)
            .fetch_one(&self.pool)
            .await
            .map_err(database_error("check duplicate boarding"))?;

            Ok(exists)
        })
    }

    fn list_by_user(&self, user_id: UserId) -> BoxFuture<'_, StoreResult<Vec<BoardingRecord>>> {
        Box::pin(async move {
            let rows = sqlx::query(
                r"
                SELECT id, user_id, route_id, boarding_time, service_day
                FROM boarding_records
                WHERE user_id = $1
                ORDER BY boarding_time DESC, id DESC
                ",
            )
            .bind(user_id.get())
            .fetch_all(&self.pool)
            .await
            .map_err(database_error("list boardings"))?;

            rows.iter().map(Self::row_to_record).collect()
        })
    }

    fn boarding_ids_since(
        &self,
        route_id: RouteId,
        since: Option<DateTime<Utc>>,
    ) -> BoxFuture<'_, StoreResult<Vec<BoardingId>>> {
        Box::pin(async move {
            let ids: Vec<(i64,)> = sqlx::query_as(
                r"
                SELECT id FROM boarding_records
                WHERE route_id = $1
                  AND ($2::timestamptz IS NULL OR boarding_time >= $2)
                ORDER BY id
                ",
            )
            .bind(route_id.get())
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .map_err(database_error("list route boardings"))?;

            Ok(ids.into_iter().map(|(id,)| BoardingId(id)).collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use chrono::TimeZone;

    #[tokio::test]
    #[ignore] // Requires PostgreSQL running (DATABASE_URL)
    #[allow(clippy::unwrap_used, clippy::expect_used)]
    async fn test_unique_constraint_maps_to_duplicate() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
        let pool = PgPool::connect(&url).await.expect("connect");
        super::super::migrate(&pool).await.expect("migrate");
        sqlx::query("DELETE FROM boarding_records WHERE user_id = $1")
            .bind(880_001_i64)
            .execute(&pool)
            .await
            .expect("cleanup");
        let store = PostgresLedgerStore::new(pool);

        let at = Utc.with_ymd_and_hms(2031, 5, 5, 0, 0, 0).unwrap();
        let boarding = NewBoarding {
            user_id: UserId(880_001),
            route_id: RouteId(880_001),
            boarding_time: at,
            service_day: at.date_naive(),
        };

        let (first, second) = tokio::join!(store.insert(boarding), store.insert(boarding));
        let outcomes = [first.is_ok(), second.is_ok()];
        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
        assert!(
            matches!(first, Err(StoreError::Duplicate)) || matches!(second, Err(StoreError::Duplicate))
        );
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL running (DATABASE_URL)
    #[allow(clippy::unwrap_used, clippy::expect_used)]
    async fn test_boarding_ids_since_reset() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
        let pool = PgPool::connect(&url).await.expect("connect");
        super::super::migrate(&pool).await.expect("migrate");
        let route = RouteId(880_002);
        sqlx::query("DELETE FROM boarding_records WHERE route_id = $1")
            .bind(route.get())
            .execute(&pool)
            .await
            .expect("cleanup");
        let store = PostgresLedgerStore::new(pool);

        let monday = Utc.with_ymd_and_hms(2031, 5, 5, 0, 0, 0).unwrap();
        let tuesday = Utc.with_ymd_and_hms(2031, 5, 6, 0, 0, 0).unwrap();
        let mut ids = Vec::new();
        for (user, at) in [(1, monday), (2, tuesday)] {
            let record = store
                .insert(NewBoarding {
                    user_id: UserId(880_000 + user),
                    route_id: route,
                    boarding_time: at,
                    service_day: at.date_naive(),
                })
                .await
                .unwrap();
            ids.push(record.id);
        }

        assert_eq!(store.boarding_ids_since(route, None).await.unwrap(), ids);
        assert_eq!(
            store.boarding_ids_since(route, Some(tuesday)).await.unwrap(),
            vec![ids[1]]
        );
    }
}
