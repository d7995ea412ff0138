//! PostgreSQL user and route lookups.
//!
//! Read-only views over tables owned by the account and route subsystems.

use super::database_error;
use crate::providers::{BoxFuture, RouteDirectory, StoreResult, UserDirectory};
use shuttle_core::{Location, LocationId, Rider, RouteId, ShuttleRoute, UserId};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// PostgreSQL-backed [`UserDirectory`] and [`RouteDirectory`].
#[derive(Clone)]
pub struct PostgresDirectory {
    /// PostgreSQL connection pool.
    pool: PgPool,
}

impl PostgresDirectory {
    /// Create a new directory.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_route(row: &PgRow) -> StoreResult<ShuttleRoute> {
        let decode = database_error("decode route row");
        let location = |prefix: &str| -> StoreResult<Location> {
            Ok(Location {
                id: LocationId(row.try_get(format!("{prefix}_id").as_str()).map_err(&decode)?),
                name: row.try_get(format!("{prefix}_name").as_str()).map_err(&decode)?,
                latitude: row.try_get(format!("{prefix}_lat").as_str()).map_err(&decode)?,
                longitude: row.try_get(format!("{prefix}_lon").as_str()).map_err(&decode)?,
            })
        };

        Ok(ShuttleRoute {
            id: RouteId(row.try_get("id").map_err(&decode)?),
            name: row.try_get("name").map_err(&decode)?,
            departure: location("departure")?,
            destination: location("destination")?,
            is_commute: row.try_get("is_commute").map_err(&decode)?,
        })
    }
}

impl UserDirectory for PostgresDirectory {
    fn find_by_id_and_email<'a>(
        &'a self,
        id: UserId,
        email: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<Rider>>> {
        Box::pin(async move {
            let row: Option<(i64, String, String)> = sqlx::query_as(
                r"
                SELECT id, name, email
                FROM users
                WHERE id = $1 AND email = $2
                ",
            )
            .bind(id.get())
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error("find user"))?;

            Ok(row.map(|(id, name, email)| Rider {
                id: UserId(id),
                name,
                email,
            }))
        })
    }
}

impl RouteDirectory for PostgresDirectory {
    fn find_route(&self, id: RouteId) -> BoxFuture<'_, StoreResult<Option<ShuttleRoute>>> {
        Box::pin(async move {
            let row = sqlx::query(
                r"
                SELECT s.id, s.name, s.is_commute,
                       d.id AS departure_id, d.name AS departure_name,
                       d.latitude AS departure_lat, d.longitude AS departure_lon,
                       t.id AS destination_id, t.name AS destination_name,
                       t.latitude AS destination_lat, t.longitude AS destination_lon
                FROM shuttles s
                JOIN locations d ON d.id = s.departure_id
                JOIN locations t ON t.id = s.destination_id
                WHERE s.id = $1
                ",
            )
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error("find route"))?;

            row.as_ref().map(Self::row_to_route).transpose()
        })
    }
}
