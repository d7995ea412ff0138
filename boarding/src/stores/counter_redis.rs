//! Redis-based rider counters.
//!
//! # Architecture
//!
//! Per route, three keys:
//! - **Count**: `boarding:count:shuttle:{route_id}` → integer, absent ≡ 0
//! - **Counted set**: `boarding:counted:shuttle:{route_id}` → boarding IDs
//!   already in the count since the last reset
//! - **Reset marker**: `boarding:reset:shuttle:{route_id}` → Unix millis of
//!   the last operator reset
//!
//! Increments and rebuilds run as Lua scripts: `SADD` to the counted set and
//! `INCR` the count only when the ID is new. Counting a boarding twice is a
//! no-op, so a rebuild racing a live increment cannot double count or drop
//! one. A rebuild also compares the reset marker it was planned against and
//! refuses to write if a reset happened in between.
//!
//! A reset deletes the count and the counted set and writes the marker in one
//! `MULTI`/`EXEC`.
//!
//! # Example
//!
//! ```no_run
//! use shuttle_boarding::stores::RedisRiderCounter;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let counter = RedisRiderCounter::new("redis://127.0.0.1:6379").await?;
//! # Ok(())
//! # }
//! ```

use crate::error::StoreError;
use crate::providers::{BoxFuture, RiderCounter, StoreResult};
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use shuttle_core::{BoardingId, RouteId};

/// KEYS: count, counted set, reset marker. ARGV: boarding ID, boarding millis.
const INCREMENT_SCRIPT: &str = r"
    local reset_at = redis.call('GET', KEYS[3])
    if reset_at and tonumber(ARGV[2]) < tonumber(reset_at) then
        return tonumber(redis.call('GET', KEYS[1]) or '0')
    end
    if redis.call('SADD', KEYS[2], ARGV[1]) == 1 then
        return redis.call('INCR', KEYS[1])
    end
    return tonumber(redis.call('GET', KEYS[1]) or '0')
";

/// KEYS: count, counted set, reset marker.
/// ARGV: expected reset millis (empty for never), then boarding IDs.
/// Returns -1 when the reset marker moved.
const REBUILD_SCRIPT: &str = r"
    local reset_at = redis.call('GET', KEYS[3]) or ''
    if reset_at ~= ARGV[1] then
        return -1
    end
    for i = 2, #ARGV do
        if redis.call('SADD', KEYS[2], ARGV[i]) == 1 then
            redis.call('INCR', KEYS[1])
        end
    end
    return tonumber(redis.call('GET', KEYS[1]) or '0')
";

/// Redis-backed [`RiderCounter`].
#[derive(Clone)]
pub struct RedisRiderCounter {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
}

impl RedisRiderCounter {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the client cannot be created or
    /// the first connection fails.
    pub async fn new(redis_url: &str) -> StoreResult<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| StoreError::Unavailable(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            StoreError::Unavailable(format!("Failed to create Redis connection manager: {e}"))
        })?;

        Ok(Self { conn_manager })
    }

    /// Wrap an existing connection manager.
    #[must_use]
    pub const fn from_manager(conn_manager: ConnectionManager) -> Self {
        Self { conn_manager }
    }

    fn count_key(route_id: RouteId) -> String {
        format!("boarding:count:shuttle:{route_id}")
    }

    fn counted_key(route_id: RouteId) -> String {
        format!("boarding:counted:shuttle:{route_id}")
    }

    fn reset_key(route_id: RouteId) -> String {
        format!("boarding:reset:shuttle:{route_id}")
    }

    fn to_count(raw: i64) -> StoreResult<u64> {
        u64::try_from(raw).map_err(|_| StoreError::Corrupt(format!("negative rider count {raw}")))
    }
}

fn unavailable(op: &'static str) -> impl Fn(redis::RedisError) -> StoreError {
    move |e| StoreError::Unavailable(format!("Redis {op} failed: {e}"))
}

impl RiderCounter for RedisRiderCounter {
    fn get(&self, route_id: RouteId) -> BoxFuture<'_, StoreResult<u64>> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let raw: Option<i64> = conn
                .get(Self::count_key(route_id))
                .await
                .map_err(unavailable("GET"))?;
            Self::to_count(raw.unwrap_or(0))
        })
    }

    fn increment(
        &self,
        route_id: RouteId,
        boarding_id: BoardingId,
        boarding_time: DateTime<Utc>,
    ) -> BoxFuture<'_, StoreResult<u64>> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let raw: i64 = redis::Script::new(INCREMENT_SCRIPT)
                .key(Self::count_key(route_id))
                .key(Self::counted_key(route_id))
                .key(Self::reset_key(route_id))
                .arg(boarding_id.get())
                .arg(boarding_time.timestamp_millis())
                .invoke_async(&mut conn)
                .await
                .map_err(unavailable("increment script"))?;
            Self::to_count(raw)
        })
    }

    fn reset(&self, route_id: RouteId, at: DateTime<Utc>) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let _: () = redis::pipe()
                .atomic()
                .del(Self::count_key(route_id))
                .ignore()
                .del(Self::counted_key(route_id))
                .ignore()
                .set(Self::reset_key(route_id), at.timestamp_millis())
                .ignore()
                .query_async(&mut conn)
                .await
                .map_err(unavailable("reset pipeline"))?;
            Ok(())
        })
    }

    fn last_reset(&self, route_id: RouteId) -> BoxFuture<'_, StoreResult<Option<DateTime<Utc>>>> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let millis: Option<i64> = conn
                .get(Self::reset_key(route_id))
                .await
                .map_err(unavailable("GET"))?;
            millis
                .map(|ms| {
                    DateTime::<Utc>::from_timestamp_millis(ms)
                        .ok_or_else(|| StoreError::Corrupt(format!("reset marker {ms}")))
                })
                .transpose()
        })
    }

    fn rebuild(
        &self,
        route_id: RouteId,
        expected_reset: Option<DateTime<Utc>>,
        boardings: Vec<BoardingId>,
    ) -> BoxFuture<'_, StoreResult<Option<u64>>> {
        Box::pin(async move {
            let script = redis::Script::new(REBUILD_SCRIPT);
            let mut invocation = script.prepare_invoke();
            invocation
                .key(Self::count_key(route_id))
                .key(Self::counted_key(route_id))
                .key(Self::reset_key(route_id))
                .arg(
                    expected_reset
                        .map(|at| at.timestamp_millis().to_string())
                        .unwrap_or_default(),
                );
            for boarding_id in &boardings {
                invocation.arg(boarding_id.get());
            }

            let mut conn = self.conn_manager.clone();
            let raw: i64 = invocation
                .invoke_async(&mut conn)
                .await
                .map_err(unavailable("rebuild script"))?;
            if raw < 0 {
                return Ok(None);
            }
            Self::to_count(raw).map(Some)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(
            RedisRiderCounter::count_key(RouteId(42)),
            "boarding:count:shuttle:42"
        );
        assert_eq!(
            RedisRiderCounter::counted_key(RouteId(42)),
            "boarding:counted:shuttle:42"
        );
        assert_eq!(
            RedisRiderCounter::reset_key(RouteId(42)),
            "boarding:reset:shuttle:42"
        );
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used, clippy::expect_used)]
    async fn test_redis_counter_lifecycle() {
        let counter = RedisRiderCounter::new("redis://127.0.0.1:6379")
            .await
            .expect("Failed to connect");
        let route = RouteId(900_001);
        let start = Utc::now();

        counter.reset(route, start).await.unwrap();
        assert_eq!(counter.get(route).await.unwrap(), 0);

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let counter = counter.clone();
                tokio::spawn(async move { counter.increment(route, BoardingId(i), start).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(counter.get(route).await.unwrap(), 20);

        // Same boarding again
        assert_eq!(counter.increment(route, BoardingId(3), start).await.unwrap(), 20);

        counter.reset(route, Utc::now()).await.unwrap();
        assert_eq!(counter.get(route).await.unwrap(), 0);
        assert!(counter.last_reset(route).await.unwrap().is_some());

        // Boarded before the reset
        assert_eq!(counter.increment(route, BoardingId(99), start).await.unwrap(), 0);
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used, clippy::expect_used)]
    async fn test_redis_rebuild_commutes_with_increments() {
        let counter = RedisRiderCounter::new("redis://127.0.0.1:6379")
            .await
            .expect("Failed to connect");
        let route = RouteId(900_002);
        counter.reset(route, Utc::now()).await.unwrap();
        let reset_at = counter.last_reset(route).await.unwrap();
        let later = Utc::now() + chrono::Duration::seconds(1);

        // Live increment lands after the rebuild read the ledger
        counter.increment(route, BoardingId(3), later).await.unwrap();
        let rebuilt = counter
            .rebuild(route, reset_at, vec![BoardingId(1), BoardingId(2)])
            .await
            .unwrap();
        assert_eq!(rebuilt, Some(3));

        // Replaying the full ledger changes nothing
        let rebuilt = counter
            .rebuild(route, reset_at, vec![BoardingId(1), BoardingId(2), BoardingId(3)])
            .await
            .unwrap();
        assert_eq!(rebuilt, Some(3));

        // A reset in between is detected
        counter.reset(route, later).await.unwrap();
        let stale = counter
            .rebuild(route, reset_at, vec![BoardingId(1)])
            .await
            .unwrap();
        assert_eq!(stale, None);
        assert_eq!(counter.get(route).await.unwrap(), 0);
    }
}
