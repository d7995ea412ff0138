//! Mock rider counter for testing.

use super::{down, lock};
use crate::providers::{BoxFuture, RiderCounter, StoreResult};
use chrono::{DateTime, Utc};
use shuttle_core::{BoardingId, RouteId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct RouteCounter {
    count: u64,
    counted: HashSet<BoardingId>,
    reset_at: Option<DateTime<Utc>>,
}

impl RouteCounter {
    fn count_once(&mut self, boarding_id: BoardingId) {
        if self.counted.insert(boarding_id) {
            self.count += 1;
        }
    }
}

/// Mock rider counter.
///
/// Every operation runs under one lock, matching the atomicity of the
/// server-side scripts of the Redis store.
#[derive(Debug, Clone, Default)]
pub struct MockRiderCounter {
    routes: Arc<Mutex<HashMap<RouteId, RouteCounter>>>,
    fail_increments: Arc<AtomicBool>,
    unavailable: Arc<AtomicBool>,
}

impl MockRiderCounter {
    /// Create an empty counter store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `increment` fail while other calls keep working.
    pub fn set_fail_increments(&self, fail: bool) {
        self.fail_increments.store(fail, Ordering::SeqCst);
    }

    /// Make every call fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_up(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(down("counter store"));
        }
        Ok(())
    }
}

impl RiderCounter for MockRiderCounter {
    fn get(&self, route_id: RouteId) -> BoxFuture<'_, StoreResult<u64>> {
        Box::pin(async move {
            self.check_up()?;
            Ok(lock(&self.routes)?
                .get(&route_id)
                .map_or(0, |route| route.count))
        })
    }

    fn increment(
        &self,
        route_id: RouteId,
        boarding_id: BoardingId,
        boarding_time: DateTime<Utc>,
    ) -> BoxFuture<'_, StoreResult<u64>> {
        Box::pin(async move {
            self.check_up()?;
            if self.fail_increments.load(Ordering::SeqCst) {
                return Err(down("counter increment"));
            }
            let mut routes = lock(&self.routes)?;
            let route = routes.entry(route_id).or_default();
            if route.reset_at.is_none_or(|at| boarding_time >= at) {
                route.count_once(boarding_id);
            }
            Ok(route.count)
        })
    }

    fn reset(&self, route_id: RouteId, at: DateTime<Utc>) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            self.check_up()?;
            lock(&self.routes)?.insert(
                route_id,
                RouteCounter {
                    reset_at: Some(at),
                    ..RouteCounter::default()
                },
            );
            Ok(())
        })
    }

    fn last_reset(&self, route_id: RouteId) -> BoxFuture<'_, StoreResult<Option<DateTime<Utc>>>> {
        Box::pin(async move {
            self.check_up()?;
            Ok(lock(&self.routes)?
                .get(&route_id)
                .and_then(|route| route.reset_at))
        })
    }

    fn rebuild(
        &self,
        route_id: RouteId,
        expected_reset: Option<DateTime<Utc>>,
        boardings: Vec<BoardingId>,
    ) -> BoxFuture<'_, StoreResult<Option<u64>>> {
        Box::pin(async move {
            self.check_up()?;
            let mut routes = lock(&self.routes)?;
            let route = routes.entry(route_id).or_default();
            if route.reset_at != expected_reset {
                return Ok(None);
            }
            for boarding_id in boardings {
                route.count_once(boarding_id);
            }
            Ok(Some(route.count))
        })
    }
}
