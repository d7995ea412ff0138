//! The boarding ledger.
//!
//! Owns boarding rows and mediates every mutation of the per-route rider
//! counters. The duplicate policy is one boarding per rider per route per
//! service day, where the day is the calendar day in the service time zone
//! and its window is half-open: a boarding at `23:59:59.999` and one at
//! `00:00:00` the next day are on different days.
//!
//! Counters are a projection of the ledger: a route's count is the number of
//! its rows recorded since the last operator reset, or ever if never reset.
//! [`Ledger::reconcile`] rebuilds the counter from exactly those rows.
//!
//! When a boarding is recorded but neither its increment nor a rebuild gets
//! through, the route is marked dirty. The next counter operation on that
//! route rebuilds from the ledger first.

use crate::error::{BoardingError, Result, StoreError};
use crate::providers::{BoardingLedgerStore, RiderCounter, RouteDirectory};
use chrono::{DateTime, Utc};
use serde::Serialize;
use shuttle_core::{
    BoardingId, BoardingRecord, NewBoarding, RouteId, ServiceCalendar, ShuttleRoute, UserId,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

/// Attempts at a rebuild before giving up on concurrent resets.
const REBUILD_ATTEMPTS: usize = 3;

/// One past boarding, resolved against its route for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RideSummary {
    /// Ledger row ID.
    pub boarding_id: BoardingId,
    /// When the boarding was verified.
    pub boarding_time: DateTime<Utc>,
    /// Route boarded.
    pub route_id: RouteId,
    /// Route display name.
    pub route_name: String,
    /// Departure stop name.
    pub departure: String,
    /// Destination stop name.
    pub destination: String,
}

impl RideSummary {
    fn resolve(record: &BoardingRecord, route: &ShuttleRoute) -> Self {
        Self {
            boarding_id: record.id,
            boarding_time: record.boarding_time,
            route_id: record.route_id,
            route_name: route.name.clone(),
            departure: route.departure.name.clone(),
            destination: route.destination.name.clone(),
        }
    }
}

/// Boarding ledger service.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn BoardingLedgerStore>,
    counter: Arc<dyn RiderCounter>,
    routes: Arc<dyn RouteDirectory>,
    calendar: ServiceCalendar,
    /// Routes whose counter missed a boarding.
    dirty: Arc<Mutex<HashSet<RouteId>>>,
}

impl Ledger {
    /// Create a ledger over the given stores.
    #[must_use]
    pub fn new(
        store: Arc<dyn BoardingLedgerStore>,
        counter: Arc<dyn RiderCounter>,
        routes: Arc<dyn RouteDirectory>,
        calendar: ServiceCalendar,
    ) -> Self {
        Self {
            store,
            counter,
            routes,
            calendar,
            dirty: Arc::default(),
        }
    }

    /// The calendar defining service days.
    #[must_use]
    pub const fn calendar(&self) -> &ServiceCalendar {
        &self.calendar
    }

    /// Whether the rider already boarded the route on the service day of `now`.
    ///
    /// # Errors
    ///
    /// Returns [`BoardingError::Storage`] if the ledger cannot be read.
    pub async fn is_duplicate(
        &self,
        user_id: UserId,
        route_id: RouteId,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let window = self.calendar.window_containing(now);
        Ok(self.store.exists_between(user_id, route_id, window).await?)
    }

    /// Fail if the rider already boarded the route on the service day of `now`.
    ///
    /// # Errors
    ///
    /// Returns [`BoardingError::DuplicateBoarding`] on a prior boarding, or
    /// [`BoardingError::Storage`] if the ledger cannot be read.
    pub async fn check_duplicate(
        &self,
        user_id: UserId,
        route_id: RouteId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.is_duplicate(user_id, route_id, now).await? {
            tracing::warn!(
                user_id = %user_id,
                route_id = %route_id,
                "Duplicate boarding rejected"
            );
            return Err(BoardingError::DuplicateBoarding { user_id, route_id });
        }
        Ok(())
    }

    /// Write a boarding row for the service day of `now`.
    ///
    /// The store's uniqueness constraint is the authority: a concurrent
    /// boarding that won the race turns this call into a duplicate.
    ///
    /// # Errors
    ///
    /// Returns [`BoardingError::DuplicateBoarding`] if a row already exists
    /// for that day, or [`BoardingError::Storage`] if the write fails.
    pub async fn record(
        &self,
        user_id: UserId,
        route_id: RouteId,
        now: DateTime<Utc>,
    ) -> Result<BoardingRecord> {
        let boarding = NewBoarding {
            user_id,
            route_id,
            boarding_time: now,
            service_day: self.calendar.service_day(now),
        };

        match self.store.insert(boarding).await {
            Ok(record) => {
                tracing::debug!(
                    boarding_id = %record.id,
                    user_id = %user_id,
                    route_id = %route_id,
                    service_day = %record.service_day,
                    "Boarding recorded"
                );
                Ok(record)
            }
            Err(StoreError::Duplicate) => {
                tracing::warn!(
                    user_id = %user_id,
                    route_id = %route_id,
                    "Duplicate boarding rejected at insert"
                );
                Err(BoardingError::DuplicateBoarding { user_id, route_id })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The rider's boardings, newest first, with route names resolved.
    ///
    /// Rows whose route no longer exists are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`BoardingError::Storage`] if a store cannot be read.
    pub async fn list_by_user(&self, user_id: UserId) -> Result<Vec<RideSummary>> {
        let records = self.store.list_by_user(user_id).await?;

        let mut routes: HashMap<RouteId, Option<ShuttleRoute>> = HashMap::new();
        let mut rides = Vec::with_capacity(records.len());
        for record in &records {
            if !routes.contains_key(&record.route_id) {
                let route = self.routes.find_route(record.route_id).await?;
                routes.insert(record.route_id, route);
            }
            match routes.get(&record.route_id) {
                Some(Some(route)) => rides.push(RideSummary::resolve(record, route)),
                _ => tracing::warn!(
                    boarding_id = %record.id,
                    route_id = %record.route_id,
                    "Boarding references a missing route"
                ),
            }
        }
        Ok(rides)
    }

    /// Current rider count for a route; `0` when never incremented.
    ///
    /// A dirty route is rebuilt from the ledger before answering.
    ///
    /// # Errors
    ///
    /// Returns [`BoardingError::Storage`] if the counter store fails, or if a
    /// dirty route cannot be rebuilt.
    pub async fn get_count(&self, route_id: RouteId) -> Result<u64> {
        if self.is_dirty(route_id) {
            return self.reconcile(route_id).await;
        }
        Ok(self.counter.get(route_id).await?)
    }

    /// Count a recorded boarding and return the route's new count.
    ///
    /// Counting the same boarding twice leaves the count unchanged. A dirty
    /// route is rebuilt from the ledger instead, which includes `record`.
    ///
    /// # Errors
    ///
    /// Returns [`BoardingError::Storage`] if the counter store fails.
    pub async fn increment(&self, record: &BoardingRecord) -> Result<u64> {
        if self.is_dirty(record.route_id) {
            return self.reconcile(record.route_id).await;
        }
        Ok(self
            .counter
            .increment(record.route_id, record.id, record.boarding_time)
            .await?)
    }

    /// Return the route's counter to `0`. Ledger rows are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`BoardingError::Storage`] if the counter store fails.
    pub async fn reset(&self, route_id: RouteId, now: DateTime<Utc>) -> Result<()> {
        self.counter.reset(route_id, now).await?;
        self.clean(route_id);
        tracing::info!(route_id = %route_id, "Rider count reset");
        Ok(())
    }

    /// Rebuild the route's counter from the ledger and return the new value.
    ///
    /// Counts every row recorded since the last reset, or every row of the
    /// route if it was never reset. Boardings counted concurrently are not
    /// counted twice. A reset landing mid-rebuild restarts it.
    ///
    /// # Errors
    ///
    /// Returns [`BoardingError::Storage`] if either store fails, with
    /// [`StoreError::Conflict`] if resets kept racing the rebuild.
    pub async fn reconcile(&self, route_id: RouteId) -> Result<u64> {
        for attempt in 1..=REBUILD_ATTEMPTS {
            let since = self.counter.last_reset(route_id).await?;
            let boardings = self.store.boarding_ids_since(route_id, since).await?;
            let rows = boardings.len();

            if let Some(count) = self.counter.rebuild(route_id, since, boardings).await? {
                self.clean(route_id);
                tracing::info!(
                    route_id = %route_id,
                    count = count,
                    rows = rows,
                    since = ?since,
                    "Rider count rebuilt from ledger"
                );
                return Ok(count);
            }

            tracing::debug!(
                route_id = %route_id,
                attempt = attempt,
                "Counter reset during rebuild, retrying"
            );
        }

        Err(StoreError::Conflict(format!(
            "route {route_id} counter kept resetting during rebuild"
        ))
        .into())
    }

    /// Note that a recorded boarding never reached the route's counter.
    pub fn mark_dirty(&self, route_id: RouteId) {
        self.dirty
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(route_id);
    }

    /// Whether the route's counter is known to have missed a boarding.
    #[must_use]
    pub fn is_dirty(&self, route_id: RouteId) -> bool {
        self.dirty
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&route_id)
    }

    fn clean(&self, route_id: RouteId) {
        self.dirty
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&route_id);
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("calendar", &self.calendar)
            .finish_non_exhaustive()
    }
}
