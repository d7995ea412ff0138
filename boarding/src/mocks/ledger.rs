//! Mock boarding ledger for testing.

use super::{down, lock};
use crate::error::StoreError;
use crate::providers::{BoardingLedgerStore, BoxFuture, StoreResult};
use chrono::{DateTime, Utc};
use shuttle_core::{BoardingId, BoardingRecord, DayWindow, NewBoarding, RouteId, UserId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Rows {
    records: Vec<BoardingRecord>,
    next_id: i64,
}

/// Mock ledger store.
///
/// Enforces the `(user_id, route_id, service_day)` uniqueness under one lock,
/// so concurrent inserts race exactly like against a unique constraint.
#[derive(Debug, Clone, Default)]
pub struct MockLedgerStore {
    rows: Arc<Mutex<Rows>>,
    unavailable: Arc<AtomicBool>,
}

impl MockLedgerStore {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored rows, oldest first (for testing).
    #[must_use]
    pub fn records(&self) -> Vec<BoardingRecord> {
        self.rows
            .lock()
            .map(|rows| rows.records.clone())
            .unwrap_or_default()
    }

    /// Make every call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_up(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(down("ledger"));
        }
        Ok(())
    }
}

impl BoardingLedgerStore for MockLedgerStore {
    fn insert(&self, boarding: NewBoarding) -> BoxFuture<'_, StoreResult<BoardingRecord>> {
        Box::pin(async move {
            self.check_up()?;
            let mut rows = lock(&self.rows)?;

            let taken = rows.records.iter().any(|r| {
                r.user_id == boarding.user_id
                    && r.route_id == boarding.route_id
                    && r.service_day == boarding.service_day
            });
            if taken {
                return Err(StoreError::Duplicate);
            }

            rows.next_id += 1;
            let record = BoardingRecord::from_new(BoardingId(rows.next_id), boarding);
            rows.records.push(record);
            Ok(record)
        })
    }

    fn exists_between(
        &self,
        user_id: UserId,
        route_id: RouteId,
        window: DayWindow,
    ) -> BoxFuture<'_, StoreResult<bool>> {
        Box::pin(async move {
            self.check_up()?;
            let rows = lock(&self.rows)?;
            Ok(rows.records.iter().any(|r| {
                r.user_id == user_id && r.route_id == route_id && window.contains(r.boarding_time)
            }))
        })
    }

    fn list_by_user(&self, user_id: UserId) -> BoxFuture<'_, StoreResult<Vec<BoardingRecord>>> {
        Box::pin(async move {
            self.check_up()?;
            let rows = lock(&self.rows)?;
            let mut records: Vec<BoardingRecord> = rows
                .records
                .iter()
                .filter(|r| r.user_id == user_id)
                .copied()
                .collect();
            records.sort_by(|a, b| {
                b.boarding_time
                    .cmp(&a.boarding_time)
                    .then_with(|| b.id.cmp(&a.id))
            });
            Ok(records)
        })
    }

    fn boarding_ids_since(
        &self,
        route_id: RouteId,
        since: Option<DateTime<Utc>>,
    ) -> BoxFuture<'_, StoreResult<Vec<BoardingId>>> {
        Box::pin(async move {
            self.check_up()?;
            let rows = lock(&self.rows)?;
            Ok(rows
                .records
                .iter()
                .filter(|r| r.route_id == route_id && since.is_none_or(|at| at <= r.boarding_time))
                .map(|r| r.id)
                .collect())
        })
    }
}
