//! Boarding providers.
//!
//! Traits for every collaborator the boarding core reads from or writes to.
//! The core depends on these traits; the application wires concrete
//! implementations (PostgreSQL, Redis) and tests wire the in-memory mocks.
//!
//! ```text
//!   UserDirectory ─┐                 ┌─ BoardingLedgerStore (rows, unique per day)
//!   RouteDirectory ┼─ Verification ──┤
//!   QrCodec ───────┘                 └─ RiderCounter (fast store, projection)
//! ```
//!
//! These traits return `Pin<Box<dyn Future>>` instead of `async fn` so they
//! can be held as `Arc<dyn Trait>` in shared application state.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use shuttle_core::{
    BoardingId, BoardingRecord, DayWindow, NewBoarding, Rider, RouteId, ShuttleRoute, UserId,
};
use std::future::Future;
use std::pin::Pin;

/// Boxed, sendable future returned by provider methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result type for provider calls.
pub type StoreResult<T> = Result<T, StoreError>;

/// Account lookups (owned by the account subsystem).
pub trait UserDirectory: Send + Sync {
    /// Find the account matching both `id` and `email`.
    ///
    /// A row whose ID matches but whose email differs is not a match.
    fn find_by_id_and_email<'a>(
        &'a self,
        id: UserId,
        email: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<Rider>>>;
}

/// Route reference data lookups.
pub trait RouteDirectory: Send + Sync {
    /// Find a route with its departure and destination resolved.
    fn find_route(&self, id: RouteId) -> BoxFuture<'_, StoreResult<Option<ShuttleRoute>>>;
}

/// Durable boarding ledger.
///
/// # Implementation Notes
///
/// - **CRITICAL**: `insert` MUST reject a second row for the same
///   `(user_id, route_id, service_day)` with [`StoreError::Duplicate`],
///   atomically with the write (unique constraint, not a prior read).
/// - Rows are never updated.
pub trait BoardingLedgerStore: Send + Sync {
    /// Write a boarding row.
    fn insert(&self, boarding: NewBoarding) -> BoxFuture<'_, StoreResult<BoardingRecord>>;

    /// Whether a row exists for `(user_id, route_id)` with
    /// `window.start <= boarding_time < window.end`.
    fn exists_between(
        &self,
        user_id: UserId,
        route_id: RouteId,
        window: DayWindow,
    ) -> BoxFuture<'_, StoreResult<bool>>;

    /// All rows for a rider, newest first.
    fn list_by_user(&self, user_id: UserId) -> BoxFuture<'_, StoreResult<Vec<BoardingRecord>>>;

    /// IDs of a route's rows with `since <= boarding_time`, or every row of
    /// the route when `since` is `None`.
    fn boarding_ids_since(
        &self,
        route_id: RouteId,
        since: Option<DateTime<Utc>>,
    ) -> BoxFuture<'_, StoreResult<Vec<BoardingId>>>;
}

/// Per-route rider counters in the fast shared store.
///
/// A counter remembers which boardings it has counted since its last reset,
/// so counting the same boarding twice is a no-op. That makes a rebuild from
/// the ledger commute with increments landing at the same time.
///
/// # Implementation Notes
///
/// - `increment` and `rebuild` MUST each run as one atomic step in the store
///   (a server-side script, or a single lock).
/// - The count itself MUST move with the store's atomic increment primitive.
/// - An absent counter reads as `0`.
/// - `reset` removes the count and the counted set and records when it
///   happened, atomically.
pub trait RiderCounter: Send + Sync {
    /// Current value.
    fn get(&self, route_id: RouteId) -> BoxFuture<'_, StoreResult<u64>>;

    /// Count one boarding and return the new value.
    ///
    /// A boarding already counted, or one older than the last reset, leaves
    /// the value unchanged.
    fn increment(
        &self,
        route_id: RouteId,
        boarding_id: BoardingId,
        boarding_time: DateTime<Utc>,
    ) -> BoxFuture<'_, StoreResult<u64>>;

    /// Remove the counter, noting `at` as the reset time.
    fn reset(&self, route_id: RouteId, at: DateTime<Utc>) -> BoxFuture<'_, StoreResult<()>>;

    /// When the counter was last reset, if ever.
    fn last_reset(&self, route_id: RouteId) -> BoxFuture<'_, StoreResult<Option<DateTime<Utc>>>>;

    /// Count every boarding in `boardings` not counted yet and return the
    /// new value.
    ///
    /// `expected_reset` is the reset marker the caller read before loading
    /// `boardings` from the ledger. If the marker has moved since, nothing is
    /// written and `None` is returned so the caller can reload.
    fn rebuild(
        &self,
        route_id: RouteId,
        expected_reset: Option<DateTime<Utc>>,
        boardings: Vec<BoardingId>,
    ) -> BoxFuture<'_, StoreResult<Option<u64>>>;
}

/// Storage for each rider's current QR credential.
pub trait CredentialStore: Send + Sync {
    /// Store `token` as the rider's credential, replacing any previous one.
    fn put(&self, user_id: UserId, token: String) -> BoxFuture<'_, StoreResult<()>>;

    /// The rider's current credential.
    fn get(&self, user_id: UserId) -> BoxFuture<'_, StoreResult<Option<String>>>;
}
