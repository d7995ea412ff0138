//! # Shuttle Testing
//!
//! Testing utilities for the shuttle boarding system.
//!
//! This crate provides:
//! - Deterministic clocks (`FixedClock`, `ManualClock`)
//! - Fixture routes and riders
//! - proptest strategies for domain values
//! - One-shot tracing setup for tests that want log output
//! - `ReducerTest`, a Given-When-Then harness for reducers
//!
//! ## Example
//!
//! ```
//! use shuttle_testing::{ManualClock, seoul_instant};
//! use shuttle_core::environment::Clock;
//! use chrono::Duration;
//!
//! let clock = ManualClock::new(seoul_instant(2025, 3, 10, 23, 59, 59));
//! clock.advance(Duration::seconds(1));
//! assert_eq!(clock.now(), seoul_instant(2025, 3, 11, 0, 0, 0));
//! ```

use chrono::{DateTime, TimeZone, Utc};
use shuttle_core::environment::Clock;


/// Mock implementations of Environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::Mutex;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use shuttle_testing::mocks::FixedClock;
    /// use shuttle_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock a test can move, for crossing service-day boundaries.
    #[derive(Debug)]
    pub struct ManualClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        /// Start the clock at `time`.
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Jump to `time`.
        pub fn set(&self, time: DateTime<Utc>) {
            if let Ok(mut guard) = self.time.lock() {
                *guard = time;
            }
        }

        /// Move forward by `by`.
        pub fn advance(&self, by: chrono::Duration) {
            if let Ok(mut guard) = self.time.lock() {
                *guard += by;
            }
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
                .lock()
                .map_or_else(|poisoned| *poisoned.into_inner(), |guard| *guard)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Fixture data: a small network of stops, routes and riders.
pub mod fixtures {
    use shuttle_core::{Location, LocationId, Rider, RouteId, ShuttleRoute, UserId};

    /// Morning commute route used across tests.
    pub const COMMUTE_ROUTE: RouteId = RouteId(1);
    /// Evening return route.
    pub const RETURN_ROUTE: RouteId = RouteId(2);
    /// Rider with a valid account.
    pub const ALICE: UserId = UserId(1);
    /// Second rider.
    pub const BOB: UserId = UserId(2);

    fn location(id: i64, name: &str, latitude: f64, longitude: f64) -> Location {
        Location {
            id: LocationId(id),
            name: name.to_string(),
            latitude,
            longitude,
        }
    }

    /// Sejong Government Complex stop.
    #[must_use]
    pub fn sejong() -> Location {
        location(1, "Sejong Government Complex", 36.504, 127.262)
    }

    /// Osong Station stop.
    #[must_use]
    pub fn osong() -> Location {
        location(2, "Osong Station", 36.620, 127.327)
    }

    /// Osong Station to Sejong, morning.
    #[must_use]
    pub fn commute_route() -> ShuttleRoute {
        ShuttleRoute {
            id: COMMUTE_ROUTE,
            name: "Osong Morning 1".to_string(),
            departure: osong(),
            destination: sejong(),
            is_commute: true,
        }
    }

    /// Sejong to Osong Station, evening.
    #[must_use]
    pub fn return_route() -> ShuttleRoute {
        ShuttleRoute {
            id: RETURN_ROUTE,
            name: "Osong Evening 1".to_string(),
            departure: sejong(),
            destination: osong(),
            is_commute: false,
        }
    }

    /// All fixture routes.
    #[must_use]
    pub fn routes() -> Vec<ShuttleRoute> {
        vec![commute_route(), return_route()]
    }

    /// Rider `ALICE`.
    #[must_use]
    pub fn alice() -> Rider {
        Rider {
            id: ALICE,
            name: "Alice Kim".to_string(),
            email: "a@example.com".to_string(),
        }
    }

    /// Rider `BOB`.
    #[must_use]
    pub fn bob() -> Rider {
        Rider {
            id: BOB,
            name: "Bob Lee".to_string(),
            email: "b@example.com".to_string(),
        }
    }

    /// All fixture riders.
    #[must_use]
    pub fn riders() -> Vec<Rider> {
        vec![alice(), bob()]
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;
    use shuttle_core::{RouteId, UserId};

    /// Instants between 2000 and 2100.
    pub fn instant() -> impl Strategy<Value = DateTime<Utc>> {
        (946_684_800_i64..4_102_444_800).prop_filter_map("representable", |secs| {
            DateTime::<Utc>::from_timestamp(secs, 0)
        })
    }

    /// Positive user IDs.
    pub fn user_id() -> impl Strategy<Value = UserId> {
        (1_i64..1_000_000).prop_map(UserId)
    }

    /// Positive route IDs.
    pub fn route_id() -> impl Strategy<Value = RouteId> {
        (1_i64..10_000).prop_map(RouteId)
    }

    /// Plausible email addresses.
    pub fn email() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9._]{0,15}@[a-z]{2,10}\\.(com|kr|org)"
    }
}

/// Install a test subscriber once per process. Honors `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// `y-m-d h:m:s` wall-clock time in Seoul, as UTC.
///
/// # Panics
///
/// Panics if the arguments do not name a valid Seoul local time.
#[must_use]
#[allow(clippy::expect_used)]
pub fn seoul_instant(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    chrono_tz::Asia::Seoul
        .with_ymd_and_hms(y, m, d, h, min, s)
        .single()
        .expect("valid Seoul local time")
        .with_timezone(&Utc)
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, test_clock};
pub use reducer_test::{ReducerTest, assertions};
