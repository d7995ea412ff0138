//! Shared setup for server integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use axum::Router;
use chrono::Utc;
use shuttle_app::{AppState, Backends, LiveRouteChannel, build_router};
use shuttle_auth::{BearerValidator, Caller, QrCodec, Role};
use shuttle_boarding::mocks::{
    MockCredentialStore, MockDirectory, MockLedgerStore, MockRiderCounter,
};
use shuttle_core::{Location, LocationId, RouteId, ServiceCalendar, ShuttleRoute, UserId};
use shuttle_testing::{ManualClock, fixtures, seoul_instant};
use std::sync::Arc;

pub const JWT_SECRET: &str = "integration-test-secret-at-least-32-bytes";
pub const LIVE_ROUTE: RouteId = RouteId(42);

pub struct TestApp {
    pub state: AppState,
    pub codec: QrCodec,
    pub bearer: BearerValidator,
    pub store: MockLedgerStore,
    pub counter: MockRiderCounter,
    pub directory: MockDirectory,
    pub clock: Arc<ManualClock>,
}

pub fn operator() -> Caller {
    Caller {
        user_id: UserId(100),
        email: "driver@example.com".to_string(),
        name: "Driver".to_string(),
        role: Role::Admin,
    }
}

pub fn alice_caller() -> Caller {
    let alice = fixtures::alice();
    Caller {
        user_id: alice.id,
        email: alice.email,
        name: alice.name,
        role: Role::User,
    }
}

pub fn live_route() -> ShuttleRoute {
    ShuttleRoute {
        id: LIVE_ROUTE,
        name: "Osong Shuttle 42".to_string(),
        departure: fixtures::osong(),
        destination: Location {
            id: LocationId(42),
            name: "Sejong City Hall".to_string(),
            latitude: 36.480,
            longitude: 127.289,
        },
        is_commute: true,
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_connection_limit(100)
    }

    pub fn with_connection_limit(max_connections: usize) -> Self {
        let codec = QrCodec::new(&[7u8; 32]).expect("valid key");
        let bearer = BearerValidator::new(JWT_SECRET, chrono::Duration::hours(1)).expect("secret");
        let store = MockLedgerStore::new();
        let counter = MockRiderCounter::new();
        let directory = MockDirectory::new()
            .with_rider(fixtures::alice())
            .with_rider(fixtures::bob())
            .with_route(fixtures::commute_route())
            .with_route(fixtures::return_route())
            .with_route(live_route());
        let clock = Arc::new(ManualClock::new(seoul_instant(2025, 3, 10, 7, 30, 0)));

        let state = AppState::new(
            Backends {
                users: Arc::new(directory.clone()),
                routes: Arc::new(directory.clone()),
                ledger: Arc::new(store.clone()),
                counter: Arc::new(counter.clone()),
                credentials: Arc::new(MockCredentialStore::new()),
            },
            codec.clone(),
            bearer.clone(),
            ServiceCalendar::new(chrono_tz::Asia::Seoul),
            LiveRouteChannel::new(64, max_connections),
            clock.clone(),
        );

        Self {
            state,
            codec,
            bearer,
            store,
            counter,
            directory,
            clock,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Bearer expiry is checked against the wall clock, not the test clock.
    pub fn token_for(&self, caller: &Caller) -> String {
        self.bearer.issue(caller, Utc::now()).expect("issue")
    }

    pub fn operator_token(&self) -> String {
        self.token_for(&operator())
    }

    pub fn alice_token(&self) -> String {
        self.token_for(&alice_caller())
    }

    pub fn alice_qr(&self) -> String {
        self.codec
            .encode(fixtures::ALICE, &fixtures::alice().email)
            .expect("encode")
    }
}
