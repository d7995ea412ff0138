//! Shared setup for boarding integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use chrono::{DateTime, Utc};
use shuttle_auth::{Caller, QrCodec, Role};
use shuttle_boarding::mocks::{MockDirectory, MockLedgerStore, MockRiderCounter};
use shuttle_boarding::{BoardingVerifier, Ledger};
use shuttle_core::{ServiceCalendar, UserId};
use shuttle_testing::{ManualClock, fixtures};
use std::sync::Arc;

pub struct Harness {
    pub codec: QrCodec,
    pub store: MockLedgerStore,
    pub counter: MockRiderCounter,
    pub directory: MockDirectory,
    pub clock: Arc<ManualClock>,
    pub ledger: Ledger,
    pub verifier: BoardingVerifier,
}

impl Harness {
    pub fn at(now: DateTime<Utc>) -> Self {
        let codec = QrCodec::new(&[42u8; 32]).expect("valid key");
        let store = MockLedgerStore::new();
        let counter = MockRiderCounter::new();
        let directory = MockDirectory::new()
            .with_rider(fixtures::alice())
            .with_rider(fixtures::bob())
            .with_route(fixtures::commute_route())
            .with_route(fixtures::return_route());
        let clock = Arc::new(ManualClock::new(now));

        let ledger = Ledger::new(
            Arc::new(store.clone()),
            Arc::new(counter.clone()),
            Arc::new(directory.clone()),
            ServiceCalendar::new(chrono_tz::Asia::Seoul),
        );
        let verifier = BoardingVerifier::new(
            codec.clone(),
            Arc::new(directory.clone()),
            Arc::new(directory.clone()),
            ledger.clone(),
            clock.clone(),
        );

        Self {
            codec,
            store,
            counter,
            directory,
            clock,
            ledger,
            verifier,
        }
    }

    pub fn alice_qr(&self) -> String {
        self.codec
            .encode(fixtures::ALICE, &fixtures::alice().email)
            .expect("encode")
    }
}

pub fn operator() -> Caller {
    Caller {
        user_id: UserId(100),
        email: "driver@example.com".to_string(),
        name: "Driver".to_string(),
        role: Role::Admin,
    }
}

pub fn rider_caller() -> Caller {
    let alice = fixtures::alice();
    Caller {
        user_id: alice.id,
        email: alice.email,
        name: alice.name,
        role: Role::User,
    }
}
