//! # Shuttle Boarding
//!
//! The boarding core: who boarded which route when, how many riders each
//! route has, and the verification flow that turns a scanned QR credential
//! into a boarding.
//!
//! ## Architecture
//!
//! ```text
//! QR token ─▶ BoardingVerifier ─▶ QrCodec::decode
//!                    │            UserDirectory / RouteDirectory
//!                    ▼
//!                  Ledger ─────▶ BoardingLedgerStore  (source of truth)
//!                    └─────────▶ RiderCounter         (projection)
//! ```
//!
//! - **Ledger**: duplicate policy, boarding rows, counter mutations
//! - **Verification**: a reducer walking a scan through its stages, driven
//!   by `shuttle_core::runtime`
//! - **Issuer**: each rider's current QR credential
//! - **Providers**: traits for the stores; Redis and PostgreSQL
//!   implementations live in [`stores`], in-memory ones in `mocks`
//!
//! ## Example
//!
//! ```
//! use shuttle_boarding::{Ledger, mocks::{MockDirectory, MockLedgerStore, MockRiderCounter}};
//! use shuttle_core::{RouteId, ServiceCalendar, UserId};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let ledger = Ledger::new(
//!     Arc::new(MockLedgerStore::new()),
//!     Arc::new(MockRiderCounter::new()),
//!     Arc::new(MockDirectory::new()),
//!     ServiceCalendar::new(chrono_tz::Asia::Seoul),
//! );
//! assert_eq!(ledger.get_count(RouteId(1)).await?, 0);
//!
//! let boarding = ledger.record(UserId(7), RouteId(1), chrono::Utc::now()).await?;
//! assert_eq!(ledger.increment(&boarding).await?, 1);
//! // Counting the same boarding again changes nothing
//! assert_eq!(ledger.increment(&boarding).await?, 1);
//! # Ok::<(), shuttle_boarding::BoardingError>(())
//! # });
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod issuer;
pub mod ledger;
pub mod providers;
pub mod stores;
pub mod verification;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

pub use error::{BoardingError, Result, StoreError};
pub use issuer::QrIssuer;
pub use ledger::{Ledger, RideSummary};
pub use providers::{
    BoardingLedgerStore, BoxFuture, CredentialStore, RiderCounter, RouteDirectory, StoreResult,
    UserDirectory,
};
pub use verification::{
    BoardingConfirmation, BoardingVerifier, VerificationAction, VerificationEnvironment,
    VerificationReducer, VerificationStage, VerificationState,
};
