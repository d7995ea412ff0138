//! Application state for the shuttle HTTP server.
//!
//! Holds the boarding services, the bearer validator and the live channel.
//! Cloned (cheaply via `Arc`) for each request.

use crate::live::LiveRouteChannel;
use axum::extract::FromRef;
use shuttle_auth::{BearerValidator, QrCodec};
use shuttle_boarding::{
    BoardingLedgerStore, BoardingVerifier, CredentialStore, Ledger, QrIssuer, RiderCounter,
    RouteDirectory, UserDirectory,
};
use shuttle_core::ServiceCalendar;
use shuttle_core::environment::Clock;
use std::sync::Arc;

/// Storage collaborators the services are built on.
#[derive(Clone)]
pub struct Backends {
    /// Account lookups
    pub users: Arc<dyn UserDirectory>,
    /// Route lookups
    pub routes: Arc<dyn RouteDirectory>,
    /// Boarding rows
    pub ledger: Arc<dyn BoardingLedgerStore>,
    /// Per-route rider counters
    pub counter: Arc<dyn RiderCounter>,
    /// Riders' current QR credentials
    pub credentials: Arc<dyn CredentialStore>,
}

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Boarding ledger and counters
    pub ledger: Ledger,
    /// QR verification orchestrator
    pub verifier: BoardingVerifier,
    /// QR credential issuance
    pub issuer: QrIssuer,
    /// Route lookups for lifecycle endpoints
    pub routes: Arc<dyn RouteDirectory>,
    /// Bearer credential validation
    pub bearer: Arc<BearerValidator>,
    /// Live route channel
    pub live: LiveRouteChannel,
    /// Source of "now"
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wire the services together.
    #[must_use]
    pub fn new(
        backends: Backends,
        codec: QrCodec,
        bearer: BearerValidator,
        calendar: ServiceCalendar,
        live: LiveRouteChannel,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ledger = Ledger::new(
            backends.ledger,
            backends.counter,
            Arc::clone(&backends.routes),
            calendar,
        );
        let verifier = BoardingVerifier::new(
            codec.clone(),
            backends.users,
            Arc::clone(&backends.routes),
            ledger.clone(),
            Arc::clone(&clock),
        );
        let issuer = QrIssuer::new(codec, backends.credentials);

        Self {
            ledger,
            verifier,
            issuer,
            routes: backends.routes,
            bearer: Arc::new(bearer),
            live,
            clock,
        }
    }
}

// Lets `AuthenticatedCaller` reach the validator from `AppState`
impl FromRef<AppState> for Arc<BearerValidator> {
    fn from_ref(app_state: &AppState) -> Self {
        Arc::clone(&app_state.bearer)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("ledger", &self.ledger)
            .field("live", &self.live)
            .finish_non_exhaustive()
    }
}
