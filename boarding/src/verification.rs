//! QR verification and boarding.
//!
//! Verification is a reducer. Each store round-trip is an effect whose
//! result comes back as the next action:
//!
//! ```text
//! Scanned ─decode─▶ IdentityLoaded ─▶ RouteLoaded ─▶ DuplicateChecked
//!         ─▶ Recorded ─▶ Counted
//! ```
//!
//! The state tracks the last [`VerificationStage`] reached and stops at the
//! first failure with a typed error. A confirmed boarding leaves exactly one
//! new ledger row, counted once. No live-channel message is published here.

use crate::error::{BoardingError, Result, StoreError};
use crate::ledger::Ledger;
use crate::providers::{RouteDirectory, UserDirectory};
use chrono::{DateTime, Utc};
use serde::Serialize;
use shuttle_auth::{Caller, QrCodec};
use shuttle_core::effect::Effect;
use shuttle_core::environment::Clock;
use shuttle_core::reducer::Reducer;
use shuttle_core::{BoardingRecord, Rider, RouteId, ShuttleRoute, runtime};
use std::sync::Arc;
use std::time::Instant;

/// Stage a verification call has reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStage {
    /// Input accepted.
    Received,
    /// Credential decrypted.
    Decoded,
    /// Account found for `(user_id, email)`.
    IdentityResolved,
    /// Route found.
    RouteResolved,
    /// No boarding yet today.
    DuplicateChecked,
    /// Ledger row written.
    Recorded,
    /// Counter updated, confirmation built.
    Confirmed,
}

impl VerificationStage {
    /// Log/metric label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Decoded => "decoded",
            Self::IdentityResolved => "identity_resolved",
            Self::RouteResolved => "route_resolved",
            Self::DuplicateChecked => "duplicate_checked",
            Self::Recorded => "recorded",
            Self::Confirmed => "confirmed",
        }
    }
}

/// Result of a successful verification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardingConfirmation {
    /// The ledger row written.
    pub boarding: BoardingRecord,
    /// Rider display name.
    pub user_name: String,
    /// Departure stop name.
    pub departure: String,
    /// Destination stop name.
    pub destination: String,
    /// Route rider count after this boarding.
    ///
    /// `None` when the counter store could not be updated nor rebuilt. The
    /// boarding itself still stands and the route is rebuilt from the ledger
    /// on its next counter operation.
    pub rider_count: Option<u64>,
}

/// State of one verification.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationState {
    /// Route being boarded.
    pub route_id: RouteId,
    /// Last stage reached.
    pub stage: VerificationStage,
    /// Resolved account.
    pub rider: Option<Rider>,
    /// Resolved route.
    pub route: Option<ShuttleRoute>,
    /// Instant the duplicate check and the row are taken at.
    pub boarded_at: Option<DateTime<Utc>>,
    /// Row written.
    pub boarding: Option<BoardingRecord>,
    /// Set once; no further action changes the state.
    pub outcome: Option<Result<BoardingConfirmation>>,
}

impl VerificationState {
    /// Fresh state for a scan against `route_id`.
    #[must_use]
    pub const fn new(route_id: RouteId) -> Self {
        Self {
            route_id,
            stage: VerificationStage::Received,
            rider: None,
            route: None,
            boarded_at: None,
            boarding: None,
            outcome: None,
        }
    }

    fn fail(&mut self, err: BoardingError) -> Vec<Effect<VerificationAction>> {
        self.outcome = Some(Err(err));
        vec![Effect::None]
    }
}

/// Inputs to the verification reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationAction {
    /// An operator scanned a credential.
    Scanned {
        /// The scanned token.
        qr_code: String,
    },
    /// Account lookup finished.
    IdentityLoaded(std::result::Result<Option<Rider>, StoreError>),
    /// Route lookup finished.
    RouteLoaded(std::result::Result<Option<ShuttleRoute>, StoreError>),
    /// Duplicate check finished.
    DuplicateChecked(Result<()>),
    /// Ledger write finished.
    Recorded(Result<BoardingRecord>),
    /// Counter update finished; `None` if it could not be applied.
    Counted(Option<u64>),
}

/// Dependencies of the verification reducer.
#[derive(Clone)]
pub struct VerificationEnvironment {
    /// Credential codec.
    pub codec: QrCodec,
    /// Account lookups.
    pub users: Arc<dyn UserDirectory>,
    /// Route lookups.
    pub routes: Arc<dyn RouteDirectory>,
    /// Duplicate policy, rows and counters.
    pub ledger: Ledger,
    /// Time source.
    pub clock: Arc<dyn Clock>,
}

/// Verification reducer.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerificationReducer;

impl Reducer for VerificationReducer {
    type State = VerificationState;
    type Action = VerificationAction;
    type Environment = VerificationEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Vec<Effect<Self::Action>> {
        if state.outcome.is_some() {
            tracing::debug!(?action, "Action after verification outcome ignored");
            return vec![Effect::None];
        }

        match action {
            VerificationAction::Scanned { qr_code } => {
                let Ok(payload) = env.codec.decode(&qr_code) else {
                    return state.fail(BoardingError::InvalidQrCode);
                };
                state.stage = VerificationStage::Decoded;

                let users = Arc::clone(&env.users);
                vec![Effect::future(async move {
                    VerificationAction::IdentityLoaded(
                        users
                            .find_by_id_and_email(payload.user_id, &payload.email)
                            .await,
                    )
                })]
            }

            VerificationAction::IdentityLoaded(found) => {
                let rider = match found {
                    Ok(Some(rider)) => rider,
                    Ok(None) => return state.fail(BoardingError::UserNotFound),
                    Err(err) => return state.fail(err.into()),
                };
                state.stage = VerificationStage::IdentityResolved;
                state.rider = Some(rider);

                let routes = Arc::clone(&env.routes);
                let route_id = state.route_id;
                vec![Effect::future(async move {
                    VerificationAction::RouteLoaded(routes.find_route(route_id).await)
                })]
            }

            VerificationAction::RouteLoaded(found) => {
                let route = match found {
                    Ok(Some(route)) => route,
                    Ok(None) => return state.fail(BoardingError::RouteNotFound(state.route_id)),
                    Err(err) => return state.fail(err.into()),
                };
                let Some(user_id) = state.rider.as_ref().map(|rider| rider.id) else {
                    return state.fail(out_of_order("route resolved before identity"));
                };
                state.stage = VerificationStage::RouteResolved;
                let route_id = route.id;
                state.route = Some(route);

                let now = env.clock.now();
                state.boarded_at = Some(now);

                let ledger = env.ledger.clone();
                vec![Effect::future(async move {
                    VerificationAction::DuplicateChecked(
                        ledger.check_duplicate(user_id, route_id, now).await,
                    )
                })]
            }

            VerificationAction::DuplicateChecked(checked) => {
                if let Err(err) = checked {
                    return state.fail(err);
                }
                let (Some(rider), Some(route), Some(now)) =
                    (&state.rider, &state.route, state.boarded_at)
                else {
                    return state.fail(out_of_order("duplicate check before route"));
                };
                let (user_id, route_id) = (rider.id, route.id);
                state.stage = VerificationStage::DuplicateChecked;

                let ledger = env.ledger.clone();
                vec![Effect::future(async move {
                    VerificationAction::Recorded(ledger.record(user_id, route_id, now).await)
                })]
            }

            VerificationAction::Recorded(recorded) => {
                let record = match recorded {
                    Ok(record) => record,
                    Err(err) => return state.fail(err),
                };
                state.stage = VerificationStage::Recorded;
                state.boarding = Some(record);

                let ledger = env.ledger.clone();
                vec![Effect::future(async move {
                    VerificationAction::Counted(count_boarding(&ledger, &record).await)
                })]
            }

            VerificationAction::Counted(rider_count) => {
                let (Some(rider), Some(route), Some(boarding)) =
                    (state.rider.take(), state.route.take(), state.boarding)
                else {
                    return state.fail(out_of_order("counted before recording"));
                };
                state.stage = VerificationStage::Confirmed;
                state.outcome = Some(Ok(BoardingConfirmation {
                    boarding,
                    user_name: rider.name,
                    departure: route.departure.name,
                    destination: route.destination.name,
                    rider_count,
                }));
                vec![Effect::None]
            }
        }
    }
}

fn out_of_order(what: &str) -> BoardingError {
    BoardingError::Internal(format!("verification out of order: {what}"))
}

/// Count the new row; on failure rebuild from the ledger, which already holds
/// it. If both fail the route is marked dirty.
async fn count_boarding(ledger: &Ledger, record: &BoardingRecord) -> Option<u64> {
    let route_id = record.route_id;
    match ledger.increment(record).await {
        Ok(count) => Some(count),
        Err(err) => {
            tracing::warn!(
                route_id = %route_id,
                error = %err,
                "Rider count increment failed, rebuilding from ledger"
            );
            metrics::counter!("boarding.counter.reconciliations").increment(1);
            match ledger.reconcile(route_id).await {
                Ok(count) => Some(count),
                Err(err) => {
                    ledger.mark_dirty(route_id);
                    tracing::error!(
                        route_id = %route_id,
                        boarding_id = %record.id,
                        error = %err,
                        "Rider count out of sync with ledger, marked for rebuild"
                    );
                    None
                }
            }
        }
    }
}

/// QR verification and boarding orchestrator.
#[derive(Clone)]
pub struct BoardingVerifier {
    env: VerificationEnvironment,
}

impl BoardingVerifier {
    /// Create a verifier.
    #[must_use]
    pub fn new(
        codec: QrCodec,
        users: Arc<dyn UserDirectory>,
        routes: Arc<dyn RouteDirectory>,
        ledger: Ledger,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            env: VerificationEnvironment {
                codec,
                users,
                routes,
                ledger,
                clock,
            },
        }
    }

    /// Verify a scanned QR credential against a route and board the rider.
    ///
    /// Only operators scan credentials.
    ///
    /// # Errors
    ///
    /// - [`BoardingError::Forbidden`]: caller is not an operator
    /// - [`BoardingError::InvalidQrCode`]: credential does not decode
    /// - [`BoardingError::UserNotFound`]: no account for the credential
    /// - [`BoardingError::RouteNotFound`]: unknown route
    /// - [`BoardingError::DuplicateBoarding`]: already boarded today
    /// - [`BoardingError::Storage`]: ledger unavailable
    pub async fn verify(
        &self,
        caller: &Caller,
        qr_code: &str,
        route_id: RouteId,
    ) -> Result<BoardingConfirmation> {
        caller.require_admin()?;

        let started = Instant::now();
        let mut state = VerificationState::new(route_id);
        runtime::run(
            &VerificationReducer,
            &mut state,
            VerificationAction::Scanned {
                qr_code: qr_code.to_string(),
            },
            &self.env,
        )
        .await;
        let result = state
            .outcome
            .take()
            .unwrap_or_else(|| Err(out_of_order("no outcome")));

        metrics::histogram!("boarding.verification.duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(confirmation) => {
                metrics::counter!("boarding.verifications", "outcome" => "confirmed").increment(1);
                tracing::info!(
                    operator_id = %caller.user_id,
                    user_id = %confirmation.boarding.user_id,
                    route_id = %route_id,
                    boarding_id = %confirmation.boarding.id,
                    rider_count = ?confirmation.rider_count,
                    "Boarding confirmed"
                );
            }
            Err(err) => {
                metrics::counter!("boarding.verifications", "outcome" => err.code()).increment(1);
                if err.is_rejection() {
                    tracing::warn!(
                        operator_id = %caller.user_id,
                        route_id = %route_id,
                        stage = state.stage.as_str(),
                        code = err.code(),
                        "Boarding rejected"
                    );
                } else {
                    tracing::error!(
                        operator_id = %caller.user_id,
                        route_id = %route_id,
                        stage = state.stage.as_str(),
                        error = %err,
                        "Boarding failed"
                    );
                }
            }
        }

        result
    }
}

impl std::fmt::Debug for BoardingVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardingVerifier")
            .field("ledger", &self.env.ledger)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code
mod tests {
    use super::*;
    use crate::mocks::{MockDirectory, MockLedgerStore, MockRiderCounter};
    use shuttle_core::{BoardingId, ServiceCalendar};
    use shuttle_testing::{FixedClock, ReducerTest, assertions, fixtures, seoul_instant};

    fn env() -> VerificationEnvironment {
        let directory = MockDirectory::new()
            .with_rider(fixtures::alice())
            .with_route(fixtures::commute_route());
        let ledger = Ledger::new(
            Arc::new(MockLedgerStore::new()),
            Arc::new(MockRiderCounter::new()),
            Arc::new(directory.clone()),
            ServiceCalendar::new(chrono_tz::Asia::Seoul),
        );
        VerificationEnvironment {
            codec: QrCodec::new(&[9u8; 32]).expect("valid key"),
            users: Arc::new(directory.clone()),
            routes: Arc::new(directory),
            ledger,
            clock: Arc::new(FixedClock::new(seoul_instant(2025, 3, 10, 7, 30, 0))),
        }
    }

    fn route_resolved() -> VerificationState {
        let route = fixtures::commute_route();
        VerificationState {
            stage: VerificationStage::RouteResolved,
            rider: Some(fixtures::alice()),
            boarded_at: Some(seoul_instant(2025, 3, 10, 7, 30, 0)),
            route: Some(route.clone()),
            ..VerificationState::new(route.id)
        }
    }

    #[test]
    fn test_undecodable_scan_fails_without_effects() {
        let route = fixtures::commute_route();
        ReducerTest::new(VerificationReducer)
            .with_env(env())
            .given_state(VerificationState::new(route.id))
            .when_action(VerificationAction::Scanned {
                qr_code: "not-a-credential".to_string(),
            })
            .then_state(|state| {
                assert_eq!(state.stage, VerificationStage::Received);
                assert_eq!(state.outcome, Some(Err(BoardingError::InvalidQrCode)));
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_decoded_scan_looks_up_identity() {
        let env = env();
        let alice = fixtures::alice();
        let qr_code = env.codec.encode(alice.id, &alice.email).unwrap();
        ReducerTest::new(VerificationReducer)
            .with_env(env)
            .given_state(VerificationState::new(fixtures::commute_route().id))
            .when_action(VerificationAction::Scanned { qr_code })
            .then_state(|state| {
                assert_eq!(state.stage, VerificationStage::Decoded);
                assert!(state.outcome.is_none());
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn test_unknown_identity_stops_at_decoded() {
        ReducerTest::new(VerificationReducer)
            .with_env(env())
            .given_state(VerificationState {
                stage: VerificationStage::Decoded,
                ..VerificationState::new(fixtures::commute_route().id)
            })
            .when_action(VerificationAction::IdentityLoaded(Ok(None)))
            .then_state(|state| {
                assert_eq!(state.stage, VerificationStage::Decoded);
                assert_eq!(state.outcome, Some(Err(BoardingError::UserNotFound)));
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_storage_failure_on_route_lookup_is_a_fault() {
        let down = StoreError::Unavailable("directory is down".into());
        ReducerTest::new(VerificationReducer)
            .with_env(env())
            .given_state(VerificationState {
                stage: VerificationStage::IdentityResolved,
                rider: Some(fixtures::alice()),
                ..VerificationState::new(fixtures::commute_route().id)
            })
            .when_action(VerificationAction::RouteLoaded(Err(down.clone())))
            .then_state(move |state| {
                assert_eq!(state.stage, VerificationStage::IdentityResolved);
                assert_eq!(state.outcome, Some(Err(BoardingError::Storage(down))));
            })
            .run();
    }

    #[test]
    fn test_duplicate_stops_before_recording() {
        let alice = fixtures::alice();
        let route = fixtures::commute_route();
        let duplicate = BoardingError::DuplicateBoarding {
            user_id: alice.id,
            route_id: route.id,
        };
        ReducerTest::new(VerificationReducer)
            .with_env(env())
            .given_state(route_resolved())
            .when_action(VerificationAction::DuplicateChecked(Err(duplicate.clone())))
            .then_state(move |state| {
                assert_eq!(state.stage, VerificationStage::RouteResolved);
                assert_eq!(state.outcome, Some(Err(duplicate)));
                assert!(state.boarding.is_none());
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_counted_builds_confirmation() {
        let route = fixtures::commute_route();
        let at = seoul_instant(2025, 3, 10, 7, 30, 0);
        let boarding = BoardingRecord {
            id: BoardingId(1),
            user_id: fixtures::alice().id,
            route_id: route.id,
            boarding_time: at,
            service_day: at.date_naive(),
        };
        ReducerTest::new(VerificationReducer)
            .with_env(env())
            .given_state(VerificationState {
                stage: VerificationStage::Recorded,
                boarding: Some(boarding),
                ..route_resolved()
            })
            .when_action(VerificationAction::Counted(Some(4)))
            .then_state(move |state| {
                assert_eq!(state.stage, VerificationStage::Confirmed);
                let confirmation = state.outcome.clone().unwrap().unwrap();
                assert_eq!(confirmation.boarding, boarding);
                assert_eq!(confirmation.user_name, fixtures::alice().name);
                assert_eq!(confirmation.departure, route.departure.name);
                assert_eq!(confirmation.rider_count, Some(4));
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_actions_after_outcome_are_ignored() {
        ReducerTest::new(VerificationReducer)
            .with_env(env())
            .given_state(VerificationState {
                outcome: Some(Err(BoardingError::InvalidQrCode)),
                ..VerificationState::new(fixtures::commute_route().id)
            })
            .when_action(VerificationAction::IdentityLoaded(Ok(Some(fixtures::alice()))))
            .then_state(|state| {
                assert_eq!(state.stage, VerificationStage::Received);
                assert!(state.rider.is_none());
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }
}
