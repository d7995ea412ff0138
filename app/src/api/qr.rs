//! QR credential endpoints.
//!
//! - GET  /api/users/me/qr  - the caller's current credential
//! - POST /api/users/me/qr  - replace it with a fresh one
//! - POST /api/qr/verify    - scan a credential and board the rider (operators)

use crate::auth::AuthenticatedCaller;
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use shuttle_core::RouteId;
use shuttle_web::{AppError, CorrelationId};

// ============================================================================
// Request / Response Types
// ============================================================================

/// The caller's QR credential.
#[derive(Debug, Serialize, Deserialize)]
pub struct QrCredentialResponse {
    /// Opaque token to render as a QR code
    pub qr_code: String,
}

/// Scan submitted by an operator device.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyRequest {
    /// Scanned token
    pub qr_code: String,
    /// Route the shuttle is running
    pub route_id: i64,
}

/// Successful boarding.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    /// Ledger row ID
    pub boarding_id: i64,
    /// Rider display name
    pub user_name: String,
    /// Departure stop name
    pub departure: String,
    /// Destination stop name
    pub destination: String,
    /// Riders on the route after this boarding; absent if the counter is down
    pub rider_count: Option<u64>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Return the caller's current QR credential, issuing one on first use.
pub async fn current_qr(
    AuthenticatedCaller(caller): AuthenticatedCaller,
    State(state): State<AppState>,
) -> Result<Json<QrCredentialResponse>, AppError> {
    let qr_code = state.issuer.current(&caller).await?;
    Ok(Json(QrCredentialResponse { qr_code }))
}

/// Issue a fresh credential for the caller.
///
/// Earlier credentials still decode; they carry no validity window.
pub async fn regenerate_qr(
    AuthenticatedCaller(caller): AuthenticatedCaller,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<QrCredentialResponse>), AppError> {
    let qr_code = state.issuer.issue(&caller).await?;
    Ok((StatusCode::CREATED, Json(QrCredentialResponse { qr_code })))
}

/// Verify a scanned credential against a route and board the rider.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/qr/verify \
///   -H "Authorization: Bearer $OPERATOR_TOKEN" \
///   -H "Content-Type: application/json" \
///   -d '{"qr_code":"q8k...","route_id":1}'
/// ```
///
/// Response:
/// ```json
/// {
///   "boarding_id": 17,
///   "user_name": "Alice Kim",
///   "departure": "Osong Station",
///   "destination": "Sejong Government Complex",
///   "rider_count": 12
/// }
/// ```
pub async fn verify_qr(
    AuthenticatedCaller(caller): AuthenticatedCaller,
    CorrelationId(correlation_id): CorrelationId,
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, AppError> {
    tracing::debug!(%correlation_id, route_id = request.route_id, "QR scan received");

    let confirmation = state
        .verifier
        .verify(&caller, &request.qr_code, RouteId(request.route_id))
        .await?;

    Ok(Json(VerifyResponse {
        boarding_id: confirmation.boarding.id.get(),
        user_name: confirmation.user_name,
        departure: confirmation.departure,
        destination: confirmation.destination,
        rider_count: confirmation.rider_count,
    }))
}
