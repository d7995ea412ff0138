//! Boarding history and rider counter endpoints.
//!
//! - GET    /api/shuttle/rides                        - caller's boardings, newest first
//! - GET    /api/shuttle/count/:route_id              - current rider count
//! - DELETE /api/shuttle/count/:route_id              - reset the count (operators)
//! - POST   /api/shuttle/count/:route_id/reconcile    - rebuild from the ledger (operators)

use crate::auth::AuthenticatedCaller;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use shuttle_boarding::{BoardingError, RideSummary};
use shuttle_core::RouteId;
use shuttle_web::AppError;

/// Rider count of one route.
#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    /// Route
    pub route_id: i64,
    /// Riders counted
    pub count: u64,
}

/// Plain acknowledgement.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    /// What happened
    pub message: String,
}

/// The caller's boarding history.
pub async fn list_rides(
    AuthenticatedCaller(caller): AuthenticatedCaller,
    State(state): State<AppState>,
) -> Result<Json<Vec<RideSummary>>, AppError> {
    let rides = state.ledger.list_by_user(caller.user_id).await?;
    Ok(Json(rides))
}

/// Current rider count for a route.
pub async fn get_count(
    AuthenticatedCaller(_caller): AuthenticatedCaller,
    Path(route_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<CountResponse>, AppError> {
    let count = state.ledger.get_count(RouteId(route_id)).await?;
    Ok(Json(CountResponse { route_id, count }))
}

/// Reset a route's rider count to zero. Boarding rows are kept.
pub async fn reset_count(
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(route_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, AppError> {
    caller.require_admin().map_err(BoardingError::from)?;

    let now = state.clock.now();
    state.ledger.reset(RouteId(route_id), now).await?;
    tracing::info!(route_id, operator = %caller.user_id, "Rider count reset by operator");

    Ok(Json(MessageResponse {
        message: format!("Rider count for route {route_id} reset"),
    }))
}

/// Rebuild a route's rider count from the ledger rows since its last reset.
pub async fn reconcile_count(
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(route_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<CountResponse>, AppError> {
    caller.require_admin().map_err(BoardingError::from)?;

    let count = state.ledger.reconcile(RouteId(route_id)).await?;
    Ok(Json(CountResponse { route_id, count }))
}
