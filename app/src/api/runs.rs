//! Route run lifecycle endpoints (operators).
//!
//! - POST /api/routes/:route_id/start - open a run for position traffic
//! - POST /api/routes/:route_id/end   - broadcast the run's single END
//!
//! Role is checked before the route lookup, so riders learn nothing about
//! which routes exist.

use crate::auth::AuthenticatedCaller;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use shuttle_boarding::BoardingError;
use shuttle_core::{DateTime, RouteId, Utc};
use shuttle_web::AppError;

/// State of a route's run after a lifecycle call.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunResponse {
    /// Route
    pub route_id: i64,
    /// `RUNNING` or `ENDED`
    pub status: String,
    /// When the run ended, for `ENDED`
    pub ended_at: Option<DateTime<Utc>>,
}

async fn ensure_route(state: &AppState, route_id: RouteId) -> Result<(), AppError> {
    state
        .routes
        .find_route(route_id)
        .await
        .map_err(BoardingError::from)?
        .ok_or(BoardingError::RouteNotFound(route_id))?;
    Ok(())
}

/// Open a new run; positions are accepted again.
pub async fn start_route(
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(route_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<RunResponse>, AppError> {
    let id = RouteId(route_id);
    caller.require_admin().map_err(BoardingError::from)?;
    ensure_route(&state, id).await?;
    state.live.start_route(&caller, id).await?;

    Ok(Json(RunResponse {
        route_id,
        status: "RUNNING".to_string(),
        ended_at: None,
    }))
}

/// End the current run. Subscribers of `route/{id}` receive one `END`.
///
/// A second call for the same run fails with 409 `ROUTE_ENDED`.
pub async fn end_route(
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(route_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<RunResponse>, AppError> {
    let id = RouteId(route_id);
    caller.require_admin().map_err(BoardingError::from)?;
    ensure_route(&state, id).await?;
    let end = state.live.end_route(&caller, id, state.clock.now()).await?;

    Ok(Json(RunResponse {
        route_id,
        status: "ENDED".to_string(),
        ended_at: Some(end.ended_at),
    }))
}
