//! Router configuration for the shuttle server.

use crate::api::{qr, runs, shuttle};
use crate::live::live_socket;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use shuttle_web::{correlation_id_layer, handlers::health_check};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// - Health check (no authentication)
/// - QR credential issuance and verification
/// - Boarding history and rider counters
/// - Route run lifecycle
/// - Live route channel at `/ws`
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // QR credentials
        .route("/users/me/qr", get(qr::current_qr).post(qr::regenerate_qr))
        .route("/qr/verify", post(qr::verify_qr))
        // Boarding ledger
        .route("/shuttle/rides", get(shuttle::list_rides))
        .route(
            "/shuttle/count/:route_id",
            get(shuttle::get_count).delete(shuttle::reset_count),
        )
        .route(
            "/shuttle/count/:route_id/reconcile",
            post(shuttle::reconcile_count),
        )
        // Route runs
        .route("/routes/:route_id/start", post(runs::start_route))
        .route("/routes/:route_id/end", post(runs::end_route));

    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(live_socket))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}
