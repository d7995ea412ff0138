//! Caller authentication for HTTP and live-channel requests.
//!
//! Every handler that needs to know who is asking takes an
//! [`AuthenticatedCaller`]. The bearer credential is validated before the
//! handler runs, so a WebSocket upgrade without one is refused with 401 and
//! never completes.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use shuttle_auth::{BearerValidator, Caller};
use shuttle_web::{AppError, BearerToken};
use std::sync::Arc;

/// Caller whose bearer credential has been validated.
#[derive(Debug, Clone)]
pub struct AuthenticatedCaller(pub Caller);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedCaller
where
    Arc<BearerValidator>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state)
            .await
            .inspect_err(|_| {
                tracing::warn!(path = %parts.uri.path(), "Request without bearer credential refused");
            })?;

        let validator = Arc::<BearerValidator>::from_ref(state);
        let caller = validator.validate(&token).map_err(|e| {
            tracing::warn!(path = %parts.uri.path(), error = %e, "Bearer credential rejected");
            AppError::from(e)
        })?;

        Ok(Self(caller))
    }
}
