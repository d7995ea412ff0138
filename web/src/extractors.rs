//! Custom Axum extractors.
//!
//! - `CorrelationId`: the request's correlation ID, from the middleware or
//!   the `X-Correlation-ID` header, generated if absent
//! - `BearerToken`: the raw bearer credential from the `Authorization`
//!   header or the `access_token` query parameter
//!
//! Browsers cannot set headers on a WebSocket upgrade, so the query
//! parameter is accepted as a fallback.

use crate::error::AppError;
use crate::middleware::CORRELATION_ID_HEADER;
use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::{header::AUTHORIZATION, request::Parts},
};
use serde::Deserialize;
use uuid::Uuid;

/// Correlation ID for request tracing.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Prefer the ID the middleware already assigned
        if let Some(id) = parts.extensions.get::<Uuid>() {
            return Ok(Self(*id));
        }

        let correlation_id = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

/// Raw bearer credential presented by the caller.
///
/// Only extracts; validation belongs to whoever holds the signing secret.
#[derive(Clone)]
pub struct BearerToken(pub String);

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

impl BearerToken {
    /// Find a credential in the request head.
    #[must_use]
    pub fn from_parts(parts: &Parts) -> Option<Self> {
        let from_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty());

        if let Some(token) = from_header {
            return Some(Self(token.to_string()));
        }

        // Percent-decoded the same way any other query extractor sees it
        Query::<AccessTokenQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(query)| query.access_token)
            .filter(|t| !t.is_empty())
            .map(Self)
    }
}

/// `?access_token=` on the request URI.
#[derive(Deserialize)]
struct AccessTokenQuery {
    access_token: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_parts(parts).ok_or_else(|| AppError::unauthorized("Missing bearer credential"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    fn parts(req: Request<()>) -> Parts {
        req.into_parts().0
    }

    #[tokio::test]
    async fn test_correlation_id_from_header() {
        let uuid = Uuid::new_v4();
        let req = Request::builder()
            .header(CORRELATION_ID_HEADER, uuid.to_string())
            .body(())
            .expect("Valid request");

        let correlation_id = CorrelationId::from_request_parts(&mut parts(req), &())
            .await
            .expect("Should extract");

        assert_eq!(correlation_id.0, uuid);
    }

    #[tokio::test]
    async fn test_correlation_id_prefers_extension() {
        let assigned = Uuid::new_v4();
        let req = Request::builder()
            .header(CORRELATION_ID_HEADER, Uuid::new_v4().to_string())
            .body(())
            .unwrap();
        let mut parts = parts(req);
        parts.extensions.insert(assigned);

        let correlation_id = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .unwrap();

        assert_eq!(correlation_id.0, assigned);
    }

    #[tokio::test]
    async fn test_bearer_from_header() {
        let req = Request::builder()
            .header(AUTHORIZATION, "Bearer abc.def.ghi")
            .body(())
            .unwrap();

        let token = BearerToken::from_request_parts(&mut parts(req), &())
            .await
            .unwrap();

        assert_eq!(token.0, "abc.def.ghi");
    }

    #[tokio::test]
    async fn test_bearer_from_query() {
        let req = Request::builder()
            .uri("/ws?foo=1&access_token=abc.def.ghi")
            .body(())
            .unwrap();

        let token = BearerToken::from_request_parts(&mut parts(req), &())
            .await
            .unwrap();

        assert_eq!(token.0, "abc.def.ghi");
    }

    #[tokio::test]
    async fn test_bearer_from_query_is_percent_decoded() {
        for uri in [
            "/ws?access_token=abc%2Edef.ghi",
            "/ws?access_token=abc%2edef%2Eghi&foo=bar",
        ] {
            let req = Request::builder().uri(uri).body(()).unwrap();

            let token = BearerToken::from_request_parts(&mut parts(req), &())
                .await
                .unwrap();

            assert_eq!(token.0, "abc.def.ghi", "uri: {uri}");
        }
    }

    #[tokio::test]
    async fn test_header_wins_over_query() {
        let req = Request::builder()
            .uri("/ws?access_token=from.the.query")
            .header(AUTHORIZATION, "Bearer from.the.header")
            .body(())
            .unwrap();

        let token = BearerToken::from_parts(&parts(req)).unwrap();

        assert_eq!(token.0, "from.the.header");
    }

    #[tokio::test]
    async fn test_missing_bearer_is_unauthorized() {
        for req in [
            Request::builder().uri("/ws").body(()).unwrap(),
            Request::builder()
                .header(AUTHORIZATION, "Basic dXNlcjpwYXNz")
                .body(())
                .unwrap(),
            Request::builder().uri("/ws?access_token=").body(()).unwrap(),
        ] {
            let err = BearerToken::from_request_parts(&mut parts(req), &())
                .await
                .unwrap_err();
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_debug_redacts() {
        let token = BearerToken("secret".into());
        assert!(!format!("{token:?}").contains("secret"));
    }
}
