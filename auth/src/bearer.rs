//! Bearer credential (HS256 JWT) issuing and validation.
//!
//! The account subsystem issues these; this crate only needs to validate
//! them and turn the claims into a [`Caller`]. `issue` exists for tooling and
//! tests.

use crate::caller::{Caller, Role};
use crate::error::{AuthError, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use shuttle_core::UserId;
use std::fmt;

/// Minimum HMAC secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Payload of a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerClaims {
    /// Account ID.
    pub sub: i64,
    /// Account email.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Granted role.
    pub role: Role,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Expires at (Unix seconds).
    pub exp: i64,
}

impl From<BearerClaims> for Caller {
    fn from(claims: BearerClaims) -> Self {
        Self {
            user_id: UserId(claims.sub),
            email: claims.email,
            name: claims.name,
            role: claims.role,
        }
    }
}

/// Validates (and for tooling, issues) bearer tokens.
#[derive(Clone)]
pub struct BearerValidator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl BearerValidator {
    /// Create a validator.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the secret is shorter than
    /// [`MIN_SECRET_LEN`] bytes.
    pub fn new(secret: &str, ttl: Duration) -> Result<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::Configuration(format!(
                "JWT secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 30;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        })
    }

    /// Issue a token for `caller`, valid from `now` for the configured TTL.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Internal`] if signing fails.
    pub fn issue(&self, caller: &Caller, now: DateTime<Utc>) -> Result<String> {
        let claims = BearerClaims {
            sub: caller.user_id.get(),
            email: caller.email.clone(),
            name: caller.name.clone(),
            role: caller.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("Failed to sign token: {e}")))
    }

    /// Validate a token and return the caller it names.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthorized`] for a malformed, expired or badly
    /// signed token.
    pub fn validate(&self, token: &str) -> Result<Caller> {
        use jsonwebtoken::errors::ErrorKind;

        decode::<BearerClaims>(token, &self.decoding, &self.validation)
            .map(|data| Caller::from(data.claims))
            .map_err(|err| {
                let reason = match err.kind() {
                    ErrorKind::ExpiredSignature => "token expired",
                    ErrorKind::InvalidSignature => "invalid signature",
                    ErrorKind::InvalidToken => "invalid token",
                    _ => "token validation failed",
                };
                AuthError::Unauthorized(reason.to_string())
            })
    }
}

impl fmt::Debug for BearerValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerValidator")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
