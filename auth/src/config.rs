//! Authentication configuration.
//!
//! Values are provided by the application, not hardcoded.

use crate::bearer::BearerValidator;
use crate::error::Result;
use crate::qr::QrCodec;
use chrono::Duration;
use std::fmt;

/// Secrets and lifetimes for both credential kinds.
#[derive(Clone)]
pub struct AuthConfig {
    /// Base64-encoded 32-byte AES key sealing QR credentials.
    pub qr_secret_key: String,

    /// HMAC secret for bearer tokens.
    pub jwt_secret: String,

    /// Lifetime of bearer tokens issued by [`BearerValidator::issue`].
    ///
    /// Default: 24 hours
    pub bearer_ttl: Duration,
}

impl AuthConfig {
    /// Create new auth configuration.
    #[must_use]
    pub fn new(qr_secret_key: String, jwt_secret: String) -> Self {
        Self {
            qr_secret_key,
            jwt_secret,
            bearer_ttl: Duration::hours(24),
        }
    }

    /// Set bearer token lifetime.
    #[must_use]
    pub const fn with_bearer_ttl(mut self, ttl: Duration) -> Self {
        self.bearer_ttl = ttl;
        self
    }

    /// Build the QR codec.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the key is not base64 of 32 bytes.
    pub fn qr_codec(&self) -> Result<QrCodec> {
        QrCodec::from_base64_key(&self.qr_secret_key)
    }

    /// Build the bearer validator.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the secret is too short.
    pub fn bearer_validator(&self) -> Result<BearerValidator> {
        BearerValidator::new(&self.jwt_secret, self.bearer_ttl)
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("qr_secret_key", &"<redacted>")
            .field("jwt_secret", &"<redacted>")
            .field("bearer_ttl", &self.bearer_ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let config = AuthConfig::new(
            QrCodec::generate_base64_key(),
            "jwt-secret-value-that-is-32-bytes-long".to_string(),
        );
        let debug = format!("{config:?}");
        assert!(!debug.contains("jwt-secret-value"));
        assert!(config.qr_codec().is_ok());
        assert!(config.bearer_validator().is_ok());
    }
}
