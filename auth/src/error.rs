//! Error types for credential and caller-identity operations.

use thiserror::Error;

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Failure modes of the auth layer.
///
/// Messages never carry plaintext payloads or key material.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    // ═══════════════════════════════════════════════════════════
    // Credential Errors
    // ═══════════════════════════════════════════════════════════

    /// A QR credential failed to decode (malformed, foreign key, tampered).
    #[error("Invalid credential")]
    InvalidCredential,

    /// Bearer credential missing, malformed, expired or badly signed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // ═══════════════════════════════════════════════════════════
    // Authorization Errors
    // ═══════════════════════════════════════════════════════════

    /// Caller is authenticated but lacks the required role.
    #[error("Insufficient permissions: {required}")]
    Forbidden {
        /// Role that was required
        required: String,
    },

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// Key or secret is unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Cryptographic or encoding failure on the issuing side.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Returns `true` if this error is due to what the caller presented.
    ///
    /// # Examples
    ///
    /// ```
    /// # use shuttle_auth::AuthError;
    /// assert!(AuthError::InvalidCredential.is_user_error());
    /// assert!(!AuthError::Internal("boom".into()).is_user_error());
    /// ```
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredential | Self::Unauthorized(_) | Self::Forbidden { .. }
        )
    }
}
