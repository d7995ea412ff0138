//! Error types for boarding operations.

use shuttle_auth::AuthError;
use shuttle_core::{RouteId, UserId};
use thiserror::Error;

/// Result type alias for boarding operations.
pub type Result<T> = std::result::Result<T, BoardingError>;

/// Failures reported by storage providers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("Duplicate entry")]
    Duplicate,

    /// The backing store could not be reached or refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A conditional write kept losing to concurrent writers.
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// The store returned data that does not fit the domain model.
    #[error("Corrupt data: {0}")]
    Corrupt(String),
}

/// Failures of the boarding core.
///
/// Each kind is a distinct, typed outcome. None are retried by the core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BoardingError {
    /// The scanned QR credential does not decode.
    #[error("Invalid QR code")]
    InvalidQrCode,

    /// No account matches the credential's `(user_id, email)` pair.
    #[error("User not found")]
    UserNotFound,

    /// The route does not exist.
    #[error("Route {0} not found")]
    RouteNotFound(RouteId),

    /// The rider already boarded this route today.
    #[error("User {user_id} already boarded route {route_id} today")]
    DuplicateBoarding {
        /// Rider
        user_id: UserId,
        /// Route
        route_id: RouteId,
    },

    /// The route's run has ended; start a new run first.
    #[error("Route {0} has ended")]
    RouteEnded(RouteId),

    /// Caller identity missing or invalid.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller lacks the required role.
    #[error("Forbidden: requires {0}")]
    Forbidden(String),

    /// A backing store failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BoardingError {
    /// Returns `true` for policy rejections and bad input, as opposed to faults.
    ///
    /// # Examples
    ///
    /// ```
    /// # use shuttle_boarding::BoardingError;
    /// assert!(BoardingError::InvalidQrCode.is_rejection());
    /// assert!(!BoardingError::Internal("boom".into()).is_rejection());
    /// ```
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        !matches!(self, Self::Storage(_) | Self::Internal(_))
    }

    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidQrCode => "INVALID_QR_CODE",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::RouteNotFound(_) => "ROUTE_NOT_FOUND",
            Self::DuplicateBoarding { .. } => "DUPLICATE_BOARDING",
            Self::RouteEnded(_) => "ROUTE_ENDED",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Storage(StoreError::Unavailable(_) | StoreError::Conflict(_)) => {
                "SERVICE_UNAVAILABLE"
            }
            Self::Storage(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<AuthError> for BoardingError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredential => Self::InvalidQrCode,
            AuthError::Unauthorized(reason) => Self::Unauthorized(reason),
            AuthError::Forbidden { required } => Self::Forbidden(required),
            AuthError::Configuration(msg) | AuthError::Internal(msg) => Self::Internal(msg),
        }
    }
}
