//! Axum integration for the shuttle boarding system.
//!
//! Generic pieces every HTTP surface of the system shares:
//!
//! - [`AppError`]: domain errors mapped to status codes and a JSON
//!   `{code, message}` body
//! - Extractors: [`CorrelationId`], [`BearerToken`]
//! - Middleware: correlation-ID propagation
//! - [`TopicBroadcaster`]: in-process topic → subscribers registry backing
//!   live channels
//! - Health endpoint
//!
//! # Request Flow
//!
//! 1. **Correlation ID** attached (or generated) by the middleware
//! 2. **Bearer credential** extracted from the header or `access_token` query
//! 3. **Handler** calls into the boarding core with an explicit caller
//! 4. **Errors** map to [`AppError`] responses

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod topics;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{BearerToken, CorrelationId};
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};
pub use topics::TopicBroadcaster;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
