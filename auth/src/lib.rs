//! # Shuttle Auth
//!
//! Credentials for the shuttle boarding system.
//!
//! - **QR credential** ([`QrCodec`]): an opaque, AES-256-GCM sealed
//!   `{user_id, email}` payload that a rider presents at boarding.
//! - **Bearer credential** ([`BearerValidator`]): an HS256 JWT proving who is
//!   calling an HTTP endpoint or opening a live channel.
//! - **Caller** ([`Caller`]): the already-validated identity passed
//!   explicitly into every core operation.
//!
//! ## Example
//!
//! ```
//! use shuttle_auth::QrCodec;
//! use shuttle_core::UserId;
//!
//! let codec = QrCodec::new(&[7u8; 32])?;
//! let token = codec.encode(UserId(1), "a@example.com")?;
//! let payload = codec.decode(&token)?;
//! assert_eq!(payload.user_id, UserId(1));
//! # Ok::<(), shuttle_auth::AuthError>(())
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod bearer;
pub mod caller;
pub mod config;
pub mod error;
pub mod qr;

pub use bearer::{BearerClaims, BearerValidator};
pub use caller::{Caller, Role};
pub use config::AuthConfig;
pub use error::{AuthError, Result};
pub use qr::{QrCodec, QrPayload};
