//! HTTP API handlers.
//!
//! - `qr`: QR credential issuance and verification
//! - `shuttle`: boarding history and rider counters
//! - `runs`: route run lifecycle (start / end)

pub mod qr;
pub mod runs;
pub mod shuttle;
