//! Shuttle boarding and live tracking server.
//!
//! Wires the boarding core to HTTP and WebSocket:
//!
//! - [`config`]: environment configuration, validated at startup
//! - [`state`]: services shared by every handler
//! - [`auth`]: bearer-credential caller extraction
//! - [`api`]: REST handlers
//! - [`live`]: the per-route live channel
//! - [`routes`]: the router

#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc)] // Handler errors are documented by their status codes

pub mod api;
pub mod auth;
pub mod config;
pub mod live;
pub mod routes;
pub mod state;

pub use config::{Config, ConfigError};
pub use live::LiveRouteChannel;
pub use routes::build_router;
pub use state::{AppState, Backends};
