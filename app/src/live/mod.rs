//! Live route channel.
//!
//! - [`channel`]: topic fan-out and the run lifecycle (`RUNNING` until `END`)
//! - [`socket`]: the WebSocket protocol clients speak

pub mod channel;
pub mod socket;

pub use channel::{ConnectionPermit, LiveError, LiveRouteChannel, RunState};
pub use socket::{ClientFrame, ServerFrame, live_socket};
