//! Storage implementations for the boarding system.
//!
//! - **Rider counters** (Redis) - atomic per-route counts
//! - **Ledger, directories, credentials** (PostgreSQL) - behind the
//!   `postgres` feature

#[cfg(feature = "postgres")]
pub mod postgres;
pub mod counter_redis;

// Re-exports
pub use counter_redis::RedisRiderCounter;
#[cfg(feature = "postgres")]
pub use postgres::{PostgresCredentialStore, PostgresDirectory, PostgresLedgerStore};
