//! Mock provider implementations for testing.
//!
//! Simple, in-memory implementations of all provider traits for use in unit
//! and integration tests. Each can be switched into a failing mode to
//! exercise storage-fault paths.

pub mod counter;
pub mod credentials;
pub mod directory;
pub mod ledger;

pub use counter::MockRiderCounter;
pub use credentials::MockCredentialStore;
pub use directory::MockDirectory;
pub use ledger::MockLedgerStore;

use crate::error::StoreError;
use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Unavailable("mock lock poisoned".to_string()))
}

fn down(what: &str) -> StoreError {
    StoreError::Unavailable(format!("{what} is down"))
}
