//! Mock QR credential store for testing.

use super::lock;
use crate::providers::{BoxFuture, CredentialStore, StoreResult};
use shuttle_core::UserId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock credential store.
#[derive(Debug, Clone, Default)]
pub struct MockCredentialStore {
    tokens: Arc<Mutex<HashMap<UserId, String>>>,
}

impl MockCredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MockCredentialStore {
    fn put(&self, user_id: UserId, token: String) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            lock(&self.tokens)?.insert(user_id, token);
            Ok(())
        })
    }

    fn get(&self, user_id: UserId) -> BoxFuture<'_, StoreResult<Option<String>>> {
        Box::pin(async move { Ok(lock(&self.tokens)?.get(&user_id).cloned()) })
    }
}
