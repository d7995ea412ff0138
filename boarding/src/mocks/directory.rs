//! Mock user and route directory for testing.

use super::lock;
use crate::providers::{BoxFuture, RouteDirectory, StoreResult, UserDirectory};
use shuttle_core::{Rider, RouteId, ShuttleRoute, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock directory serving riders and routes from memory.
#[derive(Debug, Clone, Default)]
pub struct MockDirectory {
    riders: Arc<Mutex<HashMap<UserId, Rider>>>,
    routes: Arc<Mutex<HashMap<RouteId, ShuttleRoute>>>,
}

impl MockDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rider.
    #[must_use]
    pub fn with_rider(self, rider: Rider) -> Self {
        self.add_rider(rider);
        self
    }

    /// Add a route.
    #[must_use]
    pub fn with_route(self, route: ShuttleRoute) -> Self {
        self.add_route(route);
        self
    }

    /// Add or replace a rider.
    pub fn add_rider(&self, rider: Rider) {
        if let Ok(mut riders) = self.riders.lock() {
            riders.insert(rider.id, rider);
        }
    }

    /// Add or replace a route.
    pub fn add_route(&self, route: ShuttleRoute) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.insert(route.id, route);
        }
    }
}

impl UserDirectory for MockDirectory {
    fn find_by_id_and_email<'a>(
        &'a self,
        id: UserId,
        email: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<Rider>>> {
        Box::pin(async move {
            Ok(lock(&self.riders)?
                .get(&id)
                .filter(|rider| rider.email == email)
                .cloned())
        })
    }
}

impl RouteDirectory for MockDirectory {
    fn find_route(&self, id: RouteId) -> BoxFuture<'_, StoreResult<Option<ShuttleRoute>>> {
        Box::pin(async move { Ok(lock(&self.routes)?.get(&id).cloned()) })
    }
}
