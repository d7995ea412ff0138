//! Live route channel: per-route fan-out plus the run lifecycle.
//!
//! A route's run is `Open` until an operator ends it. Ending broadcasts
//! exactly one [`RouteEnd`] and closes the run; positions published to an
//! ended run are rejected until the route is started again.
//!
//! ```text
//!          start                 end (broadcast END once)
//! (absent) ─────▶ Open ───────────────────────────▶ Ended
//!    │             ▲  publish_position (fan-out)      │
//!    └─────────────┴──────────────── start ◀──────────┘
//! ```
//!
//! Topics carry [`WireMessage`]s: a position goes out as the JSON its
//! publisher sent, after being decoded and checked.

use chrono::{DateTime, Utc};
use shuttle_auth::Caller;
use shuttle_core::{RouteEnd, RouteId, RouteMessage, RouteTopic, WireMessage};
use shuttle_web::{AppError, TopicBroadcaster};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{RwLock, broadcast};

/// Live channel failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LiveError {
    /// The route's run has ended.
    #[error("Route {0} has ended")]
    RouteEnded(RouteId),

    /// The message is not a usable position.
    #[error("Invalid position: {0}")]
    InvalidPosition(&'static str),

    /// The message targets a different route than its topic.
    #[error("Message for route {message} sent to route {topic}")]
    TopicMismatch {
        /// Route named by the topic
        topic: RouteId,
        /// Route named in the message
        message: RouteId,
    },

    /// Caller may not perform this operation.
    #[error("Forbidden: requires {0}")]
    Forbidden(String),

    /// A server-produced message could not be encoded.
    #[error("Encoding failed: {0}")]
    Encoding(String),
}

impl From<LiveError> for AppError {
    fn from(err: LiveError) -> Self {
        use axum::http::StatusCode;

        match err {
            LiveError::RouteEnded(_) => {
                Self::new(StatusCode::CONFLICT, err.to_string(), "ROUTE_ENDED".to_string())
            }
            LiveError::InvalidPosition(_) | LiveError::TopicMismatch { .. } => {
                Self::validation(err.to_string())
            }
            LiveError::Forbidden(_) => Self::forbidden(err.to_string()),
            LiveError::Encoding(_) => Self::internal(err.to_string()),
        }
    }
}

/// Run state of one route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Accepting positions.
    Open,
    /// Ended at the given instant.
    Ended(DateTime<Utc>),
}

/// Per-route publish/subscribe channel.
#[derive(Clone)]
pub struct LiveRouteChannel {
    broadcaster: TopicBroadcaster<WireMessage>,
    runs: Arc<RwLock<HashMap<RouteId, RunState>>>,
    connections: Arc<AtomicUsize>,
    max_connections: usize,
}

/// Slot held by an admitted socket; releases it on drop.
#[derive(Debug)]
pub struct ConnectionPermit {
    connections: Arc<AtomicUsize>,
}

impl Drop for ConnectionPermit {
    #[allow(clippy::cast_precision_loss)]
    fn drop(&mut self) {
        let remaining = self.connections.fetch_sub(1, Ordering::AcqRel) - 1;
        metrics::gauge!("live.connections").set(remaining as f64);
    }
}

impl LiveRouteChannel {
    /// Create a channel with the given per-topic buffer and socket limit.
    #[must_use]
    pub fn new(channel_capacity: usize, max_connections: usize) -> Self {
        Self {
            broadcaster: TopicBroadcaster::with_capacity(channel_capacity),
            runs: Arc::new(RwLock::new(HashMap::new())),
            connections: Arc::new(AtomicUsize::new(0)),
            max_connections,
        }
    }

    /// Current run state; routes never ended read as open.
    pub async fn run_state(&self, route_id: RouteId) -> RunState {
        self.runs
            .read()
            .await
            .get(&route_id)
            .copied()
            .unwrap_or(RunState::Open)
    }

    /// Attach to a route topic. Only messages published after this call arrive.
    pub async fn subscribe(&self, topic: RouteTopic) -> broadcast::Receiver<WireMessage> {
        self.broadcaster.subscribe(topic.to_string()).await
    }

    /// Drop a topic once its last subscriber is gone.
    pub async fn release(&self, topic: RouteTopic) {
        if self.broadcaster.prune(&topic.to_string()).await {
            tracing::debug!(%topic, "Topic has no subscribers, removed");
        }
    }

    /// Fan a position out to the route's current subscribers, as published.
    ///
    /// Returns the number of subscribers it reached.
    ///
    /// # Errors
    ///
    /// - [`LiveError::Forbidden`]: caller is not an operator
    /// - [`LiveError::InvalidPosition`]: not a position, or coordinates out of range
    /// - [`LiveError::RouteEnded`]: the run has ended
    pub async fn publish_position(
        &self,
        caller: &Caller,
        published: WireMessage,
    ) -> Result<usize, LiveError> {
        if !caller.is_admin() {
            return Err(LiveError::Forbidden("ADMIN".to_string()));
        }
        let RouteMessage::Position(update) = published.message() else {
            return Err(LiveError::InvalidPosition("only RUNNING messages are published"));
        };
        update.validate().map_err(LiveError::InvalidPosition)?;

        let route_id = update.route_id;
        // Held until the message is handed off, so no position can follow END
        let runs = self.runs.read().await;
        if let Some(RunState::Ended(_)) = runs.get(&route_id) {
            tracing::warn!(%route_id, user_id = %caller.user_id, "Position after route end rejected");
            return Err(LiveError::RouteEnded(route_id));
        }

        let delivered = self
            .broadcaster
            .publish(&RouteTopic(route_id).to_string(), published)
            .await;
        drop(runs);

        metrics::counter!("live.positions.published").increment(1);
        tracing::debug!(%route_id, delivered, "Position published");
        Ok(delivered)
    }

    /// End the route's current run and broadcast its single `END` message.
    ///
    /// # Errors
    ///
    /// - [`LiveError::Forbidden`]: caller is not an operator
    /// - [`LiveError::RouteEnded`]: the run already ended
    pub async fn end_route(
        &self,
        caller: &Caller,
        route_id: RouteId,
        now: DateTime<Utc>,
    ) -> Result<RouteEnd, LiveError> {
        if !caller.is_admin() {
            return Err(LiveError::Forbidden("ADMIN".to_string()));
        }

        let end = RouteEnd {
            route_id,
            ended_at: now,
        };
        let message = WireMessage::from_message(RouteMessage::End(end))
            .map_err(|e| LiveError::Encoding(e.to_string()))?;

        // Only the caller that flips Open -> Ended publishes
        let mut runs = self.runs.write().await;
        if let Some(RunState::Ended(_)) = runs.get(&route_id) {
            return Err(LiveError::RouteEnded(route_id));
        }
        runs.insert(route_id, RunState::Ended(now));

        let delivered = self
            .broadcaster
            .publish(&RouteTopic(route_id).to_string(), message)
            .await;
        drop(runs);

        tracing::info!(%route_id, delivered, "Route ended");
        Ok(end)
    }

    /// Open a new run for the route. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`LiveError::Forbidden`] if the caller is not an operator.
    pub async fn start_route(&self, caller: &Caller, route_id: RouteId) -> Result<(), LiveError> {
        if !caller.is_admin() {
            return Err(LiveError::Forbidden("ADMIN".to_string()));
        }
        self.runs.write().await.insert(route_id, RunState::Open);
        tracing::info!(%route_id, "Route run started");
        Ok(())
    }

    /// Reserve a connection slot, or `None` when the limit is reached.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn try_admit(&self) -> Option<ConnectionPermit> {
        let admitted = self
            .connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_connections).then_some(n + 1)
            });

        match admitted {
            Ok(previous) => {
                metrics::gauge!("live.connections").set((previous + 1) as f64);
                Some(ConnectionPermit {
                    connections: Arc::clone(&self.connections),
                })
            }
            Err(_) => None,
        }
    }

    /// Sockets currently admitted.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.connections.load(Ordering::Acquire)
    }

    /// Number of subscribers on a route topic.
    pub async fn subscriber_count(&self, topic: RouteTopic) -> usize {
        self.broadcaster.subscriber_count(&topic.to_string()).await
    }
}

impl std::fmt::Debug for LiveRouteChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveRouteChannel")
            .field("active_connections", &self.active_connections())
            .field("max_connections", &self.max_connections)
            .finish_non_exhaustive()
    }
}
