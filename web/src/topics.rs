//! In-process topic registry for live fan-out.
//!
//! Maps a topic name to a `tokio::sync::broadcast` channel. Every receiver
//! attached when a message is published gets it, in publish order. Nothing is
//! stored for later subscribers.
//!
//! ```text
//! publish("route/42", m) ──▶ Sender ──┬──▶ Receiver (socket A)
//!                                     └──▶ Receiver (socket B)
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

/// Default per-topic buffer before slow receivers start lagging.
pub const DEFAULT_TOPIC_CAPACITY: usize = 1000;

/// Type alias for the channels map to reduce complexity.
type ChannelsMap<M> = Arc<RwLock<HashMap<String, broadcast::Sender<M>>>>;

/// Topic broadcaster for multi-channel fan-out.
///
/// Cloning is cheap and every clone shares the same registry.
///
/// # Example
///
/// ```
/// use shuttle_web::TopicBroadcaster;
///
/// # tokio_test::block_on(async {
/// let broadcaster = TopicBroadcaster::<String>::new();
/// let mut rx = broadcaster.subscribe("route/42").await;
///
/// assert_eq!(broadcaster.publish("route/42", "hello".to_string()).await, 1);
/// assert_eq!(rx.recv().await.ok().as_deref(), Some("hello"));
/// # });
/// ```
pub struct TopicBroadcaster<M>
where
    M: Clone + Send + 'static,
{
    /// Map of topic name → broadcast channel
    channels: ChannelsMap<M>,
    /// Buffer size for newly created topics
    capacity: usize,
}

impl<M> TopicBroadcaster<M>
where
    M: Clone + Send + Sync + 'static,
{
    /// Create a broadcaster with the default per-topic capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    /// Create a broadcaster whose topics buffer `capacity` messages.
    ///
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Publish a message to every current subscriber of `topic`.
    ///
    /// Returns how many receivers it was handed to. Publishing to a topic
    /// nobody subscribed to is a no-op returning zero.
    pub async fn publish(&self, topic: &str, message: M) -> usize {
        let channels = self.channels.read().await;
        channels
            .get(topic)
            .and_then(|sender| sender.send(message).ok())
            .unwrap_or(0)
    }

    /// Subscribe to `topic`, creating it on first use.
    pub async fn subscribe(&self, topic: impl Into<String>) -> broadcast::Receiver<M> {
        let mut channels = self.channels.write().await;
        channels
            .entry(topic.into())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Drop `topic` if no receivers remain.
    ///
    /// Call after dropping a receiver; returns `true` if the topic was removed.
    pub async fn prune(&self, topic: &str) -> bool {
        let mut channels = self.channels.write().await;
        match channels.get(topic) {
            Some(sender) if sender.receiver_count() == 0 => {
                channels.remove(topic);
                true
            }
            _ => false,
        }
    }

    /// Number of receivers currently attached to `topic`.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.channels
            .read()
            .await
            .get(topic)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Get count of active topics.
    pub async fn topic_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

impl<M> Default for TopicBroadcaster<M>
where
    M: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for TopicBroadcaster<M>
where
    M: Clone + Send + 'static,
{
    fn clone(&self) -> Self {
        Self {
            channels: Arc::clone(&self.channels),
            capacity: self.capacity,
        }
    }
}

impl<M> std::fmt::Debug for TopicBroadcaster<M>
where
    M: Clone + Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicBroadcaster")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    #[tokio::test]
    async fn test_topic_broadcaster_creation() {
        let broadcaster = TopicBroadcaster::<String>::new();
        assert_eq!(broadcaster.topic_count().await, 0);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_creates_nothing() {
        let broadcaster = TopicBroadcaster::<String>::new();

        let delivered = broadcaster.publish("route/1", "lost".to_string()).await;

        assert_eq!(delivered, 0);
        assert_eq!(broadcaster.topic_count().await, 0);
    }

    #[tokio::test]
    async fn test_multiple_subscribers_in_order() {
        let broadcaster = TopicBroadcaster::<u32>::new();
        let mut rx1 = broadcaster.subscribe("route/1").await;
        let mut rx2 = broadcaster.subscribe("route/1").await;

        for n in 0..5 {
            assert_eq!(broadcaster.publish("route/1", n).await, 2);
        }

        for n in 0..5 {
            assert_eq!(rx1.recv().await.unwrap(), n);
            assert_eq!(rx2.recv().await.unwrap(), n);
        }
    }

    #[tokio::test]
    async fn test_topic_isolation() {
        let broadcaster = TopicBroadcaster::<String>::new();
        let mut rx_a = broadcaster.subscribe("route/1").await;
        let mut rx_b = broadcaster.subscribe("route/2").await;

        broadcaster.publish("route/1", "A".to_string()).await;

        assert_eq!(rx_a.recv().await.unwrap(), "A");
        assert!(matches!(rx_b.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_no_replay() {
        let broadcaster = TopicBroadcaster::<u32>::new();
        let _early = broadcaster.subscribe("route/1").await;
        broadcaster.publish("route/1", 1).await;

        let mut late = broadcaster.subscribe("route/1").await;

        assert!(matches!(late.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_prune_removes_only_empty_topics() {
        let broadcaster = TopicBroadcaster::<u32>::new();
        let rx = broadcaster.subscribe("route/1").await;
        let _keep = broadcaster.subscribe("route/2").await;

        assert!(!broadcaster.prune("route/1").await);
        drop(rx);
        assert!(broadcaster.prune("route/1").await);
        assert!(!broadcaster.prune("route/2").await);
        assert_eq!(broadcaster.topic_count().await, 1);
    }

    #[tokio::test]
    async fn test_slow_receiver_lags() {
        let broadcaster = TopicBroadcaster::<u32>::with_capacity(2);
        let mut rx = broadcaster.subscribe("route/1").await;

        for n in 0..4 {
            broadcaster.publish("route/1", n).await;
        }

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(2))));
        assert_eq!(rx.recv().await.unwrap(), 2);
    }
}
