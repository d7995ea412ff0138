//! WebSocket endpoint of the live route channel.
//!
//! # Connection
//!
//! ```text
//! GET /ws
//! Authorization: Bearer <token>        (or ?access_token=<token>)
//! ```
//!
//! The credential is checked before the upgrade: without a valid one the
//! request gets 401 and no socket exists. Beyond the connection limit the
//! request gets 503.
//!
//! # Message Protocol
//!
//! **Client → Server:**
//! ```json
//! {"type":"subscribe","topics":["route/42"]}
//! {"type":"unsubscribe","topics":["route/42"]}
//! {"type":"publish","topic":"route/42","message":{"type":"RUNNING","routeId":42,"latitude":37.1,"longitude":127.2,"timestamp":"2025-03-10T08:00:00+09:00"}}
//! {"type":"ping"}
//! ```
//!
//! **Server → Client:**
//! ```json
//! {"type":"subscribed","topics":["route/42"]}
//! {"type":"unsubscribed","topics":["route/42"]}
//! {"type":"event","topic":"route/42","message":{"type":"END","routeId":42,"endedAt":"..."}}
//! {"type":"error","message":"..."}
//! {"type":"pong"}
//! ```
//!
//! A published position reaches subscribers as the JSON the operator sent,
//! including its timestamp offset and any extra fields.
//!
//! Each subscribed topic gets its own forwarding task feeding one outbound
//! queue, so events reach the socket as soon as they are published and in
//! publish order per topic.

use super::channel::{ConnectionPermit, LiveError, LiveRouteChannel};
use crate::auth::AuthenticatedCaller;
use crate::state::AppState;
use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use shuttle_auth::Caller;
use serde_json::Value;
use shuttle_core::{RouteMessage, RouteTopic, WireMessage};
use std::collections::HashMap;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Topics one connection may hold at once.
const MAX_TOPICS_PER_CONNECTION: usize = 32;

/// Outbound frames buffered per connection.
const OUTBOUND_BUFFER: usize = 256;

/// Frame sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    /// Start receiving the listed topics.
    Subscribe {
        /// `route/{id}` topics
        topics: Vec<String>,
    },
    /// Stop receiving the listed topics.
    Unsubscribe {
        /// `route/{id}` topics
        topics: Vec<String>,
    },
    /// Publish a position to a topic (operators only).
    Publish {
        /// Target topic
        topic: String,
        /// Payload; must be a `RUNNING` message for the same route
        message: Value,
    },
    /// Keep-alive.
    Ping,
}

/// Frame sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    /// Subscription confirmed.
    Subscribed {
        /// Topics now attached
        topics: Vec<String>,
    },
    /// Unsubscription confirmed.
    Unsubscribed {
        /// Topics now detached
        topics: Vec<String>,
    },
    /// A message published on a subscribed topic.
    Event {
        /// Source topic
        topic: String,
        /// The message as its publisher sent it
        message: Value,
    },
    /// A client frame was refused.
    Error {
        /// Why
        message: String,
    },
    /// Keep-alive response.
    Pong,
}

impl ServerFrame {
    fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Upgrade an authenticated request to a live-channel socket.
#[allow(clippy::unused_async)] // Axum handler signature requires async
pub async fn live_socket(
    AuthenticatedCaller(caller): AuthenticatedCaller,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(permit) = state.live.try_admit() else {
        warn!(
            user_id = %caller.user_id,
            current_connections = state.live.active_connections(),
            "Live connection limit exceeded"
        );
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "Too many concurrent connections. Please try again later.",
        )
            .into_response();
    };

    info!(user_id = %caller.user_id, role = caller.role.as_str(), "Live connection admitted");
    let channel = state.live.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, caller, channel, permit))
}

/// One connection's subscriptions and outbound queue.
struct Session {
    caller: Caller,
    channel: LiveRouteChannel,
    outbound: mpsc::Sender<ServerFrame>,
    forwarders: HashMap<RouteTopic, JoinHandle<()>>,
}

impl Session {
    async fn handle_text(&mut self, text: &str) {
        match serde_json::from_str::<ClientFrame>(text) {
            Ok(ClientFrame::Subscribe { topics }) => self.subscribe(topics).await,
            Ok(ClientFrame::Unsubscribe { topics }) => self.unsubscribe(topics).await,
            Ok(ClientFrame::Publish { topic, message }) => self.publish(&topic, message).await,
            Ok(ClientFrame::Ping) => self.send(ServerFrame::Pong).await,
            Err(e) => {
                debug!(error = %e, "Unparseable client frame");
                self.send(ServerFrame::error(format!("invalid frame: {e}"))).await;
            }
        }
    }

    async fn subscribe(&mut self, topics: Vec<String>) {
        let parsed: Option<Vec<RouteTopic>> = topics.iter().map(|t| RouteTopic::parse(t)).collect();
        let Some(parsed) = parsed else {
            self.send(ServerFrame::error("topics must look like route/{id}"))
                .await;
            return;
        };

        let new_topics = parsed
            .iter()
            .filter(|t| !self.forwarders.contains_key(t))
            .count();
        if self.forwarders.len() + new_topics > MAX_TOPICS_PER_CONNECTION {
            self.send(ServerFrame::error(format!(
                "at most {MAX_TOPICS_PER_CONNECTION} topics per connection"
            )))
            .await;
            return;
        }

        for topic in parsed {
            if self.forwarders.contains_key(&topic) {
                continue;
            }
            let rx = self.channel.subscribe(topic).await;
            let task = tokio::spawn(forward(topic, rx, self.outbound.clone()));
            self.forwarders.insert(topic, task);
        }

        debug!(user_id = %self.caller.user_id, ?topics, "Subscribed");
        // Receivers exist before the confirmation leaves
        self.send(ServerFrame::Subscribed { topics }).await;
    }

    async fn unsubscribe(&mut self, topics: Vec<String>) {
        for topic in topics.iter().filter_map(|t| RouteTopic::parse(t)) {
            if let Some(task) = self.forwarders.remove(&topic) {
                detach(&self.channel, topic, task).await;
            }
        }
        debug!(user_id = %self.caller.user_id, ?topics, "Unsubscribed");
        self.send(ServerFrame::Unsubscribed { topics }).await;
    }

    async fn publish(&self, topic: &str, message: Value) {
        if let Err(frame) = self.try_publish(topic, message).await {
            self.send(frame).await;
        }
    }

    async fn try_publish(&self, topic: &str, message: Value) -> Result<(), ServerFrame> {
        let target = RouteTopic::parse(topic)
            .ok_or_else(|| ServerFrame::error("topics must look like route/{id}"))?;
        let wire = WireMessage::from_json(message)
            .map_err(|e| ServerFrame::error(format!("invalid message: {e}")))?;

        match wire.message() {
            RouteMessage::End(_) => {
                return Err(ServerFrame::error(
                    "END is sent by ending the route, not published",
                ));
            }
            RouteMessage::Position(update) if update.route_id != target.route_id() => {
                return Err(ServerFrame::error(
                    LiveError::TopicMismatch {
                        topic: target.route_id(),
                        message: update.route_id,
                    }
                    .to_string(),
                ));
            }
            RouteMessage::Position(_) => {}
        }

        self.channel
            .publish_position(&self.caller, wire)
            .await
            .map(|_| ())
            .map_err(|e| ServerFrame::error(e.to_string()))
    }

    async fn send(&self, frame: ServerFrame) {
        // A closed queue means the writer is gone; the read loop ends next
        let _ = self.outbound.send(frame).await;
    }

    async fn close(mut self) {
        for (topic, task) in self.forwarders.drain() {
            detach(&self.channel, topic, task).await;
        }
    }
}

/// Stop a forwarder and drop the topic if it was the last subscriber.
async fn detach(channel: &LiveRouteChannel, topic: RouteTopic, task: JoinHandle<()>) {
    task.abort();
    // Awaiting guarantees the receiver is dropped before pruning
    let _ = task.await;
    channel.release(topic).await;
}

/// Copy one topic's messages into the connection's outbound queue.
async fn forward(
    topic: RouteTopic,
    mut rx: broadcast::Receiver<WireMessage>,
    outbound: mpsc::Sender<ServerFrame>,
) {
    let name = topic.to_string();
    loop {
        match rx.recv().await {
            Ok(wire) => {
                let frame = ServerFrame::Event {
                    topic: name.clone(),
                    message: wire.into_json(),
                };
                if outbound.send(frame).await.is_err() {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(%topic, skipped, "Subscriber lagging, skipped messages");
                metrics::counter!("live.messages.skipped").increment(skipped);
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!(%topic, "Topic channel closed");
                return;
            }
        }
    }
}

/// Handle a connection until either side closes it.
async fn handle_socket(
    socket: WebSocket,
    caller: Caller,
    channel: LiveRouteChannel,
    permit: ConnectionPermit,
) {
    let user_id = caller.user_id;
    let (mut sink, mut stream) = socket.split();
    let (outbound, mut queue) = mpsc::channel::<ServerFrame>(OUTBOUND_BUFFER);

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = queue.recv().await {
            let Ok(json) = serde_json::to_string(&frame) else {
                continue;
            };
            if sink.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut session = Session {
        caller,
        channel,
        outbound,
        forwarders: HashMap::new(),
    };

    loop {
        tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => session.handle_text(&text).await,
                Some(Ok(Message::Binary(_))) => {
                    session.send(ServerFrame::error("binary frames are not supported")).await;
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => {
                    debug!(%user_id, "Client closed connection");
                    break;
                }
                Some(Err(e)) => {
                    debug!(%user_id, error = %e, "Socket read failed");
                    break;
                }
            },
            _ = &mut writer => {
                debug!(%user_id, "Socket writer finished");
                break;
            }
        }
    }

    session.close().await;
    writer.abort();
    drop(permit);
    info!(%user_id, "Live connection closed");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_frames_parse() {
        let frame: ClientFrame =
            serde_json::from_value(json!({"type": "subscribe", "topics": ["route/42"]})).unwrap();
        assert_eq!(
            frame,
            ClientFrame::Subscribe {
                topics: vec!["route/42".to_string()]
            }
        );

        let frame: ClientFrame = serde_json::from_value(json!({
            "type": "publish",
            "topic": "route/42",
            "message": {
                "type": "RUNNING",
                "routeId": 42,
                "latitude": 37.1,
                "longitude": 127.2,
                "timestamp": "2025-03-10T08:00:00+09:00"
            }
        }))
        .unwrap();
        let ClientFrame::Publish { topic, message } = frame else {
            unreachable!("expected a publish frame");
        };
        assert_eq!(topic, "route/42");
        assert!(matches!(
            WireMessage::from_json(message).unwrap().message(),
            RouteMessage::Position(_)
        ));

        let frame: ClientFrame = serde_json::from_value(json!({"type": "ping"})).unwrap();
        assert_eq!(frame, ClientFrame::Ping);
    }

    #[test]
    fn test_server_frames_serialize() {
        let json = serde_json::to_value(ServerFrame::Pong).unwrap();
        assert_eq!(json, json!({"type": "pong"}));

        let json = serde_json::to_value(ServerFrame::error("nope")).unwrap();
        assert_eq!(json, json!({"type": "error", "message": "nope"}));
    }

    #[tokio::test]
    async fn test_forwarder_preserves_order() {
        let channel = LiveRouteChannel::new(16, 1);
        let topic = RouteTopic(shuttle_core::RouteId(3));
        let rx = channel.subscribe(topic).await;
        let (tx, mut queue) = mpsc::channel(16);
        let task = tokio::spawn(forward(topic, rx, tx));

        let operator = shuttle_auth::Caller {
            user_id: shuttle_core::UserId(1),
            email: "ops@example.com".to_string(),
            name: "Ops".to_string(),
            role: shuttle_auth::Role::Admin,
        };
        let stamp = |minute: u32| format!("2025-03-10T08:{minute:02}:00+09:00");
        for minute in 0..3 {
            let update = WireMessage::from_json(json!({
                "type": "RUNNING",
                "routeId": 3,
                "latitude": 36.5,
                "longitude": 127.3,
                "timestamp": stamp(minute)
            }))
            .unwrap();
            channel.publish_position(&operator, update).await.unwrap();
        }

        for minute in 0..3 {
            let Some(ServerFrame::Event { topic: name, message }) = queue.recv().await else {
                unreachable!("expected a position event");
            };
            assert_eq!(name, "route/3");
            assert_eq!(message["timestamp"], stamp(minute));
        }
        task.abort();
    }
}
