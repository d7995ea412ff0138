//! Live route channel wire types.
//!
//! One topic per route, named `route/{id}`. Two message kinds travel on a
//! topic, distinguished by the `type` field:
//!
//! ```json
//! {"type":"RUNNING","routeId":42,"latitude":37.1,"longitude":127.2,"timestamp":"2025-03-10T08:00:00Z"}
//! {"type":"END","routeId":42,"endedAt":"2025-03-10T09:10:00Z"}
//! ```
//!
//! Messages are transient: they exist only on the wire and are never stored.
//! A published message reaches subscribers as the JSON its publisher sent
//! (see [`WireMessage`]); decoding it is only a check.

use crate::types::RouteId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

const TOPIC_PREFIX: &str = "route/";

/// Topic address of a route's live channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteTopic(pub RouteId);

impl RouteTopic {
    /// Parse `route/{id}`. Anything else is not a route topic.
    #[must_use]
    pub fn parse(topic: &str) -> Option<Self> {
        topic
            .strip_prefix(TOPIC_PREFIX)
            .and_then(|id| id.parse::<i64>().ok())
            .map(|id| Self(RouteId(id)))
    }

    /// The route this topic belongs to.
    #[must_use]
    pub const fn route_id(self) -> RouteId {
        self.0
    }
}

impl fmt::Display for RouteTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{TOPIC_PREFIX}{}", self.0)
    }
}

/// Position of a running shuttle, pushed by the operator device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionUpdate {
    /// Route the shuttle is running.
    pub route_id: RouteId,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// When the device took the fix.
    pub timestamp: DateTime<Utc>,
}

impl PositionUpdate {
    /// Reject coordinates that cannot be a position on Earth.
    ///
    /// # Errors
    ///
    /// Returns a short description of the offending field.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err("latitude must be within [-90, 90]");
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err("longitude must be within [-180, 180]");
        }
        Ok(())
    }
}

/// Terminal event closing out a route run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteEnd {
    /// Route that ended.
    pub route_id: RouteId,
    /// When the operator ended the run.
    pub ended_at: DateTime<Utc>,
}

/// Anything carried on a route topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RouteMessage {
    /// Position update; any number per run.
    #[serde(rename = "RUNNING")]
    Position(PositionUpdate),
    /// End of the run; at most one per run.
    #[serde(rename = "END")]
    End(RouteEnd),
}

impl RouteMessage {
    /// Route the message belongs to.
    #[must_use]
    pub const fn route_id(&self) -> RouteId {
        match self {
            Self::Position(update) => update.route_id,
            Self::End(end) => end.route_id,
        }
    }

    /// Topic the message is published on.
    #[must_use]
    pub const fn topic(&self) -> RouteTopic {
        RouteTopic(self.route_id())
    }

    /// Whether this is the terminal event of a run.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::End(_))
    }
}

/// A route message paired with the JSON it travels as.
///
/// For a published position the JSON is the publisher's own, so a
/// `+09:00` timestamp or an extra field reaches subscribers untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct WireMessage {
    message: RouteMessage,
    json: Value,
}

impl WireMessage {
    /// Decode published JSON, keeping it as sent.
    ///
    /// # Errors
    ///
    /// Returns the decode error if `json` is not a route message.
    pub fn from_json(json: Value) -> serde_json::Result<Self> {
        let message = RouteMessage::deserialize(&json)?;
        Ok(Self { message, json })
    }

    /// Encode a message produced by the server itself.
    ///
    /// # Errors
    ///
    /// Returns the encode error from `serde_json`.
    pub fn from_message(message: RouteMessage) -> serde_json::Result<Self> {
        let json = serde_json::to_value(&message)?;
        Ok(Self { message, json })
    }

    /// The decoded message.
    #[must_use]
    pub const fn message(&self) -> &RouteMessage {
        &self.message
    }

    /// The JSON subscribers receive.
    #[must_use]
    pub const fn json(&self) -> &Value {
        &self.json
    }

    /// Take the JSON subscribers receive.
    #[must_use]
    pub fn into_json(self) -> Value {
        self.json
    }
}
