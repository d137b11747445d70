// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Gateway event types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events flowing through the gateway's event bus.
///
/// An event is an immutable tag-plus-payload record. The serialized form is
/// `{"type": "<tag>", "payload": {...}}`, which is what realtime consumers
/// and the log tail expose to clients.
///
/// # Examples
///
/// ```
/// use homelink::event::GatewayEvent;
/// use serde_json::json;
///
/// let event = GatewayEvent::mqtt_in("home/livingroom/ac/status", json!({"power": "on"}));
/// assert!(event.is_inbound());
/// assert_eq!(event.topic(), "home/livingroom/ac/status");
///
/// let wire = serde_json::to_value(&event).unwrap();
/// assert_eq!(wire["type"], "mqtt_in");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// An inbound broker message, decoded by the bridge.
    MqttIn {
        /// The broker topic the message arrived on.
        topic: String,
        /// The decoded message payload.
        payload: Value,
    },

    /// An outbound publish, mirrored by the bridge for observability.
    MqttOut {
        /// The broker topic the message was published to.
        topic: String,
        /// The payload that was published.
        payload: Value,
    },
}

impl GatewayEvent {
    /// Creates an inbound broker event.
    #[must_use]
    pub fn mqtt_in(topic: impl Into<String>, payload: Value) -> Self {
        Self::MqttIn {
            topic: topic.into(),
            payload,
        }
    }

    /// Creates an outbound broker event.
    #[must_use]
    pub fn mqtt_out(topic: impl Into<String>, payload: Value) -> Self {
        Self::MqttOut {
            topic: topic.into(),
            payload,
        }
    }

    /// Returns the broker topic associated with this event.
    #[must_use]
    pub fn topic(&self) -> &str {
        match self {
            Self::MqttIn { topic, .. } | Self::MqttOut { topic, .. } => topic,
        }
    }

    /// Returns the message payload.
    #[must_use]
    pub fn payload(&self) -> &Value {
        match self {
            Self::MqttIn { payload, .. } | Self::MqttOut { payload, .. } => payload,
        }
    }

    /// Returns `true` if this event originated from the broker.
    #[must_use]
    pub fn is_inbound(&self) -> bool {
        matches!(self, Self::MqttIn { .. })
    }

    /// Returns `true` if this event mirrors an outbound publish.
    #[must_use]
    pub fn is_outbound(&self) -> bool {
        matches!(self, Self::MqttOut { .. })
    }
}
