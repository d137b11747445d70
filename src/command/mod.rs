// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outbound command shapes.
//!
//! A [`Command`] is the logical device action handed to the gateway by its
//! caller (typically the web layer, after intent parsing). The registry
//! resolves it into a [`ResolvedCommand`] — a concrete broker topic and
//! payload — and a successful dispatch is acknowledged with a
//! [`CommandReceipt`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A logical device action.
///
/// # Examples
///
/// ```
/// use homelink::command::Command;
///
/// let cmd = Command::new("ac_living_001", "power_on");
/// assert!(cmd.params.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    /// Catalog id of the target device.
    pub device_id: String,
    /// Logical action name; lowercased during resolution.
    pub action: String,
    /// Extra action parameters, merged into the published payload.
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl Command {
    /// Creates a command with no parameters.
    #[must_use]
    pub fn new(device_id: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            action: action.into(),
            params: Map::new(),
        }
    }

    /// Adds a parameter to the command.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// A command resolved against the device catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedCommand {
    /// Broker topic to publish to, `<base>/set/<action>`.
    pub topic: String,
    /// JSON payload: `{"action": <action>}` merged with the command params.
    pub payload: Value,
}

/// Acknowledgment returned after a command was handed to the broker.
#[derive(Debug, Clone, Serialize)]
pub struct CommandReceipt {
    /// Dispatch status; always `"queued"` — delivery is at-least-once,
    /// the broker owns it from here.
    pub status: &'static str,
    /// The topic the command was published to.
    pub topic: String,
    /// The payload that was published.
    pub payload: Value,
}

impl CommandReceipt {
    /// Builds a receipt from a resolved command.
    #[must_use]
    pub fn queued(resolved: ResolvedCommand) -> Self {
        Self {
            status: "queued",
            topic: resolved.topic,
            payload: resolved.payload,
        }
    }
}
