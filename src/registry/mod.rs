// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static device catalog and command resolution.
//!
//! The registry is a fixed lookup table loaded once at process start and
//! read-only thereafter. The bridge derives its status-topic subscriptions
//! from it, and the gateway resolves logical [`Command`]s against it into
//! concrete broker topics and payloads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::command::{Command, ResolvedCommand};
use crate::error::{Error, Result};

/// Kind of a catalog device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Air conditioner / climate unit.
    AirConditioner,
    /// Light or light group.
    Light,
    /// Motorized curtain or blind.
    Curtain,
    /// Security / alarm system.
    Security,
    /// Standalone fan.
    Fan,
}

/// A device entry in the catalog.
///
/// Static data: loaded once, never mutated at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Stable catalog id (e.g. `ac_living_001`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Device kind.
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    /// Room the device lives in.
    pub room: String,
    /// Base broker topic (e.g. `home/livingroom/ac`).
    pub topic: String,
    /// Capability tags supported by the device.
    pub capabilities: Vec<String>,
}

impl DeviceDescriptor {
    /// Creates a descriptor.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: DeviceKind,
        room: impl Into<String>,
        topic: impl Into<String>,
        capabilities: &[&str],
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            room: room.into(),
            topic: topic.into(),
            capabilities: capabilities.iter().map(ToString::to_string).collect(),
        }
    }

    /// Returns `true` if the device advertises the given capability tag.
    #[must_use]
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    /// The status topic the bridge subscribes to for this device.
    #[must_use]
    pub fn status_topic(&self) -> String {
        format!("{}/status", self.topic)
    }
}

/// Read-only catalog of known devices.
///
/// # Examples
///
/// ```
/// use homelink::registry::DeviceRegistry;
/// use homelink::command::Command;
///
/// let registry = DeviceRegistry::new();
///
/// let resolved = registry
///     .resolve(&Command::new("ac_living_001", "Power_On"))
///     .unwrap();
/// assert_eq!(resolved.topic, "home/livingroom/ac/set/power_on");
/// ```
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    // BTreeMap keeps listing order deterministic.
    devices: BTreeMap<String, DeviceDescriptor>,
}

impl DeviceRegistry {
    /// Creates a registry preloaded with the default device catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::with_devices(default_catalog())
    }

    /// Creates a registry from a custom set of descriptors.
    ///
    /// Later descriptors with a duplicate id replace earlier ones.
    #[must_use]
    pub fn with_devices(devices: impl IntoIterator<Item = DeviceDescriptor>) -> Self {
        Self {
            devices: devices.into_iter().map(|d| (d.id.clone(), d)).collect(),
        }
    }

    /// Looks up a device by catalog id.
    #[must_use]
    pub fn get(&self, device_id: &str) -> Option<&DeviceDescriptor> {
        self.devices.get(device_id)
    }

    /// Returns all devices in deterministic (id) order.
    #[must_use]
    pub fn devices(&self) -> Vec<&DeviceDescriptor> {
        self.devices.values().collect()
    }

    /// Returns the number of catalog entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns `true` if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Returns the status topics the bridge subscribes to, one per device.
    #[must_use]
    pub fn status_topics(&self) -> Vec<String> {
        self.devices.values().map(DeviceDescriptor::status_topic).collect()
    }

    /// Resolves a logical command into a broker topic and payload.
    ///
    /// The topic is `<base>/set/<action>` with the action lowercased; the
    /// payload is `{"action": <action>}` merged with the command's params.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`] if the device id is not in the
    /// catalog.
    pub fn resolve(&self, command: &Command) -> Result<ResolvedCommand> {
        let device = self
            .get(&command.device_id)
            .ok_or_else(|| Error::DeviceNotFound(command.device_id.clone()))?;

        let action = command.action.to_lowercase();
        let topic = format!("{}/set/{action}", device.topic);

        let mut payload = json!({ "action": action });
        if let Value::Object(map) = &mut payload {
            for (key, value) in &command.params {
                map.insert(key.clone(), value.clone());
            }
        }

        Ok(ResolvedCommand { topic, payload })
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The built-in multi-device catalog.
fn default_catalog() -> Vec<DeviceDescriptor> {
    vec![
        DeviceDescriptor::new(
            "ac_living_001",
            "Living Room AC Pro",
            DeviceKind::AirConditioner,
            "living room",
            "home/livingroom/ac",
            &["power", "temperature", "mode", "fan", "swing", "timer", "energy"],
        ),
        DeviceDescriptor::new(
            "ac_bedroom_001",
            "Master Bedroom AC Ultra",
            DeviceKind::AirConditioner,
            "bedroom",
            "home/bedroom/ac",
            &["power", "temperature", "mode", "fan", "swing", "timer", "energy"],
        ),
        DeviceDescriptor::new(
            "light_living_001",
            "Living Room Smart Lights",
            DeviceKind::Light,
            "living room",
            "home/livingroom/lights",
            &["power", "brightness", "color", "scene", "energy"],
        ),
        DeviceDescriptor::new(
            "curtain_living_001",
            "Living Room Smart Curtains",
            DeviceKind::Curtain,
            "living room",
            "home/livingroom/curtains",
            &["position", "open", "close"],
        ),
        DeviceDescriptor::new(
            "security_main_001",
            "Main Security System",
            DeviceKind::Security,
            "main",
            "home/security/main",
            &["arming", "mode", "zones", "notify"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_catalog_is_loaded() {
        let registry = DeviceRegistry::new();
        assert_eq!(registry.len(), 5);
        assert!(registry.get("ac_living_001").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn status_topics_cover_every_device() {
        let registry = DeviceRegistry::new();
        let topics = registry.status_topics();
        assert_eq!(topics.len(), 5);
        assert!(topics.contains(&"home/livingroom/ac/status".to_string()));
        assert!(topics.contains(&"home/security/main/status".to_string()));
    }

    #[test]
    fn resolve_lowercases_action_and_builds_topic() {
        let registry = DeviceRegistry::new();
        let resolved = registry
            .resolve(&Command::new("ac_living_001", "Power_On"))
            .unwrap();

        assert_eq!(resolved.topic, "home/livingroom/ac/set/power_on");
        assert_eq!(resolved.payload, json!({"action": "power_on"}));
    }

    #[test]
    fn resolve_merges_params_into_payload() {
        let registry = DeviceRegistry::new();
        let command = Command::new("ac_living_001", "set_temperature")
            .with_param("target", json!(22));
        let resolved = registry.resolve(&command).unwrap();

        assert_eq!(resolved.topic, "home/livingroom/ac/set/set_temperature");
        assert_eq!(resolved.payload, json!({"action": "set_temperature", "target": 22}));
    }

    #[test]
    fn resolve_unknown_device_fails() {
        let registry = DeviceRegistry::new();
        let err = registry
            .resolve(&Command::new("ac_garage_404", "power_on"))
            .unwrap_err();
        assert!(matches!(err, Error::DeviceNotFound(id) if id == "ac_garage_404"));
    }

    #[test]
    fn custom_catalog() {
        let registry = DeviceRegistry::with_devices([DeviceDescriptor::new(
            "fan_office_001",
            "Office Fan",
            DeviceKind::Fan,
            "office",
            "home/office/fan",
            &["power", "speed"],
        )]);

        assert_eq!(registry.len(), 1);
        let device = registry.get("fan_office_001").unwrap();
        assert!(device.has_capability("speed"));
        assert!(!device.has_capability("color"));
        assert_eq!(device.status_topic(), "home/office/fan/status");
    }

    #[test]
    fn descriptor_kind_serializes_snake_case() {
        let device = DeviceDescriptor::new(
            "x",
            "X",
            DeviceKind::AirConditioner,
            "r",
            "home/r/x",
            &["power"],
        );
        let wire = serde_json::to_value(&device).unwrap();
        assert_eq!(wire["type"], "air_conditioner");
    }
}
