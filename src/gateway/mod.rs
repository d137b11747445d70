// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Gateway facade wiring the bus, bridge, registry, classifier, and fanout.
//!
//! This is the composition root: instead of module-scope singletons, every
//! collaborator is constructed here and handed its dependencies explicitly,
//! and the process entry point owns the lifecycle through
//! [`start`](Gateway::start)/[`stop`](Gateway::stop).
//!
//! # Examples
//!
//! ```no_run
//! use homelink::Gateway;
//! use homelink::command::Command;
//!
//! #[tokio::main]
//! async fn main() -> homelink::Result<()> {
//!     let gateway = Gateway::builder().build();
//!     gateway.start().await?;
//!
//!     // Structured dispatch (e.g. from a web handler):
//!     let receipt = gateway.dispatch(Command::new("ac_living_001", "power_on")).await?;
//!     println!("queued on {}", receipt.topic);
//!
//!     // Natural-language parse:
//!     let parsed = gateway.parse("turn off the bedroom lights", None);
//!     println!("{parsed:?}");
//!
//!     gateway.stop().await
//! }
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::bridge::{MqttBridge, MqttBridgeConfig};
use crate::command::{Command, CommandReceipt};
use crate::error::Result;
use crate::event::{
    DEFAULT_LOG_CAPACITY, DEFAULT_QUEUE_CAPACITY, EventBus, GatewayEvent,
};
use crate::fanout::{ClientId, RealtimeFanout};
use crate::intent::{IntentClassifier, ParsedCommand, RuleClassifier};
use crate::registry::{DeviceDescriptor, DeviceRegistry};

/// The assembled home-automation gateway.
pub struct Gateway {
    registry: Arc<DeviceRegistry>,
    bus: EventBus,
    bridge: MqttBridge,
    fanout: RealtimeFanout,
    classifier: Arc<dyn IntentClassifier>,
}

impl Gateway {
    /// Creates a builder with default collaborators.
    #[must_use]
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::default()
    }

    /// Starts the broker bridge.
    ///
    /// # Errors
    ///
    /// Propagates bridge start failures.
    pub async fn start(&self) -> Result<()> {
        self.bridge.start().await
    }

    /// Stops the broker bridge. Idempotent.
    ///
    /// # Errors
    ///
    /// Propagates bridge stop failures.
    pub async fn stop(&self) -> Result<()> {
        self.bridge.stop().await
    }

    /// Classifies a natural-language request.
    #[must_use]
    pub fn parse(&self, text: &str, lang_hint: Option<&str>) -> ParsedCommand {
        self.classifier.classify(text, lang_hint)
    }

    /// Resolves a command against the catalog and publishes it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`](crate::Error::DeviceNotFound) for
    /// an unknown device id (nothing is published or emitted), or a bridge
    /// error if the publish fails.
    pub async fn dispatch(&self, command: Command) -> Result<CommandReceipt> {
        let resolved = self.registry.resolve(&command)?;

        tracing::info!(
            device = %command.device_id,
            topic = %resolved.topic,
            "dispatching command"
        );
        self.bridge
            .publish_command(&resolved.topic, resolved.payload.clone())
            .await?;

        Ok(CommandReceipt::queued(resolved))
    }

    /// Returns the device catalog.
    #[must_use]
    pub fn devices(&self) -> Vec<&DeviceDescriptor> {
        self.registry.devices()
    }

    /// Returns the most recent events, most-recent-last.
    #[must_use]
    pub fn logs(&self, limit: usize) -> Vec<GatewayEvent> {
        self.bus.tail(limit)
    }

    /// Registers a realtime client and returns its event stream.
    ///
    /// The stream receives every gateway event from now on, in bus
    /// delivery order.
    #[must_use]
    pub fn stream(&self) -> (ClientId, mpsc::Receiver<GatewayEvent>) {
        self.fanout.register()
    }

    /// Returns the event bus, for additional subscribers.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Returns the bridge.
    #[must_use]
    pub fn bridge(&self) -> &MqttBridge {
        &self.bridge
    }

    /// Returns the realtime fanout.
    #[must_use]
    pub fn fanout(&self) -> &RealtimeFanout {
        &self.fanout
    }

    /// Returns the device registry.
    #[must_use]
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("devices", &self.registry.len())
            .field("bridge", &self.bridge)
            .finish()
    }
}

/// Builder for [`Gateway`].
///
/// All collaborators are defaulted: the built-in catalog, the rule-based
/// classifier, broker settings from [`MqttBridgeConfig::default`].
pub struct GatewayBuilder {
    registry: DeviceRegistry,
    classifier: Arc<dyn IntentClassifier>,
    mqtt: MqttBridgeConfig,
    log_capacity: usize,
    queue_capacity: usize,
}

impl GatewayBuilder {
    /// Sets the device catalog.
    #[must_use]
    pub fn registry(mut self, registry: DeviceRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Sets the intent classifier.
    #[must_use]
    pub fn classifier(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Sets the broker configuration.
    #[must_use]
    pub fn mqtt(mut self, config: MqttBridgeConfig) -> Self {
        self.mqtt = config;
        self
    }

    /// Sets the event log capacity.
    #[must_use]
    pub fn log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    /// Sets the bus delivery-queue capacity.
    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Assembles the gateway.
    ///
    /// Must be called from within a tokio runtime (the bus pump task is
    /// spawned here). No broker connection is made until
    /// [`Gateway::start`].
    #[must_use]
    pub fn build(self) -> Gateway {
        let registry = Arc::new(self.registry);
        let bus = EventBus::with_capacities(self.log_capacity, self.queue_capacity);
        let bridge = MqttBridge::new(self.mqtt, Arc::clone(&registry), bus.clone());

        let fanout = RealtimeFanout::new();
        fanout.attach(&bus);

        Gateway {
            registry,
            bus,
            bridge,
            fanout,
            classifier: self.classifier,
        }
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self {
            registry: DeviceRegistry::new(),
            classifier: Arc::new(RuleClassifier::new()),
            mqtt: MqttBridgeConfig::default(),
            log_capacity: DEFAULT_LOG_CAPACITY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    #[tokio::test]
    async fn builder_defaults() {
        let gateway = Gateway::builder().build();
        assert_eq!(gateway.devices().len(), 5);
        assert!(gateway.logs(10).is_empty());
        assert!(!gateway.bridge().is_connected());
    }

    #[tokio::test]
    async fn dispatch_unknown_device_fails_without_emission() {
        let gateway = Gateway::builder().build();

        let err = gateway
            .dispatch(Command::new("ac_garage_404", "power_on"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DeviceNotFound(_)));
        assert!(gateway.logs(10).is_empty());
    }

    #[tokio::test]
    async fn dispatch_without_start_reports_not_connected() {
        let gateway = Gateway::builder().build();

        let err = gateway
            .dispatch(Command::new("ac_living_001", "power_on"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }

    #[tokio::test]
    async fn parse_uses_the_classifier() {
        let gateway = Gateway::builder().build();
        let parsed = gateway.parse("turn on the living room ac", None);
        assert_eq!(parsed.action, "power_on");
    }

    #[tokio::test]
    async fn stream_receives_bus_events() {
        let gateway = Gateway::builder().build();
        let (client_id, mut events) = gateway.stream();

        gateway
            .bus()
            .emit(GatewayEvent::mqtt_in("home/x/status", json!({"power": "on"})))
            .await;

        let event = tokio::time::timeout(std::time::Duration::from_secs(2), events.recv())
            .await
            .expect("timed out waiting for event")
            .unwrap();
        assert_eq!(event.topic(), "home/x/status");

        assert!(gateway.fanout().unregister(client_id));
    }

    #[tokio::test]
    async fn lifecycle_is_idempotent_without_broker() {
        let gateway = Gateway::builder()
            .mqtt(MqttBridgeConfig::new("127.0.0.1").with_port(1))
            .build();

        assert!(gateway.stop().await.is_ok());
        gateway.start().await.unwrap();
        gateway.start().await.unwrap();
        gateway.stop().await.unwrap();
        gateway.stop().await.unwrap();
    }
}
