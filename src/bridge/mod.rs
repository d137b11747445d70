// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT bridge between the broker and the event bus.
//!
//! The bridge owns the broker connection. On [`start`](MqttBridge::start) it
//! creates the client, issues a QoS-1 subscription for every status topic in
//! the device catalog, and spawns the polling loop that services the
//! connection. Inbound messages are decoded and emitted onto the
//! [`EventBus`] as `mqtt_in` events; outbound publishes go to the broker and
//! are mirrored as `mqtt_out` events.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use homelink::bridge::{MqttBridge, MqttBridgeConfig};
//! use homelink::event::EventBus;
//! use homelink::registry::DeviceRegistry;
//! use serde_json::json;
//!
//! # async fn example() -> homelink::Result<()> {
//! let bus = EventBus::new();
//! let registry = Arc::new(DeviceRegistry::new());
//! let config = MqttBridgeConfig::new("192.168.1.50").with_port(1883);
//!
//! let bridge = MqttBridge::new(config, registry, bus);
//! bridge.start().await?;
//!
//! bridge
//!     .publish_command("home/livingroom/ac/set/power_on", json!({"action": "power_on"}))
//!     .await?;
//!
//! bridge.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::error::{Error, ParseError, ProtocolError, Result};
use crate::event::{EventBus, GatewayEvent};
use crate::registry::DeviceRegistry;

/// Global counter for generating unique client IDs.
static CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Default broker host when none is configured.
const DEFAULT_HOST: &str = "localhost";

/// Default broker port.
const DEFAULT_PORT: u16 = 1883;

/// Initial delay before a reconnect attempt.
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Upper bound for the reconnect delay.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Configuration for the bridge's broker connection.
#[derive(Debug, Clone)]
pub struct MqttBridgeConfig {
    host: String,
    port: u16,
    credentials: Option<(String, String)>,
    keep_alive: Duration,
}

impl MqttBridgeConfig {
    /// Creates a configuration for the given broker host.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Reads the configuration from the environment.
    ///
    /// Recognized variables: `MQTT_BROKER_HOST` (default `localhost`),
    /// `MQTT_BROKER_PORT` (default 1883), `MQTT_USERNAME` and
    /// `MQTT_PASSWORD` (credentials are only applied when the username is
    /// non-empty).
    #[must_use]
    pub fn from_env() -> Self {
        let host = std::env::var("MQTT_BROKER_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = std::env::var("MQTT_BROKER_PORT")
            .ok()
            .and_then(|raw| match raw.parse() {
                Ok(port) => Some(port),
                Err(_) => {
                    tracing::warn!(value = %raw, "unparseable MQTT_BROKER_PORT, using default");
                    None
                }
            })
            .unwrap_or(DEFAULT_PORT);

        let username = std::env::var("MQTT_USERNAME").unwrap_or_default();
        let credentials = if username.is_empty() {
            None
        } else {
            let password = std::env::var("MQTT_PASSWORD").unwrap_or_default();
            Some((username, password))
        };

        Self {
            host,
            port,
            credentials,
            keep_alive: Duration::from_secs(30),
        }
    }

    /// Sets the broker port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets authentication credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets the keep-alive interval (default: 30 seconds).
    #[must_use]
    pub fn with_keep_alive(mut self, duration: Duration) -> Self {
        self.keep_alive = duration;
        self
    }

    /// Returns the broker host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the broker port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns whether credentials are configured.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }
}

impl Default for MqttBridgeConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            credentials: None,
            keep_alive: Duration::from_secs(30),
        }
    }
}

/// Live connection state, present only between `start` and `stop`.
struct BridgeRuntime {
    client: AsyncClient,
    poll_task: JoinHandle<()>,
}

/// Bridge between the MQTT broker and the event bus.
///
/// Cheaply cloneable; clones share the same connection and lifecycle.
#[derive(Clone)]
pub struct MqttBridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    config: MqttBridgeConfig,
    registry: Arc<DeviceRegistry>,
    bus: EventBus,
    runtime: Mutex<Option<BridgeRuntime>>,
    connected: Arc<AtomicBool>,
}

impl MqttBridge {
    /// Creates a bridge. No connection is made until [`start`](Self::start).
    #[must_use]
    pub fn new(config: MqttBridgeConfig, registry: Arc<DeviceRegistry>, bus: EventBus) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                config,
                registry,
                bus,
                runtime: Mutex::new(None),
                connected: Arc::new(AtomicBool::new(false)),
            }),
        }
    }

    /// Starts the bridge: connects, subscribes, spawns the polling loop.
    ///
    /// The connect is fire-and-forget — this returns once the connection
    /// attempt and the status-topic subscriptions have been issued, without
    /// waiting for the broker to acknowledge them. The polling loop keeps
    /// the connection alive from here, reconnecting with exponential
    /// backoff on failure.
    ///
    /// Calling `start` while already running is a no-op (logged at warn
    /// level); this avoids duplicate subscriptions. Call
    /// [`stop`](Self::stop) first to restart.
    ///
    /// # Errors
    ///
    /// Returns an error if issuing a subscription fails locally.
    pub async fn start(&self) -> Result<()> {
        let mut runtime = self.inner.runtime.lock().await;
        if runtime.is_some() {
            tracing::warn!("bridge already started, ignoring start request");
            return Ok(());
        }

        let config = &self.inner.config;
        let counter = CLIENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let client_id = format!("homelink_{}_{}", std::process::id(), counter);

        let mut options = MqttOptions::new(&client_id, &config.host, config.port);
        options.set_keep_alive(config.keep_alive);
        options.set_clean_session(true);
        if let Some((username, password)) = &config.credentials {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, 10);

        // Status topics are derived from the catalog once, here; the
        // catalog is immutable for the process lifetime.
        let topics = self.inner.registry.status_topics();
        for topic in &topics {
            client
                .subscribe(topic, QoS::AtLeastOnce)
                .await
                .map_err(ProtocolError::Mqtt)?;
        }

        tracing::info!(
            host = %config.host,
            port = config.port,
            subscriptions = topics.len(),
            "starting MQTT bridge"
        );

        let poll_task = tokio::spawn(drive_connection(
            event_loop,
            client.clone(),
            topics,
            self.inner.bus.clone(),
            Arc::clone(&self.inner.connected),
        ));

        *runtime = Some(BridgeRuntime { client, poll_task });
        Ok(())
    }

    /// Stops the bridge: cancels the polling loop and closes the connection.
    ///
    /// Idempotent and safe from any state: before `start`, after a previous
    /// `stop`, or while running.
    ///
    /// # Errors
    ///
    /// Currently infallible; the `Result` keeps the lifecycle contract
    /// uniform with [`start`](Self::start).
    pub async fn stop(&self) -> Result<()> {
        let mut runtime = self.inner.runtime.lock().await;
        let Some(BridgeRuntime { client, poll_task }) = runtime.take() else {
            tracing::debug!("bridge not running, nothing to stop");
            return Ok(());
        };

        // Aborting the loop drops the event loop and with it the socket;
        // the disconnect request is best-effort bookkeeping after that.
        poll_task.abort();
        self.inner.connected.store(false, Ordering::Release);
        if let Err(error) = client.disconnect().await {
            tracing::debug!(error = %error, "disconnect after shutdown failed");
        }

        tracing::info!("MQTT bridge stopped");
        Ok(())
    }

    /// Publishes a command payload and mirrors it onto the bus.
    ///
    /// The payload is serialized to JSON bytes and published at QoS 1
    /// without retain; an `mqtt_out` event is then emitted for
    /// observability.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if the bridge is not started, or a
    /// protocol error if the publish cannot be queued.
    pub async fn publish_command(&self, topic: &str, payload: Value) -> Result<()> {
        let client = {
            let runtime = self.inner.runtime.lock().await;
            let Some(runtime) = runtime.as_ref() else {
                return Err(Error::NotConnected);
            };
            runtime.client.clone()
        };

        let bytes = serde_json::to_vec(&payload).map_err(ParseError::Json)?;

        tracing::debug!(topic = %topic, "publishing command");
        client
            .publish(topic, QoS::AtLeastOnce, false, bytes)
            .await
            .map_err(ProtocolError::Mqtt)?;

        self.inner
            .bus
            .emit(GatewayEvent::mqtt_out(topic, payload))
            .await;
        Ok(())
    }

    /// Returns whether the polling loop is active.
    pub async fn is_running(&self) -> bool {
        self.inner.runtime.lock().await.is_some()
    }

    /// Returns whether the broker has acknowledged the connection.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for MqttBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttBridge")
            .field("host", &self.inner.config.host)
            .field("port", &self.inner.config.port)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Services the broker connection until cancelled.
///
/// This loop is the sole driver of inbound message delivery: every received
/// publish is decoded and emitted onto the bus from here. Connection errors
/// are retried with exponential backoff; on a reconnect the status-topic
/// subscriptions are re-issued, since the session is clean.
async fn drive_connection(
    mut event_loop: EventLoop,
    client: AsyncClient,
    topics: Vec<String>,
    bus: EventBus,
    connected: Arc<AtomicBool>,
) {
    let mut backoff = INITIAL_BACKOFF;
    let mut first_connack = true;

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::info!(?connack, "connected to MQTT broker");
                connected.store(true, Ordering::Release);
                backoff = INITIAL_BACKOFF;

                // The initial subscriptions were issued by start(); only a
                // reconnect needs them re-sent.
                if first_connack {
                    first_connack = false;
                } else {
                    resubscribe(&client, &topics).await;
                }
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                tracing::debug!(?suback, "subscription acknowledged");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                tracing::debug!(topic = %publish.topic, "MQTT message received");
                let event = inbound_event(&publish.topic, &publish.payload);
                bus.emit(event).await;
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::info!("broker requested disconnect");
                connected.store(false, Ordering::Release);
            }
            Ok(_) => {}
            Err(error) => {
                connected.store(false, Ordering::Release);
                tracing::warn!(
                    error = %error,
                    retry_in = ?backoff,
                    "MQTT connection error, backing off"
                );
                sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
}

/// Re-issues the status-topic subscriptions after a reconnect.
async fn resubscribe(client: &AsyncClient, topics: &[String]) {
    for topic in topics {
        if let Err(error) = client.subscribe(topic, QoS::AtLeastOnce).await {
            tracing::warn!(topic = %topic, error = %error, "resubscribe failed");
        }
    }
    tracing::debug!(subscriptions = topics.len(), "resubscribed after reconnect");
}

/// Decodes an inbound broker message into an `mqtt_in` event.
///
/// Non-JSON payloads are wrapped under a `"raw"` key instead of being
/// dropped; inbound data is never silently discarded.
fn inbound_event(topic: &str, payload: &[u8]) -> GatewayEvent {
    let decoded = match serde_json::from_slice(payload) {
        Ok(value) => value,
        Err(_) => json!({ "raw": String::from_utf8_lossy(payload) }),
    };
    GatewayEvent::mqtt_in(topic, decoded)
}
