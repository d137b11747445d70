// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Realtime fan-out of bus events to live client connections.
//!
//! [`RealtimeFanout`] sits between the event bus and whatever transport the
//! embedding application uses for live clients (typically WebSockets). Each
//! registered client gets its own bounded channel; the fanout subscribes to
//! the bus once and rebroadcasts every event to every client. A slow client
//! loses events rather than stalling the bus pump, and closed clients are
//! pruned on the next broadcast.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::event::{EventBus, GatewayEvent};

/// Capacity of each client's event channel.
const CLIENT_CHANNEL_CAPACITY: usize = 64;

/// Unique identifier for a registered realtime client.
///
/// A wrapper around UUID v4 providing a distinct type for client
/// identification.
#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ClientId(Uuid);

impl ClientId {
    /// Creates a new unique client identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = &self.0.to_string()[..8];
        write!(f, "ClientId({short}...)")
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rebroadcasts every bus event to all registered clients.
///
/// Cheaply cloneable; clones share the same client set.
///
/// # Examples
///
/// ```
/// use homelink::event::{EventBus, GatewayEvent};
/// use homelink::fanout::RealtimeFanout;
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let bus = EventBus::new();
/// let fanout = RealtimeFanout::new();
/// fanout.attach(&bus);
///
/// let (client_id, mut events) = fanout.register();
/// bus.emit(GatewayEvent::mqtt_in("home/x/status", json!({"power": "on"})))
///     .await;
///
/// let event = events.recv().await.unwrap();
/// assert_eq!(event.topic(), "home/x/status");
/// fanout.unregister(client_id);
/// # }
/// ```
#[derive(Clone, Default)]
pub struct RealtimeFanout {
    clients: Arc<RwLock<HashMap<ClientId, mpsc::Sender<GatewayEvent>>>>,
}

impl RealtimeFanout {
    /// Creates a fanout with no clients.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a client and returns its id and event stream.
    #[must_use]
    pub fn register(&self) -> (ClientId, mpsc::Receiver<GatewayEvent>) {
        let id = ClientId::new();
        let (tx, rx) = mpsc::channel(CLIENT_CHANNEL_CAPACITY);
        self.clients.write().insert(id, tx);
        tracing::debug!(client = %id, "realtime client registered");
        (id, rx)
    }

    /// Removes a client.
    ///
    /// Returns `true` if the client was registered. Dropping the receiver
    /// has the same effect lazily: the client is pruned on the next
    /// broadcast.
    pub fn unregister(&self, id: ClientId) -> bool {
        let removed = self.clients.write().remove(&id).is_some();
        if removed {
            tracing::debug!(client = %id, "realtime client unregistered");
        }
        removed
    }

    /// Returns the number of registered clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    /// Sends an event to every registered client.
    ///
    /// Closed clients are pruned; a client whose channel is full loses this
    /// event (logged at warn level) so that realtime delivery never blocks
    /// the caller.
    pub fn broadcast(&self, event: &GatewayEvent) {
        let mut dead = Vec::new();
        {
            let clients = self.clients.read();
            for (id, tx) in clients.iter() {
                match tx.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(client = %id, "realtime client lagging, event dropped");
                    }
                    Err(TrySendError::Closed(_)) => dead.push(*id),
                }
            }
        }

        if !dead.is_empty() {
            let mut clients = self.clients.write();
            for id in dead {
                clients.remove(&id);
                tracing::debug!(client = %id, "pruned disconnected realtime client");
            }
        }
    }

    /// Subscribes this fanout to a bus.
    ///
    /// Every event emitted on the bus from now on is rebroadcast to the
    /// registered clients, in bus delivery order.
    pub fn attach(&self, bus: &EventBus) {
        let fanout = self.clone();
        bus.subscribe(move |event| {
            fanout.broadcast(&event);
            std::future::ready(Ok(()))
        });
    }
}

impl fmt::Debug for RealtimeFanout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeFanout")
            .field("clients", &self.client_count())
            .finish()
    }
}
