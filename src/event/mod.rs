// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event system: the ordered fan-out bus and its bounded log.
//!
//! Every message crossing the gateway — inbound device telemetry and
//! outbound command publishes alike — becomes a [`GatewayEvent`] emitted
//! onto the [`EventBus`]. The bus serializes all producers into one ordered
//! queue, keeps the most recent events in the [`EventLog`], and fans each
//! event out to every subscriber from a single pump task, so all consumers
//! observe the same delivery order.
//!
//! # Examples
//!
//! ```
//! use homelink::event::{EventBus, GatewayEvent};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = EventBus::new();
//!
//! bus.subscribe(|event: GatewayEvent| async move {
//!     println!("{}: {}", event.topic(), event.payload());
//!     Ok(())
//! });
//!
//! bus.emit(GatewayEvent::mqtt_in("home/livingroom/ac/status", json!({"power": "on"})))
//!     .await;
//! # }
//! ```

mod event_bus;
mod event_log;
mod gateway_event;

pub use event_bus::{DEFAULT_QUEUE_CAPACITY, EventBus};
pub use event_log::{DEFAULT_LOG_CAPACITY, EventLog};
pub use gateway_event::GatewayEvent;
