// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `HomeLink` - a home-automation gateway core.
//!
//! This library accepts natural-language and structured device commands,
//! relays them to physical devices over MQTT, and fans inbound device
//! telemetry out to realtime consumers through an ordered in-process event
//! bus.
//!
//! # Architecture
//!
//! - **Event bus** ([`event`]): every message crossing the gateway becomes
//!   a [`GatewayEvent`] on a single ordered queue, drained by one pump task
//!   that delivers to all subscribers sequentially — every consumer sees
//!   every event in the same order. A bounded log keeps the recent history
//!   for [`Gateway::logs`].
//! - **MQTT bridge** ([`bridge`]): owns the broker connection; subscribes
//!   to each catalog device's status topic, decodes inbound payloads (never
//!   dropping undecodable ones), and mirrors outbound publishes onto the
//!   bus. Reconnects with exponential backoff.
//! - **Registry** ([`registry`]): the static device catalog; resolves
//!   logical commands into broker topics and payloads.
//! - **Intent parsing** ([`intent`]): a swappable classifier turning free
//!   text into a structured [`ParsedCommand`]; a bilingual rule-based
//!   implementation is built in.
//! - **Realtime fanout** ([`fanout`]): per-client channels fed from the
//!   bus, for WebSocket-style live updates.
//! - **Gateway** ([`gateway`]): the composition root tying the above
//!   together behind one facade.
//!
//! # Quick Start
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
//!     // Follow everything that happens, in order:
//!     let (_client, mut events) = gateway.stream();
//!     tokio::spawn(async move {
//!         while let Some(event) = events.recv().await {
//!             println!("{}: {}", event.topic(), event.payload());
//!         }
//!     });
//!
//!     // Drive a device:
//!     let receipt = gateway
//!         .dispatch(Command::new("light_living_001", "power_on"))
//!         .await?;
//!     println!("queued on {}", receipt.topic);
//!
//!     gateway.stop().await
//! }
//! ```
//!
//! # Natural-Language Commands
//!
//! ```
//! use homelink::intent::{IntentClassifier, RuleClassifier};
//!
//! let classifier = RuleClassifier::new();
//! let parsed = classifier.classify("set the bedroom ac to 22", None);
//! assert_eq!(parsed.action, "set_temperature");
//! assert_eq!(parsed.params["target"], 22);
//! ```

pub mod bridge;
pub mod command;
pub mod error;
pub mod event;
pub mod fanout;
pub mod gateway;
pub mod intent;
pub mod registry;

pub use bridge::{MqttBridge, MqttBridgeConfig};
pub use command::{Command, CommandReceipt, ResolvedCommand};
pub use error::{Error, ParseError, ProtocolError, Result};
pub use event::{EventBus, EventLog, GatewayEvent};
pub use fanout::{ClientId, RealtimeFanout};
pub use gateway::{Gateway, GatewayBuilder};
pub use intent::{IntentClassifier, ParsedCommand, RuleClassifier};
pub use registry::{DeviceDescriptor, DeviceKind, DeviceRegistry};
