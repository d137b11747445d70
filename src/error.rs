// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `homelink` gateway.
//!
//! This module provides the error hierarchy for failures across the crate:
//! broker communication, payload parsing, and command resolution.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during broker communication.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred while parsing a payload.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A command referenced a device that is not in the catalog.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// The bridge has no active broker connection.
    #[error("bridge is not connected")]
    NotConnected,

    /// An event subscriber reported a failure.
    ///
    /// Produced by subscriber handlers; the bus logs and skips these
    /// rather than letting them stall delivery.
    #[error("subscriber error: {0}")]
    Subscriber(String),
}

/// Errors related to broker communication.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// MQTT connection or communication failed.
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Connection to the broker failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
}

/// Errors related to parsing payloads.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing or serialization failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_not_found_display() {
        let err = Error::DeviceNotFound("ac_hallway_009".to_string());
        assert_eq!(err.to_string(), "device not found: ac_hallway_009");
    }

    #[test]
    fn error_from_protocol_error() {
        let proto = ProtocolError::ConnectionFailed("broker unreachable".to_string());
        let err: Error = proto.into();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn error_from_parse_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: Error = ParseError::from(json_err).into();
        assert!(err.to_string().starts_with("parse error: JSON parse error"));
    }

    #[test]
    fn not_connected_display() {
        assert_eq!(Error::NotConnected.to_string(), "bridge is not connected");
    }
}
