// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounded in-memory log of recent gateway events.

use std::collections::VecDeque;

use parking_lot::RwLock;

use super::GatewayEvent;

/// Default number of events retained by the log.
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// Fixed-capacity ring buffer of recent events.
///
/// The log always holds the most recent `min(capacity, total emitted)` events
/// in emission order; appending beyond capacity evicts the oldest entry. It is
/// owned by the [`EventBus`](super::EventBus) and mutated only through it.
/// Reads return a point-in-time snapshot and are safe to interleave with
/// emission.
///
/// The log is in-memory only and does not survive a process restart.
#[derive(Debug)]
pub struct EventLog {
    entries: RwLock<VecDeque<GatewayEvent>>,
    capacity: usize,
}

impl EventLog {
    /// Creates an empty log with the given capacity.
    ///
    /// A capacity of zero is treated as one: a log that can never hold an
    /// event has no observable tail.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Appends an event, evicting the oldest entry when at capacity.
    pub(crate) fn append(&self, event: GatewayEvent) {
        let mut entries = self.entries.write();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(event);
    }

    /// Returns the last `min(limit, len)` events, most-recent-last.
    #[must_use]
    pub fn tail(&self, limit: usize) -> Vec<GatewayEvent> {
        let entries = self.entries.read();
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

    /// Returns the number of retained events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if no events have been retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns the maximum number of retained events.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(n: usize) -> GatewayEvent {
        GatewayEvent::mqtt_in(format!("home/dev{n}/status"), json!({ "seq": n }))
    }

    #[test]
    fn tail_returns_events_in_emission_order() {
        let log = EventLog::with_capacity(10);
        for n in 0..5 {
            log.append(event(n));
        }

        let tail = log.tail(5);
        assert_eq!(tail.len(), 5);
        for (n, entry) in tail.iter().enumerate() {
            assert_eq!(entry.payload()["seq"], n);
        }
    }

    #[test]
    fn tail_with_smaller_limit_returns_last_k() {
        let log = EventLog::with_capacity(10);
        for n in 0..5 {
            log.append(event(n));
        }

        let tail = log.tail(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].payload()["seq"], 3);
        assert_eq!(tail[1].payload()["seq"], 4);
    }

    #[test]
    fn tail_with_larger_limit_returns_everything() {
        let log = EventLog::with_capacity(10);
        log.append(event(0));
        assert_eq!(log.tail(100).len(), 1);
    }

    #[test]
    fn append_beyond_capacity_evicts_oldest() {
        let log = EventLog::with_capacity(3);
        for n in 0..7 {
            log.append(event(n));
        }

        assert_eq!(log.len(), 3);
        let tail = log.tail(3);
        assert_eq!(tail[0].payload()["seq"], 4);
        assert_eq!(tail[2].payload()["seq"], 6);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let log = EventLog::with_capacity(0);
        log.append(event(0));
        assert_eq!(log.capacity(), 1);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn default_capacity() {
        let log = EventLog::default();
        assert_eq!(log.capacity(), DEFAULT_LOG_CAPACITY);
        assert!(log.is_empty());
    }
}
