// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Natural-language intent classification.
//!
//! The gateway treats the intent parser as a swappable classifier behind
//! the [`IntentClassifier`] trait: text in, [`ParsedCommand`] out, no state.
//! The built-in [`RuleClassifier`] is a deterministic bilingual (en/fr)
//! lexicon matcher; richer backends (an LLM, a grammar) can be dropped in
//! behind the same trait.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Result of classifying one natural-language request.
///
/// This is the stable contract between the parser and its callers: the web
/// layer returns it verbatim, and a resolved `{device, action, params}`
/// triple drives command dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedCommand {
    /// High-level intent class (`device_control`, `climate`, `lighting`,
    /// `curtain`, `reporting`, or `unknown`).
    pub intent: String,
    /// Logical action within the intent.
    pub action: String,
    /// Device type the request targets, when one could be inferred.
    #[serde(default)]
    pub device: Option<String>,
    /// Room the request mentions, when one could be extracted.
    #[serde(default)]
    pub room: Option<String>,
    /// Action parameters (temperature target, timer seconds, scene name).
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Classifier confidence in `[0, 1]`.
    pub confidence: f32,
    /// Human-readable notes about unresolved ambiguity.
    #[serde(default)]
    pub ambiguities: Vec<String>,
}

impl ParsedCommand {
    /// Creates a parse result with no device, room, or params.
    #[must_use]
    pub fn new(intent: impl Into<String>, action: impl Into<String>, confidence: f32) -> Self {
        Self {
            intent: intent.into(),
            action: action.into(),
            device: None,
            room: None,
            params: Map::new(),
            confidence,
            ambiguities: Vec::new(),
        }
    }
}

/// A stateless text-to-command classifier.
///
/// Implementations must be pure: same text in, same parse out. The
/// `lang_hint` is advisory; classifiers may ignore it.
pub trait IntentClassifier: Send + Sync {
    /// Classifies one request.
    fn classify(&self, text: &str, lang_hint: Option<&str>) -> ParsedCommand;
}

/// English/French action keywords.
const TURN_ON: &[&str] = &["turn on", "switch on", "power on", "allumer"];
const TURN_OFF: &[&str] = &["turn off", "switch off", "power off", "éteindre", "eteindre"];
const OPEN: &[&str] = &["open", "ouvrir"];
const CLOSE: &[&str] = &["close", "fermer"];
const ENERGY: &[&str] = &["energy", "consumption", "usage", "énergie", "consommation"];

/// Known room names, both languages.
const ROOMS: &[&str] = &[
    "living room",
    "bedroom",
    "master bedroom",
    "office",
    "home office",
    "kitchen",
    "hallway",
    "salon",
    "chambre",
    "bureau",
    "cuisine",
];

/// Scene names recognized by the lighting rules.
const SCENES: &[&str] = &["movie", "reading", "party", "sleep", "work"];

/// Matches a temperature target like "to 22" / "à 21".
static TEMPERATURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:to|à|a)\s*(\d{1,2})").expect("valid temperature pattern"));

/// Matches a duration like "30 minutes" / "2 hours" / "1 heure".
static TIMER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s*(min|minute|minutes|hr|hour|heures?)").expect("valid timer pattern")
});

/// Deterministic rule-based classifier.
///
/// # Examples
///
/// ```
/// use homelink::intent::{IntentClassifier, RuleClassifier};
///
/// let classifier = RuleClassifier::new();
/// let parsed = classifier.classify("turn on the living room ac", None);
///
/// assert_eq!(parsed.intent, "device_control");
/// assert_eq!(parsed.action, "power_on");
/// assert_eq!(parsed.device.as_deref(), Some("air_conditioner"));
/// assert_eq!(parsed.room.as_deref(), Some("living room"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleClassifier;

impl RuleClassifier {
    /// Creates the classifier.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl IntentClassifier for RuleClassifier {
    fn classify(&self, text: &str, _lang_hint: Option<&str>) -> ParsedCommand {
        let lowered = text.to_lowercase();
        let t = lowered.trim();

        let room = ROOMS.iter().find(|r| t.contains(*r)).map(|r| (*r).to_string());
        let device = detect_device(t);

        // Power control.
        if contains_any(t, TURN_ON) && device.is_some() {
            let mut parsed = ParsedCommand::new("device_control", "power_on", 0.85);
            parsed.device = device.map(ToString::to_string);
            parsed.room = room;
            return parsed;
        }
        if contains_any(t, TURN_OFF) && device.is_some() {
            let mut parsed = ParsedCommand::new("device_control", "power_off", 0.85);
            parsed.device = device.map(ToString::to_string);
            parsed.room = room;
            return parsed;
        }

        // Temperature target.
        if matches!(device, Some("air_conditioner" | "thermostat"))
            && let Some(caps) = TEMPERATURE.captures(t)
            && let Ok(target) = caps[1].parse::<u32>()
        {
            let mut parsed = ParsedCommand::new("climate", "set_temperature", 0.8);
            parsed.device = device.map(ToString::to_string);
            parsed.room = room;
            parsed.params.insert("target".to_string(), json!(target));
            return parsed;
        }

        // Swing timer.
        if t.contains("swing") || t.contains("oscillation") || t.contains("balayage") {
            let seconds = TIMER
                .captures(t)
                .and_then(|caps| {
                    let value = caps[1].parse::<u64>().ok()?;
                    let unit = &caps[2];
                    if unit.starts_with("hr") || unit.starts_with("hour") || unit.starts_with("heur")
                    {
                        Some(value * 3600)
                    } else {
                        Some(value * 60)
                    }
                })
                .filter(|&s| s > 0)
                .unwrap_or(1800);

            let mut parsed = ParsedCommand::new("climate", "set_swing", 0.75);
            parsed.device = Some(device.unwrap_or("air_conditioner").to_string());
            parsed.room = room;
            parsed.params.insert("timer".to_string(), json!(seconds));
            return parsed;
        }

        // Lighting scenes.
        if t.contains("scene") || t.contains("scène") || SCENES.iter().any(|s| t.contains(s)) {
            let scene = SCENES.iter().find(|s| t.contains(*s)).copied().unwrap_or("movie");
            let mut parsed = ParsedCommand::new("lighting", "set_scene", 0.7);
            parsed.device = Some("light".to_string());
            parsed.room = room;
            parsed.params.insert("scene".to_string(), json!(scene));
            return parsed;
        }

        // Energy reporting.
        if contains_any(t, ENERGY) {
            return ParsedCommand::new("reporting", "energy_report", 0.8);
        }

        // Curtains.
        if device == Some("curtain") {
            if contains_any(t, OPEN) {
                let mut parsed = ParsedCommand::new("curtain", "open", 0.8);
                parsed.device = Some("curtain".to_string());
                parsed.room = room;
                return parsed;
            }
            if contains_any(t, CLOSE) {
                let mut parsed = ParsedCommand::new("curtain", "close", 0.8);
                parsed.device = Some("curtain".to_string());
                parsed.room = room;
                return parsed;
            }
        }

        let mut parsed = ParsedCommand::new("unknown", "unknown", 0.4);
        parsed.ambiguities.push(
            "Could not infer device/action. Please clarify room/device.".to_string(),
        );
        parsed
    }
}

/// Infers the targeted device type from keywords.
fn detect_device(t: &str) -> Option<&'static str> {
    if ["ac", "air condition", "climatiseur"].iter().any(|w| t.contains(w)) {
        Some("air_conditioner")
    } else if ["light", "lamp", "lumière", "lumiere"].iter().any(|w| t.contains(w)) {
        Some("light")
    } else if ["curtain", "blind", "rideau"].iter().any(|w| t.contains(w)) {
        Some("curtain")
    } else if ["fan", "ventilateur"].iter().any(|w| t.contains(w)) {
        Some("fan")
    } else if ["security", "alarm", "sécurité", "securite"].iter().any(|w| t.contains(w)) {
        Some("security")
    } else {
        None
    }
}

fn contains_any(t: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| t.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> ParsedCommand {
        RuleClassifier::new().classify(text, None)
    }

    #[test]
    fn power_on_with_device_and_room() {
        let parsed = classify("Turn on the living room AC");
        assert_eq!(parsed.intent, "device_control");
        assert_eq!(parsed.action, "power_on");
        assert_eq!(parsed.device.as_deref(), Some("air_conditioner"));
        assert_eq!(parsed.room.as_deref(), Some("living room"));
        assert!((parsed.confidence - 0.85).abs() < f32::EPSILON);
    }

    #[test]
    fn power_off_french() {
        let parsed = classify("éteindre la lumière");
        assert_eq!(parsed.action, "power_off");
        assert_eq!(parsed.device.as_deref(), Some("light"));
    }

    #[test]
    fn power_verbs_without_device_fall_through() {
        let parsed = classify("turn on something");
        assert_eq!(parsed.intent, "unknown");
    }

    #[test]
    fn temperature_target() {
        let parsed = classify("set the bedroom ac to 22");
        assert_eq!(parsed.intent, "climate");
        assert_eq!(parsed.action, "set_temperature");
        assert_eq!(parsed.params["target"], 22);
        assert_eq!(parsed.room.as_deref(), Some("bedroom"));
    }

    #[test]
    fn swing_with_minutes() {
        let parsed = classify("ac swing for 30 minutes");
        assert_eq!(parsed.action, "set_swing");
        assert_eq!(parsed.params["timer"], 1800);
        assert_eq!(parsed.device.as_deref(), Some("air_conditioner"));
    }

    #[test]
    fn swing_with_hours() {
        let parsed = classify("swing for 2 hours");
        assert_eq!(parsed.params["timer"], 7200);
        // No device keyword present, so the climate default applies.
        assert_eq!(parsed.device.as_deref(), Some("air_conditioner"));
    }

    #[test]
    fn swing_without_duration_defaults() {
        let parsed = classify("enable swing");
        assert_eq!(parsed.params["timer"], 1800);
    }

    #[test]
    fn scene_request() {
        let parsed = classify("movie scene in the living room");
        assert_eq!(parsed.intent, "lighting");
        assert_eq!(parsed.action, "set_scene");
        assert_eq!(parsed.params["scene"], "movie");
        assert_eq!(parsed.device.as_deref(), Some("light"));
    }

    #[test]
    fn energy_report() {
        let parsed = classify("show me the energy consumption");
        assert_eq!(parsed.intent, "reporting");
        assert_eq!(parsed.action, "energy_report");
        assert!(parsed.params.is_empty());
    }

    #[test]
    fn curtain_open_and_close() {
        let open = classify("open the curtains");
        assert_eq!(open.intent, "curtain");
        assert_eq!(open.action, "open");

        let close = classify("fermer les rideaux");
        assert_eq!(close.action, "close");
        assert_eq!(close.device.as_deref(), Some("curtain"));
    }

    #[test]
    fn unresolvable_text_is_unknown() {
        let parsed = classify("make me a sandwich");
        assert_eq!(parsed.intent, "unknown");
        assert_eq!(parsed.action, "unknown");
        assert!(!parsed.ambiguities.is_empty());
        assert!((parsed.confidence - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn parsed_command_serializes_contract_fields() {
        let parsed = classify("turn on the lights");
        let wire = serde_json::to_value(&parsed).unwrap();
        assert_eq!(wire["intent"], "device_control");
        assert_eq!(wire["device"], "light");
        assert!(wire["ambiguities"].as_array().unwrap().is_empty());
    }
}
