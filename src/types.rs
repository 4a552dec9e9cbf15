//! Tracked event types.
//!
//! This module defines the fixed event vocabulary of the crate. There are
//! exactly two event kinds, each with a fixed property schema; events are
//! only built through the schema constructors and are immutable afterwards.
//!
//! The property names (`"First Time"`, `"Count"`, `"Score"`, `"Game Count"`)
//! are a wire contract with the downstream analytics backends and must not
//! change.

use std::collections::BTreeMap;

use serde::Serialize;

/// Name of a tracked event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventName {
    AppLaunched,
    GamePlayed,
}

impl EventName {
    /// The event name as sent to analytics backends.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EventName::AppLaunched => "App Launched",
            EventName::GamePlayed => "Game Played",
        }
    }
}

/// A property value carried by a tracked event.
///
/// The fixed schemas only use booleans and integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
}

/// An immutable tracked event: a name plus its property map.
///
/// Consumed by [`Provider::track`](crate::provider::Provider::track); the
/// facade constructs one event per tracking call and fans it out to every
/// active provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedEvent {
    name: EventName,
    properties: BTreeMap<&'static str, PropertyValue>,
}

impl TrackedEvent {
    /// Builds an `App Launched` event with the fixed
    /// `{"First Time": bool, "Count": int}` schema.
    #[must_use]
    pub fn app_launched(first_time: bool, count: i64) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert("First Time", PropertyValue::Bool(first_time));
        properties.insert("Count", PropertyValue::Int(count));
        Self {
            name: EventName::AppLaunched,
            properties,
        }
    }

    /// Builds a `Game Played` event with the fixed
    /// `{"Score": int, "Game Count": int}` schema.
    #[must_use]
    pub fn game_played(score: i64, game_count: i64) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert("Score", PropertyValue::Int(score));
        properties.insert("Game Count", PropertyValue::Int(game_count));
        Self {
            name: EventName::GamePlayed,
            properties,
        }
    }

    /// The event name.
    #[must_use]
    pub fn name(&self) -> EventName {
        self.name
    }

    /// The property map, in stable name order.
    #[must_use]
    pub fn properties(&self) -> &BTreeMap<&'static str, PropertyValue> {
        &self.properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_match_wire_contract() {
        assert_eq!(EventName::AppLaunched.as_str(), "App Launched");
        assert_eq!(EventName::GamePlayed.as_str(), "Game Played");
    }

    #[test]
    fn property_value_serializes_untagged() {
        assert_eq!(
            serde_json::to_string(&PropertyValue::Bool(true)).unwrap(),
            "true"
        );
        assert_eq!(
            serde_json::to_string(&PropertyValue::Int(42)).unwrap(),
            "42"
        );
    }

    #[test]
    fn app_launched_has_fixed_schema() {
        let event = TrackedEvent::app_launched(true, 1);

        assert_eq!(event.name(), EventName::AppLaunched);
        assert_eq!(event.properties().len(), 2);
        assert_eq!(
            event.properties().get("First Time"),
            Some(&PropertyValue::Bool(true))
        );
        assert_eq!(
            event.properties().get("Count"),
            Some(&PropertyValue::Int(1))
        );
    }

    #[test]
    fn game_played_has_fixed_schema() {
        let event = TrackedEvent::game_played(1337, 7);

        assert_eq!(event.name(), EventName::GamePlayed);
        assert_eq!(event.properties().len(), 2);
        assert_eq!(
            event.properties().get("Score"),
            Some(&PropertyValue::Int(1337))
        );
        assert_eq!(
            event.properties().get("Game Count"),
            Some(&PropertyValue::Int(7))
        );
    }

    #[test]
    fn properties_serialize_with_exact_names() {
        let event = TrackedEvent::app_launched(false, 3);
        let json = serde_json::to_value(event.properties()).unwrap();

        assert_eq!(json["First Time"], false);
        assert_eq!(json["Count"], 3);
    }

    #[test]
    fn events_with_same_values_are_equal() {
        let a = TrackedEvent::game_played(100, 2);
        let b = TrackedEvent::game_played(100, 2);
        let c = TrackedEvent::game_played(100, 3);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
