//! Entity abstraction for omadad
//!
//! Everything an integration hands to the host (presence trackers, sensors, ...)
//! implements the Entity trait. The host owns the boxed entity and asks it to
//! render itself whenever a signal or poll requires it.

use serde::Deserialize;
use serde::Serialize;
use strum::AsRefStr;
use strum::Display;

use super::device::DeviceInfo;
use super::dispatcher::Signal;

/// Platform an entity is registered under.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Platform {
    DeviceTracker,
    Sensor,
}

/// Extra state attributes rendered next to an entity's state.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// What the host should do once an entity has handled a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// Nothing changed that needs rendering.
    Ignore,
    /// Re-render the entity's state.
    WriteState,
    /// Tear the entity down and delete its registry entry.
    Remove,
}

/// Base trait that all entities must implement
pub trait Entity: Send + Sync {
    /// Identifier that is stable across restarts, unique within the platform.
    fn unique_id(&self) -> String;

    /// Identifier of the remote object this entity represents.
    ///
    /// Several entities may share a source (e.g. the four telemetry sensors of
    /// one device); the host tracks ownership per source.
    fn source_id(&self) -> &str;

    /// Return the platform of this entity
    fn platform(&self) -> Platform;

    fn name(&self) -> String;

    /// Serialize the current state to JSON
    fn state_json(&self) -> serde_json::Value;

    fn attributes(&self) -> Attributes {
        Attributes::new()
    }

    fn unit_of_measurement(&self) -> Option<&'static str> {
        None
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        None
    }

    /// Whether the host must call [`Entity::update`] on every poll cycle.
    /// Entities that return false are push-only and rely on signals.
    fn should_poll(&self) -> bool {
        false
    }

    /// Fetch new state for polled entities.
    fn update(&mut self) {}

    /// Signals the host should route to this entity while it is alive.
    fn subscriptions(&self) -> Vec<Signal> {
        Vec::new()
    }

    fn handle_signal(&mut self, _signal: &Signal) -> SignalOutcome {
        SignalOutcome::Ignore
    }
}

/// Render a serializable attribute record into an attribute map.
///
/// Records that do not serialize to a JSON object yield an empty map.
pub fn attributes_from<T: Serialize>(record: &T) -> Attributes {
    match serde_json::to_value(record) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => Attributes::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Record {
        wireless: bool,
        last_seen: Option<i64>,
    }

    #[test]
    fn test_platform_names() {
        assert_eq!(Platform::DeviceTracker.to_string(), "device_tracker");
        assert_eq!(Platform::Sensor.as_ref(), "sensor");
    }

    #[test]
    fn test_attributes_from_record() {
        let attrs = attributes_from(&Record {
            wireless: true,
            last_seen: None,
        });
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs["wireless"], serde_json::Value::Bool(true));
        assert!(attrs["last_seen"].is_null());
    }

    #[test]
    fn test_attributes_from_non_object() {
        assert!(attributes_from(&42).is_empty());
    }
}
