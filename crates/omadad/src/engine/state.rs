use std::collections::BTreeMap;

use serde::Serialize;

use super::entity::Attributes;
use super::entity::Platform;

/// Rendered state of a single entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityState {
    pub entity_id: String,
    pub name: String,
    pub platform: Platform,
    pub state: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
    pub attributes: Attributes,
}

/// Centralized snapshot of every rendered entity, keyed by entity id.
#[derive(Debug, Clone, Default, Serialize)]
pub struct State {
    pub entities: BTreeMap<String, EntityState>,
}
