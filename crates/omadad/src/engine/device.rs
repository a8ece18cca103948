use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Serialize;

/// Device metadata an entity reports about the device it belongs to.
///
/// Entities sharing an identifier are grouped under the same [`Device`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceInfo {
    /// (domain, id) pairs identifying the device
    pub identifiers: BTreeSet<(String, String)>,
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub device_type: Option<String>,
    pub sw_version: Option<String>,
    pub suggested_area: Option<String>,
}

/// A device in the omadad system.
///
/// A device represents a physical or logical device that contains one or more entities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    pub id: String,
    pub identifiers: BTreeSet<(String, String)>,
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub device_type: Option<String>,
    pub sw_version: Option<String>,
    pub suggested_area: Option<String>,
    pub entity_ids: Vec<String>,
}

impl Device {
    pub fn new(id: String) -> Self {
        Self {
            id,
            identifiers: BTreeSet::new(),
            name: None,
            manufacturer: None,
            model: None,
            device_type: None,
            sw_version: None,
            suggested_area: None,
            entity_ids: Vec::new(),
        }
    }

    pub fn add_entity(&mut self, entity_id: String) {
        if !self.entity_ids.contains(&entity_id) {
            self.entity_ids.push(entity_id);
        }
    }

    pub fn remove_entity(&mut self, entity_id: &str) {
        self.entity_ids.retain(|id| id != entity_id);
    }

    /// Merge reported metadata; fields the info leaves unset are kept.
    fn merge(&mut self, info: &DeviceInfo) {
        self.identifiers.extend(info.identifiers.iter().cloned());
        merge_field(&mut self.name, &info.name);
        merge_field(&mut self.manufacturer, &info.manufacturer);
        merge_field(&mut self.model, &info.model);
        merge_field(&mut self.device_type, &info.device_type);
        merge_field(&mut self.sw_version, &info.sw_version);
        merge_field(&mut self.suggested_area, &info.suggested_area);
    }
}

fn merge_field(field: &mut Option<String>, value: &Option<String>) {
    if value.is_some() {
        field.clone_from(value);
    }
}

/// Registry of devices, keyed by internal id.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<String, Device>,
    next_id: u64,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an entity to the device described by `info`, creating the device
    /// when no existing one shares an identifier. Returns the device id, or
    /// `None` when the info carries no identifiers.
    pub fn register(&mut self, info: &DeviceInfo, entity_id: &str) -> Option<String> {
        if info.identifiers.is_empty() {
            return None;
        }

        let existing = self
            .devices
            .values()
            .find(|d| !d.identifiers.is_disjoint(&info.identifiers))
            .map(|d| d.id.clone());

        let id = match existing {
            Some(id) => id,
            None => {
                self.next_id += 1;
                format!("device_{}", self.next_id)
            }
        };

        let device = self
            .devices
            .entry(id.clone())
            .or_insert_with(|| Device::new(id.clone()));
        device.merge(info);
        device.add_entity(entity_id.to_string());

        Some(id)
    }

    /// Detach an entity from whichever device lists it. Devices stay
    /// registered even when they no longer have entities.
    pub fn detach_entity(&mut self, entity_id: &str) {
        for device in self.devices.values_mut() {
            device.remove_entity(entity_id);
        }
    }

    pub fn get(&self, id: &str) -> Option<&Device> {
        self.devices.get(id)
    }

    pub fn find(&self, domain: &str, identifier: &str) -> Option<&Device> {
        let key = (domain.to_string(), identifier.to_string());
        self.devices.values().find(|d| d.identifiers.contains(&key))
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Normalize a MAC address to the colon-delimited lowercase form.
///
/// Accepts `aa:bb:cc:dd:ee:ff`, `AA-BB-CC-DD-EE-FF`, `aabb.ccdd.eeff` and
/// bare 12-digit hex. Anything else is returned unchanged.
pub fn format_mac(mac: &str) -> String {
    if mac.len() == 17 && mac.matches(':').count() == 5 {
        return mac.to_lowercase();
    }

    let compact = if mac.len() == 17 && mac.matches('-').count() == 5 {
        mac.replace('-', "")
    } else if mac.len() == 14 && mac.matches('.').count() == 2 {
        mac.replace('.', "")
    } else {
        mac.to_string()
    };

    if compact.len() != 12 || !compact.chars().all(|c| c.is_ascii_hexdigit()) {
        return mac.to_string();
    }

    let lower = compact.to_lowercase();
    (0..12)
        .step_by(2)
        .map(|i| &lower[i..i + 2])
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(mac: &str) -> DeviceInfo {
        DeviceInfo {
            identifiers: BTreeSet::from([("omada".to_string(), mac.to_string())]),
            ..Default::default()
        }
    }

    #[test]
    fn test_format_mac() {
        assert_eq!(format_mac("AA-BB-CC-DD-EE-FF"), "aa:bb:cc:dd:ee:ff");
        assert_eq!(format_mac("AA:BB:CC:DD:EE:FF"), "aa:bb:cc:dd:ee:ff");
        assert_eq!(format_mac("aabb.ccdd.eeff"), "aa:bb:cc:dd:ee:ff");
        assert_eq!(format_mac("AABBCCDDEEFF"), "aa:bb:cc:dd:ee:ff");
        assert_eq!(format_mac("not-a-mac"), "not-a-mac");
        assert_eq!(format_mac("zzbbccddeeff"), "zzbbccddeeff");
    }

    #[test]
    fn test_register_groups_by_identifier() {
        let mut registry = DeviceRegistry::new();

        let tracker = DeviceInfo {
            name: Some("Omada Router1".to_string()),
            manufacturer: Some("TP-Link".to_string()),
            ..info("aa:bb:cc:dd:ee:ff")
        };
        let first = registry.register(&tracker, "device_tracker.omada_router1");
        let second = registry.register(&info("aa:bb:cc:dd:ee:ff"), "sensor.omada_router1_upload");
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);

        let device = registry.find("omada", "aa:bb:cc:dd:ee:ff").unwrap();
        // Identifier-only info must not clobber the tracker's metadata
        assert_eq!(device.name.as_deref(), Some("Omada Router1"));
        assert_eq!(device.manufacturer.as_deref(), Some("TP-Link"));
        assert_eq!(device.entity_ids.len(), 2);
    }

    #[test]
    fn test_register_without_identifiers() {
        let mut registry = DeviceRegistry::new();
        assert!(registry.register(&DeviceInfo::default(), "sensor.x").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_detach_entity() {
        let mut registry = DeviceRegistry::new();
        let id = registry.register(&info("11:22:33:44:55:66"), "device_tracker.a").unwrap();
        registry.detach_entity("device_tracker.a");
        assert!(registry.get(&id).unwrap().entity_ids.is_empty());
    }
}
