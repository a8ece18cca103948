use std::collections::BTreeMap;
use std::collections::BTreeSet;

use super::entity::Platform;

/// Which live entities each (config entry, platform) owns, grouped by source.
///
/// A source (e.g. a MAC address) is owned while at least one live entity
/// created for it remains. Claims are made when entities are added and
/// released when they are torn down, so a source can be recreated later.
#[derive(Debug, Default)]
pub struct OwnershipTable {
    owners: BTreeMap<(String, Platform), BTreeMap<String, BTreeSet<String>>>,
}

impl OwnershipTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&mut self, entry_id: &str, platform: Platform, source_id: &str, entity_id: &str) {
        self.owners
            .entry((entry_id.to_string(), platform))
            .or_default()
            .entry(source_id.to_string())
            .or_default()
            .insert(entity_id.to_string());
    }

    /// Release one entity's claim. Returns true when the source is no longer owned.
    pub fn release(
        &mut self,
        entry_id: &str,
        platform: Platform,
        source_id: &str,
        entity_id: &str,
    ) -> bool {
        let key = (entry_id.to_string(), platform);
        let Some(sources) = self.owners.get_mut(&key) else {
            return true;
        };

        if let Some(entities) = sources.get_mut(source_id) {
            entities.remove(entity_id);
            if !entities.is_empty() {
                return false;
            }
        }

        sources.remove(source_id);
        if sources.is_empty() {
            self.owners.remove(&key);
        }
        true
    }

    pub fn owns(&self, entry_id: &str, platform: Platform, source_id: &str) -> bool {
        self.owners
            .get(&(entry_id.to_string(), platform))
            .is_some_and(|sources| sources.contains_key(source_id))
    }

    pub fn reset(&mut self, entry_id: &str, platform: Platform) {
        self.owners.remove(&(entry_id.to_string(), platform));
    }

    pub fn clear_entry(&mut self, entry_id: &str) {
        self.owners.retain(|(owner, _), _| owner != entry_id);
    }
}
