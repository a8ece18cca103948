use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use super::entity::Platform;

/// A registered entity, kept across entity lifetimes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub entity_id: String,
    pub unique_id: String,
    pub platform: Platform,
    /// Integration domain that created the entry (e.g. "omada")
    pub domain: String,
    pub config_entry_id: String,
    #[serde(default)]
    pub original_name: Option<String>,
}

/// Registry mapping (platform, domain, config entry, unique_id) to entity ids.
///
/// Entries outlive the entities that created them, so an integration can
/// inspect what it registered on a previous run.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entries: BTreeMap<String, RegistryEntry>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = RegistryEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|e| (e.entity_id.clone(), e))
                .collect(),
        }
    }

    pub fn get(&self, entity_id: &str) -> Option<&RegistryEntry> {
        self.entries.get(entity_id)
    }

    /// Unique ids are scoped to a config entry, so two controllers reporting
    /// the same MAC get separate entities.
    pub fn entity_id_for(
        &self,
        platform: Platform,
        domain: &str,
        config_entry_id: &str,
        unique_id: &str,
    ) -> Option<&str> {
        self.entries
            .values()
            .find(|e| {
                e.platform == platform
                    && e.domain == domain
                    && e.config_entry_id == config_entry_id
                    && e.unique_id == unique_id
            })
            .map(|e| e.entity_id.as_str())
    }

    /// Return the entity id registered for the unique id within the config
    /// entry, registering a new one derived from `suggested_name` if there is
    /// none yet.
    pub fn get_or_create(
        &mut self,
        platform: Platform,
        domain: &str,
        unique_id: &str,
        config_entry_id: &str,
        suggested_name: &str,
    ) -> String {
        if let Some(entity_id) = self.entity_id_for(platform, domain, config_entry_id, unique_id) {
            return entity_id.to_string();
        }

        let entity_id = self.free_entity_id(platform, suggested_name);
        self.entries.insert(
            entity_id.clone(),
            RegistryEntry {
                entity_id: entity_id.clone(),
                unique_id: unique_id.to_string(),
                platform,
                domain: domain.to_string(),
                config_entry_id: config_entry_id.to_string(),
                original_name: Some(suggested_name.to_string()),
            },
        );
        entity_id
    }

    pub fn entries_for_config_entry(&self, config_entry_id: &str) -> Vec<RegistryEntry> {
        self.entries
            .values()
            .filter(|e| e.config_entry_id == config_entry_id)
            .cloned()
            .collect()
    }

    pub fn remove(&mut self, entity_id: &str) -> Option<RegistryEntry> {
        let removed = self.entries.remove(entity_id);
        if removed.is_none() {
            tracing::debug!("No registry entry to remove for {}", entity_id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn free_entity_id(&self, platform: Platform, name: &str) -> String {
        let mut object_id = slugify(name);
        if object_id.is_empty() {
            object_id = "unnamed".to_string();
        }

        let base = format!("{}.{}", platform, object_id);
        if !self.entries.contains_key(&base) {
            return base;
        }

        let mut n = 2;
        loop {
            let candidate = format!("{}_{}", base, n);
            if !self.entries.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Lowercase, with every run of non-alphanumeric characters collapsed into `_`.
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_end_matches('_').to_string()
}
