use std::collections::BTreeMap;

use tracing::debug;
use tracing::info;
use tracing::warn;

use super::device::DeviceRegistry;
use super::dispatcher::Dispatcher;
use super::dispatcher::Signal;
use super::dispatcher::Subscriber;
use super::dispatcher::SubscriptionId;
use super::entity::Entity;
use super::entity::Platform;
use super::entity::SignalOutcome;
use super::ownership::OwnershipTable;
use super::registry::EntityRegistry;
use super::state::EntityState;
use super::state::State;

/// A configured instance of an integration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub entry_id: String,
    pub domain: String,
    pub title: String,
}

/// A live entity and the bookkeeping needed to tear it down again.
struct EntityHandle {
    entry_id: String,
    platform: Platform,
    source_id: String,
    subscriptions: Vec<SubscriptionId>,
    entity: Box<dyn Entity>,
}

/// The host side of the entity contract.
///
/// Owns the live entities and their rendered states together with the
/// registries platform adapters consult while reconciling.
pub struct Host {
    pub registry: EntityRegistry,
    pub devices: DeviceRegistry,
    pub dispatcher: Dispatcher,
    pub ownership: OwnershipTable,
    entities: BTreeMap<String, EntityHandle>,
    states: BTreeMap<String, EntityState>,
}

impl Host {
    pub fn new() -> Self {
        Self::with_registry(EntityRegistry::new())
    }

    /// Create a host whose entity registry already holds entries from a prior run.
    pub fn with_registry(registry: EntityRegistry) -> Self {
        Self {
            registry,
            devices: DeviceRegistry::new(),
            dispatcher: Dispatcher::new(),
            ownership: OwnershipTable::new(),
            entities: BTreeMap::new(),
            states: BTreeMap::new(),
        }
    }

    /// Register a batch of new entities for `entry`.
    ///
    /// Each entity gets an entity id from the registry, claims ownership of its
    /// source, is attached to its device, subscribed to its signals and
    /// rendered once. Returns the entity ids that were added.
    pub fn add_entities(&mut self, entry: &ConfigEntry, entities: Vec<Box<dyn Entity>>) -> Vec<String> {
        let mut added = Vec::with_capacity(entities.len());

        for entity in entities {
            let platform = entity.platform();
            let unique_id = entity.unique_id();
            let entity_id = self.registry.get_or_create(
                platform,
                &entry.domain,
                &unique_id,
                &entry.entry_id,
                &entity.name(),
            );

            if self.entities.contains_key(&entity_id) {
                warn!(
                    "[{}] Entity {} ({}) already exists, skipping",
                    entry.entry_id, entity_id, unique_id
                );
                continue;
            }

            let source_id = entity.source_id().to_string();
            self.ownership
                .claim(&entry.entry_id, platform, &source_id, &entity_id);

            if let Some(info) = entity.device_info() {
                self.devices.register(&info, &entity_id);
            }

            let subscriptions = entity
                .subscriptions()
                .into_iter()
                .map(|signal| {
                    self.dispatcher.connect(
                        signal,
                        Subscriber::Entity {
                            entity_id: entity_id.clone(),
                        },
                    )
                })
                .collect();

            self.entities.insert(
                entity_id.clone(),
                EntityHandle {
                    entry_id: entry.entry_id.clone(),
                    platform,
                    source_id,
                    subscriptions,
                    entity,
                },
            );
            self.write_state(&entity_id);
            added.push(entity_id);
        }

        if !added.is_empty() {
            info!("[{}] Added {} entities", entry.entry_id, added.len());
            debug!("[{}] New entities: {:?}", entry.entry_id, added);
        }

        added
    }

    /// Route a signal to a live entity and carry out what it asks for.
    pub fn notify_entity(&mut self, entity_id: &str, signal: &Signal) {
        let Some(handle) = self.entities.get_mut(entity_id) else {
            debug!("Dropping {} for unknown entity {}", signal, entity_id);
            return;
        };

        match handle.entity.handle_signal(signal) {
            SignalOutcome::Ignore => {}
            SignalOutcome::WriteState => self.write_state(entity_id),
            SignalOutcome::Remove => {
                self.remove_entity(entity_id);
            }
        }
    }

    /// Render the entity's current state into the state table.
    pub fn write_state(&mut self, entity_id: &str) {
        let Some(handle) = self.entities.get(entity_id) else {
            return;
        };

        let entity = &handle.entity;
        let state = EntityState {
            entity_id: entity_id.to_string(),
            name: entity.name(),
            platform: handle.platform,
            state: entity.state_json(),
            unit_of_measurement: entity.unit_of_measurement().map(str::to_string),
            attributes: entity.attributes(),
        };
        self.states.insert(entity_id.to_string(), state);
    }

    /// Tear down a live entity and delete its registry entry.
    ///
    /// Returns false if no such entity is alive.
    pub fn remove_entity(&mut self, entity_id: &str) -> bool {
        if self.detach_entity(entity_id).is_none() {
            return false;
        }
        self.registry.remove(entity_id);
        info!("Removed entity {}", entity_id);
        true
    }

    /// Tear down every entity of a config entry and drop its subscriptions.
    ///
    /// Registry entries are kept so the next setup can sweep them.
    pub fn unload_entry(&mut self, entry_id: &str) -> usize {
        let dropped = self.dispatcher.disconnect_entry(entry_id);

        let entity_ids: Vec<String> = self
            .entities
            .iter()
            .filter(|(_, handle)| handle.entry_id == entry_id)
            .map(|(entity_id, _)| entity_id.clone())
            .collect();
        for entity_id in &entity_ids {
            self.detach_entity(entity_id);
        }
        self.ownership.clear_entry(entry_id);

        info!(
            "[{}] Unloaded {} entities, dropped {} subscriptions",
            entry_id,
            entity_ids.len(),
            dropped
        );
        entity_ids.len()
    }

    /// Update every polled entity and re-render it.
    pub fn poll(&mut self) {
        let polled: Vec<String> = self
            .entities
            .iter_mut()
            .filter(|(_, handle)| handle.entity.should_poll())
            .map(|(entity_id, handle)| {
                handle.entity.update();
                entity_id.clone()
            })
            .collect();

        for entity_id in &polled {
            self.write_state(entity_id);
        }
    }

    pub fn state(&self, entity_id: &str) -> Option<&EntityState> {
        self.states.get(entity_id)
    }

    pub fn snapshot(&self) -> State {
        State {
            entities: self.states.clone(),
        }
    }

    pub fn contains_entity(&self, entity_id: &str) -> bool {
        self.entities.contains_key(entity_id)
    }

    pub fn entity_ids(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    fn detach_entity(&mut self, entity_id: &str) -> Option<EntityHandle> {
        let handle = self.entities.remove(entity_id)?;

        for id in &handle.subscriptions {
            self.dispatcher.disconnect(*id);
        }
        self.ownership
            .release(&handle.entry_id, handle.platform, &handle.source_id, entity_id);
        self.devices.detach_entity(entity_id);
        self.states.remove(entity_id);

        Some(handle)
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        id: String,
        value: u32,
        outcome: SignalOutcome,
        polled: bool,
    }

    impl Counter {
        fn boxed(id: &str, outcome: SignalOutcome) -> Box<dyn Entity> {
            Box::new(Self {
                id: id.to_string(),
                value: 0,
                outcome,
                polled: true,
            })
        }
    }

    impl Entity for Counter {
        fn unique_id(&self) -> String {
            self.id.clone()
        }

        fn source_id(&self) -> &str {
            &self.id
        }

        fn platform(&self) -> Platform {
            Platform::Sensor
        }

        fn name(&self) -> String {
            format!("Counter {}", self.id)
        }

        fn state_json(&self) -> serde_json::Value {
            serde_json::json!(self.value)
        }

        fn should_poll(&self) -> bool {
            self.polled
        }

        fn update(&mut self) {
            self.value += 1;
        }

        fn subscriptions(&self) -> Vec<Signal> {
            vec![Signal::DataUpdated("home".to_string())]
        }

        fn handle_signal(&mut self, _signal: &Signal) -> SignalOutcome {
            self.outcome
        }
    }

    fn entry() -> ConfigEntry {
        ConfigEntry {
            entry_id: "home".to_string(),
            domain: "test".to_string(),
            title: "Home".to_string(),
        }
    }

    #[test]
    fn test_add_entities_registers_and_renders() {
        let mut host = Host::new();
        let added = host.add_entities(&entry(), vec![Counter::boxed("a", SignalOutcome::Ignore)]);

        assert_eq!(added, vec!["sensor.counter_a".to_string()]);
        assert!(host.ownership.owns("home", Platform::Sensor, "a"));
        assert_eq!(host.registry.len(), 1);
        assert_eq!(host.state("sensor.counter_a").unwrap().state, serde_json::json!(0));
        assert_eq!(
            host.dispatcher
                .subscriber_count(&Signal::DataUpdated("home".to_string())),
            1
        );
    }

    #[test]
    fn test_add_entities_skips_live_duplicate() {
        let mut host = Host::new();
        host.add_entities(&entry(), vec![Counter::boxed("a", SignalOutcome::Ignore)]);
        let added = host.add_entities(&entry(), vec![Counter::boxed("a", SignalOutcome::Ignore)]);

        assert!(added.is_empty());
        assert_eq!(host.entity_count(), 1);
    }

    #[test]
    fn test_signal_remove_deletes_registry_entry() {
        let mut host = Host::new();
        host.add_entities(&entry(), vec![Counter::boxed("a", SignalOutcome::Remove)]);

        host.notify_entity("sensor.counter_a", &Signal::DataUpdated("home".to_string()));

        assert!(!host.contains_entity("sensor.counter_a"));
        assert!(host.registry.is_empty());
        assert!(host.state("sensor.counter_a").is_none());
        assert!(!host.ownership.owns("home", Platform::Sensor, "a"));
        assert_eq!(
            host.dispatcher
                .subscriber_count(&Signal::DataUpdated("home".to_string())),
            0
        );
    }

    #[test]
    fn test_unload_entry_keeps_registry() {
        let mut host = Host::new();
        host.add_entities(
            &entry(),
            vec![
                Counter::boxed("a", SignalOutcome::Ignore),
                Counter::boxed("b", SignalOutcome::Ignore),
            ],
        );

        assert_eq!(host.unload_entry("home"), 2);
        assert_eq!(host.entity_count(), 0);
        assert_eq!(host.registry.len(), 2);
        assert!(host.snapshot().entities.is_empty());
    }

    #[test]
    fn test_poll_updates_polled_entities() {
        let mut host = Host::new();
        host.add_entities(&entry(), vec![Counter::boxed("a", SignalOutcome::Ignore)]);

        host.poll();
        host.poll();

        assert_eq!(host.state("sensor.counter_a").unwrap().state, serde_json::json!(2));
    }
}
