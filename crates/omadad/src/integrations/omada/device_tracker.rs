//! Presence trackers for Omada clients and devices.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use tracing::info;

use super::controller::ssid_allowed;
use super::controller::Controller;
use super::model::Client;
use super::model::Device;
use super::naming::display_name;
use super::DOMAIN;
use crate::engine::attributes_from;
use crate::engine::Attributes;
use crate::engine::ConfigEntry;
use crate::engine::DeviceInfo;
use crate::engine::Entity;
use crate::engine::Host;
use crate::engine::Platform;
use crate::engine::PlatformAdapter;
use crate::engine::Signal;
use crate::engine::SignalOutcome;
use crate::engine::Subscriber;

pub const SOURCE_TYPE_ROUTER: &str = "router";

const STATE_HOME: &str = "home";
const STATE_NOT_HOME: &str = "not_home";

/// MACs of the connected clients that pass the SSID allow-list.
pub fn eligible_clients(clients: &BTreeMap<String, Client>, filter: &[String]) -> BTreeSet<String> {
    clients
        .values()
        .filter(|client| ssid_allowed(filter, client.ssid.as_deref()))
        .map(|client| client.mac.clone())
        .collect()
}

pub fn device_macs(devices: &BTreeMap<String, Device>) -> BTreeSet<String> {
    devices.keys().cloned().collect()
}

fn presence(connected: bool) -> serde_json::Value {
    serde_json::Value::from(if connected { STATE_HOME } else { STATE_NOT_HOME })
}

#[derive(Debug, Serialize)]
struct ConnectedClientAttributes {
    ip: Option<String>,
    wireless: bool,
    ssid: Option<String>,
    ap_mac: Option<String>,
    signal_level: Option<i64>,
    rssi: Option<i64>,
    uptime: u64,
    guest: bool,
}

#[derive(Debug, Serialize)]
struct KnownClientAttributes {
    wireless: bool,
    guest: bool,
    last_seen: Option<i64>,
}

#[derive(Debug, Serialize)]
struct DeviceAttributes {
    #[serde(rename = "type")]
    device_type: String,
    model: String,
    firmware: String,
    firmware_upgrade: bool,
    status: i64,
    status_category: i64,
    mesh: bool,
}

/// Presence of an end-user client, by MAC.
pub struct ClientTracker {
    controller: Arc<Controller>,
    mac: String,
}

impl ClientTracker {
    pub fn new(controller: Arc<Controller>, mac: String) -> Self {
        Self { controller, mac }
    }

    pub fn is_connected(&self) -> bool {
        self.controller.data().clients().contains_key(&self.mac)
    }

    pub fn source_type(&self) -> &'static str {
        SOURCE_TYPE_ROUTER
    }

    /// Connected right now on an SSID the allow-list rejects
    fn is_excluded(&self) -> bool {
        let filter = self.controller.ssid_filter();
        let data = self.controller.data();
        data.clients()
            .get(&self.mac)
            .is_some_and(|client| !ssid_allowed(&filter, client.ssid.as_deref()))
    }
}

impl Entity for ClientTracker {
    fn unique_id(&self) -> String {
        self.mac.clone()
    }

    fn source_id(&self) -> &str {
        &self.mac
    }

    fn platform(&self) -> Platform {
        Platform::DeviceTracker
    }

    fn name(&self) -> String {
        let data = self.controller.data();
        let name = data
            .known_clients()
            .get(&self.mac)
            .map(|known| known.name.as_str())
            .filter(|name| !name.is_empty())
            .or_else(|| {
                data.clients()
                    .get(&self.mac)
                    .map(|client| client.name.as_str())
                    .filter(|name| !name.is_empty())
            });

        match name {
            Some(name) => display_name(self.controller.site(), name),
            None => self.mac.clone(),
        }
    }

    fn state_json(&self) -> serde_json::Value {
        presence(self.is_connected())
    }

    fn attributes(&self) -> Attributes {
        let data = self.controller.data();
        if let Some(client) = data.clients().get(&self.mac) {
            return attributes_from(&ConnectedClientAttributes {
                ip: client.ip.clone(),
                wireless: client.wireless,
                ssid: client.ssid.clone(),
                ap_mac: client.ap_mac.clone(),
                signal_level: client.signal_level,
                rssi: client.rssi,
                uptime: client.uptime,
                guest: client.guest,
            });
        }
        if let Some(known) = data.known_clients().get(&self.mac) {
            return attributes_from(&KnownClientAttributes {
                wireless: known.wireless,
                guest: known.guest,
                last_seen: known.last_seen,
            });
        }
        Attributes::new()
    }

    fn subscriptions(&self) -> Vec<Signal> {
        vec![
            self.controller.signal_update(),
            self.controller.signal_options_update(),
        ]
    }

    fn handle_signal(&mut self, signal: &Signal) -> SignalOutcome {
        if self.is_excluded() {
            debug!("{} is connected outside the SSID filter", self.mac);
            return SignalOutcome::Remove;
        }
        match signal {
            Signal::DataUpdated(_) => SignalOutcome::WriteState,
            Signal::OptionsUpdated(_) => SignalOutcome::Ignore,
        }
    }
}

/// Presence of a managed network device (gateway, switch, AP), by MAC.
pub struct DeviceTracker {
    controller: Arc<Controller>,
    mac: String,
}

impl DeviceTracker {
    pub fn new(controller: Arc<Controller>, mac: String) -> Self {
        Self { controller, mac }
    }

    pub fn is_connected(&self) -> bool {
        self.controller
            .data()
            .devices()
            .get(&self.mac)
            .is_some_and(Device::is_connected)
    }

    pub fn source_type(&self) -> &'static str {
        SOURCE_TYPE_ROUTER
    }

    pub fn ip_address(&self) -> Option<String> {
        self.controller
            .data()
            .devices()
            .get(&self.mac)
            .and_then(|device| device.ip.clone())
    }

    pub fn mac_address(&self) -> &str {
        &self.mac
    }

    pub fn hostname(&self) -> Option<String> {
        self.controller
            .data()
            .devices()
            .get(&self.mac)
            .map(|device| device.name.clone())
            .filter(|name| !name.is_empty())
    }
}

impl Entity for DeviceTracker {
    fn unique_id(&self) -> String {
        self.mac.clone()
    }

    fn source_id(&self) -> &str {
        &self.mac
    }

    fn platform(&self) -> Platform {
        Platform::DeviceTracker
    }

    fn name(&self) -> String {
        match self.hostname() {
            Some(name) => display_name(self.controller.site(), &name),
            None => self.mac.clone(),
        }
    }

    fn state_json(&self) -> serde_json::Value {
        presence(self.is_connected())
    }

    fn attributes(&self) -> Attributes {
        let data = self.controller.data();
        let Some(device) = data.devices().get(&self.mac) else {
            return Attributes::new();
        };
        attributes_from(&DeviceAttributes {
            device_type: device.device_type.clone(),
            model: device.model.clone(),
            firmware: device.firmware.clone(),
            firmware_upgrade: device.firmware_upgrade,
            status: device.status,
            status_category: device.status_category,
            mesh: device.mesh,
        })
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        let mut info = DeviceInfo {
            identifiers: BTreeSet::from([(DOMAIN.to_string(), self.mac.clone())]),
            ..Default::default()
        };

        let data = self.controller.data();
        if let Some(device) = data.devices().get(&self.mac) {
            info.name = Some(device.name.clone());
            info.manufacturer = Some("TP-Link".to_string());
            info.model = Some(device.model.clone());
            info.device_type = Some(device.device_type.clone());
            info.sw_version = Some(device.firmware.clone());
            info.suggested_area = Some("Network".to_string());
        }
        Some(info)
    }

    fn subscriptions(&self) -> Vec<Signal> {
        vec![self.controller.signal_update()]
    }

    fn handle_signal(&mut self, signal: &Signal) -> SignalOutcome {
        match signal {
            Signal::DataUpdated(_) => SignalOutcome::WriteState,
            Signal::OptionsUpdated(_) => SignalOutcome::Ignore,
        }
    }
}

/// Keeps one entry's presence trackers in line with its controller.
pub struct TrackerAdapter {
    entry: ConfigEntry,
    controller: Arc<Controller>,
}

impl TrackerAdapter {
    pub fn new(entry: ConfigEntry, controller: Arc<Controller>) -> Self {
        Self { entry, controller }
    }

    /// Devices plus every client the allow-list lets through.
    fn current_macs(&self) -> BTreeSet<String> {
        let filter = self.controller.ssid_filter();
        let data = self.controller.data();
        let mut macs = device_macs(data.devices());
        macs.extend(eligible_clients(data.clients(), &filter));
        macs
    }

    /// Initial set for setup, including what the registry remembers.
    ///
    /// Registry entries for known clients that are offline are brought back.
    /// Entries for clients connected on an excluded SSID are deleted outright.
    fn initial_macs(&self, host: &mut Host) -> BTreeSet<String> {
        let mut macs = self.current_macs();
        let mut stale = Vec::new();
        {
            let filter = self.controller.ssid_filter();
            let data = self.controller.data();
            for registered in host.registry.entries_for_config_entry(&self.entry.entry_id) {
                if registered.platform != Platform::DeviceTracker
                    || registered.domain != self.entry.domain
                    || data.devices().contains_key(&registered.unique_id)
                {
                    continue;
                }

                match data.clients().get(&registered.unique_id) {
                    None => {
                        if data.known_clients().contains_key(&registered.unique_id) {
                            macs.insert(registered.unique_id);
                        }
                    }
                    Some(client) if !ssid_allowed(&filter, client.ssid.as_deref()) => {
                        stale.push(registered.entity_id);
                    }
                    Some(_) => {}
                }
            }
        }

        for entity_id in stale {
            info!(
                "[{}] Deleting {} from the registry, excluded by the SSID filter",
                self.entry.entry_id, entity_id
            );
            host.registry.remove(&entity_id);
        }

        macs
    }

    fn add_trackers(&self, host: &mut Host, macs: BTreeSet<String>) {
        let entities: Vec<Box<dyn Entity>> = {
            let data = self.controller.data();
            macs.into_iter()
                .filter(|mac| {
                    !host
                        .ownership
                        .owns(&self.entry.entry_id, Platform::DeviceTracker, mac)
                })
                .map(|mac| -> Box<dyn Entity> {
                    if data.devices().contains_key(&mac) {
                        Box::new(DeviceTracker::new(self.controller.clone(), mac))
                    } else {
                        Box::new(ClientTracker::new(self.controller.clone(), mac))
                    }
                })
                .collect()
        };

        if entities.is_empty() {
            debug!("[{}] No new trackers", self.entry.entry_id);
            return;
        }
        host.add_entities(&self.entry, entities);
    }
}

impl PlatformAdapter for TrackerAdapter {
    fn platform(&self) -> Platform {
        Platform::DeviceTracker
    }

    fn entry(&self) -> &ConfigEntry {
        &self.entry
    }

    fn setup(&mut self, host: &mut Host) {
        host.ownership
            .reset(&self.entry.entry_id, Platform::DeviceTracker);
        host.dispatcher.connect(
            self.controller.signal_update(),
            Subscriber::Platform {
                entry_id: self.entry.entry_id.clone(),
                platform: Platform::DeviceTracker,
            },
        );

        let macs = self.initial_macs(host);
        self.add_trackers(host, macs);
    }

    fn items_added(&mut self, host: &mut Host) {
        let macs = self.current_macs();
        self.add_trackers(host, macs);
    }
}
