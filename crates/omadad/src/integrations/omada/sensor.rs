//! Telemetry sensors for Omada devices.

use std::collections::BTreeSet;
use std::sync::Arc;

use strum::Display;
use strum::EnumIter;
use strum::IntoEnumIterator;
use tracing::debug;
use tracing::trace;

use super::controller::Controller;
use super::model::Device;
use super::naming::display_name;
use super::DOMAIN;
use crate::engine::ConfigEntry;
use crate::engine::DeviceInfo;
use crate::engine::Entity;
use crate::engine::Host;
use crate::engine::Platform;
use crate::engine::PlatformAdapter;
use crate::engine::Subscriber;

/// The four counters every device reports. Display gives the unique id suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum SensorKind {
    Upload,
    Download,
    Tx,
    Rx,
}

impl SensorKind {
    pub fn label(&self) -> &'static str {
        match self {
            SensorKind::Upload => "Upload",
            SensorKind::Download => "Download",
            SensorKind::Tx => "Tx",
            SensorKind::Rx => "Rx",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            SensorKind::Upload | SensorKind::Download => "B",
            SensorKind::Tx | SensorKind::Rx => "B/s",
        }
    }

    pub fn read(&self, device: &Device) -> f64 {
        match self {
            SensorKind::Upload => device.upload as f64,
            SensorKind::Download => device.download as f64,
            SensorKind::Tx => device.tx_rate,
            SensorKind::Rx => device.rx_rate,
        }
    }
}

/// One counter of one device, refreshed on every poll.
pub struct TelemetrySensor {
    controller: Arc<Controller>,
    mac: String,
    kind: SensorKind,
    value: Option<f64>,
}

impl TelemetrySensor {
    pub fn new(controller: Arc<Controller>, mac: String, kind: SensorKind) -> Self {
        let mut sensor = Self {
            controller,
            mac,
            kind,
            value: None,
        };
        sensor.update();
        sensor
    }
}

impl Entity for TelemetrySensor {
    fn unique_id(&self) -> String {
        format!("{}_{}", self.mac, self.kind)
    }

    fn source_id(&self) -> &str {
        &self.mac
    }

    fn platform(&self) -> Platform {
        Platform::Sensor
    }

    fn name(&self) -> String {
        let data = self.controller.data();
        let base = match data.devices().get(&self.mac) {
            Some(device) if !device.name.is_empty() => display_name(self.controller.site(), &device.name),
            _ => self.mac.clone(),
        };
        format!("{} {}", base, self.kind.label())
    }

    fn state_json(&self) -> serde_json::Value {
        self.value.map(serde_json::Value::from).unwrap_or_default()
    }

    fn unit_of_measurement(&self) -> Option<&'static str> {
        Some(self.kind.unit())
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        Some(DeviceInfo {
            identifiers: BTreeSet::from([(DOMAIN.to_string(), self.mac.clone())]),
            ..Default::default()
        })
    }

    fn should_poll(&self) -> bool {
        true
    }

    fn update(&mut self) {
        match self.controller.data().devices().get(&self.mac) {
            Some(device) => self.value = Some(self.kind.read(device)),
            None => trace!("{} is gone, keeping last {} value", self.mac, self.kind),
        }
    }
}

/// Keeps one entry's telemetry sensors in line with its controller.
pub struct SensorAdapter {
    entry: ConfigEntry,
    controller: Arc<Controller>,
}

impl SensorAdapter {
    pub fn new(entry: ConfigEntry, controller: Arc<Controller>) -> Self {
        Self { entry, controller }
    }

    fn add_sensors(&self, host: &mut Host) {
        let macs: Vec<String> = self
            .controller
            .data()
            .devices()
            .keys()
            .filter(|mac| !host.ownership.owns(&self.entry.entry_id, Platform::Sensor, mac))
            .cloned()
            .collect();

        let entities: Vec<Box<dyn Entity>> = macs
            .into_iter()
            .flat_map(|mac| {
                SensorKind::iter().map(move |kind| -> Box<dyn Entity> {
                    Box::new(TelemetrySensor::new(self.controller.clone(), mac.clone(), kind))
                })
            })
            .collect();

        if entities.is_empty() {
            debug!("[{}] No new sensors", self.entry.entry_id);
            return;
        }
        host.add_entities(&self.entry, entities);
    }
}

impl PlatformAdapter for SensorAdapter {
    fn platform(&self) -> Platform {
        Platform::Sensor
    }

    fn entry(&self) -> &ConfigEntry {
        &self.entry
    }

    fn setup(&mut self, host: &mut Host) {
        host.ownership.reset(&self.entry.entry_id, Platform::Sensor);
        host.dispatcher.connect(
            self.controller.signal_update(),
            Subscriber::Platform {
                entry_id: self.entry.entry_id.clone(),
                platform: Platform::Sensor,
            },
        );
        self.add_sensors(host);
    }

    fn items_added(&mut self, host: &mut Host) {
        self.add_sensors(host);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::integrations::omada::ControllerData;
    use crate::integrations::omada::TrackerAdapter;

    const ROUTER_MAC: &str = "aa:bb:cc:dd:ee:10";

    fn entry() -> ConfigEntry {
        ConfigEntry {
            entry_id: "home".to_string(),
            domain: DOMAIN.to_string(),
            title: "Home".to_string(),
        }
    }

    fn router(upload: u64, tx_rate: f64) -> Device {
        Device {
            mac: ROUTER_MAC.to_string(),
            name: "router1".to_string(),
            status_category: 1,
            upload,
            download: 2048,
            tx_rate,
            rx_rate: 12.5,
            ..Default::default()
        }
    }

    fn controller(engine: &Engine) -> Arc<Controller> {
        let controller = Arc::new(Controller::new("home", "Default", vec![], engine.signal_sender()));
        controller.load(ControllerData::new(vec![], vec![], vec![router(1024, 100.0)]));
        controller
    }

    #[test]
    fn test_kind_suffix_and_units() {
        let suffixes: Vec<String> = SensorKind::iter().map(|k| k.to_string()).collect();
        assert_eq!(suffixes, vec!["upload", "download", "tx", "rx"]);
        assert_eq!(SensorKind::Upload.unit(), "B");
        assert_eq!(SensorKind::Rx.unit(), "B/s");
    }

    #[test]
    fn test_setup_creates_four_sensors_per_device() {
        let mut engine = Engine::new();
        let controller = controller(&engine);
        engine.setup_entry(vec![Box::new(SensorAdapter::new(entry(), controller))]);

        let host = engine.host();
        assert_eq!(host.entity_count(), 4);

        let upload = host.state("sensor.omada_router1_upload").unwrap();
        assert_eq!(upload.state, 1024.0);
        assert_eq!(upload.unit_of_measurement.as_deref(), Some("B"));
        insta::assert_snapshot!(upload.name, @"Omada Router1 Upload");
        assert_eq!(
            host.registry
                .get("sensor.omada_router1_tx")
                .unwrap()
                .unique_id,
            "aa:bb:cc:dd:ee:10_tx"
        );
    }

    #[test]
    fn test_poll_refreshes_and_keeps_last_value() {
        let mut engine = Engine::new();
        let controller = controller(&engine);
        engine.setup_entry(vec![Box::new(SensorAdapter::new(entry(), controller.clone()))]);

        controller.load(ControllerData::new(vec![], vec![], vec![router(4096, 250.0)]));
        engine.poll_entities();
        assert_eq!(engine.host().state("sensor.omada_router1_upload").unwrap().state, 4096.0);
        assert_eq!(engine.host().state("sensor.omada_router1_tx").unwrap().state, 250.0);

        controller.load(ControllerData::default());
        engine.poll_entities();
        assert_eq!(engine.host().state("sensor.omada_router1_tx").unwrap().state, 250.0);
    }

    #[test]
    fn test_data_updates_do_not_duplicate() {
        let mut engine = Engine::new();
        let controller = controller(&engine);
        engine.setup_entry(vec![Box::new(SensorAdapter::new(entry(), controller.clone()))]);

        controller.replace_data(ControllerData::new(vec![], vec![], vec![router(1, 1.0)]));
        controller.replace_data(ControllerData::new(vec![], vec![], vec![router(2, 2.0)]));
        engine.process_pending();

        assert_eq!(engine.host().entity_count(), 4);
    }

    #[test]
    fn test_sensors_share_the_tracker_device() {
        let mut engine = Engine::new();
        let controller = controller(&engine);
        engine.setup_entry(vec![
            Box::new(TrackerAdapter::new(entry(), controller.clone())),
            Box::new(SensorAdapter::new(entry(), controller)),
        ]);

        let host = engine.host();
        assert_eq!(host.devices.len(), 1);
        let device = host.devices.find(DOMAIN, ROUTER_MAC).unwrap();
        assert_eq!(device.entity_ids.len(), 5);
        assert_eq!(device.manufacturer.as_deref(), Some("TP-Link"));
    }
}
