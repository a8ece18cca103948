mod config;
mod controller;
mod device_tracker;
mod model;
mod naming;
#[allow(clippy::module_inception)]
mod omada;
mod sensor;

use std::collections::BTreeMap;

pub use config::Config as OmadaConfig;
pub use controller::ssid_allowed;
pub use controller::Controller;
pub use controller::ControllerApi;
pub use controller::ControllerData;
pub use controller::ControllerError;
pub use controller::SnapshotApi;
pub use device_tracker::device_macs;
pub use device_tracker::eligible_clients;
pub use device_tracker::ClientTracker;
pub use device_tracker::DeviceTracker;
pub use device_tracker::TrackerAdapter;
use linkme::distributed_slice;
pub use model::Client;
pub use model::Device;
pub use model::KnownClient;
pub use naming::display_name;
pub use omada::setup_entry;
pub use omada::OmadaIntegration;
pub use sensor::SensorAdapter;
pub use sensor::SensorKind;
pub use sensor::TelemetrySensor;
use tracing::info;

use crate::engine;

/// Integration domain, used for registry entries and device identifiers
pub const DOMAIN: &str = "omada";

#[distributed_slice(engine::INTEGRATION_REGISTRY)]
fn init_omada(ctx: &engine::IntegrationContext) -> engine::IntegrationFactoryResult {
    let mut entries = BTreeMap::new();
    for (entry_id, config) in &ctx.config.integrations.omada {
        if !config.enabled {
            info!("[{}] Omada controller is disabled, skipping", entry_id);
            continue;
        }
        entries.insert(entry_id.clone(), config.clone());
    }

    if entries.is_empty() {
        return Ok(None);
    }

    info!("Initializing Omada integration with {} controllers", entries.len());
    Ok(Some(Box::new(OmadaIntegration::new(
        entries,
        ctx.config.system.scan_interval(),
    ))))
}
