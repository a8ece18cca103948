use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::controller::Controller;
use super::controller::ControllerApi;
use super::controller::SnapshotApi;
use super::device_tracker::TrackerAdapter;
use super::sensor::SensorAdapter;
use super::OmadaConfig;
use super::DOMAIN;
use crate::engine::ConfigEntry;
use crate::engine::Engine;
use crate::engine::Integration;

/// Omada integration for omadad
///
/// Sets up one config entry per configured controller. Each entry gets a
/// shared [`Controller`], a tracker and a sensor adapter, and a background
/// task refreshing the controller every scan interval.
pub struct OmadaIntegration {
    entries: BTreeMap<String, OmadaConfig>,
    scan_interval: Duration,
    controllers: BTreeMap<String, Arc<Controller>>,
    refresh_tasks: Vec<(String, JoinHandle<()>)>,
}

impl OmadaIntegration {
    pub fn new(entries: BTreeMap<String, OmadaConfig>, scan_interval: Duration) -> Self {
        Self {
            entries,
            scan_interval,
            controllers: BTreeMap::new(),
            refresh_tasks: Vec::new(),
        }
    }

    pub fn controller(&self, entry_id: &str) -> Option<Arc<Controller>> {
        self.controllers.get(entry_id).cloned()
    }

    async fn setup_controller(
        engine: &mut Engine,
        entry_id: &str,
        config: &OmadaConfig,
    ) -> anyhow::Result<(Arc<Controller>, Box<dyn ControllerApi>)> {
        let Some(snapshot) = &config.snapshot else {
            anyhow::bail!(
                "no snapshot configured for {}; live controller access is not available",
                config.url
            );
        };

        let mut api: Box<dyn ControllerApi> = Box::new(SnapshotApi::new(snapshot));
        let data = api
            .fetch()
            .await
            .with_context(|| format!("Initial fetch for {} failed", config.url))?;

        let controller = Arc::new(Controller::from_config(
            entry_id,
            config,
            engine.signal_sender(),
        ));
        controller.load(data);
        setup_entry(engine, controller.clone());

        Ok((controller, api))
    }
}

/// Register the tracker and sensor platforms of one controller with the engine.
pub fn setup_entry(engine: &mut Engine, controller: Arc<Controller>) -> ConfigEntry {
    let entry = ConfigEntry {
        entry_id: controller.entry_id().to_string(),
        domain: DOMAIN.to_string(),
        title: controller.site().to_string(),
    };

    engine.setup_entry(vec![
        Box::new(TrackerAdapter::new(entry.clone(), controller.clone())),
        Box::new(SensorAdapter::new(entry.clone(), controller)),
    ]);
    entry
}

fn spawn_refresh(
    controller: Arc<Controller>,
    mut api: Box<dyn ControllerApi>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately and setup has just fetched.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = controller.refresh(api.as_mut()).await {
                warn!("[{}] Refresh failed, keeping previous data: {}", controller.entry_id(), e);
            }
        }
    })
}

#[async_trait]
impl Integration for OmadaIntegration {
    fn name(&self) -> &str {
        DOMAIN
    }

    async fn setup(&mut self, engine: &mut Engine) -> anyhow::Result<()> {
        for (entry_id, config) in &self.entries {
            info!("[{}] Setting up Omada controller {} (site {})", entry_id, config.url, config.site);

            match Self::setup_controller(engine, entry_id, config).await {
                Ok((controller, api)) => {
                    let handle = spawn_refresh(controller.clone(), api, self.scan_interval);
                    self.refresh_tasks.push((entry_id.clone(), handle));
                    self.controllers.insert(entry_id.clone(), controller);
                }
                Err(e) => error!("[{}] Failed to set up Omada controller: {:#}", entry_id, e),
            }
        }

        info!(
            "Omada integration set up {} of {} controllers",
            self.controllers.len(),
            self.entries.len()
        );
        Ok(())
    }

    async fn shutdown(&mut self, engine: &mut Engine) -> anyhow::Result<()> {
        for (entry_id, handle) in self.refresh_tasks.drain(..) {
            handle.abort();
            match handle.await {
                Ok(()) => info!("[{}] Refresh task stopped", entry_id),
                Err(e) if e.is_cancelled() => info!("[{}] Refresh task cancelled", entry_id),
                Err(e) => warn!("[{}] Refresh task error: {}", entry_id, e),
            }
        }

        for entry_id in std::mem::take(&mut self.controllers).into_keys() {
            engine.unload_entry(&entry_id);
        }
        Ok(())
    }
}
