use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use tracing::info;

use super::config::Config as OmadaConfig;
use super::model::Client;
use super::model::Device;
use super::model::KnownClient;
use crate::engine::format_mac;
use crate::engine::Signal;
use crate::engine::SignalSender;

/// On-disk shape of a controller snapshot
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Snapshot {
    clients: Vec<Client>,
    known_clients: Vec<KnownClient>,
    devices: Vec<Device>,
}

/// Everything the controller last reported, keyed by normalized MAC.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Snapshot")]
pub struct ControllerData {
    clients: BTreeMap<String, Client>,
    known_clients: BTreeMap<String, KnownClient>,
    devices: BTreeMap<String, Device>,
}

impl From<Snapshot> for ControllerData {
    fn from(snapshot: Snapshot) -> Self {
        Self::new(snapshot.clients, snapshot.known_clients, snapshot.devices)
    }
}

impl ControllerData {
    pub fn new(clients: Vec<Client>, known_clients: Vec<KnownClient>, devices: Vec<Device>) -> Self {
        Self {
            clients: clients
                .into_iter()
                .map(|mut c| {
                    c.mac = format_mac(&c.mac);
                    (c.mac.clone(), c)
                })
                .collect(),
            known_clients: known_clients
                .into_iter()
                .map(|mut c| {
                    c.mac = format_mac(&c.mac);
                    (c.mac.clone(), c)
                })
                .collect(),
            devices: devices
                .into_iter()
                .map(|mut d| {
                    d.mac = format_mac(&d.mac);
                    (d.mac.clone(), d)
                })
                .collect(),
        }
    }

    /// Clients currently associated, by MAC
    pub fn clients(&self) -> &BTreeMap<String, Client> {
        &self.clients
    }

    /// Every client seen before, by MAC
    pub fn known_clients(&self) -> &BTreeMap<String, KnownClient> {
        &self.known_clients
    }

    pub fn devices(&self) -> &BTreeMap<String, Device> {
        &self.devices
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Failed to read controller snapshot {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse controller snapshot {0}: {1}")]
    Parse(PathBuf, #[source] serde_json::Error),
}

/// Source of controller data
///
/// The live Omada HTTP client plugs in here; this crate ships
/// [`SnapshotApi`] for offline use.
#[async_trait]
pub trait ControllerApi: Send {
    async fn fetch(&mut self) -> Result<ControllerData, ControllerError>;
}

/// Reads controller data from a JSON snapshot on disk on every fetch.
#[derive(Debug, Clone)]
pub struct SnapshotApi {
    path: PathBuf,
}

impl SnapshotApi {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ControllerApi for SnapshotApi {
    async fn fetch(&mut self) -> Result<ControllerData, ControllerError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ControllerError::Io(self.path.clone(), e))?;
        serde_json::from_str(&contents).map_err(|e| ControllerError::Parse(self.path.clone(), e))
    }
}

/// Whether a client on `ssid` passes the allow-list. An empty list allows everything;
/// a client without an SSID only passes an empty list.
pub fn ssid_allowed(filter: &[String], ssid: Option<&str>) -> bool {
    filter.is_empty() || ssid.is_some_and(|ssid| filter.iter().any(|allowed| allowed == ssid))
}

/// Shared view of one Omada controller.
///
/// Holds the latest data and options for a config entry and emits its
/// signals whenever either changes.
#[derive(Debug)]
pub struct Controller {
    entry_id: String,
    site: String,
    data: RwLock<ControllerData>,
    ssid_filter: RwLock<Vec<String>>,
    notifier: SignalSender,
}

impl Controller {
    pub fn new(
        entry_id: impl Into<String>,
        site: impl Into<String>,
        ssid_filter: Vec<String>,
        notifier: SignalSender,
    ) -> Self {
        Self {
            entry_id: entry_id.into(),
            site: site.into(),
            data: RwLock::new(ControllerData::default()),
            ssid_filter: RwLock::new(ssid_filter),
            notifier,
        }
    }

    pub fn from_config(entry_id: &str, config: &OmadaConfig, notifier: SignalSender) -> Self {
        Self::new(entry_id, config.site.clone(), config.ssid_filter.clone(), notifier)
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn signal_update(&self) -> Signal {
        Signal::DataUpdated(self.entry_id.clone())
    }

    pub fn signal_options_update(&self) -> Signal {
        Signal::OptionsUpdated(self.entry_id.clone())
    }

    /// Read access to the current data. Do not hold the guard while calling
    /// back into the controller.
    pub fn data(&self) -> RwLockReadGuard<'_, ControllerData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn ssid_filter(&self) -> Vec<String> {
        self.ssid_filter
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Store data without notifying anyone, for the initial load.
    pub fn load(&self, data: ControllerData) {
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = data;
    }

    /// Store fresh data and emit the data-updated signal.
    pub fn replace_data(&self, data: ControllerData) {
        debug!(
            "[{}] Controller data: {} clients, {} known clients, {} devices",
            self.entry_id,
            data.clients.len(),
            data.known_clients.len(),
            data.devices.len()
        );
        self.load(data);
        self.notify(self.signal_update());
    }

    /// Replace the SSID allow-list and emit the options-updated signal.
    pub fn set_ssid_filter(&self, ssid_filter: Vec<String>) {
        info!("[{}] SSID filter set to {:?}", self.entry_id, ssid_filter);
        *self
            .ssid_filter
            .write()
            .unwrap_or_else(PoisonError::into_inner) = ssid_filter;
        self.notify(self.signal_options_update());
    }

    /// Fetch from `api` and publish the result. On error the previous data is kept.
    pub async fn refresh(&self, api: &mut dyn ControllerApi) -> Result<(), ControllerError> {
        let data = api.fetch().await?;
        self.replace_data(data);
        Ok(())
    }

    fn notify(&self, signal: Signal) {
        if let Err(e) = self.notifier.send(signal) {
            debug!("Engine is gone, dropping {}", e.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tokio::sync::mpsc;

    use super::*;

    fn client(mac: &str, ssid: Option<&str>) -> Client {
        Client {
            mac: mac.to_string(),
            ssid: ssid.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_ssid_allowed() {
        let filter = vec!["Guest".to_string()];
        assert!(ssid_allowed(&[], None));
        assert!(ssid_allowed(&[], Some("Home")));
        assert!(ssid_allowed(&filter, Some("Guest")));
        assert!(!ssid_allowed(&filter, Some("Home")));
        assert!(!ssid_allowed(&filter, None));
    }

    #[test]
    fn test_data_normalizes_macs() {
        let data = ControllerData::new(
            vec![client("AA-BB-CC-DD-EE-01", Some("Guest"))],
            vec![],
            vec![Device {
                mac: "AABBCCDDEE02".to_string(),
                ..Default::default()
            }],
        );
        assert!(data.clients().contains_key("aa:bb:cc:dd:ee:01"));
        assert_eq!(data.clients()["aa:bb:cc:dd:ee:01"].mac, "aa:bb:cc:dd:ee:01");
        assert!(data.devices().contains_key("aa:bb:cc:dd:ee:02"));
    }

    #[test]
    fn test_replace_data_and_filter_emit_signals() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let controller = Controller::new("home", "Default", vec![], tx);

        controller.load(ControllerData::default());
        assert!(rx.try_recv().is_err());

        controller.replace_data(ControllerData::new(vec![client("aa:bb:cc:dd:ee:01", None)], vec![], vec![]));
        assert_eq!(rx.try_recv().unwrap(), Signal::DataUpdated("home".to_string()));
        assert_eq!(controller.data().clients().len(), 1);

        controller.set_ssid_filter(vec!["Guest".to_string()]);
        assert_eq!(rx.try_recv().unwrap(), Signal::OptionsUpdated("home".to_string()));
        assert_eq!(controller.ssid_filter(), vec!["Guest".to_string()]);
    }

    #[test]
    fn test_notify_without_engine_does_not_fail() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let controller = Controller::new("home", "Default", vec![], tx);
        controller.replace_data(ControllerData::default());
    }

    #[tokio::test]
    async fn test_snapshot_refresh() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "clients": [{{"mac": "AA-BB-CC-DD-EE-01", "name": "phone", "ssid": "Guest", "wireless": true}}],
                "known_clients": [{{"mac": "AA-BB-CC-DD-EE-01", "name": "phone"}}],
                "devices": [{{"mac": "AA-BB-CC-DD-EE-02", "name": "router1", "type": "gateway", "status_category": 1}}]
            }}"#
        )
        .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let controller = Controller::new("home", "Default", vec![], tx);
        let mut api = SnapshotApi::new(file.path());

        controller.refresh(&mut api).await.unwrap();

        assert_eq!(rx.try_recv().unwrap(), Signal::DataUpdated("home".to_string()));
        let data = controller.data();
        assert_eq!(data.clients()["aa:bb:cc:dd:ee:01"].ssid.as_deref(), Some("Guest"));
        assert!(data.known_clients().contains_key("aa:bb:cc:dd:ee:01"));
        assert!(data.devices()["aa:bb:cc:dd:ee:02"].is_connected());
    }

    #[tokio::test]
    async fn test_refresh_error_keeps_previous_data() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let controller = Controller::new("home", "Default", vec![], tx);
        controller.load(ControllerData::new(vec![client("aa:bb:cc:dd:ee:01", None)], vec![], vec![]));

        let mut api = SnapshotApi::new("/nonexistent/snapshot.json");
        let err = controller.refresh(&mut api).await.unwrap_err();

        assert!(matches!(err, ControllerError::Io(..)));
        assert!(rx.try_recv().is_err());
        assert_eq!(controller.data().clients().len(), 1);
    }
}
