use std::path::PathBuf;

use serde::Deserialize;

use super::naming::DEFAULT_SITE;

fn default_site() -> String {
    DEFAULT_SITE.to_string()
}

fn default_true() -> bool {
    true
}

/// Configuration for one Omada controller (one config entry)
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Controller base URL, e.g. "https://omada.local:8043"
    pub url: String,

    /// Omada site to track (default: "Default")
    #[serde(default = "default_site")]
    pub site: String,

    pub username: String,

    pub password: String,

    /// SSIDs whose clients are tracked; empty tracks every client
    #[serde(default)]
    pub ssid_filter: Vec<String>,

    /// Verify the controller's TLS certificate (default: true)
    #[serde(default = "default_true")]
    pub verify_ssl: bool,

    /// JSON snapshot of controller data to read instead of the live API
    #[serde(default)]
    pub snapshot: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Config {
    pub fn validate(&self) -> Result<(), String> {
        if self.url.trim().is_empty() {
            return Err("url must not be empty".to_string());
        }
        if self.username.trim().is_empty() {
            return Err("username must not be empty".to_string());
        }
        if self.ssid_filter.iter().any(|ssid| ssid.is_empty()) {
            return Err("ssid_filter entries must not be empty".to_string());
        }
        Ok(())
    }
}
