use serde::Deserialize;
use serde::Serialize;

/// `status_category` of a device the controller reports as connected
pub const STATUS_CATEGORY_CONNECTED: i64 = 1;

/// Network-infrastructure node managed by the controller (gateway, switch, AP)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Device {
    pub mac: String,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub model: String,
    pub firmware: String,
    pub firmware_upgrade: bool,
    pub status: i64,
    pub status_category: i64,
    pub ip: Option<String>,
    pub mesh: bool,
    /// Bytes uploaded
    pub upload: u64,
    /// Bytes downloaded
    pub download: u64,
    /// Bytes per second
    pub tx_rate: f64,
    /// Bytes per second
    pub rx_rate: f64,
}

impl Device {
    pub fn is_connected(&self) -> bool {
        self.status_category == STATUS_CATEGORY_CONNECTED
    }
}

/// End-user device currently associated with the network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Client {
    pub mac: String,
    pub name: String,
    /// Absent for wired clients
    pub ssid: Option<String>,
    pub ap_mac: Option<String>,
    pub ip: Option<String>,
    pub wireless: bool,
    pub signal_level: Option<i64>,
    pub rssi: Option<i64>,
    /// Seconds since association
    pub uptime: u64,
    pub guest: bool,
}

/// A client the controller has seen before, connected or not
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnownClient {
    pub mac: String,
    pub name: String,
    pub wireless: bool,
    pub guest: bool,
    /// Unix timestamp (milliseconds) the client was last seen
    pub last_seen: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_connected_by_status_category() {
        let mut device = Device {
            status_category: 1,
            ..Default::default()
        };
        assert!(device.is_connected());

        device.status_category = 2;
        assert!(!device.is_connected());
    }

    #[test]
    fn test_device_type_field_name() {
        let device: Device = serde_json::from_str(
            r#"{"mac": "AA-BB-CC-DD-EE-FF", "name": "router1", "type": "gateway", "upload": 1024}"#,
        )
        .unwrap();
        assert_eq!(device.device_type, "gateway");
        assert_eq!(device.upload, 1024);
        assert_eq!(device.tx_rate, 0.0);
        assert!(device.ip.is_none());
    }

    #[test]
    fn test_wired_client_has_no_ssid() {
        let client: Client =
            serde_json::from_str(r#"{"mac": "11:22:33:44:55:66", "name": "nas", "wireless": false}"#)
                .unwrap();
        assert!(client.ssid.is_none());
        assert!(!client.wireless);
    }
}
