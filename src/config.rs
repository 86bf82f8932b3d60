//! Plugin configuration
//!
//! Inventory and timing configuration for the daemon. Kept as plain
//! structs with defaults; the host framework owns the real inventory
//! pipeline.

use std::time::Duration;

use bmclink_protocol::Endpoint;

use crate::device::Device;

/// Top-level daemon configuration
#[derive(Debug, Clone)]
pub struct PluginConfig {
    /// How often each device is polled for readings
    pub poll_interval: Duration,
    /// Default per-exchange response timeout
    pub request_timeout: Duration,
    /// Managed devices
    pub devices: Vec<DeviceConfig>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            request_timeout: Duration::from_millis(bmclink_protocol::limits::REQUEST_TIMEOUT_MS),
            devices: Vec::new(),
        }
    }
}

/// Configuration for one managed device
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Inventory identity
    pub id: String,
    /// Device type for handler lookup
    pub device_type: String,
    /// Device model for handler lookup
    pub model: String,
    /// Controller address (host:port)
    pub address: String,
    /// Authentication username
    pub username: String,
    /// Authentication password
    pub password: String,
    /// Whether the controller supports forced (indefinite) identify
    pub supports_force_identify: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            id: "bmc-0".into(),
            device_type: "led".into(),
            model: "bmc-chassis-led".into(),
            address: "127.0.0.1:623".into(),
            username: String::new(),
            password: String::new(),
            supports_force_identify: true,
        }
    }
}

impl DeviceConfig {
    /// Build the runtime device with its endpoint
    pub fn to_device(&self) -> Device {
        Device {
            id: self.id.clone(),
            device_type: self.device_type.clone(),
            model: self.model.clone(),
            data: Endpoint {
                address: self.address.clone(),
                username: self.username.clone(),
                password: self.password.clone(),
                supports_force_identify: self.supports_force_identify,
                request_timeout: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_config_to_device() {
        let config = DeviceConfig {
            id: "rack1-bmc".into(),
            address: "10.0.0.5:623".into(),
            ..Default::default()
        };

        let device = config.to_device();
        assert_eq!(device.id, "rack1-bmc");
        assert_eq!(device.device_type, "led");
        assert_eq!(device.data.address, "10.0.0.5:623");
        assert!(device.data.supports_force_identify);
    }
}
