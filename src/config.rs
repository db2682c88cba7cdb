//! Master configuration
//!
//! Deserializable from whatever configuration source the embedding
//! application uses; every field has a default matching the reference
//! deployment (Raspberry Pi UART with a GPIO-switched RS-485 hat).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::direction::SettleDelays;

/// Serial, addressing and timing parameters for an RTU master
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RtuMasterConfig {
    /// Serial device path
    #[serde(default = "default_device")]
    pub device: String,

    /// Baud rate (8N1 framing is fixed)
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Unit (slave) identifier addressed by this master
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,

    /// GPIO number driving the transceiver DE/RE pair
    #[serde(default = "default_direction_gpio")]
    pub direction_gpio: u32,

    /// Sysfs GPIO base path, overridable for containerized deployments
    #[serde(default = "default_gpio_base_path")]
    pub gpio_base_path: String,

    /// Deadline for a complete response in milliseconds
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,

    /// Delay between raising the direction pin and the first byte
    #[serde(default = "default_pre_transmit_settle_ms")]
    pub pre_transmit_settle_ms: u64,

    /// Delay between frame drain and dropping the direction pin
    #[serde(default = "default_post_transmit_settle_ms")]
    pub post_transmit_settle_ms: u64,

    /// Delay after the direction pin returns to receive
    #[serde(default = "default_post_receive_settle_ms")]
    pub post_receive_settle_ms: u64,
}

fn default_device() -> String {
    DEFAULT_DEVICE.to_string()
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_unit_id() -> u8 {
    DEFAULT_UNIT_ID
}

fn default_direction_gpio() -> u32 {
    DEFAULT_DIRECTION_GPIO
}

fn default_gpio_base_path() -> String {
    DEFAULT_GPIO_BASE_PATH.to_string()
}

fn default_response_timeout_ms() -> u64 {
    RESPONSE_TIMEOUT_MS
}

fn default_pre_transmit_settle_ms() -> u64 {
    PRE_TRANSMIT_SETTLE_MS
}

fn default_post_transmit_settle_ms() -> u64 {
    POST_TRANSMIT_SETTLE_MS
}

fn default_post_receive_settle_ms() -> u64 {
    POST_RECEIVE_SETTLE_MS
}

impl Default for RtuMasterConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            baud_rate: default_baud_rate(),
            unit_id: default_unit_id(),
            direction_gpio: default_direction_gpio(),
            gpio_base_path: default_gpio_base_path(),
            response_timeout_ms: default_response_timeout_ms(),
            pre_transmit_settle_ms: default_pre_transmit_settle_ms(),
            post_transmit_settle_ms: default_post_transmit_settle_ms(),
            post_receive_settle_ms: default_post_receive_settle_ms(),
        }
    }
}

impl RtuMasterConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn settle_delays(&self) -> SettleDelays {
        SettleDelays {
            pre_transmit: Duration::from_millis(self.pre_transmit_settle_ms),
            post_transmit: Duration::from_millis(self.post_transmit_settle_ms),
            post_receive: Duration::from_millis(self.post_receive_settle_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RtuMasterConfig::default();
        assert_eq!(config.device, "/dev/ttyAMA0");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.unit_id, 3);
        assert_eq!(config.direction_gpio, 21);
        assert_eq!(config.response_timeout_ms, 2000);
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: RtuMasterConfig =
            serde_json::from_str(r#"{"device": "/dev/ttyUSB0", "unit_id": 7}"#).unwrap();
        assert_eq!(config.device, "/dev/ttyUSB0");
        assert_eq!(config.unit_id, 7);
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.pre_transmit_settle_ms, 20);
        assert_eq!(config.post_transmit_settle_ms, 100);
        assert_eq!(config.post_receive_settle_ms, 20);
    }

    #[test]
    fn test_duration_helpers() {
        let config = RtuMasterConfig::default();
        assert_eq!(config.response_timeout(), Duration::from_millis(2000));
        let delays = config.settle_delays();
        assert_eq!(delays.post_transmit, Duration::from_millis(100));
    }
}
