//! RS-485 bus direction control
//!
//! Half-duplex RS-485 transceivers need their driver enabled for the
//! duration of a transmission and disabled the instant it is over, or
//! the slave's reply collides with a still-driven bus. The controller
//! wraps that turnaround: raise the pin, settle, transmit, settle, drop
//! the pin, settle. The receive flip happens on every exit path, a
//! failed write included.

use std::fs;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::constants::*;
use crate::error::{RtuError, RtuResult};

/// Driver abstraction for the DE/RE pin of an RS-485 transceiver
pub trait DirectionPin: Send {
    /// Raise the pin: bus driver enabled, transmitting
    fn set_transmit(&mut self) -> RtuResult<()>;

    /// Drop the pin: bus driver disabled, listening
    fn set_receive(&mut self) -> RtuResult<()>;

    /// Whether real hardware backs this pin
    fn is_available(&self) -> bool;
}

/// Linux sysfs GPIO implementation
///
/// Exports the pin and sets its direction to output on construction.
/// Export may already have happened on a previous run, which is fine.
pub struct SysfsDirectionPin {
    gpio: u32,
    value_path: PathBuf,
}

impl SysfsDirectionPin {
    pub fn new(gpio: u32, base_path: &str) -> RtuResult<Self> {
        let base = PathBuf::from(base_path);
        let gpio_dir = base.join(format!("gpio{}", gpio));

        if !gpio_dir.exists() {
            fs::write(base.join("export"), gpio.to_string())
                .map_err(|e| RtuError::Gpio(format!("export GPIO {}: {}", gpio, e)))?;
        }

        fs::write(gpio_dir.join("direction"), "out")
            .map_err(|e| RtuError::Gpio(format!("set GPIO {} direction: {}", gpio, e)))?;

        info!(gpio, "direction GPIO initialized");

        Ok(Self {
            gpio,
            value_path: gpio_dir.join("value"),
        })
    }

    fn write_value(&self, value: &str) -> RtuResult<()> {
        fs::write(&self.value_path, value)
            .map_err(|e| RtuError::Gpio(format!("write GPIO {}: {}", self.gpio, e)))
    }
}

impl DirectionPin for SysfsDirectionPin {
    fn set_transmit(&mut self) -> RtuResult<()> {
        self.write_value("1")
    }

    fn set_receive(&mut self) -> RtuResult<()> {
        self.write_value("0")
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Log-only stand-in used when the hardware pin cannot be initialized,
/// so development off-target still exercises the full transaction path.
pub struct SimulatedDirectionPin;

impl DirectionPin for SimulatedDirectionPin {
    fn set_transmit(&mut self) -> RtuResult<()> {
        debug!("direction pin (simulated) -> transmit");
        Ok(())
    }

    fn set_receive(&mut self) -> RtuResult<()> {
        debug!("direction pin (simulated) -> receive");
        Ok(())
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Settle delays around a bus turnaround
#[derive(Debug, Clone, Copy)]
pub struct SettleDelays {
    /// After raising the pin, before the first byte goes out
    pub pre_transmit: Duration,
    /// After the frame drains, before the pin drops
    pub post_transmit: Duration,
    /// After the pin drops back to receive
    pub post_receive: Duration,
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            pre_transmit: Duration::from_millis(PRE_TRANSMIT_SETTLE_MS),
            post_transmit: Duration::from_millis(POST_TRANSMIT_SETTLE_MS),
            post_receive: Duration::from_millis(POST_RECEIVE_SETTLE_MS),
        }
    }
}

/// Owns the direction pin and sequences bus turnarounds
pub struct DirectionController {
    pin: Box<dyn DirectionPin>,
    delays: SettleDelays,
}

impl DirectionController {
    /// Build the controller and park the bus in receive mode
    pub fn new(mut pin: Box<dyn DirectionPin>, delays: SettleDelays) -> RtuResult<Self> {
        pin.set_receive()?;
        Ok(Self { pin, delays })
    }

    /// Build a controller from a sysfs GPIO, falling back to the
    /// simulated pin with a warning when the hardware is unavailable.
    pub fn from_gpio(gpio: u32, base_path: &str, delays: SettleDelays) -> RtuResult<Self> {
        match SysfsDirectionPin::new(gpio, base_path) {
            Ok(pin) => Self::new(Box::new(pin), delays),
            Err(e) => {
                warn!(gpio, error = %e, "direction GPIO unavailable, using simulated pin");
                Self::new(Box::new(SimulatedDirectionPin), delays)
            }
        }
    }

    pub fn is_hardware(&self) -> bool {
        self.pin.is_available()
    }

    /// Run `write` with the bus held in transmit mode.
    ///
    /// Sequence: pin high, pre-transmit settle, `write` (which must also
    /// drain the port), post-transmit settle, pin low, post-receive
    /// settle. If `write` fails the pin is still dropped back to receive
    /// before the error propagates.
    pub async fn transmit_guarded<F, Fut>(&mut self, write: F) -> RtuResult<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RtuResult<()>>,
    {
        self.pin.set_transmit()?;
        tokio::time::sleep(self.delays.pre_transmit).await;

        let result = write().await;

        if result.is_ok() {
            tokio::time::sleep(self.delays.post_transmit).await;
        }

        self.pin.set_receive()?;
        tokio::time::sleep(self.delays.post_receive).await;

        result
    }
}
