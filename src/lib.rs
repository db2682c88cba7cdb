//! # Voltage RTU
//!
//! Modbus RTU master engine for half-duplex RS-485 buses with
//! GPIO-switched transceivers.
//!
//! The crate covers the complete transaction path: request framing with
//! CRC-16/MODBUS, bus direction turnaround with settle delays, chunked
//! response accumulation with dynamic frame sizing, and response
//! validation including Modbus exception recognition. Eight function
//! codes are supported (FC01-FC06, FC15, FC16).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use voltage_rtu::{RtuMaster, RtuMasterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RtuMasterConfig::default();
//!     let mut master = RtuMaster::open(&config)?;
//!
//!     let registers = master.read_holding_registers(0x0000, 4).await?;
//!     println!("registers: {:?}", registers);
//!
//!     master.write_single_coil(0x0010, true).await?;
//!     Ok(())
//! }
//! ```
//!
//! The master is generic over its byte channel, so tests can drive it
//! over [`tokio::io::duplex`] with a scripted peer instead of a serial
//! port.

pub mod accumulator;
pub mod config;
pub mod constants;
pub mod crc;
pub mod direction;
pub mod error;
pub mod frame;
pub mod master;
pub mod response;

pub use accumulator::{AccumulatorState, ResponseAccumulator};
pub use config::RtuMasterConfig;
pub use crc::{append_crc, crc16, verify_crc};
pub use direction::{
    DirectionController, DirectionPin, SettleDelays, SimulatedDirectionPin, SysfsDirectionPin,
};
pub use error::{RtuError, RtuResult};
pub use frame::Request;
pub use master::RtuMaster;
pub use response::{decode_response, DecodedResult, ExceptionCode};
