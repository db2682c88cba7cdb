//! Error types for RTU master operations

use thiserror::Error;

use crate::response::ExceptionCode;

/// Errors produced by frame construction, bus handling and transactions
#[derive(Error, Debug)]
pub enum RtuError {
    /// Request parameters violate protocol limits before any I/O happens
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Failure while writing the request frame to the bus
    #[error("Write failed: {0}")]
    Write(String),

    /// No complete response arrived before the deadline
    #[error("Response timeout after {0} ms")]
    Timeout(u64),

    /// A complete response arrived but failed validation
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The device answered with a Modbus exception
    #[error("Modbus exception: {0}")]
    Exception(ExceptionCode),

    /// Underlying I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port configuration or open failure
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Direction GPIO failure
    #[error("GPIO error: {0}")]
    Gpio(String),
}

impl From<tokio_serial::Error> for RtuError {
    fn from(e: tokio_serial::Error) -> Self {
        RtuError::Serial(e.to_string())
    }
}

/// Result alias used across the crate
pub type RtuResult<T> = Result<T, RtuError>;
