//! Device-handler contract consumed from the host framework
//!
//! A device is one managed instrument (here: the chassis identify
//! indicator of a BMC) with the endpoint configuration needed to reach
//! it. Handlers implement the `{read, write}` capability interface and
//! are looked up through the typed registry.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use bmclink_protocol::{now_ms, Endpoint, ExecuteError};

/// A managed device instance from the inventory
#[derive(Debug, Clone)]
pub struct Device {
    /// Inventory identity of the device
    pub id: String,
    /// Device type the handler registry keys on
    pub device_type: String,
    /// Device model the handler registry keys on
    pub model: String,
    /// How to reach the controller backing this device
    pub data: Endpoint,
}

/// One semantic value reported upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    /// What is being read (e.g. "state")
    pub reading_type: String,
    /// The decoded value
    pub value: String,
    /// Capture time in milliseconds since Unix epoch
    pub timestamp_ms: u64,
}

impl Reading {
    /// Create a reading stamped with the current time
    pub fn new(reading_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            reading_type: reading_type.into(),
            value: value.into(),
            timestamp_ms: now_ms(),
        }
    }
}

/// A write request from the host framework
#[derive(Debug, Clone, Default)]
pub struct WriteRequest {
    /// Named action to perform (e.g. "state")
    pub action: String,
    /// Raw parameter bytes supplied by the caller
    pub raw: Vec<Bytes>,
}

impl WriteRequest {
    pub fn new(action: impl Into<String>, raw: Vec<Bytes>) -> Self {
        Self {
            action: action.into(),
            raw,
        }
    }
}

/// Failure of a handler operation.
///
/// Caller errors are rejected before any wire traffic; protocol errors
/// carry the command client's classification through unchanged.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("{0}")]
    Caller(String),

    #[error(transparent)]
    Protocol(#[from] ExecuteError),
}

impl HandlerError {
    /// Whether this failure was the caller's input, not the device
    pub fn is_caller_error(&self) -> bool {
        matches!(self, HandlerError::Caller(_))
    }
}

/// Read/write capability interface for one (type, model) pair
#[async_trait]
pub trait DeviceHandler: Send + Sync {
    /// Device type this handler serves
    fn device_type(&self) -> &'static str;

    /// Device model this handler serves
    fn model(&self) -> &'static str;

    /// Read the device, emitting one reading per tracked value
    async fn read(&self, device: &Device) -> Result<Vec<Reading>, HandlerError>;

    /// Apply a write request to the device
    async fn write(&self, device: &Device, request: &WriteRequest) -> Result<(), HandlerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_carries_timestamp() {
        let reading = Reading::new("state", "on");
        assert_eq!(reading.reading_type, "state");
        assert_eq!(reading.value, "on");
        assert!(reading.timestamp_ms > 0);
    }

    #[test]
    fn test_handler_error_classification() {
        let caller = HandlerError::Caller("bad token".into());
        assert!(caller.is_caller_error());

        let protocol = HandlerError::Protocol(ExecuteError::DeviceRejected {
            code: bmclink_protocol::CompletionCode(0xC1),
        });
        assert!(!protocol.is_caller_error());
    }
}
