//! BMC Management Protocol Client
//!
//! This crate provides the wire codec, transport abstraction and command
//! client for talking to baseboard management controllers over an
//! out-of-band channel. The plugin daemon builds its device handlers on
//! top of [`client::CommandClient`].

pub mod client;
pub mod codec;
pub mod command;
pub mod session;
pub mod transport;

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub use client::{CommandClient, ExecuteError, RetryPolicy};
pub use codec::CodecError;
pub use command::{Command, GetChassisIdentify, SetChassisIdentify};
pub use transport::{TcpTransport, Transport, TransportError};

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Protocol timing and retry parameters
pub mod limits {
    /// Per-exchange response timeout in milliseconds
    pub const REQUEST_TIMEOUT_MS: u64 = 3000;

    /// Connection establishment timeout in milliseconds
    pub const CONNECT_TIMEOUT_MS: u64 = 5000;

    /// Maximum attempts per command before giving up
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Initial retry backoff in milliseconds (doubles per attempt)
    pub const BACKOFF_BASE_MS: u64 = 100;

    /// Maximum retry backoff in milliseconds
    pub const BACKOFF_CAP_MS: u64 = 2000;
}

/// An addressable remote management controller.
///
/// Immutable after construction; one per managed device. The `address` also
/// serves as the key for per-endpoint session lookup.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Network address of the controller (host:port)
    pub address: String,
    /// Authentication username
    pub username: String,
    /// Authentication password
    pub password: String,
    /// Whether the controller supports forced (indefinite) identify
    pub supports_force_identify: bool,
    /// Per-endpoint response timeout override
    pub request_timeout: Option<Duration>,
}

impl Endpoint {
    /// Create an endpoint with default session parameters
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            username: String::new(),
            password: String::new(),
            supports_force_identify: true,
            request_timeout: None,
        }
    }
}

/// Chassis identify indicator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifyState {
    On,
    Off,
}

impl IdentifyState {
    /// Parse a caller-supplied state token, case-insensitively.
    ///
    /// Returns `None` for anything other than "on"/"off" so the caller can
    /// reject the token before any wire traffic occurs.
    pub fn from_token(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("on") {
            Some(IdentifyState::On)
        } else if token.eq_ignore_ascii_case("off") {
            Some(IdentifyState::Off)
        } else {
            None
        }
    }
}

impl fmt::Display for IdentifyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifyState::On => write!(f, "on"),
            IdentifyState::Off => write!(f, "off"),
        }
    }
}

/// Completion code returned by the controller in every response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionCode(pub u8);

impl CompletionCode {
    /// Command completed normally
    pub const SUCCESS: CompletionCode = CompletionCode(0x00);

    /// Whether this code indicates success
    pub fn is_success(&self) -> bool {
        self.0 == 0x00
    }

    /// Human-readable meaning of the code
    pub fn describe(&self) -> &'static str {
        match self.0 {
            0x00 => "command completed normally",
            0xC0 => "node busy",
            0xC1 => "invalid command",
            0xC3 => "processing timeout",
            0xC7 => "request data length invalid",
            0xC9 => "parameter out of range",
            0xCC => "invalid data field in request",
            0xD3 => "destination unavailable",
            0xD5 => "command not supported in present state",
            0xFF => "unspecified error",
            _ => "unknown completion code",
        }
    }
}

impl fmt::Display for CompletionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x} ({})", self.0, self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_state_token_parsing() {
        assert_eq!(IdentifyState::from_token("on"), Some(IdentifyState::On));
        assert_eq!(IdentifyState::from_token("ON"), Some(IdentifyState::On));
        assert_eq!(IdentifyState::from_token("On"), Some(IdentifyState::On));
        assert_eq!(IdentifyState::from_token("off"), Some(IdentifyState::Off));
        assert_eq!(IdentifyState::from_token("OFF"), Some(IdentifyState::Off));
        assert_eq!(IdentifyState::from_token("blink"), None);
        assert_eq!(IdentifyState::from_token(""), None);
    }

    #[test]
    fn test_completion_code_success() {
        assert!(CompletionCode::SUCCESS.is_success());
        assert!(!CompletionCode(0xC1).is_success());
    }

    #[test]
    fn test_completion_code_display() {
        let code = CompletionCode(0xC1);
        let text = code.to_string();
        assert!(text.contains("0xc1"));
        assert!(text.contains("invalid command"));
    }

    #[test]
    fn test_endpoint_defaults() {
        let endpoint = Endpoint::new("10.0.0.5:623");
        assert_eq!(endpoint.address, "10.0.0.5:623");
        assert!(endpoint.supports_force_identify);
        assert!(endpoint.request_timeout.is_none());
    }
}
