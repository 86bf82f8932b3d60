//! Typed commands for the chassis function group
//!
//! Each command knows its own opcode, how to encode its parameters and how
//! to decode its reply body. The command client stays generic over this
//! trait, so adding a sibling command never touches the client.

use bytes::BytesMut;

use crate::codec::CodecError;
use crate::IdentifyState;

/// Chassis network function
pub const NETFN_CHASSIS: u8 = 0x00;

/// Get Chassis Status command
pub const CMD_GET_CHASSIS_STATUS: u8 = 0x01;

/// Chassis Identify command
pub const CMD_CHASSIS_IDENTIFY: u8 = 0x04;

/// A typed request/response command.
///
/// Value type, constructed per call. `idempotent` governs whether the
/// client may resend after a transport failure.
pub trait Command {
    /// Decoded reply type
    type Output;

    /// Network function of the request
    fn netfn(&self) -> u8;

    /// Command opcode within the network function
    fn cmd(&self) -> u8;

    /// Whether resending after a transport failure is safe
    fn idempotent(&self) -> bool {
        true
    }

    /// Append the parameter bytes to the request body
    fn encode_params(&self, buf: &mut BytesMut);

    /// Decode the reply body (completion code already stripped)
    fn decode_reply(&self, data: &[u8]) -> Result<Self::Output, CodecError>;
}

/// Read the current identify state out of the chassis status.
///
/// The identify state lives in bits [5:4] of the misc chassis state byte:
/// 0 = off, 1 = temporary on, 2 = indefinite on, 3 = reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetChassisIdentify;

impl Command for GetChassisIdentify {
    type Output = IdentifyState;

    fn netfn(&self) -> u8 {
        NETFN_CHASSIS
    }

    fn cmd(&self) -> u8 {
        CMD_GET_CHASSIS_STATUS
    }

    fn encode_params(&self, _buf: &mut BytesMut) {}

    fn decode_reply(&self, data: &[u8]) -> Result<IdentifyState, CodecError> {
        // Chassis status: current power state, last power event, misc state
        if data.len() < 3 {
            return Err(CodecError::ReplyTooShort {
                needed: 3,
                available: data.len(),
            });
        }

        let misc_state = data[2];
        match (misc_state >> 4) & 0x03 {
            0 => Ok(IdentifyState::Off),
            1 | 2 => Ok(IdentifyState::On),
            value => Err(CodecError::InvalidFieldValue {
                field: "identify state",
                value,
            }),
        }
    }
}

/// Set the chassis identify indicator on or off.
///
/// `force` uses the indefinite-on capability; without it, turning on falls
/// back to the controller's default identify interval (empty parameter
/// list). Explicit blink intervals are not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetChassisIdentify {
    pub state: IdentifyState,
    pub force: bool,
}

impl SetChassisIdentify {
    /// Build the command for an endpoint, honoring its capability flags
    pub fn new(state: IdentifyState, supports_force: bool) -> Self {
        Self {
            state,
            force: supports_force,
        }
    }
}

impl Command for SetChassisIdentify {
    type Output = ();

    fn netfn(&self) -> u8 {
        NETFN_CHASSIS
    }

    fn cmd(&self) -> u8 {
        CMD_CHASSIS_IDENTIFY
    }

    fn encode_params(&self, buf: &mut BytesMut) {
        match (self.state, self.force) {
            // Interval byte stays 0; only the force bit selects on
            (IdentifyState::On, true) => buf.extend_from_slice(&[0x00, 0x01]),
            // No force capability: empty body requests the default interval
            (IdentifyState::On, false) => {}
            (IdentifyState::Off, _) => buf.extend_from_slice(&[0x00, 0x00]),
        }
    }

    fn decode_reply(&self, _data: &[u8]) -> Result<(), CodecError> {
        Ok(())
    }
}
