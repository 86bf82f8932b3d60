//! Chassis identify (LED) handler
//!
//! Chassis identify makes the chassis physically identify itself, by
//! blinking a user-visible light or beeping a speaker. Earlier inventory
//! schemas modeled it as an LED device, so the handler keeps that type
//! even though the mechanism is implementation-chosen.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use bmclink_protocol::{
    CommandClient, GetChassisIdentify, IdentifyState, SetChassisIdentify,
};

use crate::device::{Device, DeviceHandler, HandlerError, Reading, WriteRequest};

/// Write actions supported by the chassis identify device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteAction {
    /// Set the identify state
    State,
}

impl WriteAction {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "state" => Some(WriteAction::State),
            _ => None,
        }
    }
}

/// Handler for the bmc-chassis-led device
pub struct ChassisLedHandler {
    client: Arc<CommandClient>,
}

impl ChassisLedHandler {
    pub fn new(client: Arc<CommandClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeviceHandler for ChassisLedHandler {
    fn device_type(&self) -> &'static str {
        "led"
    }

    fn model(&self) -> &'static str {
        "bmc-chassis-led"
    }

    async fn read(&self, device: &Device) -> Result<Vec<Reading>, HandlerError> {
        let state = self.client.execute(&device.data, &GetChassisIdentify).await?;

        debug!("chassis identify on {} is {}", device.id, state);
        Ok(vec![Reading::new("state", state.to_string())])
    }

    async fn write(&self, device: &Device, request: &WriteRequest) -> Result<(), HandlerError> {
        // A raw value is always required for identify writes
        if request.raw.is_empty() {
            return Err(HandlerError::Caller(
                "no values specified for 'raw', but required".into(),
            ));
        }

        let action = WriteAction::from_name(&request.action).ok_or_else(|| {
            HandlerError::Caller(format!(
                "action '{}' is not supported for chassis identify devices",
                request.action
            ))
        })?;

        match action {
            WriteAction::State => {
                let token = std::str::from_utf8(&request.raw[0]).map_err(|_| {
                    HandlerError::Caller("raw value for 'state' is not valid UTF-8".into())
                })?;

                // TODO (identify intervals): a timed blink needs its own action
                // or a second raw value; until that is designed only on/off is
                // accepted.
                let state = IdentifyState::from_token(token).ok_or_else(|| {
                    HandlerError::Caller(format!(
                        "unsupported command for chassis identify 'state' action: {}",
                        token
                    ))
                })?;

                let command =
                    SetChassisIdentify::new(state, device.data.supports_force_identify);
                self.client.execute(&device.data, &command).await?;

                debug!("chassis identify on {} set to {}", device.id, state);
                Ok(())
            }
        }
    }
}
