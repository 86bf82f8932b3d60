//! Device handlers mapping semantic intents onto protocol commands

mod chassis_led;

pub use chassis_led::ChassisLedHandler;
