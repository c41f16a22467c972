//! Transport-facing data models.
//!
//! Everything the dashboard polls is expressed here as plain serializable
//! structs, so the transport layer never reaches into board internals.

use crate::board::pin::{Level, Pin, PinMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Observable state of one pin.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PinSnapshot {
    pub value: Level,
    pub mode: PinMode,
    pub pwm_capable: bool,
    pub pwm_value: u8,
    pub analog_value: u16,
    pub configured: bool,
}

impl From<&Pin> for PinSnapshot {
    fn from(pin: &Pin) -> Self {
        Self {
            value: pin.value,
            mode: pin.mode,
            pwm_capable: pin.pwm_capable,
            pwm_value: pin.pwm_value,
            analog_value: pin.analog_value,
            configured: pin.configured,
        }
    }
}

/// Static description of the emulated board.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BoardInfo {
    pub name: String,
    pub total_pins: usize,
    pub digital_pins: usize,
    pub analog_pins: usize,
    pub pwm_pins: Vec<usize>,
    pub analog_input_pins: Vec<usize>,
    pub pin_mapping: BTreeMap<String, usize>,
}

/// Current tone output state.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AudioStatus {
    pub playing: bool,
    /// Frequency in Hz, 0 when silent.
    pub frequency: u32,
    pub pin: Option<usize>,
    /// Closest musical note name (12-TET, A4 = 440 Hz), None when silent.
    pub note: Option<String>,
}
