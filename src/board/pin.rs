//! State of a single GPIO line.

use serde::{Deserialize, Serialize};

/// Logic level of a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        self == Level::High
    }

    pub fn is_low(self) -> bool {
        self == Level::Low
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }
}

/// Configured direction/termination of a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinMode {
    Input,
    Output,
    InputPullup,
    InputPulldown,
    OutputOpenDrain,
}

/// Edge condition that fires a pin-change interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterruptMode {
    Change,
    Rising,
    Falling,
}

/// One emulated pin.
///
/// `analog_value` is stored at the canonical 10-bit range (0-1023); the
/// board rescales on read when a different resolution is configured.
#[derive(Debug, Clone)]
pub struct Pin {
    pub value: Level,
    pub mode: PinMode,
    pub pwm_capable: bool,
    pub pwm_value: u8,
    pub analog_value: u16,
    /// True once `pin_mode` has been called (or, for analog pins, after the
    /// first `analog_read`, since analog inputs need no explicit configuration).
    pub configured: bool,
    pub interrupt_mode: Option<InterruptMode>,
    /// Edge-detection memory for interrupt dispatch.
    pub last_value: Level,
}

impl Default for Pin {
    fn default() -> Self {
        Self {
            value: Level::Low,
            mode: PinMode::Input,
            pwm_capable: false,
            pwm_value: 0,
            analog_value: 0,
            configured: false,
            interrupt_mode: None,
            last_value: Level::Low,
        }
    }
}

impl Pin {
    pub fn new(pwm_capable: bool) -> Self {
        Self {
            pwm_capable,
            ..Self::default()
        }
    }

    /// Write a digital value. Only takes effect when the pin is an output.
    pub fn digital_write(&mut self, level: Level) {
        if self.mode == PinMode::Output {
            self.value = level;
        }
    }

    /// Read the stored digital value, whatever the mode.
    pub fn digital_read(&self) -> Level {
        self.value
    }

    /// Write a PWM duty value (0-255).
    ///
    /// Auto-promotes the pin to output, like the real core does, and mirrors
    /// the duty onto the digital value with a mid-scale threshold.
    pub fn analog_write(&mut self, duty: u8) {
        if !self.pwm_capable {
            return;
        }
        if self.mode != PinMode::Output {
            self.mode = PinMode::Output;
            self.configured = true;
        }
        self.pwm_value = duty;
        self.value = Level::from(duty > 127);
    }

    /// Read the stored analog value (canonical 10-bit).
    pub fn analog_read(&self) -> u16 {
        self.analog_value
    }
}
