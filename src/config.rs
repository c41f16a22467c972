//! Board configuration: the static description of a board's pin layout.
//!
//! A board file is TOML; every field has an Arduino Uno default so a partial
//! file (or no file at all) still yields a usable board:
//!
//! ```toml
//! name = "Arduino Nano"
//! pwm_pins = [3, 5, 6, 9, 10, 11]
//! analog_only_pins = [20, 21]
//!
//! [pin_mapping]
//! A0 = 14
//! A6 = 20
//! LED_BUILTIN = 13
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoardConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Pin layout of one board variant. Immutable after [`finalize`] has run.
///
/// [`finalize`]: BoardConfig::finalize
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BoardConfig {
    /// Board name/model.
    #[serde(default = "default_board_name")]
    pub name: String,
    /// Pins that support PWM output.
    #[serde(default = "default_pwm_pins")]
    pub pwm_pins: Vec<usize>,
    /// Named pin -> index mapping (e.g. "A0" -> 14, "LED_BUILTIN" -> 13).
    #[serde(default = "default_pin_mapping")]
    pub pin_mapping: BTreeMap<String, usize>,
    /// Pins with no digital I/O at all (e.g. A6/A7 on the Nano).
    #[serde(default)]
    pub analog_only_pins: Vec<usize>,

    // Derived from pin_mapping, never read from the file.
    #[serde(skip)]
    pub analog_input_pins: Vec<usize>,
    #[serde(skip)]
    pub digital_pins: usize,
    #[serde(skip)]
    pub analog_pins: usize,
    #[serde(skip)]
    pub total_pins: usize,
}

impl Default for BoardConfig {
    fn default() -> Self {
        let mut config = Self {
            name: default_board_name(),
            pwm_pins: default_pwm_pins(),
            pin_mapping: default_pin_mapping(),
            analog_only_pins: Vec::new(),
            analog_input_pins: Vec::new(),
            digital_pins: 0,
            analog_pins: 0,
            total_pins: 0,
        };
        config.finalize();
        config
    }
}

impl BoardConfig {
    /// Compute the derived pin counts from the pin mapping.
    ///
    /// Analog inputs are the mapping entries named `A<digit>`. The lowest
    /// analog index is the digital/analog boundary; the highest analog index
    /// plus one is the total pin count. A board without analog inputs falls
    /// back to 20 digital pins.
    pub fn finalize(&mut self) {
        self.analog_input_pins = self
            .pin_mapping
            .iter()
            .filter(|(name, _)| {
                let bytes = name.as_bytes();
                bytes.len() >= 2 && bytes[0] == b'A' && bytes[1].is_ascii_digit()
            })
            .map(|(_, &index)| index)
            .collect();
        self.analog_input_pins.sort_unstable();

        self.analog_pins = self.analog_input_pins.len();
        if let (Some(&first), Some(&last)) =
            (self.analog_input_pins.first(), self.analog_input_pins.last())
        {
            self.digital_pins = first;
            self.total_pins = last + 1;
        } else {
            self.digital_pins = 20;
            self.total_pins = 20;
        }
    }

    /// Look up a named pin ("A0", "LED_BUILTIN", ...).
    pub fn pin_index(&self, name: &str) -> Option<usize> {
        self.pin_mapping.get(name).copied()
    }

    pub fn is_pwm_pin(&self, pin: usize) -> bool {
        self.pwm_pins.contains(&pin)
    }

    pub fn is_analog_only(&self, pin: usize) -> bool {
        self.analog_only_pins.contains(&pin)
    }
}

fn default_board_name() -> String {
    "Arduino Uno".to_string()
}

fn default_pwm_pins() -> Vec<usize> {
    vec![3, 5, 6, 9, 10, 11]
}

fn default_pin_mapping() -> BTreeMap<String, usize> {
    BTreeMap::from([
        ("A0".to_string(), 14),
        ("A1".to_string(), 15),
        ("A2".to_string(), 16),
        ("A3".to_string(), 17),
        ("A4".to_string(), 18),
        ("A5".to_string(), 19),
        ("LED_BUILTIN".to_string(), 13),
    ])
}

/// Load a board description from a TOML file and compute its derived counts.
pub fn load_board_config(path: &str) -> Result<BoardConfig, BoardConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        tracing::error!("Failed to read board file '{}': {}", path, e);
        BoardConfigError::Io(e)
    })?;
    let mut config: BoardConfig = toml::from_str(&contents).map_err(|e| {
        tracing::error!("Failed to parse board file '{}': {}", path, e);
        BoardConfigError::Toml(e)
    })?;
    config.finalize();
    tracing::info!(
        "Loaded board configuration: {} ({} digital, {} analog)",
        config.name,
        config.digital_pins,
        config.analog_pins
    );
    Ok(config)
}
