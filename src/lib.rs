//! duino-rs: a desktop emulator for Arduino-style boards.
//!
//! The crate emulates a microcontroller board (GPIO pins, UART, SPI, timer,
//! tone output) and runs user sketches against it on a dedicated thread,
//! supervised by a liveness watchdog. A transport layer (web dashboard,
//! test harness, ...) observes the board through serializable snapshots and
//! injects external signals through `force_pin_value`, `set_analog_value`
//! and serial input.

pub mod board;
pub mod config;
pub mod peripherals;
pub mod runtime;
pub mod snapshots;
pub mod util;

pub use board::pin::{InterruptMode, Level, Pin, PinMode};
pub use board::{AnalogReference, Board, LED_BUILTIN};
pub use config::{BoardConfig, BoardConfigError, load_board_config};
pub use peripherals::serial::NumberBase;
pub use runtime::watchdog::WatchdogConfig;
pub use runtime::{Sketch, SketchRunner};
pub use snapshots::{AudioStatus, BoardInfo, PinSnapshot};
