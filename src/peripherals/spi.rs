//! Buffered SPI bus.
//!
//! Transfers are recorded into a single bounded buffer. There is no slave
//! model: `transfer` returns the last byte in the buffer, i.e. the byte just
//! sent. Good enough to test sketches that talk to displays or sensors.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Capacity of the transfer buffer, in bytes.
pub const SPI_BUFFER_CAP: usize = 8 * 1024;

#[derive(Debug, Default)]
struct SpiState {
    buffer: VecDeque<u8>,
    enabled: bool,
}

/// The emulated SPI master.
#[derive(Debug, Default)]
pub struct SpiBus {
    state: Mutex<SpiState>,
}

impl SpiBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable the bus and clear the transfer buffer.
    pub fn begin(&self) {
        let mut state = self.state.lock().unwrap();
        state.enabled = true;
        state.buffer.clear();
    }

    /// Disable the bus.
    pub fn end(&self) {
        self.state.lock().unwrap().enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().unwrap().enabled
    }

    /// Send a byte, returning the "received" byte.
    ///
    /// Returns 0 while the bus is disabled.
    pub fn transfer(&self, data: u8) -> u8 {
        let mut state = self.state.lock().unwrap();
        if !state.enabled {
            return 0;
        }
        if state.buffer.len() >= SPI_BUFFER_CAP {
            state.buffer.pop_front();
        }
        state.buffer.push_back(data);
        // "Receive" the last byte on the wire, which is the one just sent.
        state.buffer.back().copied().unwrap_or(0)
    }

    /// Copy of every byte transferred since the last `begin`.
    pub fn buffer_snapshot(&self) -> Vec<u8> {
        self.state.lock().unwrap().buffer.iter().copied().collect()
    }

    /// Back to power-on state: disabled, empty.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        state.enabled = false;
        state.buffer.clear();
    }
}
