//! Buffered UART channel.
//!
//! Two byte FIFOs (input and output) behind one mutex. The sketch side
//! prints and reads; the transport side injects input with [`add_input`] and
//! drains output with [`drain_output`]. Buffers are bounded: on overflow the
//! oldest bytes are dropped.
//!
//! [`add_input`]: SerialPort::add_input
//! [`drain_output`]: SerialPort::drain_output

use std::collections::VecDeque;
use std::sync::Mutex;

/// Integer formatting base for serial prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberBase {
    Bin,
    Oct,
    Dec,
    Hex,
}

/// Capacity of each FIFO, in bytes.
pub const SERIAL_BUFFER_CAP: usize = 8 * 1024;

#[derive(Debug, Default)]
struct SerialBuffers {
    input: VecDeque<u8>,
    output: VecDeque<u8>,
    enabled: bool,
    baud_rate: u32,
}

/// The emulated UART.
#[derive(Debug, Default)]
pub struct SerialPort {
    buffers: Mutex<SerialBuffers>,
}

impl SerialPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable the port and clear both FIFOs. The baud rate is recorded for
    /// introspection only; nothing in the emulation paces itself by it.
    pub fn begin(&self, baud_rate: u32) {
        let mut buffers = self.buffers.lock().unwrap();
        buffers.enabled = true;
        buffers.baud_rate = baud_rate;
        buffers.input.clear();
        buffers.output.clear();
    }

    /// Disable the port. Buffered bytes stay readable.
    pub fn end(&self) {
        self.buffers.lock().unwrap().enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.buffers.lock().unwrap().enabled
    }

    pub fn baud_rate(&self) -> u32 {
        self.buffers.lock().unwrap().baud_rate
    }

    /// Queue a string on the output FIFO.
    pub fn print(&self, text: &str) {
        let mut buffers = self.buffers.lock().unwrap();
        if !buffers.enabled {
            return;
        }
        for &byte in text.as_bytes() {
            push_bounded(&mut buffers.output, byte);
        }
    }

    /// Queue a string followed by a newline.
    pub fn println(&self, text: &str) {
        let mut buffers = self.buffers.lock().unwrap();
        if !buffers.enabled {
            return;
        }
        for &byte in text.as_bytes() {
            push_bounded(&mut buffers.output, byte);
        }
        push_bounded(&mut buffers.output, b'\n');
    }

    /// Queue an integer rendered in decimal.
    pub fn print_int(&self, value: i64) {
        self.print_int_base(value, NumberBase::Dec);
    }

    pub fn println_int(&self, value: i64) {
        self.println_int_base(value, NumberBase::Dec);
    }

    /// Queue an integer rendered in the given base.
    pub fn print_int_base(&self, value: i64, base: NumberBase) {
        self.print(&format_int(value, base));
    }

    pub fn println_int_base(&self, value: i64, base: NumberBase) {
        self.println(&format_int(value, base));
    }

    pub fn print_float(&self, value: f64) {
        self.print(&value.to_string());
    }

    pub fn println_float(&self, value: f64) {
        self.println(&value.to_string());
    }

    /// Queue one raw byte (not its ASCII rendering).
    pub fn write(&self, byte: u8) {
        let mut buffers = self.buffers.lock().unwrap();
        if !buffers.enabled {
            return;
        }
        push_bounded(&mut buffers.output, byte);
    }

    /// Number of bytes waiting on the input FIFO.
    pub fn available(&self) -> usize {
        self.buffers.lock().unwrap().input.len()
    }

    /// Pop one byte from the input FIFO.
    pub fn read(&self) -> Option<u8> {
        self.buffers.lock().unwrap().input.pop_front()
    }

    /// Transport hook: append bytes to the input FIFO.
    pub fn add_input(&self, data: &str) {
        let mut buffers = self.buffers.lock().unwrap();
        for &byte in data.as_bytes() {
            push_bounded(&mut buffers.input, byte);
        }
    }

    /// Transport hook: take everything off the output FIFO.
    pub fn drain_output(&self) -> String {
        let mut buffers = self.buffers.lock().unwrap();
        let bytes: Vec<u8> = buffers.output.drain(..).collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Drop everything buffered in both directions.
    pub fn clear(&self) {
        let mut buffers = self.buffers.lock().unwrap();
        buffers.input.clear();
        buffers.output.clear();
    }

    /// Back to power-on state: disabled, empty.
    pub fn reset(&self) {
        let mut buffers = self.buffers.lock().unwrap();
        buffers.enabled = false;
        buffers.baud_rate = 0;
        buffers.input.clear();
        buffers.output.clear();
    }
}

fn push_bounded(fifo: &mut VecDeque<u8>, byte: u8) {
    if fifo.len() >= SERIAL_BUFFER_CAP {
        fifo.pop_front();
    }
    fifo.push_back(byte);
}

fn format_int(value: i64, base: NumberBase) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let negative = value < 0;
    let magnitude = value.unsigned_abs();
    let digits = match base {
        NumberBase::Bin => format!("{magnitude:b}"),
        NumberBase::Oct => format!("{magnitude:o}"),
        NumberBase::Dec => magnitude.to_string(),
        NumberBase::Hex => format!("{magnitude:X}"),
    };
    // Sign is rendered in decimal only; other bases print the magnitude.
    if negative && base == NumberBase::Dec {
        format!("-{digits}")
    } else {
        digits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_integers_per_base() {
        assert_eq!(format_int(0, NumberBase::Hex), "0");
        assert_eq!(format_int(255, NumberBase::Hex), "FF");
        assert_eq!(format_int(255, NumberBase::Bin), "11111111");
        assert_eq!(format_int(8, NumberBase::Oct), "10");
        assert_eq!(format_int(-42, NumberBase::Dec), "-42");
        assert_eq!(format_int(-1, NumberBase::Hex), "1");
    }
}
