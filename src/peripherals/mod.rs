//! Emulated peripherals: buffered buses, the timing core and tone output.

pub mod serial;
pub mod spi;
pub mod timer;
pub mod tone;
