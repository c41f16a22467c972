// Integration tests for the buffered serial and SPI channels.

use duino_rs::peripherals::serial::{NumberBase, SERIAL_BUFFER_CAP, SerialPort};
use duino_rs::peripherals::spi::SpiBus;

#[test]
fn print_and_drain() {
    let serial = SerialPort::new();
    serial.begin(9600);
    serial.print("temp: ");
    serial.println_int(42);
    serial.println("done");
    assert_eq!(serial.drain_output(), "temp: 42\ndone\n");
    // Draining clears the FIFO.
    assert_eq!(serial.drain_output(), "");
}

#[test]
fn prints_integers_in_every_base() {
    let serial = SerialPort::new();
    serial.begin(115_200);
    serial.println_int_base(255, NumberBase::Hex);
    serial.println_int_base(255, NumberBase::Bin);
    serial.println_int_base(8, NumberBase::Oct);
    serial.println_int_base(-42, NumberBase::Dec);
    serial.println_float(3.5);
    assert_eq!(serial.drain_output(), "FF\n11111111\n10\n-42\n3.5\n");
}

#[test]
fn write_pushes_raw_bytes() {
    let serial = SerialPort::new();
    serial.begin(9600);
    serial.write(0x41);
    serial.write(0x0A);
    assert_eq!(serial.drain_output(), "A\n");
}

#[test]
fn input_injection_and_read() {
    let serial = SerialPort::new();
    serial.begin(9600);
    assert_eq!(serial.available(), 0);
    assert_eq!(serial.read(), None);

    serial.add_input("ok\n");
    assert_eq!(serial.available(), 3);
    assert_eq!(serial.read(), Some(b'o'));
    assert_eq!(serial.read(), Some(b'k'));
    assert_eq!(serial.read(), Some(b'\n'));
    assert_eq!(serial.read(), None);
}

#[test]
fn disabled_port_discards_writes() {
    let serial = SerialPort::new();
    serial.print("lost");
    assert_eq!(serial.drain_output(), "");

    serial.begin(9600);
    serial.print("kept");
    serial.end();
    serial.print("lost too");
    assert_eq!(serial.drain_output(), "kept");
}

#[test]
fn begin_clears_stale_buffers() {
    let serial = SerialPort::new();
    serial.begin(9600);
    serial.print("stale");
    serial.add_input("stale");
    serial.begin(9600);
    assert_eq!(serial.drain_output(), "");
    assert_eq!(serial.available(), 0);
}

#[test]
fn output_overflow_drops_oldest() {
    let serial = SerialPort::new();
    serial.begin(9600);
    serial.print(&"x".repeat(SERIAL_BUFFER_CAP));
    serial.print("y");
    let drained = serial.drain_output();
    assert_eq!(drained.len(), SERIAL_BUFFER_CAP);
    assert!(drained.ends_with('y'));
}

#[test]
fn spi_transfer_echoes_the_sent_byte() {
    let spi = SpiBus::new();

    // Disabled bus transfers nothing.
    assert_eq!(spi.transfer(0xAB), 0);
    assert!(spi.buffer_snapshot().is_empty());

    spi.begin();
    assert_eq!(spi.transfer(0x01), 0x01);
    assert_eq!(spi.transfer(0xFF), 0xFF);
    assert_eq!(spi.buffer_snapshot(), vec![0x01, 0xFF]);

    spi.end();
    assert_eq!(spi.transfer(0x02), 0);

    // begin() starts a fresh transaction log.
    spi.begin();
    assert!(spi.buffer_snapshot().is_empty());
}
