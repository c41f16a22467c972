//! The board emulator: central aggregate owning the pins and peripherals.
//!
//! All sketch-facing operations live here. They mirror permissive real
//! hardware: an out-of-range pin index silently does nothing and reads
//! return a default, so a sketch can never observe an error from this API.

pub mod pin;

use crate::config::BoardConfig;
use crate::peripherals::serial::SerialPort;
use crate::peripherals::spi::SpiBus;
use crate::peripherals::timer::Timer;
use crate::peripherals::tone::ToneGenerator;
use crate::snapshots::{AudioStatus, BoardInfo, PinSnapshot};
use crate::util::note_name;
use pin::{InterruptMode, Level, Pin, PinMode};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Built-in LED pin on Uno-style boards.
pub const LED_BUILTIN: usize = 13;

/// Reference source for analog conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalogReference {
    #[default]
    Default,
    Internal,
    External,
}

/// Interrupt handlers are capturing closures owned by the board. Each one
/// sits behind its own lock so dispatch never holds the handler table while
/// user code runs.
type InterruptHandler = Arc<Mutex<Box<dyn FnMut() + Send + 'static>>>;

thread_local! {
    // Set while an interrupt handler runs on this thread.
    static DISPATCHING: Cell<bool> = const { Cell::new(false) };
}

/// The emulated board.
///
/// Shared between the sketch thread, the watchdog and transport-facing
/// callers; every method takes `&self` and synchronizes internally.
pub struct Board {
    config: BoardConfig,
    pins: Mutex<Vec<Pin>>,
    handlers: Mutex<HashMap<usize, InterruptHandler>>,
    serial: SerialPort,
    spi: SpiBus,
    timer: Arc<Timer>,
    tone: ToneGenerator,
    rng: Mutex<StdRng>,
    running: Arc<AtomicBool>,
    analog_read_bits: AtomicU8,
    analog_write_bits: AtomicU8,
    analog_reference: Mutex<AnalogReference>,
    poll_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Board {
    pub fn new(config: BoardConfig) -> Self {
        tracing::info!(
            "Initializing board: {} ({} pins, {} PWM-capable)",
            config.name,
            config.total_pins,
            config.pwm_pins.len()
        );
        let pins = initial_pins(&config);
        Self {
            config,
            pins: Mutex::new(pins),
            handlers: Mutex::new(HashMap::new()),
            serial: SerialPort::new(),
            spi: SpiBus::new(),
            timer: Arc::new(Timer::new()),
            tone: ToneGenerator::new(),
            rng: Mutex::new(StdRng::from_os_rng()),
            running: Arc::new(AtomicBool::new(false)),
            analog_read_bits: AtomicU8::new(10),
            analog_write_bits: AtomicU8::new(8),
            analog_reference: Mutex::new(AnalogReference::Default),
            poll_thread: Mutex::new(None),
        }
    }

    // ----- lifecycle -------------------------------------------------------

    /// Start the timer and the background thread that services timer
    /// callbacks (~1 kHz poll).
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.timer.start();
        let timer = self.timer.clone();
        let running = self.running.clone();
        let handle = thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                timer.update_callbacks();
                thread::sleep(Duration::from_millis(1));
            }
        });
        *self.poll_thread.lock().unwrap() = Some(handle);
        tracing::info!("Board started: {}", self.config.name);
    }

    /// Stop the timer and join the callback thread. Calling `stop` on a
    /// stopped board is a no-op.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.poll_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
        self.timer.stop();
        tracing::info!("Board stopped: {}", self.config.name);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Reinitialize every pin and peripheral. Pin state otherwise persists
    /// across start/stop; this is the explicit way back to power-on state.
    pub fn reset(&self) {
        *self.pins.lock().unwrap() = initial_pins(&self.config);
        self.handlers.lock().unwrap().clear();
        self.serial.reset();
        self.spi.reset();
        self.tone.stop();
        self.analog_read_bits.store(10, Ordering::SeqCst);
        self.analog_write_bits.store(8, Ordering::SeqCst);
        *self.analog_reference.lock().unwrap() = AnalogReference::Default;
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    // ----- digital I/O -----------------------------------------------------

    /// Configure a pin. Pull terminations force the documented default level
    /// at configuration time: pull-up reads high, pull-down reads low.
    pub fn pin_mode(&self, pin: usize, mode: PinMode) {
        let mut pins = self.pins.lock().unwrap();
        if let Some(p) = pins.get_mut(pin) {
            p.mode = mode;
            p.configured = true;
            match mode {
                PinMode::InputPullup => p.value = Level::High,
                PinMode::InputPulldown => p.value = Level::Low,
                _ => {}
            }
        }
    }

    /// Write a digital level. Ignored unless the pin is an output; either
    /// way the pin's interrupt condition is evaluated.
    pub fn digital_write(&self, pin: usize, level: Level) {
        {
            let mut pins = self.pins.lock().unwrap();
            match pins.get_mut(pin) {
                Some(p) => p.digital_write(level),
                None => return,
            }
        }
        self.check_interrupt(pin);
    }

    /// Read a pin's digital level, whatever its mode. Unknown pins read low.
    pub fn digital_read(&self, pin: usize) -> Level {
        self.pins
            .lock()
            .unwrap()
            .get(pin)
            .map(Pin::digital_read)
            .unwrap_or(Level::Low)
    }

    /// Set a pin's level regardless of its mode: the hook transport layers
    /// use to simulate buttons and external signals. Interrupts fire as if
    /// the edge came from real hardware.
    pub fn force_pin_value(&self, pin: usize, level: Level) {
        {
            let mut pins = self.pins.lock().unwrap();
            match pins.get_mut(pin) {
                Some(p) => p.value = level,
                None => return,
            }
        }
        self.check_interrupt(pin);
    }

    // ----- analog I/O ------------------------------------------------------

    /// Write a PWM duty value (0-255) to a PWM-capable pin.
    pub fn analog_write(&self, pin: usize, duty: u8) {
        let mut pins = self.pins.lock().unwrap();
        if let Some(p) = pins.get_mut(pin) {
            p.analog_write(duty);
        }
    }

    /// Read an analog value.
    ///
    /// Logical channel numbers (0..analog_pins) are remapped to their
    /// physical indices first, so `analog_read(0)` reads A0. Analog pins
    /// need no `pin_mode`; the first read marks them configured. The stored
    /// 10-bit value is rescaled to the configured read resolution.
    pub fn analog_read(&self, pin: usize) -> u16 {
        let pin = self.resolve_analog_pin(pin);
        let mut pins = self.pins.lock().unwrap();
        match pins.get_mut(pin) {
            Some(p) => {
                p.configured = true;
                rescale(p.analog_read(), self.analog_read_bits.load(Ordering::SeqCst))
            }
            None => 0,
        }
    }

    /// Set a pin's analog value (canonical 10-bit), deriving the digital
    /// level with the fixed mid-scale threshold. Transport-side hook for
    /// simulated sensors and potentiometers.
    pub fn set_analog_value(&self, pin: usize, value: u16) {
        let mut pins = self.pins.lock().unwrap();
        if let Some(p) = pins.get_mut(pin) {
            p.analog_value = value.min(1023);
            p.value = Level::from(p.analog_value > 512);
        }
    }

    /// Set a PWM duty value without driving the pin, for the dashboard's
    /// PWM slider. Returns false when the pin cannot do PWM.
    pub fn set_pwm_value(&self, pin: usize, duty: u8) -> bool {
        let mut pins = self.pins.lock().unwrap();
        match pins.get_mut(pin) {
            Some(p) if p.pwm_capable => {
                p.pwm_value = duty;
                true
            }
            _ => false,
        }
    }

    pub fn set_analog_read_resolution(&self, bits: u8) {
        self.analog_read_bits.store(bits.clamp(1, 16), Ordering::SeqCst);
    }

    pub fn analog_read_resolution(&self) -> u8 {
        self.analog_read_bits.load(Ordering::SeqCst)
    }

    pub fn set_analog_write_resolution(&self, bits: u8) {
        self.analog_write_bits.store(bits.clamp(1, 16), Ordering::SeqCst);
    }

    pub fn analog_write_resolution(&self) -> u8 {
        self.analog_write_bits.load(Ordering::SeqCst)
    }

    pub fn set_analog_reference(&self, reference: AnalogReference) {
        *self.analog_reference.lock().unwrap() = reference;
    }

    pub fn analog_reference(&self) -> AnalogReference {
        *self.analog_reference.lock().unwrap()
    }

    fn resolve_analog_pin(&self, pin: usize) -> usize {
        self.config
            .analog_input_pins
            .get(pin)
            .copied()
            .unwrap_or(pin)
    }

    // ----- interrupts ------------------------------------------------------

    /// Attach an edge-triggered interrupt handler to a pin. The handler is
    /// an owned closure; it replaces any previous one.
    pub fn attach_interrupt<F>(&self, pin: usize, callback: F, mode: InterruptMode)
    where
        F: FnMut() + Send + 'static,
    {
        let mut pins = self.pins.lock().unwrap();
        let Some(p) = pins.get_mut(pin) else { return };
        p.interrupt_mode = Some(mode);
        p.last_value = p.value;
        drop(pins);
        self.handlers
            .lock()
            .unwrap()
            .insert(pin, Arc::new(Mutex::new(Box::new(callback))));
    }

    pub fn detach_interrupt(&self, pin: usize) {
        if let Some(p) = self.pins.lock().unwrap().get_mut(pin) {
            p.interrupt_mode = None;
        }
        self.handlers.lock().unwrap().remove(&pin);
    }

    /// Evaluate a pin's edge condition and run its handler if it holds.
    ///
    /// The edge memory updates unconditionally, so a missed poll can never
    /// double-fire. Handlers run synchronously on the writing thread;
    /// dispatch is masked while a handler is already running on that thread,
    /// the way interrupts are masked inside an ISR, which also makes
    /// handlers that write pins safe.
    fn check_interrupt(&self, pin: usize) {
        let Some(handler) = self.triggered_handler(pin) else {
            return;
        };
        if DISPATCHING.with(|flag| flag.replace(true)) {
            return;
        }
        if let Ok(mut callback) = handler.lock() {
            callback();
        }
        DISPATCHING.with(|flag| flag.set(false));
    }

    fn triggered_handler(&self, pin: usize) -> Option<InterruptHandler> {
        let triggered = {
            let mut pins = self.pins.lock().unwrap();
            let p = pins.get_mut(pin)?;
            let mode = p.interrupt_mode?;
            let current = p.value;
            let last = p.last_value;
            p.last_value = current;
            match mode {
                InterruptMode::Change => current != last,
                InterruptMode::Rising => last == Level::Low && current == Level::High,
                InterruptMode::Falling => last == Level::High && current == Level::Low,
            }
        };
        if !triggered {
            return None;
        }
        self.handlers.lock().unwrap().get(&pin).cloned()
    }

    // ----- timing ----------------------------------------------------------

    pub fn millis(&self) -> u64 {
        self.timer.millis()
    }

    pub fn micros(&self) -> u64 {
        self.timer.micros()
    }

    /// Block the calling thread (normally the sketch thread).
    pub fn delay(&self, ms: u64) {
        self.timer.delay(ms);
    }

    pub fn delay_micros(&self, us: u64) {
        self.timer.delay_micros(us);
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    // ----- tone ------------------------------------------------------------

    /// Start a continuous tone on a pin, driving the pin high while it
    /// plays. An unconfigured pin is promoted to output first.
    pub fn tone(&self, pin: usize, frequency: u32) {
        self.prepare_tone_pin(pin);
        self.digital_write(pin, Level::High);
        self.tone.play(frequency, pin);
    }

    /// Play a tone for a fixed duration. Blocks the calling thread for the
    /// duration, then silences the pin.
    pub fn tone_for(&self, pin: usize, frequency: u32, duration: Duration) {
        self.prepare_tone_pin(pin);
        self.digital_write(pin, Level::High);
        self.tone.play_for(frequency, duration, pin);
        self.digital_write(pin, Level::Low);
    }

    /// Stop the current tone and pull the pin low.
    pub fn no_tone(&self, pin: usize) {
        self.tone.stop();
        self.digital_write(pin, Level::Low);
    }

    fn prepare_tone_pin(&self, pin: usize) {
        let configured = self
            .pins
            .lock()
            .unwrap()
            .get(pin)
            .map(|p| p.configured)
            .unwrap_or(true);
        if !configured {
            self.pin_mode(pin, PinMode::Output);
        }
    }

    pub fn tone_generator(&self) -> &ToneGenerator {
        &self.tone
    }

    // ----- buses -----------------------------------------------------------

    pub fn serial(&self) -> &SerialPort {
        &self.serial
    }

    pub fn spi(&self) -> &SpiBus {
        &self.spi
    }

    // ----- misc sketch API -------------------------------------------------

    /// Measure a pulse on a pin. There is no real signal to measure, so this
    /// returns a plausible pseudo-random width (1000-1499 us) when the pin
    /// already sits at the expected level, else 0.
    pub fn pulse_in(&self, pin: usize, level: Level, _timeout: Duration) -> u64 {
        if self.digital_read(pin) == level {
            self.rng.lock().unwrap().random_range(1000..1500)
        } else {
            0
        }
    }

    /// Random integer in `0..max`.
    pub fn random(&self, max: i64) -> i64 {
        self.random_range(0, max)
    }

    /// Random integer in `min..max`.
    pub fn random_range(&self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        self.rng.lock().unwrap().random_range(min..max)
    }

    /// Reseed the board's generator; sketches and tests get deterministic
    /// `random`/`pulse_in` sequences from a fixed seed.
    pub fn random_seed(&self, seed: u64) {
        *self.rng.lock().unwrap() = StdRng::seed_from_u64(seed);
    }

    // ----- introspection ---------------------------------------------------

    /// Snapshot of one pin, or None for an out-of-range index.
    pub fn pin_snapshot(&self, pin: usize) -> Option<PinSnapshot> {
        self.pins.lock().unwrap().get(pin).map(PinSnapshot::from)
    }

    /// Snapshot of every pin, indexed by pin number.
    pub fn pins_snapshot(&self) -> Vec<PinSnapshot> {
        self.pins.lock().unwrap().iter().map(PinSnapshot::from).collect()
    }

    /// Static board metadata for the dashboard.
    pub fn board_info(&self) -> BoardInfo {
        BoardInfo {
            name: self.config.name.clone(),
            total_pins: self.config.total_pins,
            digital_pins: self.config.digital_pins,
            analog_pins: self.config.analog_pins,
            pwm_pins: self.config.pwm_pins.clone(),
            analog_input_pins: self.config.analog_input_pins.clone(),
            pin_mapping: self.config.pin_mapping.clone(),
        }
    }

    /// Current audio state, with the closest musical note for display.
    pub fn audio_status(&self) -> AudioStatus {
        let frequency = self.tone.frequency();
        AudioStatus {
            playing: self.tone.is_playing(),
            frequency,
            pin: self.tone.current_pin(),
            note: note_name(frequency as f64),
        }
    }
}

impl Drop for Board {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Board")
            .field("name", &self.config.name)
            .field("total_pins", &self.config.total_pins)
            .field("running", &self.is_running())
            .finish()
    }
}

fn initial_pins(config: &BoardConfig) -> Vec<Pin> {
    (0..config.total_pins)
        .map(|index| Pin::new(config.is_pwm_pin(index)))
        .collect()
}

fn rescale(value: u16, bits: u8) -> u16 {
    match bits.cmp(&10) {
        std::cmp::Ordering::Equal => value,
        std::cmp::Ordering::Greater => value << (bits - 10),
        std::cmp::Ordering::Less => value >> (10 - bits),
    }
}
