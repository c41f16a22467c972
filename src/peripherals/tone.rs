//! Square-wave tone synthesis, standing in for the board's speaker output.
//!
//! Control state (frequency, pin, playing) is atomic and shared across
//! threads; the waveform phase belongs to the renderer alone. A background
//! thread pulls fixed-size chunks from the renderer at real-time pace and
//! hands them to an [`AudioSink`], the seam where a platform audio backend
//! would plug in. The default sink discards samples, which keeps the
//! emulator headless.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const SAMPLE_RATE: u32 = 44_100;
/// Samples per render chunk (0.1 s of mono audio).
pub const CHUNK_SAMPLES: usize = 4_410;
const AMPLITUDE: i16 = 8_000;

/// Destination for rendered sample chunks.
pub trait AudioSink: Send + 'static {
    fn submit(&mut self, samples: &[i16]);
}

/// Sink that drops every chunk.
#[derive(Debug, Default)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn submit(&mut self, _samples: &[i16]) {}
}

#[derive(Debug)]
struct ToneState {
    frequency: AtomicU32,
    pin: AtomicI64,
    playing: AtomicBool,
    reset_phase: AtomicBool,
}

impl Default for ToneState {
    fn default() -> Self {
        Self {
            frequency: AtomicU32::new(0),
            pin: AtomicI64::new(-1),
            playing: AtomicBool::new(false),
            reset_phase: AtomicBool::new(false),
        }
    }
}

/// Renders the current tone into caller-provided sample buffers.
///
/// Owns the waveform phase; nothing else touches it. Never blocks.
pub struct ToneRenderer {
    state: Arc<ToneState>,
    phase: u64,
}

impl ToneRenderer {
    /// Fill a buffer with the next chunk of samples.
    ///
    /// The square wave is the sign of a sine at the current frequency;
    /// silence when no tone is active. The phase wraps at the sample rate.
    pub fn fill(&mut self, samples: &mut [i16]) {
        if self.state.reset_phase.swap(false, Ordering::SeqCst) {
            self.phase = 0;
        }
        let frequency = self.state.frequency.load(Ordering::SeqCst);
        if frequency == 0 || !self.state.playing.load(Ordering::SeqCst) {
            samples.fill(0);
            return;
        }
        for sample in samples.iter_mut() {
            let time = self.phase as f64 / SAMPLE_RATE as f64;
            let sine = (std::f64::consts::TAU * frequency as f64 * time).sin();
            *sample = if sine > 0.0 { AMPLITUDE } else { -AMPLITUDE };
            self.phase += 1;
            if self.phase >= SAMPLE_RATE as u64 {
                self.phase -= SAMPLE_RATE as u64;
            }
        }
    }

    /// Relocate the phase to the given stream position.
    pub fn seek(&mut self, offset: Duration) {
        self.phase = (offset.as_secs_f64() * SAMPLE_RATE as f64) as u64 % SAMPLE_RATE as u64;
    }
}

/// The tone peripheral: continuous square-wave playback on demand.
pub struct ToneGenerator {
    state: Arc<ToneState>,
    alive: Arc<AtomicBool>,
    render_thread: Mutex<Option<JoinHandle<()>>>,
}

impl ToneGenerator {
    /// Create a generator rendering into the given sink.
    pub fn with_sink<S: AudioSink>(mut sink: S) -> Self {
        let state = Arc::new(ToneState::default());
        let alive = Arc::new(AtomicBool::new(true));
        let chunk_period = Duration::from_millis(
            (CHUNK_SAMPLES as u64 * 1_000) / SAMPLE_RATE as u64,
        );
        let handle = {
            let state = state.clone();
            let alive = alive.clone();
            thread::spawn(move || {
                let mut renderer = ToneRenderer { state, phase: 0 };
                let mut buffer = vec![0i16; CHUNK_SAMPLES];
                while alive.load(Ordering::SeqCst) {
                    renderer.fill(&mut buffer);
                    sink.submit(&buffer);
                    thread::sleep(chunk_period);
                }
            })
        };
        Self {
            state,
            alive,
            render_thread: Mutex::new(Some(handle)),
        }
    }

    pub fn new() -> Self {
        Self::with_sink(NullSink)
    }

    /// Start continuous playback. A zero frequency is ignored.
    pub fn play(&self, frequency: u32, pin: usize) {
        if frequency == 0 {
            return;
        }
        self.state.frequency.store(frequency, Ordering::SeqCst);
        self.state.pin.store(pin as i64, Ordering::SeqCst);
        self.state.reset_phase.store(true, Ordering::SeqCst);
        self.state.playing.store(true, Ordering::SeqCst);
    }

    /// Play for a fixed duration, blocking the calling thread meanwhile,
    /// matching the hardware `tone(pin, freq, duration)` semantic.
    pub fn play_for(&self, frequency: u32, duration: Duration, pin: usize) {
        self.play(frequency, pin);
        thread::sleep(duration);
        self.stop();
    }

    /// Stop playback and clear the control state.
    pub fn stop(&self) {
        self.state.playing.store(false, Ordering::SeqCst);
        self.state.frequency.store(0, Ordering::SeqCst);
        self.state.pin.store(-1, Ordering::SeqCst);
        self.state.reset_phase.store(true, Ordering::SeqCst);
    }

    pub fn frequency(&self) -> u32 {
        self.state.frequency.load(Ordering::SeqCst)
    }

    pub fn current_pin(&self) -> Option<usize> {
        let pin = self.state.pin.load(Ordering::SeqCst);
        (pin >= 0).then_some(pin as usize)
    }

    pub fn is_playing(&self) -> bool {
        self.state.playing.load(Ordering::SeqCst)
    }

    /// A renderer sharing this generator's control state. Useful for tests
    /// and for platform backends that drive rendering themselves.
    pub fn renderer(&self) -> ToneRenderer {
        ToneRenderer {
            state: self.state.clone(),
            phase: 0,
        }
    }
}

impl Default for ToneGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ToneGenerator {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        if let Some(handle) = self.render_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for ToneGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToneGenerator")
            .field("frequency", &self.frequency())
            .field("pin", &self.current_pin())
            .field("playing", &self.is_playing())
            .finish()
    }
}
