//! Sketch execution: the `setup()`/`loop()` driver and its watchdog.

pub mod watchdog;

use crate::board::Board;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use watchdog::{Watchdog, WatchdogConfig};

/// User sketch code: `setup` runs once, `loop_step` runs repeatedly at the
/// configured rate, both on the dedicated sketch thread.
pub trait Sketch: Send + 'static {
    fn setup(&mut self, board: &Board);
    fn loop_step(&mut self, board: &Board);
}

/// A sketch thread abandoned mid-hang keeps its sketch instance forever, so
/// the runner builds a fresh instance per (re)start from a factory.
type SketchFactory = Box<dyn Fn() -> Box<dyn Sketch> + Send + Sync>;

/// Drives a sketch against a board and supervises it.
///
/// Three threads cooperate: the sketch thread (the only one expected to
/// block), the watchdog, and whichever thread owns this runner (the
/// transport side). The tick counter increments exactly once per completed
/// `loop_step` and is the watchdog's only liveness signal.
pub struct SketchRunner {
    board: Arc<Board>,
    factory: SketchFactory,
    loop_hz: u32,
    watchdog_config: WatchdogConfig,
    tick: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    frozen: Arc<AtomicBool>,
    sketch_thread: Option<JoinHandle<()>>,
    watchdog: Option<Watchdog>,
}

impl SketchRunner {
    /// Create a stopped runner. `loop_hz` is clamped to 1..=10000.
    pub fn new<F>(board: Arc<Board>, loop_hz: u32, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Sketch> + Send + Sync + 'static,
    {
        Self {
            board,
            factory: Box::new(factory),
            loop_hz: loop_hz.clamp(1, 10_000),
            watchdog_config: WatchdogConfig::default(),
            tick: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            frozen: Arc::new(AtomicBool::new(false)),
            sketch_thread: None,
            watchdog: None,
        }
    }

    pub fn with_watchdog_config(mut self, config: WatchdogConfig) -> Self {
        self.watchdog_config = config;
        self
    }

    /// Completed `loop_step` iterations of the current sketch generation.
    pub fn tick(&self) -> u64 {
        self.tick.load(Ordering::SeqCst)
    }

    /// Shared handle to the tick counter, for transport layers that poll it
    /// from their own threads.
    pub fn tick_handle(&self) -> Arc<AtomicU64> {
        self.tick.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// True once the watchdog has declared the current sketch hung.
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::SeqCst)
    }

    pub fn board(&self) -> &Arc<Board> {
        &self.board
    }

    /// Start the board and the sketch. The watchdog arms as soon as the
    /// sketch thread is spawned, so a `setup()` that never returns is
    /// detected the same way a hung `loop()` is.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        tracing::info!("Starting sketch execution at {} Hz", self.loop_hz);
        self.board.start();
        self.spawn_generation();
    }

    /// Stop the sketch and the board.
    ///
    /// Synchronous (joins the sketch thread) unless a freeze already
    /// forced a detach, in which case the stuck thread is left behind.
    /// Calling `stop` on a stopped runner is a no-op.
    pub fn stop(&mut self) {
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.stop();
        }
        let was_running = self.running.swap(false, Ordering::SeqCst);
        if let Some(handle) = self.sketch_thread.take() {
            if self.is_frozen() {
                // Blocked inside user code; joining would never return.
                drop(handle);
            } else {
                let _ = handle.join();
            }
        }
        if was_running {
            tracing::info!("Sketch execution stopped");
        }
        self.board.stop();
    }

    /// Abandon the current sketch generation and start a fresh one.
    ///
    /// Used after a freeze, but also valid as a plain user-driven restart.
    /// Old threads are signalled and dropped, never joined; transient
    /// peripheral state (serial FIFOs, active tone) is cleared and the tick
    /// counter restarts from zero. Pin configuration is left alone; the
    /// fresh `setup()` reconfigures what it needs.
    pub fn restart(&mut self) {
        tracing::info!("Restarting sketch execution");
        self.running.store(false, Ordering::SeqCst);
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.abandon();
        }
        drop(self.sketch_thread.take());

        self.board.serial().clear();
        self.board.tone_generator().stop();
        self.tick.store(0, Ordering::SeqCst);

        if !self.board.is_running() {
            self.board.start();
        }
        self.spawn_generation();
    }

    /// Spawn a fresh sketch thread + watchdog pair with their own run flag,
    /// so a previous generation still winding down cannot be revived.
    fn spawn_generation(&mut self) {
        self.running = Arc::new(AtomicBool::new(true));
        self.frozen = Arc::new(AtomicBool::new(false));

        let mut sketch = (self.factory)();
        let board = self.board.clone();
        let running = self.running.clone();
        let tick = self.tick.clone();
        let period = Duration::from_secs_f64(1.0 / self.loop_hz as f64);

        self.sketch_thread = Some(thread::spawn(move || {
            sketch.setup(&board);
            // Absolute-time scheduling: each iteration targets the previous
            // target plus one period, so on-time iterations accumulate no
            // drift. Falling behind reschedules from "now" instead of
            // bursting catch-up iterations.
            let mut target = Instant::now() + period;
            while running.load(Ordering::SeqCst) {
                sketch.loop_step(&board);
                tick.fetch_add(1, Ordering::SeqCst);
                let now = Instant::now();
                if now < target {
                    thread::sleep(target - now);
                    target += period;
                } else {
                    target = now + period;
                }
            }
        }));

        self.watchdog = Some(Watchdog::spawn(
            self.watchdog_config.clone(),
            self.tick.clone(),
            self.running.clone(),
            self.frozen.clone(),
        ));
    }
}

impl Drop for SketchRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for SketchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SketchRunner")
            .field("loop_hz", &self.loop_hz)
            .field("tick", &self.tick())
            .field("running", &self.is_running())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}
