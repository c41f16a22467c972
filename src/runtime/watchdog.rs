//! Liveness watchdog for the sketch thread.
//!
//! A hung `loop()` cannot be cancelled (no safe forced thread termination
//! exists), so the watchdog only *detects* the hang: it watches the tick
//! counter, and when it stalls past the timeout it flips the running flag
//! off, marks the runner frozen and exits. The stuck thread is abandoned by
//! the runner, never joined; each restart of a hung sketch leaks one thread
//! for the life of the process.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Polling cadence and stall threshold for freeze detection.
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    /// How often the tick counter is sampled.
    pub poll_interval: Duration,
    /// How long the counter may stay unchanged before the sketch is
    /// declared hung.
    pub stall_timeout: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            stall_timeout: Duration::from_secs(5),
        }
    }
}

/// Handle to a spawned watchdog thread.
pub struct Watchdog {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl Watchdog {
    /// Arm a watchdog over the given tick counter.
    ///
    /// `running` is the sketch generation's run flag (cleared on freeze,
    /// which also tells the sketch thread to wind down if it ever can);
    /// `frozen` is the runner-visible freeze marker.
    pub fn spawn(
        config: WatchdogConfig,
        tick: Arc<AtomicU64>,
        running: Arc<AtomicBool>,
        frozen: Arc<AtomicBool>,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let thread_shutdown = shutdown.clone();
        let handle = thread::spawn(move || {
            let mut last_tick = tick.load(Ordering::SeqCst);
            let mut stalled = Duration::ZERO;
            loop {
                thread::sleep(config.poll_interval);
                if thread_shutdown.load(Ordering::SeqCst) || !running.load(Ordering::SeqCst) {
                    break;
                }
                let current = tick.load(Ordering::SeqCst);
                if current != last_tick {
                    last_tick = current;
                    stalled = Duration::ZERO;
                    continue;
                }
                stalled += config.poll_interval;
                if stalled >= config.stall_timeout {
                    tracing::error!(
                        tick = current,
                        "Sketch loop stalled for {:?}; declaring it hung",
                        stalled
                    );
                    frozen.store(true, Ordering::SeqCst);
                    running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        });
        Self {
            handle: Some(handle),
            shutdown,
        }
    }

    /// Clean shutdown: signal the thread and wait for it.
    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Restart path: signal the thread but do not wait. It exits on its own
    /// within one poll interval.
    pub fn abandon(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.handle.take();
    }
}
