//! Monotonic clock plus a periodic-callback scheduler, standing in for the
//! hardware timer block.
//!
//! `millis`/`micros` report elapsed time since `start`; registered callbacks
//! fire from whatever thread polls [`update_callbacks`]; the board runs a
//! dedicated polling thread for that while it is started.
//!
//! [`update_callbacks`]: Timer::update_callbacks

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

type TimerCallback = Box<dyn FnMut() + Send + 'static>;

struct ScheduledCallback {
    callback: Arc<Mutex<TimerCallback>>,
    interval: Duration,
    last_fired: Instant,
}

#[derive(Default)]
struct TimerInner {
    started_at: Option<Instant>,
    callbacks: Vec<ScheduledCallback>,
}

/// The emulated timing core.
#[derive(Default)]
pub struct Timer {
    inner: Mutex<TimerInner>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) counting from zero.
    pub fn start(&self) {
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap();
        inner.started_at = Some(now);
        for scheduled in &mut inner.callbacks {
            scheduled.last_fired = now;
        }
    }

    /// Stop counting. `millis`/`micros` report 0 and callbacks stop firing.
    pub fn stop(&self) {
        self.inner.lock().unwrap().started_at = None;
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().unwrap().started_at.is_some()
    }

    /// Milliseconds since `start`, 0 while stopped.
    pub fn millis(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }

    /// Microseconds since `start`, 0 while stopped.
    pub fn micros(&self) -> u64 {
        self.elapsed().as_micros() as u64
    }

    fn elapsed(&self) -> Duration {
        let inner = self.inner.lock().unwrap();
        inner
            .started_at
            .map(|started| started.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    /// Block the calling thread. Sketch `delay()` really blocks, exactly
    /// like the hardware call.
    pub fn delay(&self, ms: u64) {
        thread::sleep(Duration::from_millis(ms));
    }

    pub fn delay_micros(&self, us: u64) {
        thread::sleep(Duration::from_micros(us));
    }

    /// Register a periodic callback.
    pub fn add_callback<F>(&self, callback: F, interval: Duration)
    where
        F: FnMut() + Send + 'static,
    {
        let mut inner = self.inner.lock().unwrap();
        inner.callbacks.push(ScheduledCallback {
            callback: Arc::new(Mutex::new(Box::new(callback))),
            interval,
            last_fired: Instant::now(),
        });
    }

    /// Fire every callback whose interval has elapsed since it last fired.
    ///
    /// Each firing resets that callback's reference point to "now", so a
    /// late poll slips the schedule instead of bursting. Callbacks run
    /// without the internal lock held and may use the timer themselves.
    pub fn update_callbacks(&self) {
        let due: Vec<Arc<Mutex<TimerCallback>>> = {
            let mut inner = self.inner.lock().unwrap();
            if inner.started_at.is_none() {
                return;
            }
            let now = Instant::now();
            inner
                .callbacks
                .iter_mut()
                .filter(|scheduled| now.duration_since(scheduled.last_fired) >= scheduled.interval)
                .map(|scheduled| {
                    scheduled.last_fired = now;
                    scheduled.callback.clone()
                })
                .collect()
        };
        for callback in due {
            if let Ok(mut callback) = callback.lock() {
                callback();
            }
        }
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("Timer")
            .field("running", &inner.started_at.is_some())
            .field("callbacks", &inner.callbacks.len())
            .finish()
    }
}
