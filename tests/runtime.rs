// Integration tests for the sketch runner and the watchdog.

use duino_rs::board::Board;
use duino_rs::board::pin::{Level, PinMode};
use duino_rs::config::BoardConfig;
use duino_rs::runtime::watchdog::WatchdogConfig;
use duino_rs::runtime::{Sketch, SketchRunner};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

fn create_test_board() -> Arc<Board> {
    Arc::new(Board::new(BoardConfig::default()))
}

/// Fast watchdog so hang tests finish in well under a second.
fn fast_watchdog() -> WatchdogConfig {
    WatchdogConfig {
        poll_interval: Duration::from_millis(20),
        stall_timeout: Duration::from_millis(100),
    }
}

struct CountingSketch {
    setups: Arc<AtomicUsize>,
    loops: Arc<AtomicUsize>,
}

impl Sketch for CountingSketch {
    fn setup(&mut self, board: &Board) {
        board.pin_mode(13, PinMode::Output);
        self.setups.fetch_add(1, Ordering::SeqCst);
    }

    fn loop_step(&mut self, board: &Board) {
        board.digital_write(13, Level::High);
        self.loops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Completes setup, then blocks forever inside the second loop iteration.
struct HangingSketch;

impl Sketch for HangingSketch {
    fn setup(&mut self, _board: &Board) {}

    fn loop_step(&mut self, _board: &Board) {
        loop {
            thread::sleep(Duration::from_secs(3600));
        }
    }
}

fn wait_for<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn runs_setup_once_then_loops_at_the_configured_rate() {
    let board = create_test_board();
    let setups = Arc::new(AtomicUsize::new(0));
    let loops = Arc::new(AtomicUsize::new(0));

    let (setups_f, loops_f) = (setups.clone(), loops.clone());
    let mut runner = SketchRunner::new(board.clone(), 100, move || {
        Box::new(CountingSketch {
            setups: setups_f.clone(),
            loops: loops_f.clone(),
        })
    });

    runner.start();
    assert!(runner.is_running());
    assert!(wait_for(|| runner.tick() >= 5, Duration::from_secs(2)));

    assert_eq!(setups.load(Ordering::SeqCst), 1);
    // Each completed loop bumps the tick exactly once.
    assert!(loops.load(Ordering::SeqCst) as u64 >= runner.tick());
    assert_eq!(board.digital_read(13), Level::High);

    runner.stop();
    assert!(!runner.is_running());
    assert!(!board.is_running());

    let tick_after_stop = runner.tick();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(runner.tick(), tick_after_stop);
}

#[test]
fn stop_twice_is_a_no_op() {
    let board = create_test_board();
    let mut runner = SketchRunner::new(board, 100, || Box::new(HangingSketch));
    runner.stop();
    runner.stop();
    assert!(!runner.is_running());
}

#[test]
fn loop_rate_is_roughly_honored() {
    let board = create_test_board();
    let loops = Arc::new(AtomicUsize::new(0));
    let setups = Arc::new(AtomicUsize::new(0));
    let (setups_f, loops_f) = (setups.clone(), loops.clone());
    let mut runner = SketchRunner::new(board, 50, move || {
        Box::new(CountingSketch {
            setups: setups_f.clone(),
            loops: loops_f.clone(),
        })
    });

    runner.start();
    thread::sleep(Duration::from_millis(500));
    let ticks = runner.tick();
    runner.stop();

    // 50 Hz over 0.5 s is ~25 iterations; allow generous scheduling slack.
    assert!((15..=35).contains(&ticks), "saw {ticks} ticks");
}

#[test]
fn watchdog_declares_a_hung_sketch() {
    let board = create_test_board();
    let mut runner = SketchRunner::new(board, 100, || Box::new(HangingSketch))
        .with_watchdog_config(fast_watchdog());

    runner.start();
    assert!(wait_for(|| runner.is_frozen(), Duration::from_secs(2)));
    assert!(!runner.is_running());
    let stalled_tick = runner.tick();

    // stop() after a freeze must not hang on the unjoinable thread.
    runner.stop();
    assert_eq!(runner.tick(), stalled_tick);
}

#[test]
fn restart_recovers_from_a_freeze() {
    let board = create_test_board();
    let launches = Arc::new(AtomicUsize::new(0));

    // First generation hangs; every later one counts ticks normally.
    let launches_f = launches.clone();
    let mut runner = SketchRunner::new(board.clone(), 100, move || {
        if launches_f.fetch_add(1, Ordering::SeqCst) == 0 {
            Box::new(HangingSketch) as Box<dyn Sketch>
        } else {
            Box::new(CountingSketch {
                setups: Arc::new(AtomicUsize::new(0)),
                loops: Arc::new(AtomicUsize::new(0)),
            })
        }
    })
    .with_watchdog_config(fast_watchdog());

    runner.start();
    board.serial().begin(9600);
    board.serial().print("stale output");
    assert!(wait_for(|| runner.is_frozen(), Duration::from_secs(2)));

    runner.restart();
    assert!(runner.is_running());
    assert!(!runner.is_frozen());
    // Transient peripheral state was cleared with the restart.
    assert_eq!(board.serial().drain_output(), "");
    // The fresh generation ticks from zero within a scheduling period or two.
    assert!(wait_for(|| runner.tick() >= 1, Duration::from_secs(2)));

    runner.stop();
    assert_eq!(launches.load(Ordering::SeqCst), 2);
}

#[test]
fn plain_restart_resets_the_tick_counter() {
    let board = create_test_board();
    let setups = Arc::new(AtomicUsize::new(0));
    let loops = Arc::new(AtomicUsize::new(0));
    let (setups_f, loops_f) = (setups.clone(), loops.clone());
    let mut runner = SketchRunner::new(board, 200, move || {
        Box::new(CountingSketch {
            setups: setups_f.clone(),
            loops: loops_f.clone(),
        })
    });

    runner.start();
    assert!(wait_for(|| runner.tick() >= 10, Duration::from_secs(2)));

    runner.restart();
    assert!(wait_for(|| runner.tick() >= 1, Duration::from_secs(2)));
    assert!(wait_for(|| setups.load(Ordering::SeqCst) == 2, Duration::from_secs(2)));

    runner.stop();
}
