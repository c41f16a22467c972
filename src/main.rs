use clap::Parser;
use duino_rs::board::pin::{Level, PinMode};
use duino_rs::board::{Board, LED_BUILTIN};
use duino_rs::config::{self, BoardConfig};
use duino_rs::runtime::{Sketch, SketchRunner};
use std::sync::Arc;
use std::time::Duration;

/// Desktop emulator host: runs a sketch against an emulated board.
#[derive(Parser, Debug)]
#[command(name = "duino-host", version, about = "Runs an Arduino-style sketch against an emulated board")]
struct Cli {
    /// Board description file (TOML); defaults to an Arduino Uno layout
    #[arg(short, long)]
    board: Option<String>,

    /// Sketch loop frequency in Hz
    #[arg(short, long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..=10_000))]
    frequency: u32,
}

/// Built-in demo: blinks the LED and prints a heartbeat on serial.
struct BlinkSketch {
    lit: bool,
    iterations: u64,
}

impl BlinkSketch {
    fn new() -> Self {
        Self {
            lit: false,
            iterations: 0,
        }
    }
}

impl Sketch for BlinkSketch {
    fn setup(&mut self, board: &Board) {
        board.serial().begin(9600);
        board.pin_mode(LED_BUILTIN, PinMode::Output);
        board.serial().println("blink sketch ready");
    }

    fn loop_step(&mut self, board: &Board) {
        self.lit = !self.lit;
        board.digital_write(LED_BUILTIN, Level::from(self.lit));
        self.iterations += 1;
        if self.iterations % 100 == 0 {
            board.serial().print("uptime ms: ");
            board.serial().println_int(board.millis() as i64);
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();

    tracing::info!("Starting duino-rs board emulator");

    let board_config = match &cli.board {
        Some(path) => config::load_board_config(path)?,
        None => BoardConfig::default(),
    };
    tracing::info!(
        "Board: {} ({} pins, {} digital, {} analog)",
        board_config.name,
        board_config.total_pins,
        board_config.digital_pins,
        board_config.analog_pins
    );
    tracing::info!("Loop frequency: {} Hz", cli.frequency);

    let board = Arc::new(Board::new(board_config));
    let mut runner = SketchRunner::new(board.clone(), cli.frequency, || {
        Box::new(BlinkSketch::new())
    });
    runner.start();

    // Supervision loop: relay serial output to the log and recover from
    // watchdog-declared freezes. Runs until the process is killed.
    loop {
        std::thread::sleep(Duration::from_secs(1));

        if runner.is_frozen() {
            tracing::warn!("Watchdog reported a hung sketch; restarting");
            runner.restart();
        }

        let output = board.serial().drain_output();
        for line in output.lines() {
            tracing::info!(target: "serial", "{}", line);
        }
        tracing::debug!(tick = runner.tick(), "heartbeat");
    }
}
