//! # gpioled binary
//!
//! Runs the LED driver against a simulated host built from a board file.
//!
//! # Usage
//!
//! ```bash
//! # Attach, print the host state as JSON, detach
//! gpioled --board boards/imx6ull.toml status
//!
//! # Turn the LED off, then on
//! gpioled write 0 1
//!
//! # One command byte per stdin line until EOF
//! printf '1\n0\n' | gpioled serve -v
//! ```

use clap::{Parser, Subcommand};
use gpioled::host::simulation::{HostSnapshot, SimHost};
use gpioled::{LED_DRIVER, LifecyclePhase, PlatformBus, SessionHandler};
use gpioled_common::config::{ConfigLoader, LogLevel};
use gpioled_common::hal::config::BoardConfig;
use gpioled_common::hal::types::{DeviceNumber, Level, PinId};
use serde::Serialize;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Board used when `--board` is not given.
const DEFAULT_BOARD: &str = include_str!("../boards/imx6ull.toml");

/// gpioled - GPIO LED character device driver on a simulated host
#[derive(Parser, Debug)]
#[command(name = "gpioled")]
#[command(version)]
#[command(about = "GPIO LED character device driver on a simulated host")]
#[command(long_about = None)]
struct Args {
    /// Board description (TOML). Defaults to the built-in i.MX6ULL board.
    #[arg(short, long, value_name = "FILE")]
    board: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Attach every matching device, print the host state, detach
    Status,
    /// Write command bytes through one session
    Write {
        /// Bound device to use (node path); first bound device by default
        #[arg(short, long)]
        device: Option<String>,
        /// Command bytes (0 = off, 1 = on)
        #[arg(required = true)]
        bytes: Vec<u8>,
    },
    /// Read one command byte per stdin line until EOF
    Serve {
        /// Bound device to use (node path); first bound device by default
        #[arg(short, long)]
        device: Option<String>,
    },
}

#[derive(Serialize)]
struct DeviceStatus {
    device: String,
    phase: LifecyclePhase,
    number: Option<DeviceNumber>,
    pin: Option<PinId>,
    level: Option<Level>,
}

#[derive(Serialize)]
struct StatusReport<'a> {
    service: &'a str,
    devices: Vec<DeviceStatus>,
    host: HostSnapshot,
}

fn main() {
    if let Err(e) = run() {
        error!("gpioled failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let board = load_board(args.board.as_deref());
    let configured = board
        .as_ref()
        .map(|b| b.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, configured);
    let board = board?;

    info!(
        "gpioled v{} starting ({})",
        env!("CARGO_PKG_VERSION"),
        board.shared.service_name
    );

    let host = Arc::new(SimHost::from_board(&board));
    let mut bus = PlatformBus::new(Arc::clone(&host), board.driver.clone());
    for pdev in board.devices()? {
        if let Err(e) = bus.add_device(pdev) {
            warn!("{}", e);
        }
    }
    let bound = bus.register_driver(LED_DRIVER)?;
    info!("{} device(s) bound", bound);

    let result = execute(&args.command, &board, &bus, &host);

    for (device, report) in bus.unregister_driver()? {
        if !report.is_clean() {
            warn!("{}: {} release(s) failed", device, report.failed.len());
        }
    }
    if !host.snapshot().is_quiescent() {
        warn!("Host still holds resources after detach");
    }
    info!("gpioled shutdown complete");
    result
}

fn execute(
    command: &Cmd,
    board: &BoardConfig,
    bus: &PlatformBus<SimHost>,
    host: &SimHost,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Cmd::Status => {
            let report = StatusReport {
                service: &board.shared.service_name,
                devices: bus
                    .bound_devices()
                    .into_iter()
                    .filter_map(|key| {
                        let lifecycle = bus.lifecycle(key)?;
                        let device = lifecycle.device();
                        Some(DeviceStatus {
                            device: key.to_string(),
                            phase: lifecycle.phase(),
                            number: lifecycle.number(),
                            pin: device.and_then(|d| d.pin()),
                            level: device.and_then(|d| d.level()),
                        })
                    })
                    .collect(),
                host: host.snapshot(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Cmd::Write { device, bytes } => {
            let handler = select(bus, device.as_deref())?;
            let session = handler.open();
            let mut failed = None;
            for &byte in bytes {
                match handler.write(&session, &mut &[byte][..]) {
                    Ok(_) => println!("{} -> {}", byte, level_of(&handler)),
                    Err(e) => {
                        error!("write {}: {}", byte, e);
                        failed.get_or_insert(e);
                    }
                }
            }
            handler.release(session);
            match failed {
                Some(e) => Err(e.into()),
                None => Ok(()),
            }
        }
        Cmd::Serve { device } => {
            let handler = select(bus, device.as_deref())?;
            let session = handler.open();
            info!("Serving commands from stdin");
            for line in std::io::stdin().lock().lines() {
                let line = line?;
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let Ok(byte) = line.parse::<u8>() else {
                    warn!("Not a byte: '{}'", line);
                    continue;
                };
                match handler.write(&session, &mut &[byte][..]) {
                    Ok(_) => println!("{}", level_of(&handler)),
                    Err(e) => warn!("write {}: {}", byte, e),
                }
            }
            handler.release(session);
            Ok(())
        }
    }
}

fn select(
    bus: &PlatformBus<SimHost>,
    device: Option<&str>,
) -> Result<SessionHandler<SimHost>, Box<dyn std::error::Error>> {
    let key = match device {
        Some(key) => key,
        None => bus
            .bound_devices()
            .first()
            .copied()
            .ok_or("no LED device bound")?,
    };
    bus.handler(key)
        .ok_or_else(|| format!("device '{key}' is not bound").into())
}

fn level_of(handler: &SessionHandler<SimHost>) -> String {
    handler
        .device()
        .level()
        .map_or_else(|| "detached".to_string(), |l| l.to_string())
}

fn load_board(path: Option<&Path>) -> Result<BoardConfig, Box<dyn std::error::Error>> {
    let board = match path {
        Some(path) => BoardConfig::load(path)?,
        None => BoardConfig::from_toml(DEFAULT_BOARD)?,
    };
    board.validate()?;
    Ok(board)
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, configured: LogLevel) {
    let filter = if args.verbose {
        EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured.as_directive()))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if args.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
