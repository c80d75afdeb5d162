use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};

use realtime_imu::channel::{Channel, SerialChannel};
use realtime_imu::config::Config;
use realtime_imu::controller::ModeController;
use realtime_imu::live_status::LiveStatus;

#[derive(Parser, Debug)]
#[command(name = "realtime_imu")]
#[command(about = "Serial IMU orientation with bounded-latency buffer management", long_about = None)]
struct Args {
    /// JSON config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serial port the IMU is attached to
    #[arg(long)]
    port: Option<String>,

    #[arg(long)]
    baud_rate: Option<u32>,

    /// Seconds between backlog checks
    #[arg(long)]
    clear_interval: Option<f64>,

    /// Pending bytes that trigger a flush
    #[arg(long)]
    max_pending_bytes: Option<usize>,

    /// Max lines dropped per flush
    #[arg(long)]
    drain_safety_limit: Option<usize>,

    /// Poll tick interval in seconds
    #[arg(long)]
    tick_interval: Option<f64>,

    /// Start in demo mode without opening the port
    #[arg(long)]
    demo: bool,

    /// Write a JSON status file once per second
    #[arg(long, value_name = "PATH")]
    status_file: Option<PathBuf>,

    /// Duration in seconds (0 = continuous)
    #[arg(long, default_value = "0")]
    duration: u64,
}

impl Args {
    fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(port) = &self.port {
            config.port = port.clone();
        }
        if let Some(baud_rate) = self.baud_rate {
            config.baud_rate = baud_rate;
        }
        if let Some(secs) = self.clear_interval {
            config.clear_interval_secs = secs;
        }
        if let Some(bytes) = self.max_pending_bytes {
            config.max_pending_bytes = bytes;
        }
        if let Some(limit) = self.drain_safety_limit {
            config.drain_safety_limit = limit;
        }
        if let Some(secs) = self.tick_interval {
            config.tick_interval_secs = secs;
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    ToggleDemo,
    Reset,
    Flush,
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    match line.trim().to_ascii_lowercase().as_str() {
        "d" => Some(Command::ToggleDemo),
        "r" => Some(Command::Reset),
        "b" => Some(Command::Flush),
        "q" | "quit" | "exit" => Some(Command::Quit),
        _ => None,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.resolve_config()?;
    let settings = config.controller_settings()?;

    log::info!("Real-time serial IMU starting");
    log::info!("  Port: {} @ {} baud", config.port, config.baud_rate);
    log::info!(
        "  Buffer: check every {:.3}s, flush above {} bytes, drain limit {}",
        config.clear_interval_secs,
        config.max_pending_bytes,
        config.drain_safety_limit
    );
    log::info!("Controls (type + Enter): d = demo mode, r = reset, b = buffer clear, q = quit");

    let mut controller = if args.demo {
        ModeController::<SerialChannel>::disconnected(settings)
    } else {
        let channel = SerialChannel::open(&config.port, config.baud_rate, config.read_timeout()?);
        // Board resets when the port opens; give it time before the initial flush
        if channel.is_ok() {
            sleep(config.settle_time()?).await;
        }
        ModeController::open(channel, settings)
    };

    run(&mut controller, &args, &config).await?;

    controller.shutdown();
    let stats = controller.stats();
    log::info!(
        "Stopped: {} accepted, {} rejected, {} skipped, {} flushes ({} lines)",
        stats.accepted,
        stats.rejected,
        stats.skipped_packets,
        stats.flushes,
        stats.flushed_lines
    );
    Ok(())
}

async fn run<C: Channel>(
    controller: &mut ModeController<C>,
    args: &Args,
    config: &Config,
) -> Result<()> {
    let mut ticker = interval(config.tick_interval()?);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut commands = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let start = Instant::now();
    let mut last_status = start;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                // Serial reads block this runtime thread, so stdin and Ctrl-C wait
                // for the tick. A flush makes at most drain_safety_limit reads of
                // drain_read_timeout each, and selection stops at the first read
                // that times out.
                controller.tick(now);

                if now.duration_since(last_status) >= Duration::from_secs(1) {
                    let uptime = now.duration_since(start).as_secs();
                    let status = LiveStatus::from_snapshot(&controller.snapshot(now), uptime);
                    log::info!("{}", status.summary());
                    if let Some(path) = &args.status_file {
                        if let Err(e) = status.save(path) {
                            log::warn!("Failed to write {}: {}", path.display(), e);
                        }
                    }
                    last_status = now;
                }

                if args.duration > 0 && now.duration_since(start).as_secs() >= args.duration {
                    log::info!("Duration reached, stopping...");
                    break;
                }
            }
            line = commands.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => match parse_command(&line) {
                        Some(Command::ToggleDemo) => {
                            controller.toggle_simulated();
                        }
                        Some(Command::Reset) => controller.reset(),
                        Some(Command::Flush) => {
                            if controller.manual_flush().is_none() {
                                log::info!("Buffer clear only applies to live data");
                            }
                        }
                        Some(Command::Quit) => break,
                        None => log::warn!("Unknown command: {:?}", line.trim()),
                    },
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        log::warn!("stdin closed: {}", e);
                        stdin_open = false;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, stopping...");
                break;
            }
        }
    }

    Ok(())
}
