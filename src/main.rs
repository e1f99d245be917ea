//! sitechd: standalone Sitech mount daemon.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                     │
//! │                                                               │
//! │  SerialTransport   StandaloneModel          LogEventSink      │
//! │  (Transport)       (Ephemeris+Trajectory)   (EventSink)       │
//! │                                                               │
//! │  ─────────────── Port Trait Boundary ──────────────────       │
//! │                                                               │
//! │  ┌─────────────────────────────────────────────────────┐      │
//! │  │  MountService · TrackingEngine · SitechLink         │      │
//! │  └─────────────────────────────────────────────────────┘      │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Subcommands:
//! - `status`: controller version, status frame, axis readings, gains
//! - `config`: print the effective configuration as JSON
//! - `track`: follow a constant-rate target for a while
//! - `gains`: read the PID gains, load/save/reset them in flash
//! - `park`: move to the configured park position
//! - `stop`: stop both axes

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{info, warn};

use sitech::adapters::log_sink::LogEventSink;
use sitech::adapters::model::StandaloneModel;
use sitech::adapters::serial::SerialTransport;
use sitech::app::commands::MountCommand;
use sitech::app::service::{MountService, MountState};
use sitech::config::MountConfig;
use sitech::link::{FrameLog, SitechLink};
use sitech::protocol::{Axes, Axis, describe_errors};

/// Default controller device.
const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Sidereal Technology mount daemon
#[derive(Parser, Debug)]
#[command(name = "sitechd")]
#[command(about = "Drive a Sidereal Technology servo controller")]
#[command(version)]
struct Args {
    /// Serial device of the controller
    #[arg(short, long, global = true, default_value = DEFAULT_PORT)]
    port: String,

    /// JSON configuration file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Query controller version, status and axis readings
    Status {
        /// Also read the configuration frame and PID gains
        #[arg(long)]
        full: bool,
    },

    /// Print the effective configuration as JSON
    Config,

    /// Follow a target moving at a constant rate in motor counts
    Track {
        /// X axis rate (counts/s)
        #[arg(long, default_value = "0")]
        rate_x: f64,

        /// Y axis rate (counts/s)
        #[arg(long, default_value = "0")]
        rate_y: f64,

        /// X target offset from the current position (counts)
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        offset_x: i32,

        /// Y target offset from the current position (counts)
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        offset_y: i32,

        /// Seconds to run (0 = until the mount stops)
        #[arg(short, long, default_value = "60")]
        duration: f64,
    },

    /// Read or persist the controller PID gains
    Gains {
        /// Dump the gains stored in the flash image
        #[arg(long)]
        load: bool,

        /// Write the active gains to flash
        #[arg(long, conflicts_with = "default")]
        save: bool,

        /// Restore the factory defaults in flash
        #[arg(long)]
        default: bool,
    },

    /// Move to the configured park position
    Park,

    /// Stop both axes
    Stop,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => MountConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => MountConfig::default(),
    };

    if let Command::Config = args.command {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let transport =
        SerialTransport::open(&args.port, Duration::from_millis(config.serial_timeout_ms))
            .with_context(|| format!("Failed to open serial port {}", args.port))?;
    let mut link = SitechLink::new(transport);
    link.init(config.forced_generation)
        .context("Controller initialisation failed")?;

    if let Some(path) = &config.frame_log {
        let log = FrameLog::create(Path::new(path))
            .with_context(|| format!("Failed to open frame log {path}"))?;
        link.start_frame_log(log);
        info!("Logging frames to {path}");
    }

    match args.command {
        Command::Status { full } => print_status(&mut link, full)?,
        Command::Config => {}
        Command::Track {
            rate_x,
            rate_y,
            offset_x,
            offset_y,
            duration,
        } => track(
            &mut link,
            config,
            Axes::new(rate_x, rate_y),
            Axes::new(offset_x, offset_y),
            duration,
        )?,
        Command::Gains {
            load,
            save,
            default,
        } => gains(&mut link, load, save, default)?,
        Command::Park => park(&mut link, config)?,
        Command::Stop => {
            link.stop().context("Stop failed")?;
            info!("Both axes stopped");
        }
    }

    if let Some(log) = link.stop_frame_log() {
        info!("{} frames logged", log.records_written());
    }
    Ok(())
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}

fn print_status<T: sitech::link::Transport>(link: &mut SitechLink<T>, full: bool) -> Result<()> {
    let generation = link.generation();
    println!("Version:    {:.1}", link.version() as f64 / 10.0);
    println!("Generation: {:?} ({:.2} Hz)", generation.kind(), generation.servo_rate());
    println!("Serial:     {}", link.serial_number()?);

    let status = link.get_axis_status(Axis::X)?;
    println!(
        "Position:   X {} Y {} (encoders X {} Y {})",
        status.x_pos, status.y_pos, status.x_enc, status.y_enc
    );
    println!(
        "Auto:       X {} Y {}  temperature {}",
        status.x_auto(),
        status.y_auto(),
        status.temperature
    );
    for (axis, telemetry) in [
        (Axis::X, status.x_telemetry(&generation)),
        (Axis::Y, status.y_telemetry(&generation)),
    ] {
        match telemetry.fault_word() {
            Some(0) | None => println!("{axis} last:     {telemetry:?}"),
            Some(word) => println!("{axis} errors:   {}", describe_errors(word)),
        }
    }

    for axis in Axis::BOTH {
        let info = link.read_axis_info(axis)?;
        println!(
            "{axis} axis:     accel {} max speed {} current {:.2} A pwm {}",
            info.acceleration, info.max_speed, info.current, info.pwm
        );
    }

    if full {
        let cfg = link.get_configuration()?;
        println!("Latitude:   {:.4}", cfg.latitude_degrees());
        println!(
            "Ticks:      X enc {} mot {}  Y enc {} mot {}",
            cfg.x.encoder_ticks, cfg.x.motor_ticks, cfg.y.encoder_ticks, cfg.y.motor_ticks
        );
        let gains = link.get_all_pid_gains()?;
        println!("PID X:      {:?}", gains.x);
        println!("PID Y:      {:?}", gains.y);
    }
    Ok(())
}

fn gains<T: sitech::link::Transport>(
    link: &mut SitechLink<T>,
    load: bool,
    save: bool,
    default: bool,
) -> Result<()> {
    let active = link.get_all_pid_gains()?;
    println!("Active X:   {:?}", active.x);
    println!("Active Y:   {:?}", active.y);

    if load {
        let image = link.flash_load().context("Flash read failed")?;
        println!("Flash image: {} bytes", image.len());
        for axis in Axis::BOTH {
            match image.axis_gains(axis) {
                Some(g) => println!("Flash {axis}:    {g:?}"),
                None => println!("Flash {axis}:    not in this image layout"),
            }
        }
    }
    if save {
        link.flash_save().context("Flash save failed")?;
        info!("Gains written to flash");
    }
    if default {
        link.flash_default().context("Flash reset failed")?;
        info!("Flash restored to defaults");
    }
    Ok(())
}

fn track<T: sitech::link::Transport>(
    link: &mut SitechLink<T>,
    config: MountConfig,
    rate: Axes<f64>,
    offset: Axes<i32>,
    duration: f64,
) -> Result<()> {
    let status = link.get_axis_status(Axis::X)?;
    let start = Axes::new(
        status.x_pos.saturating_add(offset.x),
        status.y_pos.saturating_add(offset.y),
    );
    let interval = Duration::from_secs_f64(config.tracking_interval_secs);
    let epoch = unix_now();
    let mut model = StandaloneModel::new(start, rate, epoch, &config);
    let mut sink = LogEventSink::new();
    let mut service = MountService::new(config);

    service.start(&mut sink);
    service.handle_command(MountCommand::StartSlew, link, &mut model, &mut sink, epoch)?;

    loop {
        let now = unix_now();
        if duration > 0.0 && now - epoch >= duration {
            service.stop(link, &mut sink)?;
            break;
        }
        if let Err(e) = service.tick(link, &mut model, &mut sink, now) {
            if service.state() == MountState::Stopped {
                bail!("Tracking stopped: {e}");
            }
            warn!("Retrying after {e}");
            thread::sleep(interval * 2);
            continue;
        }
        if service.state() == MountState::Stopped {
            bail!("Mount stopped");
        }
        thread::sleep(interval);
    }

    info!(
        "{} ticks, {} tracking cycles, look-ahead {:.1} s",
        service.tick_count(),
        service.engine().cycles(),
        service.engine().look_ahead()
    );
    Ok(())
}

fn park<T: sitech::link::Transport>(link: &mut SitechLink<T>, config: MountConfig) -> Result<()> {
    let interval = Duration::from_secs_f64(config.tracking_interval_secs);
    let status = link.get_axis_status(Axis::X)?;
    let here = Axes::new(status.x_pos, status.y_pos);
    let mut model = StandaloneModel::new(here, Axes::new(0.0, 0.0), unix_now(), &config);
    let mut sink = LogEventSink::new();
    let mut service = MountService::new(config);

    service.start(&mut sink);
    service.handle_command(MountCommand::Park, link, &mut model, &mut sink, unix_now())?;
    while service.state() == MountState::Parking {
        thread::sleep(interval);
        if let Err(e) = service.tick(link, &mut model, &mut sink, unix_now()) {
            warn!("Park poll failed: {e}");
        }
    }
    if service.state() == MountState::Stopped {
        bail!("Park did not complete");
    }
    info!("Parked");
    Ok(())
}
