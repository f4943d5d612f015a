//! scoutd — perception and localization daemon for the scout rover.
//!
//! Wires the modem link, the LIDAR reader and the optional AHRS into
//! the SLAM engine, and streams one raw BGR frame per tick on standard
//! output. All diagnostics go to standard error.

use anyhow::{bail, Context, Result};
use clap::Parser;
use imu::{Config as ImuConfig, ImuReader};
use lidar::{Config as LidarConfig, LidarReader, Revolution};
use remote::{Config as ModemConfig, RemoteLink};
use scan::{ExtractConfig, MountConfig};
use serde::Deserialize;
use slam::{robot_to_map, OdometryConfig, SlamConfig, SlamEngine};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use types::{MotionCommand, Segment};

/// Configuration file structure (scout.toml).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FileConfig {
    modem: SerialFileConfig,
    lidar: SerialFileConfig,
    imu: SerialFileConfig,
    video: VideoFileConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SerialFileConfig {
    port: Option<String>,
    baud: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct VideoFileConfig {
    width: u32,
    height: u32,
    fps: u32,
}

impl Default for VideoFileConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

impl FileConfig {
    fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: FileConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            warn!(path = %path.display(), "Config file not found, using defaults");
            Ok(FileConfig::default())
        }
    }
}

#[derive(Parser)]
#[command(name = "scoutd", about = "Perception and localization daemon for scout")]
struct Args {
    /// Frame geometry: give all three or none.
    #[arg(value_names = ["WIDTH", "HEIGHT", "FPS"], num_args = 3)]
    dims: Option<Vec<u32>>,

    /// Path to configuration file
    #[arg(short, long, default_value = "config/scout.toml")]
    config: PathBuf,

    /// Modem serial port. Overrides config file.
    #[arg(long)]
    modem_port: Option<String>,

    /// Modem baud rate. Overrides config file.
    #[arg(long)]
    modem_baud: Option<u32>,

    /// LIDAR serial port. Overrides config file.
    #[arg(long)]
    lidar_port: Option<String>,

    /// LIDAR baud rate. Overrides config file.
    #[arg(long)]
    lidar_baud: Option<u32>,

    /// AHRS serial port. Overrides config file.
    #[arg(long)]
    imu_port: Option<String>,

    /// Run without the AHRS even if one is connected
    #[arg(long)]
    no_imu: bool,

    /// Also write logs to daily-rolling files in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Stdout is the video stream, so every diagnostic layer writes to
    // stderr (and optionally to rolling files).
    let _log_guard = init_logging(args.log_dir.as_deref(), &args.log_level)?;

    let file_config = FileConfig::load(&args.config)?;

    let (width, height, fps) = match &args.dims {
        Some(dims) => (dims[0], dims[1], dims[2]),
        None => (
            file_config.video.width,
            file_config.video.height,
            file_config.video.fps,
        ),
    };
    if width == 0 || height == 0 || fps == 0 {
        bail!("width, height and fps must be positive");
    }

    info!(width, height, fps, "Starting scoutd");

    // Process-wide run flag, cleared by SIGINT/SIGTERM.
    let run = Arc::new(AtomicBool::new(true));
    {
        let run = run.clone();
        let mut sigterm =
            signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
            info!("Shutdown signal received");
            run.store(false, Ordering::SeqCst);
        });
    }

    // The modem link is mandatory: without it there is no operator.
    let modem_config = ModemConfig {
        port: args
            .modem_port
            .or(file_config.modem.port)
            .unwrap_or_else(|| ModemConfig::default().port),
        baud_rate: args
            .modem_baud
            .or(file_config.modem.baud)
            .unwrap_or_else(|| ModemConfig::default().baud_rate),
    };
    let mut modem = match RemoteLink::open(&modem_config) {
        Ok(link) => link,
        Err(e) => {
            error!(?e, port = %modem_config.port, "Cannot open modem serial port");
            std::process::exit(1);
        }
    };

    // So is the LIDAR: the daemon exists to process its revolutions.
    let lidar_config = LidarConfig {
        port: args
            .lidar_port
            .or(file_config.lidar.port)
            .unwrap_or_else(|| LidarConfig::default().port),
        baud_rate: args
            .lidar_baud
            .or(file_config.lidar.baud)
            .unwrap_or_else(|| LidarConfig::default().baud_rate),
    };
    let (lidar_tx, mut lidar_rx) = watch::channel::<Option<Revolution>>(None);
    let lidar_handle = match LidarReader::new(lidar_config.clone()).spawn(lidar_tx, run.clone()) {
        Ok(handle) => handle,
        Err(e) => {
            error!(?e, port = %lidar_config.port, "Cannot open LIDAR serial port");
            std::process::exit(1);
        }
    };

    // The AHRS is optional equipment.
    let (imu_tx, imu_rx) = watch::channel(0.0f64);
    let mut imu_available = false;
    let mut imu_handle = None;
    if !args.no_imu {
        let imu_config = ImuConfig {
            port: args
                .imu_port
                .or(file_config.imu.port)
                .unwrap_or_else(|| ImuConfig::default().port),
            baud_rate: file_config.imu.baud.unwrap_or_else(|| ImuConfig::default().baud_rate),
        };
        match ImuReader::new(imu_config).spawn(imu_tx, run.clone()) {
            Ok(handle) => {
                imu_available = true;
                imu_handle = Some(handle);
            }
            Err(e) => {
                warn!(?e, "No IMU found, deriving heading from commanded turn rate");
            }
        }
    } else {
        info!("IMU disabled");
    }

    let mount = MountConfig::default();
    let extract = ExtractConfig::default();
    let mut engine = SlamEngine::new(SlamConfig::default(), OdometryConfig::default(), imu_available);

    let frame_bytes = vec![0u8; (width * height * 3) as usize];
    let mut stdout = std::io::stdout().lock();

    let tick_period = Duration::from_millis(1000 / fps as u64);
    let mut last_tick = Instant::now();
    let mut last_motion = MotionCommand::default();

    info!("Entering main loop");
    while run.load(Ordering::SeqCst) {
        let elapsed = last_tick.elapsed();
        if elapsed < tick_period {
            std::thread::sleep(tick_period - elapsed);
        }
        last_tick = Instant::now();

        // Remote frame: odometry advances only on a validated frame.
        let received = match modem.poll() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(?e, "Modem poll error");
                None
            }
        };
        if let Some(frame) = &received {
            last_motion = frame.motion();
            let yaw = imu_available.then(|| *imu_rx.borrow());
            engine.odometry_tick(&last_motion, yaw);
        }

        // SLAM runs when the producer reports a fresh, complete
        // revolution; a stale buffer is never reprocessed.
        if lidar_rx.has_changed().unwrap_or(false) {
            let revolution = lidar_rx.borrow_and_update().clone();
            if let Some(revolution) = revolution {
                let pose = engine.pose();
                let (polar, points) = scan::lidar_to_robot(&revolution.points, &mount);
                let runs = scan::extract_raw_lines(&polar, &points, &extract);
                let lines = scan::fit_lines(&runs);
                let observations: Vec<Segment> =
                    lines.iter().map(|&line| robot_to_map(line, &pose)).collect();

                let update = engine.scan_tick(&observations, &last_motion);
                debug!(
                    returns = revolution.points.len(),
                    lines = lines.len(),
                    matched = update.matched,
                    map = update.map_len,
                    confidence = update.confidence,
                    "Revolution processed"
                );
            }
        }

        // One full image per tick, drawn or not.
        if let Err(e) = stdout.write_all(&frame_bytes).and_then(|_| stdout.flush()) {
            warn!(?e, "Frame consumer went away");
            break;
        }

        // Telemetry echoes the frame validated this tick.
        if let Some(frame) = &received {
            if let Err(e) = modem.send_telemetry(frame) {
                warn!(?e, "Telemetry write error");
            }
        }
    }

    info!("Stopping");
    run.store(false, Ordering::SeqCst);
    let _ = lidar_handle.join();
    if let Some(handle) = imu_handle {
        let _ = handle.join();
    }

    let pose = engine.pose();
    info!(
        x = pose.position.x,
        y = pose.position.y,
        theta = pose.theta,
        map = engine.map().len(),
        "Shutdown complete"
    );
    Ok(())
}

/// Initialize logging on stderr, with an optional rolling file layer.
///
/// Returns a guard that must be held for the lifetime of the program so
/// buffered file logs are flushed on shutdown.
fn init_logging(
    log_dir: Option<&Path>,
    level: &str,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
            let file_appender = tracing_appender::rolling::daily(dir, "scoutd.log");
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking_file)
                .with_ansi(false)
                .with_target(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(file_layer)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            Ok(None)
        }
    }
}
