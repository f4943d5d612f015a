//! Serial LIDAR driver for scout.
//!
//! Parses the sensor's binary measurement stream and produces one
//! [`Revolution`] of polar returns per full turn. The SLAM loop
//! consumes revolutions through a `watch` channel, so a fresh turn
//! always replaces a stale one.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info};
use types::PolarPoint;

mod driver;

#[derive(Error, Debug)]
pub enum LidarError {
    #[error("Serial port error: {0}")]
    Serial(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

/// LIDAR serial configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Serial port path (e.g., "/dev/ttyUSB0").
    pub port: String,
    /// Baud rate (typically 115200).
    pub baud_rate: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".into(),
            baud_rate: 115_200,
        }
    }
}

/// One complete turn of the sensor.
#[derive(Debug, Clone, Default)]
pub struct Revolution {
    /// Polar returns in angular order: bearing in angle16 units,
    /// range in millimetres.
    pub points: Vec<PolarPoint>,
}

/// LIDAR reader that parses measurement packets from a serial port.
pub struct LidarReader {
    config: Config,
}

impl LidarReader {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Open the sensor and run the reader on a blocking thread,
    /// publishing each completed revolution.
    ///
    /// Opening happens on the caller's thread so an unopenable device
    /// is a startup error. The thread exits when `run` clears or the
    /// receiver drops; the sensor is stopped on the way out.
    pub fn spawn(
        self,
        tx: watch::Sender<Option<Revolution>>,
        run: Arc<AtomicBool>,
    ) -> Result<std::thread::JoinHandle<()>, LidarError> {
        info!(port = %self.config.port, baud = self.config.baud_rate, "Opening LIDAR serial port");
        let port = tokio_serial::new(&self.config.port, self.config.baud_rate)
            .timeout(Duration::from_secs(2))
            .open()
            .map_err(|e| LidarError::Serial(e.to_string()))?;

        let handle = std::thread::spawn(move || {
            if let Err(e) = driver::run_reader(port, tx, run) {
                error!(?e, "LIDAR reader error");
            }
        });

        Ok(handle)
    }
}
