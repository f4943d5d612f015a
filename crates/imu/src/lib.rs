//! AHRS yaw poller.
//!
//! Reads fused attitude lines from a serial-attached AHRS and publishes
//! the yaw component through a `watch` channel at the sensor's native
//! rate. Only yaw is consumed by the SLAM loop; roll and pitch are
//! parsed and dropped. The device is optional equipment: when it cannot
//! be opened the daemon logs the absence once and derives heading from
//! the commanded turn rate instead.

use std::io::{BufRead, BufReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, trace, warn};

#[derive(Error, Debug)]
pub enum ImuError {
    #[error("Serial port error: {0}")]
    Serial(String),
}

/// AHRS serial configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Serial port path (e.g., "/dev/ttyUSB1").
    pub port: String,
    /// Baud rate of the attitude stream.
    pub baud_rate: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB1".into(),
            baud_rate: 115_200,
        }
    }
}

/// AHRS reader that publishes fused yaw.
pub struct ImuReader {
    config: Config,
}

impl ImuReader {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Open the device and run the poller on a blocking thread.
    ///
    /// Opening happens on the caller's thread so a missing sensor is
    /// reported before the loop starts. Each attitude line updates the
    /// `yaw` channel (radians); the thread exits when `run` clears.
    pub fn spawn(
        self,
        tx: watch::Sender<f64>,
        run: Arc<AtomicBool>,
    ) -> Result<std::thread::JoinHandle<()>, ImuError> {
        info!(port = %self.config.port, baud = self.config.baud_rate, "Opening AHRS serial port");
        let port = tokio_serial::new(&self.config.port, self.config.baud_rate)
            .timeout(Duration::from_millis(500))
            .open()
            .map_err(|e| ImuError::Serial(e.to_string()))?;

        let handle = std::thread::spawn(move || {
            let mut reader = BufReader::new(port);
            let mut line = String::new();

            info!("AHRS poller started");
            while run.load(Ordering::Relaxed) {
                line.clear();
                match reader.read_line(&mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        if let Some(yaw) = parse_yaw(&line) {
                            if tx.send(yaw).is_err() {
                                break;
                            }
                        } else {
                            trace!(line = line.trim(), "Unparseable attitude line");
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                    Err(e) => {
                        warn!(?e, "AHRS read error, stopping poller");
                        break;
                    }
                }
            }
            info!("AHRS poller stopped");
        });

        Ok(handle)
    }
}

/// Extract yaw from a `roll pitch yaw` attitude line (radians).
fn parse_yaw(line: &str) -> Option<f64> {
    let mut fields = line.split_whitespace();
    let _roll: f64 = fields.next()?.parse().ok()?;
    let _pitch: f64 = fields.next()?.parse().ok()?;
    let yaw: f64 = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some(yaw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaw_valid() {
        assert_eq!(parse_yaw("0.01 -0.02 1.5708\n"), Some(1.5708));
        assert_eq!(parse_yaw("  0 0 -3.14 "), Some(-3.14));
    }

    #[test]
    fn test_parse_yaw_rejects_malformed() {
        assert_eq!(parse_yaw(""), None);
        assert_eq!(parse_yaw("1.0 2.0"), None);
        assert_eq!(parse_yaw("a b c"), None);
        assert_eq!(parse_yaw("1 2 3 4"), None);
    }
}
