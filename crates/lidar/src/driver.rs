//! Serial protocol implementation for the measurement stream.

use crate::{LidarError, Revolution};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_serial::SerialPort;
use tracing::{debug, info, trace};
use types::PolarPoint;

/// Sensor commands.
const CMD_SCAN: [u8; 2] = [0xA5, 0x20];
const CMD_STOP: [u8; 2] = [0xA5, 0x25];
const CMD_RESET: [u8; 2] = [0xA5, 0x40];

/// Bytes per measurement point.
const PACKET_SIZE: usize = 5;

/// Angle wire unit: 1/64 degree. A full turn is 360·64 of them.
const ANGLE_UNITS_PER_TURN: u32 = 360 * 64;

/// Internal reader loop that runs on a blocking thread.
pub(crate) fn run_reader(
    mut port: Box<dyn SerialPort>,
    tx: watch::Sender<Option<Revolution>>,
    run: Arc<AtomicBool>,
) -> Result<(), LidarError> {
    // Reset clears any scan left running from a previous session.
    port.write_all(&CMD_RESET)
        .map_err(|e| LidarError::Serial(e.to_string()))?;
    std::thread::sleep(Duration::from_millis(100));
    let _ = port.clear(tokio_serial::ClearBuffer::All);

    port.write_all(&CMD_SCAN)
        .map_err(|e| LidarError::Serial(e.to_string()))?;
    port.flush()
        .map_err(|e| LidarError::Serial(e.to_string()))?;

    info!("LIDAR reader started");

    let mut packet_buf = [0u8; PACKET_SIZE];
    let mut points: Vec<PolarPoint> = Vec::with_capacity(360);

    while run.load(Ordering::Relaxed) {
        match port.read_exact(&mut packet_buf) {
            Ok(()) => {
                let (start, point) = match parse_packet(&packet_buf) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        trace!(?e, "Dropped packet");
                        continue;
                    }
                };

                if start && !points.is_empty() {
                    let revolution = Revolution {
                        points: std::mem::take(&mut points),
                    };
                    debug!(points = revolution.points.len(), "Completed revolution");
                    if tx.send(Some(revolution)).is_err() {
                        info!("LIDAR receiver dropped, stopping");
                        break;
                    }
                    points = Vec::with_capacity(360);
                }

                if let Some(point) = point {
                    points.push(point);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                trace!("Read timeout, continuing");
            }
            Err(e) => {
                return Err(LidarError::Serial(e.to_string()));
            }
        }
    }

    let _ = port.write_all(&CMD_STOP);
    info!("LIDAR reader stopped");
    Ok(())
}

/// Parse a 5-byte measurement packet.
///
/// Byte 0: quality in bits 7..2, start-of-turn flag in bit 0.
/// Bytes 1-2: angle in 1/64 degree units, little-endian.
/// Bytes 3-4: distance in 1/4 mm units, little-endian.
///
/// Returns the start flag and the converted return; zero-distance or
/// zero-quality measurements carry no return.
fn parse_packet(packet: &[u8; PACKET_SIZE]) -> Result<(bool, Option<PolarPoint>), LidarError> {
    let start = packet[0] & 0x01 != 0;
    let quality = (packet[0] >> 2) & 0x3F;

    let angle_raw = u16::from_le_bytes([packet[1], packet[2]]) as u32;
    if angle_raw >= ANGLE_UNITS_PER_TURN {
        return Err(LidarError::Parse(format!("angle out of range: {angle_raw}")));
    }
    let theta = (angle_raw * 65536 / ANGLE_UNITS_PER_TURN) as u16;

    let distance_raw = u16::from_le_bytes([packet[3], packet[4]]);
    let distance = distance_raw as i32 / 4;

    let point = (distance > 0 && quality > 0).then_some(PolarPoint { theta, distance });
    Ok((start, point))
}
