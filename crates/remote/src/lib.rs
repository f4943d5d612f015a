//! Remote controller serial link.
//!
//! The controller sends fixed-size command frames (`$S␠␠` preamble,
//! then the payload) over an 8-bit modem; the robot answers each valid
//! frame with a telemetry frame mirroring the layout under a `$R␠␠`
//! preamble. Parsing is a byte-per-byte state machine that resynchronizes
//! on any preamble mismatch, so line noise costs at most one frame.

use std::io::{Read, Write};
use std::time::Duration;
use thiserror::Error;
use tokio_serial::{ClearBuffer, SerialPort};
use tracing::{info, trace};
use types::{RemoteFrame, FRAME_PAYLOAD_SIZE, REMOTE_FRAME_SIZE, REMOTE_PREAMBLE, TELEMETRY_PREAMBLE};

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Serial port error: {0}")]
    Serial(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Modem serial configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Serial port path (e.g., "/dev/ttyAMA0").
    pub port: String,
    /// Baud rate of the modem link.
    pub baud_rate: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: "/dev/ttyAMA0".into(),
            baud_rate: 115_200,
        }
    }
}

/// Incremental frame parser.
///
/// `push` consumes one byte and yields a frame when the preamble and the
/// full payload have been seen. Any byte that breaks the preamble drops
/// the parser back to hunting for `$`.
#[derive(Debug, Default)]
pub struct FrameParser {
    pos: usize,
    payload: [u8; FRAME_PAYLOAD_SIZE],
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, byte: u8) -> Option<RemoteFrame> {
        if self.pos < REMOTE_PREAMBLE.len() {
            if byte == REMOTE_PREAMBLE[self.pos] {
                self.pos += 1;
            } else {
                self.pos = 0;
            }
            return None;
        }

        self.payload[self.pos - REMOTE_PREAMBLE.len()] = byte;
        self.pos += 1;

        if self.pos == REMOTE_FRAME_SIZE {
            self.pos = 0;
            return Some(RemoteFrame::decode(&self.payload));
        }
        None
    }
}

/// The modem link: owns the serial port and the parser.
pub struct RemoteLink {
    port: Box<dyn SerialPort>,
    parser: FrameParser,
}

impl RemoteLink {
    /// Open the modem serial port.
    pub fn open(config: &Config) -> Result<Self, RemoteError> {
        info!(port = %config.port, baud = config.baud_rate, "Opening modem serial port");
        let port = tokio_serial::new(&config.port, config.baud_rate)
            .timeout(Duration::from_millis(10))
            .open()
            .map_err(|e| RemoteError::Serial(e.to_string()))?;
        Ok(Self {
            port,
            parser: FrameParser::new(),
        })
    }

    /// Drain the bytes currently buffered on the link.
    ///
    /// Returns the first completed frame, if any; the input buffer is
    /// discarded after a completed frame so a backlog can never queue
    /// stale commands.
    pub fn poll(&mut self) -> Result<Option<RemoteFrame>, RemoteError> {
        while self
            .port
            .bytes_to_read()
            .map_err(|e| RemoteError::Serial(e.to_string()))?
            > 0
        {
            let mut byte = [0u8; 1];
            self.port.read_exact(&mut byte)?;

            if let Some(frame) = self.parser.push(byte[0]) {
                self.port
                    .clear(ClearBuffer::Input)
                    .map_err(|e| RemoteError::Serial(e.to_string()))?;
                trace!(?frame, "Remote frame received");
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }

    /// Write one telemetry frame mirroring `frame`'s payload.
    pub fn send_telemetry(&mut self, frame: &RemoteFrame) -> Result<(), RemoteError> {
        self.port.write_all(&TELEMETRY_PREAMBLE)?;
        self.port.write_all(&frame.encode())?;
        self.port.flush()?;
        Ok(())
    }
}
