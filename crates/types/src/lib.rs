//! Shared types and frame definitions for scout.

use serde::{Deserialize, Serialize};

/// Number of joystick pads carried in a remote frame.
pub const NB_COMMANDS: usize = 2;

/// Payload bytes following the 4-byte preamble.
pub const FRAME_PAYLOAD_SIZE: usize = NB_COMMANDS * 4 + 8 + 1;

/// Total frame size on the wire, preamble included.
pub const REMOTE_FRAME_SIZE: usize = 4 + FRAME_PAYLOAD_SIZE;

/// Inbound frame preamble (`$S` followed by two spaces).
pub const REMOTE_PREAMBLE: [u8; 4] = [b'$', b'S', b' ', b' '];

/// Outbound telemetry preamble (`$R` followed by two spaces).
pub const TELEMETRY_PREAMBLE: [u8; 4] = [b'$', b'R', b' ', b' '];

/// 2D point in integer millimetres.
///
/// The frame (robot or world) is contextual; functions that mix frames
/// say so in their signatures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl std::ops::Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Directed line segment from `a` to `b`, same frame as its endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub a: Point,
    pub b: Point,
}

impl Segment {
    pub const fn new(a: Point, b: Point) -> Self {
        Self { a, b }
    }

    /// True when both endpoints coincide and the segment carries no direction.
    pub fn is_degenerate(&self) -> bool {
        self.a == self.b
    }
}

/// One LIDAR return: bearing in angle16 units, range in millimetres.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PolarPoint {
    pub theta: u16,
    pub distance: i32,
}

/// Robot pose: world-frame position in millimetres, heading in angle16.
///
/// `theta` wraps on the full 16-bit range; position is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point,
    pub theta: u16,
}

/// Commanded velocities extracted from the latest remote frame.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MotionCommand {
    pub vx: i16,
    pub vy: i16,
    pub vz: i16,
}

impl MotionCommand {
    /// True when any commanded velocity component is non-zero.
    pub fn is_moving(&self) -> bool {
        self.vx != 0 || self.vy != 0 || self.vz != 0
    }
}

/// Frame received from the remote controller.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RemoteFrame {
    /// Joystick pad positions.
    pub xy: [[i16; 2]; NB_COMMANDS],
    pub z: i16,
    pub vx: i16,
    pub vy: i16,
    pub vz: i16,
    pub switches: u8,
}

impl RemoteFrame {
    /// Decode the fixed little-endian payload (the bytes after the preamble).
    pub fn decode(payload: &[u8; FRAME_PAYLOAD_SIZE]) -> Self {
        let i16_at = |i: usize| i16::from_le_bytes([payload[i], payload[i + 1]]);

        let mut xy = [[0i16; 2]; NB_COMMANDS];
        for (i, pad) in xy.iter_mut().enumerate() {
            pad[0] = i16_at(i * 4);
            pad[1] = i16_at(i * 4 + 2);
        }

        let base = NB_COMMANDS * 4;
        Self {
            xy,
            z: i16_at(base),
            vx: i16_at(base + 2),
            vy: i16_at(base + 4),
            vz: i16_at(base + 6),
            switches: payload[base + 8],
        }
    }

    /// Encode the payload in the same layout `decode` reads.
    pub fn encode(&self) -> [u8; FRAME_PAYLOAD_SIZE] {
        let mut payload = [0u8; FRAME_PAYLOAD_SIZE];
        let mut put = |i: usize, v: i16| {
            payload[i..i + 2].copy_from_slice(&v.to_le_bytes());
        };

        for (i, pad) in self.xy.iter().enumerate() {
            put(i * 4, pad[0]);
            put(i * 4 + 2, pad[1]);
        }

        let base = NB_COMMANDS * 4;
        put(base, self.z);
        put(base + 2, self.vx);
        put(base + 4, self.vy);
        put(base + 6, self.vz);
        payload[base + 8] = self.switches;
        payload
    }

    /// Commanded velocities of this frame.
    pub fn motion(&self) -> MotionCommand {
        MotionCommand {
            vx: self.vx,
            vy: self.vy,
            vz: self.vz,
        }
    }

    pub fn button_less(&self) -> bool {
        self.switches & 0b0001_0000 != 0
    }

    pub fn button_more(&self) -> bool {
        self.switches & 0b0010_0000 != 0
    }

    pub fn button_ok(&self) -> bool {
        self.switches & 0b1000_0000 != 0
    }
}
