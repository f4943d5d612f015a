//! Fixed-point angle unit and trig table.
//!
//! Angles are `u16` values ("angle16") where the full circle is 65536
//! units, i.e. `2 * PI16`. `sin16`/`cos16` return integers scaled by
//! `ONE16` so the hot loops of the scan pipeline stay in integer math:
//! `distance * sin16(theta) / ONE16` fits `i32` for ranges up to ~30 m.

use std::f64::consts::PI;
use std::sync::OnceLock;

/// Unit scale of `sin16`/`cos16` outputs.
pub const ONE16: i32 = 1 << 15;

/// Half angular period: `PI16` angle16 units equal π radians.
pub const PI16: i32 = 1 << 15;

/// Quarter turn in angle16 units.
const QUARTER16: u16 = (PI16 / 2) as u16;

static SIN_TABLE: OnceLock<Vec<i16>> = OnceLock::new();

fn sin_table() -> &'static [i16] {
    SIN_TABLE.get_or_init(|| {
        (0u32..1 << 16)
            .map(|a| {
                let rad = a as f64 * PI / PI16 as f64;
                (rad.sin() * (ONE16 - 1) as f64).round() as i16
            })
            .collect()
    })
}

/// Sine of an angle16, scaled by `ONE16`.
pub fn sin16(angle: u16) -> i32 {
    sin_table()[angle as usize] as i32
}

/// Cosine of an angle16, scaled by `ONE16`.
pub fn cos16(angle: u16) -> i32 {
    sin16(angle.wrapping_add(QUARTER16))
}

/// Convert an angle16 to radians in [0, 2π).
pub fn angle16_to_rad(angle: u16) -> f64 {
    angle as f64 * PI / PI16 as f64
}

/// Convert radians to the nearest angle16, wrapping on the full circle.
pub fn rad_to_angle16(rad: f64) -> u16 {
    let units = (rad * PI16 as f64 / PI).round();
    units.rem_euclid(65536.0) as u16
}
