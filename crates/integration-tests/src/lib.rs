//! Shared helpers for the pipeline integration tests.

use types::PolarPoint;

/// Axis-aligned rectangular room for synthetic revolutions.
#[derive(Debug, Clone, Copy)]
pub struct Room {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Room {
    /// Ray-cast one full revolution of `beams` returns as seen from
    /// `(rx, ry)` with heading zero. Bearing zero looks along +y and
    /// increases clockwise, matching the sensor convention.
    pub fn revolution(&self, rx: f64, ry: f64, beams: usize) -> Vec<PolarPoint> {
        (0..beams)
            .filter_map(|i| {
                let theta = ((i * 65536 / beams) & 0xFFFF) as u16;
                let rad = theta as f64 * std::f64::consts::PI / 32768.0;
                let (dx, dy) = (rad.sin(), rad.cos());

                let mut best: Option<f64> = None;
                let mut consider = |t: f64, hit: f64, lo: f64, hi: f64| {
                    if t > 0.0 && hit >= lo && hit <= hi && best.map_or(true, |b| t < b) {
                        best = Some(t);
                    }
                };
                if dx > 1e-9 {
                    let t = (self.x_max - rx) / dx;
                    consider(t, ry + t * dy, self.y_min, self.y_max);
                }
                if dx < -1e-9 {
                    let t = (self.x_min - rx) / dx;
                    consider(t, ry + t * dy, self.y_min, self.y_max);
                }
                if dy > 1e-9 {
                    let t = (self.y_max - ry) / dy;
                    consider(t, rx + t * dx, self.x_min, self.x_max);
                }
                if dy < -1e-9 {
                    let t = (self.y_min - ry) / dy;
                    consider(t, rx + t * dx, self.x_min, self.x_max);
                }

                best.map(|distance| PolarPoint {
                    theta,
                    distance: distance as i32,
                })
            })
            .collect()
    }
}
