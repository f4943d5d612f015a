//! Scan pipeline: one LIDAR revolution in, robot-frame line segments out.
//!
//! Stages, in order:
//! 1. [`lidar_to_robot`] converts polar returns to Cartesian points,
//!    dropping returns inside the robot's own footprint;
//! 2. [`extract_raw_lines`] splits the point ring into contiguous runs
//!    at Douglas-Peucker vertices and range gaps, seam-aware;
//! 3. [`fit_lines`] fits a total-least-squares segment per run, with
//!    endpoints oriented along the scan direction.

mod extract;
mod fit;
mod ingest;
mod simplify;

pub use extract::extract_raw_lines;
pub use fit::fit_lines;
pub use ingest::lidar_to_robot;
pub use simplify::ring_keep_mask;

use types::Point;

/// LIDAR mounting geometry and the robot's own silhouette.
#[derive(Debug, Clone)]
pub struct MountConfig {
    /// Sensor position in the robot frame (mm).
    pub offset: Point,
    /// Footprint rectangle: returns landing inside are the robot itself.
    pub footprint_min: Point,
    pub footprint_max: Point,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            offset: Point::new(0, 0),
            footprint_min: Point::new(-90, -120),
            footprint_max: Point::new(90, 120),
        }
    }
}

/// Tuning for polyline extraction.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Douglas–Peucker tolerance (mm).
    pub epsilon: f64,
    /// Multiplier on the expected inter-beam spacing for the gap test.
    pub dist_margin: i32,
    /// Floor of the adaptive gap threshold (mm).
    pub dist_clamp: i32,
    /// Minimum end-to-end extent of an emitted run (mm).
    pub dist_min: i32,
    /// Minimum number of points in an emitted run.
    pub min_points: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            epsilon: 40.0,
            dist_margin: 4,
            dist_clamp: 60,
            dist_min: 200,
            min_points: 5,
        }
    }
}
