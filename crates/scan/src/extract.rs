//! Polyline extraction: split the scan ring into contiguous point runs.

use crate::{simplify::ring_keep_mask, ExtractConfig};
use geometry::sq_dist;
use tracing::trace;
use trig::{sin16, ONE16};
use types::{Point, PolarPoint};

/// Split the Cartesian ring into runs suitable for line fitting.
///
/// `polar` and `points` are the matched rings produced by
/// [`crate::lidar_to_robot`]. A run terminates at every Douglas–Peucker
/// vertex and at every gap wider than the adaptive threshold
/// `max(dist_clamp, r·sin16(2π/N)·dist_margin / ONE16)`. The walk covers
/// up to `2N` steps so a wall straddling the ring seam comes out as one
/// run; it stops once a run ending past the seam has been emitted.
pub fn extract_raw_lines(
    polar: &[PolarPoint],
    points: &[Point],
    config: &ExtractConfig,
) -> Vec<Vec<Point>> {
    let n = points.len();
    debug_assert_eq!(polar.len(), n);
    let mut runs = Vec::new();
    if n == 0 {
        return runs;
    }

    let keep = ring_keep_mask(points, config.epsilon);
    let beam_step = (65536 / n) as u16;
    let dist_min_sq = config.dist_min as i64 * config.dist_min as i64;

    let mut run: Vec<Point> = Vec::new();
    let mut prev = Point::new(0, 0);

    for i in 0..2 * n {
        let ii = i % n;
        let p = points[ii];

        let gap_sq = sq_dist(prev, p);
        prev = p;

        let spacing =
            polar[ii].distance as i64 * sin16(beam_step) as i64 * config.dist_margin as i64
                / ONE16 as i64;
        let dmax = spacing.max(config.dist_clamp as i64);

        if keep[ii] || gap_sq > dmax * dmax {
            let size = run.len();
            if size >= config.min_points
                && i > size + 1
                && sq_dist(run[0], run[size - 1]) >= dist_min_sq
            {
                runs.push(std::mem::take(&mut run));
                if i > ii {
                    // The emitted run closed over the seam; the rest of
                    // the second lap would only repeat it.
                    break;
                }
            }
            run.clear();
        } else {
            run.push(p);
        }
    }

    trace!(points = n, runs = runs.len(), "Extracted raw lines");
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use trig::cos16;

    fn config() -> ExtractConfig {
        ExtractConfig::default()
    }

    /// Synthesize a revolution seeing one flat wall at y = `wall_y`
    /// across bearings `[from, to)` out of `n` beams, everything else
    /// out of range (absent from the rings, as after ingest filtering).
    fn wall_scan(n: usize, from: usize, to: usize, wall_y: i32) -> (Vec<PolarPoint>, Vec<Point>) {
        let mut polar = Vec::new();
        let mut points = Vec::new();
        for i in 0..n {
            if !(from..to).contains(&i) {
                continue;
            }
            let theta = ((i * 65536 / n) & 0xFFFF) as u16;
            // Beam hits the wall where r·cos(theta) = wall_y.
            let c = cos16(theta);
            if c <= 0 {
                continue;
            }
            let r = wall_y as i64 * ONE16 as i64 / c as i64;
            let p = PolarPoint { theta, distance: r as i32 };
            polar.push(p);
            points.push(Point::new(
                (p.distance * sin16(theta) / ONE16) as i32,
                (p.distance * cos16(theta) / ONE16) as i32,
            ));
        }
        (polar, points)
    }

    #[test]
    fn test_single_wall_one_run() {
        let (polar, points) = wall_scan(360, 300, 360, 2000);
        let runs = extract_raw_lines(&polar, &points, &config());
        assert_eq!(runs.len(), 1);
        assert!(runs[0].len() >= config().min_points);
        for p in &runs[0] {
            assert!((p.y - 2000).abs() <= 4, "point off the wall: {p:?}");
        }
    }

    #[test]
    fn test_wall_across_seam_single_run() {
        // Wall spans the last and first bearings of the revolution.
        let (mut polar, mut points) = wall_scan(360, 320, 360, 2000);
        let (p2, pts2) = wall_scan(360, 0, 41, 2000);
        // Ring order: indices 0..41 first, then 320..360.
        let mut polar_ring = p2;
        polar_ring.extend(polar.drain(..));
        let mut point_ring = pts2;
        point_ring.extend(points.drain(..));

        let runs = extract_raw_lines(&polar_ring, &point_ring, &config());
        assert_eq!(runs.len(), 1, "seam-straddling wall split into {runs:?}");
        // The run holds both sides of the seam.
        let min_x = runs[0].iter().map(|p| p.x).min().unwrap();
        let max_x = runs[0].iter().map(|p| p.x).max().unwrap();
        assert!(min_x < -500 && max_x > 500);
    }

    #[test]
    fn test_short_runs_dropped() {
        let (polar, points) = wall_scan(360, 340, 343, 2000);
        let runs = extract_raw_lines(&polar, &points, &config());
        assert!(runs.is_empty());
    }

    #[test]
    fn test_empty_ring() {
        assert!(extract_raw_lines(&[], &[], &config()).is_empty());
    }
}
