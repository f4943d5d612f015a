//! Least-squares line fitting of extracted point runs.

use geometry::sq_dist;
use nalgebra::Vector2;
use types::{Point, Segment};

/// Fit a segment to each point run.
///
/// The fit is total least squares: the direction minimizing the summed
/// squared perpendicular distances through the run centroid. Endpoints
/// are the centroid pushed along the direction by the centroid-to-end
/// distances of the raw run, oriented so that endpoint `a` sits on the
/// side of the run's first point. Degenerate fits (coincident
/// endpoints) are discarded.
pub fn fit_lines(runs: &[Vec<Point>]) -> Vec<Segment> {
    runs.iter().filter_map(|run| fit_run(run)).collect()
}

fn fit_run(run: &[Point]) -> Option<Segment> {
    if run.len() < 2 {
        return None;
    }

    let n = run.len() as f64;
    let centroid = run
        .iter()
        .fold(Vector2::zeros(), |acc, p| acc + Vector2::new(p.x as f64, p.y as f64))
        / n;

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for p in run {
        let dx = p.x as f64 - centroid.x;
        let dy = p.y as f64 - centroid.y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    // Principal axis of the centered scatter.
    let angle = 0.5 * (2.0 * sxy).atan2(sxx - syy);
    let dir = Vector2::new(angle.cos(), angle.sin());

    let first = run[0];
    let last = run[run.len() - 1];
    let d1 = (centroid - Vector2::new(first.x as f64, first.y as f64)).norm();
    let d2 = (centroid - Vector2::new(last.x as f64, last.y as f64)).norm();

    let forward = segment_from(centroid, dir, d1, d2);
    let backward = segment_from(centroid, -dir, d1, d2);

    let cost = |s: &Segment| sq_dist(s.a, first) + sq_dist(s.b, last);
    let fitted = if cost(&forward) <= cost(&backward) {
        forward
    } else {
        backward
    };

    (!fitted.is_degenerate()).then_some(fitted)
}

/// Endpoints `c + d1·dir` and `c − d2·dir`, rounded to millimetres.
fn segment_from(c: Vector2<f64>, dir: Vector2<f64>, d1: f64, d2: f64) -> Segment {
    let a = c + dir * d1;
    let b = c - dir * d2;
    Segment::new(
        Point::new(a.x.round() as i32, a.y.round() as i32),
        Point::new(b.x.round() as i32, b.y.round() as i32),
    )
}
