//! Douglas–Peucker simplification over a closed ring of points.

use types::Point;

/// Mark the points a Douglas–Peucker pass over the closed ring keeps.
///
/// The ring is seeded with an approximate diameter pair (the point
/// farthest from index 0, then the point farthest from that one) so the
/// seeds are genuine extremes of the curve rather than artifacts of
/// where the revolution happens to start; each of the two arcs between
/// them is then simplified against its chord with tolerance `epsilon`
/// (mm). The returned mask has one entry per input point; kept points
/// are the polyline vertices later used as run terminators.
pub fn ring_keep_mask(points: &[Point], epsilon: f64) -> Vec<bool> {
    let n = points.len();
    if n <= 2 {
        return vec![true; n];
    }

    let mut mask = vec![false; n];

    let far0 = (1..n)
        .max_by_key(|&i| sq_dist(points[0], points[i]))
        .unwrap_or(0);
    let far1 = (0..n)
        .filter(|&i| i != far0)
        .max_by_key(|&i| sq_dist(points[far0], points[i]))
        .unwrap_or(far0);

    let (lo, hi) = if far0 < far1 { (far0, far1) } else { (far1, far0) };
    mask[lo] = true;
    mask[hi] = true;
    simplify_arc(points, &mut mask, epsilon, lo, hi);
    simplify_arc(points, &mut mask, epsilon, hi, lo + n);
    mask
}

/// Recursively keep the farthest interior point of the arc `(lo, hi)`
/// when it deviates from the chord by more than epsilon. Indices are
/// taken modulo the ring length, so `hi` may run past the seam.
fn simplify_arc(points: &[Point], mask: &mut [bool], epsilon: f64, lo: usize, hi: usize) {
    if hi - lo < 2 {
        return;
    }
    let n = points.len();
    let a = points[lo % n];
    let b = points[hi % n];

    let mut worst = lo;
    let mut worst_dist = 0.0;
    for i in lo + 1..hi {
        let d = chord_dist(points[i % n], a, b);
        if d > worst_dist {
            worst_dist = d;
            worst = i;
        }
    }

    if worst_dist > epsilon {
        mask[worst % n] = true;
        simplify_arc(points, mask, epsilon, lo, worst);
        simplify_arc(points, mask, epsilon, worst, hi);
    }
}

/// Perpendicular distance from `p` to the chord `a`→`b`, falling back to
/// the point distance when the chord is degenerate.
fn chord_dist(p: Point, a: Point, b: Point) -> f64 {
    let dx = (b.x - a.x) as f64;
    let dy = (b.y - a.y) as f64;
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 {
        return (sq_dist(p, a) as f64).sqrt();
    }
    ((p.x - a.x) as f64 * dy - (p.y - a.y) as f64 * dx).abs() / len
}

fn sq_dist(p: Point, q: Point) -> i64 {
    let dx = (q.x - p.x) as i64;
    let dy = (q.y - p.y) as i64;
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_edges_collapse() {
        // A square traced densely: only corners should survive.
        let mut ring = Vec::new();
        for i in 0..50 {
            ring.push(Point::new(i * 20, 0));
        }
        for i in 0..50 {
            ring.push(Point::new(1000, i * 20));
        }
        for i in 0..50 {
            ring.push(Point::new(1000 - i * 20, 1000));
        }
        for i in 0..50 {
            ring.push(Point::new(0, 1000 - i * 20));
        }

        let mask = ring_keep_mask(&ring, 10.0);
        let kept: Vec<usize> = (0..ring.len()).filter(|&i| mask[i]).collect();
        for corner in [0usize, 50, 100, 150] {
            assert!(mask[corner], "corner {corner} dropped");
        }
        assert_eq!(kept, vec![0, 50, 100, 150]);
    }

    #[test]
    fn test_deviating_point_kept() {
        let mut ring: Vec<Point> = (0..100).map(|i| Point::new(i * 10, 0)).collect();
        ring[40] = Point::new(400, 80);
        let mask = ring_keep_mask(&ring, 30.0);
        assert!(mask[40]);
    }

    #[test]
    fn test_straight_ring_keeps_only_extremes() {
        // A wall seen across the seam: the ring is one collinear sweep.
        // No interior vertex may survive, or the seam walk would split
        // the wall in two.
        let ring: Vec<Point> = (0..80).map(|i| Point::new(-2000 + i * 50, 1500)).collect();
        let mask = ring_keep_mask(&ring, 30.0);
        let kept: Vec<usize> = (0..ring.len()).filter(|&i| mask[i]).collect();
        assert_eq!(kept, vec![0, 79]);
    }

    #[test]
    fn test_tiny_rings_kept_whole() {
        assert_eq!(ring_keep_mask(&[], 10.0).len(), 0);
        let two = [Point::new(0, 0), Point::new(5, 5)];
        assert_eq!(ring_keep_mask(&two, 10.0), vec![true, true]);
    }
}
