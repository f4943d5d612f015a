//! Polar-to-Cartesian conversion of one LIDAR revolution.

use crate::MountConfig;
use trig::{cos16, sin16, ONE16};
use types::{Point, PolarPoint};

/// Convert a revolution of polar returns into robot-frame points.
///
/// Bearing zero is the robot's +y axis, increasing clockwise, matching
/// the sensor's rotation. Returns landing inside the robot footprint
/// rectangle are dropped; the kept polar returns are handed back
/// alongside their Cartesian twins so downstream stages can index both
/// rings with the same cursor. Angular order is preserved.
pub fn lidar_to_robot(
    polar: &[PolarPoint],
    mount: &MountConfig,
) -> (Vec<PolarPoint>, Vec<Point>) {
    let mut kept = Vec::with_capacity(polar.len());
    let mut points = Vec::with_capacity(polar.len());

    for &p in polar {
        let x = mount.offset.x + p.distance * sin16(p.theta) / ONE16;
        let y = mount.offset.y + p.distance * cos16(p.theta) / ONE16;

        let inside = x >= mount.footprint_min.x
            && x <= mount.footprint_max.x
            && y >= mount.footprint_min.y
            && y <= mount.footprint_max.y;
        if !inside {
            kept.push(p);
            points.push(Point::new(x, y));
        }
    }

    (kept, points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trig::PI16;

    #[test]
    fn test_cardinal_bearings() {
        let mount = MountConfig::default();
        let polar = vec![
            PolarPoint { theta: 0, distance: 1000 },
            PolarPoint { theta: (PI16 / 2) as u16, distance: 1000 },
            PolarPoint { theta: PI16 as u16, distance: 1000 },
        ];
        let (_, points) = lidar_to_robot(&polar, &mount);
        assert_eq!(points.len(), 3);
        // Bearing 0 looks along +y, a quarter turn along +x.
        assert!(points[0].x.abs() <= 1 && (points[0].y - 1000).abs() <= 1);
        assert!((points[1].x - 1000).abs() <= 1 && points[1].y.abs() <= 1);
        assert!(points[2].x.abs() <= 1 && (points[2].y + 1000).abs() <= 1);
    }

    #[test]
    fn test_footprint_filtered() {
        let mount = MountConfig::default();
        let polar = vec![
            // Inside the footprint: the robot seeing itself.
            PolarPoint { theta: 0, distance: 50 },
            PolarPoint { theta: 0, distance: 2000 },
        ];
        let (kept, points) = lidar_to_robot(&polar, &mount);
        assert_eq!(points.len(), 1);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].distance, 2000);
    }

    #[test]
    fn test_kept_rings_stay_aligned() {
        let mount = MountConfig::default();
        let polar: Vec<PolarPoint> = (0..360)
            .map(|i| PolarPoint {
                theta: (i * 182) as u16,
                distance: if i % 7 == 0 { 10 } else { 1500 },
            })
            .collect();
        let (kept, points) = lidar_to_robot(&polar, &mount);
        assert_eq!(kept.len(), points.len());
        for (pp, p) in kept.iter().zip(&points) {
            let x = pp.distance * sin16(pp.theta) / ONE16;
            let y = pp.distance * cos16(pp.theta) / ONE16;
            assert_eq!(Point::new(x, y), *p);
        }
    }
}
