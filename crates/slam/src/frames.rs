//! Rigid transforms between the robot and world frames.
//!
//! Both directions run on the fixed-point trig table; divisions by
//! `ONE16` truncate toward zero, so a round trip is exact to within a
//! couple of millimetres over the sensor's range.

use trig::{cos16, sin16, ONE16};
use types::{Point, Pose, Segment};

/// Transform a robot-frame segment into the world frame: rotate by the
/// pose heading, then translate by the pose position.
pub fn robot_to_map(segment: Segment, pose: &Pose) -> Segment {
    Segment::new(
        robot_to_map_point(segment.a, pose),
        robot_to_map_point(segment.b, pose),
    )
}

/// Transform a world-frame segment into the robot frame: translate by
/// the negated position, then rotate by the negated heading.
pub fn map_to_robot(segment: Segment, pose: &Pose) -> Segment {
    Segment::new(
        map_to_robot_point(segment.a, pose),
        map_to_robot_point(segment.b, pose),
    )
}

fn robot_to_map_point(p: Point, pose: &Pose) -> Point {
    let s = sin16(pose.theta) as i64;
    let c = cos16(pose.theta) as i64;
    Point::new(
        pose.position.x + ((p.x as i64 * c - p.y as i64 * s) / ONE16 as i64) as i32,
        pose.position.y + ((p.x as i64 * s + p.y as i64 * c) / ONE16 as i64) as i32,
    )
}

fn map_to_robot_point(p: Point, pose: &Pose) -> Point {
    let neg = 0u16.wrapping_sub(pose.theta);
    let s = sin16(neg) as i64;
    let c = cos16(neg) as i64;
    let t = p - pose.position;
    Point::new(
        ((t.x as i64 * c - t.y as i64 * s) / ONE16 as i64) as i32,
        ((t.x as i64 * s + t.y as i64 * c) / ONE16 as i64) as i32,
    )
}
