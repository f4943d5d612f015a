//! Line-segment SLAM for the scout rover.
//!
//! Provides:
//! - Assimilation of observed wall segments into a persistent map
//!   (match, merge, admit)
//! - Pose correction from the length-weighted observation residual
//! - A motion-driven confidence gate on map growth
//! - Dead-reckoning odometry with optional IMU yaw fusion
//!
//! The engine runs once per completed LIDAR revolution and owns the
//! map, the pose and the confidence state; odometry ticks run at the
//! remote-frame rate between revolutions.

use std::f64::consts::PI;

use geometry::{
    diff_angle, dist_point_line, foot_offset, grow_line, line_angle, midpoint, ratio_point_line,
    sq_len, sq_norm,
};
use tracing::{debug, trace};
use trig::{cos16, rad_to_angle16, sin16, ONE16, PI16};
use types::{MotionCommand, Point, Pose, Segment};

mod confidence;
mod frames;
mod map;

pub use confidence::ConfidenceGate;
pub use frames::{map_to_robot, robot_to_map};
pub use map::Map;

/// Matching and correction tolerances.
#[derive(Debug, Clone)]
pub struct SlamConfig {
    /// Angular mismatch below which a map segment may be merged (rad).
    pub small_angular_error: f64,
    /// Angular mismatch above which a map segment cannot match (rad).
    pub large_angular_error: f64,
    /// Distance below which a map segment may be merged (mm).
    pub small_dist_error: i64,
    /// Distance above which a map segment cannot match (mm).
    pub large_dist_error: i64,
    /// Feedback divisor on the positional residual.
    pub odometry_corrector_div: i64,
    /// Feedback divisor on the angular residual (heading from odometry).
    pub theta_corrector_div: i64,
    /// Feedback divisor on the angular residual (heading from IMU).
    pub imu_theta_corrector_div: i64,
    /// Quiet ticks required before the confidence gate can open.
    pub confidence_delay: u32,
}

impl Default for SlamConfig {
    fn default() -> Self {
        Self {
            small_angular_error: 0.1,
            large_angular_error: 0.35,
            small_dist_error: 40,
            large_dist_error: 200,
            odometry_corrector_div: 5,
            theta_corrector_div: 10,
            imu_theta_corrector_div: 50,
            confidence_delay: 20,
        }
    }
}

/// Dead-reckoning scale factors.
#[derive(Debug, Clone)]
pub struct OdometryConfig {
    /// Divisor from commanded vx to mm per tick.
    pub vx_div: i32,
    /// Divisor from commanded vy to mm per tick.
    pub vy_div: i32,
    /// Multiplier from commanded vz to angle16 per tick.
    pub vz_mul: i32,
    /// Sign of the IMU yaw axis relative to the map frame.
    pub dir_z: i32,
}

impl Default for OdometryConfig {
    fn default() -> Self {
        Self {
            vx_div: 10,
            vy_div: 10,
            vz_mul: 5,
            dir_z: -1,
        }
    }
}

/// Result of one scan assimilation tick.
#[derive(Debug, Clone, Copy)]
pub struct ScanUpdate {
    /// Observations paired with at least one map segment.
    pub matched: usize,
    /// Observations with no counterpart in the map this tick.
    pub novel: usize,
    /// Novel observations admitted into the map.
    pub admitted: usize,
    /// Confidence after this tick.
    pub confidence: bool,
    /// Map size after this tick.
    pub map_len: usize,
}

/// The SLAM engine: sole owner of map, pose and confidence state.
pub struct SlamEngine {
    config: SlamConfig,
    odometry: OdometryConfig,
    map: Map,
    pose: Pose,
    gate: ConfidenceGate,
    confidence: bool,
    /// Accumulated heading correction, applied on top of the IMU yaw.
    theta_corrector: u16,
    /// Whether an IMU drives the heading (selects the feedback path).
    imu: bool,
}

impl SlamEngine {
    pub fn new(config: SlamConfig, odometry: OdometryConfig, imu: bool) -> Self {
        let gate = ConfidenceGate::new(
            config.confidence_delay,
            config.small_dist_error,
            config.small_angular_error,
        );
        Self {
            config,
            odometry,
            map: Map::new(),
            pose: Pose::default(),
            gate,
            confidence: false,
            theta_corrector: 0,
            imu,
        }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    pub fn confidence(&self) -> bool {
        self.confidence
    }

    /// Advance the pose by one control tick of commanded velocities.
    ///
    /// With an IMU the heading is the fused yaw plus the accumulated
    /// SLAM correction; without one it integrates the commanded turn
    /// rate. Position integrates the commanded translation rotated into
    /// the world frame.
    pub fn odometry_tick(&mut self, cmd: &MotionCommand, imu_yaw: Option<f64>) {
        match imu_yaw {
            Some(yaw) if self.imu => {
                let mut base = rad_to_angle16(yaw);
                if self.odometry.dir_z < 0 {
                    base = base.wrapping_neg();
                }
                self.pose.theta = base.wrapping_add(self.theta_corrector);
            }
            _ => {
                let turn = cmd.vz as i32 * self.odometry.vz_mul;
                self.pose.theta = self.pose.theta.wrapping_add(turn as u16);
            }
        }

        let s = sin16(self.pose.theta);
        let c = cos16(self.pose.theta);
        self.pose.position.x +=
            (cmd.vx as i32 * c - cmd.vy as i32 * s) / ONE16 / self.odometry.vx_div;
        self.pose.position.y +=
            (cmd.vx as i32 * s + cmd.vy as i32 * c) / ONE16 / self.odometry.vy_div;

        trace!(
            x = self.pose.position.x,
            y = self.pose.position.y,
            theta = self.pose.theta,
            "Odometry tick"
        );
    }

    /// Assimilate one revolution's observations (world frame).
    ///
    /// Pairs each observation with map segments, accumulates the
    /// length-weighted residual, merges compatible lines when confident,
    /// admits novel segments through the confidence gate and feeds the
    /// residual back into the pose.
    pub fn scan_tick(&mut self, observations: &[Segment], cmd: &MotionCommand) -> ScanUpdate {
        let mut delta_x: i64 = 0;
        let mut delta_y: i64 = 0;
        let mut delta_angle: f64 = 0.0;
        let mut weight_sum: i64 = 0;
        let mut matched_count = 0;
        let mut novel: Vec<Segment> = Vec::new();

        for &obs in observations {
            let mut matched = false;

            let mut j = 0;
            while j < self.map.len() {
                let m = self.map.get(j);

                let alpha = diff_angle(line_angle(obs), line_angle(m));
                if alpha.abs() > self.config.large_angular_error {
                    j += 1;
                    continue;
                }

                let offset = foot_offset(midpoint(obs), m);
                let dist = (sq_norm(offset) as f64).sqrt() as i64;
                if dist > self.config.large_dist_error {
                    j += 1;
                    continue;
                }

                let len = (sq_len(m) as f64).sqrt();
                let t1 = ratio_point_line(obs.a, m) * len;
                let t2 = ratio_point_line(obs.b, m) * len;
                let large = self.config.large_dist_error as f64;
                if t1 * t2 > 0.0
                    && !(-large..=len + large).contains(&t1)
                    && !(-large..=len + large).contains(&t2)
                {
                    // Observation lies entirely past one end of the
                    // map segment.
                    j += 1;
                    continue;
                }

                matched = true;
                let w = len as i64;
                delta_x += offset.x as i64 * w;
                delta_y += offset.y as i64 * w;
                delta_angle += alpha * len;
                weight_sum += w;

                // Only a settled pose may edit the map.
                if !self.confidence
                    || alpha.abs() > self.config.small_angular_error
                    || dist > self.config.small_dist_error
                {
                    j += 1;
                    continue;
                }
                let small = self.config.small_dist_error as f64;
                if t1 * t2 > 0.0
                    && !(-small..=len + small).contains(&t1)
                    && !(-small..=len + small).contains(&t2)
                {
                    j += 1;
                    continue;
                }

                let mut grown = self.map.get(j);
                let mut grew = grow_line(obs.a, &mut grown);
                grew |= grow_line(obs.b, &mut grown);
                if !grew {
                    j += 1;
                    continue;
                }
                self.map.set(j, grown);

                self.absorb_colinear(&mut j);
                break;
            }

            if matched {
                matched_count += 1;
            } else {
                novel.push(obs);
            }
        }

        let (residual, residual_angle) = if weight_sum > 0 {
            (
                Point::new((delta_x / weight_sum) as i32, (delta_y / weight_sum) as i32),
                delta_angle / weight_sum as f64,
            )
        } else {
            (Point::new(0, 0), 0.0)
        };
        self.confidence = self.gate.update(cmd.is_moving(), residual, residual_angle);

        let mut admitted = 0;
        if self.confidence {
            admitted = novel.len();
            for seg in &novel {
                self.map.push(*seg);
            }
        }
        self.map.sort_by_length();

        if weight_sum > 0 {
            self.pose.position.x -= residual.x / self.config.odometry_corrector_div as i32;
            self.pose.position.y -= residual.y / self.config.odometry_corrector_div as i32;

            let dtheta = (delta_angle * PI16 as f64 / PI) as i64 / weight_sum;
            if self.imu {
                let correction = dtheta / self.config.imu_theta_corrector_div;
                self.theta_corrector = self.theta_corrector.wrapping_add(correction as u16);
            } else {
                let correction = dtheta / self.config.theta_corrector_div;
                self.pose.theta = self.pose.theta.wrapping_add(correction as u16);
            }
        }

        debug!(
            matched = matched_count,
            novel = novel.len(),
            admitted,
            confidence = self.confidence,
            map_len = self.map.len(),
            "Scan assimilated"
        );

        ScanUpdate {
            matched: matched_count,
            novel: novel.len(),
            admitted,
            confidence: self.confidence,
            map_len: self.map.len(),
        }
    }

    /// After segment `j` grew, sweep the map for lines it has become
    /// colinear with, absorb their extent and drop them. `j` is
    /// adjusted when a removal shifts it.
    fn absorb_colinear(&mut self, j: &mut usize) {
        let mut k = 0;
        while k < self.map.len() {
            if k == *j || !self.test_lines(self.map.get(*j), self.map.get(k)) {
                k += 1;
                continue;
            }

            let other = self.map.get(k);
            let mut grown = self.map.get(*j);
            grow_line(other.a, &mut grown);
            grow_line(other.b, &mut grown);
            self.map.set(*j, grown);

            self.map.remove(k);
            if k < *j {
                *j -= 1;
            }
            // The next candidate slid into slot k.
        }
    }

    /// Colinearity test: `other` is absorbable when it lies within the
    /// small tolerances of `line` and at least one of `line`'s endpoints
    /// projects inside `other`'s extent.
    fn test_lines(&self, line: Segment, other: Segment) -> bool {
        let alpha = diff_angle(line_angle(line), line_angle(other));
        if alpha.abs() >= self.config.small_angular_error {
            return false;
        }

        if dist_point_line(midpoint(line), other) >= self.config.small_dist_error {
            return false;
        }

        let len = (sq_len(other) as f64).sqrt();
        let t1 = ratio_point_line(line.a, other) * len;
        let t2 = ratio_point_line(line.b, other) * len;
        let small = self.config.small_dist_error as f64;
        (-small..=len + small).contains(&t1) || (-small..=len + small).contains(&t2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(ax: i32, ay: i32, bx: i32, by: i32) -> Segment {
        Segment::new(Point::new(ax, ay), Point::new(bx, by))
    }

    fn engine() -> SlamEngine {
        SlamEngine::new(SlamConfig::default(), OdometryConfig::default(), false)
    }

    fn still() -> MotionCommand {
        MotionCommand::default()
    }

    /// Run enough quiet empty ticks for the confidence gate to open.
    fn settle(engine: &mut SlamEngine) {
        for _ in 0..engine.config.confidence_delay {
            engine.scan_tick(&[], &still());
        }
        assert!(engine.confidence());
    }

    #[test]
    fn test_empty_scan_is_inert() {
        // S1: an empty observation set leaves map and pose untouched.
        let mut e = engine();
        e.map.push(seg(0, 0, 1000, 0));
        let pose_before = e.pose();

        let update = e.scan_tick(&[], &still());
        assert_eq!(update.map_len, 1);
        assert_eq!(e.map().segments(), &[seg(0, 0, 1000, 0)]);
        assert_eq!(e.pose(), pose_before);
        assert_eq!(e.gate.delay(), SlamConfig::default().confidence_delay - 1);
    }

    #[test]
    fn test_first_wall_admitted_after_settling() {
        // S2: with an empty map the first wall enters once the robot
        // has been still for the full countdown.
        let mut e = engine();
        let wall = seg(1000, -500, 1000, 500);

        for tick in 0..19 {
            let update = e.scan_tick(&[wall], &still());
            assert!(!update.confidence, "tick {tick}");
            assert_eq!(update.map_len, 0);
        }
        let update = e.scan_tick(&[wall], &still());
        assert!(update.confidence);
        assert_eq!(update.admitted, 1);
        assert_eq!(e.map().segments(), &[wall]);
    }

    #[test]
    fn test_offset_wall_corrects_pose() {
        // S3: a matching wall observed 50 mm too far pulls the pose
        // back by the divided residual; the map keeps one segment.
        let mut e = engine();
        e.map.push(seg(1000, -500, 1000, 500));
        settle(&mut e);

        let update = e.scan_tick(&[seg(1050, -500, 1050, 500)], &still());
        assert_eq!(update.matched, 1);
        assert_eq!(update.novel, 0);
        assert_eq!(e.map().len(), 1);
        // Residual (50, 0) divided by the corrector divisor of 5.
        assert_eq!(e.pose().position, Point::new(-10, 0));
    }

    #[test]
    fn test_colinear_extension_merges() {
        // S4: an observation bridging two colinear map segments
        // coalesces them into one spanning both.
        let mut e = engine();
        e.map.push(seg(0, 0, 1000, 0));
        e.map.push(seg(1200, 0, 2000, 0));
        e.map.sort_by_length();
        settle(&mut e);

        let update = e.scan_tick(&[seg(900, 0, 1300, 0)], &still());
        assert_eq!(update.map_len, 1);
        let merged = e.map().get(0);
        assert_eq!(merged.a, Point::new(0, 0));
        assert_eq!(merged.b, Point::new(2000, 0));
    }

    #[test]
    fn test_motion_suppresses_growth() {
        // S5: commanded motion keeps novel walls out of the map and
        // rewinds the countdown.
        let mut e = engine();
        settle(&mut e);

        let moving = MotionCommand { vx: 100, vy: 0, vz: 0 };
        let update = e.scan_tick(&[seg(3000, -400, 3000, 400)], &moving);
        assert!(!update.confidence);
        assert_eq!(update.novel, 1);
        assert_eq!(update.admitted, 0);
        assert_eq!(update.map_len, 0);
        assert_eq!(e.gate.delay(), SlamConfig::default().confidence_delay - 1);
    }

    #[test]
    fn test_map_stays_sorted() {
        let mut e = engine();
        settle(&mut e);
        e.scan_tick(&[seg(0, 0, 300, 0)], &still());
        e.scan_tick(&[seg(0, 1000, 2000, 1000)], &still());
        e.scan_tick(&[seg(5000, 0, 5000, 800)], &still());
        assert_eq!(e.map().len(), 3);
        assert!(e.map().is_sorted_by_length());
    }

    #[test]
    fn test_observation_past_endpoint_is_novel() {
        // A colinear wall entirely beyond the map segment's end is a
        // different wall, not a match.
        let mut e = engine();
        e.map.push(seg(0, 0, 1000, 0));
        settle(&mut e);

        let update = e.scan_tick(&[seg(1500, 0, 2500, 0)], &still());
        assert_eq!(update.matched, 0);
        assert_eq!(update.novel, 1);
        // Confident and still: the far wall is admitted as new.
        assert_eq!(update.map_len, 2);
    }

    #[test]
    fn test_angled_observation_not_matched() {
        let mut e = engine();
        e.map.push(seg(0, 0, 1000, 0));
        settle(&mut e);

        // 45 degrees off: beyond the large angular tolerance.
        let update = e.scan_tick(&[seg(0, 0, 700, 700)], &still());
        assert_eq!(update.matched, 0);
        assert_eq!(update.novel, 1);
    }

    #[test]
    fn test_residual_sign_convention() {
        // A wall observed closer than mapped pushes the pose the other
        // way.
        let mut e = engine();
        e.map.push(seg(1000, -500, 1000, 500));
        settle(&mut e);

        e.scan_tick(&[seg(950, -500, 950, 500)], &still());
        assert_eq!(e.pose().position, Point::new(10, 0));
    }

    #[test]
    fn test_odometry_forward() {
        let mut e = engine();
        // Heading 0 means +x; vx scales down by vx_div.
        e.odometry_tick(&MotionCommand { vx: 1000, vy: 0, vz: 0 }, None);
        let pose = e.pose();
        assert!((pose.position.x - 100).abs() <= 1);
        assert_eq!(pose.position.y, 0);
        assert_eq!(pose.theta, 0);
    }

    #[test]
    fn test_odometry_turn_then_forward() {
        let mut e = engine();
        // Integrate a quarter turn: vz·vz_mul per tick.
        let turn = MotionCommand { vx: 0, vy: 0, vz: 1000 };
        for _ in 0..3 {
            e.odometry_tick(&turn, None);
        }
        assert_eq!(e.pose().theta, 15000);

        let mut e = engine();
        e.pose.theta = (PI16 / 2) as u16;
        e.odometry_tick(&MotionCommand { vx: 1000, vy: 0, vz: 0 }, None);
        let pose = e.pose();
        assert!(pose.position.x.abs() <= 1);
        assert!((pose.position.y - 100).abs() <= 1);
    }

    #[test]
    fn test_odometry_imu_heading() {
        let mut e = SlamEngine::new(SlamConfig::default(), OdometryConfig::default(), true);
        // dir_z = -1 mirrors the IMU yaw axis.
        e.odometry_tick(&still(), Some(std::f64::consts::PI / 2.0));
        assert_eq!(e.pose().theta, 0u16.wrapping_sub((PI16 / 2) as u16));
    }

    #[test]
    fn test_imu_feedback_goes_to_corrector() {
        let mut e = SlamEngine::new(SlamConfig::default(), OdometryConfig::default(), true);
        e.map.push(seg(0, -500, 0, 500));
        settle(&mut e);

        // Observation rotated slightly against the map segment.
        e.scan_tick(&[seg(30, -500, -30, 500)], &still());
        assert_ne!(e.theta_corrector, 0);
        // Heading itself only moves on the next odometry tick.
        assert_eq!(e.pose().theta, 0);
    }

    #[test]
    fn test_growth_preserved_across_ticks() {
        // Invariant 7 at engine level: merging only ever lengthens the
        // map segment.
        let mut e = engine();
        e.map.push(seg(0, 0, 1000, 0));
        settle(&mut e);

        e.scan_tick(&[seg(-200, 0, 600, 0)], &still());
        let len_after = sq_len(e.map().get(0));
        assert!(len_after >= sq_len(seg(0, 0, 1200, 0)));
        assert_eq!(e.map().len(), 1);
    }
}
