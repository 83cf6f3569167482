//! Odometry frame to world frame.
//!
//! The robot's odometry restarts from its own origin on every navigation
//! reset. A mission fixes one rigid transform at that moment: the rotation
//! that takes the reported heading onto the desired initial heading, and the
//! translation that puts the reported position onto the initial position.
//! Every later pose goes through the same transform.

use crate::geometry::Pose;
use crate::utils::normalize_degrees;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OdometryFrame {
    rotation_deg: f32,
    cos: f32,
    sin: f32,
    offset_x: f32,
    offset_y: f32,
}

impl OdometryFrame {
    /// Fix the transform from the raw pose read right after a reset.
    pub fn establish(initial: &Pose, raw_at_reset: &Pose) -> Self {
        let rotation_deg = normalize_degrees(initial.heading_deg - raw_at_reset.heading_deg);
        let (sin, cos) = rotation_deg.to_radians().sin_cos();
        let rotated_x = cos * raw_at_reset.x - sin * raw_at_reset.y;
        let rotated_y = sin * raw_at_reset.x + cos * raw_at_reset.y;
        Self {
            rotation_deg,
            cos,
            sin,
            offset_x: initial.x - rotated_x,
            offset_y: initial.y - rotated_y,
        }
    }

    /// Heading offset added to every raw heading, degrees.
    #[inline]
    pub fn rotation_deg(&self) -> f32 {
        self.rotation_deg
    }

    /// World pose for a raw odometry pose.
    pub fn apply(&self, raw: &Pose) -> Pose {
        Pose::new(
            self.cos * raw.x - self.sin * raw.y + self.offset_x,
            self.sin * raw.x + self.cos * raw.y + self.offset_y,
            raw.heading_deg + self.rotation_deg,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_reset_pose_maps_to_initial() {
        let initial = Pose::new(50.0, -20.0, 90.0);
        let raw = Pose::new(0.0, 0.0, 0.0);
        let frame = OdometryFrame::establish(&initial, &raw);
        let world = frame.apply(&raw);
        assert_relative_eq!(world.x, 50.0, epsilon = 1e-4);
        assert_relative_eq!(world.y, -20.0, epsilon = 1e-4);
        assert_relative_eq!(world.heading_deg, 90.0, epsilon = 1e-4);
    }

    #[test]
    fn test_forward_motion_follows_initial_heading() {
        // Odometry says "10 cm forward along my x axis"; the robot faces +y
        let frame = OdometryFrame::establish(&Pose::new(0.0, 0.0, 90.0), &Pose::default());
        let world = frame.apply(&Pose::new(10.0, 0.0, 0.0));
        assert_relative_eq!(world.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(world.y, 10.0, epsilon = 1e-4);
        assert_relative_eq!(world.heading_deg, 90.0, epsilon = 1e-4);
    }

    #[test]
    fn test_nonzero_reset_heading_is_absorbed() {
        let initial = Pose::new(0.0, 0.0, 0.0);
        let raw_reset = Pose::new(0.0, 0.0, 170.0);
        let frame = OdometryFrame::establish(&initial, &raw_reset);
        assert_relative_eq!(frame.rotation_deg(), -170.0, epsilon = 1e-4);

        // Turning 20 degrees left in odometry wraps past 180
        let world = frame.apply(&Pose::new(0.0, 0.0, -170.0));
        assert_relative_eq!(world.heading_deg, 20.0, epsilon = 1e-3);
    }

    #[test]
    fn test_apply_is_deterministic() {
        let frame = OdometryFrame::establish(&Pose::new(12.0, 7.0, -45.0), &Pose::new(3.0, 1.0, 30.0));
        let raw = Pose::new(40.0, -15.0, 100.0);
        assert_eq!(frame.apply(&raw), frame.apply(&raw));
        let again = OdometryFrame::establish(&Pose::new(12.0, 7.0, -45.0), &Pose::new(3.0, 1.0, 30.0));
        assert_eq!(frame.apply(&raw), again.apply(&raw));
    }

    #[test]
    fn test_heading_stays_half_open() {
        let frame = OdometryFrame::establish(&Pose::new(0.0, 0.0, 180.0), &Pose::default());
        let world = frame.apply(&Pose::new(0.0, 0.0, 0.0));
        assert_relative_eq!(world.heading_deg, 180.0);
        let turned = frame.apply(&Pose::new(0.0, 0.0, 90.0));
        assert_relative_eq!(turned.heading_deg, -90.0, epsilon = 1e-4);
    }
}
