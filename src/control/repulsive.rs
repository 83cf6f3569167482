//! Obstacle repulsion from IR readings.
//!
//! Each detecting sensor pushes the robot straight back along its own
//! bearing. The magnitude depends on clearance (distance minus body radius)
//! in three regimes:
//!
//! - contact (clearance < 1 cm): a fixed ceiling `10·k`
//! - close (clearance < d_safe): `k·(1/c − 1/d_safe)²`
//! - far: `k·(d_safe/c)³·(1 − d/influence)`, fading to zero at the
//!   influence radius

use std::f32::consts::PI;

use crate::config::{GoalPriorityConfig, NavConfig};
use crate::geometry::{Pose, Vector2};
use crate::perception::{Gap, NormalizedReadings, SensorCalibration};

/// Clearance below which the contact ceiling applies (cm).
const CONTACT_CLEARANCE: f32 = 1.0;
/// Contact ceiling as a multiple of the gain.
const CONTACT_MULTIPLIER: f32 = 10.0;

/// Gains for one evaluation of the repulsive field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RepulsiveGains {
    pub k_repulsive: f32,
    pub influence_radius: f32,
}

/// Clearance-based repulsion model.
#[derive(Clone, Debug)]
pub struct RepulsiveModel {
    robot_radius: f32,
    safe_distance: f32,
    gap_factor: f32,
    goal_priority: GoalPriorityConfig,
}

impl RepulsiveModel {
    pub fn new(config: &NavConfig) -> Self {
        Self {
            robot_radius: config.robot.radius,
            safe_distance: config.repulsive.safe_distance,
            gap_factor: config.gap.repulsion_factor,
            goal_priority: config.goal_priority.clone(),
        }
    }

    /// Repulsive magnitude for an obstacle `distance` cm from the sensor.
    pub fn magnitude(&self, gains: RepulsiveGains, distance: f32) -> f32 {
        if distance >= gains.influence_radius {
            return 0.0;
        }
        let k = gains.k_repulsive;
        let clearance = distance - self.robot_radius;
        if clearance < CONTACT_CLEARANCE {
            k * CONTACT_MULTIPLIER
        } else if clearance < self.safe_distance {
            let term = 1.0 / clearance - 1.0 / self.safe_distance;
            k * term * term
        } else {
            let reach = 1.0 - distance / gains.influence_radius;
            k * (self.safe_distance / clearance).powi(3) * reach
        }
    }

    /// Sum of per-sensor repulsion in the world frame.
    ///
    /// Sensors on the edge of a navigable gap are damped so the robot is not
    /// pushed away from an opening it can pass through. When goal priority
    /// is enabled, obstacles lying beyond the goal are damped as well.
    pub fn force(
        &self,
        pose: &Pose,
        readings: &NormalizedReadings,
        calibration: &SensorCalibration,
        gaps: &[Gap],
        gains: RepulsiveGains,
        goal_distance: f32,
    ) -> Vector2 {
        let heading = pose.heading_rad();
        let mut total = Vector2::ZERO;

        for (i, intensity) in readings.iter() {
            if intensity < calibration.detect_threshold() {
                continue;
            }
            let distance = calibration.estimate_distance(i, intensity);
            let mut magnitude = self.magnitude(gains, distance);
            if magnitude == 0.0 {
                continue;
            }

            if gaps.iter().any(|g| g.is_navigable && g.has_edge(i)) {
                magnitude *= self.gap_factor;
            }
            if self.goal_priority.enabled {
                let obstacle_range = calibration.mounting_radius() + distance;
                if goal_distance <= obstacle_range + self.goal_priority.margin {
                    magnitude *= self.goal_priority.repulsion_factor;
                }
            }

            let away = heading + calibration.bearing(i) + PI;
            total += Vector2::from_polar(magnitude, away);
        }

        total
    }
}
