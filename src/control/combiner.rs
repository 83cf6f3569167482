//! Force blending and the differential-drive kinematic projector.

use crate::config::{ControlConfig, NavConfig, SensorConfig};
use crate::geometry::Vector2;
use crate::perception::{LEFT_SENSORS, NormalizedReadings, RIGHT_SENSORS};

/// Heading error above which a critical lateral obstacle blocks the turn (rad).
const CRITICAL_TURN_LIMIT: f32 = 0.3;
/// Turn still allowed towards a critical lateral obstacle (rad).
const CRITICAL_TURN_ALLOWANCE: f32 = 0.1;
/// Heading error above which a warning lateral obstacle halves the turn (rad).
const WARNING_TURN_LIMIT: f32 = 0.5;

/// Blend of attractive and repulsive headings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Blend {
    /// Desired world heading, radians
    pub heading: f32,
    /// Share given to the repulsive direction, 0 when repulsion is negligible
    pub weight_rep: f32,
    /// Multiplier on linear speed
    pub slowdown: f32,
}

/// Weighted unit-vector blend of the goal bearing and the repulsive direction.
pub fn blend_heading(attractive_bearing: f32, repulsive: Vector2, control: &ControlConfig) -> Blend {
    let magnitude = repulsive.magnitude();
    if magnitude <= control.blend_threshold {
        return Blend {
            heading: attractive_bearing,
            weight_rep: 0.0,
            slowdown: 1.0,
        };
    }

    let weight_rep = (magnitude / control.blend_scale).min(control.blend_cap);
    let weight_att = 1.0 - weight_rep;
    let rep_angle = repulsive.angle();
    let x = weight_att * attractive_bearing.cos() + weight_rep * rep_angle.cos();
    let y = weight_att * attractive_bearing.sin() + weight_rep * rep_angle.sin();

    let slowdown = if weight_rep > 0.7 {
        (1.0 - weight_rep * 0.4).max(0.5)
    } else if weight_rep > 0.4 {
        (1.0 - weight_rep * 0.3).max(0.7)
    } else {
        (1.0 - weight_rep * 0.2).max(0.85)
    };

    Blend {
        heading: y.atan2(x),
        weight_rep,
        slowdown,
    }
}

/// Stop the robot from turning into an obstacle alongside it.
///
/// Positive heading error turns left. A critical reading on one side clips
/// large turns towards that side to a small allowance; a warning reading
/// halves them.
pub fn guard_lateral_turn(
    heading_error: f32,
    readings: &NormalizedReadings,
    sensors: &SensorConfig,
) -> f32 {
    let left = readings.max_of(&LEFT_SENSORS);
    let right = readings.max_of(&RIGHT_SENSORS);

    if left >= sensors.critical_threshold && heading_error > CRITICAL_TURN_LIMIT {
        heading_error.min(CRITICAL_TURN_ALLOWANCE)
    } else if right >= sensors.critical_threshold && heading_error < -CRITICAL_TURN_LIMIT {
        heading_error.max(-CRITICAL_TURN_ALLOWANCE)
    } else if (left >= sensors.warning_threshold && heading_error > WARNING_TURN_LIMIT)
        || (right >= sensors.warning_threshold && heading_error < -WARNING_TURN_LIMIT)
    {
        heading_error * 0.5
    } else {
        heading_error
    }
}

/// Keep-moving factor on linear speed from heading error.
///
/// Far from the goal the robot keeps more speed while turning.
pub fn heading_speed_factor(heading_error: f32, distance: f32) -> f32 {
    let floor = if distance > 50.0 {
        0.6
    } else if distance > 20.0 {
        0.4
    } else {
        0.2
    };
    heading_error.cos().max(floor)
}

/// Speed factor from the tightest side clearance, if any side sensor detects.
pub fn lateral_clearance_factor(min_clearance: Option<f32>) -> f32 {
    match min_clearance {
        Some(c) if c < 5.0 => 0.4,
        Some(c) if c < 10.0 => 0.65,
        Some(c) if c < 15.0 => 0.8,
        _ => 1.0,
    }
}

/// Wheel speed command (cm/s).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WheelCommand {
    pub left: f32,
    pub right: f32,
}

impl WheelCommand {
    pub const STOP: WheelCommand = WheelCommand {
        left: 0.0,
        right: 0.0,
    };

    pub fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Same magnitude of motion on both wheels, no turning.
    pub fn straight(speed: f32) -> Self {
        Self::new(speed, speed)
    }

    pub fn is_stopped(&self) -> bool {
        self.left == 0.0 && self.right == 0.0
    }
}

/// Projected command with the body rates that produced it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    pub wheels: WheelCommand,
    pub linear: f32,
    pub angular: f32,
}

/// Turns (v, ω) into wheel speeds under the arc constraint.
#[derive(Clone, Debug)]
pub struct KinematicProjector {
    half_track: f32,
    max_angular: f32,
    max_wheel: f32,
    arrival_tolerance: f32,
}

impl KinematicProjector {
    pub fn new(config: &NavConfig) -> Self {
        Self {
            half_track: config.robot.half_track(),
            max_angular: config.robot.max_angular_rate(),
            max_wheel: config.robot.max_wheel_speed,
            arrival_tolerance: config.control.arrival_tolerance,
        }
    }

    /// Project body rates onto the wheels.
    ///
    /// While travelling, ω is limited so the slower wheel keeps a minimum
    /// forward speed. Beyond twice the arrival tolerance the wheels never take
    /// opposite signs, so there is no spinning in place. Both wheels saturate
    /// at the hardware limit.
    pub fn project(&self, linear: f32, angular: f32, distance: f32) -> Projection {
        let half = self.half_track;
        let mut omega = angular.clamp(-self.max_angular, self.max_angular);

        if distance > self.arrival_tolerance && linear > 0.0 {
            let min_wheel = if distance > 30.0 {
                4.0
            } else if distance > 10.0 {
                2.0
            } else {
                0.0
            };
            let arc_limit = ((linear - min_wheel) / half).max(0.0);
            if omega.abs() > arc_limit {
                omega = arc_limit.copysign(omega);
            }
        }

        let travelling = distance > self.arrival_tolerance * 2.0;
        if travelling && linear <= 0.0 {
            omega = 0.0;
        }

        let mut left = linear - half * omega;
        let mut right = linear + half * omega;

        if travelling && linear > 0.0 && (left < 0.0 || right < 0.0) {
            let limit = linear / half;
            if omega.abs() > limit {
                omega = (limit * 0.95).copysign(omega);
            }
            left = linear - half * omega;
            right = linear + half * omega;
        }

        Projection {
            wheels: WheelCommand::new(
                left.clamp(-self.max_wheel, self.max_wheel),
                right.clamp(-self.max_wheel, self.max_wheel),
            ),
            linear,
            angular: omega,
        }
    }
}
