//! Goal attraction and linear-speed shaping.

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::config::ControlConfig;
use crate::error::NavError;
use crate::geometry::{Vector2, WorldPoint};

/// Saturation distance for the conic law (cm).
const CONIC_SATURATION: f32 = 100.0;
/// Length scale of the exponential law (cm).
const EXPONENTIAL_SCALE: f32 = 50.0;

/// Mapping from distance-to-goal to attractive force magnitude.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PotentialLaw {
    /// `k·d`
    #[default]
    Linear,
    /// `k·d²/10`
    Quadratic,
    /// `k·min(d, 100)·2`
    Conic,
    /// `k·(1 − e^(−d/50))·20`
    Exponential,
}

impl PotentialLaw {
    pub const ALL: [PotentialLaw; 4] = [
        PotentialLaw::Linear,
        PotentialLaw::Quadratic,
        PotentialLaw::Conic,
        PotentialLaw::Exponential,
    ];

    /// Attractive magnitude at `distance` cm for gain `gain`.
    pub fn magnitude(self, gain: f32, distance: f32) -> f32 {
        match self {
            PotentialLaw::Linear => gain * distance,
            PotentialLaw::Quadratic => gain * distance * distance / 10.0,
            PotentialLaw::Conic => gain * distance.min(CONIC_SATURATION) * 2.0,
            PotentialLaw::Exponential => {
                gain * (1.0 - (-distance / EXPONENTIAL_SCALE).exp()) * 20.0
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PotentialLaw::Linear => "linear",
            PotentialLaw::Quadratic => "quadratic",
            PotentialLaw::Conic => "conic",
            PotentialLaw::Exponential => "exponential",
        }
    }
}

impl fmt::Display for PotentialLaw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PotentialLaw {
    type Err = NavError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PotentialLaw::ALL
            .into_iter()
            .find(|law| law.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| NavError::InvalidMission(format!("unknown potential law '{}'", s)))
    }
}

/// Attraction towards the active goal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AttractiveField {
    pub force: Vector2,
    pub distance: f32,
    /// Bearing from the robot to the goal, radians
    pub bearing: f32,
}

/// Attractive force at `position`; zero inside the arrival tolerance.
pub fn attractive_force(
    law: PotentialLaw,
    gain: f32,
    position: WorldPoint,
    goal: WorldPoint,
    tolerance: f32,
) -> AttractiveField {
    let distance = position.distance(&goal);
    let bearing = position.bearing_to(&goal);
    let force = if distance < tolerance {
        Vector2::ZERO
    } else {
        Vector2::from_polar(law.magnitude(gain, distance), bearing)
    };
    AttractiveField {
        force,
        distance,
        bearing,
    }
}

/// Desired linear speed before ramping.
///
/// Zero inside the arrival tolerance. Otherwise the law's magnitude capped
/// by `ceiling`, scaled down inside the deceleration zone but never below
/// the approach minimum.
pub fn shape_speed(raw: f32, distance: f32, ceiling: f32, control: &ControlConfig) -> f32 {
    if distance < control.arrival_tolerance {
        return 0.0;
    }
    let mut v = raw.min(ceiling);
    if distance < control.decel_zone {
        v = (v * distance / control.decel_zone).max(control.approach_min_speed);
    }
    v.min(ceiling)
}

/// Per-mission acceleration limiter on linear speed.
///
/// Increases are bounded per tick; decreases take effect immediately.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VelocityRamp {
    last: f32,
}

impl VelocityRamp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last linear speed handed out (cm/s).
    #[inline]
    pub fn last(&self) -> f32 {
        self.last
    }

    pub fn reset(&mut self) {
        self.last = 0.0;
    }

    /// Limit `target` to one step above the previous speed.
    ///
    /// Below `start_min` the ramp jumps straight to `start_min`, so a robot
    /// at rest starts moving at a speed that overcomes wheel friction.
    pub fn advance(&mut self, target: f32, step: f32, start_min: f32) -> f32 {
        let ceiling = if self.last < start_min {
            start_min
        } else {
            self.last + step
        };
        let v = target.min(ceiling).max(0.0);
        self.last = v;
        v
    }
}
