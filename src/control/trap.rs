//! Local-minimum ("trap") detection and escape gains.
//!
//! When obstacles surround the robot and no navigable gap exists,
//! attraction and repulsion tend to cancel. The escape profile weakens the
//! pull towards the goal, strengthens the push away from obstacles, sharpens
//! turning, and enforces a forward speed floor so the robot keeps moving.
//! It applies for exactly as long as the condition holds.

use crate::config::TrapConfig;
use crate::perception::NormalizedReadings;

/// Controller gains for one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gains {
    pub k_attractive: f32,
    pub k_repulsive: f32,
    pub k_angular: f32,
}

/// Which gain set is active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GainProfile {
    #[default]
    Nominal,
    Trapped,
}

/// Outcome of the trap check for one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrapStatus {
    pub profile: GainProfile,
    /// Sensors above the trap threshold (0 when a navigable gap exists)
    pub sensor_count: usize,
}

impl TrapStatus {
    #[inline]
    pub fn is_trapped(&self) -> bool {
        self.profile == GainProfile::Trapped
    }
}

#[derive(Clone, Debug)]
pub struct TrapDetector {
    config: TrapConfig,
}

impl TrapDetector {
    pub fn new(config: &TrapConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Minimum forward speed while trapped (cm/s).
    #[inline]
    pub fn min_forward_speed(&self) -> f32 {
        self.config.min_forward_speed
    }

    pub fn evaluate(&self, readings: &NormalizedReadings, navigable_gap: bool) -> TrapStatus {
        if !self.config.enabled || navigable_gap {
            return TrapStatus::default();
        }
        let sensor_count = readings.count_at_least(self.config.intensity_threshold);
        let profile = if sensor_count >= self.config.sensor_count {
            GainProfile::Trapped
        } else {
            GainProfile::Nominal
        };
        TrapStatus {
            profile,
            sensor_count,
        }
    }

    /// Apply the active profile to the nominal gains.
    pub fn apply(&self, profile: GainProfile, gains: Gains) -> Gains {
        match profile {
            GainProfile::Nominal => gains,
            GainProfile::Trapped => Gains {
                k_attractive: gains.k_attractive * self.config.attractive_factor,
                k_repulsive: gains.k_repulsive * self.config.repulsive_factor,
                k_angular: gains.k_angular * self.config.angular_factor,
            },
        }
    }
}
