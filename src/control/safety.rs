//! Dynamic safety velocity governor.
//!
//! Looks at the three forward sensors, subtracts the distance needed to
//! brake from the current speed, and picks a speed ceiling from a
//! five-step ladder. The unbraked clearance (or raw distance) is checked
//! alongside so a slow robot still respects close obstacles.

use std::fmt;

use crate::config::{NavConfig, SafetyConfig};
use crate::perception::{FRONT_SENSORS, NormalizedReadings, SensorCalibration};

/// Discrete safety ladder, least to most restrictive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SafetyLevel {
    #[default]
    Clear,
    Caution,
    Warning,
    Critical,
    Emergency,
    /// Local minimum; the speed ceiling is whatever the front ladder gave
    Trapped,
}

impl SafetyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyLevel::Clear => "CLEAR",
            SafetyLevel::Caution => "CAUTION",
            SafetyLevel::Warning => "WARNING",
            SafetyLevel::Critical => "CRITICAL",
            SafetyLevel::Emergency => "EMERGENCY",
            SafetyLevel::Trapped => "TRAPPED",
        }
    }
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one governor evaluation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SafetyAssessment {
    pub level: SafetyLevel,
    /// Linear speed ceiling (cm/s)
    pub v_max_allowed: f32,
    /// Smallest forward clearance, if any forward sensor detects
    pub front_clearance: Option<f32>,
    /// Smallest forward distance from the sensor window
    pub front_distance: Option<f32>,
    pub brake_distance: f32,
}

#[derive(Clone, Debug)]
pub struct SafetyGovernor {
    config: SafetyConfig,
    robot_radius: f32,
    max_speed: f32,
}

impl SafetyGovernor {
    pub fn new(config: &NavConfig) -> Self {
        Self {
            config: config.safety.clone(),
            robot_radius: config.robot.radius,
            max_speed: config.robot.max_wheel_speed,
        }
    }

    /// Distance needed to stop from `speed` at the configured deceleration.
    pub fn brake_distance(&self, speed: f32) -> f32 {
        let v = if speed > 0.0 {
            speed
        } else {
            self.config.standstill_brake_speed
        };
        v * v / (2.0 * self.config.brake_decel)
    }

    /// Evaluate the ladder for the current readings.
    ///
    /// `gap_boost` relaxes the ceiling when a wide navigable gap is in view;
    /// it never lifts the ceiling above the hardware limit. `trapped`
    /// relabels the level without changing the ceiling.
    pub fn assess(
        &self,
        calibration: &SensorCalibration,
        readings: &NormalizedReadings,
        commanded_speed: f32,
        gap_boost: f32,
        trapped: bool,
    ) -> SafetyAssessment {
        let mut front_clearance: Option<f32> = None;
        let mut front_distance: Option<f32> = None;
        for &i in &FRONT_SENSORS {
            let intensity = readings.get(i);
            if intensity < calibration.detect_threshold() {
                continue;
            }
            let distance = calibration.estimate_distance(i, intensity);
            let clearance = distance - self.robot_radius;
            front_clearance = Some(front_clearance.map_or(clearance, |c| c.min(clearance)));
            front_distance = Some(front_distance.map_or(distance, |d| d.min(distance)));
        }

        let brake_distance = self.brake_distance(commanded_speed);
        let clearance = front_clearance.unwrap_or(f32::INFINITY);
        let distance = front_distance.unwrap_or(f32::INFINITY);
        let effective = clearance - brake_distance;

        // Outer rungs also trip on the raw forward distance
        let c = &self.config;
        let (mut level, ceiling) =
            if effective < c.emergency_effective || clearance < c.emergency_clearance {
                (SafetyLevel::Emergency, c.emergency_speed)
            } else if effective < c.critical_effective || clearance < c.critical_clearance {
                (SafetyLevel::Critical, c.critical_speed)
            } else if effective < c.warning_effective || distance < c.warning_distance {
                (SafetyLevel::Warning, c.warning_speed)
            } else if effective < c.caution_effective || distance < c.caution_distance {
                (SafetyLevel::Caution, c.caution_speed)
            } else {
                (SafetyLevel::Clear, self.max_speed)
            };

        let v_max_allowed = (ceiling * gap_boost).min(self.max_speed);
        if trapped {
            level = SafetyLevel::Trapped;
        }

        SafetyAssessment {
            level,
            v_max_allowed,
            front_clearance,
            front_distance,
            brake_distance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IR_SENSOR_COUNT;
    use crate::perception::IrFrame;
    use approx::assert_relative_eq;

    fn setup() -> (NavConfig, SensorCalibration, SafetyGovernor) {
        let config = NavConfig::default();
        let calibration = SensorCalibration::new(&config.sensors);
        let governor = SafetyGovernor::new(&config);
        (config, calibration, governor)
    }

    fn front_reading(cal: &SensorCalibration, distance: f32) -> NormalizedReadings {
        let mut raw = [0u16; IR_SENSOR_COUNT];
        raw[3] = cal.raw_for_distance(3, distance);
        cal.normalize(&IrFrame::new(raw))
    }

    #[test]
    fn test_open_space_is_clear() {
        let (config, cal, governor) = setup();
        let readings = NormalizedReadings([0.0; IR_SENSOR_COUNT]);
        let assessment = governor.assess(&cal, &readings, 20.0, 1.0, false);
        assert_eq!(assessment.level, SafetyLevel::Clear);
        assert_relative_eq!(assessment.v_max_allowed, config.robot.max_wheel_speed);
        assert!(assessment.front_clearance.is_none());
    }

    #[test]
    fn test_contact_range_is_emergency() {
        let (config, cal, governor) = setup();
        let readings = front_reading(&cal, config.robot.radius + 2.0);
        let assessment = governor.assess(&cal, &readings, 0.0, 1.0, false);
        assert_eq!(assessment.level, SafetyLevel::Emergency);
        assert_relative_eq!(assessment.v_max_allowed, config.safety.emergency_speed);
    }

    #[test]
    fn test_braking_distance_tightens_ladder() {
        let (_, cal, governor) = setup();
        // Clearance of ~13 cm: warning when creeping, emergency at speed
        let readings = front_reading(&cal, 30.0);
        let slow = governor.assess(&cal, &readings, 4.0, 1.0, false);
        let fast = governor.assess(&cal, &readings, 30.0, 1.0, false);
        assert_eq!(slow.level, SafetyLevel::Warning);
        assert_eq!(fast.level, SafetyLevel::Emergency);
        assert!(fast.level > slow.level, "{} should exceed {}", fast.level, slow.level);
        assert!(fast.v_max_allowed < slow.v_max_allowed);
    }

    #[test]
    fn test_standstill_uses_assumed_speed() {
        let (_, _, governor) = setup();
        assert_relative_eq!(governor.brake_distance(0.0), 64.0 / 40.0);
        assert_relative_eq!(governor.brake_distance(20.0), 10.0);
    }

    #[test]
    fn test_gap_boost_capped_at_hardware_limit() {
        let (config, cal, governor) = setup();
        let readings = front_reading(&cal, 30.0);
        let plain = governor.assess(&cal, &readings, 4.0, 1.0, false);
        let boosted = governor.assess(&cal, &readings, 4.0, 1.3, false);
        assert_relative_eq!(boosted.v_max_allowed, plain.v_max_allowed * 1.3);

        let open = NormalizedReadings([0.0; IR_SENSOR_COUNT]);
        let clear = governor.assess(&cal, &open, 4.0, 1.3, false);
        assert_relative_eq!(clear.v_max_allowed, config.robot.max_wheel_speed);
    }

    #[test]
    fn test_raw_distance_raises_outer_rungs() {
        let mut config = NavConfig::default();
        // Clearance rungs out of play so only the raw distance decides
        let s = &mut config.safety;
        s.emergency_effective = 1.0;
        s.emergency_clearance = 0.5;
        s.critical_effective = 2.0;
        s.critical_clearance = 1.0;
        s.warning_effective = 3.0;
        s.caution_effective = 4.0;
        s.warning_distance = 15.0;
        s.caution_distance = 35.0;
        let cal = SensorCalibration::new(&config.sensors);
        let readings = front_reading(&cal, 30.0);

        let near = SafetyGovernor::new(&config).assess(&cal, &readings, 4.0, 1.0, false);
        assert_eq!(near.level, SafetyLevel::Caution);
        assert!(near.front_clearance.is_some_and(|c| c - near.brake_distance > 4.0));

        config.safety.warning_distance = 35.0;
        let nearer = SafetyGovernor::new(&config).assess(&cal, &readings, 4.0, 1.0, false);
        assert_eq!(nearer.level, SafetyLevel::Warning);

        config.safety.warning_distance = 15.0;
        config.safety.caution_distance = 25.0;
        let far = SafetyGovernor::new(&config).assess(&cal, &readings, 4.0, 1.0, false);
        assert_eq!(far.level, SafetyLevel::Clear);
    }

    #[test]
    fn test_trapped_relabels_level() {
        let (_, cal, governor) = setup();
        let readings = NormalizedReadings([0.0; IR_SENSOR_COUNT]);
        let assessment = governor.assess(&cal, &readings, 10.0, 1.0, true);
        assert_eq!(assessment.level, SafetyLevel::Trapped);
    }
}
