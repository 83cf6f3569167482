//! Configuration loading for MargaNav
//!
//! Every section has working defaults for the reference platform (a
//! 23.5 cm wheel-base differential drive with seven front-facing IR
//! proximity sensors), so an empty TOML file is a valid configuration.

use crate::control::PotentialLaw;
use crate::error::{NavError, Result};
use serde::Deserialize;
use std::path::Path;

/// Number of IR proximity sensors on the bumper arc, ordered left to right.
pub const IR_SENSOR_COUNT: usize = 7;

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NavConfig {
    #[serde(default)]
    pub robot: RobotConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub attractive: AttractiveConfig,
    #[serde(default)]
    pub repulsive: RepulsiveConfig,
    #[serde(default)]
    pub sensors: SensorConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub trap: TrapConfig,
    #[serde(default)]
    pub gap: GapConfig,
    #[serde(default)]
    pub mission: MissionConfig,
    #[serde(default)]
    pub goal_priority: GoalPriorityConfig,
}

/// Robot physical parameters
#[derive(Clone, Debug, Deserialize)]
pub struct RobotConfig {
    /// Distance between wheels in cm (default: 23.5)
    #[serde(default = "default_wheel_base")]
    pub wheel_base: f32,

    /// Body radius in cm (default: 17.095)
    #[serde(default = "default_robot_radius")]
    pub radius: f32,

    /// Body diameter in cm (default: 34.19)
    #[serde(default = "default_robot_diameter")]
    pub diameter: f32,

    /// Hardware wheel speed limit in cm/s (default: 38)
    #[serde(default = "default_max_wheel_speed")]
    pub max_wheel_speed: f32,

    /// Largest wheel speed differential used for turning, cm/s (default: 10)
    #[serde(default = "default_max_turn_differential")]
    pub max_turn_differential: f32,
}

impl RobotConfig {
    /// Half the wheel base, the lever arm between body rate and wheel speed.
    #[inline]
    pub fn half_track(&self) -> f32 {
        self.wheel_base / 2.0
    }

    /// Body rotation limit in rad/s implied by the turn differential.
    #[inline]
    pub fn max_angular_rate(&self) -> f32 {
        self.max_turn_differential / self.half_track()
    }
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            wheel_base: default_wheel_base(),
            radius: default_robot_radius(),
            diameter: default_robot_diameter(),
            max_wheel_speed: default_max_wheel_speed(),
            max_turn_differential: default_max_turn_differential(),
        }
    }
}

fn default_wheel_base() -> f32 {
    23.5
}
fn default_robot_radius() -> f32 {
    17.095
}
fn default_robot_diameter() -> f32 {
    34.19
}
fn default_max_wheel_speed() -> f32 {
    38.0
}
fn default_max_turn_differential() -> f32 {
    10.0
}

/// Control loop and velocity shaping
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Control period in seconds
    pub dt_secs: f32,
    /// Distance below which the attractive speed is zero (cm)
    pub arrival_tolerance: f32,
    /// Acceleration limit for the velocity ramp (cm/s²)
    pub acceleration: f32,
    /// Speed the ramp starts from once the robot moves (cm/s)
    pub start_min_speed: f32,
    /// Radius around the goal in which speed scales down (cm)
    pub decel_zone: f32,
    /// Floor on the decelerated approach speed (cm/s)
    pub approach_min_speed: f32,
    /// Proportional gain from heading error to body rate
    pub angular_gain: f32,
    /// Repulsive magnitude below which the heading is purely attractive
    pub blend_threshold: f32,
    /// Repulsive magnitude that maps to full blend weight
    pub blend_scale: f32,
    /// Upper bound on the repulsive blend weight
    pub blend_cap: f32,
    /// Strongest normalized reading still treated as open floor
    pub free_space_intensity: f32,
    /// Beyond this distance a clear path never drops below `start_min_speed` (cm)
    pub cruise_floor_distance: f32,
}

impl ControlConfig {
    /// Largest speed increase allowed in one control tick.
    #[inline]
    pub fn ramp_step(&self) -> f32 {
        self.acceleration * self.dt_secs
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            dt_secs: 0.05,
            arrival_tolerance: 3.0,
            acceleration: 10.0,
            start_min_speed: 8.0,
            decel_zone: 50.0,
            approach_min_speed: 6.0,
            angular_gain: 3.0,
            blend_threshold: 0.5,
            blend_scale: 3.5,
            blend_cap: 0.85,
            free_space_intensity: 50.0,
            cruise_floor_distance: 30.0,
        }
    }
}

/// Default attractive gain for each potential law
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AttractiveConfig {
    pub linear: f32,
    pub quadratic: f32,
    pub conic: f32,
    pub exponential: f32,
}

impl AttractiveConfig {
    pub fn gain(&self, law: PotentialLaw) -> f32 {
        match law {
            PotentialLaw::Linear => self.linear,
            PotentialLaw::Quadratic => self.quadratic,
            PotentialLaw::Conic => self.conic,
            PotentialLaw::Exponential => self.exponential,
        }
    }
}

impl Default for AttractiveConfig {
    fn default() -> Self {
        Self {
            linear: 0.25,
            quadratic: 0.05,
            conic: 0.15,
            exponential: 2.5,
        }
    }
}

/// Obstacle repulsion
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RepulsiveConfig {
    /// Repulsive gain
    pub k_repulsive: f32,
    /// Obstacles at or beyond this distance contribute nothing (cm)
    pub influence_radius: f32,
    /// Clearance at which the inverse-square regime begins (cm)
    pub safe_distance: f32,
    /// Gain multiplier when a forward sensor reads critical
    pub frontal_critical_boost: f32,
    /// Gain multiplier when a forward sensor reads warning
    pub frontal_warning_boost: f32,
}

impl Default for RepulsiveConfig {
    fn default() -> Self {
        Self {
            k_repulsive: 300.0,
            influence_radius: 100.0,
            safe_distance: 20.0,
            frontal_critical_boost: 2.0,
            frontal_warning_boost: 1.5,
        }
    }
}

/// IR sensor calibration and intensity thresholds
///
/// Thresholds apply to normalized intensities (raw reading divided by the
/// sensor's sensitivity factor).
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Per-sensor sensitivity factor, left to right
    pub sensitivity: [f32; IR_SENSOR_COUNT],
    /// Mounting angle relative to forward, degrees, positive = left
    pub angles_deg: [f32; IR_SENSOR_COUNT],
    /// Distance from robot centre to the sensor window (cm)
    pub mounting_radius: f32,
    pub detect_threshold: f32,
    pub caution_threshold: f32,
    pub warning_threshold: f32,
    pub critical_threshold: f32,
    pub emergency_threshold: f32,
    /// Closest distance the model reports (cm)
    pub min_distance: f32,
    /// Distance reported for readings too weak to range (cm)
    pub max_distance: f32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            sensitivity: [1.382, 1.121, 0.270, 1.045, 0.896, 0.672, 0.901],
            angles_deg: [65.3, 38.0, 20.0, -3.0, -14.25, -34.0, -65.3],
            mounting_radius: default_robot_radius(),
            detect_threshold: 30.0,
            caution_threshold: 90.0,
            warning_threshold: 180.0,
            critical_threshold: 350.0,
            emergency_threshold: 700.0,
            min_distance: 4.0,
            max_distance: 60.0,
        }
    }
}

/// Safety velocity governor ladder
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Assumed braking deceleration (cm/s²)
    pub brake_decel: f32,
    /// Speed assumed for braking when the robot is stationary (cm/s)
    pub standstill_brake_speed: f32,
    pub emergency_effective: f32,
    pub emergency_clearance: f32,
    pub critical_effective: f32,
    pub critical_clearance: f32,
    pub warning_effective: f32,
    /// Raw forward distance (cm, sensor to obstacle, braking ignored) that
    /// forces at least Warning. Checked next to `warning_effective`; the
    /// stricter of the two wins.
    pub warning_distance: f32,
    pub caution_effective: f32,
    /// Raw forward distance (cm) that forces at least Caution, alongside
    /// `caution_effective`.
    pub caution_distance: f32,
    pub emergency_speed: f32,
    pub critical_speed: f32,
    pub warning_speed: f32,
    pub caution_speed: f32,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            brake_decel: 20.0,
            standstill_brake_speed: 8.0,
            emergency_effective: 5.0,
            emergency_clearance: 3.0,
            critical_effective: 12.0,
            critical_clearance: 8.0,
            warning_effective: 20.0,
            warning_distance: 15.0,
            caution_effective: 30.0,
            caution_distance: 25.0,
            emergency_speed: 8.0,
            critical_speed: 15.0,
            warning_speed: 25.0,
            caution_speed: 35.0,
        }
    }
}

/// Local-minimum escape
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TrapConfig {
    pub enabled: bool,
    /// Sensors that must read above `intensity_threshold`
    pub sensor_count: usize,
    pub intensity_threshold: f32,
    pub attractive_factor: f32,
    pub repulsive_factor: f32,
    pub angular_factor: f32,
    /// Forward speed floor while trapped (cm/s)
    pub min_forward_speed: f32,
}

impl Default for TrapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sensor_count: 5,
            intensity_threshold: 100.0,
            attractive_factor: 0.3,
            repulsive_factor: 1.5,
            angular_factor: 1.5,
            min_forward_speed: 4.0,
        }
    }
}

/// Navigable gap detection
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GapConfig {
    /// Normalized intensity marking a gap edge
    pub blocked_threshold: f32,
    /// Sensors between the edges must read below this
    pub clear_threshold: f32,
    /// Furthest sensor index offset searched for a partner edge
    pub max_span: usize,
    /// Width beyond the robot diameter required to pass (cm)
    pub maneuver_margin: f32,
    /// Repulsion multiplier for sensors on a navigable gap edge
    pub repulsion_factor: f32,
    pub wide_margin: f32,
    pub wide_boost: f32,
    pub moderate_margin: f32,
    pub moderate_boost: f32,
}

impl Default for GapConfig {
    fn default() -> Self {
        Self {
            blocked_threshold: 100.0,
            clear_threshold: 60.0,
            max_span: 3,
            maneuver_margin: 8.0,
            repulsion_factor: 0.3,
            wide_margin: 14.0,
            wide_boost: 1.3,
            moderate_margin: 10.0,
            moderate_boost: 1.15,
        }
    }
}

/// Waypoint sequencing and collision recovery
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    /// Arrival tolerance at the start of a mission (cm)
    pub tolerance_base: f32,
    /// Tolerance growth per metre from the start (cm)
    pub tolerance_growth_per_meter: f32,
    /// Tolerance ceiling (cm)
    pub tolerance_cap: f32,
    /// Bumper trips allowed before the mission fails
    pub max_collisions: u32,
    /// Reverse speed used to back off a bumper contact (cm/s)
    pub reverse_speed: f32,
    pub reverse_secs: f32,
    pub recovery_pause_secs: f32,
    pub waypoint_pause_secs: f32,
    pub start_delay_secs: f32,
    /// Final-goal correction is skipped when already this close (cm)
    pub nudge_min_distance: f32,
    pub nudge_speed_gain: f32,
    pub nudge_min_speed: f32,
    pub nudge_angular_gain: f32,
    pub nudge_secs: f32,
    pub settle_secs: f32,
    /// Attempts to read a pose right after odometry reset
    pub pose_acquire_attempts: u32,
    /// Optional budget for the whole mission, summed over robot waits (s)
    pub max_duration_secs: Option<f32>,
    /// Ticks between progress log lines
    pub log_interval_ticks: u64,
}

impl MissionConfig {
    /// Arrival tolerance after travelling `distance_from_start` cm.
    pub fn adaptive_tolerance(&self, distance_from_start: f32) -> f32 {
        let grown =
            self.tolerance_base + distance_from_start / 100.0 * self.tolerance_growth_per_meter;
        grown.min(self.tolerance_cap)
    }
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            tolerance_base: 5.0,
            tolerance_growth_per_meter: 0.2,
            tolerance_cap: 8.0,
            max_collisions: 5,
            reverse_speed: 10.0,
            reverse_secs: 1.0,
            recovery_pause_secs: 0.5,
            waypoint_pause_secs: 0.5,
            start_delay_secs: 1.0,
            nudge_min_distance: 2.0,
            nudge_speed_gain: 0.6,
            nudge_min_speed: 2.0,
            nudge_angular_gain: 0.8,
            nudge_secs: 0.5,
            settle_secs: 0.2,
            pose_acquire_attempts: 20,
            max_duration_secs: None,
            log_interval_ticks: 20,
        }
    }
}

/// Waypoints close to walls: damp repulsion from obstacles behind the goal
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GoalPriorityConfig {
    pub enabled: bool,
    /// Goal counts as "in front of" an obstacle within this margin (cm)
    pub margin: f32,
    pub repulsion_factor: f32,
}

impl Default for GoalPriorityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            margin: 5.0,
            repulsion_factor: 0.05,
        }
    }
}

impl NavConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NavError::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: NavConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the controller cannot work with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(NavError::Config(msg.to_string()));

        if !(self.control.dt_secs.is_finite() && self.control.dt_secs > 0.0) {
            return invalid("control.dt_secs must be positive and finite");
        }
        if self.robot.wheel_base <= 0.0 || self.robot.radius <= 0.0 {
            return invalid("robot dimensions must be positive");
        }
        if self.robot.max_wheel_speed <= 0.0 || self.robot.max_turn_differential <= 0.0 {
            return invalid("robot speed limits must be positive");
        }
        if self.sensors.sensitivity.iter().any(|&f| f <= 0.0) {
            return invalid("sensors.sensitivity factors must be positive");
        }

        let s = &self.sensors;
        let ladder = [
            s.detect_threshold,
            s.caution_threshold,
            s.warning_threshold,
            s.critical_threshold,
            s.emergency_threshold,
        ];
        if ladder.windows(2).any(|w| w[0] >= w[1]) {
            return invalid("sensor thresholds must increase detect < caution < warning < critical < emergency");
        }
        if s.min_distance <= 0.0 || s.min_distance >= s.max_distance {
            return invalid("sensors.min_distance must be positive and below max_distance");
        }

        if self.repulsive.influence_radius <= 0.0 || self.repulsive.safe_distance <= 0.0 {
            return invalid("repulsive distances must be positive");
        }
        if self.gap.clear_threshold >= self.gap.blocked_threshold {
            return invalid("gap.clear_threshold must be below gap.blocked_threshold");
        }
        if self.gap.max_span == 0 {
            return invalid("gap.max_span must be at least 1");
        }
        if self.mission.max_collisions == 0 {
            return invalid("mission.max_collisions must be at least 1");
        }
        if self.mission.tolerance_base > self.mission.tolerance_cap {
            return invalid("mission.tolerance_base must not exceed tolerance_cap");
        }

        let m = &self.mission;
        let durations = [
            ("reverse_secs", m.reverse_secs),
            ("recovery_pause_secs", m.recovery_pause_secs),
            ("waypoint_pause_secs", m.waypoint_pause_secs),
            ("start_delay_secs", m.start_delay_secs),
            ("nudge_secs", m.nudge_secs),
            ("settle_secs", m.settle_secs),
        ];
        if let Some((name, secs)) = durations
            .iter()
            .find(|(_, secs)| !(secs.is_finite() && *secs >= 0.0))
        {
            return Err(NavError::Config(format!(
                "mission.{} must be finite and not negative, got {}",
                name, secs
            )));
        }
        if let Some(budget) = m.max_duration_secs
            && !(budget.is_finite() && budget > 0.0)
        {
            return invalid("mission.max_duration_secs must be positive and finite");
        }
        Ok(())
    }
}
