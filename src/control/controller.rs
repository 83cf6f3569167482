//! One control tick: pose, goal, and IR frame in, wheel command out.
//!
//! The pipeline runs bottom-up:
//!
//! 1. normalize IR readings, detect gaps, check for a trap
//! 2. evaluate the safety governor for a speed ceiling
//! 3. pick gains (frontal boost, trap profile) and compute both forces
//! 4. shape and ramp the linear speed
//! 5. blend headings, guard lateral turns, apply speed factors
//! 6. adapt the angular gain and project onto the wheels
//!
//! Apart from the velocity ramp passed in by the caller, a step has no
//! side effects.

use crate::config::NavConfig;
use crate::geometry::{Pose, Vector2, WorldPoint};
use crate::perception::{
    FRONT_SENSORS, Gap, GapDetector, IrFrame, LEFT_SENSORS, NormalizedReadings, OUTER_SENSORS,
    Obstacle, RIGHT_SENSORS, SensorCalibration,
};
use crate::utils::wrap_pi;

use super::attractive::{PotentialLaw, VelocityRamp, attractive_force, shape_speed};
use super::combiner::{
    KinematicProjector, WheelCommand, blend_heading, guard_lateral_turn, heading_speed_factor,
    lateral_clearance_factor,
};
use super::repulsive::{RepulsiveGains, RepulsiveModel};
use super::safety::{SafetyAssessment, SafetyGovernor, SafetyLevel};
use super::trap::{Gains, TrapDetector, TrapStatus};

/// Within this distance of the goal the angular gain tapers off (cm).
const GOAL_TAPER_DISTANCE: f32 = 15.0;

/// Diagnostics for one control tick.
#[derive(Clone, Debug)]
pub struct ControlStep {
    pub wheels: WheelCommand,
    /// Linear speed after all shaping (cm/s)
    pub v_linear: f32,
    /// Body rate after projection (rad/s)
    pub omega: f32,
    /// Heading error after the lateral guard (rad)
    pub heading_error: f32,
    pub distance_to_goal: f32,
    pub attractive: Vector2,
    pub repulsive: Vector2,
    pub weight_rep: f32,
    pub obstacles: Vec<Obstacle>,
    pub gaps: Vec<Gap>,
    pub safety: SafetyAssessment,
    pub trap: TrapStatus,
    pub gains: Gains,
}

impl ControlStep {
    #[inline]
    pub fn safety_level(&self) -> SafetyLevel {
        self.safety.level
    }

    #[inline]
    pub fn is_trapped(&self) -> bool {
        self.trap.is_trapped()
    }

    #[inline]
    pub fn num_obstacles(&self) -> usize {
        self.obstacles.len()
    }

    pub fn navigable_gap(&self) -> bool {
        self.gaps.iter().any(|g| g.is_navigable)
    }
}

/// Potential-field controller for one potential law and gain set.
#[derive(Clone, Debug)]
pub struct PotentialFieldController {
    config: NavConfig,
    law: PotentialLaw,
    k_attractive: f32,
    repulsive_gains: RepulsiveGains,
    calibration: SensorCalibration,
    gap_detector: GapDetector,
    repulsive: RepulsiveModel,
    governor: SafetyGovernor,
    trap: TrapDetector,
    projector: KinematicProjector,
}

impl PotentialFieldController {
    pub fn new(config: &NavConfig, law: PotentialLaw) -> Self {
        Self {
            config: config.clone(),
            law,
            k_attractive: config.attractive.gain(law),
            repulsive_gains: RepulsiveGains {
                k_repulsive: config.repulsive.k_repulsive,
                influence_radius: config.repulsive.influence_radius,
            },
            calibration: SensorCalibration::new(&config.sensors),
            gap_detector: GapDetector::new(&config.gap, &config.robot),
            repulsive: RepulsiveModel::new(config),
            governor: SafetyGovernor::new(config),
            trap: TrapDetector::new(&config.trap),
            projector: KinematicProjector::new(config),
        }
    }

    /// Override the configured repulsive gain.
    pub fn with_repulsive_gain(mut self, k_repulsive: Option<f32>) -> Self {
        if let Some(k) = k_repulsive {
            self.repulsive_gains.k_repulsive = k;
        }
        self
    }

    /// Override the configured influence radius.
    pub fn with_influence_radius(mut self, influence_radius: Option<f32>) -> Self {
        if let Some(r) = influence_radius {
            self.repulsive_gains.influence_radius = r;
        }
        self
    }

    #[inline]
    pub fn law(&self) -> PotentialLaw {
        self.law
    }

    #[inline]
    pub fn calibration(&self) -> &SensorCalibration {
        &self.calibration
    }

    #[inline]
    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    /// Compute the wheel command for one tick.
    pub fn step(
        &self,
        pose: &Pose,
        goal: &WorldPoint,
        frame: &IrFrame,
        ramp: &mut VelocityRamp,
    ) -> ControlStep {
        let cfg = &self.config;
        let control = &cfg.control;
        let sensors = &cfg.sensors;

        // Perception
        let readings = self.calibration.normalize(frame);
        let obstacles = self.calibration.obstacles(pose, &readings);
        let gaps = self
            .gap_detector
            .detect(&self.calibration, &readings, pose.heading_deg);
        let navigable = gaps.iter().any(|g| g.is_navigable);
        let trap = self.trap.evaluate(&readings, navigable);

        let safety = self.governor.assess(
            &self.calibration,
            &readings,
            ramp.last(),
            self.gap_detector.speed_boost(&gaps),
            trap.is_trapped(),
        );

        // Gains
        let max_frontal = readings.max_of(&FRONT_SENSORS);
        let mut k_repulsive = self.repulsive_gains.k_repulsive;
        if max_frontal >= sensors.critical_threshold {
            k_repulsive *= cfg.repulsive.frontal_critical_boost;
        } else if max_frontal >= sensors.warning_threshold {
            k_repulsive *= cfg.repulsive.frontal_warning_boost;
        }
        let gains = self.trap.apply(
            trap.profile,
            Gains {
                k_attractive: self.k_attractive,
                k_repulsive,
                k_angular: control.angular_gain,
            },
        );

        // Forces
        let position = pose.position();
        let attractive = attractive_force(
            self.law,
            gains.k_attractive,
            position,
            *goal,
            control.arrival_tolerance,
        );
        let distance = attractive.distance;
        let repulsive = self.repulsive.force(
            pose,
            &readings,
            &self.calibration,
            &gaps,
            RepulsiveGains {
                k_repulsive: gains.k_repulsive,
                influence_radius: self.repulsive_gains.influence_radius,
            },
            distance,
        );

        // Linear speed
        let mut v = if distance < control.arrival_tolerance {
            0.0
        } else {
            let ceiling = safety.v_max_allowed.min(cfg.robot.max_wheel_speed);
            let raw = self.law.magnitude(gains.k_attractive, distance);
            let mut target = shape_speed(raw, distance, ceiling, control);
            if trap.is_trapped() {
                target = target.max(self.trap.min_forward_speed());
            }
            ramp.advance(target, control.ramp_step(), control.start_min_speed)
        };

        // Heading
        let blend = blend_heading(attractive.bearing, repulsive, control);
        v *= blend.slowdown;

        let raw_error = wrap_pi(blend.heading - pose.heading_rad());
        let heading_error = guard_lateral_turn(raw_error, &readings, sensors);

        v *= heading_speed_factor(heading_error, distance);
        v *= lateral_clearance_factor(self.lateral_clearance(&readings));
        if distance > control.cruise_floor_distance
            && v < control.start_min_speed
            && safety.level == SafetyLevel::Clear
        {
            v = control.start_min_speed;
        }
        // Trap floor also holds after the slowdowns above
        if trap.is_trapped() && distance >= control.arrival_tolerance {
            v = v.max(self.trap.min_forward_speed());
        }

        // Angular
        let k_angular = self.angular_gain(&readings, gains, control.angular_gain, distance, &trap);
        let omega = k_angular * heading_error;
        let projection = self.projector.project(v, omega, distance);

        tracing::debug!(
            "d={:.1} v={:.1} w={:.2} err={:.1}° level={} rep={:.1} trapped={}",
            distance,
            projection.linear,
            projection.angular,
            heading_error.to_degrees(),
            safety.level,
            repulsive.magnitude(),
            trap.is_trapped()
        );

        ControlStep {
            wheels: projection.wheels,
            v_linear: projection.linear,
            omega: projection.angular,
            heading_error,
            distance_to_goal: distance,
            attractive: attractive.force,
            repulsive,
            weight_rep: blend.weight_rep,
            obstacles,
            gaps,
            safety,
            trap,
            gains,
        }
    }

    /// Smallest clearance reported by the side sensors.
    fn lateral_clearance(&self, readings: &NormalizedReadings) -> Option<f32> {
        LEFT_SENSORS
            .iter()
            .chain(RIGHT_SENSORS.iter())
            .copied()
            .filter(|&i| readings.get(i) >= self.calibration.detect_threshold())
            .map(|i| self.calibration.estimate_distance(i, readings.get(i)) - self.config.robot.radius)
            .reduce(f32::min)
    }

    /// Angular gain adapted to surroundings and goal proximity.
    ///
    /// Open floor halves the base gain. The trap profile's boost overrides
    /// the lateral boosts. Close to the goal with clear sides the gain
    /// tapers to avoid circling the target.
    fn angular_gain(
        &self,
        readings: &NormalizedReadings,
        gains: Gains,
        base: f32,
        distance: f32,
        trap: &TrapStatus,
    ) -> f32 {
        let sensors = &self.config.sensors;
        let outer = readings.max_of(&OUTER_SENSORS);
        let surroundings = if readings.max() >= self.config.control.free_space_intensity {
            1.0
        } else {
            0.5
        };

        let mut k = if trap.is_trapped() {
            gains.k_angular * surroundings
        } else if outer >= sensors.critical_threshold {
            base * surroundings * 1.5
        } else if outer >= sensors.warning_threshold {
            base * surroundings * 1.25
        } else {
            base * surroundings
        };

        if distance < GOAL_TAPER_DISTANCE && outer < sensors.caution_threshold && !trap.is_trapped() {
            let taper = (0.3 + 0.7 * (distance - 5.0) / 10.0).clamp(0.3, 1.0);
            k *= taper;
        }
        k
    }
}
