//! Waypoint sequencer and the fixed-period mission loop.
//!
//! [`Navigator::navigate`] owns one mission from odometry reset to the last
//! wheel command. Per-mission state (velocity ramp, goal index, collision
//! count) lives in a private session that is created on entry and dropped on
//! exit, so a navigator can run any number of missions back to back.
//!
//! Every exit path commands zero wheel speed before returning, including a
//! panic inside the loop, which is re-raised once the wheels are stopped.
//! Interface errors never escape: they end the mission as
//! [`FailureReason::RobotFault`].

use serde::Deserialize;
use std::f32::consts::FRAC_PI_2;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::NavConfig;
use crate::control::{
    ControlStep, PotentialFieldController, PotentialLaw, SafetyLevel, VelocityRamp, WheelCommand,
};
use crate::error::{NavError, Result};
use crate::geometry::{Pose, WorldPoint};
use crate::robot::{Indicator, RobotInterface};
use crate::shared::{SharedState, StatusSnapshot};
use crate::transform::OdometryFrame;
use crate::utils::wrap_pi;

use super::state::MissionState;
use super::telemetry::{TelemetryRecord, TelemetrySink};

const OBSTACLE_TONE_HZ: f32 = 440.0;
const WAYPOINT_TONE_HZ: f32 = 880.0;
const SUCCESS_TONE_HZ: f32 = 1320.0;
const TONE_DURATION: Duration = Duration::from_millis(120);

/// One mission: where the robot starts and where it has to go.
#[derive(Clone, Debug, Deserialize)]
pub struct MissionPlan {
    /// Pose the robot physically starts at, in the world frame
    pub initial_pose: Pose,
    /// Intermediate goals, visited in order
    #[serde(default)]
    pub waypoints: Vec<WorldPoint>,
    pub final_goal: WorldPoint,
    #[serde(default)]
    pub law: PotentialLaw,
    /// Overrides `repulsive.k_repulsive` for this mission
    #[serde(default)]
    pub k_repulsive: Option<f32>,
    /// Overrides `repulsive.influence_radius` for this mission
    #[serde(default)]
    pub influence_radius: Option<f32>,
}

impl MissionPlan {
    pub fn new(initial_pose: Pose, final_goal: WorldPoint) -> Self {
        Self {
            initial_pose,
            waypoints: Vec::new(),
            final_goal,
            law: PotentialLaw::default(),
            k_repulsive: None,
            influence_radius: None,
        }
    }

    pub fn with_waypoints(mut self, waypoints: Vec<WorldPoint>) -> Self {
        self.waypoints = waypoints;
        self
    }

    pub fn with_law(mut self, law: PotentialLaw) -> Self {
        self.law = law;
        self
    }

    /// Waypoints followed by the final goal.
    pub fn goals(&self) -> Vec<WorldPoint> {
        let mut goals = self.waypoints.clone();
        goals.push(self.final_goal);
        goals
    }

    pub fn validate(&self) -> Result<()> {
        let p = &self.initial_pose;
        if !(p.x.is_finite() && p.y.is_finite() && p.heading_deg.is_finite()) {
            return Err(NavError::InvalidMission(
                "initial pose must be finite".to_string(),
            ));
        }
        if let Some(i) = self
            .goals()
            .iter()
            .position(|g| !(g.x.is_finite() && g.y.is_finite()))
        {
            return Err(NavError::InvalidMission(format!(
                "goal {} has a non-finite coordinate",
                i
            )));
        }
        if let Some(k) = self.k_repulsive
            && !(k.is_finite() && k > 0.0)
        {
            return Err(NavError::InvalidMission(format!(
                "k_repulsive must be positive, got {}",
                k
            )));
        }
        if let Some(r) = self.influence_radius
            && !(r.is_finite() && r > 0.0)
        {
            return Err(NavError::InvalidMission(format!(
                "influence_radius must be positive, got {}",
                r
            )));
        }
        Ok(())
    }
}

/// Why a mission did not succeed.
#[derive(Clone, Debug, PartialEq)]
pub enum FailureReason {
    /// Bumper trips reached the configured maximum
    CollisionLimit { collisions: u32 },
    /// The robot interface returned an error
    RobotFault(String),
    /// Operator stop request
    Cancelled,
    /// Mission time budget exhausted
    Timeout,
    InvalidPlan(String),
    InvalidConfig(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::CollisionLimit { collisions } => {
                write!(f, "collision limit reached ({} collisions)", collisions)
            }
            FailureReason::RobotFault(msg) => write!(f, "robot fault: {}", msg),
            FailureReason::Cancelled => write!(f, "cancelled"),
            FailureReason::Timeout => write!(f, "time budget exhausted"),
            FailureReason::InvalidPlan(msg) => write!(f, "invalid plan: {}", msg),
            FailureReason::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

/// Outcome of [`Navigator::navigate`].
#[derive(Clone, Debug, PartialEq)]
pub struct MissionResult {
    pub success: bool,
    pub final_state: MissionState,
    pub goals_reached: usize,
    pub total_goals: usize,
    pub collisions: u32,
    /// Ticks with a valid pose
    pub ticks: u64,
    /// Ticks skipped because no pose was available
    pub skipped_ticks: u64,
    /// Mission time as seen through the robot interface (s)
    pub elapsed_secs: f32,
    pub failure: Option<FailureReason>,
    /// Last world pose observed
    pub final_pose: Pose,
}

enum Exit {
    Succeeded,
    Failed(FailureReason),
}

/// Runs missions against a robot.
#[derive(Clone, Debug)]
pub struct Navigator {
    config: NavConfig,
    shared: Option<Arc<SharedState>>,
}

impl Navigator {
    pub fn new(config: NavConfig) -> Self {
        Self {
            config,
            shared: None,
        }
    }

    /// Publish progress to, and take stop requests from, `shared`.
    pub fn with_shared(mut self, shared: Arc<SharedState>) -> Self {
        self.shared = Some(shared);
        self
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    /// Drive through every goal of `plan`.
    pub fn navigate<R: RobotInterface + ?Sized>(
        &self,
        robot: &mut R,
        plan: &MissionPlan,
        sink: &mut dyn TelemetrySink,
    ) -> MissionResult {
        let mut session = MissionSession::new(&self.config, plan, self.shared.as_deref());
        info!(
            "Mission start: {} goal(s), law={}, start=({:.1}, {:.1}, {:.1}°)",
            session.goals.len(),
            plan.law,
            plan.initial_pose.x,
            plan.initial_pose.y,
            plan.initial_pose.heading_deg
        );

        if let Err(e) = self.config.validate() {
            return session.finish(
                robot,
                Exit::Failed(FailureReason::InvalidConfig(e.to_string())),
            );
        }
        if let Err(e) = plan.validate() {
            return session.finish(
                robot,
                Exit::Failed(FailureReason::InvalidPlan(e.to_string())),
            );
        }

        let exit = match panic::catch_unwind(AssertUnwindSafe(|| session.run(robot, sink))) {
            Ok(outcome) => outcome.unwrap_or_else(|e| {
                error!("Robot interface fault: {}", e);
                Exit::Failed(FailureReason::RobotFault(e.to_string()))
            }),
            Err(payload) => {
                session.abort(robot);
                panic::resume_unwind(payload);
            }
        };

        session.finish(robot, exit)
    }
}

/// Per-mission state, owned by the control loop.
struct MissionSession<'a> {
    config: &'a NavConfig,
    shared: Option<&'a SharedState>,
    controller: PotentialFieldController,
    initial_pose: Pose,
    goals: Vec<WorldPoint>,
    ramp: VelocityRamp,
    state: MissionState,
    goal_index: usize,
    goals_reached: usize,
    collisions: u32,
    ticks: u64,
    skipped_ticks: u64,
    elapsed_secs: f32,
    start: WorldPoint,
    last_pose: Pose,
    /// Last wheel command sent
    wheels: WheelCommand,
    indicator: Option<Indicator>,
    obstacle_announced: bool,
    was_trapped: bool,
}

impl<'a> MissionSession<'a> {
    fn new(config: &'a NavConfig, plan: &MissionPlan, shared: Option<&'a SharedState>) -> Self {
        let controller = PotentialFieldController::new(config, plan.law)
            .with_repulsive_gain(plan.k_repulsive)
            .with_influence_radius(plan.influence_radius);
        let session = Self {
            config,
            shared,
            controller,
            initial_pose: plan.initial_pose,
            goals: plan.goals(),
            ramp: VelocityRamp::new(),
            state: MissionState::Initializing,
            goal_index: 0,
            goals_reached: 0,
            collisions: 0,
            ticks: 0,
            skipped_ticks: 0,
            elapsed_secs: 0.0,
            start: plan.initial_pose.position(),
            last_pose: plan.initial_pose,
            wheels: WheelCommand::STOP,
            indicator: None,
            obstacle_announced: false,
            was_trapped: false,
        };
        session.publish();
        session
    }

    fn run<R: RobotInterface + ?Sized>(
        &mut self,
        robot: &mut R,
        sink: &mut dyn TelemetrySink,
    ) -> Result<Exit> {
        let frame = self.initialize(robot)?;
        let config = self.config;
        let dt = config.control.dt_secs;
        let mission = &config.mission;

        loop {
            if self.shared.is_some_and(|s| s.stop_requested()) {
                info!("Stop requested, ending mission");
                return Ok(Exit::Failed(FailureReason::Cancelled));
            }
            if let Some(budget) = mission.max_duration_secs
                && self.elapsed_secs >= budget
            {
                warn!("Mission time budget of {:.1}s exhausted", budget);
                return Ok(Exit::Failed(FailureReason::Timeout));
            }

            let Some(raw) = robot.get_pose()? else {
                self.skipped_ticks += 1;
                debug!("No pose this tick, skipping");
                self.pause(robot, dt)?;
                continue;
            };
            let pose = frame.apply(&raw);
            self.last_pose = pose;
            self.ticks += 1;

            let goal = self.goals[self.goal_index];
            let distance = pose.distance_to(&goal);
            let tolerance = mission.adaptive_tolerance(self.start.distance(&pose.position()));
            if distance < tolerance {
                if self.goal_index + 1 == self.goals.len() {
                    self.final_approach(robot, &frame, goal)?;
                    return Ok(Exit::Succeeded);
                }
                self.advance_goal(robot, distance)?;
                continue;
            }

            let ir = robot.get_ir_intensities()?;
            let (bump_left, bump_right) = robot.get_bumpers()?;
            if bump_left || bump_right {
                if let Some(exit) = self.recover_from_collision(robot, bump_left, bump_right)? {
                    return Ok(exit);
                }
                continue;
            }

            let step = self.controller.step(&pose, &goal, &ir, &mut self.ramp);
            sink.record(&TelemetryRecord::from_step(
                self.ticks,
                self.elapsed_secs,
                self.goal_index,
                pose,
                &step,
            ));
            self.note_trap_transition(&step);
            self.update_feedback(robot, &step)?;

            self.command(robot, step.wheels)?;

            if mission.log_interval_ticks > 0 && self.ticks % mission.log_interval_ticks == 0 {
                info!(
                    "[{}] goal {}/{} d={:.1}cm v={:.1} w={:.2} level={} obstacles={}",
                    self.ticks,
                    self.goal_index + 1,
                    self.goals.len(),
                    step.distance_to_goal,
                    step.v_linear,
                    step.omega,
                    step.safety_level(),
                    step.num_obstacles()
                );
            }

            self.pause(robot, dt)?;
        }
    }

    /// Reset odometry, fix the world transform, and arm the mission.
    fn initialize<R: RobotInterface + ?Sized>(&mut self, robot: &mut R) -> Result<OdometryFrame> {
        robot.reset_navigation()?;

        let attempts = self.config.mission.pose_acquire_attempts.max(1);
        let mut raw = None;
        for _ in 0..attempts {
            if let Some(pose) = robot.get_pose()? {
                raw = Some(pose);
                break;
            }
            self.pause(robot, self.config.control.dt_secs)?;
        }
        let raw = raw.ok_or_else(|| {
            NavError::Robot(format!("no pose after {} attempts following reset", attempts))
        })?;

        let frame = OdometryFrame::establish(&self.initial_pose, &raw);
        debug!(
            "Odometry frame: raw=({:.1}, {:.1}, {:.1}°) rotation={:.1}°",
            raw.x,
            raw.y,
            raw.heading_deg,
            frame.rotation_deg()
        );

        self.ramp.reset();
        self.set_indicator(robot, Indicator::Ready)?;
        self.pause(robot, self.config.mission.start_delay_secs)?;
        self.transition(MissionState::Seeking { goal_index: 0 });
        Ok(frame)
    }

    fn advance_goal<R: RobotInterface + ?Sized>(&mut self, robot: &mut R, distance: f32) -> Result<()> {
        self.stop(robot)?;
        self.goals_reached += 1;
        info!(
            "Reached waypoint {}/{} ({:.1}cm off)",
            self.goal_index + 1,
            self.goals.len(),
            distance
        );
        robot.play_tone(WAYPOINT_TONE_HZ, TONE_DURATION)?;
        self.goal_index += 1;
        self.transition(MissionState::Seeking {
            goal_index: self.goal_index,
        });
        self.pause(robot, self.config.mission.waypoint_pause_secs)
    }

    /// Short slow correction towards the final goal to absorb drift.
    fn final_approach<R: RobotInterface + ?Sized>(
        &mut self,
        robot: &mut R,
        frame: &OdometryFrame,
        goal: WorldPoint,
    ) -> Result<()> {
        self.transition(MissionState::FinalApproach);
        self.stop(robot)?;

        let config = self.config;
        let mission = &config.mission;
        if let Some(raw) = robot.get_pose()? {
            let pose = frame.apply(&raw);
            self.last_pose = pose;
            let distance = pose.distance_to(&goal);
            let error = wrap_pi(pose.position().bearing_to(&goal) - pose.heading_rad());
            if distance > mission.nudge_min_distance && error.abs() < FRAC_PI_2 {
                let v = (mission.nudge_speed_gain * distance).max(mission.nudge_min_speed);
                let omega = mission.nudge_angular_gain * error;
                let half = config.robot.half_track();
                let limit = config.robot.max_wheel_speed;
                debug!(
                    "Final nudge: d={:.1}cm err={:.1}° v={:.1}",
                    distance,
                    error.to_degrees(),
                    v
                );
                self.command(
                    robot,
                    WheelCommand::new(
                        (v - half * omega).clamp(-limit, limit),
                        (v + half * omega).clamp(-limit, limit),
                    ),
                )?;
                self.pause(robot, mission.nudge_secs)?;
                self.stop(robot)?;
                self.pause(robot, mission.settle_secs)?;
                if let Some(raw) = robot.get_pose()? {
                    self.last_pose = frame.apply(&raw);
                }
            }
        }

        self.goals_reached += 1;
        info!(
            "Final goal reached at ({:.1}, {:.1})",
            self.last_pose.x, self.last_pose.y
        );
        robot.play_tone(SUCCESS_TONE_HZ, TONE_DURATION)?;
        self.set_indicator(robot, Indicator::Success)
    }

    /// Back off a bumper contact, or give up once the budget is spent.
    fn recover_from_collision<R: RobotInterface + ?Sized>(
        &mut self,
        robot: &mut R,
        left: bool,
        right: bool,
    ) -> Result<Option<Exit>> {
        self.collisions += 1;
        self.stop(robot)?;
        let config = self.config;
        let mission = &config.mission;
        warn!(
            "Bumper contact (left={}, right={}), collision {}/{}",
            left, right, self.collisions, mission.max_collisions
        );

        if self.collisions >= mission.max_collisions {
            return Ok(Some(Exit::Failed(FailureReason::CollisionLimit {
                collisions: self.collisions,
            })));
        }

        self.transition(MissionState::CollisionRecovery);
        self.command(robot, WheelCommand::straight(-mission.reverse_speed))?;
        self.pause(robot, mission.reverse_secs)?;
        self.stop(robot)?;
        self.pause(robot, mission.recovery_pause_secs)?;
        self.transition(MissionState::Seeking {
            goal_index: self.goal_index,
        });
        Ok(None)
    }

    fn note_trap_transition(&mut self, step: &ControlStep) {
        let trapped = step.is_trapped();
        if trapped && !self.was_trapped {
            warn!(
                "Local minimum: {} sensors loaded, switching to escape gains",
                step.trap.sensor_count
            );
        } else if !trapped && self.was_trapped {
            info!("Escaped local minimum");
        }
        self.was_trapped = trapped;
    }

    /// Indicator colour and the one-shot obstacle tone.
    fn update_feedback<R: RobotInterface + ?Sized>(
        &mut self,
        robot: &mut R,
        step: &ControlStep,
    ) -> Result<()> {
        let indicator = if step.num_obstacles() == 0 {
            Indicator::Cruising
        } else if step.is_trapped() || step.safety_level() >= SafetyLevel::Warning {
            Indicator::Avoiding
        } else {
            Indicator::Obstacle
        };

        if indicator == Indicator::Cruising {
            self.obstacle_announced = false;
        } else if !self.obstacle_announced {
            robot.play_tone(OBSTACLE_TONE_HZ, TONE_DURATION)?;
            self.obstacle_announced = true;
        }
        self.set_indicator(robot, indicator)
    }

    fn set_indicator<R: RobotInterface + ?Sized>(
        &mut self,
        robot: &mut R,
        indicator: Indicator,
    ) -> Result<()> {
        if self.indicator != Some(indicator) {
            robot.set_indicator(indicator)?;
            self.indicator = Some(indicator);
        }
        Ok(())
    }

    fn command<R: RobotInterface + ?Sized>(&mut self, robot: &mut R, wheels: WheelCommand) -> Result<()> {
        robot.set_wheel_speeds(wheels.left, wheels.right)?;
        self.wheels = wheels;
        self.publish();
        Ok(())
    }

    /// Zero the wheels and restart the velocity ramp.
    fn stop<R: RobotInterface + ?Sized>(&mut self, robot: &mut R) -> Result<()> {
        self.ramp.reset();
        self.command(robot, WheelCommand::STOP)
    }

    fn pause<R: RobotInterface + ?Sized>(&mut self, robot: &mut R, secs: f32) -> Result<()> {
        if secs > 0.0 {
            let duration = Duration::try_from_secs_f32(secs)
                .map_err(|e| NavError::Config(format!("cannot wait {}s: {}", secs, e)))?;
            robot.wait(duration)?;
            self.elapsed_secs += secs;
        }
        Ok(())
    }

    fn transition(&mut self, state: MissionState) {
        if self.state != state {
            debug!("Mission state: {} -> {}", self.state, state);
            self.state = state;
            self.publish();
        }
    }

    /// Hand the current tick to observers as one snapshot.
    fn publish(&self) {
        if let Some(shared) = self.shared {
            shared.publish(StatusSnapshot {
                pose: self.last_pose,
                wheels: self.wheels,
                state: self.state,
                goal_index: self.goal_index,
                total_goals: self.goals.len(),
                collisions: self.collisions,
                ticks: self.ticks,
            });
        }
    }

    /// Panic path: zero the wheels and mark the mission failed.
    fn abort<R: RobotInterface + ?Sized>(&mut self, robot: &mut R) {
        error!("Mission loop panicked after {} ticks, stopping wheels", self.ticks);
        if let Err(e) = self.stop(robot) {
            error!("Failed to stop wheels after panic: {}", e);
        }
        self.transition(MissionState::Failed);
        if let Some(shared) = self.shared {
            shared.mark_finished();
        }
    }

    fn finish<R: RobotInterface + ?Sized>(mut self, robot: &mut R, exit: Exit) -> MissionResult {
        if let Err(e) = self.stop(robot) {
            error!("Failed to stop wheels at mission end: {}", e);
        }

        let failure = match exit {
            Exit::Succeeded => {
                self.transition(MissionState::Succeeded);
                info!(
                    "Mission succeeded: {} goal(s), {} ticks, {} collision(s), {:.1}s",
                    self.goals_reached, self.ticks, self.collisions, self.elapsed_secs
                );
                None
            }
            Exit::Failed(reason) => {
                self.transition(MissionState::Failed);
                warn!(
                    "Mission failed: {} ({}/{} goals reached)",
                    reason,
                    self.goals_reached,
                    self.goals.len()
                );
                if let Err(e) = robot.set_indicator(Indicator::Failure) {
                    warn!("Failed to set failure indicator: {}", e);
                }
                Some(reason)
            }
        };

        if let Some(shared) = self.shared {
            shared.mark_finished();
        }

        MissionResult {
            success: failure.is_none(),
            final_state: self.state,
            goals_reached: self.goals_reached,
            total_goals: self.goals.len(),
            collisions: self.collisions,
            ticks: self.ticks,
            skipped_ticks: self.skipped_ticks,
            elapsed_secs: self.elapsed_secs,
            failure,
            final_pose: self.last_pose,
        }
    }
}
