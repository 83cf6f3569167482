//! Simulated differential-drive robot.
//!
//! Integrates wheel commands with exact arc kinematics, stops on contact
//! with an obstacle (bumpers latch while the body is pressed against it),
//! and synthesizes IR intensities by ray casting each sensor's bearing and
//! inverting the same distance model the controller uses. Odometry is
//! reported in its own frame, restarted by `reset_navigation`, optionally
//! rotated by a heading bias so the world transform has real work to do.
//!
//! Time only advances inside [`RobotInterface::wait`].

use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::{IR_SENSOR_COUNT, NavConfig};
use crate::control::WheelCommand;
use crate::error::{NavError, Result};
use crate::geometry::{Pose, WorldPoint};
use crate::perception::{IrFrame, SensorCalibration};
use crate::utils::wrap_pi;

use super::{Indicator, RobotInterface};

/// Half-width of the frontal arc in which both bumpers trip (degrees).
const CENTER_BUMP_DEG: f32 = 15.0;

/// Static obstacle geometry (cm).
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Shape {
    Circle { x: f32, y: f32, radius: f32 },
    Wall { x1: f32, y1: f32, x2: f32, y2: f32 },
}

impl Shape {
    /// Distance along a ray to the first surface hit, if any.
    fn ray_hit(&self, origin: WorldPoint, angle: f32) -> Option<f32> {
        let (dy, dx) = angle.sin_cos();
        match *self {
            Shape::Circle { x, y, radius } => {
                let ox = x - origin.x;
                let oy = y - origin.y;
                let inside = ox * ox + oy * oy - radius * radius;
                if inside <= 0.0 {
                    return Some(0.0);
                }
                let b = ox * dx + oy * dy;
                let disc = b * b - inside;
                if disc < 0.0 {
                    return None;
                }
                let t = b - disc.sqrt();
                (t >= 0.0).then_some(t)
            }
            Shape::Wall { x1, y1, x2, y2 } => {
                let ex = x2 - x1;
                let ey = y2 - y1;
                let denom = dx * ey - dy * ex;
                if denom.abs() < 1e-9 {
                    return None;
                }
                let wx = x1 - origin.x;
                let wy = y1 - origin.y;
                let t = (wx * ey - wy * ex) / denom;
                let s = (wx * dy - wy * dx) / denom;
                (t >= 0.0 && (0.0..=1.0).contains(&s)).then_some(t)
            }
        }
    }

    /// Closest point of the shape to `p`, and the distance from `p` to the
    /// surface (negative inside a circle).
    fn nearest(&self, p: WorldPoint) -> (WorldPoint, f32) {
        match *self {
            Shape::Circle { x, y, radius } => {
                let centre = WorldPoint::new(x, y);
                let d = p.distance(&centre);
                let angle = if d > 0.0 { centre.bearing_to(&p) } else { 0.0 };
                (centre.offset(angle, radius), d - radius)
            }
            Shape::Wall { x1, y1, x2, y2 } => {
                let ex = x2 - x1;
                let ey = y2 - y1;
                let len2 = ex * ex + ey * ey;
                let s = if len2 > 0.0 {
                    (((p.x - x1) * ex + (p.y - y1) * ey) / len2).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let q = WorldPoint::new(x1 + s * ex, y1 + s * ey);
                (q, p.distance(&q))
            }
        }
    }
}

/// Simulated environment.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SimWorld {
    pub obstacles: Vec<Shape>,
    /// Integration step (s)
    pub physics_step_secs: f32,
    /// Heading the odometry reports right after a reset (degrees)
    pub odometry_heading_bias_deg: f32,
    /// Every n-th pose query returns nothing
    pub pose_dropout_every: Option<u32>,
    /// Sleep for `duration / factor` of wall-clock time on every wait
    pub realtime_factor: Option<f32>,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self {
            obstacles: Vec::new(),
            physics_step_secs: 0.01,
            odometry_heading_bias_deg: 0.0,
            pose_dropout_every: None,
            realtime_factor: None,
        }
    }
}

impl SimWorld {
    /// Reject settings that would stall or crash the integrator.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(NavError::Config(msg.to_string()));

        if !(self.physics_step_secs.is_finite() && self.physics_step_secs > 0.0) {
            return invalid("simulation.physics_step_secs must be positive and finite");
        }
        if !self.odometry_heading_bias_deg.is_finite() {
            return invalid("simulation.odometry_heading_bias_deg must be finite");
        }
        if self.pose_dropout_every == Some(0) {
            return invalid("simulation.pose_dropout_every must be at least 1");
        }
        if let Some(factor) = self.realtime_factor
            && !(factor.is_finite() && factor > 0.0)
        {
            return invalid("simulation.realtime_factor must be positive and finite");
        }
        Ok(())
    }
}

/// Kinematic simulator implementing [`RobotInterface`].
#[derive(Debug)]
pub struct SimulatedRobot {
    world: SimWorld,
    calibration: SensorCalibration,
    radius: f32,
    wheel_base: f32,
    max_wheel_speed: f32,
    x: f32,
    y: f32,
    theta: f32,
    origin: (f32, f32, f32),
    command: WheelCommand,
    contact: (bool, bool),
    collision_events: u32,
    elapsed_secs: f32,
    pose_queries: u32,
    indicator: Option<Indicator>,
    tones: u32,
}

impl SimulatedRobot {
    pub fn new(config: &NavConfig, world: SimWorld, start: Pose) -> Self {
        let theta = start.heading_rad();
        Self {
            world,
            calibration: SensorCalibration::new(&config.sensors),
            radius: config.robot.radius,
            wheel_base: config.robot.wheel_base,
            max_wheel_speed: config.robot.max_wheel_speed,
            x: start.x,
            y: start.y,
            theta,
            origin: (start.x, start.y, theta),
            command: WheelCommand::STOP,
            contact: (false, false),
            collision_events: 0,
            elapsed_secs: 0.0,
            pose_queries: 0,
            indicator: None,
            tones: 0,
        }
    }

    /// Ground-truth pose in the world frame.
    pub fn true_pose(&self) -> Pose {
        Pose::new(self.x, self.y, self.theta.to_degrees())
    }

    pub fn last_command(&self) -> WheelCommand {
        self.command
    }

    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed_secs
    }

    /// Number of times the body came into contact with an obstacle.
    pub fn collision_events(&self) -> u32 {
        self.collision_events
    }

    pub fn indicator(&self) -> Option<Indicator> {
        self.indicator
    }

    pub fn tones_played(&self) -> u32 {
        self.tones
    }

    /// Pose as the odometry reports it.
    fn odometry(&self) -> Pose {
        let (x0, y0, theta0) = self.origin;
        let bias = self.world.odometry_heading_bias_deg.to_radians();
        let (sin, cos) = (bias - theta0).sin_cos();
        let dx = self.x - x0;
        let dy = self.y - y0;
        Pose::new(
            cos * dx - sin * dy,
            sin * dx + cos * dy,
            (self.theta - theta0 + bias).to_degrees(),
        )
    }

    fn collides(&self, x: f32, y: f32) -> Option<WorldPoint> {
        let centre = WorldPoint::new(x, y);
        self.world.obstacles.iter().find_map(|shape| {
            let (point, gap) = shape.nearest(centre);
            (gap < self.radius).then_some(point)
        })
    }

    /// Advance the body by one integration step.
    fn integrate(&mut self, dt: f32) {
        let left = self.command.left;
        let right = self.command.right;
        let v = (left + right) / 2.0;
        let omega = (right - left) / self.wheel_base;

        // Exact arc, written as a chord so tiny rotations stay well conditioned
        let dtheta = omega * dt;
        let half = dtheta / 2.0;
        let chord = if half.abs() < 1e-6 {
            v * dt
        } else {
            v * dt * half.sin() / half
        };
        let heading = self.theta + half;
        let new_x = self.x + chord * heading.cos();
        let new_y = self.y + chord * heading.sin();
        let new_theta = self.theta + dtheta;

        self.theta = wrap_pi(new_theta);
        match self.collides(new_x, new_y) {
            Some(point) => {
                let bearing = wrap_pi(WorldPoint::new(new_x, new_y).bearing_to(&point) - self.theta);
                let bearing_deg = bearing.to_degrees();
                let contact = if bearing_deg.abs() <= 90.0 {
                    (bearing_deg > -CENTER_BUMP_DEG, bearing_deg < CENTER_BUMP_DEG)
                } else {
                    (false, false)
                };
                if self.contact == (false, false) && contact != (false, false) {
                    self.collision_events += 1;
                    debug!(
                        "Sim contact at ({:.1}, {:.1}), bearing {:.0}°",
                        self.x, self.y, bearing_deg
                    );
                }
                self.contact = contact;
            }
            None => {
                self.x = new_x;
                self.y = new_y;
                self.contact = (false, false);
            }
        }
    }
}

impl RobotInterface for SimulatedRobot {
    fn reset_navigation(&mut self) -> Result<()> {
        self.origin = (self.x, self.y, self.theta);
        Ok(())
    }

    fn get_pose(&mut self) -> Result<Option<Pose>> {
        self.pose_queries += 1;
        if let Some(every) = self.world.pose_dropout_every
            && every > 0
            && self.pose_queries % every == 0
        {
            return Ok(None);
        }
        Ok(Some(self.odometry()))
    }

    fn get_ir_intensities(&mut self) -> Result<IrFrame> {
        let centre = WorldPoint::new(self.x, self.y);
        let mut raw = [0u16; IR_SENSOR_COUNT];
        for (i, value) in raw.iter_mut().enumerate() {
            let direction = self.theta + self.calibration.bearing(i);
            let window = centre.offset(direction, self.calibration.mounting_radius());
            let hit = self
                .world
                .obstacles
                .iter()
                .filter_map(|shape| shape.ray_hit(window, direction))
                .reduce(f32::min);
            if let Some(distance) = hit {
                *value = self.calibration.raw_for_distance(i, distance);
            }
        }
        Ok(IrFrame::new(raw))
    }

    fn get_bumpers(&mut self) -> Result<(bool, bool)> {
        Ok(self.contact)
    }

    fn set_wheel_speeds(&mut self, left: f32, right: f32) -> Result<()> {
        let limit = self.max_wheel_speed;
        self.command = WheelCommand::new(left.clamp(-limit, limit), right.clamp(-limit, limit));
        Ok(())
    }

    fn wait(&mut self, duration: Duration) -> Result<()> {
        let secs = duration.as_secs_f32();
        if secs <= 0.0 {
            return Ok(());
        }
        let step = self.world.physics_step_secs;
        if !(step.is_finite() && step > 0.0) {
            return Err(NavError::Config(format!(
                "cannot integrate with a physics step of {}s",
                step
            )));
        }
        let steps = (secs / step).ceil().max(1.0) as u32;
        let dt = secs / steps as f32;
        for _ in 0..steps {
            self.integrate(dt);
        }
        self.elapsed_secs += secs;

        if let Some(factor) = self.world.realtime_factor
            && factor > 0.0
        {
            std::thread::sleep(duration.div_f32(factor));
        }
        Ok(())
    }

    fn set_indicator(&mut self, indicator: Indicator) -> Result<()> {
        self.indicator = Some(indicator);
        Ok(())
    }

    fn play_tone(&mut self, _frequency_hz: f32, _duration: Duration) -> Result<()> {
        self.tones += 1;
        Ok(())
    }
}
