//! Actuator and sensor interface.
//!
//! The mission loop talks to the robot only through [`RobotInterface`].
//! Every call is a blocking request; the implementation owns the passage of
//! time through [`RobotInterface::wait`], which lets the simulator run in
//! virtual time.

mod sim;

pub use sim::{Shape, SimWorld, SimulatedRobot};

use std::time::Duration;

use crate::error::Result;
use crate::geometry::Pose;
use crate::perception::IrFrame;

/// Indicator light states used for operator feedback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Indicator {
    /// Mission armed, about to move
    Ready,
    /// Driving with nothing in view
    Cruising,
    /// Obstacle in view, path still open
    Obstacle,
    /// Actively avoiding a close obstacle
    Avoiding,
    Success,
    Failure,
}

impl Indicator {
    /// RGB colour for the light ring.
    pub fn rgb(&self) -> (u8, u8, u8) {
        match self {
            Indicator::Ready | Indicator::Success => (0, 255, 0),
            Indicator::Cruising => (0, 0, 255),
            Indicator::Obstacle => (255, 165, 0),
            Indicator::Avoiding => (0, 255, 255),
            Indicator::Failure => (255, 0, 0),
        }
    }
}

/// Low-level robot access used by the mission loop.
pub trait RobotInterface {
    /// Restart odometry from the robot's current position.
    fn reset_navigation(&mut self) -> Result<()>;

    /// Odometry pose, or `None` when no fresh pose is available this tick.
    fn get_pose(&mut self) -> Result<Option<Pose>>;

    /// Raw intensities of the seven IR proximity sensors, left to right.
    fn get_ir_intensities(&mut self) -> Result<IrFrame>;

    /// Bumper contacts as `(left, right)`.
    fn get_bumpers(&mut self) -> Result<(bool, bool)>;

    /// Command wheel speeds in cm/s.
    fn set_wheel_speeds(&mut self, left: f32, right: f32) -> Result<()>;

    /// Let `duration` pass.
    fn wait(&mut self, duration: Duration) -> Result<()> {
        std::thread::sleep(duration);
        Ok(())
    }

    fn set_indicator(&mut self, _indicator: Indicator) -> Result<()> {
        Ok(())
    }

    fn play_tone(&mut self, _frequency_hz: f32, _duration: Duration) -> Result<()> {
        Ok(())
    }
}
