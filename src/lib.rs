//! MargaNav - potential-field waypoint navigation
//!
//! Drives a differential-drive robot through a list of waypoints using an
//! artificial potential field: the goal attracts, obstacles seen by seven
//! forward-facing IR proximity sensors repel. On top of the field sit
//!
//! - a gap detector that recognises passable openings between obstacles,
//! - a trap detector that switches to escape gains in local minima,
//! - a braking-aware safety governor that caps linear speed,
//! - a kinematic projector that keeps the robot on arcs far from the goal.
//!
//! The mission loop ([`mission::Navigator`]) talks to the robot only through
//! [`robot::RobotInterface`]; [`robot::SimulatedRobot`] implements it with
//! arc kinematics, bumper contact, and ray-cast IR returns.
//!
//! ```no_run
//! use marga_nav::{MissionPlan, NavConfig, Navigator, NullSink, Pose, SimWorld, SimulatedRobot, WorldPoint};
//!
//! let config = NavConfig::default();
//! let start = Pose::new(0.0, 0.0, 0.0);
//! let mut robot = SimulatedRobot::new(&config, SimWorld::default(), start);
//! let plan = MissionPlan::new(start, WorldPoint::new(100.0, 0.0));
//! let result = Navigator::new(config).navigate(&mut robot, &plan, &mut NullSink);
//! assert!(result.success);
//! ```

pub mod config;
pub mod control;
pub mod error;
pub mod geometry;
pub mod mission;
pub mod perception;
pub mod robot;
pub mod shared;
pub mod threads;
pub mod transform;
pub mod utils;

pub use config::NavConfig;
pub use control::{PotentialFieldController, PotentialLaw, SafetyLevel, WheelCommand};
pub use error::{NavError, Result};
pub use geometry::{Pose, Vector2, WorldPoint};
pub use mission::{
    FailureReason, MissionPlan, MissionResult, MissionState, Navigator, NullSink, TelemetryRecord,
    TelemetrySink, TelemetrySummary,
};
pub use perception::IrFrame;
pub use robot::{Indicator, RobotInterface, Shape, SimWorld, SimulatedRobot};
pub use shared::{SharedState, StatusSnapshot};
pub use threads::{MissionHandle, spawn_mission};
pub use transform::OdometryFrame;
