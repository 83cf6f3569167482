//! Test utilities for MargaNav integration tests.
//!
//! Scenario builders for the simulator and a scripted robot for driving the
//! mission loop through failure paths.

#![allow(dead_code)]

use std::time::Duration;

use marga_nav::config::IR_SENSOR_COUNT;
use marga_nav::perception::SensorCalibration;
use marga_nav::{
    IrFrame, MissionPlan, NavConfig, NavError, Pose, Result, RobotInterface, Shape, SimWorld,
    SimulatedRobot, WheelCommand, WorldPoint,
};

/// Config with the startup delay removed so tests spend ticks on driving.
pub fn test_config() -> NavConfig {
    let mut config = NavConfig::default();
    config.mission.start_delay_secs = 0.0;
    config
}

/// Simulated robot at `start` in `world`.
pub fn sim_robot(config: &NavConfig, world: SimWorld, start: Pose) -> SimulatedRobot {
    SimulatedRobot::new(config, world, start)
}

/// Empty world.
pub fn open_world() -> SimWorld {
    SimWorld::default()
}

/// World with a single round post.
pub fn post_world(x: f32, y: f32, radius: f32) -> SimWorld {
    SimWorld {
        obstacles: vec![Shape::Circle { x, y, radius }],
        ..SimWorld::default()
    }
}

/// Straight-line mission from the origin along +x.
pub fn straight_mission(distance: f32) -> MissionPlan {
    MissionPlan::new(Pose::new(0.0, 0.0, 0.0), WorldPoint::new(distance, 0.0))
}

/// IR frame with one sensor seeing an obstacle at `distance` cm.
pub fn frame_with(calibration: &SensorCalibration, sensor: usize, distance: f32) -> IrFrame {
    let mut raw = [0u16; IR_SENSOR_COUNT];
    raw[sensor] = calibration.raw_for_distance(sensor, distance);
    IrFrame::new(raw)
}

/// Robot whose answers are fixed by the test.
///
/// Reports the same odometry pose forever, records every wheel command,
/// and fails IR reads once `fail_ir_after` reads have been served. With
/// `panic_ir_after` set, the read after that many panics instead.
#[derive(Debug, Default)]
pub struct ScriptedRobot {
    pub pose: Pose,
    pub ir: IrFrame,
    pub bumpers: (bool, bool),
    pub fail_ir_after: Option<usize>,
    pub panic_ir_after: Option<usize>,
    pub ir_reads: usize,
    pub commands: Vec<WheelCommand>,
    pub waited: Duration,
}

impl ScriptedRobot {
    /// Robot pressed against something dead ahead.
    pub fn always_bumping() -> Self {
        Self {
            bumpers: (true, true),
            ..Self::default()
        }
    }

    pub fn last_command(&self) -> Option<WheelCommand> {
        self.commands.last().copied()
    }

    /// Commands with any wheel turning.
    pub fn moving_commands(&self) -> Vec<WheelCommand> {
        self.commands
            .iter()
            .copied()
            .filter(|c| !c.is_stopped())
            .collect()
    }

    pub fn reverse_commands(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| c.left < 0.0 && c.right < 0.0)
            .count()
    }
}

impl RobotInterface for ScriptedRobot {
    fn reset_navigation(&mut self) -> Result<()> {
        Ok(())
    }

    fn get_pose(&mut self) -> Result<Option<Pose>> {
        Ok(Some(self.pose))
    }

    fn get_ir_intensities(&mut self) -> Result<IrFrame> {
        if let Some(limit) = self.fail_ir_after
            && self.ir_reads >= limit
        {
            return Err(NavError::Robot("IR bus timeout".to_string()));
        }
        if let Some(limit) = self.panic_ir_after
            && self.ir_reads >= limit
        {
            panic!("IR driver crashed after {} reads", limit);
        }
        self.ir_reads += 1;
        Ok(self.ir)
    }

    fn get_bumpers(&mut self) -> Result<(bool, bool)> {
        Ok(self.bumpers)
    }

    fn set_wheel_speeds(&mut self, left: f32, right: f32) -> Result<()> {
        self.commands.push(WheelCommand::new(left, right));
        Ok(())
    }

    fn wait(&mut self, duration: Duration) -> Result<()> {
        self.waited += duration;
        Ok(())
    }
}
