//! End-to-end missions against the simulated and scripted robots.

mod common;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use approx::assert_relative_eq;
use common::*;
use marga_nav::{
    FailureReason, Indicator, MissionPlan, MissionState, Navigator, NullSink, Pose, SharedState,
    SimWorld, TelemetryRecord, WheelCommand, WorldPoint, spawn_mission,
};

#[test]
fn test_straight_line_open_floor() {
    let config = test_config();
    let plan = straight_mission(100.0);
    let mut robot = sim_robot(&config, open_world(), plan.initial_pose);
    let mut records: Vec<TelemetryRecord> = Vec::new();

    let result = Navigator::new(config.clone()).navigate(&mut robot, &plan, &mut records);

    assert!(result.success, "mission failed: {:?}", result.failure);
    assert_eq!(result.final_state, MissionState::Succeeded);
    assert_eq!(result.goals_reached, 1);
    assert_eq!(result.collisions, 0);
    assert!(result.ticks < 600, "took {} ticks", result.ticks);

    // Heading never needs correcting on a straight run
    assert!(records.iter().all(|r| r.pose.heading_deg.abs() < 1e-3));
    // Ramp starts at the start-minimum speed and grows
    let first = records[0].wheels.left;
    assert!((first - config.control.start_min_speed).abs() < 1e-3);
    let fastest = records
        .iter()
        .map(|r| r.wheels.left)
        .fold(0.0f32, f32::max);
    assert!(fastest > first);

    let truth = robot.true_pose();
    assert!(truth.distance_to(&WorldPoint::new(100.0, 0.0)) < 8.0);
    assert_eq!(robot.last_command(), WheelCommand::STOP);
    assert_eq!(robot.indicator(), Some(Indicator::Success));
}

#[test]
fn test_waypoints_visited_in_order() {
    let config = test_config();
    let waypoints = vec![WorldPoint::new(80.0, 0.0), WorldPoint::new(160.0, 40.0)];
    let plan = MissionPlan::new(Pose::new(0.0, 0.0, 0.0), WorldPoint::new(240.0, 40.0))
        .with_waypoints(waypoints);
    let mut robot = sim_robot(&config, open_world(), plan.initial_pose);
    let mut records: Vec<TelemetryRecord> = Vec::new();

    let result = Navigator::new(config).navigate(&mut robot, &plan, &mut records);

    assert!(result.success, "mission failed: {:?}", result.failure);
    assert_eq!(result.goals_reached, 3);
    assert_eq!(result.total_goals, 3);

    let mut seen: Vec<usize> = Vec::new();
    for record in &records {
        if seen.last() != Some(&record.goal_index) {
            seen.push(record.goal_index);
        }
    }
    assert_eq!(seen, vec![0, 1, 2]);
}

#[test]
fn test_every_law_reaches_goal() {
    for law in marga_nav::PotentialLaw::ALL {
        let config = test_config();
        let plan = straight_mission(120.0).with_law(law);
        let mut robot = sim_robot(&config, open_world(), plan.initial_pose);
        let result = Navigator::new(config).navigate(&mut robot, &plan, &mut NullSink);
        assert!(result.success, "{} failed: {:?}", law, result.failure);
    }
}

#[test]
fn test_collision_budget_exhausted() {
    let mut config = test_config();
    config.mission.max_collisions = 5;
    let plan = straight_mission(100.0);
    let mut robot = ScriptedRobot::always_bumping();

    let result = Navigator::new(config).navigate(&mut robot, &plan, &mut NullSink);

    assert!(!result.success);
    assert_eq!(result.collisions, 5);
    assert_eq!(
        result.failure,
        Some(FailureReason::CollisionLimit { collisions: 5 })
    );
    assert_eq!(result.final_state, MissionState::Failed);
    // Recovery reverses after every trip but the last
    assert_eq!(robot.reverse_commands(), 4);
    assert_eq!(robot.last_command(), Some(WheelCommand::STOP));
}

#[test]
fn test_interface_fault_stops_wheels() {
    let config = test_config();
    let plan = straight_mission(100.0);
    let mut robot = ScriptedRobot {
        fail_ir_after: Some(3),
        ..ScriptedRobot::default()
    };

    let result = Navigator::new(config).navigate(&mut robot, &plan, &mut NullSink);

    assert!(!result.success);
    assert!(matches!(result.failure, Some(FailureReason::RobotFault(_))));
    assert_eq!(robot.ir_reads, 3);
    assert_eq!(robot.last_command(), Some(WheelCommand::STOP));
}

#[test]
fn test_panic_in_loop_stops_wheels_and_propagates() {
    let config = test_config();
    let plan = straight_mission(100.0);
    let shared = Arc::new(SharedState::new());
    let navigator = Navigator::new(config).with_shared(Arc::clone(&shared));
    let mut robot = ScriptedRobot {
        panic_ir_after: Some(3),
        ..ScriptedRobot::default()
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        navigator.navigate(&mut robot, &plan, &mut NullSink)
    }));

    assert!(outcome.is_err());
    assert_eq!(robot.ir_reads, 3);
    // Driving forward when the read blew up
    assert!(!robot.moving_commands().is_empty());
    assert_eq!(robot.last_command(), Some(WheelCommand::STOP));
    assert!(shared.is_finished());
    let status = shared.snapshot();
    assert_eq!(status.state, MissionState::Failed);
    assert_eq!(status.wheels, WheelCommand::STOP);
}

#[test]
fn test_final_approach_nudges_towards_goal() {
    let config = test_config();
    let mission = config.mission.clone();
    let half_track = config.robot.half_track();
    // Inside the arrival tolerance but 4 cm short and 1 cm to the left
    let goal = WorldPoint::new(4.0, 1.0);
    let plan = MissionPlan::new(Pose::default(), goal);
    let mut robot = ScriptedRobot::default();

    let result = Navigator::new(config).navigate(&mut robot, &plan, &mut NullSink);

    assert!(result.success, "mission failed: {:?}", result.failure);
    assert_eq!(result.goals_reached, 1);
    assert_eq!(result.ticks, 1);

    // Stop on arrival, one nudge, stop after the nudge, stop at the end
    assert_eq!(robot.commands.len(), 4);
    assert!(robot.commands[0].is_stopped());
    assert!(robot.commands[2..].iter().all(|c| c.is_stopped()));
    let nudge = robot.commands[1];

    let distance = 17.0f32.sqrt();
    let error = 1.0f32.atan2(4.0);
    let v = (mission.nudge_speed_gain * distance).max(mission.nudge_min_speed);
    let omega = mission.nudge_angular_gain * error;
    assert_relative_eq!(nudge.left, v - half_track * omega, epsilon = 1e-3);
    assert_relative_eq!(nudge.right, v + half_track * omega, epsilon = 1e-3);
    // Forward and turning left, towards the goal
    assert!(nudge.left > 0.0 && nudge.right > nudge.left);
    assert_relative_eq!(
        result.elapsed_secs,
        mission.nudge_secs + mission.settle_secs,
        epsilon = 1e-4
    );
}

#[test]
fn test_final_approach_skips_nudge_behind_or_too_close() {
    let config = test_config();
    let min_distance = config.mission.nudge_min_distance;
    for goal in [
        // Behind the robot: heading error of 180°
        WorldPoint::new(-4.0, 0.0),
        // Already within the nudge threshold
        WorldPoint::new(min_distance * 0.75, 0.0),
    ] {
        let plan = MissionPlan::new(Pose::default(), goal);
        let mut robot = ScriptedRobot::default();

        let result = Navigator::new(config.clone()).navigate(&mut robot, &plan, &mut NullSink);

        assert!(result.success, "goal {:?}: {:?}", goal, result.failure);
        assert!(
            robot.moving_commands().is_empty(),
            "goal {:?} moved: {:?}",
            goal,
            robot.commands
        );
        assert_eq!(result.elapsed_secs, 0.0);
    }
}

#[test]
fn test_stop_request_cancels_mission() {
    let config = test_config();
    let plan = straight_mission(100.0);
    let mut robot = sim_robot(&config, open_world(), plan.initial_pose);
    let shared = Arc::new(SharedState::new());
    shared.request_stop();

    let result = Navigator::new(config)
        .with_shared(Arc::clone(&shared))
        .navigate(&mut robot, &plan, &mut NullSink);

    assert!(!result.success);
    assert_eq!(result.failure, Some(FailureReason::Cancelled));
    assert_eq!(result.ticks, 0);
    assert_eq!(robot.last_command(), WheelCommand::STOP);
    assert!(shared.is_finished());
    assert_eq!(shared.snapshot().state, MissionState::Failed);
}

#[test]
fn test_time_budget() {
    let mut config = test_config();
    config.mission.max_duration_secs = Some(2.0);
    let plan = straight_mission(1000.0);
    let mut robot = sim_robot(&config, open_world(), plan.initial_pose);

    let result = Navigator::new(config).navigate(&mut robot, &plan, &mut NullSink);

    assert_eq!(result.failure, Some(FailureReason::Timeout));
    assert!(result.elapsed_secs >= 2.0);
    assert_eq!(robot.last_command(), WheelCommand::STOP);
}

#[test]
fn test_pose_dropouts_are_skipped() {
    let config = test_config();
    let world = SimWorld {
        pose_dropout_every: Some(4),
        ..SimWorld::default()
    };
    let plan = straight_mission(100.0);
    let mut robot = sim_robot(&config, world, plan.initial_pose);

    let result = Navigator::new(config).navigate(&mut robot, &plan, &mut NullSink);

    assert!(result.success, "mission failed: {:?}", result.failure);
    assert!(result.skipped_ticks > 0);
}

#[test]
fn test_odometry_heading_bias_is_removed() {
    let config = test_config();
    let world = SimWorld {
        odometry_heading_bias_deg: 45.0,
        ..SimWorld::default()
    };
    let start = Pose::new(20.0, -30.0, 90.0);
    let goal = WorldPoint::new(20.0, 70.0);
    let plan = MissionPlan::new(start, goal);
    let mut robot = sim_robot(&config, world, start);

    let result = Navigator::new(config).navigate(&mut robot, &plan, &mut NullSink);

    assert!(result.success, "mission failed: {:?}", result.failure);
    assert!(robot.true_pose().distance_to(&goal) < 8.0);
    assert!((result.final_pose.x - robot.true_pose().x).abs() < 0.5);
    assert!((result.final_pose.y - robot.true_pose().y).abs() < 0.5);
}

#[test]
fn test_avoids_post_on_the_way() {
    let config = test_config();
    let plan = straight_mission(200.0);
    let mut robot = sim_robot(&config, post_world(100.0, 12.0, 8.0), plan.initial_pose);
    let mut records: Vec<TelemetryRecord> = Vec::new();

    let result = Navigator::new(config).navigate(&mut robot, &plan, &mut records);

    assert!(result.success, "mission failed: {:?}", result.failure);
    assert!(records.iter().any(|r| r.num_obstacles > 0));
    assert!(records.iter().any(|r| !r.repulsive.is_zero()));
}

#[test]
fn test_spawned_mission_reports_through_shared_state() {
    let config = test_config();
    let plan = straight_mission(80.0);
    let robot = sim_robot(&config, open_world(), plan.initial_pose);
    let shared = Arc::new(SharedState::new());
    let (tx, rx) = crossbeam_channel::unbounded::<TelemetryRecord>();

    let handle = spawn_mission(config, robot, plan, tx, Arc::clone(&shared)).unwrap();
    let (result, robot) = handle.join().unwrap();

    assert!(result.success, "mission failed: {:?}", result.failure);
    assert!(shared.is_finished());
    let status = shared.snapshot();
    assert_eq!(status.state, MissionState::Succeeded);
    assert_eq!(status.total_goals, 1);
    assert_eq!(status.wheels, WheelCommand::STOP);
    assert_eq!(status.ticks, result.ticks);
    assert_eq!(status.pose, result.final_pose);
    assert_eq!(status.goal_index, 0);
    assert_eq!(robot.last_command(), WheelCommand::STOP);

    let records: Vec<TelemetryRecord> = rx.try_iter().collect();
    assert!(!records.is_empty());
    assert!(records.len() as u64 <= result.ticks);
}
