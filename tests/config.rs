//! Shipped configuration and demo mission files stay loadable.

use std::path::Path;

use serde::Deserialize;

use marga_nav::{MissionPlan, NavConfig, PotentialLaw, Shape, SimWorld};

#[derive(Debug, Deserialize)]
struct MissionFile {
    mission: MissionPlan,
    #[serde(default)]
    simulation: SimWorld,
}

fn load_mission(name: &str) -> MissionFile {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos").join(name);
    let content = std::fs::read_to_string(&path).unwrap();
    let file: MissionFile = toml::from_str(&content).unwrap();
    file.simulation.validate().unwrap();
    file
}

#[test]
fn test_shipped_config_matches_defaults() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("marga.toml");
    let config = NavConfig::load(&path).unwrap();
    let defaults = NavConfig::default();

    assert_eq!(config.robot.wheel_base, defaults.robot.wheel_base);
    assert_eq!(config.sensors.sensitivity, defaults.sensors.sensitivity);
    assert_eq!(config.trap.sensor_count, defaults.trap.sensor_count);
    assert_eq!(config.mission.max_collisions, defaults.mission.max_collisions);
    assert_eq!(config.mission.max_duration_secs, None);
}

#[test]
fn test_slalom_demo_parses() {
    let file = load_mission("slalom.toml");
    file.mission.validate().unwrap();
    assert_eq!(file.mission.law, PotentialLaw::Linear);
    assert_eq!(file.mission.goals().len(), 3);
    assert_eq!(file.simulation.obstacles.len(), 3);
    assert!(matches!(file.simulation.obstacles[2], Shape::Wall { .. }));
}

#[test]
fn test_drift_demo_parses() {
    let file = load_mission("drift.toml");
    file.mission.validate().unwrap();
    assert_eq!(file.mission.law, PotentialLaw::Exponential);
    assert_eq!(file.mission.influence_radius, Some(80.0));
    assert_eq!(file.simulation.pose_dropout_every, Some(7));
    assert_eq!(file.simulation.odometry_heading_bias_deg, 30.0);
    assert!(file.simulation.obstacles.is_empty());
}

#[test]
fn test_invalid_values_rejected() {
    let err = NavConfig::from_toml("[control]\ndt_secs = 0.0\n");
    assert!(err.is_err());
    let err = NavConfig::from_toml("[sensors]\ndetect_threshold = 500.0\n");
    assert!(err.is_err());
}
#[test]
fn test_non_finite_durations_rejected() {
    let err = NavConfig::from_toml("[mission]\nreverse_secs = inf\n");
    assert!(err.is_err());
    let err = NavConfig::from_toml("[mission]\nrecovery_pause_secs = nan\n");
    assert!(err.is_err());
}

#[test]
fn test_unusable_simulation_rejected() {
    let file: MissionFile = toml::from_str(
        r#"
        [mission]
        initial_pose = { x = 0.0, y = 0.0, heading_deg = 0.0 }
        final_goal = { x = 100.0, y = 0.0 }

        [simulation]
        physics_step_secs = 0.0
        "#,
    )
    .unwrap();
    file.mission.validate().unwrap();
    assert!(file.simulation.validate().is_err());
}
