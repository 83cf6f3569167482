//! MargaNav - run a waypoint mission against the simulated robot
//!
//! Usage: `marga-nav <mission.toml> [--config nav.toml] [--law linear|quadratic|conic|exponential]`
//!
//! The mission file holds a `[mission]` table (initial pose, waypoints,
//! final goal, potential law) and an optional `[simulation]` table
//! describing obstacles. Without `--config`, `marga.toml` is used when
//! present, otherwise the built-in defaults.
//!
//! ## Threads
//!
//! - **Mission thread**: fixed-period control loop, owns the robot
//! - **Telemetry thread**: drains per-tick records into a summary
//! - **Main thread**: progress reporting and Ctrl-C handling

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info, warn};

use marga_nav::{
    MissionPlan, NavConfig, NavError, PotentialLaw, Result, SharedState, SimWorld, SimulatedRobot,
    TelemetryRecord, TelemetrySummary, spawn_mission,
};

/// Bound on buffered telemetry records before the mission starts dropping.
const TELEMETRY_BUFFER: usize = 256;

#[derive(Debug, Deserialize)]
struct MissionFile {
    mission: MissionPlan,
    #[serde(default)]
    simulation: SimWorld,
}

impl MissionFile {
    fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: MissionFile = toml::from_str(&content)?;
        file.simulation.validate()?;
        Ok(file)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(
                    "marga_nav=info"
                        .parse::<tracing_subscriber::filter::Directive>()
                        .map_err(|e| NavError::Config(format!("invalid log directive: {}", e)))?,
                ),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mission_path = args
        .get(1)
        .filter(|a| !a.starts_with("--"))
        .ok_or_else(|| {
            NavError::Config(
                "usage: marga-nav <mission.toml> [--config nav.toml] [--law name]".to_string(),
            )
        })?;
    let option = |name: &str| {
        args.iter()
            .position(|a| a == name)
            .and_then(|i| args.get(i + 1))
            .cloned()
    };

    let config = match option("--config") {
        Some(path) => {
            info!("Loading configuration from {}", path);
            NavConfig::load(Path::new(&path))?
        }
        None if Path::new("marga.toml").exists() => {
            info!("Loading configuration from marga.toml");
            NavConfig::load(Path::new("marga.toml"))?
        }
        None => {
            info!("Using default configuration");
            NavConfig::default()
        }
    };

    info!("Loading mission from {}", mission_path);
    let MissionFile {
        mut mission,
        simulation,
    } = MissionFile::load(Path::new(mission_path))?;
    if let Some(law) = option("--law") {
        mission.law = law.parse::<PotentialLaw>()?;
    }
    mission.validate()?;

    info!("MargaNav v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Robot: diameter {:.1}cm, wheel base {:.1}cm, max wheel speed {:.0}cm/s",
        config.robot.diameter, config.robot.wheel_base, config.robot.max_wheel_speed
    );
    info!(
        "Mission: {} waypoint(s) + final goal ({:.1}, {:.1}), law={}, {} obstacle(s)",
        mission.waypoints.len(),
        mission.final_goal.x,
        mission.final_goal.y,
        mission.law,
        simulation.obstacles.len()
    );

    let shared = Arc::new(SharedState::new());
    let stop_state = Arc::clone(&shared);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        stop_state.request_stop();
    })
    .map_err(|e| NavError::Config(format!("Error setting Ctrl-C handler: {}", e)))?;

    // Telemetry consumer: never blocks the mission, drops when behind
    let (telemetry_tx, telemetry_rx) =
        crossbeam_channel::bounded::<TelemetryRecord>(TELEMETRY_BUFFER);
    let telemetry = thread::Builder::new()
        .name("telemetry".into())
        .spawn(move || {
            let mut summary = TelemetrySummary::default();
            for record in telemetry_rx {
                summary.absorb(&record);
            }
            summary
        })
        .map_err(|e| NavError::Thread(format!("failed to spawn telemetry thread: {}", e)))?;

    let robot = SimulatedRobot::new(&config, simulation, mission.initial_pose);
    let handle = spawn_mission(config, robot, mission, telemetry_tx, Arc::clone(&shared))?;

    let check_interval = Duration::from_millis(500);
    while !handle.is_finished() {
        thread::sleep(check_interval);
        let status = shared.snapshot();
        info!(
            "{} | pose ({:.1}, {:.1}, {:.0}°) | wheels ({:.1}, {:.1}) | goal {}/{} | collisions {}",
            status.state,
            status.pose.x,
            status.pose.y,
            status.pose.heading_deg,
            status.wheels.left,
            status.wheels.right,
            (status.goal_index + 1).min(status.total_goals),
            status.total_goals,
            status.collisions
        );
    }

    let (result, robot) = handle.join()?;
    let summary = match telemetry.join() {
        Ok(summary) => summary,
        Err(_) => {
            error!("Telemetry thread panicked");
            TelemetrySummary::default()
        }
    };

    let truth = robot.true_pose();
    info!(
        "Ticks: {} ({} skipped), simulated time {:.1}s, path {:.1}cm",
        result.ticks, result.skipped_ticks, result.elapsed_secs, summary.distance_travelled
    );
    info!(
        "Worst safety level {}, trapped for {} tick(s), up to {} obstacle(s) in view",
        summary.worst_level, summary.trapped_ticks, summary.max_obstacles
    );
    info!(
        "Final pose ({:.1}, {:.1}, {:.1}°), ground truth ({:.1}, {:.1}, {:.1}°)",
        result.final_pose.x,
        result.final_pose.y,
        result.final_pose.heading_deg,
        truth.x,
        truth.y,
        truth.heading_deg
    );

    match &result.failure {
        None => info!(
            "Mission succeeded: {}/{} goals, {} collision(s)",
            result.goals_reached, result.total_goals, result.collisions
        ),
        Some(reason) => warn!(
            "Mission failed: {} ({}/{} goals)",
            reason, result.goals_reached, result.total_goals
        ),
    }

    info!("MargaNav finished");
    Ok(())
}
