//! Running a mission on its own thread.
//!
//! The mission loop must never wait on a logger or UI, so it gets a
//! dedicated thread. It owns the robot for the duration of the mission and
//! hands it back on join. Observers only see [`SharedState`].

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::NavConfig;
use crate::error::{NavError, Result};
use crate::mission::{MissionPlan, MissionResult, Navigator, TelemetrySink};
use crate::robot::RobotInterface;
use crate::shared::SharedState;

/// Handle to a running mission.
pub struct MissionHandle<R> {
    handle: JoinHandle<(MissionResult, R)>,
    shared: Arc<SharedState>,
}

impl<R> MissionHandle<R> {
    pub fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    /// Ask the mission to stop; it zeroes the wheels on its next tick.
    pub fn request_stop(&self) {
        self.shared.request_stop();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the mission and take the robot back.
    pub fn join(self) -> Result<(MissionResult, R)> {
        self.handle
            .join()
            .map_err(|_| NavError::Thread("mission thread panicked".to_string()))
    }
}

/// Spawn the mission loop on a thread named `mission`.
pub fn spawn_mission<R, S>(
    config: NavConfig,
    mut robot: R,
    plan: MissionPlan,
    mut sink: S,
    shared: Arc<SharedState>,
) -> Result<MissionHandle<R>>
where
    R: RobotInterface + Send + 'static,
    S: TelemetrySink + Send + 'static,
{
    let navigator = Navigator::new(config).with_shared(Arc::clone(&shared));
    let handle = thread::Builder::new()
        .name("mission".into())
        .spawn(move || {
            tracing::info!("Mission thread started");
            let result = navigator.navigate(&mut robot, &plan, &mut sink);
            tracing::info!("Mission thread finished");
            (result, robot)
        })
        .map_err(|e| NavError::Thread(format!("failed to spawn mission thread: {}", e)))?;

    Ok(MissionHandle { handle, shared })
}
