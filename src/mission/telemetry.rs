//! Per-tick telemetry records and where they go.
//!
//! The mission loop hands every record to a [`TelemetrySink`]. Sinks must
//! never block the control loop: the channel sink drops records when the
//! consumer falls behind.

use crossbeam_channel::{Sender, TrySendError};

use crate::control::{ControlStep, SafetyLevel, WheelCommand};
use crate::geometry::{Pose, Vector2};

/// Snapshot of one control tick.
#[derive(Clone, Debug, PartialEq)]
pub struct TelemetryRecord {
    pub tick: u64,
    /// Mission time (s)
    pub elapsed_secs: f32,
    pub goal_index: usize,
    pub pose: Pose,
    pub distance_to_goal: f32,
    pub wheels: WheelCommand,
    pub attractive: Vector2,
    pub repulsive: Vector2,
    pub num_obstacles: usize,
    pub safety_level: SafetyLevel,
    pub trapped: bool,
    pub v_max_allowed: f32,
    pub navigable_gap: bool,
}

impl TelemetryRecord {
    pub fn from_step(
        tick: u64,
        elapsed_secs: f32,
        goal_index: usize,
        pose: Pose,
        step: &ControlStep,
    ) -> Self {
        Self {
            tick,
            elapsed_secs,
            goal_index,
            pose,
            distance_to_goal: step.distance_to_goal,
            wheels: step.wheels,
            attractive: step.attractive,
            repulsive: step.repulsive,
            num_obstacles: step.num_obstacles(),
            safety_level: step.safety_level(),
            trapped: step.is_trapped(),
            v_max_allowed: step.safety.v_max_allowed,
            navigable_gap: step.navigable_gap(),
        }
    }
}

/// Receives telemetry from the mission loop.
pub trait TelemetrySink {
    fn record(&mut self, record: &TelemetryRecord);
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn record(&mut self, _record: &TelemetryRecord) {}
}

impl TelemetrySink for Vec<TelemetryRecord> {
    fn record(&mut self, record: &TelemetryRecord) {
        self.push(record.clone());
    }
}

impl TelemetrySink for Sender<TelemetryRecord> {
    fn record(&mut self, record: &TelemetryRecord) {
        match self.try_send(record.clone()) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(_)) => {
                tracing::trace!("Telemetry channel full, dropping tick {}", record.tick);
            }
        }
    }
}

/// Aggregate view over a stream of records.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TelemetrySummary {
    pub records: u64,
    pub trapped_ticks: u64,
    /// Most restrictive level seen
    pub worst_level: SafetyLevel,
    pub max_obstacles: usize,
    /// Path length from consecutive poses (cm)
    pub distance_travelled: f32,
    last_pose: Option<Pose>,
}

impl TelemetrySummary {
    pub fn absorb(&mut self, record: &TelemetryRecord) {
        self.records += 1;
        if record.trapped {
            self.trapped_ticks += 1;
        }
        // Trapped is a relabel, not a harsher ceiling
        if record.safety_level != SafetyLevel::Trapped && record.safety_level > self.worst_level {
            self.worst_level = record.safety_level;
        }
        self.max_obstacles = self.max_obstacles.max(record.num_obstacles);
        if let Some(last) = self.last_pose {
            self.distance_travelled += last.distance_to(&record.pose.position());
        }
        self.last_pose = Some(record.pose);
    }
}
