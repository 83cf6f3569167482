//! Mission execution: waypoint sequencing, state, and telemetry.

mod navigator;
mod state;
mod telemetry;

pub use navigator::{FailureReason, MissionPlan, MissionResult, Navigator};
pub use state::MissionState;
pub use telemetry::{NullSink, TelemetryRecord, TelemetrySink, TelemetrySummary};
