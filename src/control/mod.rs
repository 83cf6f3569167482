//! Potential-field control: forces, safety ceiling, and wheel projection.

mod attractive;
mod combiner;
mod controller;
mod repulsive;
mod safety;
mod trap;

pub use attractive::{
    AttractiveField, PotentialLaw, VelocityRamp, attractive_force, shape_speed,
};
pub use combiner::{
    Blend, KinematicProjector, Projection, WheelCommand, blend_heading, guard_lateral_turn,
    heading_speed_factor, lateral_clearance_factor,
};
pub use controller::{ControlStep, PotentialFieldController};
pub use repulsive::{RepulsiveGains, RepulsiveModel};
pub use safety::{SafetyAssessment, SafetyGovernor, SafetyLevel};
pub use trap::{GainProfile, Gains, TrapDetector, TrapStatus};
