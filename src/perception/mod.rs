//! IR perception: raw intensities to distances, obstacles, and gaps.

mod gaps;
mod ir;

pub use gaps::{Gap, GapDetector, widest_navigable};
pub use ir::{IrFrame, NormalizedReadings, Obstacle, SensorCalibration};

/// Sensors on the forward arc used by the safety governor.
pub const FRONT_SENSORS: [usize; 3] = [2, 3, 4];

/// Left-side sensors, outermost first.
pub const LEFT_SENSORS: [usize; 2] = [0, 1];

/// Right-side sensors, innermost first.
pub const RIGHT_SENSORS: [usize; 2] = [5, 6];

/// Outermost sensor on each side.
pub const OUTER_SENSORS: [usize; 2] = [0, 6];
