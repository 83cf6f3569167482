//! IR proximity readings to distances and obstacles.
//!
//! The sensors report reflected intensity, not range. Each sensor's raw
//! reading is divided by its sensitivity factor so that all seven share one
//! empirical power-law distance model:
//!
//! ```text
//! d ≈ 5 · (1000 / I)^0.65     (0.70 for weak readings below 60)
//! ```
//!
//! clamped to the configured range and stretched for sensors mounted at a
//! steep angle, whose beam meets surfaces obliquely.

use crate::config::{IR_SENSOR_COUNT, SensorConfig};
use crate::geometry::{Pose, WorldPoint};

/// Distance reported at saturation intensity (cm).
const REFERENCE_DISTANCE: f32 = 5.0;
/// Intensity at and above which the sensor is saturated.
const SATURATION_INTENSITY: f32 = 1000.0;
/// Readings below this are treated as no echo.
const NO_ECHO_INTENSITY: f32 = 25.0;
/// Readings below this use the weak-signal exponent.
const WEAK_INTENSITY: f32 = 60.0;
const EXPONENT: f32 = 0.65;
const WEAK_EXPONENT: f32 = 0.70;

/// One tick of raw IR intensities, left to right.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IrFrame(pub [u16; IR_SENSOR_COUNT]);

impl IrFrame {
    pub fn new(raw: [u16; IR_SENSOR_COUNT]) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(&self, index: usize) -> u16 {
        self.0[index]
    }
}

/// Intensities after sensitivity correction.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NormalizedReadings(pub [f32; IR_SENSOR_COUNT]);

impl NormalizedReadings {
    #[inline]
    pub fn get(&self, index: usize) -> f32 {
        self.0[index]
    }

    /// Strongest reading across all sensors.
    pub fn max(&self) -> f32 {
        self.0.iter().copied().fold(0.0, f32::max)
    }

    /// Strongest reading across the given sensors.
    pub fn max_of(&self, indices: &[usize]) -> f32 {
        indices.iter().map(|&i| self.0[i]).fold(0.0, f32::max)
    }

    /// Number of sensors at or above `threshold`.
    pub fn count_at_least(&self, threshold: f32) -> usize {
        self.0.iter().filter(|&&v| v >= threshold).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.0.iter().copied().enumerate()
    }
}

/// Obstacle estimated from a single IR reading.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Obstacle {
    /// Sensor that produced the estimate
    pub sensor: usize,
    /// World-frame position
    pub position: WorldPoint,
    /// Estimated distance from the sensor window (cm)
    pub distance: f32,
    /// Normalized intensity
    pub strength: f32,
}

/// Fixed per-sensor calibration, loaded once.
#[derive(Clone, Debug)]
pub struct SensorCalibration {
    sensitivity: [f32; IR_SENSOR_COUNT],
    angles_rad: [f32; IR_SENSOR_COUNT],
    corrections: [f32; IR_SENSOR_COUNT],
    mounting_radius: f32,
    detect_threshold: f32,
    min_distance: f32,
    max_distance: f32,
}

impl SensorCalibration {
    pub fn new(config: &SensorConfig) -> Self {
        Self {
            sensitivity: config.sensitivity,
            angles_rad: config.angles_deg.map(f32::to_radians),
            corrections: config.angles_deg.map(oblique_correction),
            mounting_radius: config.mounting_radius,
            detect_threshold: config.detect_threshold,
            min_distance: config.min_distance,
            max_distance: config.max_distance,
        }
    }

    /// Mounting bearing relative to forward, radians (positive = left).
    #[inline]
    pub fn bearing(&self, index: usize) -> f32 {
        self.angles_rad[index]
    }

    #[inline]
    pub fn mounting_radius(&self) -> f32 {
        self.mounting_radius
    }

    #[inline]
    pub fn detect_threshold(&self) -> f32 {
        self.detect_threshold
    }

    pub fn normalize(&self, frame: &IrFrame) -> NormalizedReadings {
        let mut out = [0.0; IR_SENSOR_COUNT];
        for (i, value) in out.iter_mut().enumerate() {
            *value = f32::from(frame.raw(i)) / self.sensitivity[i];
        }
        NormalizedReadings(out)
    }

    /// Estimated distance (cm) from sensor `index` to the reflecting surface.
    pub fn estimate_distance(&self, index: usize, intensity: f32) -> f32 {
        if intensity < NO_ECHO_INTENSITY {
            return self.max_distance;
        }
        let base = if intensity >= SATURATION_INTENSITY {
            REFERENCE_DISTANCE
        } else {
            let exponent = if intensity >= WEAK_INTENSITY {
                EXPONENT
            } else {
                WEAK_EXPONENT
            };
            REFERENCE_DISTANCE * (SATURATION_INTENSITY / intensity).powf(exponent)
        };
        base.clamp(self.min_distance, self.max_distance) * self.corrections[index]
    }

    /// Normalized intensity that sensor `index` would report for a surface
    /// `distance` cm away. Zero when the surface is out of range.
    pub fn intensity_for_distance(&self, index: usize, distance: f32) -> f32 {
        let base = distance / self.corrections[index];
        if base >= self.max_distance {
            return 0.0;
        }
        if base <= REFERENCE_DISTANCE {
            return SATURATION_INTENSITY;
        }
        let ratio = base / REFERENCE_DISTANCE;
        let strong = SATURATION_INTENSITY / ratio.powf(1.0 / EXPONENT);
        if strong >= WEAK_INTENSITY {
            return strong;
        }
        // The two exponents leave a small band of distances with no exact
        // inverse; those map to just under the weak boundary.
        let weak = SATURATION_INTENSITY / ratio.powf(1.0 / WEAK_EXPONENT);
        weak.min(WEAK_INTENSITY - 0.01)
    }

    /// Raw reading sensor `index` would report for a surface `distance` cm away.
    pub fn raw_for_distance(&self, index: usize, distance: f32) -> u16 {
        let raw = self.intensity_for_distance(index, distance) * self.sensitivity[index];
        raw.round().clamp(0.0, f32::from(u16::MAX)) as u16
    }

    /// Obstacles for every reading at or above the detection threshold.
    pub fn obstacles(&self, pose: &Pose, readings: &NormalizedReadings) -> Vec<Obstacle> {
        let heading = pose.heading_rad();
        readings
            .iter()
            .filter(|&(_, intensity)| intensity >= self.detect_threshold)
            .map(|(i, intensity)| {
                let direction = heading + self.angles_rad[i];
                let distance = self.estimate_distance(i, intensity);
                let position = pose
                    .position()
                    .offset(direction, self.mounting_radius + distance);
                Obstacle {
                    sensor: i,
                    position,
                    distance,
                    strength: intensity,
                }
            })
            .collect()
    }
}

/// Range stretch for sensors whose beam meets surfaces at a steep angle.
fn oblique_correction(angle_deg: f32) -> f32 {
    let a = angle_deg.abs();
    if a > 50.0 {
        1.15
    } else if a > 30.0 {
        1.08
    } else if a > 15.0 {
        1.03
    } else {
        1.0
    }
}
