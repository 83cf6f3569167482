//! Navigable gap detection.
//!
//! A gap is a run of clear sensors bounded on both sides by strongly
//! reflecting ones. Both edge obstacles are placed in the robot frame and
//! the gap is navigable when the straight-line distance between them leaves
//! room for the body plus a manoeuvring margin.

use crate::config::{GapConfig, IR_SENSOR_COUNT, RobotConfig};
use crate::utils::normalize_degrees;

use super::ir::{NormalizedReadings, SensorCalibration};

/// A corridor between two obstacle-bearing sensors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gap {
    pub left_sensor: usize,
    pub right_sensor: usize,
    /// Distance between the two edge obstacles (cm)
    pub width_cm: f32,
    pub is_navigable: bool,
    /// Mean edge bearing in the world frame, degrees
    pub angle_deg: f32,
    pub left_distance: f32,
    pub right_distance: f32,
}

impl Gap {
    /// Whether `sensor` is one of this gap's edges.
    #[inline]
    pub fn has_edge(&self, sensor: usize) -> bool {
        sensor == self.left_sensor || sensor == self.right_sensor
    }
}

/// Finds gaps in a frame of normalized readings.
#[derive(Clone, Debug)]
pub struct GapDetector {
    config: GapConfig,
    min_width: f32,
    robot_diameter: f32,
}

impl GapDetector {
    pub fn new(config: &GapConfig, robot: &RobotConfig) -> Self {
        Self {
            config: config.clone(),
            min_width: robot.diameter + config.maneuver_margin,
            robot_diameter: robot.diameter,
        }
    }

    /// Width a gap must reach to be navigable (cm).
    #[inline]
    pub fn min_width(&self) -> f32 {
        self.min_width
    }

    /// Scan left to right; the first partner found for each left edge wins.
    pub fn detect(
        &self,
        calibration: &SensorCalibration,
        readings: &NormalizedReadings,
        heading_deg: f32,
    ) -> Vec<Gap> {
        let blocked = self.config.blocked_threshold;
        let clear = self.config.clear_threshold;
        let mut gaps = Vec::new();

        for i in 0..IR_SENSOR_COUNT {
            if readings.get(i) < blocked {
                continue;
            }
            let last = (i + self.config.max_span).min(IR_SENSOR_COUNT - 1);
            for j in (i + 1)..=last {
                if readings.get(j) < blocked {
                    continue;
                }
                if ((i + 1)..j).any(|k| readings.get(k) >= clear) {
                    continue;
                }

                let left_distance = calibration.estimate_distance(i, readings.get(i));
                let right_distance = calibration.estimate_distance(j, readings.get(j));
                let (lx, ly) = local_position(calibration, i, left_distance);
                let (rx, ry) = local_position(calibration, j, right_distance);
                let width_cm = (lx - rx).hypot(ly - ry);

                let mean_bearing =
                    (calibration.bearing(i) + calibration.bearing(j)).to_degrees() / 2.0;

                gaps.push(Gap {
                    left_sensor: i,
                    right_sensor: j,
                    width_cm,
                    is_navigable: width_cm >= self.min_width,
                    angle_deg: normalize_degrees(heading_deg + mean_bearing),
                    left_distance,
                    right_distance,
                });
                break;
            }
        }

        gaps
    }

    /// Speed-ceiling multiplier earned by the widest navigable gap.
    pub fn speed_boost(&self, gaps: &[Gap]) -> f32 {
        let Some(widest) = widest_navigable(gaps) else {
            return 1.0;
        };
        if widest > self.robot_diameter + self.config.wide_margin {
            self.config.wide_boost
        } else if widest > self.robot_diameter + self.config.moderate_margin {
            self.config.moderate_boost
        } else {
            1.0
        }
    }
}

/// Width of the widest navigable gap, if any.
pub fn widest_navigable(gaps: &[Gap]) -> Option<f32> {
    gaps.iter()
        .filter(|g| g.is_navigable)
        .map(|g| g.width_cm)
        .reduce(f32::max)
}

/// Obstacle position in the robot frame: x lateral (left positive), y forward.
fn local_position(calibration: &SensorCalibration, sensor: usize, distance: f32) -> (f32, f32) {
    let bearing = calibration.bearing(sensor);
    let reach = calibration.mounting_radius() + distance;
    (reach * bearing.sin(), reach * bearing.cos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SensorConfig;

    fn setup() -> (SensorCalibration, GapDetector) {
        (
            SensorCalibration::new(&SensorConfig::default()),
            GapDetector::new(&GapConfig::default(), &RobotConfig::default()),
        )
    }

    #[test]
    fn test_no_gaps_in_open_space() {
        let (cal, detector) = setup();
        let readings = NormalizedReadings([0.0; IR_SENSOR_COUNT]);
        assert!(detector.detect(&cal, &readings, 0.0).is_empty());
    }

    #[test]
    fn test_wide_flank_gap_is_navigable() {
        let (cal, detector) = setup();
        let readings = NormalizedReadings([101.0, 0.0, 10.0, 101.0, 0.0, 0.0, 0.0]);
        let gaps = detector.detect(&cal, &readings, 30.0);

        assert_eq!(gaps.len(), 1);
        let gap = gaps[0];
        assert_eq!((gap.left_sensor, gap.right_sensor), (0, 3));
        assert!(
            gap.is_navigable,
            "width {} should exceed {}",
            gap.width_cm,
            detector.min_width()
        );
        assert!((gap.angle_deg - (30.0 + (65.3 - 3.0) / 2.0)).abs() < 1e-3);
        assert!(gap.has_edge(0) && gap.has_edge(3) && !gap.has_edge(1));
        assert!(detector.speed_boost(&gaps) > 1.0);
    }

    #[test]
    fn test_adjacent_blocked_sensors_are_too_narrow() {
        let (cal, detector) = setup();
        let readings = NormalizedReadings([200.0; IR_SENSOR_COUNT]);
        let gaps = detector.detect(&cal, &readings, 0.0);

        // Every left edge pairs with its neighbour; none leave room to pass
        assert_eq!(gaps.len(), IR_SENSOR_COUNT - 1);
        assert!(gaps.iter().all(|g| g.right_sensor == g.left_sensor + 1));
        assert!(gaps.iter().all(|g| !g.is_navigable));
        assert!(widest_navigable(&gaps).is_none());
        assert_eq!(detector.speed_boost(&gaps), 1.0);
    }

    #[test]
    fn test_reflecting_sensor_between_edges_breaks_gap() {
        let (cal, detector) = setup();
        let readings = NormalizedReadings([150.0, 80.0, 0.0, 150.0, 0.0, 0.0, 0.0]);
        let gaps = detector.detect(&cal, &readings, 0.0);
        assert!(gaps.iter().all(|g| g.left_sensor != 0));
    }

    #[test]
    fn test_partner_beyond_span_is_ignored() {
        let (cal, detector) = setup();
        let readings = NormalizedReadings([150.0, 0.0, 0.0, 0.0, 150.0, 0.0, 0.0]);
        assert!(detector.detect(&cal, &readings, 0.0).is_empty());
    }
}
