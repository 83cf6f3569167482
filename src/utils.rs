//! Angle helpers shared by the controller and the simulator.

use std::f32::consts::PI;

/// Wrap an angle in radians to (-π, π].
#[inline]
pub fn wrap_pi(angle: f32) -> f32 {
    let mut a = angle;
    while a > PI {
        a -= 2.0 * PI;
    }
    while a <= -PI {
        a += 2.0 * PI;
    }
    a
}

/// Wrap an angle in degrees to (-180, 180].
#[inline]
pub fn normalize_degrees(angle_deg: f32) -> f32 {
    let mut a = angle_deg;
    while a > 180.0 {
        a -= 360.0;
    }
    while a <= -180.0 {
        a += 360.0;
    }
    a
}
