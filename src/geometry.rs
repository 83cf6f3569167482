//! Planar geometry primitives.
//!
//! All positions are in centimetres in the world frame. Headings on [`Pose`]
//! are kept in degrees because that is what the robot reports; everything
//! inside the controller works in radians.

use serde::Deserialize;
use std::ops::{Add, AddAssign, Mul, Sub};

use crate::utils::normalize_degrees;

/// A point in the world frame (cm).
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
pub struct WorldPoint {
    pub x: f32,
    pub y: f32,
}

impl WorldPoint {
    pub const ZERO: WorldPoint = WorldPoint { x: 0.0, y: 0.0 };

    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn distance(&self, other: &WorldPoint) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Bearing from this point towards `other`, radians.
    #[inline]
    pub fn bearing_to(&self, other: &WorldPoint) -> f32 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    /// Point reached by travelling `distance` along `angle` (radians).
    #[inline]
    pub fn offset(&self, angle: f32, distance: f32) -> WorldPoint {
        WorldPoint::new(
            self.x + distance * angle.cos(),
            self.y + distance * angle.sin(),
        )
    }
}

impl Sub for WorldPoint {
    type Output = Vector2;

    fn sub(self, rhs: WorldPoint) -> Vector2 {
        Vector2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Robot pose in the world frame.
///
/// `heading_deg` is always normalized to (-180, 180].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    pub heading_deg: f32,
}

impl Pose {
    pub fn new(x: f32, y: f32, heading_deg: f32) -> Self {
        Self {
            x,
            y,
            heading_deg: normalize_degrees(heading_deg),
        }
    }

    #[inline]
    pub fn position(&self) -> WorldPoint {
        WorldPoint::new(self.x, self.y)
    }

    #[inline]
    pub fn heading_rad(&self) -> f32 {
        self.heading_deg.to_radians()
    }

    #[inline]
    pub fn distance_to(&self, point: &WorldPoint) -> f32 {
        self.position().distance(point)
    }
}

// Mission files write poses as `{ x, y, heading_deg }`; normalize on the way in.
impl<'de> Deserialize<'de> for Pose {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawPose {
            x: f32,
            y: f32,
            #[serde(default)]
            heading_deg: f32,
        }

        let raw = RawPose::deserialize(deserializer)?;
        Ok(Pose::new(raw.x, raw.y, raw.heading_deg))
    }
}

/// A planar force or velocity vector.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Vector of length `magnitude` pointing along `angle` (radians).
    #[inline]
    pub fn from_polar(magnitude: f32, angle: f32) -> Self {
        Self::new(magnitude * angle.cos(), magnitude * angle.sin())
    }

    #[inline]
    pub fn magnitude(&self) -> f32 {
        self.x.hypot(self.y)
    }

    #[inline]
    pub fn angle(&self) -> f32 {
        self.y.atan2(self.x)
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

impl Add for Vector2 {
    type Output = Vector2;

    fn add(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vector2 {
    fn add_assign(&mut self, rhs: Vector2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Mul<f32> for Vector2 {
    type Output = Vector2;

    fn mul(self, rhs: f32) -> Vector2 {
        Vector2::new(self.x * rhs, self.y * rhs)
    }
}
