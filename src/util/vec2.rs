use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// Ground-plane vector (world x, world z) for movement and range checks.
///
/// Height is never simulated by the core; it belongs to the physics
/// collaborator.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub z: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, z: 0.0 };

    #[inline]
    pub fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }

    /// Unit vector for an angle measured from +x towards +z
    #[inline]
    pub fn from_angle(angle: f32) -> Self {
        Self {
            x: angle.cos(),
            z: angle.sin(),
        }
    }

    #[inline]
    pub fn length(&self) -> f32 {
        (self.x * self.x + self.z * self.z).sqrt()
    }

    #[inline]
    pub fn length_sq(&self) -> f32 {
        self.x * self.x + self.z * self.z
    }

    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len > 0.0 {
            Self {
                x: self.x / len,
                z: self.z / len,
            }
        } else {
            Self::ZERO
        }
    }

    #[inline]
    pub fn distance_to(&self, other: Vec2) -> f32 {
        (*self - other).length()
    }

    #[inline]
    pub fn distance_sq_to(&self, other: Vec2) -> f32 {
        (*self - other).length_sq()
    }

    pub fn clamp_length(&self, max: f32) -> Self {
        let len = self.length();
        if len > max && len > 0.0 {
            *self * (max / len)
        } else {
            *self
        }
    }

    /// Yaw (rotation about the vertical axis) that faces `target`.
    ///
    /// Matches the renderer convention: yaw 0 looks down +z.
    pub fn yaw_towards(&self, target: Vec2) -> Option<f32> {
        let d = target - *self;
        if d.length_sq() > 0.01 {
            Some(d.x.atan2(d.z))
        } else {
            None
        }
    }

    /// Clamp each component into `[-half_extent, half_extent]`
    pub fn clamp_square(&self, half_extent: f32) -> Self {
        Self {
            x: self.x.clamp(-half_extent, half_extent),
            z: self.z.clamp(-half_extent, half_extent),
        }
    }
}

impl Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x + rhs.x,
            z: self.z + rhs.z,
        }
    }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self {
            x: self.x - rhs.x,
            z: self.z - rhs.z,
        }
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self {
            x: self.x * rhs,
            z: self.z * rhs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const EPSILON: f32 = 1e-5;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_length() {
        let v = Vec2::new(3.0, 4.0);
        assert!(approx_eq(v.length(), 5.0));
        assert!(approx_eq(v.length_sq(), 25.0));
    }

    #[test]
    fn test_normalize_zero() {
        assert_eq!(Vec2::ZERO.normalize(), Vec2::ZERO);
    }

    #[test]
    fn test_distance() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(3.0, 4.0);
        assert!(approx_eq(a.distance_to(b), 5.0));
        assert!(approx_eq(a.distance_sq_to(b), 25.0));
    }

    #[test]
    fn test_clamp_length() {
        let clamped = Vec2::new(6.0, 8.0).clamp_length(5.0);
        assert!(approx_eq(clamped.x, 3.0));
        assert!(approx_eq(clamped.z, 4.0));
    }

    #[test]
    fn test_yaw_towards() {
        let origin = Vec2::ZERO;
        assert!(approx_eq(origin.yaw_towards(Vec2::new(0.0, 5.0)).unwrap(), 0.0));
        assert!(approx_eq(origin.yaw_towards(Vec2::new(5.0, 0.0)).unwrap(), PI / 2.0));
        assert!(origin.yaw_towards(Vec2::new(0.01, 0.0)).is_none());
    }

    #[test]
    fn test_clamp_square() {
        let v = Vec2::new(150.0, -120.0).clamp_square(100.0);
        assert_eq!(v, Vec2::new(100.0, -100.0));
    }

    #[test]
    fn test_ops() {
        let a = Vec2::new(1.0, 2.0) + Vec2::new(3.0, 4.0);
        assert_eq!(a, Vec2::new(4.0, 6.0));
        assert_eq!((a - Vec2::new(1.0, 1.0)) * 2.0, Vec2::new(6.0, 10.0));
    }
}
