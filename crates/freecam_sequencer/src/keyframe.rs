// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframe transitions, channel value types and interpolation math.

use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};
use std::fmt;
use std::str::FromStr;

/// Interpolation used to approach a keyframe from its predecessor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum InterpolationMode {
    /// Step: hold the previous value until this keyframe's time
    None,
    /// Component-wise linear interpolation
    Linear,
    /// Catmull-Rom cubic Hermite spline
    #[default]
    CubicHermite,
}

impl InterpolationMode {
    /// Name used in timeline documents
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Linear => "linear",
            Self::CubicHermite => "cubicHermite",
        }
    }
}

impl fmt::Display for InterpolationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterpolationMode {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "linear" => Ok(Self::Linear),
            "cubicHermite" | "cubic" => Ok(Self::CubicHermite),
            other => Err(UnknownName(other.to_string())),
        }
    }
}

/// A name that does not match any variant of a document enum
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown name '{0}'")]
pub struct UnknownName(pub String);

/// When and how a keyframe's value is approached.
///
/// Transitions are immutable once the keyframe exists; `time` orders the
/// keyframes of a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    time: f32,
    mode: InterpolationMode,
    ease_in: bool,
    ease_out: bool,
}

impl Transition {
    /// Create a transition. Negative times are clamped to zero.
    pub fn new(time: f32, mode: InterpolationMode, ease_in: bool, ease_out: bool) -> Self {
        Self {
            time: time.max(0.0),
            mode,
            ease_in,
            ease_out,
        }
    }

    /// Transition at `time` with the given mode and no easing
    pub fn at(time: f32, mode: InterpolationMode) -> Self {
        Self::new(time, mode, false, false)
    }

    /// Keyframe time in seconds
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Interpolation mode
    pub fn mode(&self) -> InterpolationMode {
        self.mode
    }

    /// Ease-in flag
    pub fn ease_in(&self) -> bool {
        self.ease_in
    }

    /// Ease-out flag
    pub fn ease_out(&self) -> bool {
        self.ease_out
    }

    /// Same transition shifted by `offset` seconds
    pub fn shifted(&self, offset: f32) -> Self {
        Self::new(self.time + offset, self.mode, self.ease_in, self.ease_out)
    }
}

/// Translation value in world units
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component (height)
    pub z: f32,
}

impl Point3 {
    /// Create a point
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Origin
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Component-wise sum
    pub fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    /// Component-wise difference
    pub fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    /// Rotate around the vertical axis by `yaw` radians (heading convention:
    /// yaw 0 faces +Y, positive yaw turns toward +X)
    pub fn rotated_by_yaw(self, yaw: f32) -> Self {
        let (sin, cos) = yaw.sin_cos();
        Self::new(
            self.x * cos + self.y * sin,
            -self.x * sin + self.y * cos,
            self.z,
        )
    }

    /// Euclidean distance to `other`
    pub fn distance(self, other: Self) -> f32 {
        let d = self.sub(other);
        (d.x * d.x + d.y * d.y + d.z * d.z).sqrt()
    }
}

/// Camera orientation in radians
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotation {
    /// Pitch (positive looks down)
    pub pitch: f32,
    /// Yaw / heading
    pub yaw: f32,
    /// Roll
    #[serde(default)]
    pub roll: f32,
}

impl Rotation {
    /// Create a rotation
    pub const fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }

    /// Pitch/yaw rotation with no roll
    pub const fn pitch_yaw(pitch: f32, yaw: f32) -> Self {
        Self::new(pitch, yaw, 0.0)
    }

    /// Zero rotation
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Sum with every component wrapped to `(-π, π]`
    pub fn add(self, other: Self) -> Self {
        Self::new(
            normalize_angle(self.pitch + other.pitch),
            normalize_angle(self.yaw + other.yaw),
            normalize_angle(self.roll + other.roll),
        )
    }

    /// Shortest signed difference `self - other`, per component
    pub fn delta(self, other: Self) -> Self {
        Self::new(
            normalize_angle(self.pitch - other.pitch),
            normalize_angle(self.yaw - other.yaw),
            normalize_angle(self.roll - other.roll),
        )
    }

    /// Pitch/yaw that look from `from` toward `to`
    pub fn looking_at(from: Point3, to: Point3) -> Self {
        let d = to.sub(from);
        let horizontal = (d.x * d.x + d.y * d.y).sqrt();
        Self::pitch_yaw(-d.z.atan2(horizontal), d.x.atan2(d.y))
    }
}

/// Wrap an angle to `(-π, π]`
pub fn normalize_angle(angle: f32) -> f32 {
    let mut a = angle % TAU;
    if a <= -PI {
        a += TAU;
    } else if a > PI {
        a -= TAU;
    }
    a
}

/// Interpolation utilities
pub struct Interpolation;

impl Interpolation {
    /// Linear interpolation between two floats
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// Linear interpolation along the shorter arc between two angles
    pub fn lerp_angle(a: f32, b: f32, t: f32) -> f32 {
        normalize_angle(a + normalize_angle(b - a) * t)
    }

    /// Cubic Hermite basis functions `(h00, h10, h01, h11)` at `t`
    pub fn hermite_basis(t: f32) -> (f32, f32, f32, f32) {
        let t2 = t * t;
        let t3 = t2 * t;

        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;

        (h00, h10, h01, h11)
    }

    /// Hermite spline between `p0` and `p1` with tangents `m0`, `m1`
    pub fn hermite(p0: f32, m0: f32, p1: f32, m1: f32, t: f32) -> f32 {
        let (h00, h10, h01, h11) = Self::hermite_basis(t);
        h00 * p0 + h10 * m0 + h01 * p1 + h11 * m1
    }

    /// Catmull-Rom segment between `a1` and `a2`, with `a0`/`a3` as the outer
    /// neighbors used for the tangents
    pub fn catmull_rom(a0: f32, a1: f32, a2: f32, a3: f32, t: f32) -> f32 {
        let m1 = (a2 - a0) * 0.5;
        let m2 = (a3 - a1) * 0.5;
        Self::hermite(a1, m1, a2, m2, t)
    }

    /// Catmull-Rom segment for angles, evaluated on the unit circle so the
    /// curve follows the shorter arc and stays continuous across ±π
    pub fn catmull_rom_angular(a0: f32, a1: f32, a2: f32, a3: f32, t: f32) -> f32 {
        let (s0, c0) = a0.sin_cos();
        let (s1, c1) = a1.sin_cos();
        let (s2, c2) = a2.sin_cos();
        let (s3, c3) = a3.sin_cos();

        let sin = Self::catmull_rom(s0, s1, s2, s3, t);
        let cos = Self::catmull_rom(c0, c1, c2, c3, t);

        sin.atan2(cos)
    }
}

/// Global easing applied to normalized timeline progress
pub struct Easing;

impl Easing {
    /// Remap progress `p` (clamped to `[0, 1]`)
    pub fn apply(p: f32, ease_in: bool, ease_out: bool) -> f32 {
        let p = p.clamp(0.0, 1.0);
        match (ease_in, ease_out) {
            (true, true) => p * p * (3.0 - 2.0 * p),
            (true, false) => p * p,
            (false, true) => 1.0 - (1.0 - p) * (1.0 - p),
            (false, false) => p,
        }
    }
}

/// A value that a track can interpolate
pub trait TrackValue: Copy + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Value returned when a track has nothing to sample
    fn sentinel() -> Self;

    /// Linear blend from `self` toward `other`
    fn lerp(&self, other: &Self, t: f32) -> Self;

    /// Catmull-Rom segment from `p1` to `p2`
    fn catmull_rom(p0: &Self, p1: &Self, p2: &Self, p3: &Self, t: f32) -> Self;
}

impl TrackValue for Point3 {
    fn sentinel() -> Self {
        Point3::ZERO
    }

    fn lerp(&self, other: &Self, t: f32) -> Self {
        Point3::new(
            Interpolation::lerp(self.x, other.x, t),
            Interpolation::lerp(self.y, other.y, t),
            Interpolation::lerp(self.z, other.z, t),
        )
    }

    fn catmull_rom(p0: &Self, p1: &Self, p2: &Self, p3: &Self, t: f32) -> Self {
        Point3::new(
            Interpolation::catmull_rom(p0.x, p1.x, p2.x, p3.x, t),
            Interpolation::catmull_rom(p0.y, p1.y, p2.y, p3.y, t),
            Interpolation::catmull_rom(p0.z, p1.z, p2.z, p3.z, t),
        )
    }
}

impl TrackValue for Rotation {
    fn sentinel() -> Self {
        Rotation::ZERO
    }

    fn lerp(&self, other: &Self, t: f32) -> Self {
        Rotation::new(
            Interpolation::lerp_angle(self.pitch, other.pitch, t),
            Interpolation::lerp_angle(self.yaw, other.yaw, t),
            Interpolation::lerp_angle(self.roll, other.roll, t),
        )
    }

    fn catmull_rom(p0: &Self, p1: &Self, p2: &Self, p3: &Self, t: f32) -> Self {
        Rotation::new(
            Interpolation::catmull_rom_angular(p0.pitch, p1.pitch, p2.pitch, p3.pitch, t),
            Interpolation::catmull_rom_angular(p0.yaw, p1.yaw, p2.yaw, p3.yaw, t),
            Interpolation::catmull_rom_angular(p0.roll, p1.roll, p2.roll, p3.roll, t),
        )
    }
}

/// Field of view used when a track has no keyframes
pub const DEFAULT_FOV: f32 = 80.0;

impl TrackValue for f32 {
    fn sentinel() -> Self {
        DEFAULT_FOV
    }

    fn lerp(&self, other: &Self, t: f32) -> Self {
        Interpolation::lerp(*self, *other, t)
    }

    fn catmull_rom(p0: &Self, p1: &Self, p2: &Self, p3: &Self, t: f32) -> Self {
        Interpolation::catmull_rom(*p0, *p1, *p2, *p3, t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hermite_basis_endpoints() {
        assert_eq!(Interpolation::hermite_basis(0.0), (1.0, 0.0, 0.0, 0.0));
        assert_eq!(Interpolation::hermite_basis(1.0), (0.0, 0.0, 1.0, 0.0));
    }

    #[test]
    fn test_catmull_rom_hits_control_points() {
        assert_eq!(Interpolation::catmull_rom(0.0, 1.0, 4.0, 9.0, 0.0), 1.0);
        assert_eq!(Interpolation::catmull_rom(0.0, 1.0, 4.0, 9.0, 1.0), 4.0);
    }

    #[test]
    fn test_angular_hermite_takes_short_arc() {
        let a = 170f32.to_radians();
        let b = -170f32.to_radians();
        let mid = Interpolation::catmull_rom_angular(a, a, b, b, 0.5);
        // Halfway between 170° and -170° the short way round is ±180°
        assert!((mid.abs() - PI).abs() < 1e-3, "mid = {}", mid.to_degrees());
    }

    #[test]
    fn test_normalize_angle_range() {
        assert!((normalize_angle(3.0 * PI).abs() - PI).abs() < 1e-5);
        assert!((normalize_angle(-3.0 * PI).abs() - PI).abs() < 1e-5);
        assert!((normalize_angle(0.5) - 0.5).abs() < 1e-6);
        assert!((normalize_angle(-0.5 - TAU) + 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_easing_curves() {
        assert_eq!(Easing::apply(0.5, false, false), 0.5);
        assert_eq!(Easing::apply(0.5, true, false), 0.25);
        assert_eq!(Easing::apply(0.5, false, true), 0.75);
        assert_eq!(Easing::apply(0.5, true, true), 0.5);
        assert_eq!(Easing::apply(2.0, true, true), 1.0);
    }

    #[test]
    fn test_interpolation_mode_names() {
        assert_eq!("cubic".parse::<InterpolationMode>(), Ok(InterpolationMode::CubicHermite));
        assert_eq!("linear".parse::<InterpolationMode>(), Ok(InterpolationMode::Linear));
        assert!("smooth".parse::<InterpolationMode>().is_err());
        assert_eq!(InterpolationMode::None.to_string(), "none");
    }

    #[test]
    fn test_looking_at() {
        let r = Rotation::looking_at(Point3::ZERO, Point3::new(0.0, 10.0, 0.0));
        assert!(r.yaw.abs() < 1e-6);
        assert!(r.pitch.abs() < 1e-6);

        let r = Rotation::looking_at(Point3::ZERO, Point3::new(10.0, 0.0, -10.0));
        assert!((r.yaw - PI / 2.0).abs() < 1e-5);
        assert!((r.pitch - PI / 4.0).abs() < 1e-5);
    }
}
