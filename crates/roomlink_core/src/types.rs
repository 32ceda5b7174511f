//! # Core Type Definitions
//!
//! Fundamental types shared by the transport, session and pose layers.
//!
//! ## Key Types
//!
//! - [`PlayerId`] - Server-assigned participant identifier
//! - [`Zone`] - Sub-area of a room (lobby or one of the meeting areas)
//! - [`Vec3`] / [`Quat`] - Double precision position and orientation
//! - [`Pose`] - Position plus orientation sample for one tracked element
//! - [`TrackedElement`] - Fixed key for the four tracked body elements
//! - [`PoseSet`] - One pose per tracked element

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

// ============================================================================
// Identity
// ============================================================================

/// Unique identifier for a participant, assigned by the server on handshake.
///
/// The server owns the id format, so this is an opaque string wrapper that only
/// exists to keep player ids from being confused with room codes or names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Server-assigned ids are never empty.
    pub fn is_valid(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ============================================================================
// Zones
// ============================================================================

/// A sub-area within a room.
///
/// Moving between zones never leaves the room; it only changes which remote
/// participants are visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Zone {
    #[default]
    Lobby,
    AreaA,
    AreaB,
}

impl Zone {
    pub const ALL: [Zone; 3] = [Zone::Lobby, Zone::AreaA, Zone::AreaB];

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Lobby => "Lobby",
            Zone::AreaA => "AreaA",
            Zone::AreaB => "AreaB",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Zone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lobby" => Ok(Zone::Lobby),
            "areaa" | "area_a" | "area-a" | "a" => Ok(Zone::AreaA),
            "areab" | "area_b" | "area-b" | "b" => Ok(Zone::AreaB),
            other => Err(format!("Unknown zone: {other}")),
        }
    }
}

// ============================================================================
// Spatial math
// ============================================================================

/// Represents a 3D vector with double-precision components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Creates a zero vector (0, 0, 0).
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn unit_y() -> Self {
        Self::new(0.0, 1.0, 0.0)
    }

    pub fn dot(self, other: Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Calculates the Euclidean distance to another vector.
    pub fn distance(&self, other: Vec3) -> f64 {
        (*self - other).length()
    }

    /// Linear blend towards `other`; `t` is clamped to `[0, 1]`.
    pub fn lerp(self, other: Vec3, t: f64) -> Vec3 {
        let t = t.clamp(0.0, 1.0);
        self + (other - self) * t
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Default for Vec3 {
    fn default() -> Self {
        Self::zero()
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;

    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

/// Unit quaternion orientation, stored as `(x, y, z, w)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quat {
    pub const IDENTITY: Quat = Quat { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// Rotation of `radians` around `axis`. A zero axis yields the identity.
    pub fn from_axis_angle(axis: Vec3, radians: f64) -> Self {
        let len = axis.length();
        if len <= f64::EPSILON {
            return Self::IDENTITY;
        }
        let axis = axis * (1.0 / len);
        let (s, c) = (radians * 0.5).sin_cos();
        Self::new(axis.x * s, axis.y * s, axis.z * s, c)
    }

    pub fn dot(self, other: Quat) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Returns the unit quaternion; degenerate input collapses to identity.
    pub fn normalize(self) -> Quat {
        let len = self.length();
        if len <= f64::EPSILON || !len.is_finite() {
            return Self::IDENTITY;
        }
        let inv = 1.0 / len;
        Quat::new(self.x * inv, self.y * inv, self.z * inv, self.w * inv)
    }

    /// Inverse of a unit quaternion.
    pub fn inverse(self) -> Quat {
        Quat::new(-self.x, -self.y, -self.z, self.w)
    }

    fn negated(self) -> Quat {
        Quat::new(-self.x, -self.y, -self.z, -self.w)
    }

    /// Rotates a vector by this quaternion.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let u = Vec3::new(self.x, self.y, self.z);
        let t = u.cross(v) * 2.0;
        v + t * self.w + u.cross(t)
    }

    /// Smallest angle in radians between two orientations.
    ///
    /// `q` and `-q` describe the same rotation, so the absolute dot product is used.
    pub fn angle_to(self, other: Quat) -> f64 {
        let d = self.normalize().dot(other.normalize()).abs().min(1.0);
        2.0 * d.acos()
    }

    /// Shortest-arc spherical blend towards `other`; `t` is clamped to `[0, 1]`.
    pub fn slerp(self, other: Quat, t: f64) -> Quat {
        let t = t.clamp(0.0, 1.0);
        let a = self.normalize();
        let mut b = other.normalize();
        let mut cos = a.dot(b);
        if cos < 0.0 {
            b = b.negated();
            cos = -cos;
        }

        // Nearly parallel: fall back to a normalized lerp
        if cos > 0.9995 {
            return Quat::new(
                a.x + (b.x - a.x) * t,
                a.y + (b.y - a.y) * t,
                a.z + (b.z - a.z) * t,
                a.w + (b.w - a.w) * t,
            )
            .normalize();
        }

        let theta = cos.acos();
        let sin_theta = theta.sin();
        let wa = ((1.0 - t) * theta).sin() / sin_theta;
        let wb = (t * theta).sin() / sin_theta;
        Quat::new(
            a.x * wa + b.x * wb,
            a.y * wa + b.y * wb,
            a.z * wa + b.z * wb,
            a.w * wa + b.w * wb,
        )
        .normalize()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.w.is_finite()
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Quat {
    type Output = Quat;

    /// Hamilton product: `self * rhs` applies `rhs` first, then `self`.
    fn mul(self, rhs: Quat) -> Quat {
        Quat::new(
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        )
    }
}

// ============================================================================
// Poses
// ============================================================================

/// Position plus orientation sample for one tracked element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        position: Vec3 { x: 0.0, y: 0.0, z: 0.0 },
        rotation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Expresses this world-frame pose in the frame of `root`.
    pub fn relative_to(&self, root: &Pose) -> Pose {
        let inv = root.rotation.normalize().inverse();
        Pose {
            position: inv.rotate(self.position - root.position),
            rotation: (inv * self.rotation).normalize(),
        }
    }

    /// Places a root-relative pose back into world frame.
    pub fn compose(root: &Pose, relative: &Pose) -> Pose {
        let rot = root.rotation.normalize();
        Pose {
            position: root.position + rot.rotate(relative.position),
            rotation: (rot * relative.rotation).normalize(),
        }
    }

    /// Blends position linearly and rotation along the shortest arc.
    pub fn blend(&self, target: &Pose, t: f64) -> Pose {
        Pose {
            position: self.position.lerp(target.position, t),
            rotation: self.rotation.slerp(target.rotation, t),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.rotation.is_finite()
    }
}

/// Fixed key for the four tracked body elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TrackedElement {
    Root,
    Head,
    LeftHand,
    RightHand,
}

impl TrackedElement {
    pub const ALL: [TrackedElement; 4] = [
        TrackedElement::Root,
        TrackedElement::Head,
        TrackedElement::LeftHand,
        TrackedElement::RightHand,
    ];

    /// Elements stored relative to the root frame.
    pub const RELATIVE: [TrackedElement; 3] = [
        TrackedElement::Head,
        TrackedElement::LeftHand,
        TrackedElement::RightHand,
    ];
}

/// One pose per tracked element.
///
/// Whether the sub-element poses are world-frame or root-relative depends on where
/// the set came from; see [`crate::pose`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PoseSet {
    pub root: Pose,
    pub head: Pose,
    pub left_hand: Pose,
    pub right_hand: Pose,
}

impl PoseSet {
    pub fn get(&self, element: TrackedElement) -> &Pose {
        match element {
            TrackedElement::Root => &self.root,
            TrackedElement::Head => &self.head,
            TrackedElement::LeftHand => &self.left_hand,
            TrackedElement::RightHand => &self.right_hand,
        }
    }

    pub fn get_mut(&mut self, element: TrackedElement) -> &mut Pose {
        match element {
            TrackedElement::Root => &mut self.root,
            TrackedElement::Head => &mut self.head,
            TrackedElement::LeftHand => &mut self.left_hand,
            TrackedElement::RightHand => &mut self.right_hand,
        }
    }

    /// Converts a world-frame set into wire form: root stays in world frame,
    /// head and hands become root-relative.
    pub fn to_root_relative(&self) -> PoseSet {
        PoseSet {
            root: self.root,
            head: self.head.relative_to(&self.root),
            left_hand: self.left_hand.relative_to(&self.root),
            right_hand: self.right_hand.relative_to(&self.root),
        }
    }

    /// Inverse of [`PoseSet::to_root_relative`].
    pub fn to_world(&self) -> PoseSet {
        PoseSet {
            root: self.root,
            head: Pose::compose(&self.root, &self.head),
            left_hand: Pose::compose(&self.root, &self.left_hand),
            right_hand: Pose::compose(&self.root, &self.right_hand),
        }
    }

    pub fn is_finite(&self) -> bool {
        TrackedElement::ALL.iter().all(|e| self.get(*e).is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn approx_vec(a: Vec3, b: Vec3) -> bool {
        a.distance(b) < 1e-9
    }

    #[test]
    fn test_quat_rotate_quarter_turn() {
        let q = Quat::from_axis_angle(Vec3::unit_y(), FRAC_PI_2);
        let v = q.rotate(Vec3::new(1.0, 0.0, 0.0));
        assert!(approx_vec(v, Vec3::new(0.0, 0.0, -1.0)), "got {v:?}");
    }

    #[test]
    fn test_relative_then_compose_recovers_world_pose() {
        let root = Pose::new(
            Vec3::new(2.0, 0.0, -3.0),
            Quat::from_axis_angle(Vec3::unit_y(), 0.7),
        );
        let hand = Pose::new(
            Vec3::new(2.4, 1.1, -2.6),
            Quat::from_axis_angle(Vec3::new(1.0, 0.2, 0.0), 0.3),
        );

        let rel = hand.relative_to(&root);
        let back = Pose::compose(&root, &rel);
        assert!(approx_vec(back.position, hand.position));
        assert!(back.rotation.angle_to(hand.rotation) < 1e-9);
    }

    #[test]
    fn test_relative_pose_is_stable_under_root_rotation() {
        // A hand rigidly attached to the root must keep the same relative pose
        // however the root turns.
        let offset = Pose::new(Vec3::new(0.3, 1.2, 0.1), Quat::IDENTITY);
        let mut previous: Option<Pose> = None;
        for step in 0..8 {
            let root = Pose::new(
                Vec3::new(step as f64, 0.0, 0.0),
                Quat::from_axis_angle(Vec3::unit_y(), step as f64 * 0.4),
            );
            let world_hand = Pose::compose(&root, &offset);
            let rel = world_hand.relative_to(&root);
            if let Some(prev) = previous {
                assert!(approx_vec(prev.position, rel.position));
                assert!(prev.rotation.angle_to(rel.rotation) < 1e-9);
            }
            previous = Some(rel);
        }
    }

    #[test]
    fn test_slerp_takes_shortest_arc() {
        let a = Quat::from_axis_angle(Vec3::unit_y(), 0.1);
        let b = Quat::from_axis_angle(Vec3::unit_y(), 0.3);
        let flipped = Quat::new(-b.x, -b.y, -b.z, -b.w);
        let mid = a.slerp(flipped, 0.5);
        let expected = Quat::from_axis_angle(Vec3::unit_y(), 0.2);
        assert!(mid.angle_to(expected) < 1e-6);
    }

    #[test]
    fn test_zone_parsing() {
        assert_eq!("lobby".parse::<Zone>().unwrap(), Zone::Lobby);
        assert_eq!("AreaB".parse::<Zone>().unwrap(), Zone::AreaB);
        assert!("roof".parse::<Zone>().is_err());
    }
}
