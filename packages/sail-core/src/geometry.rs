//! geometry.rs — Angles, locations, areas and polar vectors
//!
//! ## Conventions
//! - **Angle**: compass degrees, 0 = North, positive = clockwise, normalised to (-180, 180]
//! - **Location**: metres on the local field of play, x = East, y = North
//! - **Polar ↔ Cartesian**: x = m·sin θ, y = m·cos θ
//!
//! Flow vectors point to where the flow comes FROM; displacement vectors point
//! to where the boat goes.

use std::fmt;
use std::ops::{Add, Neg, Sub};

use serde::{Deserialize, Serialize};

/// 1 knot in metres per second
pub const KNOTS_TO_MS: f64 = 0.514_444;

// ── Angle ─────────────────────────────────────────────────────────────────────

fn normalize(deg: f64) -> f64 {
    if deg > -180.0 && deg <= 180.0 {
        return deg;
    }
    let r = deg.rem_euclid(360.0);
    if r > 180.0 {
        r - 360.0
    } else {
        r
    }
}

/// Compass angle in degrees, always within (-180, 180].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Angle(f64);

impl Angle {
    pub const ZERO: Angle = Angle(0.0);
    pub const RIGHT: Angle = Angle(90.0);
    pub const STRAIGHT: Angle = Angle(180.0);

    pub fn new(degrees: f64) -> Self {
        Angle(normalize(degrees))
    }

    pub fn from_radians(rad: f64) -> Self {
        Angle::new(rad.to_degrees())
    }

    pub fn degrees(&self) -> f64 {
        self.0
    }

    pub fn radians(&self) -> f64 {
        self.0.to_radians()
    }

    pub fn is_finite(&self) -> bool {
        self.0.is_finite()
    }

    pub fn scale(&self, factor: f64) -> Angle {
        Angle::new(self.0 * factor)
    }

    pub fn abs(&self) -> Angle {
        Angle(self.0.abs())
    }

    /// The opposite direction (+180°).
    pub fn inverse(&self) -> Angle {
        Angle::new(self.0 + 180.0)
    }

    /// Mirror across the East–West axis: a northward heading becomes southward.
    pub fn reflect_horizontal(&self) -> Angle {
        Angle::new(180.0 - self.0)
    }

    /// Mirror across the North–South axis: an eastward heading becomes westward.
    pub fn reflect_vertical(&self) -> Angle {
        Angle::new(-self.0)
    }

    /// Signed shortest turn from `self` to `target`; positive is clockwise.
    pub fn difference_to(&self, target: Angle) -> Angle {
        Angle::new(target.0 - self.0)
    }

    /// Compares normalised values; no wrap-around handling near ±180°.
    pub fn gt(&self, other: Angle) -> bool {
        self.0 > other.0
    }

    /// Compares normalised values; no wrap-around handling near ±180°.
    pub fn lt(&self, other: Angle) -> bool {
        self.0 < other.0
    }

    /// Inclusive range test on normalised values. Callers must split ranges that
    /// cross the ±180° discontinuity themselves.
    pub fn between(&self, low: Angle, high: Angle) -> bool {
        self.0 >= low.0 && self.0 <= high.0
    }
}

impl From<f64> for Angle {
    fn from(degrees: f64) -> Self {
        Angle::new(degrees)
    }
}

impl From<Angle> for f64 {
    fn from(a: Angle) -> Self {
        a.0
    }
}

impl Add for Angle {
    type Output = Angle;
    fn add(self, rhs: Angle) -> Angle {
        Angle::new(self.0 + rhs.0)
    }
}

impl Sub for Angle {
    type Output = Angle;
    fn sub(self, rhs: Angle) -> Angle {
        Angle::new(self.0 - rhs.0)
    }
}

impl Neg for Angle {
    type Output = Angle;
    fn neg(self) -> Angle {
        Angle::new(-self.0)
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}°", self.0)
    }
}

// ── Location ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub x: f64, // East
    pub y: f64, // North
}

impl Location {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Location) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }

    /// Compass bearing from this location toward `target`.
    pub fn bearing_to(&self, target: &Location) -> Angle {
        Angle::from_radians((target.x - self.x).atan2(target.y - self.y))
    }

    pub fn add(&self, v: &DistanceVector) -> Location {
        let (dx, dy) = v.to_xy();
        Location::new(self.x + dx, self.y + dy)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

// ── Area ──────────────────────────────────────────────────────────────────────

/// Axis-aligned rectangle, anchored at its south-west corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub west: f64,
    pub south: f64,
    pub width: f64,
    pub height: f64,
}

impl Area {
    pub fn new(west: f64, south: f64, width: f64, height: f64) -> Self {
        Self { west, south, width, height }
    }

    pub fn east(&self) -> f64 {
        self.west + self.width
    }

    pub fn north(&self) -> f64 {
        self.south + self.height
    }

    pub fn contains(&self, p: &Location) -> bool {
        p.x >= self.west && p.x <= self.east() && p.y >= self.south && p.y <= self.north()
    }

    pub fn contains_area(&self, other: &Area) -> bool {
        other.west >= self.west
            && other.south >= self.south
            && other.east() <= self.east()
            && other.north() <= self.north()
    }

    pub fn clamp(&self, p: &Location) -> Location {
        Location::new(p.x.clamp(self.west, self.east()), p.y.clamp(self.south, self.north()))
    }

    pub fn is_valid(&self) -> bool {
        self.west.is_finite()
            && self.south.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0
    }
}

// ── Polar vectors ─────────────────────────────────────────────────────────────

/// Shared polar arithmetic for distance and speed vectors.
pub trait PolarVector: Sized + Copy {
    fn magnitude(&self) -> f64;
    fn angle(&self) -> Angle;
    fn from_polar(magnitude: f64, angle: Angle) -> Self;

    fn to_xy(&self) -> (f64, f64) {
        let rad = self.angle().radians();
        (self.magnitude() * rad.sin(), self.magnitude() * rad.cos())
    }

    fn from_xy(x: f64, y: f64) -> Self {
        let magnitude = (x * x + y * y).sqrt();
        let angle = if magnitude == 0.0 { Angle::ZERO } else { Angle::from_radians(x.atan2(y)) };
        Self::from_polar(magnitude, angle)
    }

    fn plus(&self, other: &Self) -> Self {
        let (ax, ay) = self.to_xy();
        let (bx, by) = other.to_xy();
        Self::from_xy(ax + bx, ay + by)
    }

    fn minus(&self, other: &Self) -> Self {
        let (ax, ay) = self.to_xy();
        let (bx, by) = other.to_xy();
        Self::from_xy(ax - bx, ay - by)
    }

    fn scale(&self, factor: f64) -> Self {
        Self::from_polar(self.magnitude() * factor, self.angle())
    }
}

/// Magnitude in metres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DistanceVector {
    pub distance: f64,
    pub angle: Angle,
}

/// Magnitude in knots.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpeedVector {
    pub speed: f64,
    pub angle: Angle,
}

impl DistanceVector {
    pub fn new(distance: f64, angle: Angle) -> Self {
        Self::from_polar(distance, angle)
    }
}

impl SpeedVector {
    pub fn new(speed: f64, angle: Angle) -> Self {
        Self::from_polar(speed, angle)
    }

    pub fn speed_ms(&self) -> f64 {
        self.speed * KNOTS_TO_MS
    }

    /// Same direction, rotated by `offset`.
    pub fn rotated(&self, offset: Angle) -> Self {
        Self { speed: self.speed, angle: self.angle + offset }
    }

    /// Distance travelled along this vector in `secs` seconds.
    pub fn over(&self, secs: f64) -> DistanceVector {
        DistanceVector::new(self.speed_ms() * secs, self.angle)
    }
}

impl PolarVector for DistanceVector {
    fn magnitude(&self) -> f64 {
        self.distance
    }
    fn angle(&self) -> Angle {
        self.angle
    }
    fn from_polar(magnitude: f64, angle: Angle) -> Self {
        // A negative magnitude is the same vector pointing the other way
        if magnitude < 0.0 {
            Self { distance: -magnitude, angle: angle.inverse() }
        } else {
            Self { distance: magnitude, angle }
        }
    }
}

impl PolarVector for SpeedVector {
    fn magnitude(&self) -> f64 {
        self.speed
    }
    fn angle(&self) -> Angle {
        self.angle
    }
    fn from_polar(magnitude: f64, angle: Angle) -> Self {
        if magnitude < 0.0 {
            Self { speed: -magnitude, angle: angle.inverse() }
        } else {
            Self { speed: magnitude, angle }
        }
    }
}
