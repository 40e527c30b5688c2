//! boat.rs — Boat class metrics and per-tick kinematics
//!
//! Each tick a boat:
//! 1. turns toward the decision's target, at most one tick of turning rate
//! 2. relaxes its speed toward the polar speed for the new heading (inertia lag)
//! 3. moves by its through-water vector minus the water vector (flows are
//!    "from" vectors, so subtracting drifts the boat downstream)

use serde::{Deserialize, Serialize};

use crate::decision::Decision;
use crate::error::{Result, SimError};
use crate::geometry::{Angle, Location, PolarVector, SpeedVector};

/// Below this speed (knots) the turning rate is halved.
pub const LOW_SPEED_KNOTS: f64 = 1.0;

// ── Boat classes ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoatClass {
    Laser,
    Topper,
    #[serde(rename = "420")]
    FourTwenty,
    /// Metrics supplied in the scenario
    Custom,
}

/// One row of the performance polar: at `angle` off the wind the boat makes
/// `ratio` × wind speed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolarPoint {
    pub angle: f64,
    pub ratio: f64,
}

const fn pp(angle: f64, ratio: f64) -> PolarPoint {
    PolarPoint { angle, ratio }
}

const LASER_POLAR: [PolarPoint; 9] = [
    pp(0.0, 0.0),
    pp(30.0, 0.15),
    pp(45.0, 0.52),
    pp(60.0, 0.60),
    pp(90.0, 0.70),
    pp(120.0, 0.68),
    pp(150.0, 0.60),
    pp(165.0, 0.54),
    pp(180.0, 0.50),
];

const TOPPER_POLAR: [PolarPoint; 8] = [
    pp(0.0, 0.0),
    pp(30.0, 0.12),
    pp(45.0, 0.45),
    pp(60.0, 0.52),
    pp(90.0, 0.60),
    pp(120.0, 0.58),
    pp(150.0, 0.52),
    pp(180.0, 0.45),
];

const FOUR_TWENTY_POLAR: [PolarPoint; 9] = [
    pp(0.0, 0.0),
    pp(30.0, 0.20),
    pp(42.0, 0.55),
    pp(60.0, 0.64),
    pp(90.0, 0.78),
    pp(120.0, 0.80),
    pp(145.0, 0.66),
    pp(165.0, 0.56),
    pp(180.0, 0.52),
];

/// Immutable performance data for a boat class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoatMetrics {
    /// Metres
    pub length: f64,
    /// Metres
    pub width: f64,
    /// Fraction of the speed difference absorbed per tick, (0, 1]
    pub inertia: f64,
    /// Degrees per second
    #[serde(rename = "maxturningrate")]
    pub max_turning_rate: f64,
    /// Closehauled angle off the wind, degrees
    #[serde(rename = "upwindrelative")]
    pub upwind_relative: f64,
    /// Downwind sailing angle off the wind, degrees
    #[serde(rename = "downwindrelative")]
    pub downwind_relative: f64,
    /// Knots
    #[serde(rename = "maxspeed")]
    pub max_speed: f64,
    pub polar: Vec<PolarPoint>,
}

impl BoatMetrics {
    pub fn for_class(class: BoatClass) -> Option<Self> {
        let m = match class {
            BoatClass::Laser => Self {
                length: 4.23,
                width: 1.37,
                inertia: 0.3,
                max_turning_rate: 30.0,
                upwind_relative: 45.0,
                downwind_relative: 150.0,
                max_speed: 9.0,
                polar: LASER_POLAR.to_vec(),
            },
            BoatClass::Topper => Self {
                length: 3.4,
                width: 1.2,
                inertia: 0.35,
                max_turning_rate: 35.0,
                upwind_relative: 45.0,
                downwind_relative: 150.0,
                max_speed: 7.5,
                polar: TOPPER_POLAR.to_vec(),
            },
            BoatClass::FourTwenty => Self {
                length: 4.2,
                width: 1.63,
                inertia: 0.3,
                max_turning_rate: 30.0,
                upwind_relative: 42.0,
                downwind_relative: 145.0,
                max_speed: 10.0,
                polar: FOUR_TWENTY_POLAR.to_vec(),
            },
            BoatClass::Custom => return None,
        };
        Some(m)
    }

    pub fn upwind(&self) -> Angle {
        Angle::new(self.upwind_relative)
    }

    pub fn downwind(&self) -> Angle {
        Angle::new(self.downwind_relative)
    }

    /// Speed through the water (knots) at `relative` off a wind of `wind_speed` knots.
    pub fn potential_speed(&self, relative: Angle, wind_speed: f64) -> f64 {
        let off = relative.degrees().abs();
        let ratio = match self.polar.iter().position(|p| p.angle >= off) {
            Some(0) => self.polar[0].ratio,
            Some(i) => {
                let (lo, hi) = (self.polar[i - 1], self.polar[i]);
                lo.ratio + (hi.ratio - lo.ratio) * (off - lo.angle) / (hi.angle - lo.angle)
            }
            None => self.polar.last().map_or(0.0, |p| p.ratio),
        };
        (ratio * wind_speed).clamp(0.0, self.max_speed)
    }

    pub fn validate(&self, path: &str) -> Result<()> {
        let positive = [
            ("length", self.length),
            ("width", self.width),
            ("inertia", self.inertia),
            ("maxturningrate", self.max_turning_rate),
            ("maxspeed", self.max_speed),
        ];
        for (key, v) in positive {
            if !v.is_finite() || v <= 0.0 {
                return Err(SimError::config(format!("{path}.{key}"), format!("must be > 0, got {v}")));
            }
        }
        if self.inertia > 1.0 {
            return Err(SimError::config(format!("{path}.inertia"), "must be at most 1"));
        }
        if !(self.upwind_relative > 0.0
            && self.upwind_relative < self.downwind_relative
            && self.downwind_relative < 180.0)
        {
            return Err(SimError::config(
                path,
                "need 0 < upwindrelative < downwindrelative < 180",
            ));
        }
        if self.polar.len() < 2 {
            return Err(SimError::config(format!("{path}.polar"), "needs at least two points"));
        }
        let mut last = -1.0;
        for (i, p) in self.polar.iter().enumerate() {
            if !(p.angle > last && p.angle <= 180.0) || !p.ratio.is_finite() || p.ratio < 0.0 {
                return Err(SimError::config(
                    format!("{path}.polar[{i}]"),
                    "angles must increase within [0, 180] with non-negative ratios",
                ));
            }
            last = p.angle;
        }
        Ok(())
    }
}

// ── Boat state ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Boat {
    pub location: Location,
    pub heading: Angle,
    /// Knots through the water
    pub speed: f64,
    /// Degrees per second allowed on the next tick
    pub max_turn_rate: f64,
    /// Every location visited, oldest first
    pub track: Vec<Location>,
}

impl Boat {
    pub fn new(location: Location, heading: Angle, speed: f64, metrics: &BoatMetrics) -> Self {
        Self {
            location,
            heading,
            speed,
            max_turn_rate: Self::turn_rate_for(speed, metrics),
            track: vec![location],
        }
    }

    fn turn_rate_for(speed: f64, metrics: &BoatMetrics) -> f64 {
        if speed < LOW_SPEED_KNOTS {
            metrics.max_turning_rate / 2.0
        } else {
            metrics.max_turning_rate
        }
    }

    /// Degrees the boat may turn during a tick of `dt` seconds.
    pub fn max_turn_per_tick(&self, dt: f64) -> f64 {
        self.max_turn_rate * dt
    }

    /// Apply `decision` for one tick of `dt` seconds and return the decision
    /// still in force afterwards.
    pub fn advance(
        &mut self,
        decision: Decision,
        wind: SpeedVector,
        water: SpeedVector,
        metrics: &BoatMetrics,
        dt: f64,
    ) -> Result<Decision> {
        if dt <= 0.0 {
            return Ok(decision);
        }
        let max_turn = self.max_turn_per_tick(dt);

        let (new_heading, remaining) = match decision {
            Decision::Stop => return Ok(Decision::Stop),
            Decision::SailOn => (self.heading, Decision::SailOn),
            Decision::Turn { target, direction } | Decision::MarkRounding { target, direction } => {
                if !target.is_finite() {
                    return Err(SimError::Internal(format!("turn target {target} is not finite")));
                }
                if self.heading.difference_to(target).degrees().abs() <= max_turn {
                    (target, Decision::SailOn)
                } else {
                    (self.heading + Angle::new(direction.sign() * max_turn), decision)
                }
            }
        };

        let potential = metrics.potential_speed(wind.angle.difference_to(new_heading), wind.speed);
        self.speed += metrics.inertia * (potential - self.speed);

        let through_water = SpeedVector::new(self.speed, new_heading);
        let over_ground = through_water.minus(&water);
        self.location = self.location.add(&over_ground.over(dt));
        self.heading = new_heading;
        self.max_turn_rate = Self::turn_rate_for(self.speed, metrics);
        self.track.push(self.location);

        Ok(remaining)
    }
}
