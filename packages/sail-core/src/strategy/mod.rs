//! strategy — Tactical decisions for a boat on a leg
//!
//! Each boat on each leg is in one of two states:
//! - `Sailing`: the leg's [`SailingStrategy`] (chosen by leg type) steers toward
//!   the leg's rounding point
//! - `Rounding`: within 3 boat lengths of the mark the leg's [`RoundingStrategy`]
//!   (chosen by incoming/outgoing leg type and rounding side) waits for the boat
//!   to clear the spacer, then commits to the turn onto the next leg
//!
//! Strategies are plain enums dispatched by `match`. A strategy never mutates
//! anything: it returns a [`Decision`] for the kinematics step.

mod rounding;
mod sailing;

pub use rounding::{RoundingKind, RoundingOutcome, RoundingStrategy};
pub use sailing::SailingStrategy;

use serde::{Deserialize, Serialize};

use crate::boat::{Boat, BoatMetrics};
use crate::course::{Channel, CourseLeg, LegType};
use crate::decision::{Decision, TurnDirection};
use crate::error::{Result, SimError};
use crate::geometry::{Angle, Area, Location, SpeedVector};

/// Deviations (degrees) below this are not worth a correction.
pub const TACTICAL_TOLERANCE: f64 = 0.5;

/// Turn distance is boat speed (knots) times this many metres.
pub const TURN_DISTANCE_FACTOR: f64 = 4.0;

/// The rounding state begins this many boat lengths from the mark.
pub const CLOSE_TO_MARK_LENGTHS: f64 = 3.0;

/// The channel is only enforced beyond this multiple of its inner offset from the mark.
pub const CHANNEL_RELEASE_FACTOR: f64 = 1.5;

// ── Flags ─────────────────────────────────────────────────────────────────────

/// Per-boat tactical preferences, keyed as in the scenario document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TacticalFlags {
    #[serde(default, rename = "upwindsailonbesttack")]
    pub upwind_sail_on_best_tack: bool,
    #[serde(default, rename = "upwindtackifheaded")]
    pub upwind_tack_if_headed: bool,
    #[serde(default, rename = "upwindbearawayifheaded")]
    pub upwind_bear_away_if_headed: bool,
    #[serde(default, rename = "upwindluffupiflifted")]
    pub upwind_luff_up_if_lifted: bool,
    #[serde(default, rename = "downwindsailonbestgybe")]
    pub downwind_sail_on_best_gybe: bool,
    #[serde(default, rename = "downwindbearawayifheaded")]
    pub downwind_bear_away_if_headed: bool,
    #[serde(default, rename = "downwindgybeiflifted")]
    pub downwind_gybe_if_lifted: bool,
    #[serde(default, rename = "downwindluffupiflifted")]
    pub downwind_luff_up_if_lifted: bool,
}

// ── Context ───────────────────────────────────────────────────────────────────

/// Everything a strategy may read for one boat on one tick.
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext<'a> {
    pub boat: &'a Boat,
    pub metrics: &'a BoatMetrics,
    pub flags: &'a TacticalFlags,
    /// Wind at the boat, including swing and shift
    pub wind: SpeedVector,
    pub mean_wind: Angle,
    pub field: Area,
    /// Decision in force from the previous tick
    pub previous: Decision,
}

impl StrategyContext<'_> {
    /// Wind angle relative to the boat's heading; negative is starboard.
    pub fn relative_wind(&self) -> Angle {
        self.wind.angle.difference_to(self.boat.heading)
    }

    pub fn tack(&self) -> Tack {
        Tack::of(self.boat.heading, self.wind.angle)
    }
}

// ── Tack geometry ─────────────────────────────────────────────────────────────

/// Which side the wind comes over. Also used for gybes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tack {
    Port,
    Starboard,
}

impl Tack {
    pub fn of(heading: Angle, wind: Angle) -> Tack {
        if wind.difference_to(heading).degrees() > 0.0 {
            Tack::Port
        } else {
            Tack::Starboard
        }
    }

    pub fn other(self) -> Tack {
        match self {
            Tack::Port => Tack::Starboard,
            Tack::Starboard => Tack::Port,
        }
    }

    fn sign(self) -> f64 {
        match self {
            Tack::Port => 1.0,
            Tack::Starboard => -1.0,
        }
    }

    /// Heading at `relative` degrees off `wind` on this tack.
    pub fn heading(self, wind: Angle, relative: Angle) -> Angle {
        wind + Angle::new(self.sign() * relative.degrees())
    }

    /// Turning through the wind away from this tack.
    pub fn tack_direction(self) -> TurnDirection {
        match self {
            Tack::Starboard => TurnDirection::Clockwise,
            Tack::Port => TurnDirection::Anticlockwise,
        }
    }

    /// Turning stern-through-the-wind away from this gybe.
    pub fn gybe_direction(self) -> TurnDirection {
        self.tack_direction().reversed()
    }

    /// Turning toward the wind while staying on this tack.
    pub fn luff_direction(self) -> TurnDirection {
        self.tack_direction()
    }

    /// Turning away from the wind while staying on this tack.
    pub fn bear_away_direction(self) -> TurnDirection {
        self.gybe_direction()
    }
}

// ── Corrections shared by every sailing strategy ──────────────────────────────

/// Boundary avoidance: a boat within its turn distance of an edge and heading
/// into it is turned onto the heading reflected off that edge.
pub(crate) fn limits(ctx: &StrategyContext) -> Option<Decision> {
    let b = ctx.boat;
    let f = &ctx.field;
    let h = b.heading;
    let turn_distance = (b.speed * TURN_DISTANCE_FACTOR).max(ctx.metrics.length);
    let (s, c) = (h.radians().sin(), h.radians().cos());

    // (perpendicular heading into the edge, reflection)
    let vertical_hit = if f.north() - b.location.y <= turn_distance && c > 0.0 {
        Some((Angle::ZERO, h.reflect_horizontal()))
    } else if b.location.y - f.south <= turn_distance && c < 0.0 {
        Some((Angle::STRAIGHT, h.reflect_horizontal()))
    } else {
        None
    };
    let horizontal_hit = if f.east() - b.location.x <= turn_distance && s > 0.0 {
        Some((Angle::RIGHT, h.reflect_vertical()))
    } else if b.location.x - f.west <= turn_distance && s < 0.0 {
        Some((-Angle::RIGHT, h.reflect_vertical()))
    } else {
        None
    };

    let (perpendicular, target) = match (vertical_hit, horizontal_hit) {
        (Some((p, _)), Some(_)) => (p, h.inverse()),
        (Some(hit), None) | (None, Some(hit)) => hit,
        (None, None) => return None,
    };
    let direction = if perpendicular.difference_to(h).degrees() > 0.0 {
        TurnDirection::Clockwise
    } else {
        TurnDirection::Anticlockwise
    };
    Some(Decision::turn(target, direction))
}

/// A boat pointing inside the no-go zone bears away to the nearest closehauled heading.
pub(crate) fn no_go(ctx: &StrategyContext) -> Option<Decision> {
    let up = ctx.metrics.upwind();
    if ctx.relative_wind().degrees().abs() >= up.degrees() - TACTICAL_TOLERANCE {
        return None;
    }
    let tack = ctx.tack();
    Some(Decision::turn(tack.heading(ctx.wind.angle, up), tack.bear_away_direction()))
}

/// Turn by the shortest way to `target` unless already within tolerance.
pub(crate) fn steer_to(heading: Angle, target: Angle) -> Decision {
    if heading.difference_to(target).degrees().abs() <= TACTICAL_TOLERANCE {
        Decision::SailOn
    } else {
        Decision::turn(target, TurnDirection::shortest(heading, target))
    }
}

// ── Leg binding ───────────────────────────────────────────────────────────────

/// Strategy selection for one boat on one leg of the course.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseLegWithStrategy {
    pub index: usize,
    pub leg: CourseLeg,
    pub leg_type: LegType,
    pub next_leg_type: LegType,
    /// Mark at the end of the following leg
    pub next_mark: Option<Location>,
    pub sailing: SailingStrategy,
    pub rounding: RoundingStrategy,
    pub channel: Channel,
}

impl CourseLegWithStrategy {
    /// Select strategies for `leg` (followed by `next`). Unsupported leg-type
    /// transitions are rejected here, before any simulation runs.
    pub fn new(
        index: usize,
        leg: &CourseLeg,
        next: Option<&CourseLeg>,
        metrics: &BoatMetrics,
        mean_wind: Angle,
        upwind_channel: Channel,
        downwind_channel: Channel,
    ) -> Result<Self> {
        let leg_type = leg.leg_type(mean_wind, metrics);
        let sailing = SailingStrategy::for_leg(leg_type).ok_or_else(|| {
            SimError::config(format!("course.legs[{index}]"), "leg has zero length")
        })?;
        let next_leg_type = next.map_or(LegType::None, |n| n.leg_type(mean_wind, metrics));
        let kind = RoundingKind::select(leg_type, next_leg_type).ok_or(SimError::UnsupportedRounding {
            leg: index,
            from: leg_type,
            to: next_leg_type,
        })?;
        let channel = match leg_type {
            LegType::Windward => upwind_channel,
            LegType::GybingDownwind => downwind_channel,
            _ => Channel::Disabled,
        };
        Ok(Self {
            index,
            leg: leg.clone(),
            leg_type,
            next_leg_type,
            next_mark: next.map(|n| n.end),
            sailing,
            rounding: RoundingStrategy::new(kind, leg.rounding, metrics),
            channel,
        })
    }

    /// Within [`CLOSE_TO_MARK_LENGTHS`] boat lengths of the leg's mark.
    pub fn close_to_mark(&self, p: &Location, metrics: &BoatMetrics) -> bool {
        p.distance_to(&self.leg.end) <= CLOSE_TO_MARK_LENGTHS * metrics.length
    }

    /// The point to clear: the mark offset by the rounding spacer.
    pub fn rounding_point(&self, wind: Angle, metrics: &BoatMetrics) -> Location {
        self.leg.end.add(&self.rounding.spacer(&self.leg, wind, metrics))
    }

    pub fn decide_sailing(&self, ctx: &StrategyContext) -> Decision {
        let target = self.rounding_point(ctx.wind.angle, ctx.metrics);
        self.sailing.decide(ctx, target, self.leg.end, self.channel)
    }

    /// `previous` is the clearance from the boat's last rounding tick at this mark.
    pub fn decide_rounding(&self, ctx: &StrategyContext, previous: Option<f64>) -> RoundingOutcome {
        self.rounding.decide(ctx, &self.leg, self.next_mark, previous)
    }
}
