//! rounding.rs — Turning around a mark onto the next leg
//!
//! The rounding point sits a spacer (two boat widths) off the mark,
//! perpendicular to the approach heading on the side away from the mark. A
//! boat has cleared the mark once its bearing from the mark crosses the
//! spacer's bearing in the rounding direction; it then commits to a single
//! MARKROUNDING turn onto the exit heading.
//!
//! Clearance is the signed angle from the spacer bearing to the boat's
//! bearing, positive in the rounding direction. A boat arriving from behind
//! the mark starts near ±180° and has not cleared anything yet.

use super::{StrategyContext, Tack};
use crate::boat::BoatMetrics;
use crate::course::{CourseLeg, LegType, RoundingSide};
use crate::decision::{Decision, TurnDirection};
use crate::geometry::{Angle, DistanceVector, Location};

/// Spacer length in boat widths.
pub const SPACER_WIDTHS: f64 = 2.0;

/// A boat at most this far (degrees) past the spacer bearing has just crossed it.
pub const CLEARED_SWEEP: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundingKind {
    WindwardToOffwind,
    WindwardToGybing,
    OffwindToOffwind,
    OffwindToWindward,
    GybingToWindward,
    GybingToOffwind,
}

impl RoundingKind {
    /// Rounding for an `incoming` leg followed by `outgoing`. A finishing mark
    /// (`outgoing == None`) is rounded like a mark onto a reach.
    pub fn select(incoming: LegType, outgoing: LegType) -> Option<Self> {
        use LegType::*;
        match (incoming, outgoing) {
            (Windward, Offwind | None) => Some(RoundingKind::WindwardToOffwind),
            (Windward, GybingDownwind) => Some(RoundingKind::WindwardToGybing),
            (Offwind, Offwind | None) => Some(RoundingKind::OffwindToOffwind),
            (Offwind, Windward) => Some(RoundingKind::OffwindToWindward),
            (GybingDownwind, Windward) => Some(RoundingKind::GybingToWindward),
            (GybingDownwind, Offwind | None) => Some(RoundingKind::GybingToOffwind),
            _ => Option::None,
        }
    }

    pub fn incoming(self) -> LegType {
        match self {
            RoundingKind::WindwardToOffwind | RoundingKind::WindwardToGybing => LegType::Windward,
            RoundingKind::OffwindToOffwind | RoundingKind::OffwindToWindward => LegType::Offwind,
            RoundingKind::GybingToWindward | RoundingKind::GybingToOffwind => LegType::GybingDownwind,
        }
    }

    pub fn outgoing(self) -> LegType {
        match self {
            RoundingKind::WindwardToOffwind | RoundingKind::OffwindToOffwind | RoundingKind::GybingToOffwind => {
                LegType::Offwind
            }
            RoundingKind::OffwindToWindward | RoundingKind::GybingToWindward => LegType::Windward,
            RoundingKind::WindwardToGybing => LegType::GybingDownwind,
        }
    }
}

/// Result of one rounding tick. `completed` moves the boat onto the next leg;
/// `clearance` is fed back on the following tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundingOutcome {
    pub decision: Decision,
    pub completed: bool,
    pub clearance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundingStrategy {
    pub kind: RoundingKind,
    pub side: RoundingSide,
    pub spacer_distance: f64,
}

impl RoundingStrategy {
    pub fn new(kind: RoundingKind, side: RoundingSide, metrics: &BoatMetrics) -> Self {
        Self {
            kind,
            side,
            spacer_distance: SPACER_WIDTHS * metrics.width,
        }
    }

    /// The tack that keeps the mark on the rounding side while approaching.
    fn approach_tack(&self) -> Tack {
        match self.side {
            RoundingSide::Port => Tack::Starboard,
            RoundingSide::Starboard => Tack::Port,
        }
    }

    fn turn_direction(&self) -> TurnDirection {
        match self.side {
            RoundingSide::Port => TurnDirection::Anticlockwise,
            RoundingSide::Starboard => TurnDirection::Clockwise,
        }
    }

    pub fn approach_heading(&self, leg: &CourseLeg, wind: Angle, metrics: &BoatMetrics) -> Angle {
        match self.kind.incoming() {
            LegType::Windward => self.approach_tack().heading(wind, metrics.upwind()),
            LegType::GybingDownwind => self.approach_tack().heading(wind, metrics.downwind()),
            _ => leg.bearing(),
        }
    }

    /// Offset from the mark to the rounding point.
    pub fn spacer(&self, leg: &CourseLeg, wind: Angle, metrics: &BoatMetrics) -> DistanceVector {
        let approach = self.approach_heading(leg, wind, metrics);
        let angle = match self.side {
            RoundingSide::Port => approach + Angle::RIGHT,
            RoundingSide::Starboard => approach - Angle::RIGHT,
        };
        DistanceVector::new(self.spacer_distance, angle)
    }

    /// Heading to take once the mark is cleared.
    pub fn exit_heading(&self, ctx: &StrategyContext, next_mark: Option<Location>) -> Angle {
        let Some(next) = next_mark else {
            return ctx.boat.heading;
        };
        let w = ctx.wind.angle;
        match self.kind.outgoing() {
            // Port rounding onto a beat leaves on port tack, onto a run on starboard gybe.
            LegType::Windward => self.approach_tack().other().heading(w, ctx.metrics.upwind()),
            LegType::GybingDownwind => self.approach_tack().heading(w, ctx.metrics.downwind()),
            _ => ctx.boat.location.bearing_to(&next),
        }
    }

    /// Degrees the boat's bearing from the mark has swept past the spacer
    /// bearing, positive in the rounding direction.
    pub fn clearance(&self, leg: &CourseLeg, ctx: &StrategyContext) -> f64 {
        let spacer = self.spacer(leg, ctx.wind.angle, ctx.metrics);
        let from_mark = leg.end.bearing_to(&ctx.boat.location);
        let d = spacer.angle.difference_to(from_mark).degrees();
        match self.side {
            RoundingSide::Port => -d,
            RoundingSide::Starboard => d,
        }
    }

    /// The spacer bearing was crossed in the rounding direction: either the
    /// boat is now just past it, or it was short of it last tick and has swept
    /// over it since (the opposite bearing is never a crossing).
    pub fn cleared(previous: Option<f64>, clearance: f64) -> bool {
        if (0.0..CLEARED_SWEEP).contains(&clearance) {
            return true;
        }
        match previous {
            Some(p) => p < 0.0 && clearance >= 0.0 && clearance - p < 180.0,
            None => false,
        }
    }

    /// On the spacer side of the mark with the mark abaft the beam. Catches a
    /// boat that passes the mark close alongside the spacer bearing and so
    /// never sweeps across it.
    fn past_abeam(&self, leg: &CourseLeg, ctx: &StrategyContext) -> bool {
        let spacer = self.spacer(leg, ctx.wind.angle, ctx.metrics).angle;
        let (dx, dy) = (ctx.boat.location.x - leg.end.x, ctx.boat.location.y - leg.end.y);
        let along = |a: Angle| dx * a.radians().sin() + dy * a.radians().cos();
        along(spacer) >= 0.0 && along(ctx.boat.heading) >= 0.0
    }

    /// `previous` is the clearance returned on the boat's last rounding tick
    /// at this mark, if any.
    pub fn decide(
        &self,
        ctx: &StrategyContext,
        leg: &CourseLeg,
        next_mark: Option<Location>,
        previous: Option<f64>,
    ) -> RoundingOutcome {
        let clearance = self.clearance(leg, ctx);
        if ctx.previous.is_turning() {
            return RoundingOutcome { decision: ctx.previous, completed: false, clearance };
        }
        if !(Self::cleared(previous, clearance) || self.past_abeam(leg, ctx)) {
            return RoundingOutcome { decision: Decision::SailOn, completed: false, clearance };
        }
        RoundingOutcome {
            decision: Decision::MarkRounding {
                target: self.exit_heading(ctx, next_mark),
                direction: self.turn_direction(),
            },
            completed: true,
            clearance,
        }
    }
}
