//! sailing.rs — Leg-type strategies used between marks

use super::{limits, no_go, steer_to, StrategyContext, Tack, CHANNEL_RELEASE_FACTOR, TACTICAL_TOLERANCE};
use crate::course::{Channel, LegType};
use crate::decision::Decision;
use crate::geometry::{Angle, Location};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SailingStrategy {
    /// Beat to windward on closehauled headings
    Windward,
    /// Reach straight for the mark
    Offwind,
    /// Run on alternating gybes at the downwind angle
    GybingDownwind,
}

impl SailingStrategy {
    pub fn for_leg(leg_type: LegType) -> Option<Self> {
        match leg_type {
            LegType::Windward => Some(SailingStrategy::Windward),
            LegType::Offwind => Some(SailingStrategy::Offwind),
            LegType::GybingDownwind => Some(SailingStrategy::GybingDownwind),
            LegType::None => None,
        }
    }

    /// Decide for one tick. `target` is the rounding point, `mark` the mark
    /// itself (the channel axis runs through it).
    ///
    /// Precedence: a turn already in progress, then the field limits, then the
    /// no-go zone, then leg tactics.
    pub fn decide(&self, ctx: &StrategyContext, target: Location, mark: Location, channel: Channel) -> Decision {
        if ctx.previous.is_turning() {
            return ctx.previous;
        }
        if let Some(d) = limits(ctx) {
            return d;
        }
        match self {
            SailingStrategy::Windward => windward(ctx, target, mark, channel),
            SailingStrategy::Offwind => no_go(ctx).unwrap_or_else(|| offwind(ctx, target)),
            SailingStrategy::GybingDownwind => no_go(ctx).unwrap_or_else(|| gybing(ctx, target, mark, channel)),
        }
    }
}

/// The tack the channel wants the boat on, if it has strayed outside.
fn channel_tack(ctx: &StrategyContext, mark: &Location, channel: Channel) -> Option<Tack> {
    let p = &ctx.boat.location;
    if !channel.is_enabled()
        || p.distance_to(mark) <= CHANNEL_RELEASE_FACTOR * channel.inner_offset()
        || channel.in_channel(p, mark, ctx.mean_wind)
    {
        return None;
    }
    // Starboard heads back west, port heads back east, on either leg direction.
    if Channel::cross_track(p, mark, ctx.mean_wind) > 0.0 {
        Some(Tack::Starboard)
    } else {
        Some(Tack::Port)
    }
}

// ── Windward ──────────────────────────────────────────────────────────────────

fn windward(ctx: &StrategyContext, target: Location, mark: Location, channel: Channel) -> Decision {
    let w = ctx.wind.angle;
    let up = ctx.metrics.upwind();
    let heading = ctx.boat.heading;
    let tack = ctx.tack();
    let flags = ctx.flags;

    // Laylines: the mark can be fetched on a tack once it bears at least the
    // closehauled angle off the wind on that side.
    let bearing = ctx.boat.location.bearing_to(&target);
    let rb = w.difference_to(bearing).degrees();
    let fetches = |t: Tack| t.sign() * rb >= up.degrees() - TACTICAL_TOLERANCE;
    if fetches(tack.other()) {
        return Decision::turn(bearing, tack.tack_direction());
    }
    if fetches(tack) {
        return steer_to(heading, bearing);
    }

    if let Some(wanted) = channel_tack(ctx, &mark, channel) {
        if wanted != tack {
            return Decision::turn(wanted.heading(w, up), tack.tack_direction());
        }
    }

    if flags.upwind_sail_on_best_tack {
        let d = ctx.mean_wind.difference_to(w).degrees();
        let best = if d > TACTICAL_TOLERANCE {
            Some(Tack::Starboard)
        } else if d < -TACTICAL_TOLERANCE {
            Some(Tack::Port)
        } else {
            None
        };
        if let Some(best) = best.filter(|b| *b != tack) {
            return Decision::turn(best.heading(w, up), tack.tack_direction());
        }
    }

    let r = ctx.relative_wind().degrees().abs();
    if r < up.degrees() - TACTICAL_TOLERANCE {
        // headed into the no-go zone
        if flags.upwind_tack_if_headed && !flags.upwind_bear_away_if_headed {
            return Decision::turn(tack.other().heading(w, up), tack.tack_direction());
        }
        return Decision::turn(tack.heading(w, up), tack.bear_away_direction());
    }
    if r > up.degrees() + TACTICAL_TOLERANCE && flags.upwind_luff_up_if_lifted {
        return Decision::turn(tack.heading(w, up), tack.luff_direction());
    }
    Decision::SailOn
}

// ── Offwind ───────────────────────────────────────────────────────────────────

/// Steer for the target, held between the closehauled and downwind angles.
fn offwind(ctx: &StrategyContext, target: Location) -> Decision {
    let w = ctx.wind.angle;
    let bearing = ctx.boat.location.bearing_to(&target);
    let off = w
        .difference_to(bearing)
        .degrees()
        .abs()
        .clamp(ctx.metrics.upwind_relative, ctx.metrics.downwind_relative);
    let course = Tack::of(bearing, w).heading(w, Angle::new(off));
    steer_to(ctx.boat.heading, course)
}

// ── Gybing downwind ───────────────────────────────────────────────────────────

fn gybing(ctx: &StrategyContext, target: Location, mark: Location, channel: Channel) -> Decision {
    let w = ctx.wind.angle;
    let up = ctx.metrics.upwind_relative;
    let down = ctx.metrics.downwind();
    let heading = ctx.boat.heading;
    let tack = ctx.tack();
    let flags = ctx.flags;

    // A gybe fetches the mark once it bears no deeper than the downwind angle.
    let bearing = ctx.boat.location.bearing_to(&target);
    let rb = w.difference_to(bearing).degrees();
    let fetches = |t: Tack| {
        let s = t.sign() * rb;
        s >= up - TACTICAL_TOLERANCE && s <= down.degrees() + TACTICAL_TOLERANCE
    };
    if fetches(tack.other()) {
        return Decision::turn(bearing, tack.gybe_direction());
    }
    if fetches(tack) {
        return steer_to(heading, bearing);
    }

    if let Some(wanted) = channel_tack(ctx, &mark, channel) {
        if wanted != tack {
            return Decision::turn(wanted.heading(w, down), tack.gybe_direction());
        }
    }

    if flags.downwind_sail_on_best_gybe {
        let run = ctx.mean_wind.inverse();
        let off_run = |t: Tack| run.difference_to(t.heading(w, down)).degrees().abs();
        let (s, p) = (off_run(Tack::Starboard), off_run(Tack::Port));
        let best = if s + TACTICAL_TOLERANCE < p {
            Some(Tack::Starboard)
        } else if p + TACTICAL_TOLERANCE < s {
            Some(Tack::Port)
        } else {
            None
        };
        if let Some(best) = best.filter(|b| *b != tack) {
            return Decision::turn(best.heading(w, down), tack.gybe_direction());
        }
    }

    let r = ctx.relative_wind().degrees().abs();
    if r < down.degrees() - TACTICAL_TOLERANCE {
        if flags.downwind_bear_away_if_headed {
            return Decision::turn(tack.heading(w, down), tack.bear_away_direction());
        }
    } else if r > down.degrees() + TACTICAL_TOLERANCE {
        if flags.downwind_gybe_if_lifted {
            return Decision::turn(tack.other().heading(w, down), tack.gybe_direction());
        }
        if flags.downwind_luff_up_if_lifted {
            return Decision::turn(tack.heading(w, down), tack.luff_direction());
        }
    }
    Decision::SailOn
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::TacticalFlags;
    use super::*;
    use crate::decision::TurnDirection;

    fn expect_turn(d: Decision, target: f64, direction: TurnDirection) {
        match d {
            Decision::Turn { target: t, direction: dir } => {
                assert!(close(t, target), "target {t} != {target}");
                assert_eq!(dir, direction);
            }
            other => panic!("expected TURN, got {other}"),
        }
    }

    fn far_north() -> Location {
        Location::new(500.0, 900.0)
    }

    fn far_south() -> Location {
        Location::new(500.0, 100.0)
    }

    fn windward_at(x: f64, y: f64, heading: f64, wind: f64, mean: f64, flags: TacticalFlags) -> Decision {
        let m = laser();
        let b = boat(x, y, heading, &m);
        let c = ctx(&b, &m, &flags, wind, mean);
        SailingStrategy::Windward.decide(&c, far_north(), far_north(), Channel::Disabled)
    }

    #[test]
    fn luffs_when_lifted_on_starboard() {
        let flags = TacticalFlags { upwind_luff_up_if_lifted: true, ..Default::default() };
        // wind veers from 0° to 5° under a boat closehauled on starboard
        let d = windward_at(500.0, 100.0, -45.0, 5.0, 0.0, flags);
        expect_turn(d, -40.0, TurnDirection::Clockwise);
    }

    #[test]
    fn lift_ignored_without_flag() {
        let d = windward_at(500.0, 100.0, -45.0, 5.0, 0.0, TacticalFlags::default());
        assert_eq!(d, Decision::SailOn);
    }

    #[test]
    fn header_tacks_or_bears_away() {
        let tack = TacticalFlags { upwind_tack_if_headed: true, ..Default::default() };
        expect_turn(windward_at(500.0, 100.0, -45.0, -10.0, 0.0, tack), 35.0, TurnDirection::Clockwise);

        let bear = TacticalFlags { upwind_bear_away_if_headed: true, ..Default::default() };
        expect_turn(windward_at(500.0, 100.0, -45.0, -10.0, 0.0, bear), -55.0, TurnDirection::Anticlockwise);

        let both = TacticalFlags { upwind_tack_if_headed: true, upwind_bear_away_if_headed: true, ..Default::default() };
        expect_turn(windward_at(500.0, 100.0, -45.0, -10.0, 0.0, both), -55.0, TurnDirection::Anticlockwise);

        // no flags: the no-go correction still applies
        let none = TacticalFlags::default();
        expect_turn(windward_at(500.0, 100.0, -45.0, -10.0, 0.0, none), -55.0, TurnDirection::Anticlockwise);
    }

    #[test]
    fn tacks_on_layline() {
        let m = laser();
        let flags = TacticalFlags::default();
        let b = boat(300.0, 500.0, -45.0, &m);
        let c = ctx(&b, &m, &flags, 0.0, 0.0);
        let target = Location::new(500.0, 700.0);
        expect_turn(SailingStrategy::Windward.decide(&c, target, target, Channel::Disabled), 45.0, TurnDirection::Clockwise);
    }

    #[test]
    fn bears_away_when_overstood() {
        let m = laser();
        let flags = TacticalFlags::default();
        let b = boat(500.0, 500.0, -45.0, &m);
        let c = ctx(&b, &m, &flags, 0.0, 0.0);
        let target = Location::new(500.0 - 200.0 * 60f64.to_radians().tan(), 700.0);
        expect_turn(SailingStrategy::Windward.decide(&c, target, target, Channel::Disabled), -60.0, TurnDirection::Anticlockwise);
    }

    #[test]
    fn best_tack_after_veer() {
        let flags = TacticalFlags { upwind_sail_on_best_tack: true, ..Default::default() };
        expect_turn(windward_at(500.0, 100.0, 55.0, 10.0, 0.0, flags), -35.0, TurnDirection::Anticlockwise);
        // already on the lifted tack
        assert_eq!(windward_at(500.0, 100.0, -35.0, 10.0, 0.0, flags), Decision::SailOn);
    }

    #[test]
    fn channel_sends_boat_back() {
        let m = laser();
        let flags = TacticalFlags::default();
        let b = boat(700.0, 300.0, 45.0, &m);
        let c = ctx(&b, &m, &flags, 0.0, 0.0);
        let d = SailingStrategy::Windward.decide(&c, far_north(), far_north(), Channel::new(100.0, 100.0));
        expect_turn(d, -45.0, TurnDirection::Anticlockwise);

        // inside the release distance the channel no longer applies
        let b = boat(620.0, 850.0, 45.0, &m);
        let c = ctx(&b, &m, &flags, 0.0, 0.0);
        let target = Location::new(900.0, 1900.0);
        let d = SailingStrategy::Windward.decide(&c, target, far_north(), Channel::new(100.0, 100.0));
        assert_eq!(d, Decision::SailOn);
    }

    #[test]
    fn turn_in_progress_continues() {
        let m = laser();
        let flags = TacticalFlags { upwind_luff_up_if_lifted: true, ..Default::default() };
        let b = boat(500.0, 100.0, -45.0, &m);
        let mut c = ctx(&b, &m, &flags, 5.0, 0.0);
        let previous = Decision::turn(Angle::new(45.0), TurnDirection::Clockwise);
        c.previous = previous;
        for s in [SailingStrategy::Windward, SailingStrategy::Offwind, SailingStrategy::GybingDownwind] {
            assert_eq!(s.decide(&c, far_north(), far_north(), Channel::Disabled), previous);
        }
    }

    #[test]
    fn limits_come_first() {
        let m = laser();
        let flags = TacticalFlags::default();
        let b = boat(500.0, 990.0, 30.0, &m);
        let c = ctx(&b, &m, &flags, 90.0, 90.0);
        let d = SailingStrategy::Offwind.decide(&c, far_north(), far_north(), Channel::Disabled);
        expect_turn(d, 150.0, TurnDirection::Clockwise);
    }

    #[test]
    fn offwind_steers_for_mark_within_angles() {
        let m = laser();
        let flags = TacticalFlags::default();
        let b = boat(500.0, 500.0, 90.0, &m);
        let c = ctx(&b, &m, &flags, 0.0, 0.0);
        let decide = |x: f64, y: f64| SailingStrategy::Offwind.decide(&c, Location::new(x, y), Location::new(x, y), Channel::Disabled);

        assert_eq!(decide(800.0, 500.0), Decision::SailOn);
        let expected = Location::new(500.0, 500.0).bearing_to(&Location::new(800.0, 400.0)).degrees();
        expect_turn(decide(800.0, 400.0), expected, TurnDirection::Clockwise);
        // too close to the wind: held at closehauled
        expect_turn(decide(600.0, 900.0), 45.0, TurnDirection::Anticlockwise);
        // too deep: held at the downwind angle
        expect_turn(decide(510.0, 100.0), 150.0, TurnDirection::Clockwise);
    }

    fn gybing_at(heading: f64, wind: f64, mean: f64, flags: TacticalFlags) -> Decision {
        let m = laser();
        let b = boat(500.0, 900.0, heading, &m);
        let c = ctx(&b, &m, &flags, wind, mean);
        SailingStrategy::GybingDownwind.decide(&c, far_south(), far_south(), Channel::Disabled)
    }

    #[test]
    fn gybing_holds_downwind_angle() {
        assert_eq!(gybing_at(-150.0, 0.0, 0.0, TacticalFlags::default()), Decision::SailOn);
    }

    #[test]
    fn gybing_reacts_to_lift() {
        let gybe = TacticalFlags { downwind_gybe_if_lifted: true, ..Default::default() };
        expect_turn(gybing_at(-150.0, 10.0, 10.0, gybe), 160.0, TurnDirection::Anticlockwise);

        let luff = TacticalFlags { downwind_luff_up_if_lifted: true, ..Default::default() };
        expect_turn(gybing_at(-150.0, 10.0, 10.0, luff), -140.0, TurnDirection::Clockwise);

        assert_eq!(gybing_at(-150.0, 10.0, 10.0, TacticalFlags::default()), Decision::SailOn);
    }

    #[test]
    fn gybing_bears_away_when_headed() {
        let bear = TacticalFlags { downwind_bear_away_if_headed: true, ..Default::default() };
        expect_turn(gybing_at(-150.0, -10.0, -10.0, bear), -160.0, TurnDirection::Anticlockwise);
        assert_eq!(gybing_at(-150.0, -10.0, -10.0, TacticalFlags::default()), Decision::SailOn);
    }

    #[test]
    fn gybes_onto_best_gybe() {
        let flags = TacticalFlags { downwind_sail_on_best_gybe: true, ..Default::default() };
        expect_turn(gybing_at(-140.0, 10.0, 0.0, flags), 160.0, TurnDirection::Anticlockwise);
        assert_eq!(gybing_at(160.0, 10.0, 0.0, flags), Decision::SailOn);
    }

    #[test]
    fn gybes_on_layline() {
        let m = laser();
        let flags = TacticalFlags::default();
        let b = boat(300.0, 500.0, -150.0, &m);
        let c = ctx(&b, &m, &flags, 0.0, 0.0);
        let target = Location::new(600.0, 100.0);
        let expected = b.location.bearing_to(&target).degrees();
        let d = SailingStrategy::GybingDownwind.decide(&c, target, target, Channel::Disabled);
        expect_turn(d, expected, TurnDirection::Anticlockwise);
    }

    #[test]
    fn downwind_channel_sends_boat_back() {
        let m = laser();
        let flags = TacticalFlags::default();
        let b = boat(700.0, 700.0, 150.0, &m);
        let c = ctx(&b, &m, &flags, 0.0, 0.0);
        let d = SailingStrategy::GybingDownwind.decide(&c, far_south(), far_south(), Channel::new(100.0, 100.0));
        expect_turn(d, -150.0, TurnDirection::Clockwise);
    }
}
