//! course.rs — Marks, legs, leg classification and lateral channels

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::boat::BoatMetrics;
use crate::geometry::{Angle, Location};

// ── Marks & legs ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    pub name: String,
    pub location: Location,
}

/// Side on which the mark is left while rounding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundingSide {
    Port,
    Starboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LegType {
    Windward,
    Offwind,
    GybingDownwind,
    /// No leg (after the final mark) or a zero-length leg
    None,
}

impl LegType {
    /// Classify a leg bearing against the mean wind using the boat's sailing angles.
    pub fn classify(bearing: Angle, mean_wind: Angle, metrics: &BoatMetrics) -> LegType {
        let off = mean_wind.difference_to(bearing).degrees().abs();
        if off < metrics.upwind_relative {
            LegType::Windward
        } else if off > metrics.downwind_relative {
            LegType::GybingDownwind
        } else {
            LegType::Offwind
        }
    }
}

impl fmt::Display for LegType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LegType::Windward => "WINDWARD",
            LegType::Offwind => "OFFWIND",
            LegType::GybingDownwind => "GYBINGDOWNWIND",
            LegType::None => "NONE",
        };
        f.write_str(s)
    }
}

/// One leg: sail from `start` to the mark at `end`, leaving it on `rounding`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseLeg {
    pub start: Location,
    pub end: Location,
    pub mark_name: String,
    pub rounding: RoundingSide,
}

impl CourseLeg {
    pub fn bearing(&self) -> Angle {
        self.start.bearing_to(&self.end)
    }

    pub fn length(&self) -> f64 {
        self.start.distance_to(&self.end)
    }

    pub fn leg_type(&self, mean_wind: Angle, metrics: &BoatMetrics) -> LegType {
        if self.length() == 0.0 {
            LegType::None
        } else {
            LegType::classify(self.bearing(), mean_wind, metrics)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Course {
    pub start: Location,
    pub legs: Vec<CourseLeg>,
}

impl Course {
    /// Chain `(mark, rounding)` pairs into consecutive legs beginning at `start`.
    pub fn new(start: Location, marks: &[(Mark, RoundingSide)]) -> Self {
        let mut legs = Vec::with_capacity(marks.len());
        let mut from = start;
        for (mark, rounding) in marks {
            legs.push(CourseLeg {
                start: from,
                end: mark.location,
                mark_name: mark.name.clone(),
                rounding: *rounding,
            });
            from = mark.location;
        }
        Self { start, legs }
    }
}

// ── Channel ───────────────────────────────────────────────────────────────────

/// Optional lateral corridor around the wind axis through a leg's mark.
/// Offsets are measured across the mean wind: west is to the left when
/// facing into the wind.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Channel {
    #[default]
    Disabled,
    Enabled {
        #[serde(rename = "westoffset")]
        west_offset: f64,
        #[serde(rename = "eastoffset")]
        east_offset: f64,
    },
}

impl Channel {
    pub fn new(west_offset: f64, east_offset: f64) -> Self {
        Channel::Enabled { west_offset, east_offset }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Channel::Enabled { .. })
    }

    /// Signed distance of `p` from the wind axis through `mark`; positive is east.
    pub fn cross_track(p: &Location, mark: &Location, mean_wind: Angle) -> f64 {
        let right = (mean_wind + Angle::RIGHT).radians();
        (p.x - mark.x) * right.sin() + (p.y - mark.y) * right.cos()
    }

    pub fn in_channel(&self, p: &Location, mark: &Location, mean_wind: Angle) -> bool {
        match *self {
            Channel::Disabled => true,
            Channel::Enabled { west_offset, east_offset } => {
                let c = Self::cross_track(p, mark, mean_wind);
                c >= -west_offset && c <= east_offset
            }
        }
    }

    /// The narrower of the two offsets; infinite when disabled.
    pub fn inner_offset(&self) -> f64 {
        match *self {
            Channel::Disabled => f64::INFINITY,
            Channel::Enabled { west_offset, east_offset } => west_offset.min(east_offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boat::BoatClass;

    fn laser() -> BoatMetrics {
        BoatMetrics::for_class(BoatClass::Laser).unwrap()
    }

    #[test]
    fn classifies_against_boat_angles() {
        let m = laser();
        let wind = Angle::ZERO;
        assert_eq!(LegType::classify(Angle::new(20.0), wind, &m), LegType::Windward);
        assert_eq!(LegType::classify(Angle::new(-44.0), wind, &m), LegType::Windward);
        assert_eq!(LegType::classify(Angle::new(90.0), wind, &m), LegType::Offwind);
        assert_eq!(LegType::classify(Angle::new(150.0), wind, &m), LegType::Offwind);
        assert_eq!(LegType::classify(Angle::new(175.0), wind, &m), LegType::GybingDownwind);
        assert_eq!(LegType::classify(Angle::new(-170.0), wind, &m), LegType::GybingDownwind);
        // wind from 170°: a leg toward -175° is 15° off the wind
        assert_eq!(LegType::classify(Angle::new(-175.0), Angle::new(170.0), &m), LegType::Windward);
    }

    #[test]
    fn legs_chain_from_start() {
        let marks = [
            (Mark { name: "windward".into(), location: Location::new(500.0, 900.0) }, RoundingSide::Port),
            (Mark { name: "leeward".into(), location: Location::new(500.0, 100.0) }, RoundingSide::Port),
        ];
        let course = Course::new(Location::new(500.0, 50.0), &marks);
        assert_eq!(course.legs.len(), 2);
        assert_eq!(course.legs[1].start, Location::new(500.0, 900.0));
        let m = laser();
        assert_eq!(course.legs[0].leg_type(Angle::ZERO, &m), LegType::Windward);
        assert_eq!(course.legs[1].leg_type(Angle::ZERO, &m), LegType::GybingDownwind);
    }

    #[test]
    fn zero_length_leg_is_none() {
        let leg = CourseLeg {
            start: Location::new(1.0, 1.0),
            end: Location::new(1.0, 1.0),
            mark_name: "x".into(),
            rounding: RoundingSide::Starboard,
        };
        assert_eq!(leg.leg_type(Angle::ZERO, &laser()), LegType::None);
    }

    #[test]
    fn channel_bounds() {
        let mark = Location::new(500.0, 900.0);
        let ch = Channel::new(100.0, 50.0);
        assert!(ch.in_channel(&Location::new(420.0, 300.0), &mark, Angle::ZERO));
        assert!(!ch.in_channel(&Location::new(560.0, 300.0), &mark, Angle::ZERO));
        assert!(!ch.in_channel(&Location::new(390.0, 300.0), &mark, Angle::ZERO));
        assert_eq!(ch.inner_offset(), 50.0);
        // wind from the east: "east" of the axis is now to the south
        assert!(Channel::cross_track(&Location::new(500.0, 800.0), &mark, Angle::new(90.0)) > 0.0);
    }

    #[test]
    fn disabled_channel_is_always_in() {
        let ch = Channel::Disabled;
        assert!(ch.in_channel(&Location::new(1.0e6, -1.0e6), &Location::new(0.0, 0.0), Angle::ZERO));
        assert!(!ch.is_enabled());
    }

    #[test]
    fn channel_json() {
        let ch: Channel = serde_json::from_str(r#"{"westoffset": 80, "eastoffset": 120}"#).unwrap();
        assert_eq!(ch, Channel::new(80.0, 120.0));
    }
}
