//! scenario.rs — Scenario documents: parsing, validation and serialisation
//!
//! A scenario is a single JSON document. Everything is resolved and checked
//! here, once, so that a [`crate::simulation::SimulationState`] is never
//! partially built from a bad document. Errors carry either the line/column of
//! a syntax problem or a JSON path such as `boats[1].location`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::boat::{BoatClass, BoatMetrics};
use crate::course::{Channel, Course, Mark, RoundingSide};
use crate::error::{Result, SimError};
use crate::flow::FlowConfig;
use crate::geometry::{Angle, Area, Location};
use crate::strategy::TacticalFlags;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub name: String,
    /// Seeds the random shift streams; wind uses `seed`, water `seed + 1`
    #[serde(default)]
    pub seed: u64,
    pub field: Area,
    pub wind: FlowConfig,
    /// Omitted means slack water
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water: Option<FlowConfig>,
    pub marks: Vec<Mark>,
    pub course: CourseConfig,
    pub boats: Vec<BoatConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseConfig {
    pub start: Location,
    pub legs: Vec<LegConfig>,
}

/// Sail to the named mark and leave it on `rounding`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegConfig {
    pub mark: String,
    pub rounding: RoundingSide,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoatConfig {
    pub name: String,
    pub class: BoatClass,
    /// Required for `custom`; replaces the class table otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<BoatMetrics>,
    pub location: Location,
    pub heading: Angle,
    /// Initial speed through the water, knots
    #[serde(default)]
    pub speed: f64,
    #[serde(flatten)]
    pub flags: TacticalFlags,
    #[serde(default, rename = "upwindchannel", skip_serializing_if = "is_disabled")]
    pub upwind_channel: Channel,
    #[serde(default, rename = "downwindchannel", skip_serializing_if = "is_disabled")]
    pub downwind_channel: Channel,
}

fn is_disabled(c: &Channel) -> bool {
    !c.is_enabled()
}

impl BoatConfig {
    /// Metrics in force for this boat.
    pub fn resolve_metrics(&self, path: &str) -> Result<BoatMetrics> {
        let metrics = match (&self.metrics, self.class) {
            (Some(m), _) => m.clone(),
            (None, BoatClass::Custom) => {
                return Err(SimError::config(format!("{path}.metrics"), "required for class custom"));
            }
            (None, class) => BoatMetrics::for_class(class)
                .ok_or_else(|| SimError::Internal(format!("no built-in metrics for {class:?}")))?,
        };
        metrics.validate(&format!("{path}.metrics"))?;
        Ok(metrics)
    }
}

impl ScenarioConfig {
    /// Parse and validate a scenario document.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: ScenarioConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| SimError::Internal(format!("scenario serialisation: {e}")))
    }

    /// Water flow, slack when the document has none.
    pub fn water_or_slack(&self) -> FlowConfig {
        self.water.clone().unwrap_or_else(|| FlowConfig::slack(self.field))
    }

    /// Semantic checks. Flow grid coverage is checked when the flow is sampled.
    pub fn validate(&self) -> Result<()> {
        let field = &self.field;
        if !field.is_valid() {
            return Err(SimError::config("field", "width and height must be positive and finite"));
        }
        self.wind.validate("wind", field)?;
        if let Some(water) = &self.water {
            water.validate("water", field)?;
        }

        let mut names = HashSet::new();
        for (i, mark) in self.marks.iter().enumerate() {
            let path = format!("marks[{i}]");
            if mark.name.is_empty() {
                return Err(SimError::config(format!("{path}.name"), "must not be empty"));
            }
            if !names.insert(mark.name.as_str()) {
                return Err(SimError::config(format!("{path}.name"), format!("duplicate mark '{}'", mark.name)));
            }
            check_on_field(field, &mark.location, &format!("{path}.location"))?;
        }

        check_on_field(field, &self.course.start, "course.start")?;
        if self.course.legs.is_empty() {
            return Err(SimError::config("course.legs", "at least one leg is required"));
        }
        for (i, leg) in self.course.legs.iter().enumerate() {
            if !names.contains(leg.mark.as_str()) {
                return Err(SimError::config(format!("course.legs[{i}].mark"), format!("unknown mark '{}'", leg.mark)));
            }
        }

        if self.boats.is_empty() {
            return Err(SimError::config("boats", "at least one boat is required"));
        }
        for (i, boat) in self.boats.iter().enumerate() {
            let path = format!("boats[{i}]");
            if boat.name.is_empty() {
                return Err(SimError::config(format!("{path}.name"), "must not be empty"));
            }
            boat.resolve_metrics(&path)?;
            check_on_field(field, &boat.location, &format!("{path}.location"))?;
            if !boat.heading.is_finite() {
                return Err(SimError::config(format!("{path}.heading"), "not a finite angle"));
            }
            if !boat.speed.is_finite() || boat.speed < 0.0 {
                return Err(SimError::config(format!("{path}.speed"), format!("invalid speed {}", boat.speed)));
            }
            for (key, channel) in [("upwindchannel", boat.upwind_channel), ("downwindchannel", boat.downwind_channel)] {
                if let Channel::Enabled { west_offset, east_offset } = channel {
                    let ok = |v: f64| v.is_finite() && v >= 0.0;
                    if !ok(west_offset) || !ok(east_offset) {
                        return Err(SimError::config(format!("{path}.{key}"), "offsets must be finite and >= 0"));
                    }
                }
            }
        }
        Ok(())
    }

    /// Resolve leg mark names into a course.
    pub fn build_course(&self) -> Result<Course> {
        let mut marks = Vec::with_capacity(self.course.legs.len());
        for (i, leg) in self.course.legs.iter().enumerate() {
            let mark = self
                .marks
                .iter()
                .find(|m| m.name == leg.mark)
                .ok_or_else(|| SimError::config(format!("course.legs[{i}].mark"), format!("unknown mark '{}'", leg.mark)))?;
            marks.push((mark.clone(), leg.rounding));
        }
        Ok(Course::new(self.course.start, &marks))
    }
}

fn check_on_field(field: &Area, p: &Location, path: &str) -> Result<()> {
    if !p.is_finite() || !field.contains(p) {
        return Err(SimError::config(path, format!("({:.1}, {:.1}) is off the field of play", p.x, p.y)));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Windward/leeward course in a steady northerly, two boats.
    pub const WINDWARD_LEEWARD: &str = r#"{
  "name": "windward-leeward",
  "seed": 7,
  "field": { "west": 0, "south": 0, "width": 1000, "height": 1000 },
  "wind": {
    "components": [
      { "type": "constant", "area": { "west": 0, "south": 0, "width": 1000, "height": 1000 }, "speed": 12, "angle": 0 }
    ],
    "swingangle": 5,
    "swingperiod": 120
  },
  "marks": [
    { "name": "windward", "location": { "x": 500, "y": 800 } },
    { "name": "leeward", "location": { "x": 500, "y": 250 } }
  ],
  "course": {
    "start": { "x": 500, "y": 200 },
    "legs": [
      { "mark": "windward", "rounding": "port" },
      { "mark": "leeward", "rounding": "port" }
    ]
  },
  "boats": [
    {
      "name": "Alpha", "class": "laser",
      "location": { "x": 480, "y": 180 }, "heading": -45,
      "upwindluffupiflifted": true, "upwindbearawayifheaded": true,
      "upwindchannel": { "westoffset": 150, "eastoffset": 150 }
    },
    {
      "name": "Bravo", "class": "topper",
      "location": { "x": 520, "y": 180 }, "heading": 45, "speed": 2,
      "upwindtackifheaded": true, "downwindgybeiflifted": true
    }
  ]
}"#;
}

#[cfg(test)]
mod tests {
    use super::fixtures::WINDWARD_LEEWARD;
    use super::*;

    fn parsed() -> ScenarioConfig {
        ScenarioConfig::from_json(WINDWARD_LEEWARD).unwrap()
    }

    #[test]
    fn parses_document() {
        let s = parsed();
        assert_eq!(s.name, "windward-leeward");
        assert_eq!(s.seed, 7);
        assert_eq!(s.marks.len(), 2);
        assert!(s.water.is_none());
        assert_eq!(s.wind.variation.swing_period, 120.0);

        let alpha = &s.boats[0];
        assert_eq!(alpha.class, BoatClass::Laser);
        assert!(alpha.flags.upwind_luff_up_if_lifted);
        assert!(!alpha.flags.upwind_tack_if_headed);
        assert_eq!(alpha.upwind_channel, Channel::new(150.0, 150.0));
        assert_eq!(alpha.downwind_channel, Channel::Disabled);
        assert_eq!(s.boats[1].class, BoatClass::Topper);
        assert_eq!(s.boats[1].speed, 2.0);
    }

    #[test]
    fn json_roundtrip_is_identical() {
        let s = parsed();
        let again = ScenarioConfig::from_json(&s.to_json().unwrap()).unwrap();
        assert_eq!(s, again);
    }

    #[test]
    fn syntax_error_has_line_and_column() {
        let broken = WINDWARD_LEEWARD.replacen("\"seed\": 7,", "\"seed\": 7", 1);
        match ScenarioConfig::from_json(&broken).unwrap_err() {
            SimError::Parse { line, column, .. } => {
                assert_eq!(line, 4);
                assert!(column > 0);
            }
            other => panic!("expected parse error, got {other}"),
        }
    }

    #[test]
    fn unknown_boat_class_is_parse_error() {
        let doc = WINDWARD_LEEWARD.replace("\"topper\"", "\"optimist\"");
        assert!(matches!(ScenarioConfig::from_json(&doc), Err(SimError::Parse { .. })));
    }

    #[test]
    fn boat_off_field_reports_path() {
        let doc = WINDWARD_LEEWARD.replace("{ \"x\": 520, \"y\": 180 }", "{ \"x\": 1520, \"y\": 180 }");
        let err = ScenarioConfig::from_json(&doc).unwrap_err();
        assert!(matches!(err, SimError::Config { ref path, .. } if path == "boats[1].location"), "{err}");
    }

    #[test]
    fn unknown_leg_mark_reports_path() {
        let doc = WINDWARD_LEEWARD.replace("{ \"mark\": \"leeward\"", "{ \"mark\": \"gate\"");
        let err = ScenarioConfig::from_json(&doc).unwrap_err();
        assert!(matches!(err, SimError::Config { ref path, .. } if path == "course.legs[1].mark"), "{err}");
    }

    #[test]
    fn custom_class_needs_metrics() {
        let doc = WINDWARD_LEEWARD.replace("\"laser\"", "\"custom\"");
        let err = ScenarioConfig::from_json(&doc).unwrap_err();
        assert!(matches!(err, SimError::Config { ref path, .. } if path == "boats[0].metrics"), "{err}");
    }

    #[test]
    fn custom_metrics_are_used() {
        let mut s = parsed();
        let mut m = BoatMetrics::for_class(BoatClass::Laser).unwrap();
        m.max_speed = 6.0;
        s.boats[0].class = BoatClass::Custom;
        s.boats[0].metrics = Some(m.clone());
        s.validate().unwrap();
        assert_eq!(s.boats[0].resolve_metrics("boats[0]").unwrap(), m);
    }

    #[test]
    fn wind_component_outside_field_rejected() {
        let mut s = parsed();
        s.wind.components[0].area.width = 2000.0;
        let err = s.validate().unwrap_err();
        assert!(matches!(err, SimError::Config { ref path, .. } if path == "wind.components[0].area"), "{err}");
    }

    #[test]
    fn builds_course_from_mark_names() {
        let course = parsed().build_course().unwrap();
        assert_eq!(course.legs.len(), 2);
        assert_eq!(course.legs[0].start, Location::new(500.0, 200.0));
        assert_eq!(course.legs[0].end, Location::new(500.0, 800.0));
        assert_eq!(course.legs[1].mark_name, "leeward");
        assert_eq!(course.legs[1].rounding, RoundingSide::Port);
    }

    #[test]
    fn omitted_water_is_slack() {
        let s = parsed();
        let water = s.water_or_slack();
        assert_eq!(water.components.len(), 1);
        assert_eq!(water.components[0].area, s.field);
    }
}
