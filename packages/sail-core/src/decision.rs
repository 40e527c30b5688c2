//! decision.rs — The manoeuvre chosen for a boat this tick
//!
//! A strategy returns a `Decision` value; the kinematics step consumes it and
//! hands back the decision still in force afterwards (a turn that reached its
//! target becomes `SailOn`). Nothing aliases it between the two.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::geometry::Angle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnDirection {
    Clockwise,
    Anticlockwise,
}

impl TurnDirection {
    /// Direction of the shortest turn from `from` to `to`.
    pub fn shortest(from: Angle, to: Angle) -> Self {
        if from.difference_to(to).degrees() >= 0.0 {
            TurnDirection::Clockwise
        } else {
            TurnDirection::Anticlockwise
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            TurnDirection::Clockwise => TurnDirection::Anticlockwise,
            TurnDirection::Anticlockwise => TurnDirection::Clockwise,
        }
    }

    /// +1 for clockwise, -1 for anticlockwise.
    pub fn sign(self) -> f64 {
        match self {
            TurnDirection::Clockwise => 1.0,
            TurnDirection::Anticlockwise => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Decision {
    /// Hold the current heading
    #[serde(rename = "SAILON")]
    SailOn,
    /// No movement
    #[serde(rename = "STOP")]
    Stop,
    /// Turn toward `target` in `direction`
    #[serde(rename = "TURN")]
    Turn { target: Angle, direction: TurnDirection },
    /// The rounding turn onto the next leg
    #[serde(rename = "MARKROUNDING")]
    MarkRounding { target: Angle, direction: TurnDirection },
}

impl Decision {
    pub fn turn(target: Angle, direction: TurnDirection) -> Self {
        Decision::Turn { target, direction }
    }

    pub fn action(&self) -> DecisionAction {
        match self {
            Decision::SailOn => DecisionAction::SailOn,
            Decision::Stop => DecisionAction::Stop,
            Decision::Turn { .. } => DecisionAction::Turn,
            Decision::MarkRounding { .. } => DecisionAction::MarkRounding,
        }
    }

    /// True while a turn is still in progress.
    pub fn is_turning(&self) -> bool {
        matches!(self, Decision::Turn { .. } | Decision::MarkRounding { .. })
    }

    pub fn target(&self) -> Option<(Angle, TurnDirection)> {
        match *self {
            Decision::Turn { target, direction } | Decision::MarkRounding { target, direction } => {
                Some((target, direction))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::SailOn => write!(f, "SAILON"),
            Decision::Stop => write!(f, "STOP"),
            Decision::Turn { target, direction } => write!(f, "TURN {target} {direction:?}"),
            Decision::MarkRounding { target, direction } => write!(f, "MARKROUNDING {target} {direction:?}"),
        }
    }
}

// ── Wire codes ────────────────────────────────────────────────────────────────

/// Numeric action codes used by decision-log consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum DecisionAction {
    SailOn = 0,
    Stop = 1,
    Turn = 2,
    MarkRounding = 3,
}

impl TryFrom<u8> for DecisionAction {
    type Error = SimError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::SailOn),
            1 => Ok(Self::Stop),
            2 => Ok(Self::Turn),
            3 => Ok(Self::MarkRounding),
            other => Err(SimError::Internal(format!("unknown decision action code {other}"))),
        }
    }
}

// ── Decision log ──────────────────────────────────────────────────────────────

/// One entry of the decision-log stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionLogEntry {
    pub sim_time: f64,
    pub boat_id: usize,
    pub boat_name: String,
    pub decision: Decision,
}
