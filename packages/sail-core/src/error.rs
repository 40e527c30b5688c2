//! error.rs — Error kinds raised by the simulation core
//!
//! Three families, kept apart so callers can react differently:
//! - configuration errors (parse, config, unsupported rounding): fail at load time
//! - area violations: recoverable, the caller may clamp or skip the lookup
//! - internal-consistency failures: abort the current run

use thiserror::Error;

use crate::course::LegType;

pub type Result<T> = std::result::Result<T, SimError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SimError {
    /// Scenario document is not valid JSON or does not match the schema.
    #[error("scenario parse error at line {line}, column {column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    /// A value in the scenario is out of range or references something unknown.
    #[error("invalid configuration at {path}: {reason}")]
    Config { path: String, reason: String },

    /// No rounding strategy exists for this leg-type transition.
    #[error("unsupported rounding at leg {leg} ({from} -> {to})")]
    UnsupportedRounding {
        leg: usize,
        from: LegType,
        to: LegType,
    },

    /// A flow was sampled at a point outside its declared area.
    #[error("location ({x:.1}, {y:.1}) is outside the flow area")]
    AreaViolation { x: f64, y: f64 },

    /// tick() was called with a time earlier than the current simulation time.
    #[error("simulation time {requested}s is before current time {current}s")]
    InvalidTime { current: f64, requested: f64 },

    /// A state that the strategy layer can never produce reached the core.
    #[error("internal consistency failure: {0}")]
    Internal(String),
}

impl SimError {
    pub fn config(path: impl Into<String>, reason: impl Into<String>) -> Self {
        SimError::Config {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Configuration-time errors: the scenario must be fixed and reloaded.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            SimError::Parse { .. } | SimError::Config { .. } | SimError::UnsupportedRounding { .. }
        )
    }

    /// Errors the caller can recover from without discarding the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SimError::AreaViolation { .. } | SimError::InvalidTime { .. })
    }

    /// Programmer errors. The current run must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SimError::Internal(_))
    }
}

impl From<serde_json::Error> for SimError {
    fn from(e: serde_json::Error) -> Self {
        SimError::Parse {
            line: e.line(),
            column: e.column(),
            message: e.to_string(),
        }
    }
}
