//! sail-core — Deterministic sailing-race simulation
//!
//! Boats sail a course of marks through a wind field (and optional water
//! current). Each tick every boat asks its current leg's strategy for a
//! [`Decision`] and the kinematics step carries it out.
//!
//! ```text
//!   ScenarioConfig ──load_scenario──▶ SimulationState ──tick(t)──▶ SimulationState'
//!                                         │
//!                     Flow (wind, water) ─┼─ per boat: CourseLegWithStrategy
//!                                         │      SAILING ─▶ ROUNDING ─▶ next leg
//!                                         └─ decisions(): DecisionLogEntry stream
//! ```
//!
//! The crate does no I/O. Renderers read [`SimulationState::boats`] and
//! [`Flow::grid_samples`]; log viewers read [`SimulationState::decisions`].

pub mod boat;
pub mod course;
pub mod decision;
pub mod error;
pub mod flow;
pub mod geometry;
pub mod scenario;
pub mod simulation;
pub mod strategy;

pub use boat::{Boat, BoatClass, BoatMetrics};
pub use course::{Channel, Course, CourseLeg, LegType, Mark, RoundingSide};
pub use decision::{Decision, DecisionAction, DecisionLogEntry, TurnDirection};
pub use error::{Result, SimError};
pub use flow::{Flow, FlowComponent, FlowComponentSet, FlowConfig, FlowKind};
pub use geometry::{Angle, Area, DistanceVector, Location, PolarVector, SpeedVector};
pub use scenario::ScenarioConfig;
pub use simulation::{load_scenario, reset, tick, BoatView, Phase, SimulationState, Snapshot};
pub use strategy::{CourseLegWithStrategy, RoundingStrategy, SailingStrategy, TacticalFlags};
