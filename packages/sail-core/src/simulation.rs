//! simulation.rs — Scenario loading and the tick driver
//!
//! A [`SimulationState`] is a value: `tick` clones it, advances the clone and
//! hands it back, so a failed tick leaves the caller holding the previous
//! state untouched. Within a tick the wind and water flows advance first, then
//! every boat in index order:
//! 1. sample wind and water at the boat (clamped onto the field if it strayed)
//! 2. SAILING → ROUNDING within 3 boat lengths of the mark
//! 3. ask the leg's sailing or rounding strategy for a decision
//! 4. log the decision if it differs from the one in force
//! 5. move the boat; a completed rounding advances the leg or finishes the boat

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::boat::{Boat, BoatMetrics};
use crate::course::{Course, LegType};
use crate::decision::{Decision, DecisionLogEntry};
use crate::error::{Result, SimError};
use crate::flow::Flow;
use crate::geometry::{Angle, Area, Location, SpeedVector};
use crate::scenario::ScenarioConfig;
use crate::strategy::{CourseLegWithStrategy, StrategyContext, TacticalFlags};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Sailing,
    Rounding,
    Finished,
}

#[derive(Debug, Clone)]
struct BoatEntry {
    name: String,
    metrics: BoatMetrics,
    flags: TacticalFlags,
    boat: Boat,
    legs: Arc<[CourseLegWithStrategy]>,
    leg_index: usize,
    phase: Phase,
    decision: Decision,
    /// Spacer clearance seen on the last rounding tick, while rounding
    clearance: Option<f64>,
}

/// Read-only view of one boat for renderers and loggers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoatView<'a> {
    pub id: usize,
    pub name: &'a str,
    pub location: Location,
    pub heading: Angle,
    pub speed: f64,
    pub track: &'a [Location],
    pub leg_index: usize,
    pub leg_type: LegType,
    pub phase: Phase,
    pub decision: Decision,
    pub finished: bool,
}

/// Comparable copy of everything that changes from tick to tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub sim_time: f64,
    pub wind_swing: Angle,
    pub wind_shift: Angle,
    pub water_swing: Angle,
    pub water_shift: Angle,
    pub boats: Vec<BoatSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoatSnapshot {
    pub boat: Boat,
    pub leg_index: usize,
    pub phase: Phase,
    pub decision: Decision,
}

#[derive(Debug, Clone)]
pub struct SimulationState {
    config: Arc<ScenarioConfig>,
    sim_time: f64,
    wind: Flow,
    water: Flow,
    course: Course,
    boats: Vec<BoatEntry>,
    decisions: Vec<DecisionLogEntry>,
}

/// Validate `config` and build the initial state at time 0.
pub fn load_scenario(config: &ScenarioConfig) -> Result<SimulationState> {
    SimulationState::build(Arc::new(config.clone()))
}

/// Advance `state` to `sim_time` seconds.
pub fn tick(state: &SimulationState, sim_time: f64) -> Result<SimulationState> {
    state.tick(sim_time)
}

/// Reload the initial conditions of the scenario `state` was loaded from.
pub fn reset(state: &SimulationState) -> Result<SimulationState> {
    state.reset()
}

impl SimulationState {
    fn build(config: Arc<ScenarioConfig>) -> Result<Self> {
        config.validate()?;
        let field = config.field;
        let wind = Flow::new("wind", &config.wind, field, config.seed)?;
        let water = Flow::new("water", &config.water_or_slack(), field, config.seed.wrapping_add(1))?;
        let course = config.build_course()?;
        let mean_wind = wind.mean_angle();

        let mut boats = Vec::with_capacity(config.boats.len());
        for (i, bc) in config.boats.iter().enumerate() {
            let metrics = bc.resolve_metrics(&format!("boats[{i}]"))?;
            let legs = course
                .legs
                .iter()
                .enumerate()
                .map(|(n, leg)| {
                    CourseLegWithStrategy::new(
                        n,
                        leg,
                        course.legs.get(n + 1),
                        &metrics,
                        mean_wind,
                        bc.upwind_channel,
                        bc.downwind_channel,
                    )
                })
                .collect::<Result<Vec<_>>>()?;
            debug!(
                "{}: legs {:?}",
                bc.name,
                legs.iter().map(|l| l.leg_type).collect::<Vec<_>>()
            );
            boats.push(BoatEntry {
                name: bc.name.clone(),
                boat: Boat::new(bc.location, bc.heading, bc.speed, &metrics),
                metrics,
                flags: bc.flags,
                legs: legs.into(),
                leg_index: 0,
                phase: Phase::Sailing,
                decision: Decision::SailOn,
                clearance: None,
            });
        }

        info!(
            "scenario '{}' loaded: {} boats, {} legs, mean wind {}",
            config.name,
            boats.len(),
            course.legs.len(),
            mean_wind
        );

        Ok(Self {
            config,
            sim_time: 0.0,
            wind,
            water,
            course,
            boats,
            decisions: Vec::new(),
        })
    }

    pub fn tick(&self, sim_time: f64) -> Result<SimulationState> {
        if !sim_time.is_finite() || sim_time < self.sim_time {
            return Err(SimError::InvalidTime { current: self.sim_time, requested: sim_time });
        }
        let dt = sim_time - self.sim_time;
        let mut next = self.clone();
        next.sim_time = sim_time;
        next.decisions.clear();
        next.wind.timer_advance(sim_time);
        next.water.timer_advance(sim_time);

        let field = next.config.field;
        for (id, entry) in next.boats.iter_mut().enumerate() {
            step_boat(id, entry, &next.wind, &next.water, field, sim_time, dt, &mut next.decisions)?;
        }
        Ok(next)
    }

    pub fn reset(&self) -> Result<SimulationState> {
        info!("scenario '{}' reset", self.config.name);
        Self::build(Arc::clone(&self.config))
    }

    // ── Read accessors ────────────────────────────────────────────────────────

    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn course(&self) -> &Course {
        &self.course
    }

    pub fn wind(&self) -> &Flow {
        &self.wind
    }

    pub fn water(&self) -> &Flow {
        &self.water
    }

    pub fn wind_at(&self, p: &Location) -> Result<SpeedVector> {
        self.wind.get_flow(p)
    }

    pub fn water_at(&self, p: &Location) -> Result<SpeedVector> {
        self.water.get_flow(p)
    }

    /// Decision-log entries produced by the most recent tick.
    pub fn decisions(&self) -> &[DecisionLogEntry] {
        &self.decisions
    }

    pub fn boat_count(&self) -> usize {
        self.boats.len()
    }

    pub fn boat(&self, id: usize) -> Option<BoatView<'_>> {
        self.boats.get(id).map(|e| view(id, e))
    }

    pub fn boats(&self) -> impl Iterator<Item = BoatView<'_>> + '_ {
        self.boats.iter().enumerate().map(|(id, e)| view(id, e))
    }

    pub fn all_finished(&self) -> bool {
        self.boats.iter().all(|e| e.phase == Phase::Finished)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            sim_time: self.sim_time,
            wind_swing: self.wind.swing(),
            wind_shift: self.wind.shift(),
            water_swing: self.water.swing(),
            water_shift: self.water.shift(),
            boats: self
                .boats
                .iter()
                .map(|e| BoatSnapshot {
                    boat: e.boat.clone(),
                    leg_index: e.leg_index,
                    phase: e.phase,
                    decision: e.decision,
                })
                .collect(),
        }
    }
}

fn view(id: usize, e: &BoatEntry) -> BoatView<'_> {
    BoatView {
        id,
        name: &e.name,
        location: e.boat.location,
        heading: e.boat.heading,
        speed: e.boat.speed,
        track: &e.boat.track,
        leg_index: e.leg_index,
        leg_type: e.legs.get(e.leg_index).map_or(LegType::None, |l| l.leg_type),
        phase: e.phase,
        decision: e.decision,
        finished: e.phase == Phase::Finished,
    }
}

/// Flow at `p`, read from the nearest edge if the boat has left the field.
fn sample(flow: &Flow, what: &str, boat: &str, p: &Location) -> SpeedVector {
    match flow.get_flow(p) {
        Ok(v) => v,
        Err(_) => {
            warn!("{boat}: {what} sampled off the field at ({:.1}, {:.1}), clamping", p.x, p.y);
            flow.get_flow_clamped(p)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn step_boat(
    id: usize,
    entry: &mut BoatEntry,
    wind: &Flow,
    water: &Flow,
    field: Area,
    sim_time: f64,
    dt: f64,
    log: &mut Vec<DecisionLogEntry>,
) -> Result<()> {
    if entry.phase == Phase::Finished {
        return Ok(());
    }
    let legs = Arc::clone(&entry.legs);
    let leg = legs
        .get(entry.leg_index)
        .ok_or_else(|| SimError::Internal(format!("{}: leg {} out of range", entry.name, entry.leg_index)))?;

    let wind_v = sample(wind, "wind", &entry.name, &entry.boat.location);
    let water_v = sample(water, "water", &entry.name, &entry.boat.location);

    let close = leg.close_to_mark(&entry.boat.location, &entry.metrics);
    let phase = match entry.phase {
        Phase::Sailing if close => Phase::Rounding,
        Phase::Rounding if !close => Phase::Sailing,
        p => p,
    };
    if phase != entry.phase {
        debug!("{}: {:?} -> {:?} at mark '{}'", entry.name, entry.phase, phase, leg.leg.mark_name);
    }

    let (decision, completed) = {
        let ctx = StrategyContext {
            boat: &entry.boat,
            metrics: &entry.metrics,
            flags: &entry.flags,
            wind: wind_v,
            mean_wind: wind.mean_angle(),
            field,
            previous: entry.decision,
        };
        match phase {
            Phase::Rounding => {
                let outcome = leg.decide_rounding(&ctx, entry.clearance);
                entry.clearance = Some(outcome.clearance);
                (outcome.decision, outcome.completed)
            }
            _ => {
                entry.clearance = None;
                (leg.decide_sailing(&ctx), false)
            }
        }
    };

    if decision != entry.decision {
        debug!("{}: {decision} at t={sim_time}", entry.name);
        log.push(DecisionLogEntry { sim_time, boat_id: id, boat_name: entry.name.clone(), decision });
    }

    entry.decision = entry.boat.advance(decision, wind_v, water_v, &entry.metrics, dt)?;
    entry.phase = phase;

    if completed {
        entry.clearance = None;
        if entry.leg_index + 1 < legs.len() {
            entry.leg_index += 1;
            entry.phase = Phase::Sailing;
            info!(
                "{} rounded '{}' at t={sim_time:.0}s, now on leg {} ({})",
                entry.name, leg.leg.mark_name, entry.leg_index, legs[entry.leg_index].leg_type
            );
        } else {
            entry.phase = Phase::Finished;
            entry.decision = Decision::Stop;
            log.push(DecisionLogEntry { sim_time, boat_id: id, boat_name: entry.name.clone(), decision: Decision::Stop });
            info!("{} finished at t={sim_time:.0}s", entry.name);
        }
    }
    Ok(())
}
