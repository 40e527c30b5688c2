//! telemetry.rs — JSON messages sent to WebSocket clients
//!
//! Three message types, tagged by `type`:
//! - `telemetry`: every tick, boat views (trail trimmed) plus that tick's decisions
//! - `scenario`: on connect, the loaded scenario document (marks, course, boats)
//! - `flow`: on connect and after reset, a coarse sample of the wind and water grids

use serde::Serialize;

use sail_core::{Angle, BoatView, DecisionLogEntry, Location, ScenarioConfig, SimulationState, SpeedVector};

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Outbound<'a> {
    Telemetry {
        sim_time: f64,
        wind_swing: Angle,
        wind_shift: Angle,
        finished: bool,
        boats: Vec<BoatView<'a>>,
        decisions: &'a [DecisionLogEntry],
    },
    Scenario {
        data: &'a ScenarioConfig,
    },
    Flow {
        wind: Vec<FlowSample>,
        water: Vec<FlowSample>,
    },
}

#[derive(Serialize)]
struct FlowSample {
    x: f64,
    y: f64,
    speed: f64,
    angle: Angle,
}

impl From<(Location, SpeedVector)> for FlowSample {
    fn from((p, v): (Location, SpeedVector)) -> Self {
        Self { x: p.x, y: p.y, speed: v.speed, angle: v.angle }
    }
}

/// Telemetry frame for the state just produced by a tick. Each boat's trail
/// is cut to its last `track_points` locations.
pub fn frame(state: &SimulationState, track_points: usize) -> serde_json::Result<String> {
    let boats = state
        .boats()
        .map(|v| {
            let start = v.track.len().saturating_sub(track_points);
            BoatView { track: &v.track[start..], ..v }
        })
        .collect();
    serde_json::to_string(&Outbound::Telemetry {
        sim_time: state.sim_time(),
        wind_swing: state.wind().swing(),
        wind_shift: state.wind().shift(),
        finished: state.all_finished(),
        boats,
        decisions: state.decisions(),
    })
}

pub fn scenario(state: &SimulationState) -> serde_json::Result<String> {
    serde_json::to_string(&Outbound::Scenario { data: state.config() })
}

pub fn flow(state: &SimulationState, stride: usize) -> serde_json::Result<String> {
    let collect = |samples: Vec<(Location, SpeedVector)>| samples.into_iter().map(FlowSample::from).collect();
    serde_json::to_string(&Outbound::Flow {
        wind: collect(state.wind().grid_samples(stride)),
        water: collect(state.water().grid_samples(stride)),
    })
}
