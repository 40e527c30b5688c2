//! main.rs — Sailing race simulator entry point
//!
//! Two ways to run a scenario document:
//!   1. Interactive (default): a ticker advances the simulation at
//!      update_rate_hz and broadcasts telemetry frames to WebSocket clients on
//!      /ws, which can pause, resume, reset and change speed
//!   2. Headless (--headless): ticks as fast as possible until every boat has
//!      finished (or the tick limit is hit) and prints the decision log to
//!      stdout as JSON lines
//!
//! The simulation core is pure; everything here is I/O around `tick`.

mod telemetry;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use clap::Parser;
use serde::Deserialize;
use tokio::sync::{broadcast, RwLock};
use tokio::time::interval;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use sail_core::{load_scenario, ScenarioConfig, SimulationState};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "sail-sim", about = "Sailing race simulator")]
struct Args {
    /// Scenario document (JSON)
    scenario: PathBuf,
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    /// Simulation speed multiplier (overrides config)
    #[arg(long)]
    speed: Option<f64>,
    /// Control panel WebSocket port (overrides config)
    #[arg(long)]
    ctrl_port: Option<u16>,
    /// Run to completion without the server, decision log to stdout
    #[arg(long)]
    headless: bool,
    /// Tick limit in headless mode (overrides config)
    #[arg(long)]
    ticks: Option<usize>,
}

// ── Config ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
struct FullConfig {
    simulation: SimulationConfig,
    headless: HeadlessConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct SimulationConfig {
    update_rate_hz: f64,
    secs_per_tick: f64,
    speed: f64,
    ctrl_port: u16,
    #[serde(default = "default_track_points")]
    track_points: usize,
    #[serde(default = "default_flow_stride")]
    flow_stride: usize,
}

fn default_track_points() -> usize {
    300
}

fn default_flow_stride() -> usize {
    10
}

#[derive(Debug, Clone, Deserialize)]
struct HeadlessConfig {
    ticks: usize,
}

fn load_config(path: &str) -> Result<FullConfig> {
    let text = std::fs::read_to_string(path).unwrap_or_else(|_| include_str!("../config.toml").to_string());
    let cfg: FullConfig = toml::from_str(&text).with_context(|| format!("invalid config {path}"))?;
    anyhow::ensure!(
        cfg.simulation.update_rate_hz > 0.0 && cfg.simulation.secs_per_tick > 0.0,
        "update_rate_hz and secs_per_tick must be positive"
    );
    Ok(cfg)
}

// ── Shared state ──────────────────────────────────────────────────────────────

struct RunState {
    sim: SimulationState,
    paused: bool,
    speed: f64,
    /// Latest telemetry frame, sent to clients as they connect
    last_telemetry: Option<String>,
}

type SharedState = Arc<RwLock<RunState>>;
type Telemetry = Arc<broadcast::Sender<String>>;

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sail_simulator=info,sail_core=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut cfg = load_config(&args.config)?;
    if let Some(speed) = args.speed {
        cfg.simulation.speed = speed;
    }
    if let Some(port) = args.ctrl_port {
        cfg.simulation.ctrl_port = port;
    }
    if let Some(ticks) = args.ticks {
        cfg.headless.ticks = ticks;
    }

    let text = std::fs::read_to_string(&args.scenario)
        .with_context(|| format!("cannot read scenario {}", args.scenario.display()))?;
    let scenario = ScenarioConfig::from_json(&text).with_context(|| format!("in {}", args.scenario.display()))?;
    let sim = load_scenario(&scenario)?;

    info!(
        "⛵ Sail simulator: '{}' — {} boats, {} legs",
        scenario.name,
        sim.boat_count(),
        sim.course().legs.len()
    );

    if args.headless {
        return run_headless(sim, &cfg);
    }

    let shared: SharedState = Arc::new(RwLock::new(RunState {
        sim,
        paused: false,
        speed: cfg.simulation.speed,
        last_telemetry: None,
    }));

    let (telem_tx, _) = broadcast::channel::<String>(64);
    let telem_tx: Telemetry = Arc::new(telem_tx);

    let shared_loop = shared.clone();
    let telem_tx_loop = telem_tx.clone();
    let sim_cfg = cfg.simulation.clone();
    tokio::spawn(async move {
        sim_loop(shared_loop, telem_tx_loop, sim_cfg).await;
    });

    let ctrl_addr = format!("0.0.0.0:{}", cfg.simulation.ctrl_port);
    info!("🖥  Control panel WebSocket at ws://{ctrl_addr}/ws");

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(|| async { "sail-sim ok" }))
        .with_state((shared, telem_tx, cfg.simulation.flow_stride))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let listener = tokio::net::TcpListener::bind(&ctrl_addr)
        .await
        .with_context(|| format!("cannot bind {ctrl_addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}

// ── Headless run ──────────────────────────────────────────────────────────────

fn run_headless(mut sim: SimulationState, cfg: &FullConfig) -> Result<()> {
    let step = cfg.simulation.secs_per_tick * cfg.simulation.speed;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for n in 1..=cfg.headless.ticks {
        sim = sim.tick(n as f64 * step)?;
        for entry in sim.decisions() {
            writeln!(out, "{}", serde_json::to_string(entry)?)?;
        }
        if sim.all_finished() {
            info!("🏁 All boats finished at t={:.0}s", sim.sim_time());
            return Ok(());
        }
    }
    let unfinished: Vec<_> = sim.boats().filter(|b| !b.finished).map(|b| b.name.to_string()).collect();
    warn!("Tick limit {} reached; still racing: {}", cfg.headless.ticks, unfinished.join(", "));
    Ok(())
}

// ── Simulation loop ───────────────────────────────────────────────────────────

async fn sim_loop(state: SharedState, telem: Telemetry, cfg: SimulationConfig) {
    let tick_ms = (1000.0 / cfg.update_rate_hz) as u64;
    let mut ticker = interval(Duration::from_millis(tick_ms.max(1)));
    let mut counter: u64 = 0;

    info!("⚓ Sim loop running at {} Hz ({}ms tick)", cfg.update_rate_hz, tick_ms);

    loop {
        ticker.tick().await;

        let frame = {
            let mut s = state.write().await;
            if s.paused || s.sim.all_finished() {
                continue;
            }
            let t = s.sim.sim_time() + cfg.secs_per_tick * s.speed;
            match s.sim.tick(t) {
                Ok(next) => s.sim = next,
                Err(e) if e.is_recoverable() => {
                    warn!("Tick to t={t:.1}s skipped: {e}");
                    continue;
                }
                Err(e) => {
                    error!("Simulation halted: {e}");
                    s.paused = true;
                    continue;
                }
            }
            match telemetry::frame(&s.sim, cfg.track_points) {
                Ok(frame) => {
                    s.last_telemetry = Some(frame.clone());
                    frame
                }
                Err(e) => {
                    warn!("Telemetry encoding failed: {e}");
                    continue;
                }
            }
        };

        // No receivers is fine; the ticker never waits on clients
        let _ = telem.send(frame);

        counter += 1;
        if counter % 100 == 0 {
            let s = state.read().await;
            let done = s.sim.boats().filter(|b| b.finished).count();
            info!("⏱ t={:.0}s | finished {}/{}", s.sim.sim_time(), done, s.sim.boat_count());
        }
    }
}

// ── WebSocket control handler ─────────────────────────────────────────────────

async fn ws_handler(
    ws: WebSocketUpgrade,
    State((state, telem_tx, flow_stride)): State<(SharedState, Telemetry, usize)>,
) -> Response {
    ws.on_upgrade(move |socket| handle_ws(socket, state, telem_tx, flow_stride))
}

async fn handle_ws(mut socket: WebSocket, state: SharedState, telem_tx: Telemetry, flow_stride: usize) {
    let mut telem_rx = telem_tx.subscribe();

    let greeting = {
        let s = state.read().await;
        [
            telemetry::scenario(&s.sim).ok(),
            telemetry::flow(&s.sim, flow_stride).ok(),
            s.last_telemetry.clone(),
        ]
    };
    for msg in greeting.into_iter().flatten() {
        if socket.send(Message::Text(msg)).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            // Relay telemetry to client
            recv = telem_rx.recv() => match recv {
                Ok(msg) => {
                    if socket.send(Message::Text(msg)).await.is_err() { break; }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => warn!("Client lagging, dropped {n} frames"),
                Err(broadcast::error::RecvError::Closed) => break,
            },
            // Handle commands from web UI
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(cmd))) => {
                    if let Some(reply) = handle_command(&state, &cmd, flow_stride).await {
                        if socket.send(Message::Text(reply)).await.is_err() { break; }
                    }
                }
                Some(Ok(_)) => {}
                _ => break,
            },
        }
    }
}

/// Handle commands from the web control panel.
/// Commands are JSON: { "cmd": "...", "args": {...} }
/// Returns a message for the requesting client only, if any.
async fn handle_command(state: &SharedState, raw: &str, flow_stride: usize) -> Option<String> {
    let v: serde_json::Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(_) => {
            warn!("Ignoring malformed command: {raw}");
            return None;
        }
    };
    let cmd = v["cmd"].as_str().unwrap_or("");
    match cmd {
        "pause" => {
            state.write().await.paused = true;
            info!("⏸ Sim paused");
        }
        "resume" => {
            state.write().await.paused = false;
            info!("▶ Sim resumed");
        }
        "reset" => {
            let mut s = state.write().await;
            match s.sim.reset() {
                Ok(sim) => {
                    s.sim = sim;
                    s.last_telemetry = None;
                    info!("↺ Sim reset");
                    return telemetry::flow(&s.sim, flow_stride).ok();
                }
                Err(e) => error!("Reset failed: {e}"),
            }
        }
        "set_speed" => {
            if let Some(sp) = v["args"]["speed"].as_f64() {
                let sp = sp.clamp(0.1, 20.0);
                state.write().await.speed = sp;
                info!("⚡ Sim speed set to {sp}×");
            }
        }
        _ => warn!("Unknown control command: {cmd}"),
    }
    None
}
