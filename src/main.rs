mod net;
mod state;

use std::env;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vehicle_dynamics::physics::PhysicsWorld;
use vehicle_dynamics::VehicleConfig;

use crate::net::{start_websocket_server, ServerMessage, DEFAULT_ADDR};
use crate::state::SharedGameState;

/// Fixed physics step (60 Hz).
const TICK_DT: f32 = 1.0 / 60.0;

fn load_config() -> VehicleConfig {
    let Ok(path) = env::var("VEHICLE_CONFIG") else {
        info!("VEHICLE_CONFIG not set, using the sedan preset");
        return VehicleConfig::sedan();
    };

    match VehicleConfig::load(Path::new(&path)) {
        Ok(config) => {
            info!(%path, "vehicle config loaded");
            config
        }
        Err(e) => {
            warn!(%path, error = %e, "vehicle config rejected, using the sedan preset");
            VehicleConfig::sedan()
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("vehicle_dynamics=info,vehicle_server=info")),
        )
        .init();

    info!("starting vehicle server");

    let config = load_config();
    let addr = env::var("VEHICLE_SERVER_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());

    let state = Arc::new(Mutex::new(SharedGameState::new(config)));
    let physics = Arc::new(Mutex::new(PhysicsWorld::new()));

    tokio::spawn(start_websocket_server(addr, Arc::clone(&state), Arc::clone(&physics)));

    let mut ticker = interval(Duration::from_secs_f32(TICK_DT));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let mut phys = physics.lock().await;
        let mut game = state.lock().await;

        let events = game.step(&mut phys, TICK_DT);

        game.sync_display(&mut phys);
        let snapshot = game.snapshot(&phys);
        if let Some(json) = ServerMessage::Snapshot(&snapshot).to_json() {
            game.broadcast(&json);
        }
        for (vehicle_id, event) in events {
            if let Some(json) = (ServerMessage::Event { vehicle_id, event }).to_json() {
                game.broadcast(&json);
            }
        }
    }
}
