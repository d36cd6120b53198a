use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use vehicle_dynamics::physics::PhysicsWorld;
use vehicle_dynamics::vehicle::DriverInput;
use vehicle_dynamics::{DynamicsEvent, Result};

use crate::state::{SharedGameState, Snapshot};

pub const DEFAULT_ADDR: &str = "0.0.0.0:9001";

/// Client -> server frames, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Input {
        #[serde(default)]
        steer: f32,
        #[serde(default)]
        accel: f32,
    },
    ApplyControl {
        steer: f32,
        accel: f32,
    },
    ReleaseControl,
    Reset,
    Ignition {
        #[serde(default)]
        on: Option<bool>, // absent toggles
    },
    Handbrake {
        #[serde(default)]
        on: Option<bool>, // absent toggles
    },
    ShiftUp,
    ShiftDown,
    Ping,
}

/// Server -> client frames.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage<'a> {
    Welcome { vehicle_id: Uuid },
    Pong,
    Snapshot(&'a Snapshot),
    Event { vehicle_id: Uuid, event: DynamicsEvent },
}

impl ServerMessage<'_> {
    pub fn to_json(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(json) => Some(json),
            Err(e) => {
                error!(error = %e, "failed to serialize server message");
                None
            }
        }
    }
}

pub async fn start_websocket_server(
    addr: String,
    state: Arc<Mutex<SharedGameState>>,
    physics: Arc<Mutex<PhysicsWorld>>,
) {
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "failed to bind websocket port");
            return;
        }
    };

    info!("websocket listening on ws://{addr}");

    loop {
        let raw = match listener.accept().await {
            Ok((raw, _)) => raw,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };
        tokio::spawn(handle_connection(raw, Arc::clone(&state), Arc::clone(&physics)));
    }
}

async fn handle_connection(
    raw: TcpStream,
    state: Arc<Mutex<SharedGameState>>,
    physics: Arc<Mutex<PhysicsWorld>>,
) {
    let ws = match accept_async(raw).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(error = %e, "websocket handshake failed");
            return;
        }
    };
    let (mut write, mut read) = ws.split();

    // outgoing channel + send loop
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if write.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // vehicle for this connection (physics before state, same as the tick loop)
    let vehicle_id = Uuid::new_v4();
    {
        let mut phys = physics.lock().await;
        let mut game = state.lock().await;
        if let Err(e) = game.add_vehicle(vehicle_id, &mut phys) {
            error!(error = %e, "could not spawn vehicle");
            return;
        }
        game.register_client(vehicle_id, tx.clone());
    }

    info!(%vehicle_id, "client connected");
    if let Some(json) = (ServerMessage::Welcome { vehicle_id }).to_json() {
        let _ = tx.send(json);
    }

    while let Some(msg) = read.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(_) => break,
        };
        if !msg.is_text() {
            continue;
        }
        let Ok(text) = msg.to_text() else { continue };

        let parsed: ClientMessage = match serde_json::from_str(text) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(error = %e, "ignoring malformed client message");
                continue;
            }
        };

        if parsed == ClientMessage::Ping {
            if let Some(json) = ServerMessage::Pong.to_json() {
                let _ = tx.send(json);
            }
            continue;
        }

        let mut phys = physics.lock().await;
        let mut game = state.lock().await;
        if let Err(e) = apply_message(&mut game, &mut phys, &vehicle_id, parsed) {
            warn!(%vehicle_id, error = %e, "client message rejected");
        }
    }

    info!(%vehicle_id, "client disconnected");
    let mut phys = physics.lock().await;
    let mut game = state.lock().await;
    game.remove_client(&vehicle_id);
    game.remove_vehicle(&vehicle_id, &mut phys);
}

fn apply_message(
    game: &mut SharedGameState,
    physics: &mut PhysicsWorld,
    id: &Uuid,
    msg: ClientMessage,
) -> Result<()> {
    let controller = game.controller_mut(id)?;

    match msg {
        ClientMessage::Input { steer, accel } => controller.set_driver_input(DriverInput::new(steer, accel)),
        ClientMessage::ApplyControl { steer, accel } => controller.apply_control(steer, accel),
        ClientMessage::ReleaseControl => controller.release_control(),
        ClientMessage::Reset => {
            if let Some(mut host) = physics.host(id) {
                controller.reset_position(&mut host);
            }
        }
        ClientMessage::Ignition { on } => {
            let dynamics = controller.dynamics_mut();
            match on {
                None => dynamics.toggle_ignition(),
                Some(true) => dynamics.start_engine(),
                Some(false) => dynamics.stop_engine(),
            }
        }
        ClientMessage::Handbrake { on } => {
            let dynamics = controller.dynamics_mut();
            match on {
                None => dynamics.toggle_handbrake(),
                Some(enable) => dynamics.set_handbrake(enable),
            }
        }
        ClientMessage::ShiftUp => controller.dynamics_mut().shift_up(),
        ClientMessage::ShiftDown => controller.dynamics_mut().shift_down(),
        ClientMessage::Ping => {}
    }

    Ok(())
}
