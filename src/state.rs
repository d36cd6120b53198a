use std::collections::HashMap;

use nalgebra::{Point3, UnitQuaternion};
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};
use uuid::Uuid;

use vehicle_dynamics::physics::PhysicsWorld;
use vehicle_dynamics::powertrain::thermal::ZERO_CELSIUS_K;
use vehicle_dynamics::vehicle::Ignition;
use vehicle_dynamics::{DynamicsError, DynamicsEvent, Result, VehicleConfig, VehicleController, VehicleDynamics};

/// Spawn height above the ground plane; the rig drops onto its springs.
const SPAWN_HEIGHT: f32 = 1.2;
/// Lateral spacing between spawned vehicles.
const SPAWN_SPACING: f32 = 5.0;

#[derive(Debug, Serialize)]
pub struct VehicleSnapshot {
    pub id: Uuid,
    pub position: [f32; 3],
    pub rotation: [f32; 4], // quaternion i, j, k, w
    pub speed_mph: f32,
    pub measured_speed: f32, // m/s
    pub rpm: f32,
    pub gear: f32,
    pub reverse: bool,
    pub ignition: Ignition,
    pub handbrake: bool,
    pub fuel: f32,                 // l
    pub engine_temperature_c: f32, // °C
    pub odometer: f32,             // m
}

#[derive(Debug, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub vehicles: Vec<VehicleSnapshot>,
}

pub struct SharedGameState {
    pub tick: u64,
    pub config: VehicleConfig,
    pub clients: HashMap<Uuid, UnboundedSender<String>>,
    pub vehicles: HashMap<Uuid, VehicleController>,
    spawned: u64, // vehicles ever spawned, picks the next free slot
}

impl SharedGameState {
    pub fn new(config: VehicleConfig) -> Self {
        Self {
            tick: 0,
            config,
            clients: HashMap::new(),
            vehicles: HashMap::new(),
            spawned: 0,
        }
    }

    pub fn register_client(&mut self, id: Uuid, tx: UnboundedSender<String>) {
        self.clients.insert(id, tx);
    }

    pub fn remove_client(&mut self, id: &Uuid) {
        self.clients.remove(id);
    }

    /// Spawn a rig and its controller; the id doubles as the client id.
    pub fn add_vehicle(&mut self, id: Uuid, physics: &mut PhysicsWorld) -> Result<()> {
        let dynamics = VehicleDynamics::new(self.config.clone())?;
        let position = Point3::new(self.spawned as f32 * SPAWN_SPACING, SPAWN_HEIGHT, 0.0);

        physics.spawn_rig(id, &self.config, position, UnitQuaternion::identity());
        let mut host = physics.host(&id).ok_or(DynamicsError::UnknownVehicle(id))?;

        let mut controller = VehicleController::new(dynamics);
        controller.init(&mut host);
        self.vehicles.insert(id, controller);
        self.spawned += 1;

        info!(%id, "vehicle spawned");
        Ok(())
    }

    pub fn remove_vehicle(&mut self, id: &Uuid, physics: &mut PhysicsWorld) {
        self.vehicles.remove(id);
        physics.remove_rig(id);
    }

    pub fn controller_mut(&mut self, id: &Uuid) -> Result<&mut VehicleController> {
        self.vehicles.get_mut(id).ok_or(DynamicsError::UnknownVehicle(*id))
    }

    /// One fixed tick: every vehicle's dynamics, then the physics world.
    pub fn step(&mut self, physics: &mut PhysicsWorld, dt: f32) -> Vec<(Uuid, DynamicsEvent)> {
        let mut events = Vec::new();

        for (id, controller) in self.vehicles.iter_mut() {
            let Some(mut host) = physics.host(id) else { continue };
            let report = controller.fixed_update(&mut host, dt);
            events.extend(report.events.into_iter().map(|e| (*id, e)));
        }

        for contact in physics.step(dt) {
            if let Some(controller) = self.vehicles.get(&contact.vehicle) {
                if let Some(event) = controller.on_collision(contact.other, contact.layer) {
                    info!(vehicle = %contact.vehicle, ?event, "collision");
                    events.push((contact.vehicle, event));
                }
            }
        }

        self.tick += 1;
        events
    }

    /// Display-rate pass, run on the broadcast path rather than the fixed tick.
    pub fn sync_display(&self, physics: &mut PhysicsWorld) {
        for (id, controller) in &self.vehicles {
            if let Some(mut host) = physics.host(id) {
                controller.dynamics().sync_display(&mut host);
            }
        }
    }

    pub fn snapshot(&self, physics: &PhysicsWorld) -> Snapshot {
        let mut vehicles = Vec::with_capacity(self.vehicles.len());

        for (id, controller) in &self.vehicles {
            let Some(rig) = physics.rigs.get(id) else { continue };
            let Some(body) = physics.bodies.get(rig.body) else { continue };
            let pos = body.translation();
            let rot = body.rotation();
            let state = controller.dynamics().state();

            vehicles.push(VehicleSnapshot {
                id: *id,
                position: [pos.x, pos.y, pos.z],
                rotation: [rot.i, rot.j, rot.k, rot.w],
                speed_mph: state.speed(),
                measured_speed: state.measured_speed(),
                rpm: state.rpm(),
                gear: state.current_gear(),
                reverse: state.reverse(),
                ignition: state.ignition(),
                handbrake: state.handbrake(),
                fuel: state.fuel_level(),
                engine_temperature_c: state.engine_temperature_k() - ZERO_CELSIUS_K,
                odometer: state.odometer(),
            });
        }

        Snapshot { tick: self.tick, vehicles }
    }

    /// Send one text frame to every client; closed channels are dropped.
    pub fn broadcast(&mut self, json: &str) {
        self.clients.retain(|id, tx| {
            let open = tx.send(json.to_owned()).is_ok();
            if !open {
                warn!(%id, "client channel closed");
            }
            open
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vehicle_dynamics::{AxleId, VehicleHost};

    fn spawn_point(physics: &PhysicsWorld, id: &Uuid) -> [f32; 3] {
        let rig = physics.rigs.get(id).expect("rig spawned");
        let pos = physics.bodies.get(rig.body).expect("body exists").translation();
        [pos.x, pos.y, pos.z]
    }

    #[test]
    fn spawn_slots_are_not_reused_after_a_disconnect() {
        let mut game = SharedGameState::new(VehicleConfig::sedan());
        let mut physics = PhysicsWorld::new();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        game.add_vehicle(a, &mut physics).expect("spawn a");
        game.add_vehicle(b, &mut physics).expect("spawn b");
        game.remove_vehicle(&a, &mut physics);
        game.add_vehicle(c, &mut physics).expect("spawn c");

        assert_ne!(spawn_point(&physics, &b), spawn_point(&physics, &c));
        assert_eq!(spawn_point(&physics, &c), [2.0 * SPAWN_SPACING, SPAWN_HEIGHT, 0.0]);
    }

    #[test]
    fn display_sync_restores_wheel_damping() {
        let mut game = SharedGameState::new(VehicleConfig::sedan());
        let mut physics = PhysicsWorld::new();
        let id = Uuid::new_v4();
        game.add_vehicle(id, &mut physics).expect("spawn");

        let mut host = physics.host(&id).expect("rig exists");
        host.set_wheel_damping(AxleId(1), 7.0);
        drop(host);

        game.sync_display(&mut physics);
        let host = physics.host(&id).expect("rig exists");
        assert_eq!(host.wheel_damping(AxleId(1)), game.config.wheel_damping);
    }
}
