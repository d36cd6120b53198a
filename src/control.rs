//! Driver-facing wrapper around [`VehicleDynamics`].
//!
//! Input arrives two ways: the aggregated driver input (all sources summed and
//! clamped), or an externally pinned pair set through [`VehicleController::apply_control`].
//! Exactly one of them feeds each tick; there is no blending.

use nalgebra::{Point3, UnitQuaternion};
use tracing::debug;

use crate::events::{CollisionLayer, DynamicsEvent};
use crate::host::VehicleHost;
use crate::powertrain::{TickReport, VehicleDynamics};
use crate::vehicle::DriverInput;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ControlMode {
    #[default]
    Aggregated,
    Pinned { steer: f32, accel: f32 },
}

#[derive(Debug, Clone)]
pub struct VehicleController {
    dynamics: VehicleDynamics,
    mode: ControlMode,
    driver_input: DriverInput,
    initial_position: Point3<f32>,
    initial_rotation: UnitQuaternion<f32>,
}

impl VehicleController {
    pub fn new(dynamics: VehicleDynamics) -> Self {
        Self {
            dynamics,
            mode: ControlMode::Aggregated,
            driver_input: DriverInput::NEUTRAL,
            initial_position: Point3::origin(),
            initial_rotation: UnitQuaternion::identity(),
        }
    }

    /// Remember the spawn pose for `reset_position` and baseline the dynamics.
    pub fn init(&mut self, host: &mut impl VehicleHost) {
        self.initial_position = host.position();
        self.initial_rotation = host.rotation();
        self.dynamics.attach(host);
    }

    pub fn dynamics(&self) -> &VehicleDynamics {
        &self.dynamics
    }

    pub fn dynamics_mut(&mut self) -> &mut VehicleDynamics {
        &mut self.dynamics
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn initial_pose(&self) -> (Point3<f32>, UnitQuaternion<f32>) {
        (self.initial_position, self.initial_rotation)
    }

    /// Sum every active input source and clamp each axis to [-1, 1].
    pub fn set_driver_inputs<I>(&mut self, sources: I)
    where
        I: IntoIterator<Item = DriverInput>,
    {
        let (steer, accel) = sources
            .into_iter()
            .fold((0.0, 0.0), |(s, a), input| (s + input.steer, a + input.accel));
        self.driver_input = DriverInput::new(steer, accel);
    }

    pub fn set_driver_input(&mut self, input: DriverInput) {
        self.driver_input = input.clamped();
    }

    /// Pin steering/acceleration until `release_control`. Last write wins.
    pub fn apply_control(&mut self, steer: f32, accel: f32) {
        let pinned = DriverInput::new(steer, accel);
        self.mode = ControlMode::Pinned { steer: pinned.steer, accel: pinned.accel };
    }

    pub fn release_control(&mut self) {
        self.mode = ControlMode::Aggregated;
    }

    /// The input this tick will use.
    pub fn effective_input(&self) -> DriverInput {
        match self.mode {
            ControlMode::Aggregated => self.driver_input,
            ControlMode::Pinned { steer, accel } => DriverInput { steer, accel },
        }
    }

    pub fn fixed_update(&mut self, host: &mut impl VehicleHost, dt: f32) -> TickReport {
        let input = self.effective_input();
        self.dynamics.step(host, input, dt)
    }

    pub fn reset_position(&mut self, host: &mut impl VehicleHost) {
        let (position, rotation) = self.initial_pose();
        self.dynamics.force_reset(host, position, rotation);
    }

    pub fn reset_saved_position(
        &mut self,
        host: &mut impl VehicleHost,
        position: Point3<f32>,
        rotation: UnitQuaternion<f32>,
    ) {
        self.dynamics.force_reset(host, position, rotation);
    }

    /// Classify a contact that just began. Scenery yields nothing.
    pub fn on_collision(&self, other: u32, layer: CollisionLayer) -> Option<DynamicsEvent> {
        if !layer.is_reportable() {
            return None;
        }
        debug!(other, ?layer, "vehicle: collision");
        Some(DynamicsEvent::Collision { other, layer })
    }
}
