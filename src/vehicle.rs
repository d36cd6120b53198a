use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::config::VehicleConfig;
use crate::powertrain::gearbox::Gearbox;
use crate::powertrain::traction::TractionControl;

/// Metres per second to miles per hour.
pub const MPS_TO_MPH: f32 = 2.236_936_3;
/// Metres to miles.
pub const METRES_TO_MILES: f32 = 0.000_621_37;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ignition {
    Off,
    #[default]
    On,
}

impl Ignition {
    pub fn toggled(self) -> Self {
        match self {
            Ignition::Off => Ignition::On,
            Ignition::On => Ignition::Off,
        }
    }
}

/// Per-tick driver request, both axes clamped to [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DriverInput {
    pub steer: f32, // -1 full left .. 1 full right
    pub accel: f32, // -1 full brake .. 1 full throttle
}

impl DriverInput {
    pub const NEUTRAL: DriverInput = DriverInput { steer: 0.0, accel: 0.0 };

    pub fn new(steer: f32, accel: f32) -> Self {
        Self { steer: clamp_axis(steer), accel: clamp_axis(accel) }
    }

    pub fn clamped(self) -> Self {
        Self::new(self.steer, self.accel)
    }
}

fn clamp_axis(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(-1.0, 1.0) }
}

/// Everything that changes while the vehicle drives.
///
/// The dynamics step owns all writes; outside the crate the state is read
/// through accessors and changed only through `VehicleDynamics` entry points.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleState {
    // --- Inputs ---
    pub(crate) steer_input: f32,
    pub(crate) accel_input: f32,
    pub(crate) handbrake: bool,
    pub(crate) ignition: Ignition,

    // --- Engine / driveline ---
    pub(crate) gearbox: Gearbox,
    pub(crate) rpm: f32,
    pub(crate) torque: f32,       // N*m at the wheels, before the throttle split
    pub(crate) traction_cap: f32, // 0..=max_motor_torque
    pub(crate) steer_angle: f32,  // degrees

    // --- Motion ---
    pub(crate) speed: f32,          // mph, from body velocity
    pub(crate) measured_speed: f32, // m/s, from position delta
    pub(crate) odometer: f32,       // m
    pub(crate) mile_ticker: f32,    // m since the last mile tick
    pub(crate) road_slip: f32,      // forward slip under axle 0, 0 in the air

    // --- Fuel / thermal ---
    pub(crate) fuel_level: f32,    // l
    pub(crate) fuel_per_metre: f32,
    pub(crate) fuel_per_second: f32,
    pub(crate) engine_temperature_k: f32,
    pub(crate) ambient_temperature_k: f32,
    pub(crate) cooling_malfunction: bool,

    // --- Previous-tick baselines ---
    pub(crate) old_heading: f32, // degrees
    pub(crate) last_position: Point3<f32>,
}

impl VehicleState {
    pub fn new(config: &VehicleConfig) -> Self {
        Self {
            steer_input: 0.0,
            accel_input: 0.0,
            handbrake: false,
            ignition: Ignition::On,
            gearbox: Gearbox::from_config(config),
            rpm: 0.0,
            torque: 0.0,
            traction_cap: TractionControl::from_config(config).initial_cap(),
            steer_angle: 0.0,
            speed: 0.0,
            measured_speed: 0.0,
            odometer: 0.0,
            mile_ticker: 0.0,
            road_slip: 0.0,
            fuel_level: config.fuel_capacity,
            fuel_per_metre: 0.0,
            fuel_per_second: 0.0,
            engine_temperature_k: config.ambient_temperature_k,
            ambient_temperature_k: config.ambient_temperature_k,
            cooling_malfunction: false,
            old_heading: 0.0,
            last_position: Point3::origin(),
        }
    }

    pub fn steer_input(&self) -> f32 {
        self.steer_input
    }

    pub fn accel_input(&self) -> f32 {
        self.accel_input
    }

    pub fn handbrake(&self) -> bool {
        self.handbrake
    }

    pub fn ignition(&self) -> Ignition {
        self.ignition
    }

    pub fn gearbox(&self) -> &Gearbox {
        &self.gearbox
    }

    pub fn current_gear(&self) -> f32 {
        self.gearbox.current_gear()
    }

    pub fn reverse(&self) -> bool {
        self.gearbox.reverse()
    }

    pub fn rpm(&self) -> f32 {
        self.rpm
    }

    pub fn torque(&self) -> f32 {
        self.torque
    }

    pub fn traction_cap(&self) -> f32 {
        self.traction_cap
    }

    pub fn steer_angle(&self) -> f32 {
        self.steer_angle
    }

    /// Body speed in mph.
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Position-delta speed in m/s. Diagnostic only; never fed back.
    pub fn measured_speed(&self) -> f32 {
        self.measured_speed
    }

    pub fn odometer(&self) -> f32 {
        self.odometer
    }

    pub fn road_slip(&self) -> f32 {
        self.road_slip
    }

    pub fn fuel_level(&self) -> f32 {
        self.fuel_level
    }

    /// Litres per metre over the last tick, 0 when standing still.
    pub fn fuel_per_metre(&self) -> f32 {
        self.fuel_per_metre
    }

    pub fn fuel_per_second(&self) -> f32 {
        self.fuel_per_second
    }

    pub fn engine_temperature_k(&self) -> f32 {
        self.engine_temperature_k
    }

    pub fn ambient_temperature_k(&self) -> f32 {
        self.ambient_temperature_k
    }

    pub fn cooling_malfunction(&self) -> bool {
        self.cooling_malfunction
    }

    /// Canonical rest: 1st gear, engine spun down, inputs cleared. Fuel,
    /// temperatures, odometer, ignition and handbrake carry over.
    pub(crate) fn reset_motion(&mut self, position: Point3<f32>, heading: f32) {
        self.gearbox.reset();
        self.rpm = 0.0;
        self.torque = 0.0;
        self.speed = 0.0;
        self.measured_speed = 0.0;
        self.steer_input = 0.0;
        self.accel_input = 0.0;
        self.steer_angle = 0.0;
        self.road_slip = 0.0;
        self.fuel_per_metre = 0.0;
        self.fuel_per_second = 0.0;
        self.old_heading = heading;
        self.last_position = position;
    }
}
