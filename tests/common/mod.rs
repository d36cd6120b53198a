//! Deterministic flat-track host: a point mass rolling on y = 0 with
//! no-slip wheels. Forces, torques and steer angles are recorded per tick
//! so tests can assert on exactly what the dynamics asked for.

#![allow(dead_code)]

use std::f32::consts::TAU;

use nalgebra::{Point3, UnitQuaternion, Vector3};
use vehicle_dynamics::host::{AxleId, VehicleHost, WheelContact, BODY_FORWARD};
use vehicle_dynamics::VehicleConfig;

pub const DT: f32 = 1.0 / 60.0;

#[derive(Debug, Clone, PartialEq)]
pub struct FlatTrack {
    pub mass: f32,
    pub radius: f32,
    pub attached: bool,

    pub position: Point3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub velocity: Vector3<f32>,
    pub angular_velocity: Vector3<f32>,
    pub force: Vector3<f32>, // accumulated since the last advance()

    pub grounded: bool,
    pub forward_slip: f32,
    pub wheel_rpm: Option<f32>, // pinned wheel speed, otherwise rolling speed

    pub motor: Vec<f32>,
    pub brake: Vec<f32>,
    pub steer: Vec<f32>,
    pub damping: Vec<f32>,
    pub damping_writes: usize,
}

impl FlatTrack {
    pub fn new(config: &VehicleConfig) -> Self {
        let axles = config.axles.len();
        Self {
            mass: config.mass,
            radius: config.rig.wheel_radius,
            attached: true,
            position: Point3::origin(),
            rotation: UnitQuaternion::identity(),
            velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            force: Vector3::zeros(),
            grounded: true,
            forward_slip: 0.0,
            wheel_rpm: None,
            motor: vec![0.0; axles],
            brake: vec![0.0; axles],
            steer: vec![0.0; axles],
            damping: vec![0.0; axles],
            damping_writes: 0,
        }
    }

    pub fn forward(&self) -> Vector3<f32> {
        self.rotation * BODY_FORWARD
    }

    /// Integrate one tick: body forces plus wheel drive/brake along forward.
    pub fn advance(&mut self, dt: f32) {
        let forward = self.forward();

        if self.grounded {
            let drive: f32 = self.motor.iter().sum::<f32>() * 2.0 / self.radius;
            self.force += forward * drive;
        }
        self.velocity += self.force / self.mass * dt;
        self.force = Vector3::zeros();

        if self.grounded {
            let brake: f32 = self.brake.iter().sum::<f32>() * 2.0 / self.radius;
            let v_long = self.velocity.dot(&forward);
            let dv = if brake.is_infinite() { f32::INFINITY } else { brake / self.mass * dt };
            let slowed = v_long.signum() * (v_long.abs() - dv).max(0.0);
            self.velocity += forward * (slowed - v_long);
        }

        self.velocity.y = 0.0;
        self.position += self.velocity * dt;
    }

    pub fn speed(&self) -> f32 {
        self.velocity.norm()
    }
}

impl VehicleHost for FlatTrack {
    fn body_attached(&self) -> bool {
        self.attached
    }

    fn position(&self) -> Point3<f32> {
        self.position
    }

    fn rotation(&self) -> UnitQuaternion<f32> {
        self.rotation
    }

    fn velocity(&self) -> Vector3<f32> {
        self.velocity
    }

    fn angular_velocity(&self) -> Vector3<f32> {
        self.angular_velocity
    }

    fn set_velocity(&mut self, velocity: Vector3<f32>) {
        self.velocity = velocity;
    }

    fn set_angular_velocity(&mut self, angular_velocity: Vector3<f32>) {
        self.angular_velocity = angular_velocity;
    }

    fn move_position(&mut self, position: Point3<f32>) {
        self.position = position;
    }

    fn move_rotation(&mut self, rotation: UnitQuaternion<f32>) {
        self.rotation = rotation;
    }

    fn add_force(&mut self, force: Vector3<f32>) {
        self.force += force;
    }

    fn add_force_at_position(&mut self, force: Vector3<f32>, _position: Point3<f32>) {
        self.force += force;
    }

    fn axle_contact(&self, _axle: AxleId) -> WheelContact {
        let rolling = self.velocity.dot(&self.forward()) / self.radius * 60.0 / TAU;
        WheelContact {
            grounded: self.grounded,
            forward_slip: self.forward_slip,
            radius: self.radius,
            rpm: self.wheel_rpm.unwrap_or(rolling),
        }
    }

    fn set_motor_torque(&mut self, axle: AxleId, torque: f32) {
        self.motor[axle.0] = torque;
    }

    fn set_brake_torque(&mut self, axle: AxleId, torque: f32) {
        self.brake[axle.0] = torque;
    }

    fn set_steer_angle(&mut self, axle: AxleId, degrees: f32) {
        self.steer[axle.0] = degrees;
    }

    fn wheel_damping(&self, axle: AxleId) -> f32 {
        self.damping[axle.0]
    }

    fn set_wheel_damping(&mut self, axle: AxleId, rate: f32) {
        self.damping[axle.0] = rate;
        self.damping_writes += 1;
    }
}
