//! The rigid-body side of the vehicle.
//!
//! The powertrain never owns a physics engine. Each tick it talks to a
//! [`VehicleHost`], which answers per-axle contact queries, accepts forces
//! and wheel torques, and exposes the chassis pose/velocity. `physics.rs`
//! provides a rapier-backed host; tests use lightweight doubles.

use nalgebra::{Point3, UnitQuaternion, Vector3};

/// Index of an axle in `VehicleConfig::axles`, also the host's wheel handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AxleId(pub usize);

/// Contact sample for one axle, fresh every tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelContact {
    pub grounded: bool,
    pub forward_slip: f32, // signed, along the rolling direction
    pub radius: f32,       // m
    pub rpm: f32,          // signed wheel angular rate
}

impl WheelContact {
    pub const AIRBORNE: WheelContact = WheelContact {
        grounded: false,
        forward_slip: 0.0,
        radius: 0.0,
        rpm: 0.0,
    };
}

/// Torque value that locks a wheel outright.
pub const WHEEL_LOCK_TORQUE: f32 = f32::INFINITY;

/// Chassis up axis in body space (+Y). Forward is +Z.
pub const BODY_UP: Vector3<f32> = Vector3::new(0.0, 1.0, 0.0);
pub const BODY_FORWARD: Vector3<f32> = Vector3::new(0.0, 0.0, 1.0);

pub trait VehicleHost {
    /// False until the chassis body exists in the physics world.
    fn body_attached(&self) -> bool {
        true
    }

    // --- chassis query / mutation ---
    fn position(&self) -> Point3<f32>;
    fn rotation(&self) -> UnitQuaternion<f32>;
    fn velocity(&self) -> Vector3<f32>;
    fn angular_velocity(&self) -> Vector3<f32>;
    fn set_velocity(&mut self, velocity: Vector3<f32>);
    fn set_angular_velocity(&mut self, angular_velocity: Vector3<f32>);
    fn move_position(&mut self, position: Point3<f32>);
    fn move_rotation(&mut self, rotation: UnitQuaternion<f32>);

    // --- forces (world space, N) ---
    fn add_force(&mut self, force: Vector3<f32>);
    fn add_force_at_position(&mut self, force: Vector3<f32>, position: Point3<f32>);

    // --- wheels ---
    fn axle_contact(&self, axle: AxleId) -> WheelContact;
    /// Per-wheel drive torque, applied to both wheels of the axle.
    fn set_motor_torque(&mut self, axle: AxleId, torque: f32);
    /// Per-wheel brake torque; [`WHEEL_LOCK_TORQUE`] locks the wheels.
    fn set_brake_torque(&mut self, axle: AxleId, torque: f32);
    /// Degrees, positive steers right.
    fn set_steer_angle(&mut self, axle: AxleId, degrees: f32);
    fn wheel_damping(&self, axle: AxleId) -> f32;
    fn set_wheel_damping(&mut self, axle: AxleId, rate: f32);

    /// Body up axis in world space.
    fn up(&self) -> Vector3<f32> {
        self.rotation() * BODY_UP
    }

    /// Heading about world up, degrees in [0, 360).
    fn heading_degrees(&self) -> f32 {
        heading_of(&self.rotation())
    }
}

/// Heading of a chassis rotation about world up, degrees in [0, 360).
pub fn heading_of(rotation: &UnitQuaternion<f32>) -> f32 {
    let forward = rotation * BODY_FORWARD;
    forward.x.atan2(forward.z).to_degrees().rem_euclid(360.0)
}
