// ==============================================================================
// tire.rs — WHEEL SPIN + CONTACT FORCES FOR THE RAPIER RIG
// ------------------------------------------------------------------------------
// Each wheel carries its own angular velocity. Per physics tick:
//   1) brake torque pulls |omega| toward 0 (never through it)
//   2) grounded: spin and longitudinal force are solved together, implicitly,
//      against a linear slip law  Fx = C * (omega * r - v_long)
//        C = grip * Fz * slip_stiffness / max(|v_long|, MIN_SLIP_SPEED)
//      so stiff tires stay stable at 60 Hz. If |Fx| exceeds grip * Fz the
//      force saturates and the wheel spins/locks explicitly.
//   3) airborne: motor minus damping torque spins the wheel freely.
// Lateral grip is a brush-lite clamp: cancel part of the side slip this tick,
// bounded by grip * Fz. The friction circle then scales both components.
// ==============================================================================

use std::f32::consts::TAU;

use crate::config::RigConfig;

/// Slip speeds below this are treated as this (m/s); keeps C finite at rest.
pub const MIN_SLIP_SPEED: f32 = 0.5;
/// Share of the lateral slip cancelled per tick.
pub const LATERAL_RELAXATION: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TireParams {
    pub radius: f32,  // m
    pub inertia: f32, // kg*m^2 about the axle
    pub grip: f32,    // friction coefficient
    pub slip_stiffness: f32,
}

impl TireParams {
    pub fn from_rig(rig: &RigConfig) -> Self {
        Self {
            radius: rig.wheel_radius,
            inertia: 0.5 * rig.wheel_mass * rig.wheel_radius * rig.wheel_radius,
            grip: rig.tire_grip,
            slip_stiffness: rig.slip_stiffness,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelSpin {
    pub omega: f32,        // rad/s, positive rolls forward
    pub motor_torque: f32, // N*m
    pub brake_torque: f32, // N*m, infinite locks the wheel
    pub steer_deg: f32,    // positive steers right
    pub damping_rate: f32, // N*m*s/rad
}

impl WheelSpin {
    pub fn rpm(&self) -> f32 {
        self.omega * 60.0 / TAU
    }

    /// Signed slip along the rolling direction.
    pub fn forward_slip(&self, v_long: f32, radius: f32) -> f32 {
        (self.omega * radius - v_long) / v_long.abs().max(MIN_SLIP_SPEED)
    }

    fn drive_torque(&self) -> f32 {
        self.motor_torque - self.damping_rate * self.omega
    }

    fn apply_brake(&mut self, inertia: f32, dt: f32) {
        if self.brake_torque.is_infinite() {
            self.omega = 0.0;
            return;
        }
        let dw = self.brake_torque.max(0.0) * dt / inertia;
        self.omega = self.omega.signum() * (self.omega.abs() - dw).max(0.0);
    }

    /// Spin update on the ground; returns the longitudinal contact force (N).
    pub fn solve_grounded(&mut self, tire: &TireParams, v_long: f32, normal_force: f32, dt: f32) -> f32 {
        self.apply_brake(tire.inertia, dt);

        let limit = tire.grip * normal_force.max(0.0);
        let c = limit * tire.slip_stiffness / v_long.abs().max(MIN_SLIP_SPEED);
        let r = tire.radius;

        if self.brake_torque.is_infinite() {
            return (-c * v_long).clamp(-limit, limit);
        }

        let torque = self.drive_torque();
        let omega = (tire.inertia * self.omega + dt * (torque + c * v_long * r))
            / (tire.inertia + dt * c * r * r);
        let force = c * (omega * r - v_long);

        if force.abs() <= limit {
            self.omega = omega;
            return force;
        }

        let force = force.signum() * limit;
        self.omega += dt * (torque - force * r) / tire.inertia;
        force
    }

    pub fn free_spin(&mut self, tire: &TireParams, dt: f32) {
        self.omega += dt * self.drive_torque() / tire.inertia;
        self.apply_brake(tire.inertia, dt);
    }
}

/// Side force (N) cancelling part of `v_lat` for this wheel's share of mass.
pub fn lateral_force(v_lat: f32, normal_force: f32, grip: f32, mass_share: f32, dt: f32) -> f32 {
    let limit = grip * normal_force.max(0.0);
    (-v_lat * mass_share * LATERAL_RELAXATION / dt).clamp(-limit, limit)
}

/// Scale `(fx, fy)` onto the friction circle of radius `limit`.
pub fn friction_circle(fx: f32, fy: f32, limit: f32) -> (f32, f32) {
    let magnitude = (fx * fx + fy * fy).sqrt();
    if magnitude <= limit || magnitude <= f32::EPSILON {
        return (fx, fy);
    }
    let k = limit / magnitude;
    (fx * k, fy * k)
}
