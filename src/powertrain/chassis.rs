// ==============================================================================
// chassis.rs — BODY FORCES + AUTO-STEER
// ------------------------------------------------------------------------------
// Three scalar force laws on top of the rigid-body solver, every tick:
//   air drag   F = -c_air  * v * |v|          (quadratic, opposes velocity)
//   downforce  F = -c_down * |v|^2 * up        (along the body's up axis)
//   tire drag  F = -c_tire * v                 (linear, at the body position)
//
// Auto-steer damps yaw: it measures the heading change since the last tick and
// swings the velocity vector by `yaw * amount` degrees about world up. Large
// jumps (wrap-around, teleports) are ignored.
// ==============================================================================

use nalgebra::{UnitQuaternion, Vector3};

use crate::config::VehicleConfig;
use crate::host::VehicleHost;

/// Heading changes at or above this (degrees per tick) are not yaw.
pub const AUTO_STEER_MAX_YAW: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChassisForces {
    pub air_drag: f32,
    pub downforce: f32,
    pub tire_drag: f32,
}

impl ChassisForces {
    pub fn from_config(config: &VehicleConfig) -> Self {
        Self {
            air_drag: config.air_drag_coeff,
            downforce: config.air_downforce_coeff,
            tire_drag: config.tire_drag_coeff,
        }
    }

    pub fn air_drag_force(&self, velocity: Vector3<f32>) -> Vector3<f32> {
        -self.air_drag * velocity * velocity.norm()
    }

    pub fn downforce_force(&self, velocity: Vector3<f32>, up: Vector3<f32>) -> Vector3<f32> {
        -self.downforce * velocity.norm_squared() * up
    }

    pub fn tire_drag_force(&self, velocity: Vector3<f32>) -> Vector3<f32> {
        -self.tire_drag * velocity
    }

    pub fn apply(&self, host: &mut impl VehicleHost) {
        let velocity = host.velocity();
        let up = host.up();
        let position = host.position();

        host.add_force(self.air_drag_force(velocity));
        host.add_force(self.downforce_force(velocity, up));
        host.add_force_at_position(self.tire_drag_force(velocity), position);
    }
}

/// Yaw this tick in degrees: previous heading minus current heading.
pub fn yaw_delta(old_heading: f32, heading: f32) -> f32 {
    old_heading - heading
}

/// Velocity swung about world up by `degrees`.
pub fn rotate_about_up(velocity: Vector3<f32>, degrees: f32) -> Vector3<f32> {
    UnitQuaternion::from_axis_angle(&Vector3::y_axis(), degrees.to_radians()) * velocity
}

/// One auto-steer pass. Returns the heading to remember for the next tick,
/// or `None` when any axle was airborne and the baseline must stay put.
pub fn auto_steer(
    host: &mut impl VehicleHost,
    old_heading: f32,
    amount: f32,
    all_grounded: bool,
) -> Option<f32> {
    if !all_grounded {
        return None;
    }

    let heading = host.heading_degrees();
    let yaw = yaw_delta(old_heading, heading);
    if yaw.abs() < AUTO_STEER_MAX_YAW {
        let velocity = rotate_about_up(host.velocity(), yaw * amount);
        host.set_velocity(velocity);
    }
    Some(heading)
}
