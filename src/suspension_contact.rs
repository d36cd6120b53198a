// ==============================================================================
// suspension_contact.rs — RAYCAST SUSPENSION + CONTACT PATCH KINEMATICS
// ------------------------------------------------------------------------------
// One ray per wheel, cast straight down from the wheel mount. A hit within
// rest_length + radius compresses the spring; the contact then carries:
// - geometry: hit_point, apply_point, ground_normal
// - suspension state: compression, suspension velocity, normal force
// - wheel basis (forward/side) with the wheel's steer angle applied
// - slip components (v_long, v_lat) for tire.rs
//
// Nothing here applies forces. physics.rs turns contacts into forces.
// Ground normal is assumed flat-up.
// ==============================================================================

use nalgebra::{Point3, UnitQuaternion, Vector3};
use rapier3d::prelude::*;

use crate::config::RigConfig;
use crate::host::{BODY_FORWARD, BODY_UP};

/// Wheel attachment in chassis space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelMount {
    pub axle: usize,
    pub offset: Point3<f32>, // top of the suspension travel, chassis space
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuspensionContact {
    // geometry
    pub hit_point: Point3<f32>,
    pub apply_point: Point3<f32>,
    pub ground_normal: Vector3<f32>,

    // suspension state
    pub compression: f32,
    pub suspension_vel: f32,
    pub normal_force: f32,

    // wheel basis (world)
    pub forward: Vector3<f32>,
    pub side: Vector3<f32>, // points right

    // slip
    pub v_long: f32,
    pub v_lat: f32,
}

/// Spring plus damper along the contact normal, never pulling.
pub(crate) fn compute_suspension_force(compression: f32, suspension_vel: f32, k: f32, c: f32) -> f32 {
    // Deadzone
    let v = if suspension_vel.abs() < 0.05 { 0.0 } else { suspension_vel };

    // One-way damper (kills rebound)
    let v = if v > 0.0 { v * 0.4 } else { v };

    let spring = k * compression;
    let damper = (-c * v).clamp(-spring * 0.6, spring * 0.6);

    (spring + damper).max(0.0)
}

/// Wheel rolling direction and right-hand side, projected onto the ground.
pub fn wheel_basis(
    rotation: &UnitQuaternion<f32>,
    steer_deg: f32,
    ground_n: Vector3<f32>,
) -> (Vector3<f32>, Vector3<f32>) {
    // positive steer turns right, which is negative yaw about body up
    let steer = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), -steer_deg.to_radians());
    let heading = rotation * (steer * BODY_FORWARD);

    let projected = heading - ground_n * heading.dot(&ground_n);
    let forward = if projected.norm() > 1e-6 {
        projected.normalize()
    } else {
        rotation * BODY_FORWARD
    };
    let side = forward.cross(&ground_n);
    (forward, side)
}

pub fn build_suspension_contact(
    mount: &WheelMount,
    steer_deg: f32,
    rig: &RigConfig,
    body: &RigidBody,
    handle: RigidBodyHandle,
    query: &QueryPipeline,
    bodies: &RigidBodySet,
    colliders: &ColliderSet,
) -> Option<SuspensionContact> {
    let pos = body.position();
    let rot = pos.rotation;
    let linvel = *body.linvel();
    let angvel = *body.angvel();
    let com = *body.center_of_mass();

    let origin = pos * mount.offset;
    let ground_n = BODY_UP;
    let dir = -ground_n;
    let max_dist = rig.suspension_rest_length + rig.wheel_radius;

    let ray = Ray::new(origin, dir);
    let filter = QueryFilter::default().exclude_rigid_body(handle);
    let (_collider, toi) = query.cast_ray(bodies, colliders, &ray, max_dist, true, filter)?;

    let suspension_length = toi - rig.wheel_radius;
    let compression = (rig.suspension_rest_length - suspension_length).clamp(0.0, rig.suspension_travel);
    if compression <= 0.0 {
        return None;
    }

    let hit_point = origin + dir * toi;
    let r = hit_point - com;
    let point_vel = linvel + angvel.cross(&r);
    let suspension_vel = point_vel.dot(&ground_n);

    let normal_force = compute_suspension_force(
        compression,
        suspension_vel,
        rig.suspension_stiffness,
        rig.suspension_damping,
    );

    let (forward, side) = wheel_basis(&rot, steer_deg, ground_n);

    Some(SuspensionContact {
        hit_point,
        apply_point: hit_point + ground_n * (rig.wheel_radius * 0.25),
        ground_normal: ground_n,
        compression,
        suspension_vel,
        normal_force,
        forward,
        side,
        v_long: point_vel.dot(&forward),
        v_lat: point_vel.dot(&side),
    })
}
