// ==============================================================================
// physics.rs — RAPIER WORLD + RAYCAST VEHICLE RIGS
// ------------------------------------------------------------------------------
// PhysicsWorld owns the rapier sets and one Rig per vehicle. A rig is a single
// dynamic chassis body plus two raycast wheels per configured axle.
//
// Tick order (driven by the server loop):
//   1) VehicleDynamics::step talks to the rig through RigHost: reads the last
//      wheel contact samples, adds body forces, sets motor/brake/steer.
//   2) PhysicsWorld::step: suspension + tire forces from the wheel state,
//      rapier integration, contact classification, force reset.
//
// User forces persist inside rapier until reset, so every body's forces are
// cleared after integration; the dynamics re-adds them next tick.
// ==============================================================================

use std::collections::{HashMap, HashSet};

use nalgebra::{Point3, UnitQuaternion, Vector3};
use rapier3d::prelude::*;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{RigConfig, VehicleConfig};
use crate::events::CollisionLayer;
use crate::host::{AxleId, VehicleHost, WheelContact};
use crate::suspension_contact::{build_suspension_contact, WheelMount};
use crate::tire::{friction_circle, lateral_force, TireParams, WheelSpin};

const GROUP_GROUND: Group = Group::from_bits_truncate(0b0001);
const GROUP_CHASSIS: Group = Group::from_bits_truncate(0b0010);
const GROUP_OBSTACLE: Group = Group::from_bits_truncate(0b0100);

/// Bodies further than this from the origin are considered exploded.
const WORLD_LIMIT: f32 = 1_000.0;

#[derive(Debug, Clone)]
pub struct RigWheel {
    pub mount: WheelMount,
    pub spin: WheelSpin,
    pub grounded: bool,
    pub forward_slip: f32,
}

#[derive(Debug, Clone)]
pub struct Rig {
    pub body: RigidBodyHandle,
    pub collider: ColliderHandle,
    pub wheels: Vec<RigWheel>, // [left, right] per axle, in axle order
    pub tire: TireParams,
    pub rig: RigConfig,
    touching: HashSet<ColliderHandle>,
}

/// A reportable contact that began this step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactBegan {
    pub vehicle: Uuid,
    pub other: u32,
    pub layer: CollisionLayer,
}

pub struct PhysicsWorld {
    pub gravity: Vector<Real>,                // gravity vector
    pub pipeline: PhysicsPipeline,            // physics pipeline
    pub island_manager: IslandManager,        // manages islands of bodies
    pub broad_phase: DefaultBroadPhase,       // broad-phase collision detection
    pub narrow_phase: NarrowPhase,            // collision detection
    pub bodies: RigidBodySet,                 // for rigid bodies
    pub colliders: ColliderSet,               // for collision shapes
    pub joints: ImpulseJointSet,              // for constraints
    pub multibody_joints: MultibodyJointSet,  // for articulated bodies
    pub ccd: CCDSolver,                       // continuous collision detection
    pub query_pipeline: QueryPipeline,        // for raycasting
    pub rigs: HashMap<Uuid, Rig>,             // vehicle id -> rig
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    pub fn new() -> Self {
        let gravity = vector![0.0, -9.81, 0.0];

        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();

        // Big static ground box, top surface at y = 0.
        let ground_rb = RigidBodyBuilder::fixed().translation(vector![0.0, -1.0, 0.0]).build();
        let ground_handle = bodies.insert(ground_rb);

        let ground_collider = ColliderBuilder::cuboid(500.0, 1.0, 500.0)
            .collision_groups(InteractionGroups::new(GROUP_GROUND, GROUP_CHASSIS | GROUP_OBSTACLE))
            .user_data(CollisionLayer::Ground.to_user_data())
            .friction(1.2)
            .restitution(0.0)
            .build();
        colliders.insert_with_parent(ground_collider, ground_handle, &mut bodies);

        debug!(bodies = bodies.len(), colliders = colliders.len(), "physics: ground inserted");

        Self {
            gravity,
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies,
            colliders,
            joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            rigs: HashMap::new(),
        }
    }

    /// Chassis box with the configured mass and center of mass, plus two
    /// wheels per axle spread over the track width.
    pub fn spawn_rig(
        &mut self,
        id: Uuid,
        config: &VehicleConfig,
        position: Point3<f32>,
        rotation: UnitQuaternion<f32>,
    ) -> RigidBodyHandle {
        let rig = config.rig.clone();

        let rb = RigidBodyBuilder::dynamic()
            .position(Isometry::from_parts(position.coords.into(), rotation))
            .linear_damping(rig.linear_damping)
            .angular_damping(rig.angular_damping)
            .ccd_enabled(true)
            .build();

        let [hx, hy, hz] = rig.chassis_half_extents;
        let [cx, cy, cz] = config.center_of_mass;
        let m = config.mass;
        let inertia = vector![
            m / 3.0 * (hy * hy + hz * hz),
            m / 3.0 * (hx * hx + hz * hz),
            m / 3.0 * (hx * hx + hy * hy)
        ];

        let collider = ColliderBuilder::cuboid(hx, hy, hz)
            .mass_properties(MassProperties::new(point![cx, cy, cz], m, inertia))
            .collision_groups(InteractionGroups::new(
                GROUP_CHASSIS,
                GROUP_GROUND | GROUP_CHASSIS | GROUP_OBSTACLE,
            ))
            .user_data(CollisionLayer::Agent.to_user_data())
            .friction(0.0)
            .restitution(0.0)
            .build();

        let handle = self.bodies.insert(rb);
        let collider = self.colliders.insert_with_parent(collider, handle, &mut self.bodies);

        let half_track = rig.track_width * 0.5;
        let wheels = config
            .axles
            .iter()
            .enumerate()
            .flat_map(|(axle, cfg)| {
                let [x, y, z] = cfg.position;
                // +X is the left side with +Z forward and +Y up
                [x + half_track, x - half_track].map(|wx| RigWheel {
                    mount: WheelMount { axle, offset: point![wx, y, z] },
                    spin: WheelSpin { damping_rate: config.wheel_damping, ..Default::default() },
                    grounded: false,
                    forward_slip: 0.0,
                })
            })
            .collect();

        self.rigs.insert(
            id,
            Rig {
                body: handle,
                collider,
                wheels,
                tire: TireParams::from_rig(&rig),
                rig,
                touching: HashSet::new(),
            },
        );

        debug!(%id, ?position, "physics: spawned rig");
        handle
    }

    pub fn remove_rig(&mut self, id: &Uuid) {
        if let Some(rig) = self.rigs.remove(id) {
            self.bodies.remove(
                rig.body,
                &mut self.island_manager,
                &mut self.colliders,
                &mut self.joints,
                &mut self.multibody_joints,
                true,
            );
        }
    }

    /// Static box tagged with a collision layer.
    pub fn add_obstacle(
        &mut self,
        half_extents: [f32; 3],
        position: Point3<f32>,
        layer: CollisionLayer,
    ) -> ColliderHandle {
        let [hx, hy, hz] = half_extents;
        let collider = ColliderBuilder::cuboid(hx, hy, hz)
            .translation(position.coords)
            .collision_groups(InteractionGroups::new(GROUP_OBSTACLE, GROUP_CHASSIS | GROUP_GROUND))
            .user_data(layer.to_user_data())
            .build();
        self.colliders.insert(collider)
    }

    /// The rig for `id` as a dynamics host.
    pub fn host(&mut self, id: &Uuid) -> Option<RigHost<'_>> {
        let rig = self.rigs.get_mut(id)?;
        Some(RigHost { bodies: &mut self.bodies, rig })
    }

    // --------------------------------------------------------------------------
    // Step
    // --------------------------------------------------------------------------

    pub fn step(&mut self, dt: Real) -> Vec<ContactBegan> {
        self.query_pipeline.update(&self.colliders);

        for rig in self.rigs.values_mut() {
            apply_wheel_forces(rig, &mut self.bodies, &self.colliders, &self.query_pipeline, dt);
        }

        self.pipeline.step(
            &self.gravity,
            &IntegrationParameters { dt, ..IntegrationParameters::default() },
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );

        for (_, body) in self.bodies.iter_mut() {
            body.reset_forces(false);
            body.reset_torques(false);

            let pos = *body.translation();
            let bad = !pos.x.is_finite()
                || !pos.y.is_finite()
                || !pos.z.is_finite()
                || pos.x.abs() > WORLD_LIMIT
                || pos.y.abs() > WORLD_LIMIT
                || pos.z.abs() > WORLD_LIMIT;

            if bad {
                warn!(?pos, "physics: body left the world, respawning at origin");
                body.set_translation(vector![0.0, 1.5, 0.0], true);
                body.set_rotation(UnitQuaternion::identity(), true);
                body.set_linvel(vector![0.0, 0.0, 0.0], true);
                body.set_angvel(vector![0.0, 0.0, 0.0], true);
            }
        }

        self.collect_contacts()
    }

    /// Reportable contacts that started since the previous step.
    fn collect_contacts(&mut self) -> Vec<ContactBegan> {
        let mut began = Vec::new();

        for (id, rig) in self.rigs.iter_mut() {
            let mut now_touching = HashSet::new();
            for pair in self.narrow_phase.contact_pairs_with(rig.collider) {
                if !pair.has_any_active_contact {
                    continue;
                }
                let other = if pair.collider1 == rig.collider { pair.collider2 } else { pair.collider1 };
                now_touching.insert(other);

                if rig.touching.contains(&other) {
                    continue;
                }
                let layer = self
                    .colliders
                    .get(other)
                    .map(|c| CollisionLayer::from_user_data(c.user_data))
                    .unwrap_or_default();
                if layer.is_reportable() {
                    began.push(ContactBegan { vehicle: *id, other: other.into_raw_parts().0, layer });
                }
            }
            rig.touching = now_touching;
        }

        began
    }
}

/// Suspension, tire forces and wheel spin for one rig.
fn apply_wheel_forces(
    rig: &mut Rig,
    bodies: &mut RigidBodySet,
    colliders: &ColliderSet,
    query: &QueryPipeline,
    dt: f32,
) {
    let Some(body) = bodies.get(rig.body) else { return };
    let mass_share = body.mass() / rig.wheels.len().max(1) as f32;

    let mut forces: Vec<(Vector3<f32>, Point3<f32>)> = Vec::with_capacity(rig.wheels.len() * 2);

    for wheel in rig.wheels.iter_mut() {
        let contact = build_suspension_contact(
            &wheel.mount,
            wheel.spin.steer_deg,
            &rig.rig,
            body,
            rig.body,
            query,
            bodies,
            colliders,
        );

        let Some(contact) = contact else {
            wheel.spin.free_spin(&rig.tire, dt);
            wheel.grounded = false;
            wheel.forward_slip = 0.0;
            continue;
        };

        let fz = contact.normal_force;
        let fx = wheel.spin.solve_grounded(&rig.tire, contact.v_long, fz, dt);
        let fy = lateral_force(contact.v_lat, fz, rig.tire.grip, mass_share, dt);
        let (fx, fy) = friction_circle(fx, fy, rig.tire.grip * fz);

        wheel.grounded = true;
        wheel.forward_slip = wheel.spin.forward_slip(contact.v_long, rig.tire.radius);

        forces.push((contact.ground_normal * fz, contact.hit_point));
        forces.push((contact.forward * fx + contact.side * fy, contact.apply_point));
    }

    if let Some(body) = bodies.get_mut(rig.body) {
        for (force, point) in forces {
            body.add_force_at_point(force, point, true);
        }
    }
}

// ==============================================================================
// RigHost — VehicleHost over one rig
// ==============================================================================

pub struct RigHost<'a> {
    bodies: &'a mut RigidBodySet,
    rig: &'a mut Rig,
}

impl RigHost<'_> {
    fn body(&self) -> Option<&RigidBody> {
        self.bodies.get(self.rig.body)
    }

    fn body_mut(&mut self) -> Option<&mut RigidBody> {
        self.bodies.get_mut(self.rig.body)
    }

    fn axle_wheels(&mut self, axle: AxleId) -> impl Iterator<Item = &mut RigWheel> {
        self.rig.wheels.iter_mut().filter(move |w| w.mount.axle == axle.0)
    }
}

impl VehicleHost for RigHost<'_> {
    fn body_attached(&self) -> bool {
        self.body().is_some()
    }

    fn position(&self) -> Point3<f32> {
        self.body().map(|b| Point3::from(*b.translation())).unwrap_or_else(Point3::origin)
    }

    fn rotation(&self) -> UnitQuaternion<f32> {
        self.body().map(|b| *b.rotation()).unwrap_or_else(UnitQuaternion::identity)
    }

    fn velocity(&self) -> Vector3<f32> {
        self.body().map(|b| *b.linvel()).unwrap_or_else(Vector3::zeros)
    }

    fn angular_velocity(&self) -> Vector3<f32> {
        self.body().map(|b| *b.angvel()).unwrap_or_else(Vector3::zeros)
    }

    fn set_velocity(&mut self, velocity: Vector3<f32>) {
        if let Some(body) = self.body_mut() {
            body.set_linvel(velocity, true);
        }
    }

    fn set_angular_velocity(&mut self, angular_velocity: Vector3<f32>) {
        if let Some(body) = self.body_mut() {
            body.set_angvel(angular_velocity, true);
        }
    }

    fn move_position(&mut self, position: Point3<f32>) {
        if let Some(body) = self.body_mut() {
            body.set_translation(position.coords, true);
        }
    }

    fn move_rotation(&mut self, rotation: UnitQuaternion<f32>) {
        if let Some(body) = self.body_mut() {
            body.set_rotation(rotation, true);
        }
    }

    fn add_force(&mut self, force: Vector3<f32>) {
        if let Some(body) = self.body_mut() {
            body.add_force(force, true);
        }
    }

    fn add_force_at_position(&mut self, force: Vector3<f32>, position: Point3<f32>) {
        if let Some(body) = self.body_mut() {
            body.add_force_at_point(force, position, true);
        }
    }

    /// Both wheels must touch for the axle to count as grounded; the slip
    /// reported is the harder-slipping wheel's.
    fn axle_contact(&self, axle: AxleId) -> WheelContact {
        let mut wheels = self.rig.wheels.iter().filter(|w| w.mount.axle == axle.0).peekable();
        if wheels.peek().is_none() {
            return WheelContact::AIRBORNE;
        }

        let (mut grounded, mut slip, mut rpm, mut count) = (true, 0.0f32, 0.0, 0);
        for wheel in wheels {
            grounded &= wheel.grounded;
            if wheel.forward_slip.abs() > slip.abs() {
                slip = wheel.forward_slip;
            }
            rpm += wheel.spin.rpm();
            count += 1;
        }

        WheelContact {
            grounded,
            forward_slip: slip,
            radius: self.rig.tire.radius,
            rpm: rpm / count as f32,
        }
    }

    fn set_motor_torque(&mut self, axle: AxleId, torque: f32) {
        for wheel in self.axle_wheels(axle) {
            wheel.spin.motor_torque = torque;
        }
    }

    fn set_brake_torque(&mut self, axle: AxleId, torque: f32) {
        for wheel in self.axle_wheels(axle) {
            wheel.spin.brake_torque = torque;
        }
    }

    fn set_steer_angle(&mut self, axle: AxleId, degrees: f32) {
        for wheel in self.axle_wheels(axle) {
            wheel.spin.steer_deg = degrees;
        }
    }

    fn wheel_damping(&self, axle: AxleId) -> f32 {
        self.rig
            .wheels
            .iter()
            .find(|w| w.mount.axle == axle.0)
            .map(|w| w.spin.damping_rate)
            .unwrap_or(0.0)
    }

    fn set_wheel_damping(&mut self, axle: AxleId, rate: f32) {
        for wheel in self.axle_wheels(axle) {
            wheel.spin.damping_rate = rate;
        }
    }
}
