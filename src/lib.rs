//! Discrete-time vehicle powertrain and chassis dynamics.
//!
//! [`powertrain::VehicleDynamics`] advances engine RPM, gearbox, traction
//! control, fuel and engine temperature once per fixed tick, and drives a
//! rigid body through the [`host::VehicleHost`] trait. [`physics`] provides a
//! rapier3d-backed host with raycast wheels.

pub mod config;
pub mod control;
pub mod curve;
pub mod error;
pub mod events;
pub mod host;
pub mod physics;
pub mod powertrain;
pub mod suspension_contact;
pub mod tire;
pub mod vehicle;

pub use config::{AxleConfig, RigConfig, VehicleConfig};
pub use control::{ControlMode, VehicleController};
pub use curve::Curve;
pub use error::{DynamicsError, Result};
pub use events::{CollisionLayer, DynamicsEvent};
pub use host::{AxleId, VehicleHost, WheelContact};
pub use powertrain::{TickReport, VehicleDynamics};
pub use vehicle::{DriverInput, Ignition, VehicleState};
