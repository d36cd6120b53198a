pub mod chassis;
pub mod gearbox;
pub mod step;
pub mod thermal;
pub mod traction;

pub use chassis::ChassisForces;
pub use gearbox::Gearbox;
pub use step::{TickReport, VehicleDynamics};
pub use traction::TractionControl;
