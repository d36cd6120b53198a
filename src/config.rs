//! Static vehicle configuration.
//!
//! Everything here is fixed for the lifetime of a vehicle instance. The
//! sedan preset carries the reference tuning; TOML documents override it
//! field by field.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::curve::Curve;
use crate::error::{DynamicsError, Result};

/// One axle: a pair of wheels sharing a motor/steering/brake role.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxleConfig {
    pub motor: bool,        // receives drive torque
    pub steering: bool,     // follows the steering angle
    pub brake_bias: f32,    // 0..1 share of max brake torque
    pub position: [f32; 3], // axle center in chassis space (m)
}

impl Default for AxleConfig {
    fn default() -> Self {
        Self {
            motor: false,
            steering: false,
            brake_bias: 0.5,
            position: [0.0, -0.3, 0.0],
        }
    }
}

/// Parameters only the rapier-backed rig consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    pub chassis_half_extents: [f32; 3], // [hx, hy, hz] meters
    pub track_width: f32,               // meters (left to right)
    pub wheel_radius: f32,              // meters
    pub wheel_mass: f32,                // kg, sets spin inertia
    pub suspension_rest_length: f32,    // meters
    pub suspension_travel: f32,         // meters of compression available
    pub suspension_stiffness: f32,      // N/m
    pub suspension_damping: f32,        // N*s/m
    pub tire_grip: f32,                 // friction coefficient
    pub slip_stiffness: f32,            // slip ratio -> force fraction
    pub linear_damping: f32,
    pub angular_damping: f32,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            chassis_half_extents: [0.9, 0.35, 2.1],
            track_width: 1.5,
            wheel_radius: 0.35,
            wheel_mass: 20.0,
            suspension_rest_length: 0.4,
            suspension_travel: 0.3,
            suspension_stiffness: 35_000.0,
            suspension_damping: 4_000.0,
            tire_grip: 1.0,
            slip_stiffness: 8.0,
            linear_damping: 0.05,
            angular_damping: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    pub axles: Vec<AxleConfig>,

    // --- Body ---
    pub mass: f32,                // kg
    pub center_of_mass: [f32; 3], // chassis space

    // --- Engine / brakes / steering ---
    pub max_motor_torque: f32,   // N*m at the peak of the torque curve
    pub max_brake_torque: f32,   // N*m at full brake
    pub max_steering_angle: f32, // degrees, range is +-max
    pub min_rpm: f32,            // idle
    pub max_rpm: f32,
    pub rpm_smoothness: f32, // 1/s smoothing rate toward the wheel-driven RPM

    // --- Gearbox ---
    pub gear_ratios: Vec<f32>,
    pub final_drive_ratio: f32,
    pub shift_delay: f32, // s, min time between gear changes
    pub shift_time: f32,  // s, interpolation window of one shift

    // --- Curves ---
    pub torque_curve: Curve,     // torque fraction by RPM / max RPM
    pub shift_up_curve: Curve,   // RPM fraction by throttle
    pub shift_down_curve: Curve, // RPM fraction by throttle

    // --- Body forces ---
    pub air_drag_coeff: f32,
    pub air_downforce_coeff: f32,
    pub tire_drag_coeff: f32,
    pub wheel_damping: f32,

    // --- Assists ---
    pub auto_steer_amount: f32,       // 0..1
    pub traction_control_amount: f32, // 0..1
    pub traction_control_slip_limit: f32,

    // --- Fuel / thermal ---
    pub fuel_capacity: f32,         // litres, tank starts full
    pub ambient_temperature_k: f32, // engine starts at ambient

    pub rig: RigConfig,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self::sedan()
    }
}

impl VehicleConfig {
    /// Rear-driven sedan with front steering.
    pub fn sedan() -> Self {
        Self {
            axles: vec![
                AxleConfig {
                    motor: false,
                    steering: true,
                    brake_bias: 0.6,
                    position: [0.0, -0.3, 1.3],
                },
                AxleConfig {
                    motor: true,
                    steering: false,
                    brake_bias: 0.4,
                    position: [0.0, -0.3, -1.3],
                },
            ],
            mass: 1350.0,
            center_of_mass: [0.0, -0.15, 0.0],
            max_motor_torque: 450.0,
            max_brake_torque: 3000.0,
            max_steering_angle: 39.4,
            min_rpm: 800.0,
            max_rpm: 8299.0,
            rpm_smoothness: 20.0,
            gear_ratios: vec![4.17, 3.14, 2.11, 1.67, 1.28, 1.0, 0.84, 0.67],
            final_drive_ratio: 2.56,
            shift_delay: 0.7,
            shift_time: 0.4,
            torque_curve: Curve::new(vec![
                [0.0, 0.55],
                [0.25, 0.8],
                [0.5, 0.95],
                [0.7, 1.0],
                [0.9, 0.85],
                [1.0, 0.5],
            ]),
            shift_up_curve: Curve::new(vec![[-1.0, 0.35], [0.0, 0.35], [0.5, 0.6], [1.0, 0.85]]),
            shift_down_curve: Curve::new(vec![[-1.0, 0.12], [0.0, 0.15], [1.0, 0.35]]),
            air_drag_coeff: 1.0,
            air_downforce_coeff: 2.0,
            tire_drag_coeff: 4.0,
            wheel_damping: 1.0,
            auto_steer_amount: 0.338,
            traction_control_amount: 0.675,
            traction_control_slip_limit: 0.8,
            fuel_capacity: 60.0,
            ambient_temperature_k: 273.15 + 22.0,
            rig: RigConfig::default(),
        }
    }

    /// Parse a TOML document; missing fields keep the sedan values.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: VehicleConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn num_gears(&self) -> usize {
        self.gear_ratios.len()
    }

    /// Two wheels per motor axle.
    pub fn num_driving_wheels(&self) -> usize {
        self.axles.iter().filter(|a| a.motor).count() * 2
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(DynamicsError::InvalidConfig(msg));

        if self.axles.is_empty() {
            return invalid("no axles configured".into());
        }
        if self.num_driving_wheels() == 0 {
            return invalid("no motor axle, vehicle has zero driving wheels".into());
        }
        for (i, axle) in self.axles.iter().enumerate() {
            if !(0.0..=1.0).contains(&axle.brake_bias) {
                return invalid(format!("axle {i}: brake_bias {} outside 0..1", axle.brake_bias));
            }
        }
        if self.gear_ratios.is_empty() {
            return invalid("gear ratio table is empty".into());
        }
        if self.gear_ratios.iter().any(|r| !r.is_finite() || *r <= 0.0) {
            return invalid("gear ratios must be positive".into());
        }

        let scalars = [
            ("mass", self.mass),
            ("max_motor_torque", self.max_motor_torque),
            ("max_brake_torque", self.max_brake_torque),
            ("max_steering_angle", self.max_steering_angle),
            ("min_rpm", self.min_rpm),
            ("max_rpm", self.max_rpm),
            ("rpm_smoothness", self.rpm_smoothness),
            ("final_drive_ratio", self.final_drive_ratio),
            ("shift_delay", self.shift_delay),
            ("shift_time", self.shift_time),
            ("air_drag_coeff", self.air_drag_coeff),
            ("air_downforce_coeff", self.air_downforce_coeff),
            ("tire_drag_coeff", self.tire_drag_coeff),
            ("wheel_damping", self.wheel_damping),
            ("traction_control_slip_limit", self.traction_control_slip_limit),
            ("fuel_capacity", self.fuel_capacity),
            ("ambient_temperature_k", self.ambient_temperature_k),
        ];
        for (name, value) in scalars {
            if !value.is_finite() || value < 0.0 {
                return invalid(format!("{name} must be a finite non-negative number, got {value}"));
            }
        }

        if self.mass <= 0.0 {
            return invalid("mass must be positive".into());
        }
        if self.max_rpm <= 0.0 {
            return invalid("max_rpm must be positive".into());
        }
        if self.shift_time <= 0.0 {
            return invalid("shift_time must be positive".into());
        }
        if !(0.0..=1.0).contains(&self.traction_control_amount) {
            return invalid("traction_control_amount outside 0..1".into());
        }
        if !(0.0..=1.0).contains(&self.auto_steer_amount) {
            return invalid("auto_steer_amount outside 0..1".into());
        }

        for (name, curve) in [
            ("torque_curve", &self.torque_curve),
            ("shift_up_curve", &self.shift_up_curve),
            ("shift_down_curve", &self.shift_down_curve),
        ] {
            if !curve.is_well_formed() {
                return invalid(format!("{name} needs finite keys sorted by x"));
            }
        }

        if self.rig.wheel_radius <= 0.0 || self.rig.wheel_mass <= 0.0 {
            return invalid("rig wheel radius and mass must be positive".into());
        }

        Ok(())
    }
}
