// ==============================================================================
// step.rs — ONE FIXED TICK OF THE POWERTRAIN
// ------------------------------------------------------------------------------
// Order per tick:
//   inputs -> body forces -> gear ratio -> wheel RPM -> engine RPM (smoothed)
//   -> contacts -> steering -> torque from curve -> handbrake override
//   -> auto-steer -> torque routing -> traction control -> gearbox
//   -> speed -> odometry -> fuel/thermal -> road slip
//
// Nothing in here returns an error. Numeric hazards (NaN RPM ratio, empty
// gear table, zero driven wheels, dt <= 0) resolve to zero torque or a
// skipped tick, and the next tick runs the same guards again.
// ==============================================================================

use nalgebra::{Point3, UnitQuaternion, Vector3};
use tracing::{debug, info};

use crate::config::VehicleConfig;
use crate::error::Result;
use crate::events::DynamicsEvent;
use crate::host::{heading_of, AxleId, VehicleHost, WheelContact, WHEEL_LOCK_TORQUE};
use crate::powertrain::chassis::{self, ChassisForces};
use crate::powertrain::gearbox::{ShiftInputs, ShiftSchedule};
use crate::powertrain::thermal::{self, ThermalInput};
use crate::powertrain::traction::TractionControl;
use crate::vehicle::{DriverInput, Ignition, VehicleState, METRES_TO_MILES, MPS_TO_MPH};

/// Engine RPM below this snaps to 0.
pub const RPM_EPSILON: f32 = 0.02;

/// Everything a tick produced besides state changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub events: Vec<DynamicsEvent>,
}

#[derive(Debug, Clone)]
pub struct VehicleDynamics {
    config: VehicleConfig,
    state: VehicleState,
    traction: TractionControl,
    chassis: ChassisForces,
    clock: f32, // s of simulated time
}

impl VehicleDynamics {
    pub fn new(config: VehicleConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: VehicleState::new(&config),
            traction: TractionControl::from_config(&config),
            chassis: ChassisForces::from_config(&config),
            config,
            clock: 0.0,
        })
    }

    pub fn config(&self) -> &VehicleConfig {
        &self.config
    }

    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    pub fn clock(&self) -> f32 {
        self.clock
    }

    /// Take the heading and position baselines from the body, and push the
    /// configured wheel damping. Call once the body exists.
    pub fn attach(&mut self, host: &mut impl VehicleHost) {
        self.state.old_heading = host.heading_degrees();
        self.state.last_position = host.position();
        self.sync_display(host);
    }

    // --------------------------------------------------------------------------
    // Fixed tick
    // --------------------------------------------------------------------------

    pub fn step(&mut self, host: &mut impl VehicleHost, input: DriverInput, dt: f32) -> TickReport {
        let mut report = TickReport::default();
        if !(dt > 0.0 && dt.is_finite()) {
            return report;
        }
        self.clock += dt;
        let now = self.clock;
        let ignition_on = self.state.ignition == Ignition::On;

        // 1. inputs
        let input = input.clamped();
        self.state.steer_input = input.steer;
        self.state.accel_input = input.accel;

        // 2. body forces
        self.chassis.apply(host);

        // 3. gear ratio
        let gear_ratio = self.state.gearbox.ratio(&self.config.gear_ratios);

        // 4 + 6. contacts (one sample serves the whole tick) and wheel RPM
        let contacts: Vec<WheelContact> = (0..self.config.axles.len())
            .map(|i| host.axle_contact(AxleId(i)))
            .collect();
        let wheels_rpm = self.driven_wheels_rpm(&contacts);

        // 5. engine RPM
        self.state.rpm = self.smoothed_rpm(wheels_rpm, gear_ratio, dt);

        // 7. steering
        let steer_angle = self.config.max_steering_angle * self.state.steer_input;
        self.state.steer_angle = steer_angle;
        for (i, axle) in self.config.axles.iter().enumerate() {
            if axle.steering {
                host.set_steer_angle(AxleId(i), steer_angle);
            }
        }

        // 8. torque
        self.state.torque = self.curve_torque(gear_ratio);

        // 9. handbrake brakes through the accel channel, this tick only
        let accel = if self.state.handbrake { -1.0 } else { self.state.accel_input };

        // 10. auto-steer
        if ignition_on {
            let all_grounded = contacts.iter().all(|c| c.grounded);
            if let Some(heading) =
                chassis::auto_steer(host, self.state.old_heading, self.config.auto_steer_amount, all_grounded)
            {
                self.state.old_heading = heading;
            }
        }

        // 11. torque routing
        self.route_torque(host, accel, ignition_on);

        // 12. traction control, one step per grounded motor axle
        for (axle, contact) in self.config.axles.iter().zip(&contacts) {
            if axle.motor && contact.grounded {
                self.state.traction_cap = self.traction.adjust(self.state.traction_cap, contact.forward_slip);
            }
        }

        // 13. gearbox
        if ignition_on {
            let inputs = ShiftInputs {
                now,
                rpm: self.state.rpm,
                max_rpm: self.config.max_rpm,
                throttle: accel,
                speed: self.state.speed,
            };
            let schedule = ShiftSchedule { up: &self.config.shift_up_curve, down: &self.config.shift_down_curve };
            self.state.gearbox.auto_shift(inputs, schedule);
        }
        self.state.gearbox.update(now);

        // 14. speed, twice
        let position = host.position();
        self.state.speed = host.velocity().norm() * MPS_TO_MPH;
        self.state.measured_speed = (position - self.state.last_position).norm() / dt;
        self.state.last_position = position;

        // 15. odometry
        let radius = self.odometry_radius(&contacts);
        let distance = wheels_rpm / 60.0 * (radius * 2.0 * std::f32::consts::PI) * dt;
        self.state.odometer += distance;
        self.state.mile_ticker += distance;
        if self.state.mile_ticker * METRES_TO_MILES > 1.0 {
            self.state.mile_ticker = 0.0;
            info!(odometer = self.state.odometer, "vehicle: mile tick");
            report.events.push(DynamicsEvent::MileTick { odometer: self.state.odometer });
        }

        // 16. fuel + engine temperature
        let thermal = thermal::step(&ThermalInput {
            rpm: self.state.rpm,
            torque: self.state.torque,
            accel,
            ignition: self.state.ignition,
            min_rpm: self.config.min_rpm,
            speed: self.state.speed,
            engine_temperature_k: self.state.engine_temperature_k,
            ambient_temperature_k: self.state.ambient_temperature_k,
            cooling_malfunction: self.state.cooling_malfunction,
            dt,
        });
        self.state.fuel_level = (self.state.fuel_level - thermal.fuel_consumed).max(0.0);
        self.state.fuel_per_metre = if distance > 0.0 { thermal.fuel_consumed / distance } else { 0.0 };
        self.state.fuel_per_second = thermal.fuel_rate;
        self.state.engine_temperature_k = thermal.engine_temperature_k;

        // 17. road surface slip under the reference axle
        self.state.road_slip = match contacts.first() {
            Some(contact) if contact.grounded => contact.forward_slip,
            _ => 0.0,
        };

        report
    }

    /// Average angular rate of the driven wheels, never negative.
    fn driven_wheels_rpm(&self, contacts: &[WheelContact]) -> f32 {
        let (sum, count) = self
            .config
            .axles
            .iter()
            .zip(contacts)
            .filter(|(axle, _)| axle.motor)
            .fold((0.0, 0usize), |(sum, count), (_, c)| (sum + c.rpm, count + 1));
        if count == 0 {
            return 0.0;
        }
        let rpm = sum / count as f32;
        if rpm.is_finite() { rpm.max(0.0) } else { 0.0 }
    }

    fn smoothed_rpm(&self, wheels_rpm: f32, gear_ratio: f32, dt: f32) -> f32 {
        let idle_floor = match self.state.ignition {
            Ignition::On => self.config.min_rpm,
            Ignition::Off => 0.0,
        };
        let target = idle_floor + wheels_rpm * self.config.final_drive_ratio * gear_ratio;
        let t = (dt * self.config.rpm_smoothness).clamp(0.0, 1.0);
        let rpm = self.state.rpm + (target - self.state.rpm) * t;

        if !rpm.is_finite() || rpm < RPM_EPSILON { 0.0 } else { rpm }
    }

    fn curve_torque(&self, gear_ratio: f32) -> f32 {
        let rpm_fraction = self.state.rpm / self.config.max_rpm;
        if !rpm_fraction.is_finite() {
            return 0.0;
        }
        let torque = self.config.torque_curve.evaluate(rpm_fraction)
            * gear_ratio
            * self.config.final_drive_ratio
            * self.state.traction_cap;
        if torque.is_finite() { torque } else { 0.0 }
    }

    fn route_torque(&self, host: &mut impl VehicleHost, accel: f32, ignition_on: bool) {
        if accel >= 0.0 {
            let driving_wheels = self.config.num_driving_wheels();
            let per_wheel = if ignition_on && driving_wheels > 0 {
                accel * (self.state.torque / driving_wheels as f32)
            } else {
                0.0
            };
            for (i, axle) in self.config.axles.iter().enumerate() {
                if axle.motor {
                    host.set_motor_torque(AxleId(i), per_wheel);
                }
                host.set_brake_torque(AxleId(i), 0.0);
            }
        } else {
            for (i, axle) in self.config.axles.iter().enumerate() {
                host.set_brake_torque(AxleId(i), self.config.max_brake_torque * -accel * axle.brake_bias);
                host.set_motor_torque(AxleId(i), 0.0);
            }
        }
    }

    fn odometry_radius(&self, contacts: &[WheelContact]) -> f32 {
        self.config
            .axles
            .iter()
            .zip(contacts)
            .find(|(axle, _)| axle.motor)
            .map(|(_, c)| c.radius)
            .unwrap_or(0.0)
    }

    // --------------------------------------------------------------------------
    // Reset
    // --------------------------------------------------------------------------

    /// Teleport to `position`/`rotation` and settle into the rest state with
    /// every wheel locked. No-op while the body is not attached.
    pub fn force_reset(
        &mut self,
        host: &mut impl VehicleHost,
        position: Point3<f32>,
        rotation: UnitQuaternion<f32>,
    ) {
        if !host.body_attached() {
            debug!("vehicle: reset ignored, no body attached");
            return;
        }

        host.move_position(position);
        host.move_rotation(rotation);
        host.set_velocity(Vector3::zeros());
        host.set_angular_velocity(Vector3::zeros());

        for (i, axle) in self.config.axles.iter().enumerate() {
            host.set_brake_torque(AxleId(i), WHEEL_LOCK_TORQUE);
            host.set_motor_torque(AxleId(i), 0.0);
            if axle.steering {
                host.set_steer_angle(AxleId(i), 0.0);
            }
        }

        self.state.reset_motion(position, heading_of(&rotation));
        debug!(x = position.x, y = position.y, z = position.z, "vehicle: force reset");
    }

    // --------------------------------------------------------------------------
    // Ignition / handbrake
    // --------------------------------------------------------------------------

    pub fn start_engine(&mut self) {
        self.set_ignition(Ignition::On);
    }

    pub fn stop_engine(&mut self) {
        self.set_ignition(Ignition::Off);
    }

    pub fn toggle_ignition(&mut self) {
        self.set_ignition(self.state.ignition.toggled());
    }

    fn set_ignition(&mut self, ignition: Ignition) {
        if self.state.ignition != ignition {
            debug!(?ignition, "vehicle: ignition");
        }
        self.state.ignition = ignition;
    }

    pub fn toggle_handbrake(&mut self) {
        self.state.handbrake = !self.state.handbrake;
    }

    pub fn set_handbrake(&mut self, enable: bool) {
        self.state.handbrake = enable;
    }

    // --------------------------------------------------------------------------
    // Manual gearbox
    // --------------------------------------------------------------------------

    pub fn shift_up(&mut self) {
        self.state.gearbox.shift_up(self.clock);
    }

    pub fn shift_down(&mut self) {
        self.state.gearbox.shift_down(self.clock);
    }

    pub fn shift_to_first(&mut self) {
        self.state.gearbox.shift_to_first(self.clock);
    }

    pub fn shift_to_reverse(&mut self) {
        self.state.gearbox.shift_to_reverse(self.clock);
    }

    /// Let the automatic box work its way down into reverse.
    pub fn shift_toward_reverse(&mut self) {
        let inputs = ShiftInputs {
            now: self.clock,
            rpm: self.state.rpm,
            max_rpm: self.config.max_rpm,
            throttle: self.state.accel_input,
            speed: self.state.speed,
        };
        let schedule = ShiftSchedule { up: &self.config.shift_up_curve, down: &self.config.shift_down_curve };
        self.state.gearbox.auto_shift_toward_reverse(inputs, schedule);
    }

    // --------------------------------------------------------------------------
    // Environment
    // --------------------------------------------------------------------------

    pub fn set_ambient_temperature(&mut self, kelvin: f32) {
        if kelvin.is_finite() && kelvin >= 0.0 {
            self.state.ambient_temperature_k = kelvin;
        }
    }

    pub fn set_cooling_malfunction(&mut self, malfunction: bool) {
        self.state.cooling_malfunction = malfunction;
    }

    /// Display-rate hook: keep every wheel's damping at the configured rate.
    /// Reads state only.
    pub fn sync_display(&self, host: &mut impl VehicleHost) {
        for i in 0..self.config.axles.len() {
            let axle = AxleId(i);
            if host.wheel_damping(axle) != self.config.wheel_damping {
                host.set_wheel_damping(axle, self.config.wheel_damping);
            }
        }
    }
}
