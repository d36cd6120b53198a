// ==============================================================================
// thermal.rs — FUEL BURN + ENGINE TEMPERATURE
// ------------------------------------------------------------------------------
// Fuel per tick is an approximation, not a BSFC model:
//   fuel = rpm * 1e-8 + max(torque, 0) * 1e-9 * max(accel, 0)      [litres]
// and it is zero when the ignition is off, or when the driver is off the
// throttle while the engine turns above idle (min_rpm * 1.25): injectors cut.
//
// Burnt fuel heats a 200 kg iron block:
//   dT = fuel * 34.2 MJ/l / (448 J/(kg K) * 200 kg)
// then the block relaxes toward ambient by a per-tick factor. Past 90 °C the
// radiator joins in, more so with airflow (speed), unless cooling is broken.
// ==============================================================================

use crate::vehicle::Ignition;

pub const ZERO_CELSIUS_K: f32 = 273.15;

const RPM_FUEL_FACTOR: f32 = 0.000_000_01;
const TORQUE_FUEL_FACTOR: f32 = 0.000_000_001;
const IDLE_MARGIN: f32 = 0.25;

const ENGINE_MASS: f32 = 200.0; // kg
const FUEL_ENERGY_DENSITY: f32 = 34.2 * 1000.0 * 1000.0; // J/l
const SPECIFIC_HEAT_IRON: f32 = 448.0; // J/(kg K)

const AMBIENT_EXCHANGE: f32 = 0.000_02;
const RADIATOR_EXCHANGE: f32 = 0.000_02;
const AIRFLOW_EXCHANGE: f32 = 0.000_1; // per mph
const WORKING_TEMPERATURE_K: f32 = ZERO_CELSIUS_K + 90.0;

#[derive(Debug, Clone, Copy)]
pub struct ThermalInput {
    pub rpm: f32,
    pub torque: f32,
    pub accel: f32,
    pub ignition: Ignition,
    pub min_rpm: f32,
    pub speed: f32, // mph
    pub engine_temperature_k: f32,
    pub ambient_temperature_k: f32,
    pub cooling_malfunction: bool,
    pub dt: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalOutput {
    pub fuel_consumed: f32, // litres this tick, never negative
    pub fuel_rate: f32,     // litres per second
    pub engine_temperature_k: f32,
}

/// Litres burnt this tick.
pub fn fuel_consumption(rpm: f32, torque: f32, accel: f32, ignition: Ignition, min_rpm: f32) -> f32 {
    let coasting = accel <= 0.0 && rpm > min_rpm + min_rpm * IDLE_MARGIN;
    if ignition == Ignition::Off || coasting {
        return 0.0;
    }

    let burn = rpm * RPM_FUEL_FACTOR + torque.max(0.0) * TORQUE_FUEL_FACTOR * accel.max(0.0);
    if burn.is_finite() { burn.max(0.0) } else { 0.0 }
}

/// Cooling factor toward ambient for one tick.
pub fn cooling_factor(engine_temperature_k: f32, speed: f32, cooling_malfunction: bool) -> f32 {
    let mut factor = AMBIENT_EXCHANGE;
    if engine_temperature_k > WORKING_TEMPERATURE_K && !cooling_malfunction {
        factor += RADIATOR_EXCHANGE + AIRFLOW_EXCHANGE * speed.max(0.0);
    }
    factor.clamp(0.0, 1.0)
}

pub fn step(input: &ThermalInput) -> ThermalOutput {
    let fuel_consumed = fuel_consumption(input.rpm, input.torque, input.accel, input.ignition, input.min_rpm);

    let heated = input.engine_temperature_k
        + (fuel_consumed * FUEL_ENERGY_DENSITY) / (SPECIFIC_HEAT_IRON * ENGINE_MASS);

    let k = cooling_factor(heated, input.speed, input.cooling_malfunction);
    let engine_temperature_k = heated + (input.ambient_temperature_k - heated) * k;

    let fuel_rate = if input.dt > 0.0 { fuel_consumed / input.dt } else { 0.0 };

    ThermalOutput { fuel_consumed, fuel_rate, engine_temperature_k }
}
