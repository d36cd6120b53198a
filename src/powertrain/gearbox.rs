// ==============================================================================
// gearbox.rs — DISCRETE GEARS WITH TIMED SHIFT INTERPOLATION
// ------------------------------------------------------------------------------
// The gearbox holds a fractional `current_gear`. A shift records the rounded
// gear it left (`last_gear`), the gear it heads for (`target_gear`) and the
// clock time it started; `update()` then slides `current_gear` linearly from
// one to the other over `shift_time`.
//
// ratio() interpolates between the two bounding integer gear ratios using the
// fractional part of `current_gear`, so torque ramps across a shift instead of
// stepping. Reverse bypasses the table: its ratio is -ratios[0].
//
// Reverse is entered from gear 1 by a shift down and left by a shift up; the
// gear itself stays at 1 across both transitions.
// ==============================================================================

use tracing::debug;

use crate::config::VehicleConfig;
use crate::curve::Curve;

/// Below this speed (mph) 1st gear never shifts up: the wheels are just spinning.
pub const UPSHIFT_MIN_SPEED: f32 = 15.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Gearbox {
    num_gears: usize,
    shift_time: f32,  // s
    shift_delay: f32, // s

    current_gear: f32, // 1..=num_gears, fractional mid-shift
    last_gear: usize,
    target_gear: usize,
    shifting: bool,
    last_shift: f32, // clock time of the last gear change
    reverse: bool,
}

/// Throttle-dependent thresholds for the automatic box.
#[derive(Debug, Clone, Copy)]
pub struct ShiftSchedule<'a> {
    pub up: &'a Curve,
    pub down: &'a Curve,
}

/// Engine/vehicle readings the automatic box decides on.
#[derive(Debug, Clone, Copy)]
pub struct ShiftInputs {
    pub now: f32,
    pub rpm: f32,
    pub max_rpm: f32,
    pub throttle: f32,
    pub speed: f32, // mph
}

impl Gearbox {
    pub fn new(num_gears: usize, shift_time: f32, shift_delay: f32) -> Self {
        Self {
            num_gears: num_gears.max(1),
            shift_time,
            shift_delay,
            current_gear: 1.0,
            last_gear: 1,
            target_gear: 1,
            shifting: false,
            last_shift: 0.0,
            reverse: false,
        }
    }

    pub fn from_config(config: &VehicleConfig) -> Self {
        Self::new(config.num_gears(), config.shift_time, config.shift_delay)
    }

    pub fn current_gear(&self) -> f32 {
        self.current_gear
    }

    pub fn reverse(&self) -> bool {
        self.reverse
    }

    pub fn is_shifting(&self) -> bool {
        self.shifting
    }

    pub fn target_gear(&self) -> usize {
        self.target_gear
    }

    pub fn last_gear(&self) -> usize {
        self.last_gear
    }

    pub fn num_gears(&self) -> usize {
        self.num_gears
    }

    pub fn elapsed_since_shift(&self, now: f32) -> f32 {
        now - self.last_shift
    }

    /// Nearest whole gear, ties to even.
    pub fn rounded_gear(&self) -> usize {
        self.current_gear.round_ties_even() as usize
    }

    pub fn shift_up(&mut self, now: f32) {
        if self.reverse {
            self.reverse = false;
            debug!("gearbox: reverse -> forward");
            return;
        }
        self.last_gear = self.rounded_gear();
        self.target_gear = (self.last_gear + 1).min(self.num_gears);
        self.last_shift = now;
        self.shifting = true;
        debug!(from = self.last_gear, to = self.target_gear, "gearbox: shift up");
    }

    pub fn shift_down(&mut self, now: f32) {
        if self.rounded_gear() <= 1 {
            self.reverse = true;
            debug!("gearbox: 1st -> reverse");
            return;
        }
        self.last_gear = self.rounded_gear();
        self.target_gear = self.last_gear - 1;
        self.last_shift = now;
        self.shifting = true;
        debug!(from = self.last_gear, to = self.target_gear, "gearbox: shift down");
    }

    /// Leave reverse straight into 1st; no-op when already driving forward.
    pub fn shift_to_first(&mut self, now: f32) {
        if !self.reverse {
            return;
        }
        self.land_in_first(now);
        self.reverse = false;
    }

    pub fn shift_to_reverse(&mut self, now: f32) {
        self.land_in_first(now);
        self.reverse = true;
    }

    fn land_in_first(&mut self, now: f32) {
        self.current_gear = 1.0;
        self.last_gear = 1;
        self.target_gear = 1;
        self.shifting = false;
        self.last_shift = now;
    }

    /// Automatic box: shift on the RPM fraction against the throttle curves,
    /// at most once per `shift_delay`.
    pub fn auto_shift(&mut self, inputs: ShiftInputs, schedule: ShiftSchedule<'_>) {
        if self.elapsed_since_shift(inputs.now) <= self.shift_delay {
            return;
        }
        let rpm_fraction = inputs.rpm / inputs.max_rpm;

        if rpm_fraction > schedule.up.evaluate(inputs.throttle)
            && self.rounded_gear() < self.num_gears
            && (self.rounded_gear() > 1 || inputs.speed > UPSHIFT_MIN_SPEED)
        {
            self.shift_up(inputs.now);
        }

        if rpm_fraction < schedule.down.evaluate(inputs.throttle) && self.rounded_gear() > 1 {
            self.shift_down(inputs.now);
        }
    }

    /// Automatic box heading for reverse: keeps shifting down on low RPM and
    /// engages reverse once it sits in 1st.
    pub fn auto_shift_toward_reverse(&mut self, inputs: ShiftInputs, schedule: ShiftSchedule<'_>) {
        if self.elapsed_since_shift(inputs.now) > self.shift_delay
            && inputs.rpm / inputs.max_rpm < schedule.down.evaluate(inputs.throttle)
            && self.rounded_gear() > 1
        {
            self.shift_down(inputs.now);
        }

        if self.current_gear == 1.0 && !self.shifting {
            self.reverse = true;
        }
    }

    /// Advance the shift interpolation and clamp into `[1, num_gears]`.
    pub fn update(&mut self, now: f32) {
        if self.shifting {
            let t = self.elapsed_since_shift(now) / self.shift_time;
            let last = self.last_gear as f32;
            let target = self.target_gear as f32;
            self.current_gear = last + (target - last) * t.clamp(0.0, 1.0);
            if t >= 1.0 {
                self.shifting = false;
            }
        }

        self.current_gear = self.current_gear.clamp(1.0, self.num_gears as f32);
    }

    /// Effective ratio: blended between bounding gears, negated 1st in reverse.
    pub fn ratio(&self, ratios: &[f32]) -> f32 {
        let Some(&first) = ratios.first() else {
            return 0.0;
        };
        if self.reverse {
            return -first;
        }

        let lo = (self.current_gear.floor() as usize).clamp(1, ratios.len()) - 1;
        let hi = (self.current_gear.ceil() as usize).clamp(1, ratios.len()) - 1;
        let t = self.current_gear - self.current_gear.floor();
        ratios[lo] + (ratios[hi] - ratios[lo]) * t
    }

    /// Back to a resting 1st gear.
    pub fn reset(&mut self) {
        self.current_gear = 1.0;
        self.last_gear = 1;
        self.target_gear = 1;
        self.shifting = false;
        self.reverse = false;
    }
}
