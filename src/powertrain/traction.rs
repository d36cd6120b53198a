// ==============================================================================
// traction.rs — SLIP-DRIVEN TORQUE CAP (INTEGRAL CONTROLLER)
// ------------------------------------------------------------------------------
// The drive torque is scaled by a cap that walks in fixed steps:
//   forward_slip >= limit  -> cap -= 10 * amount   (floored at 0)
//   otherwise              -> cap += 10 * amount   (capped at max torque)
// One step per grounded motor axle per tick. Measured slip never clamps the
// torque directly; only the cap moves.
// ==============================================================================

use tracing::trace;

use crate::config::VehicleConfig;

/// Cap change per adjustment for `amount = 1`.
pub const TRACTION_STEP: f32 = 10.0;

/// One controller step. The result always lies in `[0, max_torque]`.
pub fn adjust_torque_cap(
    cap: f32,
    forward_slip: f32,
    slip_limit: f32,
    amount: f32,
    max_torque: f32,
) -> f32 {
    let step = TRACTION_STEP * amount;
    if forward_slip >= slip_limit {
        (cap - step).max(0.0)
    } else {
        (cap + step).min(max_torque)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TractionControl {
    amount: f32,
    slip_limit: f32,
    max_torque: f32,
}

impl TractionControl {
    pub fn from_config(config: &VehicleConfig) -> Self {
        Self {
            amount: config.traction_control_amount,
            slip_limit: config.traction_control_slip_limit,
            max_torque: config.max_motor_torque,
        }
    }

    /// Cap at spawn: the controller starts `amount` below full torque and
    /// earns the rest back while the wheels hold grip.
    pub fn initial_cap(&self) -> f32 {
        (self.max_torque - self.amount * self.max_torque).clamp(0.0, self.max_torque)
    }

    pub fn adjust(&self, cap: f32, forward_slip: f32) -> f32 {
        let next = adjust_torque_cap(cap, forward_slip, self.slip_limit, self.amount, self.max_torque);
        if next == 0.0 && cap > 0.0 {
            trace!(forward_slip, "traction control: torque cap exhausted");
        }
        next
    }

    /// Steps needed to walk the full torque range.
    pub fn ticks_to_saturate(&self) -> usize {
        let step = TRACTION_STEP * self.amount;
        if step <= 0.0 {
            return usize::MAX;
        }
        (self.max_torque / step).ceil() as usize
    }
}
