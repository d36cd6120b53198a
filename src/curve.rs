//! Keyframe curves for torque and shift schedules.
//!
//! A curve is an ordered list of `[x, y]` keyframes evaluated by linear
//! interpolation. Inputs outside the keyed range clamp to the first/last key.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Curve {
    keys: Vec<[f32; 2]>,
}

impl Curve {
    pub fn new(keys: Vec<[f32; 2]>) -> Self {
        Self { keys }
    }

    /// Flat curve returning `y` everywhere.
    pub fn constant(y: f32) -> Self {
        Self { keys: vec![[0.0, y]] }
    }

    pub fn keys(&self) -> &[[f32; 2]] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys are finite and their x values strictly increase.
    pub fn is_well_formed(&self) -> bool {
        !self.keys.is_empty()
            && self.keys.iter().all(|k| k[0].is_finite() && k[1].is_finite())
            && self.keys.windows(2).all(|w| w[0][0] < w[1][0])
    }

    pub fn evaluate(&self, x: f32) -> f32 {
        let (Some(first), Some(last)) = (self.keys.first(), self.keys.last()) else {
            return 0.0;
        };

        // NaN falls through both comparisons, pin it to the first key
        if !(x > first[0]) {
            return first[1];
        }
        if x >= last[0] {
            return last[1];
        }

        // first key with k.x >= x; x is strictly inside the range here
        let hi = self.keys.partition_point(|k| k[0] < x);
        let [x0, y0] = self.keys[hi - 1];
        let [x1, y1] = self.keys[hi];
        let t = (x - x0) / (x1 - x0);
        y0 + (y1 - y0) * t
    }
}

impl From<Vec<[f32; 2]>> for Curve {
    fn from(keys: Vec<[f32; 2]>) -> Self {
        Self::new(keys)
    }
}
