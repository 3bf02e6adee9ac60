// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Linear gain smoothing.

use std::time::Duration;

/// Converts a level in decibels to a linear gain multiplier.
#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// A scalar that moves linearly toward a target, one step per output sample.
///
/// The ramp has no notion of elapsed time other than calls to [`VolumeRamp::next_value`],
/// so it must be called exactly once per rendered frame.
#[derive(Debug, Clone)]
pub struct VolumeRamp {
    current: f32,
    target: f32,
    remaining_steps: u64,
    step_delta: f32,
}

impl VolumeRamp {
    /// Creates a ramp resting at the given value.
    pub fn new(initial: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            remaining_steps: 0,
            step_delta: 0.0,
        }
    }

    /// Starts a ramp from the current value to `target` lasting `duration` at `sample_rate`.
    /// A zero-length ramp jumps straight to the target.
    pub fn set_target(&mut self, target: f32, duration: Duration, sample_rate: u32) {
        let steps_exact = duration.as_secs_f64() * sample_rate as f64;
        let steps = steps_exact.ceil() as u64;

        self.target = target;
        if steps == 0 {
            self.set_immediate(target);
            return;
        }

        self.remaining_steps = steps;
        self.step_delta = ((target - self.current) as f64 / steps_exact) as f32;
    }

    /// Jumps to the value with no ramp.
    pub fn set_immediate(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.remaining_steps = 0;
        self.step_delta = 0.0;
    }

    /// Advances one step and returns the value for this sample. The final step of a ramp
    /// lands on the target exactly.
    #[inline]
    pub fn next_value(&mut self) -> f32 {
        if self.remaining_steps > 0 {
            self.remaining_steps -= 1;
            if self.remaining_steps == 0 {
                self.current = self.target;
            } else {
                self.current += self.step_delta;
            }
        }
        self.current
    }

    /// Returns the current value without advancing.
    pub fn current(&self) -> f32 {
        self.current
    }

    /// Returns the value being ramped toward.
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Returns true while steps remain.
    pub fn is_ramping(&self) -> bool {
        self.remaining_steps > 0
    }
}

impl Default for VolumeRamp {
    fn default() -> Self {
        Self::new(1.0)
    }
}
