//! Fixed-capacity transport-delay line for boundary-flow commands.
//!
//! The charging/letdown path has a real transit time between the
//! controller's command and the flow arriving at the loop. Each tick the
//! freshly computed command is written into a ring buffer and the value
//! that takes effect is the one written `delay_slots` ticks ago. The
//! read happens before the write, so a slot is consumed exactly
//! `delay_slots` ticks after it was produced.

use crate::error::{ControlError, ControlResult};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransportDelayLine {
    slots: Vec<f64>,
    head: usize,
}

impl TransportDelayLine {
    pub fn new(delay_slots: usize) -> ControlResult<Self> {
        if delay_slots == 0 {
            return Err(ControlError::InvalidArg {
                what: "delay_slots must be at least 1",
            });
        }
        Ok(Self {
            slots: vec![0.0; delay_slots],
            head: 0,
        })
    }

    pub fn delay_slots(&self) -> usize {
        self.slots.len()
    }

    /// Check a line that arrived from outside `new()`, e.g. out of a
    /// persisted session: serde accepts empty slots or an out-of-range
    /// head, and `advance` would panic on either.
    pub fn validate(&self, expected_slots: usize) -> ControlResult<()> {
        if self.slots.is_empty() || self.head >= self.slots.len() {
            return Err(ControlError::InvalidArg {
                what: "delay line has empty slots or head out of range",
            });
        }
        if self.slots.len() != expected_slots {
            return Err(ControlError::InvalidArg {
                what: "delay line length does not match the configured delay",
            });
        }
        if self.slots.iter().any(|v| !v.is_finite()) {
            return Err(ControlError::NonFinite {
                what: "persisted delay-line slot",
            });
        }
        Ok(())
    }

    /// One tick: read the value written `delay_slots` ticks ago, then
    /// store `command` in its place.
    pub fn advance(&mut self, command: f64) -> f64 {
        let delayed = self.slots[self.head];
        self.slots[self.head] = command;
        self.head = (self.head + 1) % self.slots.len();
        delayed
    }

    /// Value that will be applied this tick, without consuming it.
    pub fn peek(&self) -> f64 {
        self.slots[self.head]
    }

    /// Flush all pending commands, e.g. at new-session initialization.
    pub fn reset(&mut self) {
        self.slots.fill(0.0);
        self.head = 0;
    }
}
