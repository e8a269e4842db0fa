//! Shared unit types and plant-procedure conversion helpers for the
//! primaflow workspace.

pub mod units;
