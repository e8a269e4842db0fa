//! Bubble-formation phase controller.
//!
//! Seven ordered phases govern the transition from a water-solid
//! pressurizer to established two-phase operation:
//!
//! `None -> Detection -> Verification -> Drain -> Stabilize -> Pressurize -> Complete`
//!
//! No phase may be skipped and reentry to an earlier phase is not a
//! defined transition. The active phase is authoritative for which
//! solver energy-partition rule applies and which CVCS flow targets are
//! commanded; the controller itself never touches mass or pressure.

pub mod controller;
pub mod error;

pub use controller::{
    BubblePhase, FlowTarget, PhaseAlert, PhaseConfig, PhaseController, PhaseInputs, PhaseOutcome,
};
pub use error::{PhaseError, PhaseResult};
