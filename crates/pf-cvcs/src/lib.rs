//! Chemical and volume control system: the charging/letdown boundary-flow
//! controller and the canonical mass ledger it owns.
//!
//! Ownership is the point of this crate. The ledger's mutators are
//! crate-private, and [`CvcsController`] holds the ledger as a private
//! field, so boundary flow has exactly one mutation entry point in the
//! whole workspace. Everything else reads the ledger through a shared
//! reference.

pub mod controller;
pub mod delay;
pub mod error;
pub mod ledger;

pub use controller::{
    CvcsConfig, CvcsController, CvcsControllerState, CvcsMeasurement, CvcsSetpoint,
    CvcsTickReport, LetdownOrifice,
};
pub use delay::TransportDelayLine;
pub use error::{ControlError, ControlResult};
pub use ledger::{DriftReport, DriftStatus, MassLedger};
