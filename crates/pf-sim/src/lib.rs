//! Primary-plant heatup simulation: state, regime blending, tick
//! orchestration, and session persistence.
//!
//! [`HeatupSimulation`] wires the equilibrium solver, the CVCS boundary
//! controller with its mass ledger, and the bubble-formation phase
//! machine into one deterministic fixed-order tick. Consumers command
//! [`TickInputs`] and read back [`StateSnapshot`]s; nothing else is
//! mutable from outside.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod regime;
pub mod session;
pub mod state;

pub use config::HeatupConfig;
pub use error::{SimError, SimResult};
pub use orchestrator::{HeaterMode, HeatupSimulation, TickInputs, TickReport};
pub use regime::{blend, Regime, RegimeController};
pub use session::SavedSession;
pub use state::{PrimaryState, StateSnapshot};
