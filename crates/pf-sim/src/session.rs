//! Session persistence.
//!
//! A saved session carries the physical state, the CVCS controller state
//! including the in-transit delay line, the ledger with its accumulators,
//! the bubble phase, and the established pump-flow fraction. The ledger's
//! rebase latch is deliberately not persisted: a stored total may be
//! stale relative to the restored components, so the first tick after a
//! restore always re-seeds the total from the component sum.

use pf_cvcs::{CvcsController, CvcsControllerState, MassLedger};
use pf_phase::{BubblePhase, PhaseController};
use pf_solver::EquilibriumSolver;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::HeatupConfig;
use crate::error::SimResult;
use crate::orchestrator::HeatupSimulation;
use crate::regime::RegimeController;
use crate::state::PrimaryState;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SavedSession {
    pub state: PrimaryState,
    pub cvcs_state: CvcsControllerState,
    pub ledger: MassLedger,
    pub phase: BubblePhase,
    pub pump_flow_fraction: f64,
}

impl HeatupSimulation {
    pub fn save_session(&self) -> SavedSession {
        SavedSession {
            state: self.state,
            cvcs_state: self.cvcs.state().clone(),
            ledger: self.cvcs.ledger().clone(),
            phase: self.phase.phase(),
            pump_flow_fraction: self.regime.flow_fraction(),
        }
    }

    /// Warm start from a saved session under a (possibly retuned)
    /// configuration.
    pub fn from_session(config: HeatupConfig, session: SavedSession) -> SimResult<Self> {
        config.validate()?;
        let solver = EquilibriumSolver::new(config.geometry, config.newton)?;
        // restore() checks the persisted delay line and clears the
        // rebase latch.
        let cvcs = CvcsController::restore(
            config.cvcs.clone(),
            config.delay_slots(),
            session.cvcs_state,
            session.ledger,
        )?;
        let phase = PhaseController::restore(config.phase.clone(), session.phase)?;
        let regime = RegimeController::restore(config.pump_ramp_per_s, session.pump_flow_fraction);
        info!(
            tick = session.state.tick,
            phase = ?session.phase,
            "session restored"
        );
        Ok(Self {
            config,
            state: session.state,
            solver,
            cvcs,
            phase,
            regime,
        })
    }
}
