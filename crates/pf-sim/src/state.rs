//! Simulation state and the read-only snapshot handed to consumers.

use pf_cvcs::DriftStatus;
use pf_phase::BubblePhase;
use pf_solver::SolverState;
use serde::{Deserialize, Serialize};

use crate::regime::Regime;

/// Authoritative simulation state. Owned by the orchestrator and mutated
/// only at tick boundaries; consumers see `StateSnapshot`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PrimaryState {
    pub physics: SolverState,
    pub time_s: f64,
    pub tick: u64,
    /// Backward pressure rate over the last tick, Pa/s.
    pub pressure_rate_pa_per_s: f64,
}

impl PrimaryState {
    pub fn pzr_level_fraction(&self, pzr_volume_m3: f64) -> f64 {
        self.physics.pzr_water_volume_m3 / pzr_volume_m3
    }
}

/// Post-tick view of the plant. Everything a display or scenario runner
/// needs, nothing it can mutate.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub time_s: f64,
    pub tick: u64,
    pub pressure_pa: f64,
    pub pressure_rate_pa_per_s: f64,
    pub temperature_rcs_k: f64,
    pub temperature_pzr_k: f64,
    pub pzr_level_fraction: f64,
    pub pzr_steam_volume_m3: f64,
    pub regime: Regime,
    pub bubble_phase: BubblePhase,
    pub ledger_total_kg: f64,
    pub ledger_drift_kg: f64,
    pub ledger_drift_status: DriftStatus,
}
