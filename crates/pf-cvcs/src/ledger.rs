//! Canonical mass ledger: the single authoritative store of total
//! primary mass.
//!
//! The ledger is seeded once (`rebase`) from the component sum when
//! canonical mode activates, after which only signed boundary deltas may
//! move it. The component masses are derived by the solver as a
//! remainder; the ledger never recomputes its total from them. The
//! mutators are crate-private so the CVCS controller is the only
//! possible writer.

use crate::error::{ControlError, ControlResult};
use serde::{Deserialize, Serialize};

/// Classification of end-of-tick conservation drift.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriftStatus {
    /// |drift| below the warning fraction of total mass.
    Ok,
    /// Between the warning and error fractions.
    Warning,
    /// Above the error fraction. Reported every tick it persists, never
    /// auto-corrected.
    Error,
}

/// Drift diagnostic for one tick.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DriftReport {
    pub drift_kg: f64,
    pub drift_fraction: f64,
    pub status: DriftStatus,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MassLedger {
    total_kg: f64,
    rebased: bool,
    cumulative_boundary_in_kg: f64,
    cumulative_boundary_out_kg: f64,
    cumulative_relief_kg: f64,
    warn_fraction: f64,
    error_fraction: f64,
}

impl MassLedger {
    pub fn new(warn_fraction: f64, error_fraction: f64) -> ControlResult<Self> {
        if warn_fraction <= 0.0 || error_fraction <= warn_fraction {
            return Err(ControlError::InvalidArg {
                what: "drift thresholds must satisfy 0 < warn < error",
            });
        }
        Ok(Self {
            total_kg: 0.0,
            rebased: false,
            cumulative_boundary_in_kg: 0.0,
            cumulative_boundary_out_kg: 0.0,
            cumulative_relief_kg: 0.0,
            warn_fraction,
            error_fraction,
        })
    }

    /// Seed the total from the current component sum. Called exactly once
    /// on the first tick after canonical-mode activation; a second call
    /// is an invariant violation, not a silent re-seed.
    pub(crate) fn rebase(&mut self, component_sum_kg: f64) -> ControlResult<()> {
        if self.rebased {
            return Err(ControlError::Invariant {
                what: "ledger already rebased this session",
            });
        }
        if !component_sum_kg.is_finite() || component_sum_kg <= 0.0 {
            return Err(ControlError::InvalidArg {
                what: "component sum must be positive and finite",
            });
        }
        self.total_kg = component_sum_kg;
        self.rebased = true;
        Ok(())
    }

    /// The only sanctioned mutation path for charging/letdown.
    pub(crate) fn apply_boundary_delta(&mut self, delta_kg: f64) -> ControlResult<()> {
        if !delta_kg.is_finite() {
            return Err(ControlError::NonFinite {
                what: "boundary delta",
            });
        }
        if !self.rebased {
            return Err(ControlError::Invariant {
                what: "boundary delta before ledger rebase",
            });
        }
        self.total_kg += delta_kg;
        if delta_kg >= 0.0 {
            self.cumulative_boundary_in_kg += delta_kg;
        } else {
            self.cumulative_boundary_out_kg -= delta_kg;
        }
        Ok(())
    }

    /// Relief flow leaves the system; tracked separately from letdown.
    pub(crate) fn apply_relief(&mut self, relief_kg: f64) -> ControlResult<()> {
        if !relief_kg.is_finite() || relief_kg < 0.0 {
            return Err(ControlError::InvalidArg {
                what: "relief mass must be non-negative and finite",
            });
        }
        if !self.rebased {
            return Err(ControlError::Invariant {
                what: "relief before ledger rebase",
            });
        }
        self.total_kg -= relief_kg;
        self.cumulative_relief_kg += relief_kg;
        Ok(())
    }

    /// Clear the rebase latch so the next tick re-seeds from the
    /// component sum. Used at new-session initialization and on restore
    /// of a persisted session, where the persisted total may be stale.
    pub(crate) fn reset_rebase_flag(&mut self) {
        self.rebased = false;
    }

    pub fn is_rebased(&self) -> bool {
        self.rebased
    }

    /// Authoritative total primary mass. An error before the first
    /// rebase: the value is meaningless until seeded.
    pub fn total_kg(&self) -> ControlResult<f64> {
        if !self.rebased {
            return Err(ControlError::Invariant {
                what: "ledger total read before rebase",
            });
        }
        Ok(self.total_kg)
    }

    pub fn cumulative_boundary_in_kg(&self) -> f64 {
        self.cumulative_boundary_in_kg
    }

    pub fn cumulative_boundary_out_kg(&self) -> f64 {
        self.cumulative_boundary_out_kg
    }

    pub fn cumulative_relief_kg(&self) -> f64 {
        self.cumulative_relief_kg
    }

    /// End-of-tick conservation check: drift between the ledger total and
    /// the solver-derived component sum, classified against the
    /// configured fractions of total mass.
    pub fn drift_report(&self, component_sum_kg: f64) -> ControlResult<DriftReport> {
        let total = self.total_kg()?;
        let drift_kg = total - component_sum_kg;
        let drift_fraction = if total.abs() > 0.0 {
            (drift_kg / total).abs()
        } else {
            0.0
        };
        let status = if drift_fraction < self.warn_fraction {
            DriftStatus::Ok
        } else if drift_fraction < self.error_fraction {
            DriftStatus::Warning
        } else {
            DriftStatus::Error
        };
        Ok(DriftReport {
            drift_kg,
            drift_fraction,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> MassLedger {
        MassLedger::new(0.001, 0.01).unwrap()
    }

    #[test]
    fn rebase_is_one_shot() {
        let mut l = ledger();
        assert!(l.total_kg().is_err());
        l.rebase(250_000.0).unwrap();
        assert_eq!(l.total_kg().unwrap(), 250_000.0);
        assert!(l.rebase(250_000.0).is_err());
    }

    #[test]
    fn reset_allows_reseed() {
        let mut l = ledger();
        l.rebase(250_000.0).unwrap();
        l.reset_rebase_flag();
        assert!(l.total_kg().is_err());
        l.rebase(249_000.0).unwrap();
        assert_eq!(l.total_kg().unwrap(), 249_000.0);
    }

    #[test]
    fn boundary_delta_updates_total_and_accumulators() {
        let mut l = ledger();
        l.rebase(100_000.0).unwrap();
        l.apply_boundary_delta(5.0).unwrap();
        l.apply_boundary_delta(-2.0).unwrap();
        assert_eq!(l.total_kg().unwrap(), 100_003.0);
        assert_eq!(l.cumulative_boundary_in_kg(), 5.0);
        assert_eq!(l.cumulative_boundary_out_kg(), 2.0);
    }

    #[test]
    fn delta_before_rebase_is_rejected() {
        let mut l = ledger();
        assert!(l.apply_boundary_delta(1.0).is_err());
    }

    #[test]
    fn relief_accumulates_separately() {
        let mut l = ledger();
        l.rebase(100_000.0).unwrap();
        l.apply_relief(3.0).unwrap();
        assert_eq!(l.total_kg().unwrap(), 99_997.0);
        assert_eq!(l.cumulative_relief_kg(), 3.0);
        assert_eq!(l.cumulative_boundary_out_kg(), 0.0);
        assert!(l.apply_relief(-1.0).is_err());
    }

    #[test]
    fn drift_classification_bands() {
        let mut l = ledger();
        l.rebase(100_000.0).unwrap();
        assert_eq!(l.drift_report(100_000.0).unwrap().status, DriftStatus::Ok);
        assert_eq!(l.drift_report(100_050.0).unwrap().status, DriftStatus::Ok);
        assert_eq!(
            l.drift_report(100_500.0).unwrap().status,
            DriftStatus::Warning
        );
        assert_eq!(l.drift_report(98_000.0).unwrap().status, DriftStatus::Error);
    }
}
