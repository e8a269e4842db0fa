//! Physics-regime selection and delta blending.
//!
//! Forced flow does not appear instantly when pumps start; the coupling
//! factor follows the established flow fraction. While ramping, both the
//! isolated and fully coupled physics run from the same start state and
//! the applied change is the convex combination of their per-tick
//! deltas. Blending absolute states instead of deltas double-counts the
//! start state and was the source of level-trace discontinuities in the
//! procedure this model replaced.

use pf_solver::{SolveDelta, SolverState};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Regime {
    /// Water-solid pressurizer, single solve.
    Solid,
    /// Bubble drawn, no established forced flow.
    IsolatedTwoPhase,
    /// Forced flow building; both paths run and blend.
    Ramping { coupling_factor: f64 },
    /// Full forced flow, single coupled solve.
    Coupled,
}

/// Tracks the established pump-flow fraction and derives the regime.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RegimeController {
    flow_fraction: f64,
    ramp_per_s: f64,
}

impl RegimeController {
    pub fn new(ramp_per_s: f64) -> Self {
        Self {
            flow_fraction: 0.0,
            ramp_per_s,
        }
    }

    pub fn restore(ramp_per_s: f64, flow_fraction: f64) -> Self {
        Self {
            flow_fraction: flow_fraction.clamp(0.0, 1.0),
            ramp_per_s,
        }
    }

    pub fn flow_fraction(&self) -> f64 {
        self.flow_fraction
    }

    /// Move the established flow fraction toward the commanded fraction.
    pub fn update(&mut self, target_fraction: f64, dt_s: f64) {
        let target = target_fraction.clamp(0.0, 1.0);
        let step = self.ramp_per_s * dt_s;
        let before = self.flow_fraction;
        if self.flow_fraction < target {
            self.flow_fraction = (self.flow_fraction + step).min(target);
        } else if self.flow_fraction > target {
            self.flow_fraction = (self.flow_fraction - step).max(target);
        }
        if before == 0.0 && self.flow_fraction > 0.0 {
            info!("pump flow establishing, regime blending active");
        }
        if before < 1.0 && self.flow_fraction >= 1.0 {
            info!("full forced flow established, regime coupled");
        }
    }

    pub fn regime(&self, two_phase: bool) -> Regime {
        if !two_phase {
            return Regime::Solid;
        }
        if self.flow_fraction <= 0.0 {
            Regime::IsolatedTwoPhase
        } else if self.flow_fraction >= 1.0 {
            Regime::Coupled
        } else {
            Regime::Ramping {
                coupling_factor: self.flow_fraction,
            }
        }
    }
}

/// `start + (1 - alpha) * isolated + alpha * coupled`, applied per field.
pub fn blend(
    start: &SolverState,
    isolated: &SolveDelta,
    coupled: &SolveDelta,
    alpha: f64,
) -> SolverState {
    let mixed = isolated.scaled(1.0 - alpha).plus(&coupled.scaled(alpha));
    start.applied(&mixed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SolverState {
        SolverState {
            temperature_rcs_k: 450.0,
            temperature_pzr_k: 497.0,
            pressure_pa: 2.5e6,
            rcs_water_mass_kg: 267_000.0,
            pzr_water_mass_kg: 21_000.0,
            pzr_steam_mass_kg: 250.0,
            pzr_water_volume_m3: 25.5,
            pzr_steam_volume_m3: 25.5,
        }
    }

    fn delta(dp: f64, dt_rcs: f64) -> SolveDelta {
        SolveDelta {
            d_pressure_pa: dp,
            d_temperature_rcs_k: dt_rcs,
            ..SolveDelta::default()
        }
    }

    #[test]
    fn blend_matches_isolated_at_zero() {
        let s = state();
        let iso = delta(1.0e3, 0.01);
        let cpl = delta(-4.0e3, 0.05);
        let b = blend(&s, &iso, &cpl, 0.0);
        assert_eq!(b, s.applied(&iso));
    }

    #[test]
    fn blend_matches_coupled_at_one() {
        let s = state();
        let iso = delta(1.0e3, 0.01);
        let cpl = delta(-4.0e3, 0.05);
        let b = blend(&s, &iso, &cpl, 1.0);
        assert_eq!(b, s.applied(&cpl));
    }

    #[test]
    fn blend_is_bounded_between_paths() {
        let s = state();
        let iso = delta(1.0e3, 0.01);
        let cpl = delta(-4.0e3, 0.05);
        for i in 0..=10 {
            let alpha = i as f64 / 10.0;
            let b = blend(&s, &iso, &cpl, alpha);
            let lo = (s.pressure_pa + cpl.d_pressure_pa).min(s.pressure_pa + iso.d_pressure_pa);
            let hi = (s.pressure_pa + cpl.d_pressure_pa).max(s.pressure_pa + iso.d_pressure_pa);
            assert!(b.pressure_pa >= lo - 1e-9 && b.pressure_pa <= hi + 1e-9);
        }
    }

    #[test]
    fn flow_fraction_ramps_and_saturates() {
        let mut rc = RegimeController::new(0.1);
        assert_eq!(rc.regime(true), Regime::IsolatedTwoPhase);
        for _ in 0..5 {
            rc.update(1.0, 1.0);
        }
        assert!(matches!(
            rc.regime(true),
            Regime::Ramping { coupling_factor } if (coupling_factor - 0.5).abs() < 1e-12
        ));
        for _ in 0..10 {
            rc.update(1.0, 1.0);
        }
        assert_eq!(rc.regime(true), Regime::Coupled);
        // solid plant never blends regardless of pump flow
        assert_eq!(rc.regime(false), Regime::Solid);
    }

    #[test]
    fn flow_fraction_ramps_back_down() {
        let mut rc = RegimeController::restore(0.25, 1.0);
        rc.update(0.0, 1.0);
        rc.update(0.0, 1.0);
        assert!((rc.flow_fraction() - 0.5).abs() < 1e-12);
    }
}
