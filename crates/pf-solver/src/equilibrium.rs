//! Solid and two-phase equilibrium solves.

use crate::error::{SolverError, SolverResult};
use nalgebra::{Matrix2, Vector2};
use pf_steam::{
    bulk_modulus, cp_liquid, latent_heat, p_sat, rho_liquid_compressed, rho_liquid_sat,
    rho_vapor_sat, t_sat, thermal_expansion,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Mass basis for a solve. Mandatory at every call site: there is no
/// default, so disabling conservation-by-construction requires writing
/// `LegacyComponentSum` explicitly.
#[derive(Clone, Copy, Debug)]
pub enum MassBasis {
    /// Ledger-authoritative total primary mass for the tick. Components
    /// are distributed under this fixed total; the pressurizer water
    /// mass is derived as a remainder.
    Canonical { total_kg: f64 },
    /// Each component recomputed from volume and density. Diagnostic
    /// use only; any production call site reaching this is a defect.
    LegacyComponentSum,
}

/// Fixed plant geometry and passive heat paths.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PlantGeometry {
    pub rcs_volume_m3: f64,
    pub pzr_volume_m3: f64,
    /// Surge-line/wall exchange between pressurizer and loop, W/K.
    pub surge_ua_w_per_k: f64,
    /// Pressurizer ambient heat loss, W.
    pub pzr_ambient_loss_w: f64,
}

/// Heat flows for one tick, all in watts. `surge_coupling` scales the
/// surge-line exchange term and is how the isolated (0) and fully
/// coupled (1) physics paths differ.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeatTerms {
    pub heat_in_primary_w: f64,
    pub heat_removed_secondary_w: f64,
    pub pump_heat_w: f64,
    pub rhr_heat_w: f64,
    pub pzr_heater_w: f64,
    pub pzr_spray_w: f64,
    pub surge_coupling: f64,
}

/// Physical state the solver reads and produces. Every field is synced
/// explicitly from the caller's state on every call; the solver holds
/// nothing between ticks.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverState {
    pub temperature_rcs_k: f64,
    pub temperature_pzr_k: f64,
    pub pressure_pa: f64,
    pub rcs_water_mass_kg: f64,
    pub pzr_water_mass_kg: f64,
    pub pzr_steam_mass_kg: f64,
    pub pzr_water_volume_m3: f64,
    pub pzr_steam_volume_m3: f64,
}

impl SolverState {
    pub fn component_sum_kg(&self) -> f64 {
        self.rcs_water_mass_kg + self.pzr_water_mass_kg + self.pzr_steam_mass_kg
    }

    pub fn applied(&self, d: &SolveDelta) -> SolverState {
        SolverState {
            temperature_rcs_k: self.temperature_rcs_k + d.d_temperature_rcs_k,
            temperature_pzr_k: self.temperature_pzr_k + d.d_temperature_pzr_k,
            pressure_pa: self.pressure_pa + d.d_pressure_pa,
            rcs_water_mass_kg: self.rcs_water_mass_kg + d.d_rcs_water_mass_kg,
            pzr_water_mass_kg: self.pzr_water_mass_kg + d.d_pzr_water_mass_kg,
            pzr_steam_mass_kg: self.pzr_steam_mass_kg + d.d_pzr_steam_mass_kg,
            pzr_water_volume_m3: self.pzr_water_volume_m3 + d.d_pzr_water_volume_m3,
            pzr_steam_volume_m3: self.pzr_steam_volume_m3 + d.d_pzr_steam_volume_m3,
        }
    }
}

/// Per-tick change of the physical state. Regime blending operates on
/// these, never on absolute solver outputs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SolveDelta {
    pub d_temperature_rcs_k: f64,
    pub d_temperature_pzr_k: f64,
    pub d_pressure_pa: f64,
    pub d_rcs_water_mass_kg: f64,
    pub d_pzr_water_mass_kg: f64,
    pub d_pzr_steam_mass_kg: f64,
    pub d_pzr_water_volume_m3: f64,
    pub d_pzr_steam_volume_m3: f64,
}

impl SolveDelta {
    pub fn between(next: &SolverState, start: &SolverState) -> SolveDelta {
        SolveDelta {
            d_temperature_rcs_k: next.temperature_rcs_k - start.temperature_rcs_k,
            d_temperature_pzr_k: next.temperature_pzr_k - start.temperature_pzr_k,
            d_pressure_pa: next.pressure_pa - start.pressure_pa,
            d_rcs_water_mass_kg: next.rcs_water_mass_kg - start.rcs_water_mass_kg,
            d_pzr_water_mass_kg: next.pzr_water_mass_kg - start.pzr_water_mass_kg,
            d_pzr_steam_mass_kg: next.pzr_steam_mass_kg - start.pzr_steam_mass_kg,
            d_pzr_water_volume_m3: next.pzr_water_volume_m3 - start.pzr_water_volume_m3,
            d_pzr_steam_volume_m3: next.pzr_steam_volume_m3 - start.pzr_steam_volume_m3,
        }
    }

    pub fn scaled(&self, f: f64) -> SolveDelta {
        SolveDelta {
            d_temperature_rcs_k: f * self.d_temperature_rcs_k,
            d_temperature_pzr_k: f * self.d_temperature_pzr_k,
            d_pressure_pa: f * self.d_pressure_pa,
            d_rcs_water_mass_kg: f * self.d_rcs_water_mass_kg,
            d_pzr_water_mass_kg: f * self.d_pzr_water_mass_kg,
            d_pzr_steam_mass_kg: f * self.d_pzr_steam_mass_kg,
            d_pzr_water_volume_m3: f * self.d_pzr_water_volume_m3,
            d_pzr_steam_volume_m3: f * self.d_pzr_steam_volume_m3,
        }
    }

    pub fn plus(&self, other: &SolveDelta) -> SolveDelta {
        SolveDelta {
            d_temperature_rcs_k: self.d_temperature_rcs_k + other.d_temperature_rcs_k,
            d_temperature_pzr_k: self.d_temperature_pzr_k + other.d_temperature_pzr_k,
            d_pressure_pa: self.d_pressure_pa + other.d_pressure_pa,
            d_rcs_water_mass_kg: self.d_rcs_water_mass_kg + other.d_rcs_water_mass_kg,
            d_pzr_water_mass_kg: self.d_pzr_water_mass_kg + other.d_pzr_water_mass_kg,
            d_pzr_steam_mass_kg: self.d_pzr_steam_mass_kg + other.d_pzr_steam_mass_kg,
            d_pzr_water_volume_m3: self.d_pzr_water_volume_m3 + other.d_pzr_water_volume_m3,
            d_pzr_steam_volume_m3: self.d_pzr_steam_volume_m3 + other.d_pzr_steam_volume_m3,
        }
    }
}

/// Iteration limits and tolerances.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct NewtonConfig {
    pub max_iterations: usize,
    /// Mass-residual tolerance, kg.
    pub mass_tol_kg: f64,
    /// Volume-residual tolerance, m3.
    pub volume_tol_m3: f64,
    pub min_pressure_pa: f64,
    pub max_pressure_pa: f64,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            mass_tol_kg: 1e-4,
            volume_tol_m3: 1e-8,
            min_pressure_pa: 1.0e4,
            max_pressure_pa: 21.0e6,
        }
    }
}

/// Result of one solve: the next state, the per-tick delta, and how hard
/// the iteration had to work.
#[derive(Clone, Copy, Debug)]
pub struct SolveOutcome {
    pub state: SolverState,
    pub delta: SolveDelta,
    pub iterations: usize,
}

pub struct EquilibriumSolver {
    geometry: PlantGeometry,
    newton: NewtonConfig,
}

impl EquilibriumSolver {
    pub fn new(geometry: PlantGeometry, newton: NewtonConfig) -> SolverResult<Self> {
        if geometry.rcs_volume_m3 <= 0.0 || geometry.pzr_volume_m3 <= 0.0 {
            return Err(SolverError::InvalidArg {
                what: "vessel volumes must be positive",
            });
        }
        Ok(Self { geometry, newton })
    }

    pub fn geometry(&self) -> &PlantGeometry {
        &self.geometry
    }

    /// Advance one tick.
    ///
    /// `latent_active` is the phase controller's partition gate. Heater
    /// energy follows exactly one path per tick: sensible while the
    /// pressurizer is subcooled liquid, latent (mass transfer at
    /// saturation) once a bubble exists or the water reaches saturation.
    pub fn solve(
        &self,
        start: &SolverState,
        heat: &HeatTerms,
        dt: f64,
        latent_active: bool,
        mass_basis: MassBasis,
    ) -> SolverResult<SolveOutcome> {
        if dt <= 0.0 {
            return Err(SolverError::InvalidArg {
                what: "dt must be positive",
            });
        }
        if let MassBasis::Canonical { total_kg } = mass_basis {
            if !total_kg.is_finite() || total_kg <= 0.0 {
                return Err(SolverError::InvalidArg {
                    what: "canonical mass must be positive and finite",
                });
            }
        }

        let q_surge_w =
            heat.surge_coupling * self.geometry.surge_ua_w_per_k
                * (start.temperature_pzr_k - start.temperature_rcs_k);
        let q_rcs_w = heat.heat_in_primary_w + heat.pump_heat_w + heat.rhr_heat_w
            - heat.heat_removed_secondary_w
            + q_surge_w;
        let q_pzr_w =
            heat.pzr_heater_w - heat.pzr_spray_w - self.geometry.pzr_ambient_loss_w - q_surge_w;

        // RCS side is always sensible.
        let cp_rcs = cp_liquid(start.temperature_rcs_k)?;
        let t_rcs_new = start.temperature_rcs_k
            + q_rcs_w * dt / (start.rcs_water_mass_kg.max(1.0) * cp_rcs);

        let two_phase = start.pzr_steam_mass_kg > 0.0
            || (latent_active && start.temperature_pzr_k + 1e-6 >= t_sat(start.pressure_pa)?);

        let outcome = match mass_basis {
            MassBasis::Canonical { total_kg } => {
                if two_phase {
                    self.solve_two_phase_canonical(start, t_rcs_new, q_pzr_w, dt, total_kg)?
                } else {
                    self.solve_solid_canonical(start, t_rcs_new, q_pzr_w, dt, total_kg)?
                }
            }
            MassBasis::LegacyComponentSum => {
                self.solve_legacy(start, t_rcs_new, q_pzr_w, dt, two_phase)?
            }
        };
        Ok(outcome)
    }

    /// Solid pressurizer, canonical mass. One unknown: pressure. The RCS
    /// mass follows compressed-liquid density at the solved pressure, the
    /// pressurizer water mass is the remainder, and the residual is the
    /// pressurizer volume balance.
    fn solve_solid_canonical(
        &self,
        start: &SolverState,
        t_rcs_new: f64,
        q_pzr_w: f64,
        dt: f64,
        total_kg: f64,
    ) -> SolverResult<SolveOutcome> {
        let cp_pzr = cp_liquid(start.temperature_pzr_k)?;
        let t_pzr_new = start.temperature_pzr_k
            + q_pzr_w * dt / (start.pzr_water_mass_kg.max(1.0) * cp_pzr);

        let residual = |p: f64| -> SolverResult<f64> {
            let m_rcs = rho_liquid_compressed(t_rcs_new, p)? * self.geometry.rcs_volume_m3;
            let m_pzr = total_kg - m_rcs;
            let v_pzr_water = m_pzr / rho_liquid_compressed(t_pzr_new, p)?;
            Ok(v_pzr_water - self.geometry.pzr_volume_m3)
        };

        // Compressed liquid only exists above the saturation pressure of
        // the hotter region.
        let p_floor = p_sat(t_pzr_new.max(t_rcs_new))?;
        let mut p = start.pressure_pa.max(p_floor + 1.0);
        let mut iterations = 0;
        let mut converged = false;
        for i in 0..self.newton.max_iterations {
            iterations = i + 1;
            let f = residual(p)?;
            if f.abs() < self.newton.volume_tol_m3 {
                converged = true;
                break;
            }
            let h = (1e-6 * p).max(10.0);
            let dfdp = (residual(p + h)? - residual(p - h)?) / (2.0 * h);
            if dfdp.abs() < 1e-30 {
                return Err(SolverError::ConvergenceFailed {
                    what: "solid pressure solve: flat residual".to_string(),
                });
            }
            let mut p_next = p - f / dfdp;
            if p_next < p_floor {
                // Incipient boiling: pressure cannot drop below the
                // saturation line while the vessel stays liquid-full.
                p_next = p_floor;
            }
            p_next = p_next.clamp(self.newton.min_pressure_pa, self.newton.max_pressure_pa);
            if (p_next - p).abs() < 1e-6 * p {
                p = p_next;
                converged = residual(p)?.abs() < self.newton.volume_tol_m3 || p == p_floor;
                break;
            }
            p = p_next;
        }
        if !converged && residual(p)?.abs() >= self.newton.volume_tol_m3 && p > p_floor {
            return Err(SolverError::ConvergenceFailed {
                what: format!("solid pressure solve: no convergence in {iterations} iterations"),
            });
        }

        let m_rcs = rho_liquid_compressed(t_rcs_new, p)? * self.geometry.rcs_volume_m3;
        let m_pzr = total_kg - m_rcs;
        if m_pzr <= 0.0 {
            return Err(SolverError::NonPhysical {
                what: "pressurizer water mass remainder went non-positive",
            });
        }
        let v_water = (m_pzr / rho_liquid_compressed(t_pzr_new, p)?)
            .min(self.geometry.pzr_volume_m3);
        let state = SolverState {
            temperature_rcs_k: t_rcs_new,
            temperature_pzr_k: t_pzr_new,
            pressure_pa: p,
            rcs_water_mass_kg: m_rcs,
            pzr_water_mass_kg: m_pzr,
            pzr_steam_mass_kg: 0.0,
            pzr_water_volume_m3: v_water,
            pzr_steam_volume_m3: self.geometry.pzr_volume_m3 - v_water,
        };
        Ok(SolveOutcome {
            state,
            delta: SolveDelta::between(&state, start),
            iterations,
        })
    }

    /// Two-phase pressurizer, canonical mass. Two unknowns: pressure and
    /// steam mass. Heater energy partitions entirely to latent heat at
    /// the solved saturation temperature; the pressurizer water mass is
    /// the remainder under the fixed total.
    fn solve_two_phase_canonical(
        &self,
        start: &SolverState,
        t_rcs_new: f64,
        q_pzr_w: f64,
        dt: f64,
        total_kg: f64,
    ) -> SolverResult<SolveOutcome> {
        let m_steam_old = start.pzr_steam_mass_kg;

        let residual = |x: &Vector2<f64>| -> SolverResult<Vector2<f64>> {
            let p = x[0];
            let m_steam = x[1];
            let t_sat_k = t_sat(p)?;
            let m_rcs = rho_liquid_compressed(t_rcs_new, p)? * self.geometry.rcs_volume_m3;
            let m_pzr_water = total_kg - m_rcs - m_steam;
            let v_water = m_pzr_water / rho_liquid_sat(t_sat_k)?;
            let v_steam = self.geometry.pzr_volume_m3 - v_water;
            let r_energy = m_steam - m_steam_old - q_pzr_w * dt / latent_heat(t_sat_k)?;
            let r_volume = rho_vapor_sat(t_sat_k)? * v_steam - m_steam;
            Ok(Vector2::new(r_energy, r_volume))
        };

        let mut x = Vector2::new(
            start
                .pressure_pa
                .clamp(self.newton.min_pressure_pa, self.newton.max_pressure_pa),
            m_steam_old + q_pzr_w * dt / latent_heat(t_sat(start.pressure_pa)?)?,
        );
        let mut iterations = 0;
        let mut converged = false;
        for i in 0..self.newton.max_iterations {
            iterations = i + 1;
            let r = residual(&x)?;
            if r[0].abs() < self.newton.mass_tol_kg && r[1].abs() < self.newton.mass_tol_kg {
                converged = true;
                break;
            }
            // Finite-difference Jacobian; the system is 2x2 and cheap.
            let h_p = (1e-6 * x[0]).max(10.0);
            let h_m = (1e-6 * x[1].abs()).max(1e-4);
            let r_p = residual(&Vector2::new(x[0] + h_p, x[1]))?;
            let r_m = residual(&Vector2::new(x[0], x[1] + h_m))?;
            let jac = Matrix2::new(
                (r_p[0] - r[0]) / h_p,
                (r_m[0] - r[0]) / h_m,
                (r_p[1] - r[1]) / h_p,
                (r_m[1] - r[1]) / h_m,
            );
            let dx = jac.lu().solve(&(-r)).ok_or_else(|| {
                SolverError::ConvergenceFailed {
                    what: "two-phase solve: singular Jacobian".to_string(),
                }
            })?;
            // Damped update with pressure kept inside the table range.
            let mut alpha = 1.0;
            let mut x_new = x + alpha * dx;
            for _ in 0..20 {
                if x_new[0] > self.newton.min_pressure_pa && x_new[0] < self.newton.max_pressure_pa
                {
                    break;
                }
                alpha *= 0.5;
                x_new = x + alpha * dx;
            }
            if (x_new - x).norm() < 1e-10 * x.norm() {
                x = x_new;
                break;
            }
            x = x_new;
        }
        if !converged {
            let r = residual(&x)?;
            if r[0].abs() >= self.newton.mass_tol_kg || r[1].abs() >= self.newton.mass_tol_kg {
                return Err(SolverError::ConvergenceFailed {
                    what: format!(
                        "two-phase solve: no convergence in {iterations} iterations, \
                         residual=({:.3e}, {:.3e})",
                        r[0], r[1]
                    ),
                });
            }
        }

        let p = x[0];
        let m_steam = x[1];
        if m_steam < 0.0 {
            // Bubble collapsed (spray or heat loss condensed the last of
            // the steam). Finish the tick as a solid solve at saturation.
            debug!(m_steam, "steam bubble collapsed, reverting to solid solve");
            let collapsed = SolverState {
                pzr_steam_mass_kg: 0.0,
                ..*start
            };
            let mut out =
                self.solve_solid_canonical(&collapsed, t_rcs_new, q_pzr_w, dt, total_kg)?;
            // The delta must span from the true start, steam loss included.
            out.delta = SolveDelta::between(&out.state, start);
            return Ok(out);
        }

        let t_sat_k = t_sat(p)?;
        let m_rcs = rho_liquid_compressed(t_rcs_new, p)? * self.geometry.rcs_volume_m3;
        let m_pzr_water = total_kg - m_rcs - m_steam;
        if m_pzr_water <= 0.0 {
            return Err(SolverError::NonPhysical {
                what: "pressurizer water mass remainder went non-positive",
            });
        }
        let v_water = m_pzr_water / rho_liquid_sat(t_sat_k)?;
        let v_steam = self.geometry.pzr_volume_m3 - v_water;
        if v_steam < -self.newton.volume_tol_m3 {
            return Err(SolverError::NonPhysical {
                what: "steam volume went negative in two-phase solve",
            });
        }
        let state = SolverState {
            temperature_rcs_k: t_rcs_new,
            temperature_pzr_k: t_sat_k,
            pressure_pa: p,
            rcs_water_mass_kg: m_rcs,
            pzr_water_mass_kg: m_pzr_water,
            pzr_steam_mass_kg: m_steam,
            pzr_water_volume_m3: v_water.min(self.geometry.pzr_volume_m3),
            pzr_steam_volume_m3: v_steam.max(0.0),
        };
        Ok(SolveOutcome {
            state,
            delta: SolveDelta::between(&state, start),
            iterations,
        })
    }

    /// Legacy component-sum path: every mass recomputed from volume and
    /// density, volumes frozen, pressure advanced by a local increment.
    /// This reproduces the historical non-conserving behavior and exists
    /// so diagnostics can demonstrate it; production stepping never
    /// calls it.
    fn solve_legacy(
        &self,
        start: &SolverState,
        t_rcs_new: f64,
        q_pzr_w: f64,
        dt: f64,
        two_phase: bool,
    ) -> SolverResult<SolveOutcome> {
        let (t_pzr_new, p_new, m_steam) = if two_phase {
            let t = t_sat(start.pressure_pa)?;
            let p = p_sat(t)?;
            let m_steam = rho_vapor_sat(t)? * start.pzr_steam_volume_m3;
            (t, p, m_steam)
        } else {
            let cp_pzr = cp_liquid(start.temperature_pzr_k)?;
            let t = start.temperature_pzr_k
                + q_pzr_w * dt / (start.pzr_water_mass_kg.max(1.0) * cp_pzr);
            let dp = bulk_modulus(t)? * thermal_expansion(t)? * (t - start.temperature_pzr_k);
            (t, start.pressure_pa + dp, 0.0)
        };
        let m_rcs = rho_liquid_compressed(t_rcs_new, p_new)? * self.geometry.rcs_volume_m3;
        let m_pzr_water = rho_liquid_sat(t_pzr_new)? * start.pzr_water_volume_m3;
        let state = SolverState {
            temperature_rcs_k: t_rcs_new,
            temperature_pzr_k: t_pzr_new,
            pressure_pa: p_new,
            rcs_water_mass_kg: m_rcs,
            pzr_water_mass_kg: m_pzr_water,
            pzr_steam_mass_kg: m_steam,
            pzr_water_volume_m3: start.pzr_water_volume_m3,
            pzr_steam_volume_m3: start.pzr_steam_volume_m3,
        };
        Ok(SolveOutcome {
            state,
            delta: SolveDelta::between(&state, start),
            iterations: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> PlantGeometry {
        PlantGeometry {
            rcs_volume_m3: 300.0,
            pzr_volume_m3: 51.0,
            surge_ua_w_per_k: 5.0e3,
            pzr_ambient_loss_w: 5.0e4,
        }
    }

    fn solver() -> EquilibriumSolver {
        EquilibriumSolver::new(geometry(), NewtonConfig::default()).unwrap()
    }

    /// Cold solid state: 365 psia, 100 F, pressurizer water-solid.
    fn solid_state() -> SolverState {
        let p = 2.5166e6;
        let t = 310.93;
        let g = geometry();
        let rho = rho_liquid_compressed(t, p).unwrap();
        SolverState {
            temperature_rcs_k: t,
            temperature_pzr_k: t,
            pressure_pa: p,
            rcs_water_mass_kg: rho * g.rcs_volume_m3,
            pzr_water_mass_kg: rho * g.pzr_volume_m3,
            pzr_steam_mass_kg: 0.0,
            pzr_water_volume_m3: g.pzr_volume_m3,
            pzr_steam_volume_m3: 0.0,
        }
    }

    /// Consistent two-phase state built from the property tables so the
    /// volume residual starts near zero.
    fn two_phase_state(level: f64, p: f64, t_rcs: f64) -> SolverState {
        let g = geometry();
        let t_sat_k = t_sat(p).unwrap();
        let v_water = level * g.pzr_volume_m3;
        let v_steam = g.pzr_volume_m3 - v_water;
        SolverState {
            temperature_rcs_k: t_rcs,
            temperature_pzr_k: t_sat_k,
            pressure_pa: p,
            rcs_water_mass_kg: rho_liquid_compressed(t_rcs, p).unwrap() * g.rcs_volume_m3,
            pzr_water_mass_kg: rho_liquid_sat(t_sat_k).unwrap() * v_water,
            pzr_steam_mass_kg: rho_vapor_sat(t_sat_k).unwrap() * v_steam,
            pzr_water_volume_m3: v_water,
            pzr_steam_volume_m3: v_steam,
        }
    }

    fn heater_only(pzr_heater_w: f64) -> HeatTerms {
        HeatTerms {
            pzr_heater_w,
            ..HeatTerms::default()
        }
    }

    #[test]
    fn solid_heatup_pressurizes() {
        let s = solver();
        let start = solid_state();
        let total = start.component_sum_kg();
        let out = s
            .solve(
                &start,
                &heater_only(1.6e6),
                60.0,
                false,
                MassBasis::Canonical { total_kg: total },
            )
            .unwrap();
        assert!(out.state.temperature_pzr_k > start.temperature_pzr_k);
        assert!(out.state.pressure_pa > start.pressure_pa);
        assert_eq!(out.state.pzr_steam_mass_kg, 0.0);
    }

    #[test]
    fn canonical_mode_conserves_exactly() {
        let s = solver();
        let start = solid_state();
        let total = start.component_sum_kg();
        let mut state = start;
        for _ in 0..20 {
            let out = s
                .solve(
                    &state,
                    &heater_only(1.6e6),
                    60.0,
                    false,
                    MassBasis::Canonical { total_kg: total },
                )
                .unwrap();
            state = out.state;
            let sum = state.component_sum_kg();
            assert!(
                (sum - total).abs() < 1e-6 * total,
                "component sum {sum} drifted from canonical {total}"
            );
        }
    }

    #[test]
    fn two_phase_heater_raises_pressure() {
        // The runaway-depressurization regression at solver level: with
        // heaters on and latent partition, pressure must rise, not fall.
        let s = solver();
        let mut state = two_phase_state(0.6, 2.5166e6, 450.0);
        let total = state.component_sum_kg();
        let p0 = state.pressure_pa;
        for _ in 0..60 {
            let out = s
                .solve(
                    &state,
                    &heater_only(1.6e6),
                    5.0,
                    true,
                    MassBasis::Canonical { total_kg: total },
                )
                .unwrap();
            state = out.state;
        }
        assert!(
            state.pressure_pa > p0,
            "pressure fell from {p0} to {} under full heater power",
            state.pressure_pa
        );
        assert!(state.pzr_steam_mass_kg > 0.0);
    }

    #[test]
    fn two_phase_temperature_tracks_saturation() {
        let s = solver();
        let state = two_phase_state(0.5, 2.5166e6, 450.0);
        let total = state.component_sum_kg();
        let out = s
            .solve(
                &state,
                &heater_only(1.6e6),
                60.0,
                true,
                MassBasis::Canonical { total_kg: total },
            )
            .unwrap();
        let t_expected = t_sat(out.state.pressure_pa).unwrap();
        assert!((out.state.temperature_pzr_k - t_expected).abs() < 1e-6);
    }

    #[test]
    fn spray_condenses_steam() {
        let s = solver();
        let state = two_phase_state(0.5, 2.5166e6, 450.0);
        let total = state.component_sum_kg();
        let heat = HeatTerms {
            pzr_spray_w: 3.0e6,
            ..HeatTerms::default()
        };
        let out = s
            .solve(
                &state,
                &heat,
                60.0,
                true,
                MassBasis::Canonical { total_kg: total },
            )
            .unwrap();
        assert!(out.state.pzr_steam_mass_kg < state.pzr_steam_mass_kg);
        assert!(out.state.pressure_pa < state.pressure_pa);
    }

    #[test]
    fn remainder_is_exact_in_two_phase() {
        let s = solver();
        let state = two_phase_state(0.4, 3.0e6, 460.0);
        let total = state.component_sum_kg();
        let out = s
            .solve(
                &state,
                &heater_only(1.0e6),
                30.0,
                true,
                MassBasis::Canonical { total_kg: total },
            )
            .unwrap();
        let sum = out.state.component_sum_kg();
        assert!((sum - total).abs() < 1e-9 * total);
    }

    #[test]
    fn legacy_mode_drifts_mass() {
        // The degraded path recomputes components from density x volume
        // and does not conserve; this is exactly why it is not a
        // production path.
        let s = solver();
        let mut state = solid_state();
        let total0 = state.component_sum_kg();
        for _ in 0..20 {
            let out = s
                .solve(
                    &state,
                    &heater_only(1.6e6),
                    60.0,
                    false,
                    MassBasis::LegacyComponentSum,
                )
                .unwrap();
            state = out.state;
        }
        let drift = (state.component_sum_kg() - total0).abs();
        assert!(drift > 1.0, "legacy path conserved unexpectedly: {drift}");
    }

    #[test]
    fn non_convergence_is_loud() {
        let s = EquilibriumSolver::new(
            geometry(),
            NewtonConfig {
                max_iterations: 1,
                mass_tol_kg: 1e-12,
                volume_tol_m3: 1e-15,
                ..NewtonConfig::default()
            },
        )
        .unwrap();
        let state = two_phase_state(0.5, 2.5166e6, 450.0);
        let total = state.component_sum_kg();
        let err = s
            .solve(
                &state,
                &heater_only(1.6e6),
                60.0,
                true,
                MassBasis::Canonical { total_kg: total },
            )
            .unwrap_err();
        assert!(matches!(err, SolverError::ConvergenceFailed { .. }));
    }

    #[test]
    fn delta_algebra_round_trips() {
        let a = solid_state();
        let b = two_phase_state(0.5, 2.5166e6, 450.0);
        let d = SolveDelta::between(&b, &a);
        let b2 = a.applied(&d);
        assert!((b2.pressure_pa - b.pressure_pa).abs() < 1e-9);
        assert!((b2.pzr_steam_mass_kg - b.pzr_steam_mass_kg).abs() < 1e-9);
        let half = d.scaled(0.5).plus(&d.scaled(0.5));
        assert!((half.d_pressure_pa - d.d_pressure_pa).abs() < 1e-9);
    }

    #[test]
    fn mass_basis_must_be_valid() {
        let s = solver();
        let state = solid_state();
        let err = s
            .solve(
                &state,
                &heater_only(0.0),
                1.0,
                false,
                MassBasis::Canonical { total_kg: -1.0 },
            )
            .unwrap_err();
        assert!(matches!(err, SolverError::InvalidArg { .. }));
    }
}
