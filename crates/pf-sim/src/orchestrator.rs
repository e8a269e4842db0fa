//! Tick orchestration.
//!
//! The per-tick component order is fixed and is itself an invariant:
//!
//! 1. CVCS computes and applies the boundary mass delta (the ledger
//!    rebase happens first on the first tick),
//! 2. phase guards evaluate against start-of-tick measurements,
//! 3. the equilibrium solve (or blended pair) produces the new physical
//!    state,
//! 4. ledger drift is computed and classified.
//!
//! Single-threaded and deterministic; a tick either completes or, on a
//! solver convergence failure, holds the previous state and reports it.

use pf_cvcs::{
    CvcsController, CvcsMeasurement, CvcsSetpoint, CvcsTickReport, DriftStatus, LetdownOrifice,
    MassLedger,
};
use pf_phase::{BubblePhase, FlowTarget, PhaseAlert, PhaseController, PhaseInputs};
use pf_solver::{
    EquilibriumSolver, HeatTerms, MassBasis, SolveOutcome, SolverError, SolverState,
};
use pf_steam::rho_liquid_compressed;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::config::HeatupConfig;
use crate::error::{SimError, SimResult};
use crate::regime::{blend, Regime, RegimeController};
use crate::state::{PrimaryState, StateSnapshot};

/// Pressurizer heater bank command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaterMode {
    Off,
    /// Backup-heater band control: power proportional to the pressure
    /// shortfall below the setpoint, clamped to the rated bank.
    Proportional,
    Full,
}

/// External heat flows and operator commands for one tick.
#[derive(Clone, Copy, Debug)]
pub struct TickInputs {
    pub heater_mode: HeaterMode,
    pub aux_spray: bool,
    pub target_rcp_count: u8,
    pub orifice: LetdownOrifice,
    /// Non-pump, non-RHR heat into the loop, W.
    pub heat_in_primary_w: f64,
    /// Secondary-side removal available at full forced flow, W.
    pub heat_removed_secondary_w: f64,
    /// RHR heat exchange at the configured train capacity, W.
    pub rhr_heat_w: f64,
    /// True while the RHR train is hydraulically coupled to the loop
    /// (suction valves open, RHR flow established). `rhr_heat_w` reaches
    /// the loop only while this holds; it is never applied on the
    /// strength of RCP flow, which is a separate system.
    pub rhr_coupled: bool,
}

impl Default for TickInputs {
    fn default() -> Self {
        Self {
            heater_mode: HeaterMode::Off,
            aux_spray: false,
            target_rcp_count: 0,
            orifice: LetdownOrifice::Gpm75,
            heat_in_primary_w: 0.0,
            heat_removed_secondary_w: 0.0,
            rhr_heat_w: 0.0,
            rhr_coupled: false,
        }
    }
}

/// Everything one tick produced.
#[derive(Clone, Debug)]
pub struct TickReport {
    pub snapshot: StateSnapshot,
    pub cvcs: CvcsTickReport,
    pub phase_alerts: Vec<PhaseAlert>,
    pub phase_advanced: bool,
    /// True when the solve failed to converge and the physical state was
    /// held at its previous value.
    pub solver_held: bool,
    pub solver_iterations: usize,
}

pub struct HeatupSimulation {
    pub(crate) config: HeatupConfig,
    pub(crate) state: PrimaryState,
    pub(crate) solver: EquilibriumSolver,
    pub(crate) cvcs: CvcsController,
    pub(crate) phase: PhaseController,
    pub(crate) regime: RegimeController,
}

impl HeatupSimulation {
    /// Cold start: water-solid plant at the configured initial pressure
    /// and temperature, fresh controller state, ledger awaiting rebase.
    pub fn new(config: HeatupConfig) -> SimResult<Self> {
        config.validate()?;
        let rho = rho_liquid_compressed(config.initial_temperature_k, config.initial_pressure_pa)?;
        let physics = SolverState {
            temperature_rcs_k: config.initial_temperature_k,
            temperature_pzr_k: config.initial_temperature_k,
            pressure_pa: config.initial_pressure_pa,
            rcs_water_mass_kg: rho * config.geometry.rcs_volume_m3,
            pzr_water_mass_kg: rho * config.geometry.pzr_volume_m3,
            pzr_steam_mass_kg: 0.0,
            pzr_water_volume_m3: config.geometry.pzr_volume_m3,
            pzr_steam_volume_m3: 0.0,
        };
        let solver = EquilibriumSolver::new(config.geometry, config.newton)?;
        let ledger = MassLedger::new(config.drift_warn_fraction, config.drift_error_fraction)?;
        let mut cvcs = CvcsController::new(config.cvcs.clone(), config.delay_slots(), ledger)?;
        cvcs.reset_for_new_session();
        let phase = PhaseController::new(config.phase.clone())?;
        let regime = RegimeController::new(config.pump_ramp_per_s);
        Ok(Self {
            config,
            state: PrimaryState {
                physics,
                time_s: 0.0,
                tick: 0,
                pressure_rate_pa_per_s: 0.0,
            },
            solver,
            cvcs,
            phase,
            regime,
        })
    }

    pub fn state(&self) -> &PrimaryState {
        &self.state
    }

    pub fn config(&self) -> &HeatupConfig {
        &self.config
    }

    pub fn bubble_phase(&self) -> BubblePhase {
        self.phase.phase()
    }

    /// Operator-requested phase transition. Only the immediate successor
    /// is accepted, and the transition still passes the phase guard
    /// against the current measurements; a held guard returns its alerts
    /// with the phase unchanged.
    pub fn request_phase(&mut self, requested: BubblePhase) -> SimResult<Vec<PhaseAlert>> {
        let inputs = self.phase_inputs(false);
        Ok(self.phase.request(requested, &inputs)?.alerts)
    }

    fn phase_inputs(&self, aux_spray: bool) -> PhaseInputs {
        PhaseInputs {
            pressure_pa: self.state.physics.pressure_pa,
            temperature_pzr_k: self.state.physics.temperature_pzr_k,
            pzr_level_fraction: self
                .state
                .pzr_level_fraction(self.config.geometry.pzr_volume_m3),
            steam_volume_m3: self.state.physics.pzr_steam_volume_m3,
            pressure_rate_pa_per_s: self.state.pressure_rate_pa_per_s,
            aux_spray_commanded: aux_spray,
            dt_s: self.config.dt_s,
        }
    }

    pub fn snapshot(&self) -> SimResult<StateSnapshot> {
        // Before the first rebase the component sum is the only
        // authoritative total.
        let component_sum = self.state.physics.component_sum_kg();
        let (total_kg, drift_kg, drift_status) = if self.cvcs.ledger().is_rebased() {
            let drift = self.cvcs.ledger().drift_report(component_sum)?;
            (
                self.cvcs.ledger().total_kg()?,
                drift.drift_kg,
                drift.status,
            )
        } else {
            (component_sum, 0.0, DriftStatus::Ok)
        };
        let two_phase = self.state.physics.pzr_steam_mass_kg > 0.0;
        Ok(StateSnapshot {
            time_s: self.state.time_s,
            tick: self.state.tick,
            pressure_pa: self.state.physics.pressure_pa,
            pressure_rate_pa_per_s: self.state.pressure_rate_pa_per_s,
            temperature_rcs_k: self.state.physics.temperature_rcs_k,
            temperature_pzr_k: self.state.physics.temperature_pzr_k,
            pzr_level_fraction: self
                .state
                .pzr_level_fraction(self.config.geometry.pzr_volume_m3),
            pzr_steam_volume_m3: self.state.physics.pzr_steam_volume_m3,
            regime: self.regime.regime(two_phase),
            bubble_phase: self.phase.phase(),
            ledger_total_kg: total_kg,
            ledger_drift_kg: drift_kg,
            ledger_drift_status: drift_status,
        })
    }

    /// Advance one tick.
    pub fn tick(&mut self, inputs: &TickInputs) -> SimResult<TickReport> {
        let dt = self.config.dt_s;
        let start = self.state.physics;
        let level = self.state.pzr_level_fraction(self.config.geometry.pzr_volume_m3);

        // (1) CVCS boundary flow against start-of-tick measurements.
        self.cvcs.ensure_rebased(start.component_sum_kg())?;
        let (setpoint, bias_kgps) = match self.phase.flow_target() {
            FlowTarget::HoldPressure => (
                CvcsSetpoint::Pressure {
                    setpoint_pa: self.config.pressure_setpoint_pa,
                },
                0.0,
            ),
            FlowTarget::HoldLevel { setpoint_fraction } => {
                (CvcsSetpoint::Level { setpoint_fraction }, 0.0)
            }
            FlowTarget::Drain {
                setpoint_fraction,
                letdown_bias_kgps,
            } => (
                CvcsSetpoint::Level { setpoint_fraction },
                -letdown_bias_kgps,
            ),
        };
        let relief_kgps = if start.pressure_pa > self.config.relief_lift_pa {
            warn!(
                pressure_pa = start.pressure_pa,
                "relief valve open"
            );
            self.config.relief_flow_kgps
        } else {
            0.0
        };
        let meas = CvcsMeasurement {
            pressure_pa: start.pressure_pa,
            pzr_level_fraction: level,
        };
        let cvcs_report =
            self.cvcs
                .update(&setpoint, &meas, inputs.orifice, bias_kgps, relief_kgps, dt)?;

        // (2) Phase guards, against start-of-tick measurements.
        let phase_outcome = self.phase.evaluate(&self.phase_inputs(inputs.aux_spray))?;
        let latent = self.phase.latent_partition_active();

        // (3) Equilibrium solve under the ledger total.
        self.regime.update(
            f64::from(inputs.target_rcp_count.min(self.config.rcp_count))
                / f64::from(self.config.rcp_count),
            dt,
        );
        let two_phase = start.pzr_steam_mass_kg > 0.0;
        let regime = self.regime.regime(two_phase);
        let basis = MassBasis::Canonical {
            total_kg: self.cvcs.ledger().total_kg()?,
        };
        let heater_w = self.heater_power(inputs.heater_mode, start.pressure_pa);
        let spray_w = if inputs.aux_spray {
            self.config.aux_spray_w
        } else {
            0.0
        };

        let mut solver_held = false;
        let mut iterations = 0;
        let next_physics = match regime {
            Regime::Ramping { coupling_factor } => {
                let iso = self.try_solve(&start, &self.heat_terms(inputs, heater_w, spray_w, 0.0), dt, latent, basis);
                let cpl = self.try_solve(&start, &self.heat_terms(inputs, heater_w, spray_w, 1.0), dt, latent, basis);
                match (iso, cpl) {
                    (Err(e), _) | (_, Err(e)) => return Err(e),
                    (Ok(Some(i)), Ok(Some(c))) => {
                        iterations = i.iterations.max(c.iterations);
                        Some(blend(&start, &i.delta, &c.delta, coupling_factor))
                    }
                    (Ok(None), _) | (_, Ok(None)) => None,
                }
            }
            Regime::Solid | Regime::IsolatedTwoPhase | Regime::Coupled => {
                let alpha = self.regime.flow_fraction();
                let terms = self.heat_terms(inputs, heater_w, spray_w, alpha);
                match self.try_solve(&start, &terms, dt, latent, basis) {
                    Ok(Some(out)) => {
                        iterations = out.iterations;
                        Some(out.state)
                    }
                    Ok(None) => None,
                    Err(e) => return Err(e),
                }
            }
        };
        match next_physics {
            Some(next) => {
                self.state.pressure_rate_pa_per_s = (next.pressure_pa - start.pressure_pa) / dt;
                self.state.physics = next;
            }
            None => {
                solver_held = true;
            }
        }
        self.state.time_s += dt;
        self.state.tick += 1;

        // (4) Drift classification.
        let drift = self
            .cvcs
            .ledger()
            .drift_report(self.state.physics.component_sum_kg())?;
        match drift.status {
            DriftStatus::Ok => {}
            DriftStatus::Warning => warn!(
                drift_kg = drift.drift_kg,
                fraction = drift.drift_fraction,
                "mass ledger drift warning"
            ),
            DriftStatus::Error => error!(
                drift_kg = drift.drift_kg,
                fraction = drift.drift_fraction,
                "mass ledger drift error"
            ),
        }

        Ok(TickReport {
            snapshot: self.snapshot()?,
            cvcs: cvcs_report,
            phase_alerts: phase_outcome.alerts,
            phase_advanced: phase_outcome.advanced,
            solver_held,
            solver_iterations: iterations,
        })
    }

    /// Convergence failure holds the state; every other solver error
    /// propagates.
    fn try_solve(
        &self,
        start: &SolverState,
        terms: &HeatTerms,
        dt: f64,
        latent: bool,
        basis: MassBasis,
    ) -> SimResult<Option<SolveOutcome>> {
        match self.solver.solve(start, terms, dt, latent, basis) {
            Ok(out) => Ok(Some(out)),
            Err(SolverError::ConvergenceFailed { what }) => {
                error!(%what, "equilibrium solve failed, holding previous state");
                Ok(None)
            }
            Err(e) => Err(SimError::from(e)),
        }
    }

    fn heater_power(&self, mode: HeaterMode, pressure_pa: f64) -> f64 {
        match mode {
            HeaterMode::Off => 0.0,
            HeaterMode::Full => self.config.pzr_heater_rated_w,
            HeaterMode::Proportional => {
                let shortfall = (self.config.pressure_setpoint_pa - pressure_pa)
                    / self.config.pzr_heater_band_pa;
                self.config.pzr_heater_rated_w * shortfall.clamp(0.0, 1.0)
            }
        }
    }

    /// Heat flows at a given RCP coupling fraction. Pump heat and
    /// secondary removal ride on forced flow; RHR heat is gated by its
    /// own hydraulic lineup, not by RCP flow, so it reaches the loop in
    /// full whenever the train is coupled (during cold-start heatup the
    /// RCPs are off and RHR is the primary heat source); surge-line
    /// exchange never drops below natural circulation.
    fn heat_terms(&self, inputs: &TickInputs, heater_w: f64, spray_w: f64, alpha: f64) -> HeatTerms {
        let nat = self.config.natural_circulation_coupling;
        HeatTerms {
            heat_in_primary_w: inputs.heat_in_primary_w,
            heat_removed_secondary_w: alpha * inputs.heat_removed_secondary_w,
            pump_heat_w: alpha
                * self.config.pump_heat_per_rcp_w
                * f64::from(self.config.rcp_count),
            rhr_heat_w: if inputs.rhr_coupled {
                inputs.rhr_heat_w
            } else {
                0.0
            },
            pzr_heater_w: heater_w,
            pzr_spray_w: spray_w,
            surge_coupling: nat + alpha * (1.0 - nat),
        }
    }
}
