//! Charging/letdown PI controller.
//!
//! The controller computes a net boundary flow (positive = charging)
//! from a level or pressure error, pushes it through the transport-delay
//! line, and applies the delayed value to the mass ledger it owns. Two
//! rules carried over from the plant-procedure defect history:
//!
//! 1. The adjustment computed this tick never affects this tick's mass
//!    balance; only the value written `delay_slots` ticks ago does.
//! 2. The integral holds while the actuator is saturated or while the
//!    dead-time gap between the instantaneous and delayed commands is
//!    large; otherwise it winds up during the whole saturated period and
//!    overshoots on release.

use crate::delay::TransportDelayLine;
use crate::error::{ControlError, ControlResult};
use crate::ledger::MassLedger;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Letdown orifice lineup. Selects the maximum letdown flow the lineup
/// can pass; nominal ratings are in gallons per minute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LetdownOrifice {
    Gpm45,
    Gpm75,
    Gpm120,
}

impl LetdownOrifice {
    pub fn max_letdown_kgps(self) -> f64 {
        match self {
            LetdownOrifice::Gpm45 => 2.84,
            LetdownOrifice::Gpm75 => 4.73,
            LetdownOrifice::Gpm120 => 7.57,
        }
    }
}

/// Controlled variable and its setpoint. Solid-plant operation controls
/// pressure; two-phase operation controls pressurizer level.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum CvcsSetpoint {
    Pressure { setpoint_pa: f64 },
    Level { setpoint_fraction: f64 },
}

/// Measurements sampled at the start of the tick.
#[derive(Clone, Copy, Debug)]
pub struct CvcsMeasurement {
    pub pressure_pa: f64,
    pub pzr_level_fraction: f64,
}

impl CvcsSetpoint {
    /// Normalized error in level-fraction-equivalent units, so one gain
    /// set serves both controlled variables.
    fn error(&self, meas: &CvcsMeasurement, pressure_norm_pa: f64) -> f64 {
        match *self {
            CvcsSetpoint::Pressure { setpoint_pa } => {
                (setpoint_pa - meas.pressure_pa) / pressure_norm_pa
            }
            CvcsSetpoint::Level { setpoint_fraction } => {
                setpoint_fraction - meas.pzr_level_fraction
            }
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CvcsConfig {
    /// Proportional gain, kg/s per unit normalized error.
    pub kp: f64,
    /// Integral time constant, seconds.
    pub ti_s: f64,
    /// Integral accumulator clamp (normalized-error-seconds).
    pub integral_limit: f64,
    /// Maximum charging flow, kg/s.
    pub max_charging_kgps: f64,
    /// Dead-time gap above which the integral holds, kg/s.
    pub deadtime_gap_kgps: f64,
    /// Pressure error normalization, Pa per unit error.
    pub pressure_norm_pa: f64,
}

impl CvcsConfig {
    pub fn validate(&self) -> ControlResult<()> {
        if self.ti_s <= 0.0 {
            return Err(ControlError::InvalidArg {
                what: "ti_s must be positive",
            });
        }
        if self.max_charging_kgps <= 0.0 {
            return Err(ControlError::InvalidArg {
                what: "max_charging_kgps must be positive",
            });
        }
        if self.pressure_norm_pa <= 0.0 {
            return Err(ControlError::InvalidArg {
                what: "pressure_norm_pa must be positive",
            });
        }
        Ok(())
    }
}

/// Persisted controller state: integral, windup latch, delay line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CvcsControllerState {
    pub integral: f64,
    pub anti_windup_active: bool,
    pub delay: TransportDelayLine,
}

/// What the controller did on one tick.
#[derive(Clone, Copy, Debug)]
pub struct CvcsTickReport {
    /// Clamped command computed this tick (enters the delay line).
    pub commanded_kgps: f64,
    /// Delayed command applied to the mass balance this tick.
    pub applied_kgps: f64,
    /// Signed mass applied to the ledger this tick.
    pub applied_delta_kg: f64,
    /// Relief mass removed this tick.
    pub relief_kg: f64,
    pub anti_windup_active: bool,
}

pub struct CvcsController {
    config: CvcsConfig,
    state: CvcsControllerState,
    ledger: MassLedger,
}

impl CvcsController {
    pub fn new(config: CvcsConfig, delay_slots: usize, ledger: MassLedger) -> ControlResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: CvcsControllerState {
                integral: 0.0,
                anti_windup_active: false,
                delay: TransportDelayLine::new(delay_slots)?,
            },
            ledger,
        })
    }

    /// Rebuild from persisted state. The delay line is external input at
    /// this point and is checked against the configured slot count before
    /// anything advances it. The ledger's rebase latch is always cleared
    /// here: a persisted total may be stale, so the first tick after
    /// restore re-seeds from the component sum.
    pub fn restore(
        config: CvcsConfig,
        delay_slots: usize,
        state: CvcsControllerState,
        mut ledger: MassLedger,
    ) -> ControlResult<Self> {
        config.validate()?;
        state.delay.validate(delay_slots)?;
        ledger.reset_rebase_flag();
        Ok(Self {
            config,
            state,
            ledger,
        })
    }

    pub fn ledger(&self) -> &MassLedger {
        &self.ledger
    }

    pub fn state(&self) -> &CvcsControllerState {
        &self.state
    }

    pub fn config(&self) -> &CvcsConfig {
        &self.config
    }

    /// New-session initialization: controller state, delay line, and the
    /// ledger rebase latch all reset together. Leaving any one of them
    /// stale corrupts drift diagnostics on the next run.
    pub fn reset_for_new_session(&mut self) {
        self.state.integral = 0.0;
        self.state.anti_windup_active = false;
        self.state.delay.reset();
        self.ledger.reset_rebase_flag();
    }

    /// Seed the ledger from the component sum on the first canonical
    /// tick. Returns true if the rebase happened on this call.
    pub fn ensure_rebased(&mut self, component_sum_kg: f64) -> ControlResult<bool> {
        if self.ledger.is_rebased() {
            return Ok(false);
        }
        self.ledger.rebase(component_sum_kg)?;
        Ok(true)
    }

    /// One controller tick. Runs the PI law, advances the delay line,
    /// and applies the delayed flow (plus any relief) to the ledger.
    pub fn update(
        &mut self,
        setpoint: &CvcsSetpoint,
        meas: &CvcsMeasurement,
        orifice: LetdownOrifice,
        bias_kgps: f64,
        relief_kgps: f64,
        dt: f64,
    ) -> ControlResult<CvcsTickReport> {
        if dt <= 0.0 {
            return Err(ControlError::InvalidArg {
                what: "dt must be positive",
            });
        }
        if relief_kgps < 0.0 {
            return Err(ControlError::InvalidArg {
                what: "relief flow must be non-negative",
            });
        }

        let error = setpoint.error(meas, self.config.pressure_norm_pa);
        if !error.is_finite() {
            return Err(ControlError::NonFinite {
                what: "controller error signal",
            });
        }

        let p_term = self.config.kp * error;
        let ki = self.config.kp / self.config.ti_s;
        let candidate_integral = (self.state.integral + error * dt)
            .clamp(-self.config.integral_limit, self.config.integral_limit);
        let i_term = ki * candidate_integral;

        let max_letdown = orifice.max_letdown_kgps();
        let raw = p_term + i_term + bias_kgps;
        let commanded = raw.clamp(-max_letdown, self.config.max_charging_kgps);

        // Read-before-write: the flow applied this tick was commanded
        // delay_slots ticks ago.
        let applied = self.state.delay.advance(commanded);

        let saturated = commanded != raw;
        let deadtime_gap = (commanded - applied).abs() > self.config.deadtime_gap_kgps;
        let windup_inhibit = saturated || deadtime_gap;
        if windup_inhibit {
            if !self.state.anti_windup_active {
                warn!(
                    saturated,
                    deadtime_gap, "cvcs anti-windup engaged, integral held"
                );
            }
        } else {
            if self.state.anti_windup_active {
                debug!("cvcs anti-windup released");
            }
            self.state.integral = candidate_integral;
        }
        self.state.anti_windup_active = windup_inhibit;

        let applied_delta_kg = applied * dt;
        self.ledger.apply_boundary_delta(applied_delta_kg)?;

        let relief_kg = relief_kgps * dt;
        if relief_kg > 0.0 {
            self.ledger.apply_relief(relief_kg)?;
        }

        Ok(CvcsTickReport {
            commanded_kgps: commanded,
            applied_kgps: applied,
            applied_delta_kg,
            relief_kg,
            anti_windup_active: windup_inhibit,
        })
    }
}
