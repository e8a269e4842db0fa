//! Calibration configuration for the heatup scenario.
//!
//! Every tunable constant lives here rather than at a use site. The
//! `Default` carries the plant-procedure values: a 365 psia / 100 F
//! water-solid start, 1 F detection margin, 5-15 psi aux-spray band,
//! 25% post-bubble level target.

use crate::error::{SimError, SimResult};
use pf_core::units::convert::{degf_to_k, psi_to_pa, DEGF_INTERVAL_K};
use pf_cvcs::CvcsConfig;
use pf_phase::PhaseConfig;
use pf_solver::{NewtonConfig, PlantGeometry};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HeatupConfig {
    /// Tick length, seconds.
    pub dt_s: f64,
    /// CVCS transport delay, seconds. Rounded to whole delay slots.
    pub cvcs_delay_s: f64,
    /// Ledger drift classification bands, fractions of total mass.
    pub drift_warn_fraction: f64,
    pub drift_error_fraction: f64,

    pub geometry: PlantGeometry,
    pub newton: NewtonConfig,
    pub cvcs: CvcsConfig,
    pub phase: PhaseConfig,

    /// Pressurizer heater bank rated power, W.
    pub pzr_heater_rated_w: f64,
    /// Proportional-band width for backup-heater control, Pa.
    pub pzr_heater_band_pa: f64,
    /// Condensing duty of the auxiliary spray when commanded, W.
    pub aux_spray_w: f64,

    /// Heat added per reactor coolant pump at full flow, W.
    pub pump_heat_per_rcp_w: f64,
    pub rcp_count: u8,
    /// Pump flow-fraction ramp rate after a start command, 1/s.
    pub pump_ramp_per_s: f64,
    /// Surge-line coupling retained with no forced flow.
    pub natural_circulation_coupling: f64,

    /// Relief valve lift setpoint and rated relief flow.
    pub relief_lift_pa: f64,
    pub relief_flow_kgps: f64,

    /// Pressure held by CVCS during solid-plant operation.
    pub pressure_setpoint_pa: f64,

    /// Cold-start initial condition.
    pub initial_pressure_pa: f64,
    pub initial_temperature_k: f64,
}

impl Default for HeatupConfig {
    fn default() -> Self {
        Self {
            dt_s: 1.0,
            cvcs_delay_s: 30.0,
            drift_warn_fraction: 0.001,
            drift_error_fraction: 0.01,
            geometry: PlantGeometry {
                rcs_volume_m3: 300.0,
                pzr_volume_m3: 51.0,
                surge_ua_w_per_k: 5.0e3,
                pzr_ambient_loss_w: 5.0e4,
            },
            newton: NewtonConfig::default(),
            cvcs: CvcsConfig {
                kp: 20.0,
                ti_s: 300.0,
                integral_limit: 50.0,
                max_charging_kgps: 9.5,
                deadtime_gap_kgps: 6.0,
                // Deliberately large: keeps the pressure loop gain low
                // enough to tolerate the 30 s transport delay.
                pressure_norm_pa: 4.0e6,
            },
            phase: PhaseConfig {
                detection_margin_k: DEGF_INTERVAL_K,
                bubble_established_volume_m3: 0.5,
                spray_test_min_drop_pa: psi_to_pa(5.0),
                spray_test_max_drop_pa: psi_to_pa(15.0),
                spray_test_duration_s: 30.0,
                drain_level_target: 0.25,
                drain_level_tolerance: 0.05,
                drain_letdown_bias_kgps: 2.0,
                stable_rate_pa_per_s: 1.15e3,
                stabilize_hold_s: 60.0,
                min_rcp_suction_pa: psi_to_pa(334.0),
                complete_level_tolerance: 0.05,
            },
            pzr_heater_rated_w: 1.6e6,
            pzr_heater_band_pa: psi_to_pa(25.0),
            aux_spray_w: 3.0e6,
            pump_heat_per_rcp_w: 3.5e6,
            rcp_count: 4,
            pump_ramp_per_s: 1.0 / 120.0,
            natural_circulation_coupling: 0.15,
            relief_lift_pa: psi_to_pa(450.0),
            relief_flow_kgps: 25.0,
            pressure_setpoint_pa: psi_to_pa(365.0),
            initial_pressure_pa: psi_to_pa(365.0),
            initial_temperature_k: degf_to_k(100.0),
        }
    }
}

impl HeatupConfig {
    pub fn validate(&self) -> SimResult<()> {
        if self.dt_s <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "dt_s must be positive",
            });
        }
        if self.cvcs_delay_s < self.dt_s {
            return Err(SimError::InvalidArg {
                what: "cvcs_delay_s must be at least one tick",
            });
        }
        if self.drift_warn_fraction <= 0.0 || self.drift_warn_fraction >= self.drift_error_fraction
        {
            return Err(SimError::InvalidArg {
                what: "drift bands must satisfy 0 < warn < error",
            });
        }
        if self.rcp_count == 0 {
            return Err(SimError::InvalidArg {
                what: "rcp_count must be positive",
            });
        }
        if !(0.0..=1.0).contains(&self.natural_circulation_coupling) {
            return Err(SimError::InvalidArg {
                what: "natural_circulation_coupling must be a fraction",
            });
        }
        self.cvcs.validate()?;
        self.phase.validate()?;
        Ok(())
    }

    /// Transport delay in whole ticks, at least one.
    pub fn delay_slots(&self) -> usize {
        ((self.cvcs_delay_s / self.dt_s).round() as usize).max(1)
    }
}
