//! Phase state machine, guard predicates, and per-tick alerts.

use crate::error::{PhaseError, PhaseResult};
use pf_steam::t_sat;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Bubble-formation phase. Declaration order is transition order; the
/// derived `Ord` is what makes "never regress" checkable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BubblePhase {
    None,
    Detection,
    Verification,
    Drain,
    Stabilize,
    Pressurize,
    Complete,
}

impl BubblePhase {
    pub fn next(self) -> Option<BubblePhase> {
        use BubblePhase::*;
        match self {
            None => Some(Detection),
            Detection => Some(Verification),
            Verification => Some(Drain),
            Drain => Some(Stabilize),
            Stabilize => Some(Pressurize),
            Pressurize => Some(Complete),
            Complete => Option::None,
        }
    }
}

/// CVCS flow targets commanded by the active phase. The simulation layer
/// maps these onto the controller's setpoint types.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FlowTarget {
    /// Solid plant: hold pressure at the operating setpoint.
    HoldPressure,
    /// Two-phase: hold pressurizer level.
    HoldLevel { setpoint_fraction: f64 },
    /// Draining to the post-bubble band: level setpoint plus a letdown
    /// bias so letdown exceeds charging. Steam displacement, not CVCS
    /// flow, is the primary draining mechanism.
    Drain {
        setpoint_fraction: f64,
        letdown_bias_kgps: f64,
    },
}

/// Alerts raised by guard evaluation. Surfaced to the caller and logged;
/// never auto-acted-on here.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PhaseAlert {
    /// Advisory only: pressure rate was unstable when leaving Drain.
    PressureRateUnstable { rate_pa_per_s: f64 },
    /// Aux-spray verification drop fell outside the accepted band; the
    /// test window restarts.
    SprayTestOutOfBand { drop_pa: f64 },
    /// Pressurize -> Complete held: level outside the completion band.
    CompletionHeldOnLevel { level_fraction: f64 },
    /// Pressurize -> Complete held: pressure below RCP minimum suction.
    CompletionHeldOnPressure { pressure_pa: f64 },
    /// A caller asked for an undefined transition (skip or regression).
    TransitionRejected { requested: BubblePhase },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhaseConfig {
    /// Detection margin below saturation, kelvin (plant procedure: 1 F).
    pub detection_margin_k: f64,
    /// Steam volume that counts as an established bubble, m3.
    pub bubble_established_volume_m3: f64,
    /// Aux-spray verification: accepted pressure-drop band, Pa.
    pub spray_test_min_drop_pa: f64,
    pub spray_test_max_drop_pa: f64,
    /// Aux-spray verification window, seconds.
    pub spray_test_duration_s: f64,
    /// Post-bubble level target and drain entry tolerance, fractions.
    pub drain_level_target: f64,
    pub drain_level_tolerance: f64,
    /// Letdown-over-charging bias commanded during Drain, kg/s.
    pub drain_letdown_bias_kgps: f64,
    /// Pressure-rate magnitude regarded as stable, Pa/s.
    pub stable_rate_pa_per_s: f64,
    /// Continuous stable time required to leave Stabilize, seconds.
    pub stabilize_hold_s: f64,
    /// RCP minimum suction pressure, Pa.
    pub min_rcp_suction_pa: f64,
    /// Completion level band around the target, fraction.
    pub complete_level_tolerance: f64,
}

impl PhaseConfig {
    pub fn validate(&self) -> PhaseResult<()> {
        if self.detection_margin_k <= 0.0 {
            return Err(PhaseError::InvalidArg {
                what: "detection_margin_k must be positive",
            });
        }
        if self.spray_test_min_drop_pa >= self.spray_test_max_drop_pa {
            return Err(PhaseError::InvalidArg {
                what: "spray test band must satisfy min < max",
            });
        }
        if !(0.0..=1.0).contains(&self.drain_level_target) {
            return Err(PhaseError::InvalidArg {
                what: "drain_level_target must be a fraction",
            });
        }
        Ok(())
    }
}

/// Measurements the guards evaluate, sampled at the start of the tick.
#[derive(Clone, Copy, Debug)]
pub struct PhaseInputs {
    pub pressure_pa: f64,
    pub temperature_pzr_k: f64,
    pub pzr_level_fraction: f64,
    pub steam_volume_m3: f64,
    pub pressure_rate_pa_per_s: f64,
    pub aux_spray_commanded: bool,
    pub dt_s: f64,
}

/// Result of one guard evaluation.
#[derive(Clone, Debug)]
pub struct PhaseOutcome {
    pub phase: BubblePhase,
    pub advanced: bool,
    pub alerts: Vec<PhaseAlert>,
}

/// In-progress aux-spray verification test.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
struct SprayTest {
    start_pressure_pa: f64,
    elapsed_s: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhaseController {
    config: PhaseConfig,
    phase: BubblePhase,
    spray_test: Option<SprayTest>,
    stable_elapsed_s: f64,
}

impl PhaseController {
    pub fn new(config: PhaseConfig) -> PhaseResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            phase: BubblePhase::None,
            spray_test: None,
            stable_elapsed_s: 0.0,
        })
    }

    /// Rebuild from a persisted phase, e.g. on session restore.
    pub fn restore(config: PhaseConfig, phase: BubblePhase) -> PhaseResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            phase,
            spray_test: None,
            stable_elapsed_s: 0.0,
        })
    }

    pub fn phase(&self) -> BubblePhase {
        self.phase
    }

    pub fn config(&self) -> &PhaseConfig {
        &self.config
    }

    /// CVCS flow targets commanded by the current phase.
    pub fn flow_target(&self) -> FlowTarget {
        use BubblePhase::*;
        match self.phase {
            None | Detection | Verification => FlowTarget::HoldPressure,
            Drain => FlowTarget::Drain {
                setpoint_fraction: self.config.drain_level_target,
                letdown_bias_kgps: self.config.drain_letdown_bias_kgps,
            },
            Stabilize | Pressurize | Complete => FlowTarget::HoldLevel {
                setpoint_fraction: self.config.drain_level_target,
            },
        }
    }

    /// Whether the pressurizer heat input partitions to latent heat.
    /// True from Detection onward: once a bubble can exist, heater energy
    /// converts mass at saturation instead of raising temperature.
    pub fn latent_partition_active(&self) -> bool {
        self.phase >= BubblePhase::Detection
    }

    /// Explicit transition request, e.g. from an operator command. Only
    /// the immediate successor is a defined transition, and the request
    /// still runs the same guard as automatic evaluation against the
    /// supplied measurements; a held guard holds the phase and reports
    /// why. An operator command never bypasses a mandatory guard.
    pub fn request(
        &mut self,
        requested: BubblePhase,
        inputs: &PhaseInputs,
    ) -> PhaseResult<PhaseOutcome> {
        if Some(requested) != self.phase.next() {
            warn!(?requested, current = ?self.phase, "phase transition rejected");
            return Ok(PhaseOutcome {
                phase: self.phase,
                advanced: false,
                alerts: vec![PhaseAlert::TransitionRejected { requested }],
            });
        }
        self.evaluate(inputs)
    }

    fn advance(&mut self) {
        if let Some(next) = self.phase.next() {
            info!(from = ?self.phase, to = ?next, "bubble phase advanced");
            self.phase = next;
            self.spray_test = None;
            self.stable_elapsed_s = 0.0;
        }
    }

    /// Evaluate the guard for the current phase against this tick's
    /// measurements. At most one phase advance per tick.
    pub fn evaluate(&mut self, inputs: &PhaseInputs) -> PhaseResult<PhaseOutcome> {
        if inputs.dt_s <= 0.0 {
            return Err(PhaseError::InvalidArg {
                what: "dt_s must be positive",
            });
        }
        let mut alerts = Vec::new();
        let advanced = match self.phase {
            BubblePhase::None => self.guard_detection(inputs)?,
            BubblePhase::Detection => self.guard_verification(inputs),
            BubblePhase::Verification => self.guard_drain(inputs, &mut alerts),
            BubblePhase::Drain => self.guard_stabilize(inputs, &mut alerts),
            BubblePhase::Stabilize => self.guard_pressurize(inputs),
            BubblePhase::Pressurize => self.guard_complete(inputs, &mut alerts),
            BubblePhase::Complete => false,
        };
        if advanced {
            self.advance();
        }
        Ok(PhaseOutcome {
            phase: self.phase,
            advanced,
            alerts,
        })
    }

    /// None -> Detection: pressurizer temperature within the fixed margin
    /// of saturation at current pressure. Carries no state change of its
    /// own, so the pressure trace is continuous across the transition.
    fn guard_detection(&self, inputs: &PhaseInputs) -> PhaseResult<bool> {
        let t_sat_k = t_sat(inputs.pressure_pa)?;
        Ok(t_sat_k - inputs.temperature_pzr_k <= self.config.detection_margin_k)
    }

    /// Detection -> Verification: a measurable steam volume exists.
    fn guard_verification(&self, inputs: &PhaseInputs) -> bool {
        inputs.steam_volume_m3 >= self.config.bubble_established_volume_m3
    }

    /// Verification -> Drain: aux-spray test. Spray must produce a
    /// bounded pressure drop over the test window; a drop outside the
    /// band restarts the window and holds the phase.
    fn guard_drain(&mut self, inputs: &PhaseInputs, alerts: &mut Vec<PhaseAlert>) -> bool {
        if !inputs.aux_spray_commanded {
            self.spray_test = None;
            return false;
        }
        let test = self.spray_test.get_or_insert(SprayTest {
            start_pressure_pa: inputs.pressure_pa,
            elapsed_s: 0.0,
        });
        test.elapsed_s += inputs.dt_s;
        if test.elapsed_s < self.config.spray_test_duration_s {
            return false;
        }
        let drop_pa = test.start_pressure_pa - inputs.pressure_pa;
        if (self.config.spray_test_min_drop_pa..=self.config.spray_test_max_drop_pa)
            .contains(&drop_pa)
        {
            true
        } else {
            warn!(drop_pa, "aux-spray verification drop out of band, restarting test");
            alerts.push(PhaseAlert::SprayTestOutOfBand { drop_pa });
            self.spray_test = Some(SprayTest {
                start_pressure_pa: inputs.pressure_pa,
                elapsed_s: 0.0,
            });
            false
        }
    }

    /// Drain -> Stabilize: level reached the target band. The
    /// pressure-rate check is advisory; blocking here risks unbounded
    /// level runaway, so an unstable rate alerts but never holds.
    fn guard_stabilize(&self, inputs: &PhaseInputs, alerts: &mut Vec<PhaseAlert>) -> bool {
        let reached = inputs.pzr_level_fraction
            <= self.config.drain_level_target + self.config.drain_level_tolerance;
        if reached && inputs.pressure_rate_pa_per_s.abs() > self.config.stable_rate_pa_per_s {
            warn!(
                rate = inputs.pressure_rate_pa_per_s,
                "leaving Drain with unstable pressure rate (advisory)"
            );
            alerts.push(PhaseAlert::PressureRateUnstable {
                rate_pa_per_s: inputs.pressure_rate_pa_per_s,
            });
        }
        reached
    }

    /// Stabilize -> Pressurize: pressure rate continuously stable for the
    /// hold time.
    fn guard_pressurize(&mut self, inputs: &PhaseInputs) -> bool {
        if inputs.pressure_rate_pa_per_s.abs() <= self.config.stable_rate_pa_per_s {
            self.stable_elapsed_s += inputs.dt_s;
        } else {
            self.stable_elapsed_s = 0.0;
        }
        self.stable_elapsed_s >= self.config.stabilize_hold_s
    }

    /// Pressurize -> Complete: mandatory guard. Both pressure above RCP
    /// minimum suction and level inside the completion band; holds with a
    /// per-tick alert otherwise.
    fn guard_complete(&self, inputs: &PhaseInputs, alerts: &mut Vec<PhaseAlert>) -> bool {
        let pressure_ok = inputs.pressure_pa >= self.config.min_rcp_suction_pa;
        let level_ok = (inputs.pzr_level_fraction - self.config.drain_level_target).abs()
            <= self.config.complete_level_tolerance;
        if pressure_ok && level_ok {
            return true;
        }
        if !pressure_ok {
            warn!(
                pressure_pa = inputs.pressure_pa,
                "completion held: pressure below RCP minimum suction"
            );
            alerts.push(PhaseAlert::CompletionHeldOnPressure {
                pressure_pa: inputs.pressure_pa,
            });
        }
        if !level_ok {
            warn!(
                level = inputs.pzr_level_fraction,
                "completion held: level outside band"
            );
            alerts.push(PhaseAlert::CompletionHeldOnLevel {
                level_fraction: inputs.pzr_level_fraction,
            });
        }
        false
    }
}
