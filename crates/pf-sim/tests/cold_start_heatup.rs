//! Cold-start scenario: water-solid plant at 365 psia / 100 F, heaters
//! at rated power, RHR warming the loop. Asserts trends and invariants,
//! not exact values.

use pf_core::units::convert::psi_to_pa;
use pf_phase::BubblePhase;
use pf_sim::{HeaterMode, HeatupConfig, HeatupSimulation, TickInputs};
use pf_steam::t_sat;

fn config() -> HeatupConfig {
    HeatupConfig {
        // Coarser ticks keep the scenario fast; the delay stays 30 s.
        dt_s: 2.0,
        ..HeatupConfig::default()
    }
}

fn inputs() -> TickInputs {
    TickInputs {
        heater_mode: HeaterMode::Full,
        rhr_heat_w: 8.0e6,
        rhr_coupled: true,
        ..TickInputs::default()
    }
}

#[test]
fn heatup_reaches_detection_inside_the_saturation_margin() {
    let mut sim = HeatupSimulation::new(config()).unwrap();
    let margin = sim.config().phase.detection_margin_k;
    let inputs = inputs();

    let mut before_detection = sim.snapshot().unwrap();
    let mut detection = None;
    for _ in 0..40_000 {
        let prior = sim.snapshot().unwrap();
        let r = sim.tick(&inputs).unwrap();
        assert!(!r.solver_held, "solid heatup must never fail to converge");
        if r.snapshot.bubble_phase == BubblePhase::Detection {
            before_detection = prior;
            detection = Some(r.snapshot);
            break;
        }
    }
    let detection = detection.expect("heatup never reached Detection");

    // The guard fired only inside the margin.
    let subcooling =
        t_sat(before_detection.pressure_pa).unwrap() - before_detection.temperature_pzr_k;
    assert!(
        subcooling <= margin + 0.05,
        "Detection fired {subcooling} K subcooled, margin {margin} K"
    );

    // No pressure discontinuity across the transition.
    let step = (detection.pressure_pa - before_detection.pressure_pa).abs();
    assert!(
        step < psi_to_pa(1.0),
        "pressure stepped {step} Pa across the Detection transition"
    );
}

#[test]
fn solid_heatup_holds_pressure_and_conserves() {
    let mut sim = HeatupSimulation::new(config()).unwrap();
    let inputs = inputs();
    let sp = sim.config().pressure_setpoint_pa;
    let relief = sim.config().relief_lift_pa;

    // One hour of simulated heatup: both fluid regions warm, pressure
    // stays between the saturation floor and the relief setpoint, and
    // the ledger never drifts from the component sum.
    let t0 = sim.snapshot().unwrap();
    let mut max_dev = 0.0_f64;
    for _ in 0..1800 {
        let r = sim.tick(&inputs).unwrap();
        assert_eq!(r.snapshot.ledger_drift_status, pf_cvcs::DriftStatus::Ok);
        assert!(r.snapshot.ledger_drift_kg.abs() < 1e-6);
        assert!(r.snapshot.pressure_pa < relief);
        max_dev = max_dev.max((r.snapshot.pressure_pa - sp).abs());
    }
    let end = sim.snapshot().unwrap();
    assert!(end.temperature_pzr_k > t0.temperature_pzr_k + 10.0);
    assert!(end.temperature_rcs_k > t0.temperature_rcs_k + 10.0);
    // CVCS keeps the solid plant within a loose band of the setpoint.
    assert!(
        max_dev < psi_to_pa(60.0),
        "pressure deviated {max_dev} Pa from setpoint"
    );
}
