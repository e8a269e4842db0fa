//! Property test: the canonical ledger and the component sum never
//! disagree, whatever the operator does.

use pf_cvcs::{DriftStatus, LetdownOrifice};
use pf_sim::{HeaterMode, HeatupConfig, HeatupSimulation, TickInputs};
use proptest::prelude::*;

fn arb_inputs() -> impl Strategy<Value = TickInputs> {
    (
        prop_oneof![
            Just(HeaterMode::Off),
            Just(HeaterMode::Proportional),
            Just(HeaterMode::Full),
        ],
        any::<bool>(),
        prop_oneof![
            Just(LetdownOrifice::Gpm45),
            Just(LetdownOrifice::Gpm75),
            Just(LetdownOrifice::Gpm120),
        ],
        0.0..10.0e6_f64,
        any::<bool>(),
    )
        .prop_map(
            |(heater_mode, aux_spray, orifice, rhr_heat_w, rhr_coupled)| TickInputs {
                heater_mode,
                aux_spray,
                orifice,
                rhr_heat_w,
                rhr_coupled,
                ..TickInputs::default()
            },
        )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn arbitrary_command_sequences_conserve_mass(
        sequence in proptest::collection::vec(arb_inputs(), 1..40)
    ) {
        let mut sim = HeatupSimulation::new(HeatupConfig::default()).unwrap();
        for inputs in &sequence {
            let r = sim.tick(inputs).unwrap();
            prop_assert!(r.snapshot.ledger_drift_kg.abs() < 1e-6);
            prop_assert_eq!(r.snapshot.ledger_drift_status, DriftStatus::Ok);
        }
    }
}
