//! Equilibrium solver for the pressurizer/RCS pair.
//!
//! Given the heat flows of one tick and a mass basis, the solver
//! advances temperatures and finds the pressure (and, in two-phase
//! operation, the steam mass) satisfying the equilibrium conditions:
//! saturation at the pressurizer steam/water interface and volume
//! balance across the fixed vessel volumes.
//!
//! The mass basis is a mandatory argument. `MassBasis::Canonical` fixes
//! the total primary mass for the tick and derives the pressurizer water
//! mass as a remainder; `MassBasis::LegacyComponentSum` recomputes every
//! component from volume and density and exists for standalone
//! diagnostics only. A production call site reaching it is a defect.

pub mod equilibrium;
pub mod error;

pub use equilibrium::{
    EquilibriumSolver, HeatTerms, MassBasis, NewtonConfig, PlantGeometry, SolveDelta,
    SolveOutcome, SolverState,
};
pub use error::{SolverError, SolverResult};
