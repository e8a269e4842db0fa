//! Error types for simulation operations.

use thiserror::Error;

/// Errors encountered while stepping the heatup simulation.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Non-physical condition: {what}")]
    NonPhysical { what: &'static str },

    #[error("Backend error: {message}")]
    Backend { message: String },
}

pub type SimResult<T> = Result<T, SimError>;

impl From<pf_solver::SolverError> for SimError {
    fn from(e: pf_solver::SolverError) -> Self {
        SimError::Backend {
            message: e.to_string(),
        }
    }
}

impl From<pf_cvcs::ControlError> for SimError {
    fn from(e: pf_cvcs::ControlError) -> Self {
        SimError::Backend {
            message: e.to_string(),
        }
    }
}

impl From<pf_phase::PhaseError> for SimError {
    fn from(e: pf_phase::PhaseError) -> Self {
        SimError::Backend {
            message: e.to_string(),
        }
    }
}

impl From<pf_steam::SteamError> for SimError {
    fn from(e: pf_steam::SteamError) -> Self {
        SimError::Backend {
            message: e.to_string(),
        }
    }
}
