use thiserror::Error;

pub type PhaseResult<T> = Result<T, PhaseError>;

#[derive(Error, Debug)]
pub enum PhaseError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Property evaluation failed: {0}")]
    Steam(#[from] pf_steam::SteamError),
}
