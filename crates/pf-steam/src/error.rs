use thiserror::Error;

pub type SteamResult<T> = Result<T, SteamError>;

#[derive(Error, Debug)]
pub enum SteamError {
    #[error("{what} out of range: {value}")]
    OutOfRange { what: &'static str, value: f64 },

    #[error("Convergence failed: {what}")]
    ConvergenceFailed { what: &'static str },
}
