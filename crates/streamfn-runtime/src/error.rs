//! Runtime Errors
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("CONFIG/{0}")]
    Config(String),

    #[error("IO/{0}")]
    Io(#[from] std::io::Error),

    #[error("TELEMETRY/{0}")]
    Telemetry(String),
}
