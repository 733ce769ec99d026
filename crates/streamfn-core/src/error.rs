//! Unified Error Model
use thiserror::Error;

use crate::state::StateError;
use crate::timer::TimerError;

#[derive(Error, Debug)]
pub enum StreamFnError {
    #[error("STATE/{0}")]
    State(#[from] StateError),

    #[error("TIMER/{0}")]
    Timer(#[from] TimerError),

    #[error("FUNCTION/{0}")]
    Function(String),

    #[error("LIFECYCLE/{0}")]
    Lifecycle(String),
}

impl StreamFnError {
    /// Shorthand for errors raised from inside user function bodies.
    pub fn function(msg: impl Into<String>) -> Self {
        Self::Function(msg.into())
    }
}
