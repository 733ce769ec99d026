//! Timer Service: clock queries and timer registration
//!
//! The core never decides when timers fire. It only queries the service and
//! forwards registrations made by user code.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    #[error("no key in scope; timers can only be registered on keyed streams")]
    MissingKeyContext,

    #[error("timer service unavailable: {0}")]
    Unavailable(String),
}

/// Contract of the timer service a context hands out to user code.
pub trait TimerService: Send + Sync {
    /// Current processing (wall clock) time in milliseconds.
    fn current_processing_time(&self) -> i64;

    /// Current event-time watermark in milliseconds.
    fn current_watermark(&self) -> i64;

    fn register_processing_time_timer(&self, timestamp: i64) -> Result<(), TimerError>;

    fn register_event_time_timer(&self, timestamp: i64) -> Result<(), TimerError>;

    fn delete_processing_time_timer(&self, timestamp: i64) -> Result<(), TimerError>;

    fn delete_event_time_timer(&self, timestamp: i64) -> Result<(), TimerError>;
}

/// Timer service whose registrations belong to the key being processed.
///
/// Keyed operators switch the scope before every invocation so that a timer
/// registered by user code fires later for the same key, and clear it once
/// the callback returns. Outside an invocation no key is in scope.
pub trait KeyedTimerService<K>: TimerService {
    fn set_current_key(&self, key: &K);

    fn clear_current_key(&self);
}
