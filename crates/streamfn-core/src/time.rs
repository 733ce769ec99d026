//! Time domains and timer firings
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which notion of time caused a timer to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeDomain {
    /// The watermark passed the timer's timestamp.
    EventTime,
    /// The wall clock passed the timer's timestamp.
    ProcessingTime,
}

impl fmt::Display for TimeDomain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::EventTime => write!(f, "EVENT_TIME"),
            Self::ProcessingTime => write!(f, "PROCESSING_TIME"),
        }
    }
}

/// A due timer handed to a keyed operator's `on_timer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer<K> {
    pub key: K,
    pub timestamp: i64,
    pub domain: TimeDomain,
}

impl<K> Timer<K> {
    pub fn event_time(key: K, timestamp: i64) -> Self {
        Self { key, timestamp, domain: TimeDomain::EventTime }
    }

    pub fn processing_time(key: K, timestamp: i64) -> Self {
        Self { key, timestamp, domain: TimeDomain::ProcessingTime }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_serialized_name() {
        assert_eq!(TimeDomain::EventTime.to_string(), "EVENT_TIME");
        assert_eq!(
            serde_json::to_string(&TimeDomain::ProcessingTime).unwrap(),
            "\"PROCESSING_TIME\""
        );
    }

    #[test]
    fn test_timer_constructors_set_domain() {
        assert_eq!(Timer::event_time("k", 5).domain, TimeDomain::EventTime);
        assert_eq!(Timer::processing_time("k", 5).domain, TimeDomain::ProcessingTime);
    }
}
