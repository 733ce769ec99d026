//! Operator Metrics: per-operator invocation counters
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorMetrics {
    /// Elements handed to element callbacks (both inputs for two-input operators)
    pub records_in: u64,
    /// Broadcast-side elements
    pub broadcast_records_in: u64,
    pub timers_fired: u64,
    pub records_out: u64,
    /// Callbacks that returned an error
    pub failures: u64,
}

impl OperatorMetrics {
    pub fn invocations(&self) -> u64 {
        self.records_in + self.broadcast_records_in + self.timers_fired
    }
}
