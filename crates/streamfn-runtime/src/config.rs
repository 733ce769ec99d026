//! Runtime Configuration
//!
//! Loaded from YAML, then overridden from the environment:
//!
//! ```yaml
//! clock: manual            # system | manual
//! strict_state_descriptors: true
//! log_filter: "streamfn_core=debug,info"
//! ```
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;
use crate::state::HeapOperatorStateStore;
use crate::timers::{ClockMode, HeapTimerService};

/// Overrides `log_filter`.
pub const LOG_ENV: &str = "STREAMFN_LOG";
/// Overrides `clock` (`system` or `manual`).
pub const CLOCK_ENV: &str = "STREAMFN_CLOCK";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub clock: ClockMode,
    /// Only resolve broadcast states registered up front
    pub strict_state_descriptors: bool,
    pub log_filter: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            clock: ClockMode::System,
            strict_state_descriptors: false,
            log_filter: "info".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Load from a YAML file and apply environment overrides
    pub fn load(path: &str) -> Result<Self, RuntimeError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)?.with_env_overrides()
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, RuntimeError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| RuntimeError::Config(format!("failed to parse runtime config: {}", e)))
    }

    pub fn with_env_overrides(self) -> Result<Self, RuntimeError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Applies overrides from any variable source.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, RuntimeError> {
        if let Some(filter) = lookup(LOG_ENV) {
            self.log_filter = filter;
        }
        if let Some(clock) = lookup(CLOCK_ENV) {
            self.clock = match clock.trim().to_ascii_lowercase().as_str() {
                "system" => ClockMode::System,
                "manual" => ClockMode::Manual,
                other => {
                    return Err(RuntimeError::Config(format!(
                        "{} must be 'system' or 'manual', got '{}'",
                        CLOCK_ENV, other
                    )))
                }
            };
        }
        Ok(self)
    }

    pub fn timer_service<K>(&self) -> Arc<HeapTimerService<K>>
    where
        K: Ord + Clone + Send + 'static,
    {
        Arc::new(HeapTimerService::new(self.clock))
    }

    pub fn state_store(&self) -> Arc<HeapOperatorStateStore> {
        Arc::new(HeapOperatorStateStore::new(self.strict_state_descriptors))
    }
}
