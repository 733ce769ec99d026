//! streamfn runtime: in-memory collaborators for streamfn operators
//!
//! Provides the pieces the core consumes but does not implement: a key-scoped
//! timer service, a broadcast state store, configuration and tracing setup.
//!
//! # Example
//!
//! ```ignore
//! use streamfn_core::KeyedProcessOperator;
//! use streamfn_runtime::{init_tracing, RuntimeConfig};
//!
//! let config = RuntimeConfig::load("streamfn.yaml")?;
//! init_tracing(&config.log_filter)?;
//!
//! let timers = config.timer_service::<String>();
//! let mut op = KeyedProcessOperator::new(SessionTimeout::default(), timers.clone());
//! op.open()?;
//! op.process_element("user-1".to_string(), click, Some(1_000))?;
//! for timer in timers.advance_watermark(31_000) {
//!     op.on_timer(timer)?;
//! }
//! ```

pub mod config;
pub mod error;
pub mod state;
pub mod telemetry;
pub mod timers;

pub use config::RuntimeConfig;
pub use error::RuntimeError;
pub use state::{HeapBroadcastState, HeapOperatorStateStore};
pub use telemetry::init_tracing;
pub use timers::{ClockMode, HeapTimerService};
