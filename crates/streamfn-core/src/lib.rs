//! streamfn core: execution contexts for keyed and broadcast process functions
//!
//! Each user function category receives its own context type exposing exactly
//! what that role may use:
//!
//! ```text
//! ProcessFunction / CoProcessFunction           → ProcessContext
//! KeyedProcessFunction / KeyedCoProcessFunction → KeyedProcessContext, KeyedOnTimerContext
//! BroadcastProcessFunction (regular side)       → ReadOnlyBroadcastProcessContext
//! BroadcastProcessFunction (broadcast side)     → BroadcastProcessContext
//! ```
//!
//! Operators in [`operator`] own the contexts and fill in key, timestamp and
//! time domain before every call into user code.
//!
//! # Example
//!
//! ```ignore
//! use streamfn_core::{KeyedProcessOperator, Timer};
//!
//! let mut op = KeyedProcessOperator::new(MyFunction::default(), timers.clone());
//! op.open()?;
//! let out = op.process_element("user-1", event, Some(1_700_000_000_000))?;
//! for timer in timers.advance_watermark(1_700_000_060_000) {
//!     let fired = op.on_timer(timer)?;
//! }
//! ```

pub mod context;
pub mod error;
pub mod function;
pub mod metrics;
pub mod operator;
pub mod state;
pub mod time;
pub mod timer;

pub use context::{
    BroadcastProcessContext, KeyedOnTimerContext, KeyedProcessContext, ProcessContext,
    ReadOnlyBroadcastProcessContext,
};
pub use error::StreamFnError;
pub use function::{
    BroadcastProcessFunction, CoProcessFunction, Collector, KeyedCoProcessFunction,
    KeyedProcessFunction, ProcessFunction,
};
pub use metrics::OperatorMetrics;
pub use operator::{
    BroadcastProcessOperator, CoProcessOperator, KeyedCoProcessOperator, KeyedProcessOperator,
    OperatorPhase, ProcessOperator,
};
pub use state::{
    BroadcastState, MapStateDescriptor, OperatorStateStore, ReadOnlyBroadcastState,
    ReadOnlyBroadcastView, StateError, StateKey, StateValue,
};
pub use time::{TimeDomain, Timer};
pub use timer::{KeyedTimerService, TimerError, TimerService};
