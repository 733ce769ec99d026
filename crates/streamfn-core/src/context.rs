//! Execution Contexts: per-invocation state handed to user functions
//!
//! Each operator owns its contexts for its whole lifetime and overwrites the
//! transient fields right before every call into user code. User code only
//! ever sees `&Context`, and setters are crate-private, so the operator is the
//! single writer. Values read outside the current invocation are stale.
use std::sync::Arc;

use crate::state::{
    BroadcastState, MapStateDescriptor, OperatorStateStore, ReadOnlyBroadcastView, StateError,
    StateKey, StateValue,
};
use crate::time::TimeDomain;
use crate::timer::TimerService;

/// Fields every context carries.
struct TimerScope {
    timer_service: Arc<dyn TimerService>,
    timestamp: Option<i64>,
}

impl TimerScope {
    fn new(timer_service: Arc<dyn TimerService>) -> Self {
        Self { timer_service, timestamp: None }
    }
}

/// Fields of keyed contexts.
struct KeyScope<K> {
    timer: TimerScope,
    current_key: Option<K>,
}

impl<K> KeyScope<K> {
    fn new(timer_service: Arc<dyn TimerService>) -> Self {
        Self { timer: TimerScope::new(timer_service), current_key: None }
    }
}

/// Context of non-keyed process and co-process functions.
pub struct ProcessContext {
    scope: TimerScope,
}

impl ProcessContext {
    pub fn new(timer_service: Arc<dyn TimerService>) -> Self {
        Self { scope: TimerScope::new(timer_service) }
    }

    pub fn timer_service(&self) -> &dyn TimerService {
        self.scope.timer_service.as_ref()
    }

    /// Event timestamp of the element being processed.
    pub fn timestamp(&self) -> Option<i64> {
        self.scope.timestamp
    }

    pub(crate) fn set_timestamp(&mut self, timestamp: Option<i64>) {
        self.scope.timestamp = timestamp;
    }
}

/// Context of keyed process and keyed co-process functions while processing
/// an element.
///
/// Functions only ever borrow it for the duration of a callback:
///
/// ```compile_fail
/// use streamfn_core::KeyedProcessContext;
///
/// fn keep(ctx: &KeyedProcessContext<String>) -> KeyedProcessContext<String> {
///     ctx.clone()
/// }
/// ```
pub struct KeyedProcessContext<K> {
    scope: KeyScope<K>,
}

impl<K> KeyedProcessContext<K> {
    pub fn new(timer_service: Arc<dyn TimerService>) -> Self {
        Self { scope: KeyScope::new(timer_service) }
    }

    /// Key of the element being processed.
    pub fn get_current_key(&self) -> Option<&K> {
        self.scope.current_key.as_ref()
    }

    pub fn timer_service(&self) -> &dyn TimerService {
        self.scope.timer.timer_service.as_ref()
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.scope.timer.timestamp
    }

    pub(crate) fn set_current_key(&mut self, key: K) {
        self.scope.current_key = Some(key);
    }

    pub(crate) fn set_timestamp(&mut self, timestamp: Option<i64>) {
        self.scope.timer.timestamp = timestamp;
    }
}

/// Context of `on_timer` callbacks of keyed functions.
///
/// `timestamp()` is the timestamp the firing timer was registered for.
pub struct KeyedOnTimerContext<K> {
    scope: KeyScope<K>,
    time_domain: Option<TimeDomain>,
}

impl<K> KeyedOnTimerContext<K> {
    pub fn new(timer_service: Arc<dyn TimerService>) -> Self {
        Self { scope: KeyScope::new(timer_service), time_domain: None }
    }

    /// Key the firing timer was registered under.
    pub fn get_current_key(&self) -> Option<&K> {
        self.scope.current_key.as_ref()
    }

    pub fn timer_service(&self) -> &dyn TimerService {
        self.scope.timer.timer_service.as_ref()
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.scope.timer.timestamp
    }

    /// Domain of the firing timer.
    pub fn time_domain(&self) -> Option<TimeDomain> {
        self.time_domain
    }

    pub(crate) fn set_current_key(&mut self, key: K) {
        self.scope.current_key = Some(key);
    }

    pub(crate) fn set_timestamp(&mut self, timestamp: Option<i64>) {
        self.scope.timer.timestamp = timestamp;
    }

    pub(crate) fn set_time_domain(&mut self, time_domain: TimeDomain) {
        self.time_domain = Some(time_domain);
    }
}

/// Context of the broadcast side of a broadcast process function. The only
/// context that can mutate broadcast state.
pub struct BroadcastProcessContext<S> {
    scope: TimerScope,
    state_store: Arc<S>,
}

impl<S: OperatorStateStore> BroadcastProcessContext<S> {
    pub fn new(timer_service: Arc<dyn TimerService>, state_store: Arc<S>) -> Self {
        Self { scope: TimerScope::new(timer_service), state_store }
    }

    pub fn timer_service(&self) -> &dyn TimerService {
        self.scope.timer_service.as_ref()
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.scope.timestamp
    }

    pub fn current_processing_time(&self) -> i64 {
        self.scope.timer_service.current_processing_time()
    }

    pub fn current_watermark(&self) -> i64 {
        self.scope.timer_service.current_watermark()
    }

    pub fn get_broadcast_state<K: StateKey, V: StateValue>(
        &self,
        descriptor: &MapStateDescriptor<K, V>,
    ) -> Result<Arc<dyn BroadcastState<K, V>>, StateError> {
        self.state_store.get_broadcast_state(descriptor)
    }

    pub(crate) fn set_timestamp(&mut self, timestamp: Option<i64>) {
        self.scope.timestamp = timestamp;
    }
}

/// Context of the non-broadcast side of a broadcast process function.
pub struct ReadOnlyBroadcastProcessContext<S> {
    scope: TimerScope,
    state_store: Arc<S>,
}

impl<S: OperatorStateStore> ReadOnlyBroadcastProcessContext<S> {
    pub fn new(timer_service: Arc<dyn TimerService>, state_store: Arc<S>) -> Self {
        Self { scope: TimerScope::new(timer_service), state_store }
    }

    pub fn timer_service(&self) -> &dyn TimerService {
        self.scope.timer_service.as_ref()
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.scope.timestamp
    }

    pub fn current_processing_time(&self) -> i64 {
        self.scope.timer_service.current_processing_time()
    }

    pub fn current_watermark(&self) -> i64 {
        self.scope.timer_service.current_watermark()
    }

    /// Resolves the same instance the broadcast side writes to.
    ///
    /// The returned view cannot be written through:
    ///
    /// ```compile_fail
    /// use streamfn_core::{
    ///     BroadcastState, MapStateDescriptor, OperatorStateStore,
    ///     ReadOnlyBroadcastProcessContext, StreamFnError,
    /// };
    ///
    /// fn tamper<S: OperatorStateStore>(
    ///     ctx: &ReadOnlyBroadcastProcessContext<S>,
    ///     rules: &MapStateDescriptor<String, i64>,
    /// ) -> Result<(), StreamFnError> {
    ///     ctx.get_broadcast_state(rules)?.put("x".to_string(), 1);
    ///     Ok(())
    /// }
    /// ```
    pub fn get_broadcast_state<K: StateKey, V: StateValue>(
        &self,
        descriptor: &MapStateDescriptor<K, V>,
    ) -> Result<ReadOnlyBroadcastView<K, V>, StateError> {
        self.state_store
            .get_broadcast_state(descriptor)
            .map(ReadOnlyBroadcastView::new)
    }

    pub(crate) fn set_timestamp(&mut self, timestamp: Option<i64>) {
        self.scope.timestamp = timestamp;
    }
}
