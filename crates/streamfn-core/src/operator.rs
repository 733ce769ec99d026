//! Operators: drive user functions through their long-lived contexts
//!
//! An operator owns one function instance and the contexts it hands to it.
//! Every entry point writes all transient context fields first and only then
//! calls into user code, so a function never observes a value left over from
//! a previous invocation.
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::context::{
    BroadcastProcessContext, KeyedOnTimerContext, KeyedProcessContext, ProcessContext,
    ReadOnlyBroadcastProcessContext,
};
use crate::error::StreamFnError;
use crate::function::{
    BroadcastProcessFunction, CoProcessFunction, Collector, KeyedCoProcessFunction,
    KeyedProcessFunction, ProcessFunction,
};
use crate::metrics::OperatorMetrics;
use crate::state::OperatorStateStore;
use crate::time::Timer;
use crate::timer::{KeyedTimerService, TimerService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorPhase {
    Created,
    Running,
    Closed,
}

/// Lifecycle and counters shared by all operators.
struct OperatorCore {
    operator_id: Uuid,
    phase: OperatorPhase,
    metrics: OperatorMetrics,
}

impl OperatorCore {
    fn new() -> Self {
        Self {
            operator_id: Uuid::new_v4(),
            phase: OperatorPhase::Created,
            metrics: OperatorMetrics::default(),
        }
    }

    fn open(
        &mut self,
        function: &str,
        open: impl FnOnce() -> Result<(), StreamFnError>,
    ) -> Result<(), StreamFnError> {
        if self.phase != OperatorPhase::Created {
            return Err(StreamFnError::Lifecycle(format!(
                "operator {} cannot be opened while {:?}",
                self.operator_id, self.phase
            )));
        }
        debug!(operator_id = %self.operator_id, function, "opening operator");
        open()?;
        self.phase = OperatorPhase::Running;
        Ok(())
    }

    fn close(
        &mut self,
        function: &str,
        close: impl FnOnce() -> Result<(), StreamFnError>,
    ) -> Result<(), StreamFnError> {
        let was_running = self.phase == OperatorPhase::Running;
        if self.phase == OperatorPhase::Closed {
            return Ok(());
        }
        self.phase = OperatorPhase::Closed;
        debug!(
            operator_id = %self.operator_id,
            function,
            invocations = self.metrics.invocations(),
            "closing operator"
        );
        if was_running {
            close()?;
        }
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), StreamFnError> {
        match self.phase {
            OperatorPhase::Running => Ok(()),
            phase => Err(StreamFnError::Lifecycle(format!(
                "operator {} is {:?}, not running",
                self.operator_id, phase
            ))),
        }
    }

    /// Hands out the buffered outputs of a successful callback. Outputs of a
    /// failed callback are dropped.
    fn finish<O>(
        &mut self,
        out: &mut Collector<O>,
        result: Result<(), StreamFnError>,
    ) -> Result<Vec<O>, StreamFnError> {
        let emitted = out.take();
        match result {
            Ok(()) => {
                self.metrics.records_out += emitted.len() as u64;
                Ok(emitted)
            }
            Err(e) => {
                self.metrics.failures += 1;
                warn!(
                    operator_id = %self.operator_id,
                    error = %e,
                    discarded = emitted.len(),
                    "function callback failed"
                );
                Err(e)
            }
        }
    }
}

/// Drives a [`ProcessFunction`].
pub struct ProcessOperator<F: ProcessFunction> {
    core: OperatorCore,
    function: F,
    ctx: ProcessContext,
    out: Collector<F::Out>,
}

impl<F: ProcessFunction> ProcessOperator<F> {
    pub fn new(function: F, timer_service: Arc<dyn TimerService>) -> Self {
        Self {
            core: OperatorCore::new(),
            function,
            ctx: ProcessContext::new(timer_service),
            out: Collector::new(),
        }
    }

    pub fn operator_id(&self) -> Uuid {
        self.core.operator_id
    }

    pub fn phase(&self) -> OperatorPhase {
        self.core.phase
    }

    pub fn metrics(&self) -> &OperatorMetrics {
        &self.core.metrics
    }

    pub fn function(&self) -> &F {
        &self.function
    }

    pub fn open(&mut self) -> Result<(), StreamFnError> {
        self.core.open(self.function.name(), || self.function.open())
    }

    pub fn close(&mut self) -> Result<(), StreamFnError> {
        self.core.close(self.function.name(), || self.function.close())
    }

    pub fn process_element(
        &mut self,
        value: F::In,
        timestamp: Option<i64>,
    ) -> Result<Vec<F::Out>, StreamFnError> {
        self.core.ensure_running()?;
        self.core.metrics.records_in += 1;
        self.ctx.set_timestamp(timestamp);
        trace!(operator_id = %self.core.operator_id, ?timestamp, "process_element");
        let result = self.function.process_element(value, &self.ctx, &mut self.out);
        self.core.finish(&mut self.out, result)
    }
}

/// Drives a [`CoProcessFunction`]. Both inputs share one context.
pub struct CoProcessOperator<F: CoProcessFunction> {
    core: OperatorCore,
    function: F,
    ctx: ProcessContext,
    out: Collector<F::Out>,
}

impl<F: CoProcessFunction> CoProcessOperator<F> {
    pub fn new(function: F, timer_service: Arc<dyn TimerService>) -> Self {
        Self {
            core: OperatorCore::new(),
            function,
            ctx: ProcessContext::new(timer_service),
            out: Collector::new(),
        }
    }

    pub fn operator_id(&self) -> Uuid {
        self.core.operator_id
    }

    pub fn phase(&self) -> OperatorPhase {
        self.core.phase
    }

    pub fn metrics(&self) -> &OperatorMetrics {
        &self.core.metrics
    }

    pub fn function(&self) -> &F {
        &self.function
    }

    pub fn open(&mut self) -> Result<(), StreamFnError> {
        self.core.open(self.function.name(), || self.function.open())
    }

    pub fn close(&mut self) -> Result<(), StreamFnError> {
        self.core.close(self.function.name(), || self.function.close())
    }

    pub fn process_element1(
        &mut self,
        value: F::In1,
        timestamp: Option<i64>,
    ) -> Result<Vec<F::Out>, StreamFnError> {
        self.core.ensure_running()?;
        self.core.metrics.records_in += 1;
        self.ctx.set_timestamp(timestamp);
        trace!(operator_id = %self.core.operator_id, ?timestamp, "process_element1");
        let result = self.function.process_element1(value, &self.ctx, &mut self.out);
        self.core.finish(&mut self.out, result)
    }

    pub fn process_element2(
        &mut self,
        value: F::In2,
        timestamp: Option<i64>,
    ) -> Result<Vec<F::Out>, StreamFnError> {
        self.core.ensure_running()?;
        self.core.metrics.records_in += 1;
        self.ctx.set_timestamp(timestamp);
        trace!(operator_id = %self.core.operator_id, ?timestamp, "process_element2");
        let result = self.function.process_element2(value, &self.ctx, &mut self.out);
        self.core.finish(&mut self.out, result)
    }
}

/// Drives a [`KeyedProcessFunction`].
///
/// Besides the contexts, the operator switches the key scope of the timer
/// service so that timers registered by the function belong to the current
/// key. The scope is cleared again when the callback returns, whether it
/// failed or not.
pub struct KeyedProcessOperator<K, F, T>
where
    F: KeyedProcessFunction<K>,
{
    core: OperatorCore,
    function: F,
    timers: Arc<T>,
    ctx: KeyedProcessContext<K>,
    on_timer_ctx: KeyedOnTimerContext<K>,
    out: Collector<F::Out>,
}

impl<K, F, T> KeyedProcessOperator<K, F, T>
where
    K: fmt::Debug,
    F: KeyedProcessFunction<K>,
    T: KeyedTimerService<K> + 'static,
{
    pub fn new(function: F, timers: Arc<T>) -> Self {
        let service: Arc<dyn TimerService> = timers.clone();
        Self {
            core: OperatorCore::new(),
            function,
            timers,
            ctx: KeyedProcessContext::new(service.clone()),
            on_timer_ctx: KeyedOnTimerContext::new(service),
            out: Collector::new(),
        }
    }

    pub fn operator_id(&self) -> Uuid {
        self.core.operator_id
    }

    pub fn phase(&self) -> OperatorPhase {
        self.core.phase
    }

    pub fn metrics(&self) -> &OperatorMetrics {
        &self.core.metrics
    }

    pub fn function(&self) -> &F {
        &self.function
    }

    pub fn open(&mut self) -> Result<(), StreamFnError> {
        self.core.open(self.function.name(), || self.function.open())
    }

    pub fn close(&mut self) -> Result<(), StreamFnError> {
        self.core.close(self.function.name(), || self.function.close())
    }

    pub fn process_element(
        &mut self,
        key: K,
        value: F::In,
        timestamp: Option<i64>,
    ) -> Result<Vec<F::Out>, StreamFnError> {
        self.core.ensure_running()?;
        self.core.metrics.records_in += 1;
        trace!(operator_id = %self.core.operator_id, ?key, ?timestamp, "process_element");
        self.timers.set_current_key(&key);
        self.ctx.set_current_key(key);
        self.ctx.set_timestamp(timestamp);
        let result = self.function.process_element(value, &self.ctx, &mut self.out);
        self.timers.clear_current_key();
        self.core.finish(&mut self.out, result)
    }

    /// Delivers a due timer to the function's `on_timer`.
    pub fn on_timer(&mut self, timer: Timer<K>) -> Result<Vec<F::Out>, StreamFnError> {
        self.core.ensure_running()?;
        self.core.metrics.timers_fired += 1;
        let Timer { key, timestamp, domain } = timer;
        debug!(operator_id = %self.core.operator_id, ?key, timestamp, %domain, "timer fired");
        self.timers.set_current_key(&key);
        self.on_timer_ctx.set_current_key(key);
        self.on_timer_ctx.set_timestamp(Some(timestamp));
        self.on_timer_ctx.set_time_domain(domain);
        let result = self.function.on_timer(timestamp, &self.on_timer_ctx, &mut self.out);
        self.timers.clear_current_key();
        self.core.finish(&mut self.out, result)
    }
}

/// Drives a [`KeyedCoProcessFunction`].
pub struct KeyedCoProcessOperator<K, F, T>
where
    F: KeyedCoProcessFunction<K>,
{
    core: OperatorCore,
    function: F,
    timers: Arc<T>,
    ctx: KeyedProcessContext<K>,
    on_timer_ctx: KeyedOnTimerContext<K>,
    out: Collector<F::Out>,
}

impl<K, F, T> KeyedCoProcessOperator<K, F, T>
where
    K: fmt::Debug,
    F: KeyedCoProcessFunction<K>,
    T: KeyedTimerService<K> + 'static,
{
    pub fn new(function: F, timers: Arc<T>) -> Self {
        let service: Arc<dyn TimerService> = timers.clone();
        Self {
            core: OperatorCore::new(),
            function,
            timers,
            ctx: KeyedProcessContext::new(service.clone()),
            on_timer_ctx: KeyedOnTimerContext::new(service),
            out: Collector::new(),
        }
    }

    pub fn operator_id(&self) -> Uuid {
        self.core.operator_id
    }

    pub fn phase(&self) -> OperatorPhase {
        self.core.phase
    }

    pub fn metrics(&self) -> &OperatorMetrics {
        &self.core.metrics
    }

    pub fn function(&self) -> &F {
        &self.function
    }

    pub fn open(&mut self) -> Result<(), StreamFnError> {
        self.core.open(self.function.name(), || self.function.open())
    }

    pub fn close(&mut self) -> Result<(), StreamFnError> {
        self.core.close(self.function.name(), || self.function.close())
    }

    pub fn process_element1(
        &mut self,
        key: K,
        value: F::In1,
        timestamp: Option<i64>,
    ) -> Result<Vec<F::Out>, StreamFnError> {
        self.core.ensure_running()?;
        self.core.metrics.records_in += 1;
        trace!(operator_id = %self.core.operator_id, ?key, ?timestamp, "process_element1");
        self.timers.set_current_key(&key);
        self.ctx.set_current_key(key);
        self.ctx.set_timestamp(timestamp);
        let result = self.function.process_element1(value, &self.ctx, &mut self.out);
        self.timers.clear_current_key();
        self.core.finish(&mut self.out, result)
    }

    pub fn process_element2(
        &mut self,
        key: K,
        value: F::In2,
        timestamp: Option<i64>,
    ) -> Result<Vec<F::Out>, StreamFnError> {
        self.core.ensure_running()?;
        self.core.metrics.records_in += 1;
        trace!(operator_id = %self.core.operator_id, ?key, ?timestamp, "process_element2");
        self.timers.set_current_key(&key);
        self.ctx.set_current_key(key);
        self.ctx.set_timestamp(timestamp);
        let result = self.function.process_element2(value, &self.ctx, &mut self.out);
        self.timers.clear_current_key();
        self.core.finish(&mut self.out, result)
    }

    pub fn on_timer(&mut self, timer: Timer<K>) -> Result<Vec<F::Out>, StreamFnError> {
        self.core.ensure_running()?;
        self.core.metrics.timers_fired += 1;
        let Timer { key, timestamp, domain } = timer;
        debug!(operator_id = %self.core.operator_id, ?key, timestamp, %domain, "timer fired");
        self.timers.set_current_key(&key);
        self.on_timer_ctx.set_current_key(key);
        self.on_timer_ctx.set_timestamp(Some(timestamp));
        self.on_timer_ctx.set_time_domain(domain);
        let result = self.function.on_timer(timestamp, &self.on_timer_ctx, &mut self.out);
        self.timers.clear_current_key();
        self.core.finish(&mut self.out, result)
    }
}

/// Drives a [`BroadcastProcessFunction`].
///
/// Regular elements are handed the read-only context, broadcast elements the
/// mutable one. Both resolve state through the same store.
pub struct BroadcastProcessOperator<F, S>
where
    F: BroadcastProcessFunction<S>,
{
    core: OperatorCore,
    function: F,
    broadcast_ctx: BroadcastProcessContext<S>,
    read_only_ctx: ReadOnlyBroadcastProcessContext<S>,
    out: Collector<F::Out>,
}

impl<F, S> BroadcastProcessOperator<F, S>
where
    F: BroadcastProcessFunction<S>,
    S: OperatorStateStore,
{
    pub fn new(function: F, timer_service: Arc<dyn TimerService>, state_store: Arc<S>) -> Self {
        Self {
            core: OperatorCore::new(),
            function,
            broadcast_ctx: BroadcastProcessContext::new(timer_service.clone(), state_store.clone()),
            read_only_ctx: ReadOnlyBroadcastProcessContext::new(timer_service, state_store),
            out: Collector::new(),
        }
    }

    pub fn operator_id(&self) -> Uuid {
        self.core.operator_id
    }

    pub fn phase(&self) -> OperatorPhase {
        self.core.phase
    }

    pub fn metrics(&self) -> &OperatorMetrics {
        &self.core.metrics
    }

    pub fn function(&self) -> &F {
        &self.function
    }

    pub fn open(&mut self) -> Result<(), StreamFnError> {
        self.core.open(self.function.name(), || self.function.open())
    }

    pub fn close(&mut self) -> Result<(), StreamFnError> {
        self.core.close(self.function.name(), || self.function.close())
    }

    pub fn process_element(
        &mut self,
        value: F::In,
        timestamp: Option<i64>,
    ) -> Result<Vec<F::Out>, StreamFnError> {
        self.core.ensure_running()?;
        self.core.metrics.records_in += 1;
        self.read_only_ctx.set_timestamp(timestamp);
        trace!(operator_id = %self.core.operator_id, ?timestamp, "process_element");
        let result = self
            .function
            .process_element(value, &self.read_only_ctx, &mut self.out);
        self.core.finish(&mut self.out, result)
    }

    pub fn process_broadcast_element(
        &mut self,
        value: F::BroadcastIn,
        timestamp: Option<i64>,
    ) -> Result<Vec<F::Out>, StreamFnError> {
        self.core.ensure_running()?;
        self.core.metrics.broadcast_records_in += 1;
        self.broadcast_ctx.set_timestamp(timestamp);
        trace!(operator_id = %self.core.operator_id, ?timestamp, "process_broadcast_element");
        let result = self
            .function
            .process_broadcast_element(value, &self.broadcast_ctx, &mut self.out);
        self.core.finish(&mut self.out, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::{FixedClock, MapStore};
    use crate::state::{MapStateDescriptor, ReadOnlyBroadcastState};
    use crate::time::TimeDomain;
    use crate::timer::TimerError;
    use std::sync::Mutex;

    /// Timer service that records registrations under the current key.
    #[derive(Default)]
    struct ScopedTimers {
        current_key: Mutex<Option<&'static str>>,
        registered: Mutex<Vec<(&'static str, TimeDomain, i64)>>,
    }

    impl ScopedTimers {
        fn register(&self, domain: TimeDomain, timestamp: i64) -> Result<(), TimerError> {
            let key = self.current_key.lock().unwrap().ok_or(TimerError::MissingKeyContext)?;
            self.registered.lock().unwrap().push((key, domain, timestamp));
            Ok(())
        }
    }

    impl TimerService for ScopedTimers {
        fn current_processing_time(&self) -> i64 {
            0
        }
        fn current_watermark(&self) -> i64 {
            i64::MIN
        }
        fn register_processing_time_timer(&self, timestamp: i64) -> Result<(), TimerError> {
            self.register(TimeDomain::ProcessingTime, timestamp)
        }
        fn register_event_time_timer(&self, timestamp: i64) -> Result<(), TimerError> {
            self.register(TimeDomain::EventTime, timestamp)
        }
        fn delete_processing_time_timer(&self, _timestamp: i64) -> Result<(), TimerError> {
            Ok(())
        }
        fn delete_event_time_timer(&self, _timestamp: i64) -> Result<(), TimerError> {
            Ok(())
        }
    }

    impl KeyedTimerService<&'static str> for ScopedTimers {
        fn set_current_key(&self, key: &&'static str) {
            *self.current_key.lock().unwrap() = Some(*key);
        }

        fn clear_current_key(&self) {
            *self.current_key.lock().unwrap() = None;
        }
    }

    /// Echoes what the context shows, registers a timer 10ms after each element.
    struct Echo;

    impl KeyedProcessFunction<&'static str> for Echo {
        type In = i32;
        type Out = String;

        fn process_element(
            &mut self,
            value: i32,
            ctx: &KeyedProcessContext<&'static str>,
            out: &mut Collector<String>,
        ) -> Result<(), StreamFnError> {
            let key = ctx.get_current_key().copied().unwrap_or("?");
            out.collect(format!("{key}:{value}@{:?}", ctx.timestamp()));
            if let Some(ts) = ctx.timestamp() {
                ctx.timer_service().register_event_time_timer(ts + 10)?;
            }
            Ok(())
        }

        fn on_timer(
            &mut self,
            timestamp: i64,
            ctx: &KeyedOnTimerContext<&'static str>,
            out: &mut Collector<String>,
        ) -> Result<(), StreamFnError> {
            let key = ctx.get_current_key().copied().unwrap_or("?");
            let domain = ctx.time_domain().map(|d| d.to_string()).unwrap_or_default();
            out.collect(format!("timer {key}@{timestamp} {domain}"));
            Ok(())
        }
    }

    /// Registers an event timer `value` ms after each element (negative
    /// values fail) and re-arms a processing timer on every firing.
    struct Rearm;

    impl KeyedProcessFunction<&'static str> for Rearm {
        type In = i64;
        type Out = String;

        fn process_element(
            &mut self,
            value: i64,
            ctx: &KeyedProcessContext<&'static str>,
            _out: &mut Collector<String>,
        ) -> Result<(), StreamFnError> {
            if value < 0 {
                return Err(StreamFnError::function("negative delay"));
            }
            let ts = ctx.timestamp().unwrap_or_default();
            ctx.timer_service().register_event_time_timer(ts + value)?;
            Ok(())
        }

        fn on_timer(
            &mut self,
            timestamp: i64,
            ctx: &KeyedOnTimerContext<&'static str>,
            _out: &mut Collector<String>,
        ) -> Result<(), StreamFnError> {
            ctx.timer_service().register_processing_time_timer(timestamp)?;
            Ok(())
        }
    }

    impl KeyedCoProcessFunction<&'static str> for Rearm {
        type In1 = i64;
        type In2 = i64;
        type Out = String;

        fn process_element1(
            &mut self,
            value: i64,
            ctx: &KeyedProcessContext<&'static str>,
            out: &mut Collector<String>,
        ) -> Result<(), StreamFnError> {
            let key = ctx.get_current_key().copied().unwrap_or("?");
            out.collect(format!("1 {key}@{:?}", ctx.timestamp()));
            if let Some(ts) = ctx.timestamp() {
                ctx.timer_service().register_event_time_timer(ts + value)?;
            }
            Ok(())
        }

        fn process_element2(
            &mut self,
            value: i64,
            ctx: &KeyedProcessContext<&'static str>,
            out: &mut Collector<String>,
        ) -> Result<(), StreamFnError> {
            let key = ctx.get_current_key().copied().unwrap_or("?");
            out.collect(format!("2 {key}@{:?}", ctx.timestamp()));
            let now = ctx.timer_service().current_processing_time();
            ctx.timer_service().register_processing_time_timer(now + value * 10 + 10)?;
            Ok(())
        }

        fn on_timer(
            &mut self,
            timestamp: i64,
            ctx: &KeyedOnTimerContext<&'static str>,
            out: &mut Collector<String>,
        ) -> Result<(), StreamFnError> {
            let key = ctx.get_current_key().copied().unwrap_or("?");
            let domain = ctx.time_domain().map(|d| d.to_string()).unwrap_or_default();
            out.collect(format!("timer {key}@{timestamp} {domain}"));
            if ctx.time_domain() == Some(TimeDomain::EventTime) {
                ctx.timer_service().register_processing_time_timer(timestamp)?;
            }
            Ok(())
        }
    }

    struct Failing;

    impl ProcessFunction for Failing {
        type In = i32;
        type Out = i32;

        fn process_element(
            &mut self,
            value: i32,
            _ctx: &ProcessContext,
            out: &mut Collector<i32>,
        ) -> Result<(), StreamFnError> {
            out.collect(value);
            if value < 0 {
                return Err(StreamFnError::function("negative input"));
            }
            Ok(())
        }
    }

    struct Stamps;

    impl CoProcessFunction for Stamps {
        type In1 = &'static str;
        type In2 = u8;
        type Out = String;

        fn process_element1(
            &mut self,
            value: &'static str,
            ctx: &ProcessContext,
            out: &mut Collector<String>,
        ) -> Result<(), StreamFnError> {
            out.collect(format!("1:{value}@{:?}", ctx.timestamp()));
            Ok(())
        }

        fn process_element2(
            &mut self,
            value: u8,
            ctx: &ProcessContext,
            out: &mut Collector<String>,
        ) -> Result<(), StreamFnError> {
            out.collect(format!("2:{value}@{:?}", ctx.timestamp()));
            Ok(())
        }
    }

    /// Broadcast side stores rules, regular side looks them up.
    struct RuleLookup {
        rules: MapStateDescriptor<String, i64>,
    }

    impl BroadcastProcessFunction<MapStore> for RuleLookup {
        type In = String;
        type BroadcastIn = (String, i64);
        type Out = Option<i64>;

        fn process_element(
            &mut self,
            value: String,
            ctx: &ReadOnlyBroadcastProcessContext<MapStore>,
            out: &mut Collector<Option<i64>>,
        ) -> Result<(), StreamFnError> {
            out.collect(ctx.get_broadcast_state(&self.rules)?.get(&value));
            Ok(())
        }

        fn process_broadcast_element(
            &mut self,
            (name, limit): (String, i64),
            ctx: &BroadcastProcessContext<MapStore>,
            _out: &mut Collector<Option<i64>>,
        ) -> Result<(), StreamFnError> {
            ctx.get_broadcast_state(&self.rules)?.put(name, limit);
            Ok(())
        }
    }

    #[test]
    fn test_elements_rejected_before_open_and_after_close() {
        let mut op = ProcessOperator::new(Failing, Arc::new(FixedClock::default()));
        assert!(matches!(op.process_element(1, None), Err(StreamFnError::Lifecycle(_))));

        op.open().unwrap();
        assert!(op.open().is_err());
        assert_eq!(op.process_element(1, None).unwrap(), vec![1]);

        op.close().unwrap();
        op.close().unwrap();
        assert_eq!(op.phase(), OperatorPhase::Closed);
        assert!(op.process_element(1, None).is_err());
    }

    #[test]
    fn test_failed_callback_discards_buffered_output() {
        let mut op = ProcessOperator::new(Failing, Arc::new(FixedClock::default()));
        op.open().unwrap();

        let err = op.process_element(-1, Some(5)).unwrap_err();
        assert_eq!(err.to_string(), "FUNCTION/negative input");
        assert_eq!(op.process_element(2, Some(6)).unwrap(), vec![2]);

        let metrics = op.metrics();
        assert_eq!(metrics.records_in, 2);
        assert_eq!(metrics.records_out, 1);
        assert_eq!(metrics.failures, 1);
    }

    #[test]
    fn test_keyed_operator_sets_key_before_each_call() {
        let timers = Arc::new(ScopedTimers::default());
        let mut op = KeyedProcessOperator::new(Echo, timers.clone());
        op.open().unwrap();

        assert_eq!(op.process_element("k1", 7, Some(100)).unwrap(), vec!["k1:7@Some(100)"]);
        assert_eq!(op.process_element("k2", 8, Some(200)).unwrap(), vec!["k2:8@Some(200)"]);
        assert_eq!(op.process_element("k1", 9, None).unwrap(), vec!["k1:9@None"]);

        assert_eq!(
            *timers.registered.lock().unwrap(),
            vec![("k1", TimeDomain::EventTime, 110), ("k2", TimeDomain::EventTime, 210)]
        );
    }

    #[test]
    fn test_on_timer_reports_firing_domain_and_key() {
        let timers = Arc::new(ScopedTimers::default());
        let mut op = KeyedProcessOperator::new(Echo, timers.clone());
        op.open().unwrap();
        op.process_element("k1", 1, Some(100)).unwrap();

        let fired = op.on_timer(Timer::event_time("k2", 110)).unwrap();
        assert_eq!(fired, vec!["timer k2@110 EVENT_TIME"]);
        let fired = op.on_timer(Timer::processing_time("k1", 500)).unwrap();
        assert_eq!(fired, vec!["timer k1@500 PROCESSING_TIME"]);

        assert_eq!(*timers.current_key.lock().unwrap(), None);
        assert_eq!(op.metrics().timers_fired, 2);
    }

    #[test]
    fn test_key_scope_cleared_after_each_callback() {
        let timers = Arc::new(ScopedTimers::default());
        let mut op = KeyedProcessOperator::new(Rearm, timers.clone());
        op.open().unwrap();

        op.process_element("k1", 5, Some(100)).unwrap();
        assert_eq!(*timers.current_key.lock().unwrap(), None);

        // a failing callback still leaves no key behind
        assert!(op.process_element("k2", -1, Some(100)).is_err());
        assert_eq!(*timers.current_key.lock().unwrap(), None);

        // registrations made inside on_timer land under the firing key
        op.on_timer(Timer::event_time("k3", 200)).unwrap();
        assert_eq!(*timers.current_key.lock().unwrap(), None);
        assert_eq!(
            *timers.registered.lock().unwrap(),
            vec![("k1", TimeDomain::EventTime, 105), ("k3", TimeDomain::ProcessingTime, 200)]
        );
        assert_eq!(
            timers.register_event_time_timer(1),
            Err(TimerError::MissingKeyContext)
        );
    }

    #[test]
    fn test_keyed_co_on_timer_reports_firing_domain() {
        let timers = Arc::new(ScopedTimers::default());
        let mut op = KeyedCoProcessOperator::new(Rearm, timers.clone());
        op.open().unwrap();

        assert_eq!(op.process_element1("k1", 3, Some(10)).unwrap(), vec!["1 k1@Some(10)"]);
        assert_eq!(op.process_element2("k2", 4, None).unwrap(), vec!["2 k2@None"]);
        assert_eq!(*timers.current_key.lock().unwrap(), None);

        let fired = op.on_timer(Timer::processing_time("k2", 50)).unwrap();
        assert_eq!(fired, vec!["timer k2@50 PROCESSING_TIME"]);
        let fired = op.on_timer(Timer::event_time("k1", 13)).unwrap();
        assert_eq!(fired, vec!["timer k1@13 EVENT_TIME"]);
        assert_eq!(*timers.current_key.lock().unwrap(), None);

        // a later element sees its own timestamp, not the timer's
        assert_eq!(op.process_element1("k1", 0, None).unwrap(), vec!["1 k1@None"]);

        let metrics = op.metrics();
        assert_eq!(metrics.records_in, 3);
        assert_eq!(metrics.timers_fired, 2);
        assert_eq!(
            *timers.registered.lock().unwrap(),
            vec![
                ("k1", TimeDomain::EventTime, 13),
                ("k2", TimeDomain::ProcessingTime, 50),
                ("k1", TimeDomain::ProcessingTime, 13),
            ]
        );
    }

    #[test]
    fn test_co_process_inputs_share_context() {
        let mut op = CoProcessOperator::new(Stamps, Arc::new(FixedClock::default()));
        op.open().unwrap();
        assert_eq!(op.process_element1("a", Some(1)).unwrap(), vec!["1:a@Some(1)"]);
        assert_eq!(op.process_element2(2, None).unwrap(), vec!["2:2@None"]);
        assert_eq!(op.metrics().records_in, 2);
    }

    #[test]
    fn test_broadcast_writes_visible_to_regular_side() {
        let store = Arc::new(MapStore::default());
        let function = RuleLookup { rules: MapStateDescriptor::new("d1") };
        let mut op =
            BroadcastProcessOperator::new(function, Arc::new(FixedClock::default()), store);
        op.open().unwrap();

        assert_eq!(op.process_element("x".to_string(), None).unwrap(), vec![None]);
        op.process_broadcast_element(("x".to_string(), 1), Some(3)).unwrap();
        assert_eq!(op.process_element("x".to_string(), None).unwrap(), vec![Some(1)]);

        let metrics = op.metrics();
        assert_eq!(metrics.records_in, 2);
        assert_eq!(metrics.broadcast_records_in, 1);
    }
}
