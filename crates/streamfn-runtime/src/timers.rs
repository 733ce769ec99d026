//! Heap Timer Service: in-memory key-scoped timer queues
//!
//! Timers are kept per domain, ordered by timestamp and deduplicated per
//! (timestamp, key). Whoever owns the service decides when time advances and
//! feeds the returned timers into the operator's `on_timer`.
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use streamfn_core::{KeyedTimerService, TimeDomain, Timer, TimerError, TimerService};
use tracing::{trace, warn};

/// Source of processing time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockMode {
    /// Wall clock, milliseconds since the Unix epoch.
    #[default]
    System,
    /// Only moves through `advance_processing_time`.
    Manual,
}

struct TimerQueues<K> {
    current_key: Option<K>,
    watermark: i64,
    manual_time: i64,
    event_time: BTreeSet<(i64, K)>,
    processing_time: BTreeSet<(i64, K)>,
}

impl<K: Ord> TimerQueues<K> {
    fn queue(&mut self, domain: TimeDomain) -> &mut BTreeSet<(i64, K)> {
        match domain {
            TimeDomain::EventTime => &mut self.event_time,
            TimeDomain::ProcessingTime => &mut self.processing_time,
        }
    }

    fn pop_due(&mut self, domain: TimeDomain, until: i64) -> Vec<Timer<K>> {
        let queue = self.queue(domain);
        let mut due = Vec::new();
        while queue.first().is_some_and(|(ts, _)| *ts <= until) {
            if let Some((timestamp, key)) = queue.pop_first() {
                due.push(Timer { key, timestamp, domain });
            }
        }
        due
    }
}

pub struct HeapTimerService<K> {
    clock: ClockMode,
    queues: Mutex<TimerQueues<K>>,
}

impl<K> HeapTimerService<K>
where
    K: Ord + Clone + Send + 'static,
{
    pub fn new(clock: ClockMode) -> Self {
        Self {
            clock,
            queues: Mutex::new(TimerQueues {
                current_key: None,
                watermark: i64::MIN,
                manual_time: 0,
                event_time: BTreeSet::new(),
                processing_time: BTreeSet::new(),
            }),
        }
    }

    /// Service with a manual clock starting at 0.
    pub fn manual() -> Self {
        Self::new(ClockMode::Manual)
    }

    pub fn clock(&self) -> ClockMode {
        self.clock
    }

    fn lock(&self) -> MutexGuard<'_, TimerQueues<K>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves the watermark forward and returns the event-time timers it
    /// passed, earliest first. A watermark behind the current one is ignored.
    pub fn advance_watermark(&self, watermark: i64) -> Vec<Timer<K>> {
        let mut queues = self.lock();
        if watermark < queues.watermark {
            warn!(watermark, current = queues.watermark, "ignoring watermark regression");
            return Vec::new();
        }
        queues.watermark = watermark;
        let due = queues.pop_due(TimeDomain::EventTime, watermark);
        trace!(watermark, fired = due.len(), "watermark advanced");
        due
    }

    /// Moves the manual clock forward and returns the processing-time timers
    /// now due. With the system clock the argument is capped at the wall
    /// clock, so a timer still ahead of real time never fires early.
    pub fn advance_processing_time(&self, time: i64) -> Vec<Timer<K>> {
        if self.clock == ClockMode::System {
            let until = time.min(self.current_processing_time());
            return self.lock().pop_due(TimeDomain::ProcessingTime, until);
        }
        let mut queues = self.lock();
        if time < queues.manual_time {
            warn!(time, current = queues.manual_time, "ignoring processing time regression");
            return Vec::new();
        }
        queues.manual_time = time;
        queues.pop_due(TimeDomain::ProcessingTime, time)
    }

    /// Processing-time timers due at the service's own current time.
    pub fn fire_due_processing_timers(&self) -> Vec<Timer<K>> {
        let now = self.current_processing_time();
        self.lock().pop_due(TimeDomain::ProcessingTime, now)
    }

    pub fn pending_timers(&self, domain: TimeDomain) -> usize {
        self.lock().queue(domain).len()
    }

    fn register(&self, domain: TimeDomain, timestamp: i64) -> Result<(), TimerError> {
        let mut queues = self.lock();
        let Some(key) = queues.current_key.clone() else {
            warn!(%domain, timestamp, "timer registration without key scope");
            return Err(TimerError::MissingKeyContext);
        };
        queues.queue(domain).insert((timestamp, key));
        Ok(())
    }

    fn delete(&self, domain: TimeDomain, timestamp: i64) -> Result<(), TimerError> {
        let mut queues = self.lock();
        let Some(key) = queues.current_key.clone() else {
            return Err(TimerError::MissingKeyContext);
        };
        queues.queue(domain).remove(&(timestamp, key));
        Ok(())
    }
}

impl<K> TimerService for HeapTimerService<K>
where
    K: Ord + Clone + Send + 'static,
{
    fn current_processing_time(&self) -> i64 {
        match self.clock {
            ClockMode::System => chrono::Utc::now().timestamp_millis(),
            ClockMode::Manual => self.lock().manual_time,
        }
    }

    fn current_watermark(&self) -> i64 {
        self.lock().watermark
    }

    fn register_processing_time_timer(&self, timestamp: i64) -> Result<(), TimerError> {
        self.register(TimeDomain::ProcessingTime, timestamp)
    }

    fn register_event_time_timer(&self, timestamp: i64) -> Result<(), TimerError> {
        self.register(TimeDomain::EventTime, timestamp)
    }

    fn delete_processing_time_timer(&self, timestamp: i64) -> Result<(), TimerError> {
        self.delete(TimeDomain::ProcessingTime, timestamp)
    }

    fn delete_event_time_timer(&self, timestamp: i64) -> Result<(), TimerError> {
        self.delete(TimeDomain::EventTime, timestamp)
    }
}

impl<K> KeyedTimerService<K> for HeapTimerService<K>
where
    K: Ord + Clone + Send + 'static,
{
    fn set_current_key(&self, key: &K) {
        self.lock().current_key = Some(key.clone());
    }

    fn clear_current_key(&self) {
        self.lock().current_key = None;
    }
}
