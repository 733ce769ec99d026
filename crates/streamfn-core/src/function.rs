//! Function Traits: the contracts user code implements
//!
//! Every function category gets exactly the context its role allows. Only
//! `BroadcastProcessFunction::process_broadcast_element` receives a context
//! that can mutate broadcast state.
use crate::context::{
    BroadcastProcessContext, KeyedOnTimerContext, KeyedProcessContext, ProcessContext,
    ReadOnlyBroadcastProcessContext,
};
use crate::error::StreamFnError;

/// Output buffer handed to every callback.
#[derive(Debug)]
pub struct Collector<O> {
    buffer: Vec<O>,
}

impl<O> Collector<O> {
    pub(crate) fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn collect(&mut self, value: O) {
        self.buffer.push(value);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub(crate) fn take(&mut self) -> Vec<O> {
        std::mem::take(&mut self.buffer)
    }
}

/// Function over a non-keyed stream.
pub trait ProcessFunction: Send {
    type In;
    type Out;

    /// Name used in logs (default: the type name)
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn open(&mut self) -> Result<(), StreamFnError> {
        Ok(())
    }

    fn process_element(
        &mut self,
        value: Self::In,
        ctx: &ProcessContext,
        out: &mut Collector<Self::Out>,
    ) -> Result<(), StreamFnError>;

    fn close(&mut self) -> Result<(), StreamFnError> {
        Ok(())
    }
}

/// Function over two connected non-keyed streams.
pub trait CoProcessFunction: Send {
    type In1;
    type In2;
    type Out;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn open(&mut self) -> Result<(), StreamFnError> {
        Ok(())
    }

    fn process_element1(
        &mut self,
        value: Self::In1,
        ctx: &ProcessContext,
        out: &mut Collector<Self::Out>,
    ) -> Result<(), StreamFnError>;

    fn process_element2(
        &mut self,
        value: Self::In2,
        ctx: &ProcessContext,
        out: &mut Collector<Self::Out>,
    ) -> Result<(), StreamFnError>;

    fn close(&mut self) -> Result<(), StreamFnError> {
        Ok(())
    }
}

/// Function over a keyed stream, with timers.
pub trait KeyedProcessFunction<K>: Send {
    type In;
    type Out;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn open(&mut self) -> Result<(), StreamFnError> {
        Ok(())
    }

    fn process_element(
        &mut self,
        value: Self::In,
        ctx: &KeyedProcessContext<K>,
        out: &mut Collector<Self::Out>,
    ) -> Result<(), StreamFnError>;

    /// Called when a timer registered through the timer service fires.
    fn on_timer(
        &mut self,
        _timestamp: i64,
        _ctx: &KeyedOnTimerContext<K>,
        _out: &mut Collector<Self::Out>,
    ) -> Result<(), StreamFnError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), StreamFnError> {
        Ok(())
    }
}

/// Function over two connected keyed streams, with timers.
pub trait KeyedCoProcessFunction<K>: Send {
    type In1;
    type In2;
    type Out;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn open(&mut self) -> Result<(), StreamFnError> {
        Ok(())
    }

    fn process_element1(
        &mut self,
        value: Self::In1,
        ctx: &KeyedProcessContext<K>,
        out: &mut Collector<Self::Out>,
    ) -> Result<(), StreamFnError>;

    fn process_element2(
        &mut self,
        value: Self::In2,
        ctx: &KeyedProcessContext<K>,
        out: &mut Collector<Self::Out>,
    ) -> Result<(), StreamFnError>;

    fn on_timer(
        &mut self,
        _timestamp: i64,
        _ctx: &KeyedOnTimerContext<K>,
        _out: &mut Collector<Self::Out>,
    ) -> Result<(), StreamFnError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), StreamFnError> {
        Ok(())
    }
}

/// Function over a non-keyed stream connected to a broadcast stream.
///
/// Elements of the broadcast stream may update broadcast state; elements of
/// the regular stream can only read it.
pub trait BroadcastProcessFunction<S>: Send {
    type In;
    type BroadcastIn;
    type Out;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn open(&mut self) -> Result<(), StreamFnError> {
        Ok(())
    }

    fn process_element(
        &mut self,
        value: Self::In,
        ctx: &ReadOnlyBroadcastProcessContext<S>,
        out: &mut Collector<Self::Out>,
    ) -> Result<(), StreamFnError>;

    fn process_broadcast_element(
        &mut self,
        value: Self::BroadcastIn,
        ctx: &BroadcastProcessContext<S>,
        out: &mut Collector<Self::Out>,
    ) -> Result<(), StreamFnError>;

    fn close(&mut self) -> Result<(), StreamFnError> {
        Ok(())
    }
}
