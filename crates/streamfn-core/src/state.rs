//! Broadcast state contracts and the read-only projection handed to readers.
//!
//! Storage lives behind [`OperatorStateStore`]. This module only defines the
//! access contract: writers get the full [`BroadcastState`] handle, readers get
//! a [`ReadOnlyBroadcastView`] over the very same handle.
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("unknown state descriptor '{0}'")]
    UnknownDescriptor(String),

    #[error("state '{name}' was registered with different key/value types (requested {requested})")]
    TypeMismatch { name: String, requested: String },

    #[error("state backend unavailable: {0}")]
    Unavailable(String),
}

/// Bound on broadcast state keys.
pub trait StateKey: Clone + Eq + Hash + Send + Sync + 'static {}
impl<T> StateKey for T where T: Clone + Eq + Hash + Send + Sync + 'static {}

/// Bound on broadcast state values.
pub trait StateValue: Clone + Send + Sync + 'static {}
impl<T> StateValue for T where T: Clone + Send + Sync + 'static {}

/// Names a map-shaped broadcast state together with its key and value types.
pub struct MapStateDescriptor<K, V> {
    name: String,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V> MapStateDescriptor<K, V> {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), _types: PhantomData }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `"name<Key, Value>"`, used in type mismatch reports.
    pub fn type_signature(&self) -> String {
        format!(
            "{}<{}, {}>",
            self.name,
            std::any::type_name::<K>(),
            std::any::type_name::<V>()
        )
    }
}

impl<K, V> Clone for MapStateDescriptor<K, V> {
    fn clone(&self) -> Self {
        Self::new(self.name.clone())
    }
}

impl<K, V> fmt::Debug for MapStateDescriptor<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MapStateDescriptor")
            .field("name", &self.name)
            .finish()
    }
}

/// Non-mutating half of the broadcast state contract.
pub trait ReadOnlyBroadcastState<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Option<V>;

    fn contains(&self, key: &K) -> bool;

    /// Snapshot of all entries, in no particular order.
    fn entries(&self) -> Vec<(K, V)>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Full broadcast state handle, only given to the writer role.
pub trait BroadcastState<K, V>: ReadOnlyBroadcastState<K, V> {
    /// Inserts or replaces, returning the previous value.
    fn put(&self, key: K, value: V) -> Option<V>;

    fn remove(&self, key: &K) -> Option<V>;

    fn clear(&self);
}

/// Resolves descriptors to the broadcast state instances of one operator.
///
/// Resolving the same descriptor twice must yield the same instance.
pub trait OperatorStateStore: Send + Sync {
    fn get_broadcast_state<K: StateKey, V: StateValue>(
        &self,
        descriptor: &MapStateDescriptor<K, V>,
    ) -> Result<Arc<dyn BroadcastState<K, V>>, StateError>;
}

/// Read-only projection of a [`BroadcastState`].
///
/// Holds the writer's handle itself, so writes made through the mutable side
/// are observed immediately. The inner handle is never exposed.
///
/// Only the read operations are available:
///
/// ```
/// use streamfn_core::{ReadOnlyBroadcastState, ReadOnlyBroadcastView};
///
/// fn limit_of(view: &ReadOnlyBroadcastView<String, i64>, symbol: &str) -> Option<i64> {
///     view.get(&symbol.to_string())
/// }
/// ```
///
/// Writing through the view does not compile, even with the mutable trait in
/// scope:
///
/// ```compile_fail
/// use streamfn_core::{BroadcastState, ReadOnlyBroadcastView};
///
/// fn raise(view: &ReadOnlyBroadcastView<String, i64>) {
///     view.put("x".to_string(), 10);
/// }
/// ```
///
/// ```compile_fail
/// use streamfn_core::{BroadcastState, ReadOnlyBroadcastView};
///
/// fn drop_rule(view: &ReadOnlyBroadcastView<String, i64>) {
///     view.remove(&"x".to_string());
/// }
/// ```
///
/// ```compile_fail
/// use streamfn_core::{BroadcastState, ReadOnlyBroadcastView};
///
/// fn reset(view: &ReadOnlyBroadcastView<String, i64>) {
///     view.clear();
/// }
/// ```
pub struct ReadOnlyBroadcastView<K, V> {
    inner: Arc<dyn BroadcastState<K, V>>,
}

impl<K, V> ReadOnlyBroadcastView<K, V> {
    pub(crate) fn new(inner: Arc<dyn BroadcastState<K, V>>) -> Self {
        Self { inner }
    }
}

impl<K, V> ReadOnlyBroadcastState<K, V> for ReadOnlyBroadcastView<K, V> {
    fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key)
    }

    fn contains(&self, key: &K) -> bool {
        self.inner.contains(key)
    }

    fn entries(&self) -> Vec<(K, V)> {
        self.inner.entries()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K, V> fmt::Debug for ReadOnlyBroadcastView<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ReadOnlyBroadcastView")
            .field("len", &self.inner.len())
            .finish()
    }
}
