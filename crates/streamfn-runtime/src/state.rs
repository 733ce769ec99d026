//! Heap State Store: in-memory broadcast state for one operator instance
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use streamfn_core::{
    BroadcastState, MapStateDescriptor, OperatorStateStore, ReadOnlyBroadcastState, StateError,
    StateKey, StateValue,
};
use tracing::debug;

/// Map-shaped broadcast state backed by a `HashMap`.
pub struct HeapBroadcastState<K, V> {
    map: RwLock<HashMap<K, V>>,
}

impl<K: StateKey, V: StateValue> HeapBroadcastState<K, V> {
    pub fn new() -> Self {
        Self { map: RwLock::new(HashMap::new()) }
    }
}

impl<K: StateKey, V: StateValue> Default for HeapBroadcastState<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: StateKey, V: StateValue> ReadOnlyBroadcastState<K, V> for HeapBroadcastState<K, V> {
    fn get(&self, key: &K) -> Option<V> {
        self.map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn contains(&self, key: &K) -> bool {
        self.map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    fn entries(&self) -> Vec<(K, V)> {
        self.map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn len(&self) -> usize {
        self.map.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl<K: StateKey, V: StateValue> BroadcastState<K, V> for HeapBroadcastState<K, V> {
    fn put(&self, key: K, value: V) -> Option<V> {
        self.map
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value)
    }

    fn remove(&self, key: &K) -> Option<V> {
        self.map
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    fn clear(&self) {
        self.map.write().unwrap_or_else(PoisonError::into_inner).clear()
    }
}

type ErasedState = Arc<dyn Any + Send + Sync>;

/// Resolves descriptors by name.
///
/// In strict mode only descriptors passed to [`register`](Self::register)
/// resolve; otherwise states are created on first use.
pub struct HeapOperatorStateStore {
    strict: bool,
    states: Mutex<HashMap<String, ErasedState>>,
}

impl HeapOperatorStateStore {
    pub fn new(strict: bool) -> Self {
        Self { strict, states: Mutex::new(HashMap::new()) }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Declares a broadcast state up front. Registering the same descriptor
    /// again is a no-op.
    pub fn register<K: StateKey, V: StateValue>(
        &self,
        descriptor: &MapStateDescriptor<K, V>,
    ) -> Result<(), StateError> {
        self.resolve(descriptor, true).map(|_| ())
    }

    pub fn descriptor_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    fn resolve<K: StateKey, V: StateValue>(
        &self,
        descriptor: &MapStateDescriptor<K, V>,
        create: bool,
    ) -> Result<Arc<HeapBroadcastState<K, V>>, StateError> {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        let erased = match states.get(descriptor.name()).cloned() {
            Some(existing) => existing,
            None if create => {
                debug!(state = descriptor.name(), "creating broadcast state");
                let created: ErasedState = Arc::new(HeapBroadcastState::<K, V>::new());
                states.insert(descriptor.name().to_string(), created.clone());
                created
            }
            None => return Err(StateError::UnknownDescriptor(descriptor.name().to_string())),
        };
        erased
            .downcast::<HeapBroadcastState<K, V>>()
            .map_err(|_| StateError::TypeMismatch {
                name: descriptor.name().to_string(),
                requested: descriptor.type_signature(),
            })
    }
}

impl Default for HeapOperatorStateStore {
    fn default() -> Self {
        Self::new(false)
    }
}

impl OperatorStateStore for HeapOperatorStateStore {
    fn get_broadcast_state<K: StateKey, V: StateValue>(
        &self,
        descriptor: &MapStateDescriptor<K, V>,
    ) -> Result<Arc<dyn BroadcastState<K, V>>, StateError> {
        let state: Arc<dyn BroadcastState<K, V>> = self.resolve(descriptor, !self.strict)?;
        Ok(state)
    }
}
