//! Bridge to application state.
//!
//! The application registers a [`StateAccessor`]; the engine reads it
//! through a [`StateBridge`], which never lets a getter failure escape.
//! A failing or panicking getter yields a degraded `{"error": message}`
//! value instead.

use framekeeper_core::panic_message;
use serde::Serialize;
use serde_json::{json, Value};
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

/// Failures reported by a state accessor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// No accessor has been registered
    #[error("No state accessor registered")]
    NoAccessor,

    /// The state could not be converted to JSON
    #[error("State is not serializable: {0}")]
    Serialize(String),

    /// The application rejected the read or the patch
    #[error("State access failed: {0}")]
    Access(String),
}

/// Application-owned get/set functions for its state.
pub trait StateAccessor: Send {
    /// Return an owned JSON copy of the current state.
    fn get_state(&self) -> Result<Value, StateError>;

    /// Merge `patch` into the state. Merge semantics belong to the application.
    fn set_state(&mut self, patch: Value) -> Result<(), StateError>;
}

/// Convert any serializable state into an owned JSON value.
pub fn serialize_state<T: Serialize + ?Sized>(state: &T) -> Result<Value, StateError> {
    serde_json::to_value(state).map_err(|e| StateError::Serialize(e.to_string()))
}

/// [`StateAccessor`] built from a pair of closures.
pub struct FnStateAccessor<G, S> {
    getter: G,
    setter: S,
}

impl<G, S> FnStateAccessor<G, S>
where
    G: Fn() -> Result<Value, StateError> + Send,
    S: FnMut(Value) -> Result<(), StateError> + Send,
{
    pub fn new(getter: G, setter: S) -> Self {
        Self { getter, setter }
    }
}

impl<G, S> StateAccessor for FnStateAccessor<G, S>
where
    G: Fn() -> Result<Value, StateError> + Send,
    S: FnMut(Value) -> Result<(), StateError> + Send,
{
    fn get_state(&self) -> Result<Value, StateError> {
        (self.getter)()
    }

    fn set_state(&mut self, patch: Value) -> Result<(), StateError> {
        (self.setter)(patch)
    }
}

/// Fault-tolerant holder for the registered accessor.
#[derive(Default)]
pub struct StateBridge {
    accessor: Option<Box<dyn StateAccessor>>,
}

impl StateBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, accessor: Box<dyn StateAccessor>) {
        self.accessor = Some(accessor);
    }

    pub fn unregister(&mut self) -> Option<Box<dyn StateAccessor>> {
        self.accessor.take()
    }

    pub fn is_registered(&self) -> bool {
        self.accessor.is_some()
    }

    /// Read the state. `None` when nothing is registered; a degraded
    /// `{"error": ...}` value when the getter fails or panics.
    pub fn snapshot(&self) -> Option<Value> {
        let accessor = self.accessor.as_ref()?;
        let result = panic::catch_unwind(AssertUnwindSafe(|| accessor.get_state()));
        Some(match result {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => degraded(&e.to_string()),
            Err(payload) => degraded(&panic_message(payload.as_ref())),
        })
    }

    /// Forward a patch to the application.
    pub fn apply(&mut self, patch: Value) -> Result<(), StateError> {
        let accessor = self.accessor.as_mut().ok_or(StateError::NoAccessor)?;
        panic::catch_unwind(AssertUnwindSafe(|| accessor.set_state(patch)))
            .unwrap_or_else(|payload| Err(StateError::Access(panic_message(payload.as_ref()))))
    }
}

impl std::fmt::Debug for StateBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateBridge")
            .field("registered", &self.is_registered())
            .finish()
    }
}

fn degraded(message: &str) -> Value {
    json!({ "error": message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    #[derive(Serialize)]
    struct Player {
        x: f32,
        lives: u8,
    }

    fn shared_accessor(state: Arc<Mutex<Value>>) -> Box<dyn StateAccessor> {
        let read = state.clone();
        Box::new(FnStateAccessor::new(
            move || Ok(read.lock().unwrap().clone()),
            move |patch: Value| {
                let mut current = state.lock().unwrap();
                if let (Some(target), Value::Object(fields)) = (current.as_object_mut(), patch) {
                    target.extend(fields);
                }
                Ok(())
            },
        ))
    }

    #[test]
    fn test_unregistered_snapshot_is_none() {
        let bridge = StateBridge::new();
        assert_eq!(bridge.snapshot(), None);
    }

    #[test]
    fn test_snapshot_is_detached_from_later_mutation() {
        let state = Arc::new(Mutex::new(json!({ "score": 1 })));
        let mut bridge = StateBridge::new();
        bridge.register(shared_accessor(state.clone()));

        let before = bridge.snapshot().unwrap();
        state.lock().unwrap()["score"] = json!(99);

        assert_eq!(before["score"], 1);
        assert_eq!(bridge.snapshot().unwrap()["score"], 99);
    }

    #[test]
    fn test_apply_merges_patch() {
        let state = Arc::new(Mutex::new(json!({ "score": 1, "level": 2 })));
        let mut bridge = StateBridge::new();
        bridge.register(shared_accessor(state.clone()));

        bridge.apply(json!({ "score": 5 })).unwrap();
        assert_eq!(*state.lock().unwrap(), json!({ "score": 5, "level": 2 }));
    }

    #[test]
    fn test_failing_getter_degrades() {
        let mut bridge = StateBridge::new();
        bridge.register(Box::new(FnStateAccessor::new(
            || Err(StateError::Access("locked".into())),
            |_| Ok(()),
        )));
        assert_eq!(
            bridge.snapshot(),
            Some(json!({ "error": "State access failed: locked" }))
        );
    }

    #[test]
    fn test_panicking_getter_degrades() {
        let mut bridge = StateBridge::new();
        bridge.register(Box::new(FnStateAccessor::new(
            || -> Result<Value, StateError> { panic!("state poisoned") },
            |_| Ok(()),
        )));
        assert_eq!(bridge.snapshot(), Some(json!({ "error": "state poisoned" })));
    }

    #[test]
    fn test_apply_without_accessor() {
        let mut bridge = StateBridge::new();
        assert_eq!(bridge.apply(json!({})), Err(StateError::NoAccessor));
    }

    #[test]
    fn test_serialize_state() {
        let value = serialize_state(&Player { x: 1.5, lives: 3 }).unwrap();
        assert_eq!(value, json!({ "x": 1.5, "lives": 3 }));

        let mut bad = BTreeMap::new();
        bad.insert((1, 2), "tuple keys are not JSON");
        assert!(matches!(serialize_state(&bad), Err(StateError::Serialize(_))));
    }
}
