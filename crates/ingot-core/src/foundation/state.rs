//! Per-dispatch key/value scratchpad.
//!
//! A [`State`] is created fresh (or cloned from the matcher's template) at
//! the start of each dispatch and discarded at the end, unless a handler
//! suspends into a continuation, in which case the state travels with the
//! spawned temporary matcher. No two concurrent dispatches ever observe the
//! same live instance.
//!
//! Values are dynamically typed ([`serde_json::Value`]) because rules and
//! handlers are independently authored with no shared schema. The typed exit
//! from that world is [`State::parse`], which deserializes the whole map into
//! any `Deserialize` target; serde's derived field tables play the role the
//! source system filled with a cached reflection table, and a shape mismatch
//! is a recoverable [`StateError`], never a panic.

use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::StateError;

/// String-keyed, dynamically typed dispatch state.
#[derive(Debug, Clone, Default)]
pub struct State {
    map: HashMap<String, Value>,
}

impl State {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value under `key`, serializing it to a dynamic value.
    ///
    /// Values that cannot serialize to JSON (e.g. maps with non-string keys)
    /// are silently dropped; engine-internal writers only store strings and
    /// numbers.
    pub fn set(&mut self, key: impl Into<String>, value: impl Serialize) {
        if let Ok(value) = serde_json::to_value(value) {
            self.map.insert(key.into(), value);
        }
    }

    /// Returns the raw dynamic value under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    /// Returns the value under `key` as a string slice, if it is one.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.map.get(key).and_then(Value::as_str)
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Removes and returns the value under `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.map.remove(key)
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the state holds no keys.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Deserializes the whole state into a typed structure.
    ///
    /// Every field of `T` is populated from the value stored under its
    /// (possibly renamed) field name, with exact value fidelity, floats
    /// included. Missing or mismatched fields produce a [`StateError`].
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, StateError> {
        let value = serde_json::to_value(&self.map)?;
        Ok(serde_json::from_value(value)?)
    }
}

impl FromIterator<(String, Value)> for State {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            map: iter.into_iter().collect(),
        }
    }
}
