//! Mutable per-instance state variables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::value::Value;

/// Name -> value map owned by one placed instance, iterated in key order.
///
/// Starts as a copy of the definition's `state_vars`; rules may overwrite
/// existing keys or add new ones while a simulation runs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceState {
    vars: BTreeMap<String, Value>,
}

impl InstanceState {
    pub fn from_defaults(defaults: &BTreeMap<String, Value>) -> Self {
        Self {
            vars: defaults.clone(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Sets `name`, returning the previous value.
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.vars.insert(name.into(), value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name)
    }

    /// Replace everything with a fresh copy of `defaults`, dropping keys
    /// that were added at runtime.
    pub fn reset_to_defaults(&mut self, defaults: &BTreeMap<String, Value>) {
        self.vars = defaults.clone();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.vars.iter()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_drops_runtime_keys() {
        let mut defaults = BTreeMap::new();
        defaults.insert("led_on".to_string(), Value::Bool(false));

        let mut state = InstanceState::from_defaults(&defaults);
        state.set("led_on", Value::Bool(true));
        state.set("extra", Value::Number(4.0));
        assert_eq!(state.len(), 2);

        state.reset_to_defaults(&defaults);
        assert_eq!(state.as_map(), &defaults);
        assert!(state.get("extra").is_none());
    }

    #[test]
    fn test_iteration_is_key_ordered() {
        let mut state = InstanceState::default();
        state.set("zeta", Value::Number(1.0));
        state.set("alpha", Value::Number(2.0));
        let keys: Vec<&str> = state.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["alpha", "zeta"]);
    }
}
