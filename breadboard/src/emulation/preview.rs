//! Single-device preview ticking, used while authoring a definition.
//!
//! Unlike the circuit engine there is no program and no policy: every tick
//! rebuilds the state from the definition defaults and applies the
//! `pin_high`/`set_state` rules in blink mode.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::device::DeviceDefinition;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct PreviewRunner {
    definition: Arc<DeviceDefinition>,
    running: bool,
    tick_count: u64,
    state: BTreeMap<String, Value>,
}

impl PreviewRunner {
    pub fn new(definition: Arc<DeviceDefinition>) -> Self {
        Self {
            definition,
            running: false,
            tick_count: 0,
            state: BTreeMap::new(),
        }
    }

    /// Swap in an edited definition; takes effect on the next tick.
    pub fn set_definition(&mut self, definition: Arc<DeviceDefinition>) {
        self.definition = definition;
    }

    pub fn definition(&self) -> &Arc<DeviceDefinition> {
        &self.definition
    }

    pub fn start(&mut self) {
        self.running = true;
        self.tick_count = 0;
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.state.clear();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// State after the latest tick; empty before the first one.
    pub fn state(&self) -> &BTreeMap<String, Value> {
        &self.state
    }

    pub fn tick(&mut self) -> Option<&BTreeMap<String, Value>> {
        if !self.running {
            return None;
        }
        self.tick_count += 1;
        let even = self.tick_count % 2 == 0;

        let mut state = self.definition.state_vars.clone();
        for rule in self.definition.active_rules() {
            let value = if even {
                rule.value.clone()
            } else {
                rule.value.complement()
            };
            state.insert(rule.target.clone(), value);
        }
        self.state = state;
        Some(&self.state)
    }

    pub fn led_states(&self) -> Vec<bool> {
        self.definition
            .leds
            .iter()
            .map(|led| self.running && self.state.get(&led.state_var) == Some(&led.on_value))
            .collect()
    }

    /// `name: value` pairs joined for a status line.
    pub fn describe_state(&self) -> String {
        if self.state.is_empty() {
            return "Empty state".to_string();
        }
        self.state
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("  |  ")
    }
}
