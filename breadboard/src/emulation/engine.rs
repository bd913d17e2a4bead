//! Emulation Engine
//!
//! Two-state machine driving instance state from device rules.
//!
//! ```text
//!            start(program) ok
//!   ┌──────┐ ───────────────────▶ ┌─────────┐
//!   │ Idle │                      │ Running │ ◀─┐ tick()
//!   └──────┘ ◀─────────────────── └─────────┘ ──┘
//!              stop(): reset every instance state
//! ```
//!
//! A tick only touches `pin_high` + `set_state` rules. With the blink
//! policy on, even ticks write the rule value and odd ticks its complement;
//! otherwise the value is written every tick. The engine never mutates a
//! [`DeviceDefinition`](crate::device::DeviceDefinition).

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::program::{check_program, EmulationError, ProgramReport, SimulationPolicy};
use crate::circuit::{CircuitGraph, ComponentInstance};
use crate::device::LedIndicator;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_SERIAL_DELAY: Duration = Duration::from_millis(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimState {
    #[default]
    Idle,
    Running,
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TickReport {
    /// Tick index, starting at 1 after `start`.
    pub tick: u64,
    /// Number of state writes performed.
    pub writes: usize,
    /// Serial messages that became due on this tick.
    pub serial_output: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct EmulationEngine {
    state: SimState,
    /// Bumped by every `start` and `stop`; a clock only drives the run
    /// it was spawned for.
    run: u64,
    tick_count: u64,
    elapsed: Duration,
    policy: SimulationPolicy,
    tick_interval: Duration,
    serial_delay: Duration,
    pending_serial: VecDeque<(Duration, String)>,
}

impl EmulationEngine {
    pub fn new() -> Self {
        Self {
            state: SimState::Idle,
            run: 0,
            tick_count: 0,
            elapsed: Duration::ZERO,
            policy: SimulationPolicy::default(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            serial_delay: DEFAULT_SERIAL_DELAY,
            pending_serial: VecDeque::new(),
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_serial_delay(mut self, delay: Duration) -> Self {
        self.serial_delay = delay;
        self
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SimState::Running
    }

    /// Identifier of the current run.
    pub fn run_id(&self) -> u64 {
        self.run
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Simulated time since `start`.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn policy(&self) -> SimulationPolicy {
        self.policy
    }

    /// Check the program and enter Running. An empty program leaves the
    /// engine untouched. Calling this while already running restarts the
    /// tick counter.
    pub fn start(&mut self, program: &str) -> Result<ProgramReport, EmulationError> {
        let report = check_program(program).map_err(|e| {
            warn!(error = %e, "simulation not started");
            e
        })?;
        for w in &report.warnings {
            warn!(warning = %w, "program structure");
        }

        self.state = SimState::Running;
        self.run += 1;
        self.tick_count = 0;
        self.elapsed = Duration::ZERO;
        self.policy = report.policy;
        self.pending_serial = report
            .serial_messages
            .iter()
            .zip(1u32..)
            .map(|(msg, n)| (self.serial_delay.saturating_mul(n), msg.clone()))
            .collect();

        info!(
            sketch_bytes = report.sketch_bytes,
            blink = report.policy.blink_enabled,
            warnings = report.warnings.len(),
            "simulation started"
        );
        Ok(report)
    }

    /// Enter Idle and reset every instance's state to its definition
    /// defaults, dropping any keys added while running.
    pub fn stop(&mut self, graph: &mut CircuitGraph) {
        let was_running = self.is_running();
        self.state = SimState::Idle;
        self.run += 1;
        self.pending_serial.clear();
        graph.reset_states();
        if was_running {
            info!(ticks = self.tick_count, "simulation stopped");
        }
    }

    /// Advance one step. Does nothing (returns `None`) while Idle.
    pub fn tick(&mut self, graph: &mut CircuitGraph) -> Option<TickReport> {
        if !self.is_running() {
            return None;
        }
        self.tick_count += 1;
        self.elapsed += self.tick_interval;

        let even = self.tick_count % 2 == 0;
        let mut writes = 0;
        for instance in graph.instances_mut() {
            let definition = Arc::clone(instance.definition());
            for rule in definition.active_rules() {
                let value = if self.policy.blink_enabled && !even {
                    rule.value.complement()
                } else {
                    rule.value.clone()
                };
                instance.state.set(rule.target.clone(), value);
                writes += 1;
            }
        }

        let mut serial_output = Vec::new();
        while let Some((due, _)) = self.pending_serial.front() {
            if *due > self.elapsed {
                break;
            }
            if let Some((_, msg)) = self.pending_serial.pop_front() {
                serial_output.push(msg);
            }
        }

        debug!(tick = self.tick_count, writes, "tick");
        Some(TickReport {
            tick: self.tick_count,
            writes,
            serial_output,
        })
    }

    /// Lit iff running and the watched state variable equals `on_value`
    /// exactly (no coercion between types).
    pub fn is_led_lit(&self, instance: &ComponentInstance, led: &LedIndicator) -> bool {
        self.is_running() && instance.state.get(&led.state_var) == Some(&led.on_value)
    }

    /// Lit flags for every LED of an instance, in definition order.
    pub fn led_states(&self, instance: &ComponentInstance) -> Vec<bool> {
        instance
            .definition()
            .leds
            .iter()
            .map(|led| self.is_led_lit(instance, led))
            .collect()
    }
}

impl Default for EmulationEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Action, DeviceDefinition, Rule, Trigger};
    use crate::router::Point;
    use crate::value::Value;

    const BLINK: &str = "void setup() {}\nvoid loop() { digitalWrite(13, HIGH); delay(500); }";
    const STEADY: &str = "void setup() {}\nvoid loop() { digitalWrite(13, HIGH); }";

    fn led() -> Arc<DeviceDefinition> {
        Arc::new(
            DeviceDefinition::new("led", "LED")
                .with_state_var("led_on", Value::Bool(false))
                .with_led(LedIndicator::new("L", "led_on", Value::Bool(true)))
                .with_rule(
                    Rule::new(Trigger::PinHigh, Action::SetState, "led_on", Value::Bool(true))
                        .on_pin("anode"),
                ),
        )
    }

    fn setup() -> (EmulationEngine, CircuitGraph, String) {
        let mut graph = CircuitGraph::with_seed(3);
        let id = graph.place_instance_at(led(), Point::new(0.0, 0.0));
        (EmulationEngine::new(), graph, id)
    }

    fn led_on(graph: &CircuitGraph, id: &str) -> Value {
        graph.instance(id).unwrap().state.get("led_on").cloned().unwrap()
    }

    #[test]
    fn test_blink_alternates() {
        let (mut engine, mut graph, id) = setup();
        assert!(engine.start(BLINK).unwrap().policy.blink_enabled);

        let mut seen = Vec::new();
        for _ in 0..4 {
            engine.tick(&mut graph).unwrap();
            seen.push(led_on(&graph, &id));
        }
        assert_eq!(
            seen,
            [false, true, false, true].map(Value::Bool).to_vec()
        );
        assert_eq!(engine.tick_count(), 4);
    }

    #[test]
    fn test_steady_program_holds_value() {
        let (mut engine, mut graph, id) = setup();
        engine.start(STEADY).unwrap();
        for _ in 0..3 {
            engine.tick(&mut graph).unwrap();
            assert_eq!(led_on(&graph, &id), Value::Bool(true));
        }
    }

    #[test]
    fn test_numeric_rule_blinks_to_zero() {
        let def = Arc::new(DeviceDefinition::new("pwm", "PWM").with_rule(Rule::new(
            Trigger::PinHigh,
            Action::SetState,
            "level",
            Value::Number(255.0),
        )));
        let mut graph = CircuitGraph::with_seed(0);
        let id = graph.place_instance_at(def, Point::new(0.0, 0.0));
        let mut engine = EmulationEngine::new();
        engine.start(BLINK).unwrap();

        engine.tick(&mut graph);
        assert_eq!(graph.instance(&id).unwrap().state.get("level"), Some(&Value::Number(0.0)));
        engine.tick(&mut graph);
        assert_eq!(graph.instance(&id).unwrap().state.get("level"), Some(&Value::Number(255.0)));
    }

    #[test]
    fn test_idle_tick_is_noop() {
        let (mut engine, mut graph, id) = setup();
        assert!(engine.tick(&mut graph).is_none());
        assert_eq!(led_on(&graph, &id), Value::Bool(false));
        assert_eq!(engine.tick_count(), 0);
    }

    #[test]
    fn test_empty_program_stays_idle() {
        let (mut engine, _, _) = setup();
        assert_eq!(engine.start("   "), Err(EmulationError::EmptyProgram));
        assert_eq!(engine.state(), SimState::Idle);
    }

    #[test]
    fn test_stop_resets_state() {
        let (mut engine, mut graph, id) = setup();
        engine.start(STEADY).unwrap();
        engine.tick(&mut graph);
        graph
            .instance_mut(&id)
            .unwrap()
            .state
            .set("extra", Value::from("runtime"));

        engine.stop(&mut graph);
        let instance = graph.instance(&id).unwrap();
        assert_eq!(instance.state.as_map(), &instance.definition().state_vars);
        assert!(!engine.is_running());
    }

    #[test]
    fn test_led_lit_requires_running() {
        let (mut engine, mut graph, id) = setup();
        graph
            .instance_mut(&id)
            .unwrap()
            .state
            .set("led_on", Value::Bool(true));
        let instance = graph.instance(&id).unwrap();
        let led = &instance.definition().leds[0];
        assert!(!engine.is_led_lit(instance, led));

        engine.start(STEADY).unwrap();
        let instance = graph.instance(&id).unwrap();
        assert!(engine.is_led_lit(instance, led));
        assert_eq!(engine.led_states(instance), [true]);
    }

    #[test]
    fn test_led_equality_is_strict() {
        let (mut engine, mut graph, id) = setup();
        engine.start(STEADY).unwrap();
        graph
            .instance_mut(&id)
            .unwrap()
            .state
            .set("led_on", Value::Number(1.0));
        let instance = graph.instance(&id).unwrap();
        assert_eq!(engine.led_states(instance), [false]);
    }

    #[test]
    fn test_serial_output_is_spaced() {
        let (mut engine, mut graph, _) = setup();
        engine
            .start(r#"void setup() { Serial.println("one"); Serial.println("two"); } void loop() {}"#)
            .unwrap();

        // 500ms per tick, messages due at 600ms and 1200ms.
        assert!(engine.tick(&mut graph).unwrap().serial_output.is_empty());
        assert_eq!(engine.tick(&mut graph).unwrap().serial_output, ["one"]);
        assert_eq!(engine.tick(&mut graph).unwrap().serial_output, ["two"]);
        assert!(engine.tick(&mut graph).unwrap().serial_output.is_empty());
    }

    #[test]
    fn test_restart_resets_counter() {
        let (mut engine, mut graph, _) = setup();
        engine.start(BLINK).unwrap();
        engine.tick(&mut graph);
        engine.tick(&mut graph);
        engine.start(BLINK).unwrap();
        assert_eq!(engine.tick_count(), 0);
        assert_eq!(engine.tick(&mut graph).unwrap().tick, 1);
    }

    #[test]
    fn test_run_id_changes_on_start_and_stop() {
        let (mut engine, mut graph, _) = setup();
        let idle = engine.run_id();
        engine.start(BLINK).unwrap();
        let first = engine.run_id();
        assert_ne!(first, idle);

        engine.stop(&mut graph);
        engine.start(BLINK).unwrap();
        assert_ne!(engine.run_id(), first);

        let before = engine.run_id();
        assert!(engine.start("").is_err());
        assert_eq!(engine.run_id(), before);
    }
}
