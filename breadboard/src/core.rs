//! Workbench facade shared by the CLI and any UI front-end.
//!
//! Ties a [`DeviceLibrary`], a [`CircuitGraph`], an [`EmulationEngine`] and
//! a [`Console`] together. Everything here is synchronous; a UI on several
//! threads wraps the whole `Workbench` in one mutex (see
//! [`SimulationClock`](crate::emulation::SimulationClock)).

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::circuit::graph::{
    DEFAULT_PIN_HIT_RADIUS, DEFAULT_PLACEMENT_JITTER, DEFAULT_PLACEMENT_ORIGIN,
    DEFAULT_WIRE_HIT_TOLERANCE,
};
use crate::circuit::{CircuitGraph, CircuitStats, GraphError, IdGenerator, IdStyle, PinRef};
use crate::console::Console;
use crate::device::DeviceDefinition;
use crate::emulation::{
    EmulationEngine, EmulationError, ProgramReport, SimState, TickReport, DEFAULT_SERIAL_DELAY,
    DEFAULT_TICK_INTERVAL,
};
use crate::parser::{DeviceLibrary, ImportReport, ParseError};
use crate::router::Point;
use crate::validation::ValidationError;
use crate::value::Value;

#[derive(Debug, thiserror::Error)]
pub enum BreadboardError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Emulation error: {0}")]
    Emulation(#[from] EmulationError),
    #[error("Circuit error: {0}")]
    Graph(#[from] GraphError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown device: {0}")]
    UnknownDevice(String),
    #[error("{0}")]
    Other(String),
}

/// Options for a workbench session.
#[derive(Clone, Debug)]
pub struct WorkbenchOptions {
    pub tick_interval: Duration,
    /// `None` seeds placement jitter from entropy.
    pub placement_seed: Option<u64>,
    /// Placement point relative to the camera origin.
    pub placement_origin: Point,
    pub placement_jitter: i32,
    pub pin_hit_radius: f64,
    pub wire_hit_tolerance: f64,
    /// Spacing between echoed serial messages.
    pub serial_delay: Duration,
    pub id_style: IdStyle,
}

impl Default for WorkbenchOptions {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            placement_seed: None,
            placement_origin: DEFAULT_PLACEMENT_ORIGIN,
            placement_jitter: DEFAULT_PLACEMENT_JITTER,
            pin_hit_radius: DEFAULT_PIN_HIT_RADIUS,
            wire_hit_tolerance: DEFAULT_WIRE_HIT_TOLERANCE,
            serial_delay: DEFAULT_SERIAL_DELAY,
            id_style: IdStyle::default(),
        }
    }
}

impl WorkbenchOptions {
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_placement_seed(mut self, seed: u64) -> Self {
        self.placement_seed = Some(seed);
        self
    }

    pub fn with_placement(mut self, origin: Point, jitter: i32) -> Self {
        self.placement_origin = origin;
        self.placement_jitter = jitter;
        self
    }

    pub fn with_hit_tolerances(mut self, pin_radius: f64, wire_tolerance: f64) -> Self {
        self.pin_hit_radius = pin_radius;
        self.wire_hit_tolerance = wire_tolerance;
        self
    }

    pub fn with_serial_delay(mut self, delay: Duration) -> Self {
        self.serial_delay = delay;
        self
    }

    pub fn with_id_style(mut self, style: IdStyle) -> Self {
        self.id_style = style;
        self
    }
}

/// Rendering view of one LED.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedSnapshot {
    pub label: String,
    pub state_var: String,
    pub color: String,
    pub position: Point,
    pub lit: bool,
}

/// Rendering view of one placed instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceSnapshot {
    pub id: String,
    pub device: String,
    pub label: String,
    pub position: Point,
    pub state: BTreeMap<String, Value>,
    pub leds: Vec<LedSnapshot>,
}

/// Rendering view of one wire. `route` is `None` for a dangling wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireSnapshot {
    pub id: String,
    pub a: PinRef,
    pub b: PinRef,
    pub route: Option<Vec<Point>>,
}

/// Everything a front-end needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderSnapshot {
    pub state: SimState,
    pub tick: u64,
    pub selected: Option<String>,
    pub instances: Vec<InstanceSnapshot>,
    pub wires: Vec<WireSnapshot>,
}

impl RenderSnapshot {
    pub fn instance(&self, id: &str) -> Option<&InstanceSnapshot> {
        self.instances.iter().find(|i| i.id == id)
    }

    /// `instance.led_label` of every lit LED.
    pub fn lit_leds(&self) -> Vec<String> {
        self.instances
            .iter()
            .flat_map(|i| {
                i.leds
                    .iter()
                    .filter(|l| l.lit)
                    .map(move |l| format!("{}.{}", i.id, l.label))
            })
            .collect()
    }
}

/// Library, circuit, engine and console of one session.
#[derive(Debug)]
pub struct Workbench {
    options: WorkbenchOptions,
    library: DeviceLibrary,
    graph: CircuitGraph,
    engine: EmulationEngine,
    console: Console,
}

impl Workbench {
    pub fn new() -> Self {
        Self::with_options(WorkbenchOptions::default())
    }

    pub fn with_options(options: WorkbenchOptions) -> Self {
        let graph = match options.placement_seed {
            Some(seed) => CircuitGraph::with_seed(seed),
            None => CircuitGraph::new(),
        }
        .with_ids(IdGenerator::new(options.id_style))
        .with_placement(options.placement_origin, options.placement_jitter)
        .with_hit_tolerances(options.pin_hit_radius, options.wire_hit_tolerance);

        let engine = EmulationEngine::new()
            .with_tick_interval(options.tick_interval)
            .with_serial_delay(options.serial_delay);

        Self {
            options,
            library: DeviceLibrary::new(),
            graph,
            engine,
            console: Console::new(),
        }
    }

    pub fn options(&self) -> &WorkbenchOptions {
        &self.options
    }

    pub fn library(&self) -> &DeviceLibrary {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut DeviceLibrary {
        &mut self.library
    }

    pub fn graph(&self) -> &CircuitGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut CircuitGraph {
        &mut self.graph
    }

    pub fn engine(&self) -> &EmulationEngine {
        &self.engine
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut Console {
        &mut self.console
    }

    // ------------------------------------------------------------------
    // Library
    // ------------------------------------------------------------------

    pub fn load_device_str(&mut self, text: &str) -> Result<Arc<DeviceDefinition>, BreadboardError> {
        let def = self.library.import_str(text)?;
        self.console.info(format!("Loaded: {}", def.name));
        Ok(def)
    }

    /// Import descriptor files and directories. Failures are logged to the
    /// console and returned in the report; they never abort the batch.
    pub fn import_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> ImportReport {
        let report = self.library.import_files(paths);
        for failure in &report.failures {
            self.console
                .error(format!("Failed to load {}: {}", failure.source, failure.error));
        }
        self.console
            .info(format!("Loaded {} device(s)", report.loaded.len()));
        report
    }

    fn device(&self, device_id: &str) -> Result<Arc<DeviceDefinition>, BreadboardError> {
        self.library
            .get(device_id)
            .ok_or_else(|| BreadboardError::UnknownDevice(device_id.to_string()))
    }

    // ------------------------------------------------------------------
    // Circuit
    // ------------------------------------------------------------------

    /// Place a library device near the view centre. Returns the instance id.
    pub fn place(&mut self, device_id: &str) -> Result<String, BreadboardError> {
        let def = self.device(device_id)?;
        Ok(self.graph.place_instance(def))
    }

    pub fn place_at(&mut self, device_id: &str, position: Point) -> Result<String, BreadboardError> {
        let def = self.device(device_id)?;
        Ok(self.graph.place_instance_at(def, position))
    }

    pub fn connect(&mut self, a: PinRef, b: PinRef) -> Result<String, BreadboardError> {
        Ok(self.graph.add_wire(a, b)?)
    }

    pub fn stats(&self) -> CircuitStats {
        self.graph.stats()
    }

    // ------------------------------------------------------------------
    // Simulation
    // ------------------------------------------------------------------

    /// Check the program and start running. The console is cleared and
    /// receives the compile summary and any structural warnings.
    pub fn start_simulation(&mut self, program: &str) -> Result<ProgramReport, BreadboardError> {
        let report = match self.engine.start(program) {
            Ok(report) => report,
            Err(e) => {
                self.console.error("No sketch loaded.");
                return Err(e.into());
            }
        };

        self.console.clear();
        self.console.info("--- Compiling... ---");
        for warning in &report.warnings {
            self.console.error(format!("Warning: {warning}"));
        }
        self.console.info(format!(
            "Sketch uses ~{} bytes ({}% of storage).",
            report.sketch_bytes, report.storage_percent
        ));
        self.console.info("--- Simulation started ---");
        Ok(report)
    }

    /// Stop and reset every instance's state to its defaults.
    pub fn stop_simulation(&mut self) {
        let was_running = self.engine.is_running();
        self.engine.stop(&mut self.graph);
        if was_running {
            self.console.info("--- Simulation stopped ---");
        }
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    /// Advance the simulation one step; `None` while idle. Serial output
    /// that fell due is echoed to the console.
    pub fn tick(&mut self) -> Option<TickReport> {
        let report = self.engine.tick(&mut self.graph)?;
        for line in &report.serial_output {
            self.console.output(line.clone());
        }
        Some(report)
    }

    /// Lit flag of one LED, by instance id and LED index.
    pub fn is_led_lit(&self, instance_id: &str, led_index: usize) -> bool {
        self.graph
            .instance(instance_id)
            .and_then(|inst| {
                let led = inst.definition().leds.get(led_index)?;
                Some(self.engine.is_led_lit(inst, led))
            })
            .unwrap_or(false)
    }

    pub fn snapshot(&self) -> RenderSnapshot {
        let instances = self
            .graph
            .instances()
            .iter()
            .map(|inst| {
                let def = inst.definition();
                InstanceSnapshot {
                    id: inst.id.clone(),
                    device: def.id.clone(),
                    label: def.label.clone(),
                    position: inst.position,
                    state: inst.state.as_map().clone(),
                    leds: def
                        .leds
                        .iter()
                        .map(|led| LedSnapshot {
                            label: led.label.clone(),
                            state_var: led.state_var.clone(),
                            color: led.color.clone(),
                            position: inst.position.offset(Point::new(led.x, led.y)),
                            lit: self.engine.is_led_lit(inst, led),
                        })
                        .collect(),
                }
            })
            .collect();

        let wires = self
            .graph
            .wires()
            .iter()
            .map(|w| WireSnapshot {
                id: w.id.clone(),
                a: w.a.clone(),
                b: w.b.clone(),
                route: self.graph.route(&w.id).map(|r| r.points.clone()),
            })
            .collect();

        RenderSnapshot {
            state: self.engine.state(),
            tick: self.engine.tick_count(),
            selected: self.graph.selected().map(|i| i.id.clone()),
            instances,
            wires,
        }
    }
}

impl Default for Workbench {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::ConsoleKind;

    const LED: &str = r#"{
        "device": { "id": "led", "name": "LED", "category": "Output" },
        "visual": { "led_indicators": [ { "label": "L", "x": 10, "y": 10, "state_var": "led_on" } ] },
        "pins": [
            { "id": "anode", "x": 0, "y": 30, "side": "left" },
            { "id": "cathode", "x": 60, "y": 30, "side": "right" }
        ],
        "emulation": {
            "state_vars": { "led_on": false },
            "rules": [ { "trigger": "pin_high", "pin": "anode", "action": "set_state", "target": "led_on", "value": true } ]
        }
    }"#;

    const BLINK: &str = r#"void setup() { Serial.println("boot"); }
void loop() { digitalWrite(13, HIGH); delay(500); digitalWrite(13, LOW); delay(500); }"#;

    fn workbench() -> Workbench {
        let mut wb = Workbench::with_options(WorkbenchOptions::default().with_placement_seed(9));
        wb.load_device_str(LED).unwrap();
        wb
    }

    #[test]
    fn test_place_unknown_device() {
        let mut wb = workbench();
        assert!(matches!(wb.place("servo"), Err(BreadboardError::UnknownDevice(_))));
        assert_eq!(wb.place("led").unwrap(), "i1");
    }

    #[test]
    fn test_run_and_snapshot() {
        let mut wb = workbench();
        let a = wb.place_at("led", Point::new(0.0, 0.0)).unwrap();
        let b = wb.place_at("led", Point::new(200.0, 0.0)).unwrap();
        let w = wb
            .connect(PinRef::new(&a, "cathode"), PinRef::new(&b, "anode"))
            .unwrap();

        wb.start_simulation(BLINK).unwrap();
        wb.tick();
        assert!(!wb.is_led_lit(&a, 0));
        let report = wb.tick().unwrap();
        assert_eq!(report.serial_output, ["boot"]);
        assert!(wb.is_led_lit(&a, 0));

        let snap = wb.snapshot();
        assert_eq!(snap.state, SimState::Running);
        assert_eq!(snap.tick, 2);
        assert_eq!(snap.lit_leds(), [format!("{a}.L"), format!("{b}.L")]);
        assert_eq!(snap.instance(&b).unwrap().leds[0].position, Point::new(210.0, 10.0));
        let wire = &snap.wires[0];
        assert_eq!(wire.id, w);
        assert!(wire.route.as_ref().unwrap().len() >= 2);
        assert_eq!(wb.console().messages(ConsoleKind::Output).collect::<Vec<_>>(), ["boot"]);
    }

    #[test]
    fn test_stop_resets() {
        let mut wb = workbench();
        let a = wb.place("led").unwrap();
        wb.start_simulation(BLINK).unwrap();
        wb.tick();
        wb.tick();
        wb.stop_simulation();

        assert!(wb.tick().is_none());
        assert!(!wb.is_led_lit(&a, 0));
        let snap = wb.snapshot();
        assert_eq!(snap.instances[0].state["led_on"], Value::Bool(false));
        assert_eq!(wb.console().last().unwrap().message, "--- Simulation stopped ---");
    }

    #[test]
    fn test_empty_program_logged() {
        let mut wb = workbench();
        let err = wb.start_simulation("").unwrap_err();
        assert!(matches!(err, BreadboardError::Emulation(EmulationError::EmptyProgram)));
        assert!(!wb.is_running());
        assert_eq!(wb.console().last().unwrap().kind, ConsoleKind::Error);
    }

    #[test]
    fn test_warnings_reach_console() {
        let mut wb = workbench();
        let report = wb.start_simulation("digitalWrite(1, 1);").unwrap();
        assert_eq!(report.warnings.len(), 2);
        assert_eq!(wb.console().messages(ConsoleKind::Error).count(), 2);
        assert!(wb.is_running());
    }

    #[test]
    fn test_uuid_ids() {
        let options = WorkbenchOptions::default()
            .with_placement_seed(1)
            .with_id_style(IdStyle::Uuid);
        let mut wb = Workbench::with_options(options);
        wb.load_device_str(LED).unwrap();
        let id = wb.place("led").unwrap();
        assert_eq!(id.len(), 36);
    }
}
