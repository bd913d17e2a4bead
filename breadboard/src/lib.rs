//! Breadboard - circuit wiring and device emulation engine
//!
//! This library lets a front-end assemble a virtual breadboard from device
//! definitions, wire pins together with orthogonal routes, and run a small
//! rule-based simulation that drives each device's visual state.
//!
//! # Quick Start
//!
//! ```no_run
//! use breadboard::prelude::*;
//!
//! let mut wb = Workbench::with_options(WorkbenchOptions::default().with_placement_seed(1));
//! let report = wb.import_paths(&["devices/"]);
//! for failure in &report.failures {
//!     eprintln!("{}: {}", failure.source, failure.error);
//! }
//!
//! let led = wb.place("led_red").unwrap();
//! let uno = wb.place("arduino_uno").unwrap();
//! wb.connect(PinRef::new(&uno, "d13"), PinRef::new(&led, "anode")).unwrap();
//!
//! wb.start_simulation("void setup() {}\nvoid loop() { digitalWrite(13, HIGH); delay(500); }")
//!     .unwrap();
//! wb.tick();
//! println!("lit: {:?}", wb.snapshot().lit_leds());
//! ```
//!
//! # Features
//!
//! - **Descriptors**: `.adev` JSON device definitions with defaults for
//!   every optional field, partial-failure batch import
//! - **Routing**: grid-aligned orthogonal wires with greedy lane search
//! - **Circuit graph**: placement, hit-testing, cascade deletes, nets
//! - **Emulation**: `pin_high`/`set_state` rules ticked under a blink
//!   policy derived from program text

pub mod circuit;
pub mod console;
pub mod core;
pub mod device;
pub mod emulation;
pub mod parser;
pub mod router;
pub mod validation;
pub mod value;

// Re-export main types
pub use circuit::{CircuitGraph, CircuitStats, ComponentInstance, GraphError, PinRef, Wire};
pub use console::{Console, ConsoleEntry, ConsoleKind};
pub use crate::core::{
    BreadboardError, InstanceSnapshot, LedSnapshot, RenderSnapshot, WireSnapshot, Workbench,
    WorkbenchOptions,
};
pub use device::{
    Action, DeviceDefinition, DisplayRegion, EmulationType, LedIndicator, Pin, PinDirection,
    PinSide, PinType, Rule, Trigger,
};
pub use emulation::{
    check_program, derive_simulation_policy, EmulationEngine, EmulationError, PreviewRunner,
    ProgramReport, SimState, SimulationClock, SimulationPolicy, StructuralWarning,
};
pub use parser::{parse_device, serialize_device, DeviceLibrary, ImportReport, ParseError};
pub use router::{route, PinAnchor, Point, Route};
pub use validation::{
    format_emulation_json, validate_emulation_json, EmulationDraft, ValidationError,
};
pub use value::Value;

/// Read and parse one descriptor file (convenience wrapper).
pub fn load_device(path: &std::path::Path) -> Result<DeviceDefinition, BreadboardError> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_device(&text)?)
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        BreadboardError, CircuitGraph, DeviceDefinition, DeviceLibrary, PinRef, Point,
        RenderSnapshot, SimState, Value, Workbench, WorkbenchOptions,
    };
}
