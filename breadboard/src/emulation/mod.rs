//! Rule-based device emulation.

pub mod clock;
pub mod engine;
pub mod preview;
pub mod program;

pub use clock::SimulationClock;
pub use engine::{
    EmulationEngine, SimState, TickReport, DEFAULT_SERIAL_DELAY, DEFAULT_TICK_INTERVAL,
};
pub use preview::PreviewRunner;
pub use program::{
    check_program, derive_simulation_policy, EmulationError, ProgramReport, SimulationPolicy,
    StructuralWarning,
};
