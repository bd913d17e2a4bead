//! Circuit Graph
//!
//! Placed [`ComponentInstance`]s, the [`Wire`]s joining their pins, and the
//! cached [`Route`](crate::router::Route) of every wire.

pub mod graph;
pub mod ids;
pub mod state;

pub use graph::{CircuitGraph, CircuitStats, ComponentInstance, GraphError, PinHit, PinRef, Wire};
pub use ids::{IdGenerator, IdStyle};
pub use state::InstanceState;
