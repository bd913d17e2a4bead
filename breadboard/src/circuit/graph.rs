//! Circuit Graph Implementation
//!
//! Owns the placed instances (in draw order, last = topmost), the wires in
//! insertion order, and the cached route of every wire. Routes are always
//! rebuilt in wire order with each finished route fed to the router as an
//! obstacle for the wires after it, so route assignment is order-dependent
//! by definition: an earlier wire keeps its lane, a later one yields.

use petgraph::unionfind::UnionFind;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::ids::IdGenerator;
use super::state::InstanceState;
use crate::device::DeviceDefinition;
use crate::router::{self, PinAnchor, Point, Route};

/// Offset from the camera origin at which new instances are placed.
pub const DEFAULT_PLACEMENT_ORIGIN: Point = Point::new(300.0, 200.0);
/// Placement jitter, inclusive on both sides.
pub const DEFAULT_PLACEMENT_JITTER: i32 = 60;
/// A click closer than this to a pin hits it.
pub const DEFAULT_PIN_HIT_RADIUS: f64 = 9.0;
/// A click closer than this to a route segment hits the wire.
pub const DEFAULT_WIRE_HIT_TOLERANCE: f64 = 8.0;

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("wire would connect pin '{pin}' of instance '{instance}' to itself")]
    SelfLoop { instance: String, pin: String },
    #[error("unknown instance: {0}")]
    UnknownInstance(String),
    #[error("unknown wire: {0}")]
    UnknownWire(String),
}

/// One end of a wire: a pin on a placed instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PinRef {
    pub instance: String,
    pub pin: String,
}

impl PinRef {
    pub fn new(instance: impl Into<String>, pin: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            pin: pin.into(),
        }
    }
}

impl std::fmt::Display for PinRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.instance, self.pin)
    }
}

/// Undirected logical connection between two pins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wire {
    pub id: String,
    pub a: PinRef,
    pub b: PinRef,
}

impl Wire {
    pub fn touches(&self, instance_id: &str) -> bool {
        self.a.instance == instance_id || self.b.instance == instance_id
    }
}

/// A placed occurrence of a device definition.
#[derive(Debug, Clone)]
pub struct ComponentInstance {
    pub id: String,
    definition: Arc<DeviceDefinition>,
    pub position: Point,
    pub state: InstanceState,
}

impl ComponentInstance {
    pub fn new(id: impl Into<String>, definition: Arc<DeviceDefinition>, position: Point) -> Self {
        let state = InstanceState::from_defaults(&definition.state_vars);
        Self {
            id: id.into(),
            definition,
            position,
            state,
        }
    }

    pub fn definition(&self) -> &Arc<DeviceDefinition> {
        &self.definition
    }

    /// World position of one of this instance's pins.
    pub fn pin_position(&self, pin_id: &str) -> Option<Point> {
        self.definition
            .pin(pin_id)
            .map(|p| self.position.offset(p.position()))
    }

    pub fn pin_anchor(&self, pin_id: &str) -> Option<PinAnchor> {
        self.definition
            .pin(pin_id)
            .map(|p| PinAnchor::new(self.position.offset(p.position()), p.side.clone()))
    }

    pub fn contains(&self, p: Point) -> bool {
        self.definition.contains(self.position, p)
    }

    pub fn reset_state(&mut self) {
        self.state.reset_to_defaults(&self.definition.state_vars);
    }
}

/// Result of a pin hit-test.
#[derive(Debug, Clone, PartialEq)]
pub struct PinHit {
    pub pin: PinRef,
    pub position: Point,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitStats {
    pub instance_count: usize,
    pub wire_count: usize,
    pub routed_wire_count: usize,
    pub net_count: usize,
}

/// Placed instances, wires and cached routes.
#[derive(Debug)]
pub struct CircuitGraph {
    instances: Vec<ComponentInstance>,
    wires: Vec<Wire>,
    routes: HashMap<String, Route>,
    selected: Option<String>,
    ids: IdGenerator,
    rng: StdRng,
    camera: Point,
    placement_origin: Point,
    placement_jitter: i32,
    pin_hit_radius: f64,
    wire_hit_tolerance: f64,
}

impl CircuitGraph {
    /// Graph with an entropy-seeded placement generator.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Graph whose placement jitter is reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            instances: Vec::new(),
            wires: Vec::new(),
            routes: HashMap::new(),
            selected: None,
            ids: IdGenerator::default(),
            rng,
            camera: Point::default(),
            placement_origin: DEFAULT_PLACEMENT_ORIGIN,
            placement_jitter: DEFAULT_PLACEMENT_JITTER,
            pin_hit_radius: DEFAULT_PIN_HIT_RADIUS,
            wire_hit_tolerance: DEFAULT_WIRE_HIT_TOLERANCE,
        }
    }

    pub fn with_ids(mut self, ids: IdGenerator) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_placement(mut self, origin: Point, jitter: i32) -> Self {
        self.placement_origin = origin;
        self.placement_jitter = jitter.max(0);
        self
    }

    pub fn with_hit_tolerances(mut self, pin_radius: f64, wire_tolerance: f64) -> Self {
        self.pin_hit_radius = pin_radius;
        self.wire_hit_tolerance = wire_tolerance;
        self
    }

    /// Pan offset of the view; placement happens relative to it.
    pub fn set_camera(&mut self, camera: Point) {
        self.camera = camera;
    }

    pub fn camera(&self) -> Point {
        self.camera
    }

    // ------------------------------------------------------------------
    // Instances
    // ------------------------------------------------------------------

    /// Place a new instance near the view centre with random jitter. The new
    /// instance becomes the selection. Returns its id.
    pub fn place_instance(&mut self, definition: Arc<DeviceDefinition>) -> String {
        let j = self.placement_jitter;
        let jx = self.rng.gen_range(-j..=j) as f64;
        let jy = self.rng.gen_range(-j..=j) as f64;
        let position = Point::new(
            -self.camera.x + self.placement_origin.x + jx,
            -self.camera.y + self.placement_origin.y + jy,
        );
        self.insert_instance(definition, position)
    }

    /// Place a new instance at an exact position. The new instance becomes
    /// the selection. Returns its id.
    pub fn place_instance_at(&mut self, definition: Arc<DeviceDefinition>, position: Point) -> String {
        self.insert_instance(definition, position)
    }

    fn insert_instance(&mut self, definition: Arc<DeviceDefinition>, position: Point) -> String {
        let id = self.ids.next_instance_id();
        info!(instance = %id, device = %definition.id, x = position.x, y = position.y, "placed instance");
        self.instances
            .push(ComponentInstance::new(id.clone(), definition, position));
        self.selected = Some(id.clone());
        self.recompute_routes();
        id
    }

    pub fn move_instance(&mut self, id: &str, x: f64, y: f64) -> Result<(), GraphError> {
        let instance = self
            .instance_mut(id)
            .ok_or_else(|| GraphError::UnknownInstance(id.to_string()))?;
        instance.position = Point::new(x, y);
        if self.wires.iter().any(|w| w.touches(id)) {
            self.recompute_routes();
        }
        Ok(())
    }

    /// Remove an instance and every wire with an end on it. Returns the ids
    /// of the removed wires.
    pub fn delete_instance(&mut self, id: &str) -> Result<Vec<String>, GraphError> {
        let index = self
            .instances
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| GraphError::UnknownInstance(id.to_string()))?;
        self.instances.remove(index);

        let (removed, kept): (Vec<Wire>, Vec<Wire>) =
            std::mem::take(&mut self.wires).into_iter().partition(|w| w.touches(id));
        self.wires = kept;

        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
        info!(instance = %id, wires_removed = removed.len(), "deleted instance");
        self.recompute_routes();
        Ok(removed.into_iter().map(|w| w.id).collect())
    }

    /// Delete the selected instance, if any.
    pub fn delete_selected(&mut self) -> Option<Vec<String>> {
        let id = self.selected.clone()?;
        self.delete_instance(&id).ok()
    }

    pub fn instance(&self, id: &str) -> Option<&ComponentInstance> {
        self.instances.iter().find(|i| i.id == id)
    }

    pub fn instance_mut(&mut self, id: &str) -> Option<&mut ComponentInstance> {
        self.instances.iter_mut().find(|i| i.id == id)
    }

    /// Instances in draw order (last is topmost).
    pub fn instances(&self) -> &[ComponentInstance] {
        &self.instances
    }

    pub fn instances_mut(&mut self) -> impl Iterator<Item = &mut ComponentInstance> {
        self.instances.iter_mut()
    }

    /// Reset every instance's state to its definition defaults.
    pub fn reset_states(&mut self) {
        for instance in &mut self.instances {
            instance.reset_state();
        }
    }

    pub fn select(&mut self, id: &str) -> Result<(), GraphError> {
        if self.instance(id).is_none() {
            return Err(GraphError::UnknownInstance(id.to_string()));
        }
        self.selected = Some(id.to_string());
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<&ComponentInstance> {
        self.selected.as_deref().and_then(|id| self.instance(id))
    }

    // ------------------------------------------------------------------
    // Wires
    // ------------------------------------------------------------------

    /// Connect two pins. Both ends naming the same pin of the same instance
    /// is rejected; endpoints are otherwise not checked.
    pub fn add_wire(&mut self, a: PinRef, b: PinRef) -> Result<String, GraphError> {
        if a == b {
            return Err(GraphError::SelfLoop {
                instance: a.instance,
                pin: a.pin,
            });
        }
        if self.resolve(&a).is_none() || self.resolve(&b).is_none() {
            warn!(from = %a, to = %b, "wire endpoint does not resolve; it will not be routed");
        }
        let id = self.ids.next_wire_id();
        debug!(wire = %id, from = %a, to = %b, "added wire");
        self.wires.push(Wire { id: id.clone(), a, b });
        self.recompute_routes();
        Ok(id)
    }

    pub fn delete_wire(&mut self, id: &str) -> Result<(), GraphError> {
        let index = self
            .wires
            .iter()
            .position(|w| w.id == id)
            .ok_or_else(|| GraphError::UnknownWire(id.to_string()))?;
        self.wires.remove(index);
        self.recompute_routes();
        Ok(())
    }

    /// Delete the wire whose route passes closest to `p`, if within the hit
    /// tolerance. Returns the removed wire id.
    pub fn delete_wire_near(&mut self, p: Point) -> Option<String> {
        let id = self.find_wire_near(p)?.id.clone();
        self.delete_wire(&id).ok()?;
        Some(id)
    }

    pub fn find_wire_near(&self, p: Point) -> Option<&Wire> {
        let mut best: Option<(&Wire, f64)> = None;
        for (wire, route) in self.routed_wires() {
            let Some(d) = route.distance_to(&p) else {
                continue;
            };
            if d < self.wire_hit_tolerance && best.map_or(true, |(_, bd)| d < bd) {
                best = Some((wire, d));
            }
        }
        best.map(|(w, _)| w)
    }

    pub fn wires(&self) -> &[Wire] {
        &self.wires
    }

    pub fn wire(&self, id: &str) -> Option<&Wire> {
        self.wires.iter().find(|w| w.id == id)
    }

    /// Cached polyline for a wire; `None` for dangling wires.
    pub fn route(&self, wire_id: &str) -> Option<&Route> {
        self.routes.get(wire_id)
    }

    /// Routed wires in wire order.
    pub fn routed_wires(&self) -> impl Iterator<Item = (&Wire, &Route)> {
        self.wires
            .iter()
            .filter_map(|w| self.routes.get(&w.id).map(|r| (w, r)))
    }

    fn resolve(&self, pin: &PinRef) -> Option<PinAnchor> {
        self.instance(&pin.instance)?.pin_anchor(&pin.pin)
    }

    pub fn is_dangling(&self, wire: &Wire) -> bool {
        self.resolve(&wire.a).is_none() || self.resolve(&wire.b).is_none()
    }

    /// Drop wires that reference a missing instance or pin. Dangling wires
    /// are otherwise left in place, unrouted. Returns the removed ids.
    pub fn purge_dangling_wires(&mut self) -> Vec<String> {
        let dangling: Vec<String> = self
            .wires
            .iter()
            .filter(|w| self.is_dangling(w))
            .map(|w| w.id.clone())
            .collect();
        if !dangling.is_empty() {
            self.wires.retain(|w| !dangling.contains(&w.id));
            self.recompute_routes();
        }
        dangling
    }

    /// Rebuild every route from scratch in wire order, each new route
    /// becoming an obstacle for the wires that follow.
    pub fn recompute_routes(&mut self) {
        let mut routes = HashMap::with_capacity(self.wires.len());
        let mut placed: Vec<Route> = Vec::with_capacity(self.wires.len());

        for wire in &self.wires {
            let (Some(a), Some(b)) = (self.resolve(&wire.a), self.resolve(&wire.b)) else {
                warn!(wire = %wire.id, "skipping dangling wire");
                continue;
            };
            let r = router::route(&a, &b, &placed);
            placed.push(r.clone());
            routes.insert(wire.id.clone(), r);
        }

        self.routes = routes;
    }

    // ------------------------------------------------------------------
    // Hit-testing
    // ------------------------------------------------------------------

    /// Topmost pin within the hit radius of `p`.
    pub fn find_pin_near(&self, p: Point) -> Option<PinHit> {
        self.instances.iter().rev().find_map(|inst| {
            inst.definition.pins.iter().find_map(|pin| {
                let position = inst.position.offset(pin.position());
                (p.distance_to(&position) < self.pin_hit_radius).then(|| PinHit {
                    pin: PinRef::new(inst.id.clone(), pin.id.clone()),
                    position,
                })
            })
        })
    }

    /// Topmost instance whose body contains `p`.
    pub fn find_instance_at(&self, p: Point) -> Option<&ComponentInstance> {
        self.instances.iter().rev().find(|inst| inst.contains(p))
    }

    // ------------------------------------------------------------------
    // Connectivity
    // ------------------------------------------------------------------

    /// Groups of pins joined through wires, in first-seen order. Dangling
    /// wires do not contribute.
    pub fn nets(&self) -> Vec<Vec<PinRef>> {
        let mut index: HashMap<&PinRef, usize> = HashMap::new();
        let mut endpoints: Vec<&PinRef> = Vec::new();
        let live: Vec<&Wire> = self.wires.iter().filter(|w| !self.is_dangling(w)).collect();

        for wire in &live {
            for end in [&wire.a, &wire.b] {
                index.entry(end).or_insert_with(|| {
                    endpoints.push(end);
                    endpoints.len() - 1
                });
            }
        }

        let mut sets = UnionFind::<usize>::new(endpoints.len());
        for wire in &live {
            sets.union(index[&wire.a], index[&wire.b]);
        }

        let mut groups: Vec<Vec<PinRef>> = Vec::new();
        let mut group_of_root: HashMap<usize, usize> = HashMap::new();
        for (i, end) in endpoints.iter().enumerate() {
            let root = sets.find(i);
            let g = *group_of_root.entry(root).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[g].push((*end).clone());
        }
        groups
    }

    pub fn stats(&self) -> CircuitStats {
        CircuitStats {
            instance_count: self.instances.len(),
            wire_count: self.wires.len(),
            routed_wire_count: self.routes.len(),
            net_count: self.nets().len(),
        }
    }
}

impl Default for CircuitGraph {
    fn default() -> Self {
        Self::new()
    }
}
