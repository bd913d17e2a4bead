use breadboard::prelude::*;
use breadboard::router::{route, PinAnchor, Route};
use breadboard::{Pin, PinSide};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

fn anchors(n: usize) -> Vec<(PinAnchor, PinAnchor)> {
    (0..n)
        .map(|i| {
            let y = (i * 24) as f64;
            (
                PinAnchor::new(Point::new(0.0, y), PinSide::Right),
                PinAnchor::new(Point::new(400.0, 300.0 - y), PinSide::Left),
            )
        })
        .collect()
}

fn bench_route_crowded(c: &mut Criterion) {
    let pairs = anchors(12);
    let mut existing: Vec<Route> = Vec::new();
    for (a, b) in &pairs[..11] {
        let r = route(a, b, &existing);
        existing.push(r);
    }
    let (a, b) = &pairs[11];

    c.bench_function("route_against_11", |bench| {
        bench.iter(|| route(black_box(a), black_box(b), black_box(&existing)));
    });
}

fn bench_recompute_routes(c: &mut Criterion) {
    let def = Arc::new(
        DeviceDefinition::new("r", "Resistor")
            .with_size(60.0, 20.0)
            .with_pin(Pin::new("a", 0.0, 10.0, PinSide::Left))
            .with_pin(Pin::new("b", 60.0, 10.0, PinSide::Right)),
    );
    let mut graph = CircuitGraph::with_seed(1);
    let ids: Vec<String> = (0..20)
        .map(|i| graph.place_instance_at(def.clone(), Point::new((i % 5) as f64 * 120.0, (i / 5) as f64 * 80.0)))
        .collect();
    for pair in ids.windows(2) {
        let _ = graph.add_wire(PinRef::new(&pair[0], "b"), PinRef::new(&pair[1], "a"));
    }

    c.bench_function("recompute_19_wires", |bench| {
        bench.iter(|| graph.recompute_routes());
    });
}

criterion_group!(benches, bench_route_crowded, bench_recompute_routes);
criterion_main!(benches);
