//! Benchmarks for graph updates.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use trellis_core::{LogicEngine, NodeHandle, PropertyKind, ScriptDefinition, TypeSpec};

fn chain(len: usize) -> (LogicEngine, Vec<NodeHandle>) {
    let mut engine = LogicEngine::new();
    engine
        .register_script(ScriptDefinition::new(
            "add_one",
            TypeSpec::structure([("x", TypeSpec::leaf(PropertyKind::Int64))]),
            TypeSpec::structure([("y", TypeSpec::leaf(PropertyKind::Int64))]),
            |inputs, outputs| outputs.set("y", inputs.get::<i64>("x")? + 1),
        ))
        .unwrap();

    let nodes: Vec<NodeHandle> = (0..len)
        .map(|i| engine.create_script(format!("n{i}"), "add_one").unwrap())
        .collect();
    for pair in nodes.windows(2) {
        let source = engine.output(pair[0], "y").unwrap();
        let target = engine.input(pair[1], "x").unwrap();
        engine.link(source, target).unwrap();
    }
    assert!(engine.tick());
    (engine, nodes)
}

fn bench_chain_full_update(c: &mut Criterion) {
    let (mut engine, nodes) = chain(1000);
    let head = engine.input(nodes[0], "x").unwrap();
    let mut value = 0i64;

    c.bench_function("chain_1000_full_update", |b| {
        b.iter(|| {
            value += 1;
            engine.set(head, value).unwrap();
            black_box(engine.tick())
        })
    });
}

fn bench_chain_clean_tick(c: &mut Criterion) {
    let (mut engine, _) = chain(1000);

    c.bench_function("chain_1000_clean_tick", |b| b.iter(|| black_box(engine.tick())));
}

fn bench_schedule_after_relink(c: &mut Criterion) {
    let (mut engine, nodes) = chain(1000);
    let source = engine.output(nodes[0], "y").unwrap();
    let target = engine.input(nodes[1], "x").unwrap();

    c.bench_function("chain_1000_reschedule", |b| {
        b.iter(|| {
            engine.unlink(source, target).unwrap();
            engine.link(source, target).unwrap();
            black_box(engine.execution_order().unwrap())
        })
    });
}

criterion_group!(
    benches,
    bench_chain_full_update,
    bench_chain_clean_tick,
    bench_schedule_after_relink
);
criterion_main!(benches);
