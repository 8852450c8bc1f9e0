use criterion::{black_box, criterion_group, criterion_main, Criterion};
use neurograph::buffer::{pull, push, Channel, Overwrite};
use neurograph::{Graph, Port};

fn bench_push_pull(c: &mut Criterion) {
    let packed = pull::Ring::<f32, 64>::default();
    c.bench_function("pull_ring_packed_push_pull", |b| {
        b.iter(|| {
            packed.push(black_box(1.5));
            black_box(packed.pull());
        })
    });

    let locked = pull::Ring::<f64, 64>::default();
    c.bench_function("pull_ring_locked_push_pull", |b| {
        b.iter(|| {
            locked.push(black_box(1.5));
            black_box(locked.pull());
        })
    });

    let latest = push::Double::<f32>::default();
    c.bench_function("push_double_overwrite_pop", |b| {
        b.iter(|| {
            latest.push(black_box(1.0));
            latest.push(black_box(2.0));
            black_box(latest.pop());
        })
    });
}

fn bench_fan_out(c: &mut Criterion) {
    // One source feeding 32 sinks.
    let graph = Graph::<pull::Single<f32>>::new();
    let source = graph.node(0.0).unwrap();
    let sinks: Vec<_> = (0..32).map(|_| graph.node(0.0).unwrap()).collect();
    for sink in &sinks {
        sink.add(source.id(), 0.5);
    }

    c.bench_function("broadcast_32_and_drain", |b| {
        b.iter(|| {
            black_box(source.broadcast(black_box(1.0)));
            for sink in &sinks {
                let inputs = sink.inputs();
                for port in inputs.iter() {
                    black_box(port.value() * port.pull());
                }
            }
        })
    });

    c.bench_function("link_and_clear_node", |b| {
        b.iter(|| {
            let hub = graph.node(0.0).unwrap();
            for sink in &sinks {
                hub.add_output(sink.id(), 1.0);
            }
            black_box(hub.outputs().iter().filter(|p| !p.is_ready()).count());
        })
    });
}

criterion_group!(benches, bench_push_pull, bench_fan_out);
criterion_main!(benches);
