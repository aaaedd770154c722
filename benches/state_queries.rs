use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use statehistory::{
    Event, ProcessingLatencyAnalysis, ProcessingStateProvider, Quark, StateSystem, StateValue,
    build_state_system,
};

fn lifecycle_events(requesters: usize, rounds: i64) -> Vec<Event> {
    let mut events = Vec::new();
    for round in 0..rounds {
        for (step, name) in ["processInit", "processStart", "processEnd"].iter().enumerate() {
            for r in 0..requesters {
                let ts = round * 100 + step as i64 * 30 + r as i64;
                events.push(
                    Event::new(*name, ts)
                        .with_field("requester", format!("r{}", r))
                        .with_field("id", round)
                        .with_field("value", ts),
                );
            }
        }
    }
    events
}

fn populated(intervals: i64) -> (StateSystem, Quark) {
    let ss = StateSystem::new();
    let quark = ss.get_or_create_quark(&["cpu", "0"]).unwrap();
    for t in 0..intervals {
        ss.modify_attribute(t * 10, StateValue::Long(t % 7), quark)
            .unwrap();
    }
    ss.close_store(intervals * 10).unwrap();
    (ss, quark)
}

fn bench_modify(c: &mut Criterion) {
    let mut group = c.benchmark_group("modify_attribute");

    for num_ops in [100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*num_ops as u64));

        group.bench_with_input(BenchmarkId::new("alternating", num_ops), num_ops, |b, &n| {
            b.iter(|| {
                let ss = StateSystem::new();
                let quark = ss.get_or_create_quark(&["cpu", "0"]).unwrap();
                for t in 0..n {
                    ss.modify_attribute(t, StateValue::Int((t % 2) as i32), quark)
                        .unwrap();
                }
                ss.close_store(n).unwrap();
            });
        });

        group.bench_with_input(BenchmarkId::new("coalesced", num_ops), num_ops, |b, &n| {
            b.iter(|| {
                let ss = StateSystem::new();
                let quark = ss.get_or_create_quark(&["cpu", "0"]).unwrap();
                for t in 0..n {
                    ss.modify_attribute(t, StateValue::Int(1), quark).unwrap();
                }
                ss.close_store(n).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("queries");

    for intervals in [1_000i64, 100_000].iter() {
        let (ss, quark) = populated(*intervals);
        let end = intervals * 10;

        group.bench_with_input(
            BenchmarkId::new("single_state", intervals),
            intervals,
            |b, _| {
                let mut t = 0;
                b.iter(|| {
                    t = (t + 7_919) % end;
                    black_box(ss.query_single_state(t, quark).unwrap());
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("history_range_100", intervals),
            intervals,
            |b, _| {
                b.iter(|| black_box(ss.query_history_range(quark, end / 2, end / 2 + 1_000).unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_providers(c: &mut Criterion) {
    let mut group = c.benchmark_group("providers");
    let events = lifecycle_events(16, 200);
    group.throughput(Throughput::Elements(events.len() as u64));

    group.bench_function("processing_state_provider", |b| {
        b.iter(|| {
            let ss = StateSystem::new();
            build_state_system(&ss, &mut ProcessingStateProvider::new(), events.clone()).unwrap();
            black_box(ss.stats())
        });
    });

    group.bench_function("processing_latency", |b| {
        b.iter(|| {
            let store = ProcessingLatencyAnalysis::default()
                .run(events.clone())
                .unwrap();
            black_box(store.segments_intersecting(5_000, 6_000).unwrap())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_modify, bench_queries, bench_providers);
criterion_main!(benches);
