//! # GoNature Protocol Benchmarks
//!
//! | Area | Operation | Target |
//! |------|-----------|--------|
//! | gn-01 codec | encode + decode one guarded INSERT | < 50µs |
//! | gn-01 predicate | evaluate a 2-condition window | < 1µs |
//! | gn-02 registry | insert + complete under N in flight | < 5µs |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gn_01_query_protocol::codec::{decode_body, encode_frame, FRAME_HEADER_LEN};
use gn_01_query_protocol::{
    CapacityBound, CompareOp, Condition, CorrelationId, Predicate, QueryMessage, QueryResult,
    Value, DEFAULT_MAX_FRAME_LEN,
};
use gn_02_transport::PendingRequestRegistry;
use std::time::Duration;

fn window() -> Predicate {
    Predicate::new(Condition::new("visitTime", CompareOp::Ge, 1_000))
        .and(Condition::new("visitTime", CompareOp::Le, 30_000))
}

fn admission() -> QueryMessage {
    let mut msg = QueryMessage::insert("acadia_active")
        .set("bookingId", "b-1")
        .unwrap()
        .set("visitTime", 15_000)
        .unwrap()
        .set("numberOfVisitors", 10)
        .unwrap()
        .capacity_bound(CapacityBound {
            sum_column: "numberOfVisitors".into(),
            scope: window(),
            limit: 80,
            adding: 10,
        })
        .unwrap()
        .critical_resource(1)
        .unwrap()
        .build()
        .unwrap();
    msg.stamp(CorrelationId::new());
    msg
}

// ============================================================================
// gn-01: Codec and predicates
// ============================================================================

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("gn-01-codec");
    let msg = admission();

    group.bench_function("encode_guarded_insert", |b| {
        b.iter(|| black_box(encode_frame(&msg, DEFAULT_MAX_FRAME_LEN).unwrap()))
    });

    let frame = encode_frame(&msg, DEFAULT_MAX_FRAME_LEN).unwrap();
    group.bench_function("decode_guarded_insert", |b| {
        b.iter(|| black_box(decode_body(&frame[FRAME_HEADER_LEN..]).unwrap()))
    });
    group.finish();
}

fn bench_predicate(c: &mut Criterion) {
    let predicate = window();
    let inside = Value::Int(15_000);
    c.bench_function("gn-01-predicate/window_match", |b| {
        b.iter(|| black_box(predicate.matches(|_: &str| Some(&inside))))
    });
}

// ============================================================================
// gn-02: Pending request registry
// ============================================================================

fn bench_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("gn-02-registry");
    group.measurement_time(Duration::from_secs(5));

    for in_flight in [0usize, 100, 1_000] {
        let registry = PendingRequestRegistry::new();
        let kind = admission().kind();
        let _held: Vec<_> = (0..in_flight)
            .map(|_| {
                registry
                    .insert(CorrelationId::new(), kind, Duration::from_secs(30))
                    .unwrap()
            })
            .collect();

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("insert_complete", in_flight),
            &in_flight,
            |b, _| {
                b.iter(|| {
                    let msg = admission();
                    let id = msg.correlation_id().unwrap();
                    let rx = registry.insert(id, kind, Duration::from_secs(30)).unwrap();
                    registry.remove_and_complete(msg.into_reply(QueryResult::affected(1)));
                    black_box(rx)
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_codec, bench_predicate, bench_registry);
criterion_main!(benches);
