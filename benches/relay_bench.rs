//! Benchmarks for the per-chunk and per-request hot paths.
//!
//! Run with: cargo bench --bench relay_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use chat_relay::{
    core::config::StreamProtocol,
    services::message_normalizer::normalize_messages,
    transformer::{decode_openai_event, ChunkFramer, SseParser},
};
use serde_json::{json, Value};

// ============================================================================
// Message Normalization Benchmarks
// ============================================================================

fn conversation(turns: usize) -> Value {
    let messages: Vec<Value> = (0..turns)
        .map(|i| match i % 3 {
            0 => json!({ "role": "user", "content": format!("Question number {}", i) }),
            1 => json!({
                "role": "assistant",
                "parts": [
                    { "type": "step-start" },
                    { "type": "text", "text": format!("Answer number {}", i) }
                ]
            }),
            _ => json!({
                "role": "user",
                "content": [{ "type": "text", "text": format!("Follow-up {}", i) }]
            }),
        })
        .collect();
    Value::Array(messages)
}

fn bench_normalize_messages(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize_messages");

    for turns in [1usize, 10, 100] {
        let messages = conversation(turns);
        group.throughput(Throughput::Elements(turns as u64));
        group.bench_with_input(BenchmarkId::from_parameter(turns), &messages, |b, messages| {
            b.iter(|| normalize_messages(black_box(Some(messages))))
        });
    }

    group.finish();
}

// ============================================================================
// Streaming Benchmarks
// ============================================================================

fn bench_decode_event(c: &mut Criterion) {
    let event = r#"{"id":"chatcmpl-1","object":"chat.completion.chunk","created":1700000000,"model":"gpt-4","choices":[{"index":0,"delta":{"content":"Hello"},"finish_reason":null}]}"#;

    c.bench_function("decode_openai_event", |b| {
        b.iter(|| decode_openai_event(black_box(event)))
    });
}

fn bench_sse_parse(c: &mut Criterion) {
    let event = r#"data: {"choices":[{"index":0,"delta":{"content":"Hello"}}]}"#;
    let body: String = (0..50).map(|_| format!("{}\n\n", event)).collect();
    let bytes = body.as_bytes();

    let mut group = c.benchmark_group("sse_parse");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("50_events_single_read", |b| {
        b.iter(|| {
            let mut parser = SseParser::new();
            parser.parse(black_box(bytes))
        })
    });
    group.bench_function("50_events_small_reads", |b| {
        b.iter(|| {
            let mut parser = SseParser::new();
            let mut count = 0;
            for piece in bytes.chunks(17) {
                count += parser.parse(black_box(piece)).len();
            }
            count
        })
    });
    group.finish();
}

fn bench_encode_chunk(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_chunk");
    for (name, protocol) in [("data", StreamProtocol::Data), ("text", StreamProtocol::Text)] {
        let framer = ChunkFramer::new(protocol);
        group.bench_function(name, |b| {
            b.iter(|| framer.encode_chunk(black_box("Hello \"world\"\n")))
        });
    }
    group.finish();
}

criterion_group!(normalize_benches, bench_normalize_messages);

criterion_group!(
    streaming_benches,
    bench_decode_event,
    bench_sse_parse,
    bench_encode_chunk,
);

criterion_main!(normalize_benches, streaming_benches);
