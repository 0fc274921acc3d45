// In chnative-core/benches/column_bench.rs

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use chnative::{resolve, Buffer, Column, Reader, ServerContext, Value};

// --- Mock data generation ---

/// Random unsigned integers.
fn generate_u64(rows: usize, rng: &mut StdRng) -> Vec<Value> {
    (0..rows).map(|_| Value::UInt64(rng.random())).collect()
}

/// Strings drawn from a small vocabulary, the shape LowCardinality is for.
fn generate_labels(rows: usize, rng: &mut StdRng) -> Vec<Value> {
    const LABELS: [&str; 6] = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta"];
    (0..rows)
        .map(|_| Value::from(LABELS[rng.random_range(0..LABELS.len())]))
        .collect()
}

/// A mix of scalar types for Dynamic branch selection.
fn generate_mixed(rows: usize, rng: &mut StdRng) -> Vec<Value> {
    (0..rows)
        .map(|i| match i % 3 {
            0 => Value::Int64(rng.random()),
            1 => Value::Float64(rng.random()),
            _ => Value::from(format!("s{}", rng.random_range(0..1000))),
        })
        .collect()
}

fn encode_column(type_name: &str, values: &[Value], ctx: &ServerContext) -> Vec<u8> {
    let mut col = resolve("bench", type_name, ctx).unwrap();
    col.append(values).unwrap();
    let mut buffer = Buffer::new();
    col.write_state_prefix(&mut buffer).unwrap();
    col.encode(&mut buffer);
    buffer.into_inner()
}

fn decode_column(type_name: &str, bytes: &[u8], rows: usize, ctx: &ServerContext) -> Box<dyn Column> {
    let mut input: &[u8] = bytes;
    let mut reader = Reader::new(&mut input);
    let mut col = resolve("bench", type_name, ctx).unwrap();
    col.read_state_prefix(&mut reader).unwrap();
    col.decode(&mut reader, rows).unwrap();
    col
}

// --- Benchmark suite ---

const ROWS: usize = 65536;

fn bench_columns(c: &mut Criterion) {
    let ctx = ServerContext::default();
    let mut rng = StdRng::seed_from_u64(7);

    let cases = [
        ("UInt64", generate_u64(ROWS, &mut rng)),
        ("String", generate_labels(ROWS, &mut rng)),
        ("LowCardinality(String)", generate_labels(ROWS, &mut rng)),
        ("Dynamic", generate_mixed(ROWS, &mut rng)),
    ];

    let mut group = c.benchmark_group("Column codec");
    group.throughput(Throughput::Elements(ROWS as u64));

    for (type_name, values) in &cases {
        group.bench_function(format!("Append+Encode {}", type_name), |b| {
            b.iter(|| black_box(encode_column(type_name, black_box(values), &ctx)))
        });

        let encoded = encode_column(type_name, values, &ctx);
        group.bench_function(format!("Decode {}", type_name), |b| {
            b.iter(|| black_box(decode_column(type_name, black_box(&encoded), ROWS, &ctx)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_columns);
criterion_main!(benches);
