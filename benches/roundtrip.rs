#![allow(missing_docs)]

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use rdx::{Rdx, Session, Sexp, SexpId, VectorData, WireFormat, NA_INTEGER};
use std::hint::black_box;

// --- DATA GENERATION ---

/// A workspace-shaped graph: a named pairlist of mixed vectors with shared
/// symbols, roughly `columns * rows` scalar values.
fn generate_workspace(session: &mut Session, columns: usize, rows: usize) -> SexpId {
    let mut entries = Vec::with_capacity(columns);
    for c in 0..columns {
        let value = match c % 3 {
            0 => {
                let values = (0..rows)
                    .map(|r| if r % 97 == 0 { NA_INTEGER } else { r as i32 })
                    .collect();
                session.alloc(Sexp::Ints(VectorData::new(values)))
            }
            1 => {
                let values = (0..rows).map(|r| r as f64 * 0.25).collect();
                session.alloc(Sexp::Doubles(VectorData::new(values)))
            }
            _ => {
                let values = (0..rows).map(|r| Some(format!("row-{r}"))).collect();
                session.alloc(Sexp::Strings(VectorData::new(values)))
            }
        };
        entries.push((format!("column_{c}"), value));
    }
    session.named_pairlist(entries)
}

// --- BENCHMARKS ---

fn bench_write(c: &mut Criterion) {
    let mut session = Session::new();
    let root = generate_workspace(&mut session, 12, 10_000);

    let mut baseline = Vec::new();
    Rdx::write(&session, &mut baseline, root).expect("encoding failed");

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(baseline.len() as u64));
    for format in [WireFormat::Xdr, WireFormat::Binary, WireFormat::Ascii] {
        group.bench_function(format!("{format:?}"), |b| {
            let mut buffer = Vec::with_capacity(baseline.len() * 2);
            b.iter(|| {
                buffer.clear();
                Rdx::write_as(black_box(&session), &mut buffer, root, format)
                    .expect("encoding failed");
                black_box(buffer.len());
            });
        });
    }
    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let mut session = Session::new();
    let root = generate_workspace(&mut session, 12, 10_000);

    let mut group = c.benchmark_group("decode");
    for format in [WireFormat::Xdr, WireFormat::Binary, WireFormat::Ascii] {
        let mut buffer = Vec::new();
        Rdx::write_as(&session, &mut buffer, root, format).expect("encoding failed");
        group.throughput(Throughput::Bytes(buffer.len() as u64));
        group.bench_function(format!("{format:?}"), |b| {
            b.iter(|| {
                let mut decoded_session = Session::new();
                let decoded = Rdx::read(&mut decoded_session, black_box(buffer.as_slice()))
                    .expect("decoding failed");
                black_box(decoded);
            });
        });
    }
    group.finish();
}

fn bench_shared_structure(c: &mut Criterion) {
    // Heavy reference-table traffic: many cells tagged by a small symbol pool.
    let mut session = Session::new();
    let pool: Vec<SexpId> = (0..16).map(|i| session.intern(&format!("sym{i}"))).collect();
    let mut next = session.null();
    for i in 0..50_000usize {
        let value = session.alloc(Sexp::Ints(VectorData::new(vec![i as i32])));
        next = session.pair(Some(pool[i % pool.len()]), value, next);
    }

    let mut buffer = Vec::new();
    Rdx::write(&session, &mut buffer, next).expect("encoding failed");

    let mut group = c.benchmark_group("shared_structure");
    group.throughput(Throughput::Bytes(buffer.len() as u64));
    group.bench_function("decode_xdr", |b| {
        b.iter(|| {
            let mut decoded_session = Session::new();
            let decoded = Rdx::read(&mut decoded_session, black_box(buffer.as_slice()))
                .expect("decoding failed");
            black_box(decoded);
        });
    });
    group.finish();
}

criterion_group!(benches, bench_write, bench_read, bench_shared_structure);
criterion_main!(benches);
