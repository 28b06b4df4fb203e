//! Benchmark for container operations over the handle allocator.
//!
//! TARGET: dictionary get under 200ns, ring write + read under 100ns
//!
//! Run with: cargo bench --package oroboros_containers --bench container_benchmark

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use oroboros_containers::{
    fnv1a_hash, polynomial_hash, sip_hash, CircularBuffer, Dictionary, HashFn, List,
};
use oroboros_memory::{Context, ContextId};

fn benchmark_dictionary_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("dictionary_get");

    let hashers: [(&str, HashFn); 3] = [
        ("polynomial", polynomial_hash),
        ("fnv1a", fnv1a_hash),
        ("sip", sip_hash),
    ];
    for (name, hasher) in hashers {
        let mut ctx = Context::new(ContextId::new(0), 1 << 20).unwrap();
        let page = ctx.alloc_page(1 << 18).unwrap();
        let database = ctx.allocate(page, 4096).unwrap();
        let dict = Dictionary::create(&mut ctx, page, Some(hasher), 1021, database).unwrap();
        for i in 0..1000usize {
            dict.set(&mut ctx, format!("entity_{i}").as_bytes(), i * 4).unwrap();
        }

        group.bench_with_input(BenchmarkId::from_parameter(name), &dict, |b, dict| {
            b.iter(|| black_box(dict.get(&ctx, black_box(b"entity_512")).unwrap()));
        });
    }

    group.finish();
}

fn benchmark_list_churn(c: &mut Criterion) {
    let mut ctx = Context::new(ContextId::new(0), 1 << 20).unwrap();
    let page = ctx.alloc_page(1 << 16).unwrap();
    let list = List::create(&mut ctx, page).unwrap();
    for i in 0..64 {
        list.append(&mut ctx, i * 8, 8).unwrap();
    }

    c.bench_function("list_append_free_reuse", |b| {
        b.iter(|| {
            let node = list.append(&mut ctx, black_box(4096), 8).unwrap();
            list.free_node(&mut ctx, node).unwrap();
        });
    });
}

fn benchmark_ring(c: &mut Criterion) {
    let mut ctx = Context::new(ContextId::new(0), 1 << 16).unwrap();
    let page = ctx.alloc_page(8192).unwrap();
    let ring = CircularBuffer::create(&mut ctx, page, 4096).unwrap();
    let packet = [0xA5u8; 48];
    let mut out = [0u8; 48];

    c.bench_function("ring_write_read_48b", |b| {
        b.iter(|| {
            ring.write(&mut ctx, black_box(&packet)).unwrap();
            black_box(ring.read(&mut ctx, &mut out).unwrap());
        });
    });
}

criterion_group!(
    benches,
    benchmark_dictionary_get,
    benchmark_list_churn,
    benchmark_ring
);
criterion_main!(benches);
