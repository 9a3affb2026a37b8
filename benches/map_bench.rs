use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use mmap_view::{map, map_len, map_view};
use std::fs;
use std::path::PathBuf;

// Simple helper to build a unique temp path per bench
fn tmp_path(name: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("mmap_view_bench_{}_{}", name, std::process::id()));
    p
}

fn bench_map_whole(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_whole");
    for &size in &[4_usize * 1024, 64 * 1024, 1024 * 1024] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |ben, &sz| {
            let path = tmp_path(&format!("whole_{}", sz));
            fs::write(&path, vec![0x5A_u8; sz]).expect("seed");
            ben.iter(|| {
                let buf = map(&path).expect("map");
                criterion::black_box(buf[sz - 1]);
            });
            let _ = fs::remove_file(&path);
        });
    }
    group.finish();
}

fn bench_map_grow(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_grow");
    for &size in &[4_usize * 1024, 64 * 1024, 1024 * 1024] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |ben, &sz| {
            let path = tmp_path(&format!("grow_{}", sz));
            ben.iter_batched(
                || fs::write(&path, b"").expect("reset"),
                |()| {
                    let buf = map_len(&path, sz as u64).expect("map_len");
                    criterion::black_box(buf.len());
                },
                BatchSize::SmallInput,
            );
            let _ = fs::remove_file(&path);
        });
    }
    group.finish();
}

fn bench_typed_sum(c: &mut Criterion) {
    let mut group = c.benchmark_group("typed_sum");
    let size = 1024 * 1024;
    group.throughput(Throughput::Bytes(size as u64));
    let path = tmp_path("typed_sum");
    fs::write(&path, vec![1_u8; size]).expect("seed");
    let words = map_view::<u32, _, _>(&path, None::<u64>).expect("map_view");
    group.bench_function("u32", |ben| {
        ben.iter(|| words.iter().map(|&w| u64::from(w)).sum::<u64>());
    });
    drop(words);
    let _ = fs::remove_file(&path);
    group.finish();
}

criterion_group!(benches, bench_map_whole, bench_map_grow, bench_typed_sum);
criterion_main!(benches);
