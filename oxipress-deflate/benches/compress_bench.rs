//! Performance benchmarks for the DEFLATE encoder
//!
//! This benchmark suite evaluates:
//! - Compression throughput across data patterns
//! - Cost of additional squeeze iterations
//! - Decompression throughput
//!
//! The encoder trades speed for density, so sizes are kept moderate and
//! iteration counts low; the point is tracking regressions, not racing
//! fast compressors.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use oxipress_deflate::{compress, decompress, Format, Options};
use std::hint::black_box;

/// Generate test data patterns for benchmarking
mod test_data {
    /// Highly compressible repeated pattern
    pub fn repeated(size: usize) -> Vec<u8> {
        let pattern = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
        let mut data = Vec::with_capacity(size);
        while data.len() < size {
            data.extend_from_slice(pattern);
        }
        data.truncate(size);
        data
    }

    /// Random data - incompressible
    pub fn random(size: usize) -> Vec<u8> {
        // Simple PRNG for reproducible random data
        let mut data = Vec::with_capacity(size);
        let mut seed: u64 = 0x123456789ABCDEF0;
        for _ in 0..size {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            data.push((seed >> 32) as u8);
        }
        data
    }

    /// Text-like data
    pub fn text_like(size: usize) -> Vec<u8> {
        let text = b"The quick brown fox jumps over the lazy dog. ";
        let mut data = Vec::with_capacity(size);
        while data.len() < size {
            let remaining = size - data.len();
            let chunk_size = remaining.min(text.len());
            data.extend_from_slice(&text[..chunk_size]);
        }
        data
    }
}

/// Benchmark compression across data patterns
fn bench_compress_patterns(c: &mut Criterion) {
    let mut group = c.benchmark_group("compress_patterns");
    group.sample_size(10);
    let size = 4 * 1024;
    let options = Options::with_iterations(1);

    let patterns: [(&str, fn(usize) -> Vec<u8>); 3] = [
        ("repeated", test_data::repeated),
        ("random", test_data::random),
        ("text", test_data::text_like),
    ];

    for (pattern_name, generator) in patterns {
        let data = generator(size);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(pattern_name),
            &data,
            |b, data| {
                b.iter(|| {
                    let out = compress(&options, Format::Deflate, black_box(data)).unwrap();
                    black_box(out);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark the cost of extra squeeze iterations
fn bench_compress_iterations(c: &mut Criterion) {
    let mut group = c.benchmark_group("compress_iterations");
    group.sample_size(10);
    let data = test_data::text_like(4 * 1024);

    for iterations in [1u32, 5, 15] {
        let options = Options::with_iterations(iterations);

        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(iterations),
            &data,
            |b, data| {
                b.iter(|| {
                    let out = compress(&options, Format::Deflate, black_box(data)).unwrap();
                    black_box(out);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark decompression throughput
fn bench_decompress(c: &mut Criterion) {
    let mut group = c.benchmark_group("decompress");
    let data = test_data::text_like(64 * 1024);
    let options = Options::with_iterations(1);

    let compressed: [(&str, Vec<u8>, Format); 3] = [
        (
            "deflate",
            compress(&options, Format::Deflate, &data).unwrap(),
            Format::Deflate,
        ),
        (
            "zlib",
            compress(&options, Format::Zlib, &data).unwrap(),
            Format::Zlib,
        ),
        (
            "gzip",
            compress(&options, Format::Gzip, &data).unwrap(),
            Format::Gzip,
        ),
    ];

    group.throughput(Throughput::Bytes(data.len() as u64));
    for (name, bytes, format) in &compressed {
        group.bench_with_input(BenchmarkId::from_parameter(name), bytes, |b, bytes| {
            b.iter(|| {
                let out = decompress(*format, black_box(bytes)).unwrap();
                black_box(out);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_compress_patterns,
    bench_compress_iterations,
    bench_decompress
);
criterion_main!(benches);
