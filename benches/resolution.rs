//! Resolution cost with the built-in registry
//!
//! Decoding resolution is dominated by the single signature probe (64 KB
//! for the BGZF-based codecs); encoding resolution never touches the
//! resource.

use biometal_codecs::format::content_types::{ALIGNED_READS, VARIANT_CONTEXTS};
use biometal_codecs::io::compression::BgzfWriter;
use biometal_codecs::{Bundle, Registry, Version};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::io::{Cursor, Write};
use tempfile::TempDir;

fn vcf_gz(records: usize) -> Vec<u8> {
    let mut writer = BgzfWriter::new(Vec::new());
    writer
        .write_all(b"##fileformat=VCFv4.3\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n")
        .unwrap();
    for i in 0..records {
        writeln!(writer, "chr1\t{}\t.\tA\tT\t30\tPASS\tDP=10", i + 1).unwrap();
    }
    writer.finish().unwrap()
}

fn bench_decoding_resolution(c: &mut Criterion) {
    let registry = Registry::with_builtin_codecs().unwrap();
    let dir = TempDir::new().unwrap();
    let mut group = c.benchmark_group("resolve_for_decoding");

    for records in [10, 10_000] {
        let content = vcf_gz(records);
        let path = dir.path().join(format!("calls_{}.vcf.gz", records));
        std::fs::write(&path, &content).unwrap();

        group.bench_with_input(BenchmarkId::new("path", records), &path, |b, path| {
            b.iter(|| {
                let mut bundle = Bundle::from_path(path, VARIANT_CONTEXTS);
                black_box(registry.variants().resolve_for_decoding(&mut bundle).unwrap())
            })
        });

        group.bench_with_input(BenchmarkId::new("stream", records), &content, |b, content| {
            b.iter(|| {
                let stream = Cursor::new(content.clone());
                let mut bundle = Bundle::from_input_stream(stream, "stdin", VARIANT_CONTEXTS);
                black_box(registry.variants().resolve_for_decoding(&mut bundle).unwrap())
            })
        });
    }

    group.finish();
}

fn bench_encoding_resolution(c: &mut Criterion) {
    let registry = Registry::with_builtin_codecs().unwrap();

    c.bench_function("resolve_for_encoding/newest", |b| {
        b.iter(|| {
            let bundle = Bundle::from_path("out.cram", ALIGNED_READS);
            black_box(registry.reads().resolve_for_encoding(&bundle, Version::NEWEST).unwrap())
        })
    });
}

criterion_group!(benches, bench_decoding_resolution, bench_encoding_resolution);
criterion_main!(benches);
