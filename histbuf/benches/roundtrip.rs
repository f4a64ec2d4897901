//! Container encode/decode and validation benchmarks over histograms of
//! increasing size.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use histbuf::{
    Axis, Collection, Distribution, Histogram, InterpretedInlineBuffer, RealInterval,
    RegularBinning, UnweightedCounts,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;

const SIZES: [u64; 3] = [100, 10_000, 1_000_000];

fn make_collection(bins: u64, rng: &mut StdRng) -> Collection {
    let binning = RegularBinning::new(bins, RealInterval::new(-1.0, 1.0).unwrap()).unwrap();
    let axis = Axis::new().with_binning(binning).unwrap().with_expression("x");
    let values: Vec<f64> = (0..bins + 2).map(|_| rng.gen_range(0.0..1000.0)).collect();
    let counts = UnweightedCounts::new(InterpretedInlineBuffer::from_values(&values)).unwrap();
    let histogram = Histogram::new("h", vec![axis], Distribution::new(counts).unwrap()).unwrap();
    Collection::new("bench", vec![histogram.into()]).unwrap()
}

fn bench_encode(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let mut group = c.benchmark_group("encode");
    for bins in SIZES {
        let collection = make_collection(bins, &mut rng);
        group.throughput(Throughput::Bytes((bins + 2) * 8));
        group.bench_with_input(BenchmarkId::from_parameter(bins), &collection, |b, collection| {
            b.iter(|| black_box(collection.to_container().unwrap()))
        });
    }
    group.finish();
}

fn bench_decode_and_validate(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(11);
    let mut group = c.benchmark_group("decode_validate");
    for bins in SIZES {
        let bytes = make_collection(bins, &mut rng).to_container().unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(bins), &bytes, |b, bytes| {
            b.iter(|| {
                let collection = Collection::from_container(black_box(bytes)).unwrap();
                collection.check_valid().unwrap();
                black_box(collection)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode_and_validate);
criterion_main!(benches);
