#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use criterion::measurement::WallTime;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkGroup, BenchmarkId, Criterion, Throughput};
use distinct_histogram::codec::{decode, encode};
use distinct_histogram::{
    BucketMap, CountHistogram, DistinctHistogram, Payload, SlicedDistinctHistogram, TimeUnit, TimeZoneRounding,
    ValueFingerprint,
};
use distinct_histogram::{Rounding, RoundingCache};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Collection, merge and codec operations are benchmarked against per-bucket cardinalities
/// ranging from 0 to `DEFAULT_MAX_CARDINALITY` or environment variable `N` (if defined) with
/// cardinality doubled with every iteration as [0, 1, 2, ..., N].
const DEFAULT_MAX_CARDINALITY: usize = 4096;

/// Distinct values kept exactly before promotion.
const THRESHOLD: u32 = 256;

/// Buckets every benchmark spreads its records over.
const BUCKETS: i64 = 16;

criterion_group!(benches, benchmark);
criterion_main!(benches);

fn benchmark(c: &mut Criterion) {
    let max_cardinality = std::env::var("N")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_CARDINALITY);

    let cardinalities: Vec<usize> = std::iter::once(0)
        .chain((0..).map(|c| 1 << c))
        .take_while(|&c| c <= max_cardinality)
        .collect();

    let mut group = c.benchmark_group("round");
    group.throughput(Throughput::Elements(10_000));
    let rounding = TimeZoneRounding::utc(TimeUnit::Day);
    group.bench_function("day-uncached", |b| {
        b.iter(|| {
            for t in 0..10_000i64 {
                black_box(rounding.round(black_box(t * 1_000)));
            }
        });
    });
    for capacity in [0, 16, 1024] {
        bench_round(&mut group, rounding, capacity);
    }
    group.finish();

    let mut group = c.benchmark_group("record");
    for &cardinality in &cardinalities {
        group.throughput(Throughput::Elements(cardinality.max(1) as u64 * BUCKETS as u64));
        bench_record::<CountHistogram>(&mut group, "count", cardinality);
        bench_record::<DistinctHistogram>(&mut group, "distinct", cardinality);
        bench_record::<SlicedDistinctHistogram>(&mut group, "sliced-distinct", cardinality);
    }
    group.finish();

    let mut group = c.benchmark_group("merge");
    for &cardinality in &cardinalities {
        bench_merge::<DistinctHistogram>(&mut group, "distinct", cardinality);
        bench_merge::<SlicedDistinctHistogram>(&mut group, "sliced-distinct", cardinality);
    }
    group.finish();

    let mut group = c.benchmark_group("codec");
    for &cardinality in &cardinalities {
        bench_codec::<DistinctHistogram>(&mut group, "distinct", cardinality);
    }
    group.finish();

    for &cardinality in &cardinalities {
        println!(
            "cardinality {cardinality}: {} (bytes allocated / blocks), relative error {}",
            measure_allocations(cardinality),
            measure_error(cardinality)
        );
    }
}

/// Fill every bucket with `cardinality` distinct values, spread over four slices.
fn build<S: Payload>(cardinality: usize, seed: u64) -> BucketMap<S> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut map = BucketMap::new(THRESHOLD);
    for key in 0..BUCKETS {
        for _ in 0..cardinality {
            let value: u64 = rng.gen();
            let slice = [b'a' + (value % 4) as u8];
            map.record(key * 60_000, Some(&slice), Some(ValueFingerprint::from_raw(value)));
        }
    }
    map
}

fn bench_round(group: &mut BenchmarkGroup<WallTime>, rounding: TimeZoneRounding, capacity: usize) {
    group.bench_with_input(BenchmarkId::new("day", capacity), &capacity, |b, &capacity| {
        b.iter(|| {
            let mut cache = RoundingCache::new(rounding, capacity);
            for t in 0..10_000i64 {
                black_box(cache.round(black_box(t * 1_000)));
            }
        });
    });
}

fn bench_record<S: Payload>(group: &mut BenchmarkGroup<WallTime>, name: &str, cardinality: usize) {
    group.bench_with_input(BenchmarkId::new(name, cardinality), &cardinality, |b, &cardinality| {
        b.iter(|| build::<S>(black_box(cardinality), 1));
    });
}

fn bench_merge<S: Payload>(group: &mut BenchmarkGroup<WallTime>, name: &str, cardinality: usize) {
    let lhs = build::<S>(cardinality, 1);
    let rhs = build::<S>(cardinality, 2);
    group.bench_with_input(BenchmarkId::new(name, cardinality), &cardinality, |b, _| {
        b.iter(|| lhs.clone().merge(black_box(rhs.clone())).unwrap());
    });
}

fn bench_codec<S: Payload>(group: &mut BenchmarkGroup<WallTime>, name: &str, cardinality: usize) {
    let map = build::<S>(cardinality, 1);
    let bytes = encode(&map);
    group.bench_with_input(BenchmarkId::new(format!("{name}-encode"), cardinality), &cardinality, |b, _| {
        b.iter(|| encode(black_box(&map)));
    });
    group.bench_with_input(BenchmarkId::new(format!("{name}-decode"), cardinality), &cardinality, |b, _| {
        b.iter(|| decode::<S>(black_box(&bytes)).unwrap());
    });
}

fn measure_allocations(cardinality: usize) -> String {
    let _profiler = dhat::Profiler::builder().testing().build();
    let map = build::<DistinctHistogram>(cardinality, 1);
    let stats = dhat::HeapStats::get();
    drop(map);
    format!("{} / {}", stats.curr_bytes, stats.curr_blocks)
}

fn measure_error(cardinality: usize) -> String {
    if cardinality == 0 {
        return "0".to_string();
    }
    let map = build::<DistinctHistogram>(cardinality, 12345);
    let total_relative_error: f64 = map
        .iter()
        .filter_map(|(_, stats)| stats.distinct_count())
        .map(|estimate| (estimate as f64 - cardinality as f64).abs() / cardinality as f64)
        .sum();
    let avg_relative_error = total_relative_error / map.len() as f64;

    if avg_relative_error < 1.0 {
        format!("{:.4}", avg_relative_error)
    } else {
        format!("{:.2e}", avg_relative_error)
    }
}
