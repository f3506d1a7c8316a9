use distinct_histogram::codec::{decode, encode};
use distinct_histogram::{
    BucketMap, CardinalityTracker, CountHistogram, DistinctHistogram, FacetConfig, Payload, Sliced,
    SlicedDistinctHistogram, Stats, TimeUnit, TimeZoneRounding, ValueFingerprint,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use test_case::test_case;

fn per_minute(t: i64) -> i64 {
    t - t.rem_euclid(60_000)
}

/// One shard of records over ten minutes with values drawn from `values`.
fn shard<S: Payload>(threshold: u32, seed: u64, records: usize, values: u64) -> BucketMap<S> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut map = BucketMap::new(threshold);
    for _ in 0..records {
        let t = rng.gen_range(0..600_000);
        let value = rng.gen_range(0..values);
        let label = [b'a' + rng.gen_range(0..3u8)];
        let value = (value % 5 != 0).then(|| ValueFingerprint::of_bytes(&value.to_le_bytes()));
        map.record(per_minute(t), Some(&label), value);
    }
    map
}

fn merge<S: Payload>(lhs: &BucketMap<S>, rhs: &BucketMap<S>) -> BucketMap<S> {
    lhs.clone().merge(rhs.clone()).unwrap()
}

#[test_case(0, 50; "always approximate")]
#[test_case(20, 10; "exact")]
#[test_case(20, 10_000; "mixed modes")]
#[test_case(u32::MAX, 10_000; "always exact")]
fn test_merge_associative_and_commutative(threshold: u32, values: u64) {
    let a: SlicedDistinctHistogram = shard(threshold, 1, 3_000, values);
    let b: SlicedDistinctHistogram = shard(threshold, 2, 2_000, values);
    let c: SlicedDistinctHistogram = shard(threshold, 3, 500, values);

    let left = merge(&merge(&a, &b), &c);
    assert_eq!(left, merge(&a, &merge(&b, &c)));
    assert_eq!(left, merge(&merge(&a, &c), &b));
    assert_eq!(left, merge(&c, &merge(&b, &a)));

    let reduced = BucketMap::reduce([c, a, b]).unwrap().unwrap();
    assert_eq!(left, reduced);
}

#[test_case(0)]
#[test_case(30)]
#[test_case(u32::MAX)]
fn test_flat_merge_equals_single_pass(threshold: u32) {
    let shards: Vec<DistinctHistogram> = (0..4).map(|seed| shard(threshold, seed, 1_000, 2_000)).collect();
    let reduced = BucketMap::reduce(shards.iter().cloned()).unwrap().unwrap();

    let total: u64 = reduced.iter().map(|(_, stats)| stats.total_count()).sum();
    assert_eq!(total, 4_000);
    for (key, stats) in reduced.iter() {
        let per_shard: u64 = shards.iter().filter_map(|s| s.get(key)).map(|s| s.total_count()).sum();
        assert_eq!(stats.total_count(), per_shard);
    }
}

#[test]
fn test_exact_mode_is_exact() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut map: DistinctHistogram = DistinctHistogram::new(1_000);
    let mut truth = std::collections::HashMap::<i64, std::collections::HashSet<u64>>::new();
    for _ in 0..20_000 {
        let key = per_minute(rng.gen_range(0..300_000));
        let value = rng.gen_range(0..900);
        map.record(key, None, Some(ValueFingerprint::of_long(value)));
        truth.entry(key).or_default().insert(value as u64);
    }
    for (key, values) in truth {
        let stats = map.get(key).unwrap();
        assert!(stats.tracker().is_exact());
        assert_eq!(stats.distinct_count(), Some(values.len() as u64));
    }
}

#[test]
fn test_codec_roundtrip_survives_reduction_tree() {
    let shards: Vec<SlicedDistinctHistogram> = (0..6).map(|seed| shard(16, seed, 800, 5_000)).collect();

    let linear = BucketMap::reduce(shards.iter().cloned()).unwrap().unwrap();

    // two-level tree, every hop through the wire format
    let hop = |map: &SlicedDistinctHistogram| decode::<Sliced<CardinalityTracker>>(&encode(map)).unwrap();
    let left = BucketMap::reduce(shards[..3].iter().map(hop)).unwrap().unwrap();
    let right = BucketMap::reduce(shards[3..].iter().map(hop)).unwrap().unwrap();
    let tree = hop(&left).merge(hop(&right)).unwrap();

    assert_eq!(tree, linear);
    assert_eq!(encode(&tree), encode(&linear));
}

#[test]
fn test_facet_end_to_end() {
    let config = FacetConfig::builder(TimeZoneRounding::utc(TimeUnit::Minute))
        .cache_capacity(2)
        .build()
        .unwrap();

    let mut collector = config.collector::<Stats<()>>().unwrap();
    for t in [0, 0, 60_000, 120_000] {
        collector.collect(t, None, None);
    }
    let reduced: CountHistogram = config.reduce_encoded([collector.encode()]).unwrap().unwrap();
    let counts: Vec<(i64, u64)> = config
        .render(&reduced)
        .iter()
        .map(|r| (r.time, r.total_count))
        .collect();
    assert_eq!(counts, vec![(0, 2), (60_000, 1), (120_000, 1)]);
}
