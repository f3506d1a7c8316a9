#![no_main]

use distinct_histogram::codec::{decode, encode};
use distinct_histogram::{CardinalityTracker, Sliced, Stats};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(map) = decode::<Stats<CardinalityTracker<8, 6>>>(data) {
        assert_eq!(decode::<Stats<CardinalityTracker<8, 6>>>(&encode(&map)).as_ref(), Ok(&map));
        for (_, stats) in map.iter() {
            assert!(stats.tracker().count() <= stats.total_count());
        }
    }
    if let Ok(map) = decode::<Sliced<CardinalityTracker<8, 6>>>(data) {
        assert_eq!(decode::<Sliced<CardinalityTracker<8, 6>>>(&encode(&map)).as_ref(), Ok(&map));
    }
});
