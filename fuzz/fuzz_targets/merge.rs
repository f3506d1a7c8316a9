#![no_main]

use distinct_histogram::{SlicedDistinctHistogram, ValueFingerprint};
use libfuzzer_sys::fuzz_target;
use wyhash::wyhash;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let threshold = u32::from(data[0] % 16);
    let chunks: Vec<&[u8]> = data.chunks(4).collect();
    let split_index = wyhash(data, 0) as usize % (chunks.len() + 1);
    let (first_half, second_half) = chunks.split_at(split_index);

    let fill = |part: &[&[u8]]| {
        let mut map: SlicedDistinctHistogram = SlicedDistinctHistogram::new(threshold);
        for chunk in part {
            let key = i64::from(chunk[0] % 4) * 60_000;
            let slice = chunk.get(1).map(std::slice::from_ref);
            map.record(key, slice, Some(ValueFingerprint::of_bytes(chunk)));
        }
        map
    };
    let lhs = fill(first_half);
    let rhs = fill(second_half);

    let merged = lhs.clone().merge(rhs.clone()).unwrap();
    assert_eq!(merged, rhs.merge(lhs).unwrap());
    assert_eq!(merged, fill(&chunks));
});
