//! Binary encoding of bucket maps exchanged between shards and the reducer.
//!
//! ```text
//! u8      format version
//! u8      layout flags: bit0 = sliced, bit1 = distinct tracker present
//! varint  exact threshold
//! u8 u8   sketch precision and register width (distinct only)
//! varint  bucket count
//! per bucket, ascending key:
//!   i64 LE  bucket key
//!   varint  total count
//!   flat:   tracker state
//!   sliced: varint slice count, per slice ascending label:
//!           varint label length, label bytes, varint total count, tracker state
//! tracker state:
//!   varint  occurrence count
//!   u8      mode (0 = exact, 1 = hyperloglog)
//!   exact:  varint length, ascending u64 LE fingerprints
//!   hll:    varint word count, u32 LE register words
//! ```
//!
//! Everything is written in a canonical order, so equal maps encode to equal
//! bytes and `decode(encode(m)) == m` holds down to the sketch registers.

pub mod decode;
pub mod encode;

use crate::bucket::{Distinct, Payload, SliceMap, Sliced, Stats};
use crate::error::{Error, Result};
use crate::exact::Exact;
use crate::hyperloglog::HyperLogLog;
use crate::map::{BucketMap, BucketTable};
use crate::representation::{Mode, Representation};
use crate::tracker::CardinalityTracker;

use decode::WireSlice;
use encode::WireBytes;

pub(crate) const WIRE_VERSION: u8 = 1;
pub(crate) const FLAG_SLICED: u8 = 0b01;
pub(crate) const FLAG_DISTINCT: u8 = 0b10;

/// Binary form of one part of a bucket map.
pub trait Wire: Sized {
    fn encode_to(&self, out: &mut WireBytes);

    /// Decode a value written by [`Wire::encode_to`] for a map built with `threshold`
    fn decode_from(input: &mut WireSlice<'_>, threshold: u32) -> Result<Self>;
}

/// Encode `map` into its wire form
pub fn encode<S: Payload>(map: &BucketMap<S>) -> Vec<u8> {
    let mut out = WireBytes::with_capacity(16 + map.len() * 16);
    out.write_u8(WIRE_VERSION);
    out.write_u8(layout_flags::<S>());
    out.write_varint(u64::from(map.threshold()));
    if let Some((p, w)) = S::Tracker::SKETCH {
        out.write_u8(p);
        out.write_u8(w);
    }

    let buckets = map.sorted();
    out.write_varint(buckets.len() as u64);
    for (key, payload) in buckets {
        out.write_i64_le(key);
        payload.encode_to(&mut out);
    }
    out.into_bytes()
}

/// Decode a map encoded by [`encode`] with the same payload type
pub fn decode<S: Payload>(bytes: &[u8]) -> Result<BucketMap<S>> {
    let mut input = WireSlice::new(bytes);

    let version = input.read_u8("format version")?;
    if version != WIRE_VERSION {
        return Err(Error::decode(format!("unknown format version {version}")));
    }
    let flags = input.read_u8("layout flags")?;
    if flags & !(FLAG_SLICED | FLAG_DISTINCT) != 0 {
        return Err(Error::decode(format!("unknown layout flags {flags:#04x}")));
    }
    let expected = layout_flags::<S>();
    if flags != expected {
        return Err(Error::decode(format!(
            "layout mismatch: payload is {}, expected {}",
            describe_layout(flags),
            describe_layout(expected)
        )));
    }

    let threshold = input.read_varint("exact threshold")?;
    let threshold = u32::try_from(threshold)
        .map_err(|_| Error::decode(format!("exact threshold {threshold} out of range")))?;
    if let Some(sketch) = S::Tracker::SKETCH {
        let p = input.read_u8("sketch precision")?;
        let w = input.read_u8("register width")?;
        check_sketch::<S::Tracker>((p, w), sketch)?;
    }

    let len = input.read_len(9, "bucket count")?;
    let mut buckets = BucketTable::with_capacity_and_hasher(len, Default::default());
    let mut previous = None;
    for _ in 0..len {
        let key = input.read_i64_le("bucket key")?;
        if previous.is_some_and(|previous| previous >= key) {
            return Err(Error::decode(format!("bucket key {key} out of order")));
        }
        previous = Some(key);
        buckets.insert(key, S::decode_from(&mut input, threshold)?);
    }

    if input.remaining() != 0 {
        return Err(Error::decode(format!("{} trailing bytes", input.remaining())));
    }
    Ok(BucketMap::from_parts(threshold, buckets))
}

fn layout_flags<S: Payload>() -> u8 {
    let mut flags = 0;
    if S::SLICED {
        flags |= FLAG_SLICED;
    }
    if S::Tracker::SKETCH.is_some() {
        flags |= FLAG_DISTINCT;
    }
    flags
}

fn describe_layout(flags: u8) -> &'static str {
    match flags {
        0 => "flat counting",
        FLAG_SLICED => "sliced counting",
        FLAG_DISTINCT => "flat distinct",
        _ => "sliced distinct",
    }
}

/// Bytes of the register array for precision `p` and width `w`
fn sketch_bytes(p: u8, w: u8) -> usize {
    ((1usize << p) * usize::from(w)).div_ceil(32).saturating_add(1) * 4
}

fn check_sketch<T: Distinct>(found: (u8, u8), expected: (u8, u8)) -> Result<()> {
    let (p, w) = found;
    if !(4..=18).contains(&p) || !(4..=6).contains(&w) {
        return Err(Error::decode(format!("invalid sketch parameters p={p} w={w}")));
    }
    if found == expected {
        return Ok(());
    }
    let requested = sketch_bytes(p, w);
    if requested > T::SKETCH_BYTES {
        return Err(Error::EstimatorOverflow {
            requested,
            limit: T::SKETCH_BYTES,
        });
    }
    Err(Error::decode(format!(
        "sketch parameters p={p} w={w} differ from p={} w={}",
        expected.0, expected.1
    )))
}

impl Wire for () {
    fn encode_to(&self, _: &mut WireBytes) {}

    fn decode_from(_: &mut WireSlice<'_>, _: u32) -> Result<Self> {
        Ok(())
    }
}

impl<const P: usize, const W: usize> Wire for CardinalityTracker<P, W> {
    fn encode_to(&self, out: &mut WireBytes) {
        out.write_varint(self.count());
        out.write_u8(self.mode() as u8);
        match &self.representation {
            Representation::Exact(exact) => {
                let items = exact.sorted();
                out.write_varint(items.len() as u64);
                items.into_iter().for_each(|h| out.write_u64_le(h));
            }
            Representation::Hll(hll) => {
                let words = hll.words();
                out.write_varint(words.len() as u64);
                words.iter().for_each(|&word| out.write_u32_le(word));
            }
        }
    }

    fn decode_from(input: &mut WireSlice<'_>, threshold: u32) -> Result<Self> {
        let count = input.read_varint("occurrence count")?;
        let tag = input.read_u8("tracker mode")?;
        let mode = Mode::from_tag(tag).ok_or_else(|| Error::decode(format!("unknown tracker mode {tag}")))?;

        let representation = match mode {
            Mode::Exact => {
                if threshold == 0 {
                    return Err(Error::decode("exact set with a zero threshold"));
                }
                let len = input.read_len(8, "exact set length")?;
                if len > threshold as usize {
                    return Err(Error::decode(format!(
                        "exact set of {len} values exceeds threshold {threshold}"
                    )));
                }
                if u64::try_from(len).map_or(true, |len| len > count) {
                    return Err(Error::decode(format!(
                        "exact set of {len} values exceeds {count} occurrences"
                    )));
                }
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    let h = input.read_u64_le("fingerprint")?;
                    if items.last().is_some_and(|&last| last >= h) {
                        return Err(Error::decode("exact set not in ascending order"));
                    }
                    items.push(h);
                }
                Representation::Exact(items.into_iter().collect::<Exact>())
            }
            Mode::Hll => {
                let len = input.read_varint("register word count")?;
                let expected = HyperLogLog::<P, W>::WORDS_LEN;
                if len > expected as u64 {
                    return Err(Error::EstimatorOverflow {
                        requested: usize::try_from(len).unwrap_or(usize::MAX).saturating_mul(4),
                        limit: HyperLogLog::<P, W>::sketch_bytes(),
                    });
                }
                let raw = input.read_bytes(len as usize * 4, "register words")?;
                let words = raw
                    .chunks_exact(4)
                    .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                    .collect();
                let hll = HyperLogLog::from_words(words)
                    .ok_or_else(|| Error::decode(format!("register array of {len} words is malformed")))?;
                Representation::Hll(hll)
            }
        };
        Ok(CardinalityTracker::from_parts(threshold, count, representation))
    }
}

impl<T: Distinct> Wire for Stats<T> {
    fn encode_to(&self, out: &mut WireBytes) {
        out.write_varint(self.total_count);
        self.tracker.encode_to(out);
    }

    fn decode_from(input: &mut WireSlice<'_>, threshold: u32) -> Result<Self> {
        let total_count = input.read_varint("total count")?;
        let tracker = T::decode_from(input, threshold)?;
        if tracker.occurrences() > total_count {
            return Err(Error::decode(format!(
                "{} tracked values exceed total count {total_count}",
                tracker.occurrences()
            )));
        }
        Ok(Stats { total_count, tracker })
    }
}

impl<T: Distinct> Wire for Sliced<T> {
    fn encode_to(&self, out: &mut WireBytes) {
        out.write_varint(self.total_count);

        let mut slices: Vec<_> = self.slices.iter().collect();
        slices.sort_unstable_by(|a, b| a.0.cmp(b.0));
        out.write_varint(slices.len() as u64);
        for (label, stats) in slices {
            out.write_prefixed(label);
            stats.encode_to(out);
        }
    }

    fn decode_from(input: &mut WireSlice<'_>, threshold: u32) -> Result<Self> {
        let total_count = input.read_varint("total count")?;
        let len = input.read_len(2, "slice count")?;

        let mut slices = SliceMap::with_capacity_and_hasher(len, Default::default());
        let mut previous: Option<&[u8]> = None;
        let mut slice_total: u64 = 0;
        for _ in 0..len {
            let label = input.read_prefixed("slice label")?;
            if previous.is_some_and(|previous| previous >= label) {
                return Err(Error::decode("slice labels not in ascending order"));
            }
            previous = Some(label);

            let stats = Stats::<T>::decode_from(input, threshold)?;
            slice_total = slice_total
                .checked_add(stats.total_count)
                .filter(|&sum| sum <= total_count)
                .ok_or_else(|| Error::decode(format!("slice counts exceed bucket total {total_count}")))?;
            slices.insert(label.to_vec(), stats);
        }
        Ok(Sliced { total_count, slices })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{CountHistogram, DistinctHistogram, SlicedCountHistogram, SlicedDistinctHistogram};
    use crate::value::ValueFingerprint;
    use test_case::test_case;

    fn distinct_map(threshold: u32, distinct: i64) -> DistinctHistogram {
        let mut map: DistinctHistogram = DistinctHistogram::new(threshold);
        for i in 0..distinct {
            map.record(i % 3 * 60_000, None, Some(ValueFingerprint::of_long(i)));
        }
        map.record(-60_000, None, None);
        map
    }

    fn sliced_map(threshold: u32) -> SlicedDistinctHistogram {
        let mut map: SlicedDistinctHistogram = SlicedDistinctHistogram::new(threshold);
        for i in 0..500 {
            let label = format!("host-{}", i % 7);
            map.record(i / 100 * 60_000, Some(label.as_bytes()), Some(ValueFingerprint::of_long(i % 40)));
        }
        map.record(0, None, None);
        map
    }

    #[test]
    fn test_counting_bytes() {
        let mut map = CountHistogram::new(100);
        map.record(60_000, None, None);
        map.record(0, None, None);
        map.record(0, None, None);

        let mut expected = vec![WIRE_VERSION, 0, 100, 2];
        expected.extend_from_slice(&0i64.to_le_bytes());
        expected.push(2);
        expected.extend_from_slice(&60_000i64.to_le_bytes());
        expected.push(1);
        assert_eq!(encode(&map), expected);
    }

    #[test]
    fn test_exact_tracker_bytes() {
        let mut map: DistinctHistogram = DistinctHistogram::new(10);
        map.record(0, None, Some(ValueFingerprint::from_raw(7)));
        map.record(0, None, Some(ValueFingerprint::from_raw(3)));
        map.record(0, None, Some(ValueFingerprint::from_raw(7)));

        let mut expected = vec![WIRE_VERSION, FLAG_DISTINCT, 10, 14, 6, 1];
        expected.extend_from_slice(&0i64.to_le_bytes());
        expected.extend_from_slice(&[3, 3, Mode::Exact as u8, 2]);
        expected.extend_from_slice(&3u64.to_le_bytes());
        expected.extend_from_slice(&7u64.to_le_bytes());
        assert_eq!(encode(&map), expected);
    }

    #[test_case(0, 10; "always approximate")]
    #[test_case(100, 50; "exact")]
    #[test_case(100, 5_000; "promoted")]
    #[test_case(u32::MAX, 3_000; "always exact")]
    fn test_distinct_roundtrip(threshold: u32, distinct: i64) {
        let map = distinct_map(threshold, distinct);
        let bytes = encode(&map);
        let decoded: DistinctHistogram = decode(&bytes).unwrap();
        assert_eq!(decoded, map);
        assert_eq!(encode(&decoded), bytes);
    }

    #[test_case(0)]
    #[test_case(10)]
    #[test_case(1_000)]
    fn test_sliced_roundtrip(threshold: u32) {
        let map = sliced_map(threshold);
        let decoded: SlicedDistinctHistogram = decode(&encode(&map)).unwrap();
        assert_eq!(decoded, map);
    }

    #[test]
    fn test_sliced_counting_roundtrip() {
        let mut map = SlicedCountHistogram::new(0);
        map.record(0, Some(b"eu"), None);
        map.record(0, Some(b"us"), None);
        map.record(0, None, None);
        map.record(60_000, Some(b""), None);
        let decoded: SlicedCountHistogram = decode(&encode(&map)).unwrap();
        assert_eq!(decoded, map);
    }

    #[test]
    fn test_empty_roundtrip() {
        let map: SlicedDistinctHistogram = SlicedDistinctHistogram::new(5);
        let decoded: SlicedDistinctHistogram = decode(&encode(&map)).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(decoded.threshold(), 5);
    }

    /// Mixes exact slices with promoted ones on a sketch of three words.
    fn small_sliced_map() -> SlicedDistinctHistogram<4, 4> {
        let mut map: SlicedDistinctHistogram<4, 4> = BucketMap::new(3);
        for i in 0..40 {
            let label = format!("host-{}", i % 4);
            map.record(i / 20 * 60_000, Some(label.as_bytes()), Some(ValueFingerprint::of_long(i % 12)));
        }
        for i in 0..10 {
            map.record(0, Some(b"hot"), Some(ValueFingerprint::of_long(100 + i)));
        }
        map.record(0, None, None);
        map
    }

    #[test]
    fn test_every_truncation_fails() {
        let map = small_sliced_map();
        let hot = map.get(0).unwrap().slice(b"hot").unwrap();
        assert!(!hot.tracker().is_exact());
        assert!(map.get(0).unwrap().slice(b"host-1").unwrap().tracker().is_exact());

        let bytes = encode(&map);
        assert_eq!(decode::<Sliced<CardinalityTracker<4, 4>>>(&bytes).as_ref(), Ok(&map));
        for len in 0..bytes.len() {
            let result = decode::<Sliced<CardinalityTracker<4, 4>>>(&bytes[..len]);
            assert!(matches!(result, Err(Error::Decode(_))), "prefix of {len} bytes decoded");
        }
    }

    #[test]
    fn test_trailing_bytes() {
        let mut bytes = encode(&distinct_map(10, 5));
        bytes.push(0);
        assert_eq!(
            decode::<Stats<CardinalityTracker>>(&bytes),
            Err(Error::decode("1 trailing bytes"))
        );
    }

    #[test]
    fn test_unknown_version() {
        let mut bytes = encode(&CountHistogram::new(1));
        bytes[0] = 9;
        assert_eq!(
            decode::<Stats<()>>(&bytes),
            Err(Error::decode("unknown format version 9"))
        );
    }

    #[test]
    fn test_layout_mismatch() {
        let bytes = encode(&sliced_map(10));
        assert_eq!(
            decode::<Stats<CardinalityTracker>>(&bytes),
            Err(Error::decode(
                "layout mismatch: payload is sliced distinct, expected flat distinct"
            ))
        );
        assert!(matches!(decode::<Stats<()>>(&bytes), Err(Error::Decode(_))));
    }

    #[test]
    fn test_unknown_mode() {
        let map = distinct_map(10, 1);
        let mut bytes = encode(&map);
        // header (6) + bucket key (8) + total (1) + occurrences (1) of the first bucket
        let mode_at = 6 + 8 + 1 + 1;
        assert_eq!(bytes[mode_at], Mode::Exact as u8);
        bytes[mode_at] = 7;
        assert_eq!(
            decode::<Stats<CardinalityTracker>>(&bytes),
            Err(Error::decode("unknown tracker mode 7"))
        );
    }

    #[test]
    fn test_exact_set_over_threshold() {
        let bytes = encode(&distinct_map(10, 6));
        // lower the threshold below the two values stored per bucket
        let mut lowered = bytes.clone();
        lowered[2] = 1;
        assert_eq!(
            decode::<Stats<CardinalityTracker>>(&lowered),
            Err(Error::decode("exact set of 2 values exceeds threshold 1"))
        );
    }

    #[test]
    fn test_larger_sketch_overflows() {
        let map: DistinctHistogram<16, 6> = {
            let mut map = BucketMap::new(0);
            map.record(0, None, Some(ValueFingerprint::of_long(1)));
            map
        };
        let bytes = encode(&map);
        assert_eq!(
            decode::<Stats<CardinalityTracker<14, 6>>>(&bytes),
            Err(Error::EstimatorOverflow {
                requested: HyperLogLog::<16, 6>::sketch_bytes(),
                limit: HyperLogLog::<14, 6>::sketch_bytes(),
            })
        );
    }

    #[test]
    fn test_register_word_count_overflows() {
        let mut out = WireBytes::with_capacity(32);
        out.write_u8(WIRE_VERSION);
        out.write_u8(FLAG_DISTINCT);
        out.write_varint(0);
        out.write_u8(4);
        out.write_u8(5);
        out.write_varint(1);
        out.write_i64_le(0);
        out.write_varint(1);
        out.write_varint(1);
        out.write_u8(Mode::Hll as u8);
        out.write_varint(1 << 20);
        let bytes = out.into_bytes();

        assert!(matches!(
            decode::<Stats<CardinalityTracker<4, 5>>>(&bytes),
            Err(Error::EstimatorOverflow { .. })
        ));
    }

    #[test]
    fn test_duplicate_bucket_keys() {
        let mut out = WireBytes::with_capacity(32);
        out.write_u8(WIRE_VERSION);
        out.write_u8(0);
        out.write_varint(0);
        out.write_varint(2);
        for _ in 0..2 {
            out.write_i64_le(0);
            out.write_varint(1);
        }
        assert_eq!(
            decode::<Stats<()>>(&out.into_bytes()),
            Err(Error::decode("bucket key 0 out of order"))
        );
    }
}
