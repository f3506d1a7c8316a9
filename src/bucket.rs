//! Per-bucket payloads.
//!
//! A bucket map is generic over what it keeps per bucket instead of having one
//! type per facet flavour:
//!
//! | payload                         | slices | distinct |
//! |---------------------------------|--------|----------|
//! | `Stats<()>`                     | no     | no       |
//! | `Stats<CardinalityTracker>`     | no     | yes      |
//! | `Sliced<()>`                    | yes    | no       |
//! | `Sliced<CardinalityTracker>`    | yes    | yes      |
//!
//! `()` is the tracker of counting-only facets, so they allocate nothing beyond
//! their counters.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::BuildHasherDefault;

use wyhash::WyHash;

use crate::codec::Wire;
use crate::error::Result;
use crate::hyperloglog::HyperLogLog;
use crate::order::Order;
use crate::record::{BucketRecord, SliceRecord};
use crate::tracker::CardinalityTracker;
use crate::value::ValueFingerprint;

/// Distinct-value tracking attached to a bucket or slice.
pub trait Distinct: Clone + Debug + PartialEq + Wire {
    /// Sketch precision and register width, `None` when nothing is tracked.
    const SKETCH: Option<(u8, u8)>;
    /// Bytes taken by one promoted sketch.
    const SKETCH_BYTES: usize;

    fn with_threshold(threshold: u32) -> Self;
    fn update(&mut self, value: ValueFingerprint);
    fn merge_from(&mut self, rhs: &Self) -> Result<()>;
    /// Values recorded, duplicates included.
    fn occurrences(&self) -> u64;
    fn distinct_count(&self) -> Option<u64>;
}

impl Distinct for () {
    const SKETCH: Option<(u8, u8)> = None;
    const SKETCH_BYTES: usize = 0;

    #[inline]
    fn with_threshold(_: u32) -> Self {}

    #[inline]
    fn update(&mut self, _: ValueFingerprint) {}

    #[inline]
    fn merge_from(&mut self, _: &Self) -> Result<()> {
        Ok(())
    }

    fn occurrences(&self) -> u64 {
        0
    }

    fn distinct_count(&self) -> Option<u64> {
        None
    }
}

impl<const P: usize, const W: usize> Distinct for CardinalityTracker<P, W> {
    const SKETCH: Option<(u8, u8)> = Some((P as u8, W as u8));
    const SKETCH_BYTES: usize = HyperLogLog::<P, W>::sketch_bytes();

    #[inline]
    fn with_threshold(threshold: u32) -> Self {
        CardinalityTracker::new(threshold)
    }

    #[inline]
    fn update(&mut self, value: ValueFingerprint) {
        CardinalityTracker::update(self, value);
    }

    #[inline]
    fn merge_from(&mut self, rhs: &Self) -> Result<()> {
        self.merge(rhs)
    }

    fn occurrences(&self) -> u64 {
        self.count()
    }

    fn distinct_count(&self) -> Option<u64> {
        Some(self.cardinality())
    }
}

/// What a bucket map stores per bucket key.
pub trait Payload: Clone + Debug + PartialEq + Wire {
    type Tracker: Distinct;
    /// Whether records are further grouped by slice label.
    const SLICED: bool;

    fn empty(threshold: u32) -> Self;
    fn record(&mut self, slice: Option<&[u8]>, value: Option<ValueFingerprint>, threshold: u32);
    fn merge_from(&mut self, rhs: Self) -> Result<()>;
    fn total_count(&self) -> u64;
    fn to_record(&self, time: i64, slice_order: Order) -> BucketRecord;
}

/// Record count and distinct tracker of one bucket or slice.
#[derive(Clone, Debug, PartialEq)]
pub struct Stats<T> {
    pub(crate) total_count: u64,
    pub(crate) tracker: T,
}

impl<T: Distinct> Stats<T> {
    pub(crate) fn new(threshold: u32) -> Self {
        Self {
            total_count: 0,
            tracker: T::with_threshold(threshold),
        }
    }

    #[inline]
    fn record_value(&mut self, value: Option<ValueFingerprint>) {
        self.total_count += 1;
        if let Some(value) = value {
            self.tracker.update(value);
        }
    }

    fn merge_stats(&mut self, rhs: &Self) -> Result<()> {
        self.tracker.merge_from(&rhs.tracker)?;
        self.total_count += rhs.total_count;
        Ok(())
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn distinct_count(&self) -> Option<u64> {
        self.tracker.distinct_count()
    }
}

impl<T: Distinct> Payload for Stats<T> {
    type Tracker = T;
    const SLICED: bool = false;

    fn empty(threshold: u32) -> Self {
        Self::new(threshold)
    }

    /// Flat buckets ignore slice labels.
    #[inline]
    fn record(&mut self, _: Option<&[u8]>, value: Option<ValueFingerprint>, _: u32) {
        self.record_value(value);
    }

    fn merge_from(&mut self, rhs: Self) -> Result<()> {
        self.merge_stats(&rhs)
    }

    fn total_count(&self) -> u64 {
        self.total_count
    }

    fn to_record(&self, time: i64, _: Order) -> BucketRecord {
        BucketRecord {
            time,
            total_count: self.total_count,
            distinct_count: self.distinct_count(),
            slices: None,
        }
    }
}

pub(crate) type SliceMap<T> = HashMap<Vec<u8>, Stats<T>, BuildHasherDefault<WyHash>>;

/// Bucket broken down by slice label.
#[derive(Clone, Debug, PartialEq)]
pub struct Sliced<T> {
    /// Records in the bucket, including those without a slice label
    pub(crate) total_count: u64,
    pub(crate) slices: SliceMap<T>,
}

impl<T: Distinct> Sliced<T> {
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn slice(&self, label: &[u8]) -> Option<&Stats<T>> {
        self.slices.get(label)
    }

    pub fn slices(&self) -> impl Iterator<Item = (&[u8], &Stats<T>)> {
        self.slices.iter().map(|(label, stats)| (label.as_slice(), stats))
    }

    pub fn slice_count(&self) -> usize {
        self.slices.len()
    }
}

impl<T: Distinct> Payload for Sliced<T> {
    type Tracker = T;
    const SLICED: bool = true;

    fn empty(_: u32) -> Self {
        Self {
            total_count: 0,
            slices: SliceMap::default(),
        }
    }

    /// A record without a label counts toward the bucket only.
    #[inline]
    fn record(&mut self, slice: Option<&[u8]>, value: Option<ValueFingerprint>, threshold: u32) {
        self.total_count += 1;
        let Some(label) = slice else {
            return;
        };
        if let Some(stats) = self.slices.get_mut(label) {
            stats.record_value(value);
            return;
        }
        let mut stats = Stats::new(threshold);
        stats.record_value(value);
        self.slices.insert(label.to_vec(), stats);
    }

    fn merge_from(&mut self, rhs: Self) -> Result<()> {
        for (label, stats) in rhs.slices {
            match self.slices.entry(label) {
                Entry::Occupied(entry) => entry.into_mut().merge_stats(&stats)?,
                Entry::Vacant(entry) => {
                    entry.insert(stats);
                }
            }
        }
        self.total_count += rhs.total_count;
        Ok(())
    }

    fn total_count(&self) -> u64 {
        self.total_count
    }

    fn to_record(&self, time: i64, slice_order: Order) -> BucketRecord {
        let mut slices: Vec<SliceRecord> = self
            .slices
            .iter()
            .map(|(label, stats)| SliceRecord {
                label: label.clone(),
                total_count: stats.total_count,
                distinct_count: stats.distinct_count(),
            })
            .collect();
        slice_order.sort(&mut slices);

        BucketRecord {
            time,
            total_count: self.total_count,
            distinct_count: None,
            slices: Some(slices),
        }
    }
}
