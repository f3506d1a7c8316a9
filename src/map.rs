//! Bucket maps: collection, reduction and ordered emission.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::BuildHasherDefault;

use tracing::debug;
use wyhash::WyHash;

use crate::bucket::{Payload, Sliced, Stats};
use crate::error::{Error, Result};
use crate::order::Order;
use crate::record::BucketRecord;
use crate::tracker::CardinalityTracker;
use crate::value::ValueFingerprint;

pub(crate) type BucketTable<S> = HashMap<i64, S, BuildHasherDefault<WyHash>>;

/// Per-bucket counts without distinct tracking.
pub type CountHistogram = BucketMap<Stats<()>>;
/// Per-bucket counts and distinct values.
pub type DistinctHistogram<const P: usize = 14, const W: usize = 6> = BucketMap<Stats<CardinalityTracker<P, W>>>;
/// Per-slice counts within each bucket.
pub type SlicedCountHistogram = BucketMap<Sliced<()>>;
/// Per-slice counts and distinct values within each bucket.
pub type SlicedDistinctHistogram<const P: usize = 14, const W: usize = 6> =
    BucketMap<Sliced<CardinalityTracker<P, W>>>;

/// Mapping from bucket key to its payload.
///
/// All trackers of a map share the map's exact threshold. Maps built with the
/// same threshold form a commutative monoid under [`BucketMap::merge`], so
/// shard results may be folded in any order or grouping.
#[derive(Clone, Debug, PartialEq)]
pub struct BucketMap<S> {
    threshold: u32,
    buckets: BucketTable<S>,
}

impl<S: Payload> BucketMap<S> {
    /// Empty map whose trackers promote past `threshold` distinct values
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            buckets: BucketTable::default(),
        }
    }

    pub(crate) fn from_parts(threshold: u32, buckets: BucketTable<S>) -> Self {
        Self { threshold, buckets }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Count one record under bucket `key`, creating the bucket on first use.
    #[inline]
    pub fn record(&mut self, key: i64, slice: Option<&[u8]>, value: Option<ValueFingerprint>) {
        let threshold = self.threshold;
        self.buckets
            .entry(key)
            .or_insert_with(|| S::empty(threshold))
            .record(slice, value, threshold);
    }

    pub fn get(&self, key: i64) -> Option<&S> {
        self.buckets.get(&key)
    }

    /// Number of buckets
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Buckets in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (i64, &S)> {
        self.buckets.iter().map(|(&key, payload)| (key, payload))
    }

    /// Buckets in ascending key order
    pub(crate) fn sorted(&self) -> Vec<(i64, &S)> {
        let mut buckets: Vec<_> = self.iter().collect();
        buckets.sort_unstable_by_key(|&(key, _)| key);
        buckets
    }

    /// Fold `other` into `self`.
    ///
    /// Buckets present on one side are carried over, buckets present on both
    /// sides have their counts summed and their trackers merged. Fails without
    /// touching `self` when the maps were built with different thresholds.
    pub fn merge_from(&mut self, mut other: Self) -> Result<()> {
        if self.threshold != other.threshold {
            return Err(Error::threshold_mismatch(self.threshold, other.threshold));
        }
        if other.buckets.len() > self.buckets.len() {
            std::mem::swap(&mut self.buckets, &mut other.buckets);
        }

        for (key, payload) in other.buckets {
            match self.buckets.entry(key) {
                Entry::Occupied(entry) => entry.into_mut().merge_from(payload)?,
                Entry::Vacant(entry) => {
                    entry.insert(payload);
                }
            }
        }
        Ok(())
    }

    /// Merge two maps into one
    pub fn merge(mut self, other: Self) -> Result<Self> {
        self.merge_from(other)?;
        Ok(self)
    }

    /// Fold any number of shard results. `None` when there are none.
    pub fn reduce(maps: impl IntoIterator<Item = Self>) -> Result<Option<Self>> {
        Self::try_reduce(maps.into_iter().map(Ok))
    }

    /// Fold shard results as they are produced, each one dropped once merged.
    /// Stops at the first error without pulling further shards.
    pub fn try_reduce(maps: impl IntoIterator<Item = Result<Self>>) -> Result<Option<Self>> {
        let mut shards = 0usize;
        let mut reduced: Option<Self> = None;
        for map in maps {
            let map = map?;
            shards += 1;
            match reduced.as_mut() {
                Some(acc) => acc.merge_from(map)?,
                None => reduced = Some(map),
            }
        }
        if let Some(map) = &reduced {
            debug!(shards, buckets = map.len(), "reduced shard results");
        }
        Ok(reduced)
    }

    /// Final records, buckets sorted by `bucket_order` and each bucket's slices
    /// by `slice_order`
    pub fn entries_ordered(&self, bucket_order: Order, slice_order: Order) -> Vec<BucketRecord> {
        let mut records: Vec<BucketRecord> = self
            .buckets
            .iter()
            .map(|(&time, payload)| payload.to_record(time, slice_order))
            .collect();
        bucket_order.sort(&mut records);
        records
    }
}
