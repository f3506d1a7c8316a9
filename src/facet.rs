//! Facet definition and the per-shard collection driver.

use tracing::debug;

use crate::bucket::{Distinct, Payload};
use crate::cache::RoundingCache;
use crate::codec;
use crate::error::{Error, Result};
use crate::map::BucketMap;
use crate::order::Order;
use crate::record::BucketRecord;
use crate::rounding::Rounding;
use crate::value::ValueFingerprint;

pub const DEFAULT_CACHE_CAPACITY: usize = 1024;
pub const DEFAULT_EXACT_THRESHOLD: u32 = 1000;
/// Largest accepted rounding cache capacity. A collection pass rarely sees
/// more distinct timestamps than this, and past it the cache stops paying off.
pub const MAX_CACHE_CAPACITY: usize = 1 << 24;

/// Settings shared by every shard collecting a facet and by its reducer.
#[derive(Clone, Debug)]
pub struct FacetConfig<R> {
    rounding: R,
    cache_capacity: usize,
    exact_threshold: u32,
    bucket_order: Order,
    slice_order: Order,
    max_sketch_bytes: Option<usize>,
}

/// Builder for [`FacetConfig`]. Values are checked by [`FacetConfigBuilder::build`].
#[derive(Clone, Debug)]
pub struct FacetConfigBuilder<R> {
    rounding: R,
    cache_capacity: i64,
    exact_threshold: i64,
    bucket_order: Order,
    slice_order: Order,
    max_sketch_bytes: Option<usize>,
}

impl<R> FacetConfigBuilder<R> {
    /// Size of the rounding cache, 0 disables it
    pub fn cache_capacity(mut self, capacity: i64) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Distinct values kept exactly per bucket; 0 is always approximate and
    /// anything from `u32::MAX` up is always exact
    pub fn exact_threshold(mut self, threshold: i64) -> Self {
        self.exact_threshold = threshold;
        self
    }

    pub fn bucket_order(mut self, order: Order) -> Self {
        self.bucket_order = order;
        self
    }

    pub fn slice_order(mut self, order: Order) -> Self {
        self.slice_order = order;
        self
    }

    /// Upper bound on the memory of one promoted sketch
    pub fn max_sketch_bytes(mut self, limit: usize) -> Self {
        self.max_sketch_bytes = Some(limit);
        self
    }

    pub fn build(self) -> Result<FacetConfig<R>> {
        let cache_capacity = usize::try_from(self.cache_capacity)
            .map_err(|_| Error::config(format!("cache capacity must not be negative, got {}", self.cache_capacity)))?;
        if cache_capacity > MAX_CACHE_CAPACITY {
            return Err(Error::config(format!(
                "cache capacity {cache_capacity} exceeds the limit of {MAX_CACHE_CAPACITY}"
            )));
        }
        if self.exact_threshold < 0 {
            return Err(Error::config(format!(
                "exact threshold must not be negative, got {}",
                self.exact_threshold
            )));
        }
        let exact_threshold = u32::try_from(self.exact_threshold).unwrap_or(u32::MAX);

        Ok(FacetConfig {
            rounding: self.rounding,
            cache_capacity,
            exact_threshold,
            bucket_order: self.bucket_order,
            slice_order: self.slice_order,
            max_sketch_bytes: self.max_sketch_bytes,
        })
    }
}

impl<R> FacetConfig<R> {
    pub fn builder(rounding: R) -> FacetConfigBuilder<R> {
        FacetConfigBuilder {
            rounding,
            cache_capacity: DEFAULT_CACHE_CAPACITY as i64,
            exact_threshold: i64::from(DEFAULT_EXACT_THRESHOLD),
            bucket_order: Order::KeyAsc,
            slice_order: Order::KeyAsc,
            max_sketch_bytes: None,
        }
    }

    pub fn rounding(&self) -> &R {
        &self.rounding
    }

    pub fn cache_capacity(&self) -> usize {
        self.cache_capacity
    }

    pub fn exact_threshold(&self) -> u32 {
        self.exact_threshold
    }

    pub fn bucket_order(&self) -> Order {
        self.bucket_order
    }

    pub fn slice_order(&self) -> Order {
        self.slice_order
    }

    /// Fails when the sketch of payload `S` does not fit `max_sketch_bytes`
    fn check_sketch<S: Payload>(&self) -> Result<()> {
        match self.max_sketch_bytes {
            Some(limit) if <S::Tracker as Distinct>::SKETCH_BYTES > limit => Err(Error::EstimatorOverflow {
                requested: <S::Tracker as Distinct>::SKETCH_BYTES,
                limit,
            }),
            _ => Ok(()),
        }
    }

    /// Decode every shard payload and fold them into one map.
    ///
    /// Each payload is decoded only when the previous one has been folded.
    /// Returns `None` when no shard reported. The first malformed payload
    /// fails the whole reduction.
    pub fn reduce_encoded<S, B>(&self, shards: impl IntoIterator<Item = B>) -> Result<Option<BucketMap<S>>>
    where
        S: Payload,
        B: AsRef<[u8]>,
    {
        self.check_sketch::<S>()?;
        BucketMap::try_reduce(shards.into_iter().map(|bytes| {
            let map = codec::decode::<S>(bytes.as_ref())?;
            if map.threshold() != self.exact_threshold {
                return Err(Error::threshold_mismatch(self.exact_threshold, map.threshold()));
            }
            Ok(map)
        }))
    }

    /// Final records in the configured bucket and slice orders
    pub fn render<S: Payload>(&self, map: &BucketMap<S>) -> Vec<BucketRecord> {
        map.entries_ordered(self.bucket_order, self.slice_order)
    }
}

impl<R: Rounding + Clone> FacetConfig<R> {
    /// Start collecting one shard
    pub fn collector<S: Payload>(&self) -> Result<Collector<R, S>> {
        self.check_sketch::<S>()?;
        Ok(Collector {
            cache: RoundingCache::new(self.rounding.clone(), self.cache_capacity),
            map: BucketMap::new(self.exact_threshold),
        })
    }
}

/// Collection pass over the matching records of one shard.
pub struct Collector<R, S> {
    cache: RoundingCache<R>,
    map: BucketMap<S>,
}

impl<R: Rounding, S: Payload> Collector<R, S> {
    /// Count one record at `timestamp`
    #[inline]
    pub fn collect(&mut self, timestamp: i64, value: Option<ValueFingerprint>, slice: Option<&[u8]>) {
        let key = self.cache.round(timestamp);
        self.map.record(key, slice, value);
    }

    pub fn map(&self) -> &BucketMap<S> {
        &self.map
    }

    pub fn cache(&self) -> &RoundingCache<R> {
        &self.cache
    }

    /// End the pass and hand over the collected map
    pub fn finish(self) -> BucketMap<S> {
        debug!(
            buckets = self.map.len(),
            roundings = self.cache.computations(),
            "collection finished"
        );
        self.map
    }

    /// End the pass and encode the collected map for the reducer
    pub fn encode(self) -> Vec<u8> {
        codec::encode(&self.finish())
    }
}
