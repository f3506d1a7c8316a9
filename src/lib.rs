//! `distinct-histogram` builds date histograms that count records and distinct
//! values per time bucket, optionally broken down by a slice label.
//!
//! Each shard runs a [`Collector`]: timestamps are rounded to bucket keys
//! through a FIFO [`RoundingCache`], and every bucket keeps a record count plus
//! a [`CardinalityTracker`] that is exact up to a threshold and switches to
//! HyperLogLog past it. Shard results travel in the compact [`codec`] format
//! and are folded by the reducer with [`BucketMap::merge`], which is
//! associative and commutative.
//!
//! ```
//! use distinct_histogram::{DistinctHistogram, FacetConfig, Stats, CardinalityTracker, TimeZoneRounding};
//!
//! let config = FacetConfig::builder(TimeZoneRounding::parse("minute", "+00:00")?)
//!     .exact_threshold(100)
//!     .build()?;
//!
//! let mut shard = config.collector::<Stats<CardinalityTracker>>()?;
//! shard.collect(1_000, Some("a".into()), None);
//! shard.collect(2_000, Some("b".into()), None);
//!
//! let reduced: Option<DistinctHistogram> = config.reduce_encoded([shard.encode()])?;
//! let records = config.render(&reduced.unwrap_or_else(|| DistinctHistogram::new(100)));
//! assert_eq!(records[0].distinct_count, Some(2));
//! # Ok::<(), distinct_histogram::Error>(())
//! ```
mod beta;
pub mod bucket;
pub mod cache;
pub mod codec;
pub mod error;
mod exact;
pub mod facet;
mod hyperloglog;
pub mod map;
pub mod order;
pub mod record;
mod representation;
pub mod rounding;
#[cfg(feature = "with_serde")]
mod serde;
pub mod tracker;
pub mod value;

pub use bucket::{Distinct, Payload, Sliced, Stats};
pub use cache::RoundingCache;
pub use error::{Error, Result};
pub use facet::{Collector, FacetConfig, FacetConfigBuilder};
pub use map::{BucketMap, CountHistogram, DistinctHistogram, SlicedCountHistogram, SlicedDistinctHistogram};
pub use order::Order;
pub use record::{BucketRecord, SliceRecord};
pub use rounding::{Rounding, TimeUnit, TimeZoneRounding};
pub use tracker::CardinalityTracker;
pub use value::ValueFingerprint;
