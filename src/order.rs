//! Orderings of emitted buckets and slices.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "with_serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::record::{BucketRecord, SliceRecord};

/// Sort order of buckets (key = time) or of slices within a bucket (key = label).
///
/// Count and distinct orderings break ties by ascending key, so output order is
/// fully determined by the data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "with_serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum Order {
    #[default]
    KeyAsc,
    KeyDesc,
    CountAsc,
    CountDesc,
    DistinctAsc,
    DistinctDesc,
}

/// Something the orderings can rank.
pub(crate) trait Ranked {
    type Key: Ord;

    fn key(&self) -> &Self::Key;
    fn total_count(&self) -> u64;
    fn distinct_count(&self) -> Option<u64>;
}

impl Ranked for BucketRecord {
    type Key = i64;

    fn key(&self) -> &i64 {
        &self.time
    }

    fn total_count(&self) -> u64 {
        self.total_count
    }

    fn distinct_count(&self) -> Option<u64> {
        self.distinct_count
    }
}

impl Ranked for SliceRecord {
    type Key = Vec<u8>;

    fn key(&self) -> &Vec<u8> {
        &self.label
    }

    fn total_count(&self) -> u64 {
        self.total_count
    }

    fn distinct_count(&self) -> Option<u64> {
        self.distinct_count
    }
}

impl Order {
    pub(crate) fn compare<T: Ranked>(self, a: &T, b: &T) -> Ordering {
        let by_key = a.key().cmp(b.key());
        match self {
            Order::KeyAsc => by_key,
            Order::KeyDesc => by_key.reverse(),
            Order::CountAsc => a.total_count().cmp(&b.total_count()).then(by_key),
            Order::CountDesc => b.total_count().cmp(&a.total_count()).then(by_key),
            Order::DistinctAsc => a.distinct_count().cmp(&b.distinct_count()).then(by_key),
            Order::DistinctDesc => b.distinct_count().cmp(&a.distinct_count()).then(by_key),
        }
    }

    pub(crate) fn sort<T: Ranked>(self, records: &mut [T]) {
        records.sort_unstable_by(|a, b| self.compare(a, b));
    }
}

impl FromStr for Order {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let order = match s {
            "key" | "time" | "label" | "term" => Order::KeyAsc,
            "reverse_key" | "reverse_time" | "reverse_label" | "reverse_term" => Order::KeyDesc,
            "count" => Order::CountAsc,
            "reverse_count" => Order::CountDesc,
            "distinct" => Order::DistinctAsc,
            "reverse_distinct" => Order::DistinctDesc,
            _ => return Err(Error::config(format!("unknown order '{s}'"))),
        };
        Ok(order)
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Order::KeyAsc => "key",
            Order::KeyDesc => "reverse_key",
            Order::CountAsc => "count",
            Order::CountDesc => "reverse_count",
            Order::DistinctAsc => "distinct",
            Order::DistinctDesc => "reverse_distinct",
        };
        f.write_str(name)
    }
}
