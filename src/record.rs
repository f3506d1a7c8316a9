//! Rendered results handed to the output collaborator.

#[cfg(feature = "with_serde")]
use serde::{Deserialize, Serialize};

/// One time bucket of the final result.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "with_serde", derive(Serialize, Deserialize))]
pub struct BucketRecord {
    /// Bucket start, epoch millis
    pub time: i64,
    pub total_count: u64,
    /// Distinct values in the bucket, `None` for counting-only and sliced facets
    pub distinct_count: Option<u64>,
    /// Ordered slices, `None` unless the facet is sliced
    pub slices: Option<Vec<SliceRecord>>,
}

/// One slice of a sliced bucket.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "with_serde", derive(Serialize, Deserialize))]
pub struct SliceRecord {
    pub label: Vec<u8>,
    pub total_count: u64,
    pub distinct_count: Option<u64>,
}

impl SliceRecord {
    /// Label as text, replacing invalid UTF-8
    pub fn label_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.label)
    }
}
