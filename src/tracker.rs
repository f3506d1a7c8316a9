//! Cardinality tracker counts value occurrences and distinct values for one
//! bucket (or one slice of a bucket). It is defined with const `P` and `W`
//! parameters of the sketch it falls back to:
//! - `P`: precision parameter in [4..18] range, which defines
//!   number of bits to use for HyperLogLog register indices.
//! - `W`: width parameter in [4..6] range, which defines
//!   number of bits to use for HyperLogLog register width.
//!
//! # Data-structure design rationale
//!
//! ## Bounded memory
//! A tracker keeps an exact set of fingerprints while the number of distinct
//! values is at most `threshold`. The first distinct value past the threshold
//! promotes it: the set seeds a HyperLogLog sketch and is dropped. A bucket
//! therefore never holds more than `threshold` fingerprints or one sketch,
//! whichever the data pushes it to.
//!
//! ## Accuracy
//! - Up to `threshold` distinct values the answer is exact (within the
//!   chance of a 64-bit fingerprint collision).
//! - Past the threshold HyperLogLog with LogLog-Beta bias correction is used.
//!   - Expected error:
//!     P = 12, W = 6: 1.04 / sqrt(2^12) = 1.62%
//!     P = 14, W = 6: 1.04 / sqrt(2^14) = 0.81% (default)
//!     P = 16, W = 6: 1.04 / sqrt(2^16) = 0.41%
//!
//! ## Special thresholds
//! - `0` never materializes a set, the sketch is used from the first value.
//! - `u32::MAX` keeps the tracker exact for any realistic input.

use std::fmt::{Debug, Formatter};
use std::mem::size_of;

use tracing::trace;

use crate::error::{Error, Result};
use crate::exact::Exact;
use crate::hyperloglog::HyperLogLog;
use crate::representation::{Mode, Representation, RepresentationTrait};
use crate::value::ValueFingerprint;

/// Exact-then-approximate distinct value counter.
#[derive(Clone, PartialEq)]
pub struct CardinalityTracker<const P: usize = 14, const W: usize = 6> {
    /// Distinct count above which the exact set is promoted
    threshold: u32,
    /// Occurrences recorded, duplicates included
    count: u64,
    /// Current representation
    pub(crate) representation: Representation<P, W>,
}

impl<const P: usize, const W: usize> CardinalityTracker<P, W> {
    /// Creates new tracker promoting past `threshold` distinct values
    #[inline]
    pub fn new(threshold: u32) -> Self {
        let representation = if threshold == 0 {
            Representation::Hll(HyperLogLog::new())
        } else {
            Representation::Exact(Exact::default())
        };
        Self {
            threshold,
            count: 0,
            representation,
        }
    }

    /// Rebuild a tracker from its decoded parts
    pub(crate) fn from_parts(threshold: u32, count: u64, representation: Representation<P, W>) -> Self {
        Self {
            threshold,
            count,
            representation,
        }
    }

    /// Record one occurrence of `value`
    #[inline]
    pub fn update(&mut self, value: ValueFingerprint) {
        self.count += 1;
        self.representation.insert(value.get());
        self.promote_if_needed();
    }

    /// Total occurrences recorded, not distinct
    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Distinct value count: exact while exact, estimated once promoted
    #[inline]
    pub fn cardinality(&self) -> u64 {
        self.representation.estimate()
    }

    /// Whether the tracker still holds an exact set
    #[inline]
    pub fn is_exact(&self) -> bool {
        matches!(self.representation, Representation::Exact(_))
    }

    /// Distinct count above which the tracker promotes
    #[inline]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Merge another tracker into this one.
    ///
    /// The result is the tracker that would have seen both streams: occurrence
    /// counts add up, distinct values are deduplicated. Two exact trackers stay
    /// exact while their union fits the threshold.
    pub fn merge(&mut self, rhs: &Self) -> Result<()> {
        if self.threshold != rhs.threshold {
            return Err(Error::threshold_mismatch(self.threshold, rhs.threshold));
        }
        self.count += rhs.count;

        let promoted = match (&mut self.representation, &rhs.representation) {
            (Representation::Exact(lhs), Representation::Exact(rhs)) => {
                lhs.extend(rhs);
                None
            }
            (Representation::Hll(lhs), Representation::Exact(rhs)) => {
                rhs.iter().for_each(|h| lhs.insert(h));
                None
            }
            (Representation::Exact(lhs), Representation::Hll(rhs)) => {
                // when `self` is exact - copy `rhs` sketch and replay own fingerprints into it
                let mut hll = rhs.clone();
                lhs.iter().for_each(|h| hll.insert(h));
                trace!(distinct = lhs.len(), "tracker promoted by merge");
                Some(hll)
            }
            (Representation::Hll(lhs), Representation::Hll(rhs)) => {
                lhs.merge(rhs);
                None
            }
        };
        if let Some(hll) = promoted {
            self.representation = Representation::Hll(hll);
        }
        self.promote_if_needed();

        Ok(())
    }

    /// Return memory size of the tracker
    pub fn size_of(&self) -> usize {
        size_of::<Self>() - size_of::<Representation<P, W>>() + self.representation.size_of()
    }

    /// Current representation tag
    #[inline]
    pub(crate) fn mode(&self) -> Mode {
        self.representation.mode()
    }

    /// Replace an exact set that outgrew the threshold with a sketch
    #[inline]
    fn promote_if_needed(&mut self) {
        let hll = match &self.representation {
            Representation::Exact(exact) if exact.len() > self.threshold as usize => {
                trace!(
                    distinct = exact.len(),
                    threshold = self.threshold,
                    "tracker promoted to hyperloglog"
                );
                HyperLogLog::from_fingerprints(exact.iter())
            }
            _ => return,
        };
        self.representation = Representation::Hll(hll);
    }
}

impl<const P: usize, const W: usize> Debug for CardinalityTracker<P, W> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ representation: {:?}, count: {}, {} }}",
            self.mode(),
            self.count,
            self.representation.summary()
        )
    }
}
