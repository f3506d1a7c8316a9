//! ## Exact representation
//! Holds every distinct fingerprint seen so far. Used while a tracker's distinct
//! count stays at or below its threshold, so low-cardinality buckets report exact
//! answers.

use std::collections::HashSet;
use std::hash::BuildHasherDefault;
use std::mem::size_of;

use wyhash::WyHash;

use crate::representation::RepresentationTrait;

/// Exact representation container
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Exact {
    items: HashSet<u64, BuildHasherDefault<WyHash>>,
}

impl Exact {
    /// Number of distinct fingerprints held
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    /// Iterate over held fingerprints in unspecified order
    #[inline]
    pub(crate) fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.items.iter().copied()
    }

    /// Fingerprints in ascending order, the canonical order used on the wire
    pub(crate) fn sorted(&self) -> Vec<u64> {
        let mut items: Vec<u64> = self.iter().collect();
        items.sort_unstable();
        items
    }

    /// Add every fingerprint of `rhs`
    #[inline]
    pub(crate) fn extend(&mut self, rhs: &Exact) {
        self.items.extend(rhs.iter());
    }
}

impl FromIterator<u64> for Exact {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl RepresentationTrait for Exact {
    #[inline]
    fn insert(&mut self, h: u64) {
        self.items.insert(h);
    }

    #[inline]
    fn estimate(&self) -> u64 {
        self.items.len() as u64
    }

    /// Return memory size of `Exact` representation
    fn size_of(&self) -> usize {
        size_of::<Self>() + self.items.capacity() * size_of::<u64>()
    }
}
