//! ## HyperLogLog representation
//! Approximate representation a tracker switches to once its exact set grows past
//! the configured threshold. Uses HyperLogLog with `M = 2^P` registers of `W` bits
//! and LogLog-Beta bias correction.
//!
//! [Original HyperLogLog++ paper](https://static.googleusercontent.com/media/research.google.com/en//pubs/archive/40671.pdf)
//!
//! Register storage:
//! - words[..]     - register ranks packed `W` bits each, lowest register first.
//! - words[last]   - always zero, keeps register reads and writes branchless at the tail.
//!
//! The number of zero registers is kept next to the words and updated as ranks
//! change. The harmonic sum is recomputed on `estimate`, so two sketches with equal
//! registers always produce the same estimate no matter how they were built.

use std::fmt::{Debug, Formatter};
use std::mem::{size_of, size_of_val};

use crate::beta::{alpha, beta_horner};
use crate::representation::RepresentationTrait;

#[derive(Clone, PartialEq, Eq)]
pub(crate) struct HyperLogLog<const P: usize = 14, const W: usize = 6> {
    /// Number of registers still holding rank zero
    zeros: u32,
    /// Packed register ranks
    words: Box<[u32]>,
}

impl<const P: usize, const W: usize> HyperLogLog<P, W> {
    /// Ensure that `P` and `W` are in correct range at compile time
    const VALID_PARAMS: () = assert!(P >= 4 && P <= 18 && W >= 4 && W <= 6);
    /// Number of HyperLogLog registers
    pub(crate) const M: usize = 1 << P;
    /// Packed register words plus one trailing zero word
    pub(crate) const WORDS_LEN: usize = (Self::M * W).div_ceil(32) + 1;
    /// Largest rank a `W` bit register can hold
    const MAX_RANK: u32 = (1 << W) - 1;

    /// Create an empty sketch
    #[inline]
    pub(crate) fn new() -> Self {
        // compile time check of params
        _ = Self::VALID_PARAMS;

        Self {
            zeros: Self::M as u32,
            words: vec![0u32; Self::WORDS_LEN].into_boxed_slice(),
        }
    }

    /// Create a sketch seeded with the given fingerprints
    #[inline]
    pub(crate) fn from_fingerprints(items: impl IntoIterator<Item = u64>) -> Self {
        let mut hll = Self::new();
        for h in items {
            hll.insert(h);
        }
        hll
    }

    /// Rebuild a sketch from its packed register words.
    ///
    /// Returns `None` when the word count is wrong or bits past the last register are set.
    pub(crate) fn from_words(words: Vec<u32>) -> Option<Self> {
        _ = Self::VALID_PARAMS;

        if words.len() != Self::WORDS_LEN {
            return None;
        }
        let used_bits = Self::M * W;
        let tail_word = used_bits / 32;
        let tail_bits = used_bits % 32;
        let tail_mask = if tail_bits == 0 { 0 } else { (1u32 << tail_bits) - 1 };
        if words[tail_word] & !tail_mask != 0 || words[tail_word + 1..].iter().any(|&w| w != 0) {
            return None;
        }

        let mut hll = Self {
            zeros: 0,
            words: words.into_boxed_slice(),
        };
        hll.zeros = (0..Self::M as u32)
            .filter(|&idx| hll.get_register(idx) == 0)
            .count() as u32;
        Some(hll)
    }

    /// Packed register words, as shipped on the wire
    #[inline]
    pub(crate) fn words(&self) -> &[u32] {
        &self.words
    }

    /// Return register index and rank for a fingerprint
    #[inline]
    fn index_and_rank(hash: u64) -> (u32, u32) {
        let idx = (hash & (Self::M as u64 - 1)) as u32;
        let rank = ((hash >> P).trailing_zeros() + 1).min(Self::MAX_RANK);
        (idx, rank)
    }

    /// Raise register `idx` to `new_rank` when it is higher than the current rank
    #[inline]
    fn update_rank(&mut self, idx: u32, new_rank: u32) {
        let old_rank = self.get_register(idx);
        if new_rank > old_rank {
            self.set_register(idx, old_rank, new_rank);
        }
    }

    /// Get HyperLogLog `idx` register
    #[inline]
    fn get_register(&self, idx: u32) -> u32 {
        let bit_idx = (idx as usize) * W;
        let u32_idx = bit_idx / 32;
        let bit_pos = bit_idx % 32;
        let bits = &self.words[u32_idx..u32_idx + 2];
        let bits_1 = W.min(32 - bit_pos);
        let bits_2 = W - bits_1;
        let mask_1 = (1 << bits_1) - 1;
        let mask_2 = (1 << bits_2) - 1;

        ((bits[0] >> bit_pos) & mask_1) | ((bits[1] & mask_2) << bits_1)
    }

    /// Set HyperLogLog `idx` register to new value `rank`
    #[inline]
    fn set_register(&mut self, idx: u32, old_rank: u32, new_rank: u32) {
        let bit_idx = (idx as usize) * W;
        let u32_idx = bit_idx / 32;
        let bit_pos = bit_idx % 32;
        let bits = &mut self.words[u32_idx..u32_idx + 2];
        let bits_1 = W.min(32 - bit_pos);
        let bits_2 = W - bits_1;
        let mask_1 = (1 << bits_1) - 1;
        let mask_2 = (1 << bits_2) - 1;

        // Unconditionally update two `u32` elements based on `new_rank` bits and masks
        bits[0] &= !(mask_1 << bit_pos);
        bits[0] |= (new_rank & mask_1) << bit_pos;
        bits[1] &= !mask_2;
        bits[1] |= (new_rank >> bits_1) & mask_2;

        self.zeros -= u32::from(old_rank == 0 && self.zeros > 0);
    }

    /// Merge two `HyperLogLog` representations by keeping the larger rank per register.
    #[inline]
    pub(crate) fn merge(&mut self, rhs: &HyperLogLog<P, W>) {
        for idx in 0..Self::M as u32 {
            let lhs_rank = self.get_register(idx);
            let rhs_rank = rhs.get_register(idx);
            if rhs_rank > lhs_rank {
                self.set_register(idx, lhs_rank, rhs_rank);
            }
        }
    }

    /// Memory needed by one sketch's registers
    pub(crate) const fn sketch_bytes() -> usize {
        Self::WORDS_LEN * size_of::<u32>()
    }
}

impl<const P: usize, const W: usize> RepresentationTrait for HyperLogLog<P, W> {
    /// Insert fingerprint into `HyperLogLog` representation.
    #[inline]
    fn insert(&mut self, h: u64) {
        let (idx, rank) = Self::index_and_rank(h);
        self.update_rank(idx, rank);
    }

    /// Return cardinality estimate of `HyperLogLog` representation
    #[inline]
    fn estimate(&self) -> u64 {
        let m = Self::M as f64;
        let zeros = f64::from(self.zeros);
        let sum: f64 = (0..Self::M as u32)
            .map(|idx| (-f64::from(self.get_register(idx))).exp2())
            .sum();
        let estimate = alpha(Self::M) * m * (m - zeros) / (sum + beta_horner(zeros, P));
        (estimate + 0.5) as u64
    }

    /// Return memory size of `HyperLogLog`
    #[inline]
    fn size_of(&self) -> usize {
        size_of::<Self>() + size_of_val(&*self.words)
    }
}

impl<const P: usize, const W: usize> Debug for HyperLogLog<P, W> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "HyperLogLog {{ {} }}", self.summary())
    }
}
