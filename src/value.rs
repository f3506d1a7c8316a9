//! Field values are reduced to 64-bit fingerprints before they reach a tracker.
//!
//! Exact sets store fingerprints rather than raw values, so a bucket costs
//! 8 bytes per distinct value regardless of the field's width, and the same
//! fingerprint feeds the HyperLogLog registers after promotion.

use wyhash::wyhash;

/// Seed shared by every node so fingerprints agree across shards.
const FINGERPRINT_SEED: u64 = 0x5eed_d157_1c7a_11e5;

/// Fingerprint of a single field value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueFingerprint(u64);

impl ValueFingerprint {
    /// Fingerprint opaque bytes.
    #[inline]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(wyhash(bytes, FINGERPRINT_SEED))
    }

    /// Fingerprint a 64-bit integer field value.
    #[inline]
    pub fn of_long(value: i64) -> Self {
        Self(wyhash(&value.to_le_bytes(), FINGERPRINT_SEED))
    }

    /// Wrap an already computed fingerprint.
    #[inline]
    pub const fn from_raw(hash: u64) -> Self {
        Self(hash)
    }

    /// Return the raw 64-bit fingerprint.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<i64> for ValueFingerprint {
    fn from(value: i64) -> Self {
        Self::of_long(value)
    }
}

impl From<&[u8]> for ValueFingerprint {
    fn from(value: &[u8]) -> Self {
        Self::of_bytes(value)
    }
}

impl From<&str> for ValueFingerprint {
    fn from(value: &str) -> Self {
        Self::of_bytes(value.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprints_are_stable() {
        assert_eq!(ValueFingerprint::from("a"), ValueFingerprint::of_bytes(b"a"));
        assert_eq!(ValueFingerprint::from(42i64), ValueFingerprint::of_long(42));
        assert_ne!(ValueFingerprint::from("a"), ValueFingerprint::from("b"));
        assert_ne!(ValueFingerprint::of_long(1), ValueFingerprint::of_long(2));
    }
}
