use enum_dispatch::enum_dispatch;

use crate::exact::Exact;
use crate::hyperloglog::HyperLogLog;

/// Representations a `CardinalityTracker` moves through.
///
/// `Exact` can be replaced by `Hll`, never the other way around.
#[derive(Clone, Debug, PartialEq)]
#[enum_dispatch]
pub(crate) enum Representation<const P: usize, const W: usize> {
    Exact(Exact),
    Hll(HyperLogLog<P, W>),
}

/// Representation trait which must be implemented by all representations.
#[enum_dispatch(Representation<P, W>)]
pub(crate) trait RepresentationTrait {
    fn insert(&mut self, h: u64);
    fn estimate(&self) -> u64;
    fn size_of(&self) -> usize;
    fn summary(&self) -> String {
        format!("estimate: {}, size: {}", self.estimate(), self.size_of())
    }
}

/// Wire tag of each representation
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Mode {
    Exact = 0,
    Hll = 1,
}

impl Mode {
    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Mode::Exact),
            1 => Some(Mode::Hll),
            _ => None,
        }
    }
}

impl<const P: usize, const W: usize> Representation<P, W> {
    #[inline]
    pub(crate) fn mode(&self) -> Mode {
        match self {
            Representation::Exact(_) => Mode::Exact,
            Representation::Hll(_) => Mode::Hll,
        }
    }
}
