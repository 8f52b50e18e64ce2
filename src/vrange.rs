use std::fmt::{Debug, Formatter};
use std::ops::Range;

use rle::{HasLength, HasRleKey, MergableSpan, Searchable, SplitableSpanHelpers};

/// A half-open run of version numbers. Both sides of the index use it:
/// local version ranges on one side, per-agent seq ranges on the other.
///
/// This is a stand-in for `Range<usize>`, which can't be Copy. Build one
/// from a std range with `(a..b).into()`.
#[derive(Copy, Clone, Eq, PartialEq, Default)]
pub struct VRange {
    pub start: usize,
    pub end: usize,
}

impl VRange {
    #[inline]
    pub fn new(start: usize, end: usize) -> Self {
        VRange { start, end }
    }

    pub fn is_empty(&self) -> bool {
        debug_assert!(self.start <= self.end);
        self.end == self.start
    }

    /// The highest version in the range. Only meaningful when non-empty.
    pub fn last(&self) -> usize {
        debug_assert!(!self.is_empty());
        self.end - 1
    }

    pub fn contains(&self, v: usize) -> bool {
        self.start <= v && v < self.end
    }
}

impl From<Range<usize>> for VRange {
    fn from(r: Range<usize>) -> Self {
        VRange { start: r.start, end: r.end }
    }
}

impl From<usize> for VRange {
    fn from(v: usize) -> Self {
        VRange { start: v, end: v + 1 }
    }
}

impl Debug for VRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl HasLength for VRange {
    fn len(&self) -> usize {
        self.end - self.start
    }
}

// Ranges keyed by their own start. (Spans keyed by something else wrap in
// a KVPair instead.)
impl HasRleKey for VRange {
    fn rle_key(&self) -> usize {
        self.start
    }
}

impl MergableSpan for VRange {
    fn can_append(&self, other: &Self) -> bool {
        self.end == other.start
    }

    fn append(&mut self, other: Self) {
        self.end = other.end;
    }

    fn prepend(&mut self, other: Self) {
        self.start = other.start;
    }
}

impl SplitableSpanHelpers for VRange {
    fn truncate_h(&mut self, at: usize) -> Self {
        debug_assert!(at > 0 && at < self.len());
        let rest = VRange { start: self.start + at, end: self.end };
        self.end = self.start + at;
        rest
    }

    fn truncate_keeping_right_h(&mut self, at: usize) -> Self {
        let head = VRange { start: self.start, end: self.start + at };
        self.start = head.end;
        head
    }
}

impl Searchable for VRange {
    type Item = usize;

    fn get_offset(&self, v: Self::Item) -> Option<usize> {
        self.contains(v).then(|| v - self.start)
    }

    fn at_offset(&self, offset: usize) -> Self::Item {
        self.start + offset
    }
}

// A range crosses the wire as a bare [start, end] pair.
#[cfg(feature = "serde")]
mod serde_encoding {
    use serde::de::{Deserialize, Deserializer};
    use serde::ser::{Serialize, Serializer};

    use super::VRange;

    impl Serialize for VRange {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error> where S: Serializer {
            (self.start, self.end).serialize(serializer)
        }
    }

    impl<'de> Deserialize<'de> for VRange {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error> where D: Deserializer<'de> {
            let (start, end) = <(usize, usize)>::deserialize(deserializer)?;
            Ok(VRange { start, end })
        }
    }
}
