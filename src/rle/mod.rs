use std::fmt::Debug;

use rle::{HasLength, HasRleKey, MergableSpan, Searchable, SplitableSpan, SplitableSpanHelpers};

use crate::vrange::VRange;

mod rle_vec;

pub use rle_vec::RleVec;

/// A span keyed by something other than its own contents - eg (seq →
/// LV-range) entries in the per-agent index. The key advances with the
/// span when it's split.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KVPair<V>(pub usize, pub V);

impl<V> HasRleKey for KVPair<V> {
    fn rle_key(&self) -> usize {
        self.0
    }
}

impl<V: HasLength> HasLength for KVPair<V> {
    fn len(&self) -> usize {
        self.1.len()
    }
}

impl<V: HasLength + SplitableSpan> SplitableSpanHelpers for KVPair<V> {
    fn truncate_h(&mut self, at: usize) -> Self {
        debug_assert!(at > 0 && at < self.1.len());
        KVPair(self.0 + at, self.1.truncate(at))
    }

    fn truncate_keeping_right_h(&mut self, at: usize) -> Self {
        let old_key = self.0;
        self.0 += at;
        KVPair(old_key, self.1.truncate_keeping_right(at))
    }
}

impl<V: HasLength + MergableSpan> MergableSpan for KVPair<V> {
    fn can_append(&self, other: &Self) -> bool {
        other.0 == self.end() && self.1.can_append(&other.1)
    }

    fn append(&mut self, other: Self) {
        self.1.append(other.1);
    }

    fn prepend(&mut self, other: Self) {
        self.1.prepend(other.1);
        self.0 = other.0;
    }
}

impl<V: Searchable> Searchable for KVPair<V> {
    type Item = V::Item;

    fn get_offset(&self, loc: Self::Item) -> Option<usize> {
        self.1.get_offset(loc)
    }

    fn at_offset(&self, offset: usize) -> Self::Item {
        self.1.at_offset(offset)
    }
}

/// Convenience accessors for anything keyed with a length.
pub trait RleSpanHelpers: HasRleKey + HasLength {
    fn end(&self) -> usize {
        self.rle_key() + self.len()
    }

    fn last_key(&self) -> usize {
        self.end() - 1
    }

    fn span(&self) -> VRange {
        VRange { start: self.rle_key(), end: self.end() }
    }
}

impl<V: HasRleKey + HasLength> RleSpanHelpers for V {}

#[cfg(test)]
mod tests {
    use rle::test_splitable_methods_valid;

    use super::KVPair;
    use crate::vrange::VRange;

    #[test]
    fn kvpair_valid() {
        test_splitable_methods_valid(KVPair(10, VRange::new(100, 104)));
    }
}
