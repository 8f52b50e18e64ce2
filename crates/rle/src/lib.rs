//! Small utilities for working with runs of mergeable, splittable spans.
//!
//! Span types implement some subset of the capability traits below. A span
//! covers a contiguous run of items; lists of spans stay compact by merging
//! adjacent spans (`MergableSpan`) and splitting them back apart when a
//! consumer needs part of a run (`SplitableSpan`).

use std::fmt::Debug;

pub use append_rle::AppendRle;
pub use merge_iter::{merge_items, merge_items_rev, MergeableIterator, MergeIter};
pub use rlerun::RleRun;

mod append_rle;
mod merge_iter;
mod rlerun;

/// The number of items contained in a span. This is the size used by
/// `truncate` - so for most span types its the length of the covered run,
/// not a byte count.
pub trait HasLength {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Implement this to get a `SplitableSpan` implementation via the blanket
/// impl below. Implementers only need to provide `truncate_h`;
/// `truncate_keeping_right_h` has a (slower) default in terms of it.
pub trait SplitableSpanHelpers: Clone {
    /// Split the span, keeping the first `at` items in self and returning
    /// the rest. `at` must strictly obey *0 < at < len*.
    fn truncate_h(&mut self, at: usize) -> Self;

    /// The inverse of truncate: keep items from `at..len` in self, return
    /// the prefix `0..at`.
    #[inline(always)]
    fn truncate_keeping_right_h(&mut self, at: usize) -> Self {
        let mut other = self.clone();
        *self = other.truncate_h(at);
        other
    }
}

/// A span which can be split into two spans covering the same items.
pub trait SplitableSpan: Clone {
    fn truncate(&mut self, at: usize) -> Self;
    fn truncate_keeping_right(&mut self, at: usize) -> Self;
}

impl<T: SplitableSpanHelpers> SplitableSpan for T {
    #[inline(always)]
    fn truncate(&mut self, at: usize) -> Self { self.truncate_h(at) }
    #[inline(always)]
    fn truncate_keeping_right(&mut self, at: usize) -> Self { self.truncate_keeping_right_h(at) }
}

/// A span which can (sometimes) be merged with an adjacent span.
pub trait MergableSpan: Clone {
    /// Check if `other` can be appended to the end of self. `can_append`
    /// will always be called immediately before `append`.
    fn can_append(&self, other: &Self) -> bool;

    /// Merge the passed item into self; self = self + other. Only valid
    /// when `can_append(other)` returned true.
    fn append(&mut self, other: Self);

    /// Merge the passed item in front of self; self = other + self. Only
    /// valid when `other.can_append(self)` returned true.
    #[inline(always)]
    fn prepend(&mut self, mut other: Self) {
        other.append(self.clone());
        *self = other;
    }
}

/// Spans stored in a sorted list are located by their key - the index of
/// the first item the span covers.
pub trait HasRleKey {
    fn rle_key(&self) -> usize;
}

impl<T: HasRleKey> HasRleKey for &T {
    fn rle_key(&self) -> usize {
        (*self).rle_key()
    }
}

/// A span whose items can be addressed individually.
pub trait Searchable {
    type Item: Copy + Debug;

    /// Checks if the span contains the specified item. If it does, returns
    /// the offset into the span.
    fn get_offset(&self, loc: Self::Item) -> Option<usize>;

    fn at_offset(&self, offset: usize) -> Self::Item;
}

/// Test helper to verify an implementation of the span traits is valid.
///
/// This checks the round-trip law: splitting a span anywhere and appending
/// the two halves back together must reproduce the original exactly.
pub fn test_splitable_methods_valid<E: SplitableSpan + MergableSpan + HasLength + Debug + Eq>(entry: E) {
    assert!(entry.len() >= 2, "Call this with a larger entry");

    for i in 1..entry.len() {
        // Split here and make sure we get the expected results.
        let mut start = entry.clone();
        let end = start.truncate(i);

        assert_eq!(start.len(), i);
        assert_eq!(end.len(), entry.len() - i);

        assert!(start.can_append(&end));

        let mut merge_append = start.clone();
        merge_append.append(end.clone());
        assert_eq!(merge_append, entry);

        let mut merge_prepend = end.clone();
        merge_prepend.prepend(start.clone());
        assert_eq!(merge_prepend, entry);

        // Split using truncate_keeping_right. We should get the same
        // result from the other direction.
        let mut end2 = entry.clone();
        let start2 = end2.truncate_keeping_right(i);
        assert_eq!(end2, end);
        assert_eq!(start2, start);
    }
}
