use std::cmp::Ordering::*;
use std::iter::FromIterator;
use std::ops::Index;
use std::slice::SliceIndex;

use rle::{AppendRle, HasLength, HasRleKey, MergableSpan, Searchable, SplitableSpan};

use crate::vrange::VRange;
use crate::rle::RleSpanHelpers;

/// A run-length encoded sorted list of spans, searchable by key.
///
/// Entries are kept maximally merged: pushes and inserts fuse the new span
/// into its neighbours whenever the span type allows it.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct RleVec<V: HasLength + MergableSpan + Sized>(pub Vec<V>);

impl<V: HasLength + MergableSpan + Sized> RleVec<V> {
    pub fn new() -> Self { Self(Vec::new()) }

    /// Append a new span to the end of the list. O(1) amortised for
    /// append-dominant workloads. The new span extends the last entry when
    /// it can.
    ///
    /// Returns true if the span was merged into the previous entry.
    pub fn push(&mut self, val: V) -> bool {
        self.0.push_rle(val)
    }

    /// Returns past the end of the last key.
    pub fn end(&self) -> usize where V: HasRleKey {
        if let Some(v) = self.last_entry() {
            v.end()
        } else {
            0
        }
    }

    pub fn last_entry(&self) -> Option<&V> { self.0.last() }

    pub fn num_entries(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, V> { self.0.iter() }
}

impl<V: HasLength + MergableSpan + HasRleKey + Clone + Sized> RleVec<V> {
    /// Binary search for the entry containing the requested key. On a miss
    /// the Err value is the insertion point.
    pub fn find_index(&self, needle: usize) -> Result<usize, usize> {
        self.0.binary_search_by(|entry| {
            let key = entry.rle_key();
            if needle < key { Greater }
            else if needle >= key + entry.len() { Less }
            else { Equal }
        })
    }

    /// The index of the entry containing the key, or of the next entry (or
    /// self.0.len()) when absent.
    pub fn find_next_index(&self, needle: usize) -> usize {
        self.find_index(needle).unwrap_or_else(|i| i)
    }

    /// Find the entry containing the specified key.
    pub fn find(&self, needle: usize) -> Option<&V> {
        self.find_index(needle).ok().map(|idx| &self.0[idx])
    }

    /// Same as find() for lists with no gaps between entries.
    pub fn find_packed(&self, needle: usize) -> &V {
        self.find(needle).expect("Expected needle in packed list")
    }

    /// Find the entry containing the specified key, returning the entry
    /// and the offset of the key inside it.
    pub fn find_with_offset(&self, needle: usize) -> Option<(&V, usize)> {
        self.find_index(needle).ok().map(|idx| {
            let entry = &self.0[idx];
            (entry, needle - entry.rle_key())
        })
    }

    /// Same as find_with_offset() for lists with no gaps between entries.
    pub fn find_packed_with_offset(&self, needle: usize) -> (&V, usize) {
        self.find_with_offset(needle).expect("Expected needle in packed list")
    }

    /// Find the span at `range`, cloning and trimming it down to size. Less
    /// efficient than find_with_offset, but much more convenient.
    ///
    /// Note the returned span might be smaller than the passed range.
    pub fn find_packed_and_split(&self, range: VRange) -> V where V: SplitableSpan {
        let (item, offset) = self.find_packed_with_offset(range.start);
        let mut item = item.clone();
        if offset > 0 {
            item.truncate_keeping_right(offset);
        }
        if item.len() > range.len() {
            item.truncate(range.len());
        }
        item
    }

    /// Like find, except a miss returns the containing empty range instead
    /// of None. Assumes the key space starts at 0.
    ///
    /// Returns (Ok(entry), offset) on a hit, otherwise (Err(gap range),
    /// offset into the gap).
    #[allow(unused)]
    pub fn find_sparse(&self, needle: usize) -> (Result<&V, VRange>, usize) {
        match self.find_index(needle) {
            Ok(idx) => {
                let entry = &self.0[idx];
                (Ok(entry), needle - entry.rle_key())
            }
            Err(idx) => {
                let next_key = if let Some(entry) = self.0.get(idx) {
                    entry.rle_key()
                } else {
                    usize::MAX
                };

                if idx == 0 {
                    (Err((0..next_key).into()), needle)
                } else {
                    let end = self.0[idx - 1].end();
                    (Err((end..next_key).into()), needle - end)
                }
            }
        }
    }

    /// Insert a span at its sorted position. O(n) in the number of
    /// subsequent entries. The span must not overlap any existing entry -
    /// an overlap is caller misuse, and panics.
    pub fn insert(&mut self, val: V) {
        // Inserted spans usually land at the tail, and push already knows
        // how to merge there.
        match self.last_entry() {
            Some(last) if val.rle_key() < last.end() => {}
            _ => {
                self.push(val);
                return;
            }
        }

        let idx = match self.find_index(val.rle_key()) {
            Ok(_) => panic!("Inserted span overlaps an existing entry"),
            Err(idx) => idx,
        };
        // The whole span has to fit in the gap it starts in.
        if let Some(next) = self.0.get(idx) {
            assert!(val.end() <= next.rle_key(), "Inserted span overlaps an existing entry");
        }

        // Fuse with a neighbour when the span type allows it, otherwise
        // splice a new entry in.
        if idx > 0 && self.0[idx - 1].can_append(&val) {
            self.0[idx - 1].append(val);
        } else if idx < self.0.len() && val.can_append(&self.0[idx]) {
            self.0[idx].prepend(val);
        } else {
            self.0.insert(idx, val);
        }
    }

    /// Yields a reference to every span intersecting the range, without
    /// clipping the boundary spans. See iter_range for the clipping
    /// variant.
    pub fn iter_range_unclipped(&self, range: VRange) -> impl Iterator<Item = &V> + '_ {
        let start_idx = self.find_next_index(range.start);
        self.0[start_idx..].iter()
            .take_while(move |e| e.rle_key() < range.end)
    }

    /// Panic unless the list covers 0..end with no gaps.
    pub(crate) fn check_packed_from_0(&self) {
        let mut expect_next = 0;
        for entry in self.0.iter() {
            assert_eq!(entry.rle_key(), expect_next);
            expect_next = entry.end();
        }
    }

    /// Panic if any adjacent pair could be merged further.
    pub(crate) fn check_fully_merged(&self) {
        for i in 1..self.0.len() {
            assert!(!self.0[i - 1].can_append(&self.0[i]));
        }
    }
}

impl<V: HasLength + MergableSpan + Sized> FromIterator<V> for RleVec<V> {
    fn from_iter<T: IntoIterator<Item = V>>(iter: T) -> Self {
        let mut rle = Self::new();
        for item in iter {
            rle.push(item);
        }
        rle
    }
}

impl<V: HasLength + MergableSpan + Sized> Extend<V> for RleVec<V> {
    fn extend<T: IntoIterator<Item = V>>(&mut self, iter: T) {
        for item in iter {
            self.push(item);
        }
    }
}

impl<V: HasLength + MergableSpan + Sized> Default for RleVec<V> {
    fn default() -> Self {
        Self(Vec::default())
    }
}

impl<V: HasLength + MergableSpan + Searchable + HasRleKey> RleVec<V> {
    pub fn get(&self, idx: usize) -> V::Item {
        let (v, offset) = self.find_packed_with_offset(idx);
        v.at_offset(offset)
    }
}

impl<T: HasLength + MergableSpan, I: SliceIndex<[T]>> Index<I> for RleVec<T> {
    type Output = I::Output;

    #[inline]
    fn index(&self, index: I) -> &Self::Output {
        self.0.index(index)
    }
}

fn id_clone<V: Clone>(v: &V) -> V {
    v.clone()
}

/// Iterator over all spans intersecting a range. Boundary spans are cloned
/// and clipped so every yielded span lies entirely inside the range.
#[derive(Debug, Clone)]
pub struct RleVecRangeIter<'a, V: HasRleKey + HasLength, I: SplitableSpan, F: Fn(&V) -> I> {
    inner_iter: std::slice::Iter<'a, V>,
    range: VRange,
    map_fn: F,
}

impl<V: HasLength + HasRleKey + SplitableSpan + MergableSpan> RleVec<V> {
    pub fn iter_range(&self, range: VRange) -> RleVecRangeIter<'_, V, V, impl Fn(&V) -> V> {
        self.iter_range_map(range, id_clone)
    }
}

impl<V: HasLength + HasRleKey + MergableSpan> RleVec<V> {
    /// iter_range, mapping each entry through map_fn before clipping. Used
    /// to strip entries down to their splittable parts.
    pub fn iter_range_map<I: SplitableSpan + HasLength, F: Fn(&V) -> I>(&self, range: VRange, map_fn: F) -> RleVecRangeIter<'_, V, I, F> {
        let start_idx = self.find_next_index(range.start);

        RleVecRangeIter {
            inner_iter: self.0[start_idx..].iter(),
            range,
            map_fn,
        }
    }
}

impl<'a, V: HasRleKey + HasLength, I: HasLength + SplitableSpan, F: Fn(&V) -> I> Iterator for RleVecRangeIter<'a, V, I, F> {
    type Item = I;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner_iter.next()?;

        // Holds by construction of the iterator.
        debug_assert!(item.end() >= self.range.start);

        let item_range = item.span();
        if item_range.start >= self.range.end { return None; }

        let mut item = (self.map_fn)(item);
        if item_range.end > self.range.end {
            item.truncate(self.range.end - item_range.start);
        }
        if item_range.start < self.range.start {
            item.truncate_keeping_right(self.range.start - item_range.start);
        }
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rle::KVPair;

    #[test]
    fn rle_iter_range() {
        let mut rle: RleVec<VRange> = RleVec::new();
        rle.push((0..10).into());

        let items = rle.iter_range((5..8).into()).collect::<Vec<_>>();
        assert_eq!(&items, &[(5..8).into()]);
    }

    #[test]
    fn iter_empty() {
        let rle: RleVec<VRange> = RleVec::new();
        let entries_a = rle.iter().collect::<Vec<_>>();
        let entries_b = rle.iter_range_map((0..0).into(), |x| *x).collect::<Vec<_>>();
        let entries_c = rle.iter_range((0..0).into()).collect::<Vec<_>>();
        assert!(entries_a.is_empty());
        assert!(entries_b.is_empty());
        assert!(entries_c.is_empty());
    }

    #[test]
    fn iter_range_sparse() {
        let mut rle: RleVec<VRange> = RleVec::new();
        rle.push((0..10).into());
        rle.push((12..18).into());
        rle.push((20..30).into());

        let iter_items = rle.iter_range((5..25).into()).collect::<Vec<_>>();

        assert_eq!(&iter_items, &[
            (5..10).into(),
            (12..18).into(),
            (20..25).into(),
        ]);

        // The unclipped variant yields the boundary spans whole.
        let unclipped = rle.iter_range_unclipped((5..25).into()).copied().collect::<Vec<_>>();
        assert_eq!(&unclipped, &[
            (0..10).into(),
            (12..18).into(),
            (20..30).into(),
        ]);
    }

    #[test]
    fn rle_finds_at_offset() {
        let mut rle: RleVec<KVPair<VRange>> = RleVec::new();

        rle.push(KVPair(1, (1000..1002).into()));
        assert_eq!(rle.find_with_offset(1), Some((&KVPair(1, (1000..1002).into()), 0)));
        assert_eq!(rle.find_with_offset(2), Some((&KVPair(1, (1000..1002).into()), 1)));
        assert_eq!(rle.find_with_offset(3), None);

        // This should get appended.
        rle.push(KVPair(3, (1002..1003).into()));
        assert_eq!(rle.find_with_offset(3), Some((&KVPair(1, (1000..1003).into()), 2)));
        assert_eq!(rle.0.len(), 1);
    }

    #[test]
    fn insert_inside() {
        let mut rle: RleVec<KVPair<VRange>> = RleVec::new();

        rle.insert(KVPair(5, (1000..1002).into()));
        // Prepend.
        rle.insert(KVPair(3, (998..1000).into()));
        assert_eq!(rle.0.len(), 1);

        // Append.
        rle.insert(KVPair(7, (1002..1007).into()));
        assert_eq!(rle.0.len(), 1);

        // Spans which cannot be merged.
        rle.insert(KVPair(1, (1..2).into()));
        assert_eq!(rle.0.len(), 2);

        rle.insert(KVPair(100, (40..41).into()));
        assert_eq!(rle.0.len(), 3);
    }

    #[test]
    fn test_find_sparse() {
        let mut rle: RleVec<KVPair<VRange>> = RleVec::new();

        assert_eq!(rle.find_sparse(0), (Err((0..usize::MAX).into()), 0));
        assert_eq!(rle.find_sparse(10), (Err((0..usize::MAX).into()), 10));

        rle.insert(KVPair(15, (40..42).into()));
        assert_eq!(rle.find_sparse(10), (Err((0..15).into()), 10));
        assert_eq!(rle.find_sparse(15), (Ok(&rle.0[0]), 0));
        assert_eq!(rle.find_sparse(16), (Ok(&rle.0[0]), 1));
        assert_eq!(rle.find_sparse(17), (Err((17..usize::MAX).into()), 0));
        assert_eq!(rle.find_sparse(20), (Err((17..usize::MAX).into()), 3));
    }

    #[test]
    #[should_panic]
    fn insert_overlapping_panics() {
        let mut rle: RleVec<KVPair<VRange>> = RleVec::new();
        rle.insert(KVPair(10, (100..105).into()));
        rle.insert(KVPair(0, (0..1).into()));
        // 8..12 overlaps the entry at 10.
        rle.insert(KVPair(8, (50..54).into()));
    }
}
