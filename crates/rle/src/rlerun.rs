use crate::{HasLength, MergableSpan, SplitableSpanHelpers};

/// A span containing a single value repeated `len` times. Used in tests and
/// as the simplest example of the span traits.
#[derive(Copy, Clone, Hash, Debug, PartialEq, Eq, Default)]
pub struct RleRun<T: Clone + Eq> {
    pub val: T,
    pub len: usize,
}

impl<T: Clone + Eq> RleRun<T> {
    pub fn new(val: T, len: usize) -> Self {
        Self { val, len }
    }

    pub fn single(val: T) -> Self {
        Self { val, len: 1 }
    }
}

impl<T: Clone + Eq> HasLength for RleRun<T> {
    fn len(&self) -> usize { self.len }
}

impl<T: Clone + Eq> SplitableSpanHelpers for RleRun<T> {
    fn truncate_h(&mut self, at: usize) -> Self {
        let remainder = self.len - at;
        self.len = at;
        Self { val: self.val.clone(), len: remainder }
    }
}

impl<T: Clone + Eq> MergableSpan for RleRun<T> {
    fn can_append(&self, other: &Self) -> bool {
        self.val == other.val || self.len == 0
    }

    fn append(&mut self, other: Self) {
        self.len += other.len;
        self.val = other.val; // Needed when self was default(), with length 0.
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_splitable_methods_valid;

    #[test]
    fn rle_run_valid() {
        test_splitable_methods_valid(RleRun::new('x', 5));
    }
}
