//! Ordered range tables for turning a uniform draw into a condition label.

/// Half-open `[lower, upper)` ranges tested in order; a draw that falls in
/// none of them gets the fallback label.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdTable<L, const N: usize> {
    ranges: [(f64, f64, L); N],
    fallback: L,
}

impl<L: Copy, const N: usize> ThresholdTable<L, N> {
    pub const fn new(ranges: [(f64, f64, L); N], fallback: L) -> Self {
        Self { ranges, fallback }
    }

    pub fn classify(&self, draw: f64) -> L {
        self.ranges
            .iter()
            .find(|(lower, upper, _)| *lower <= draw && draw < *upper)
            .map(|(_, _, label)| *label)
            .unwrap_or(self.fallback)
    }
}
