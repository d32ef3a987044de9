use crate::fenwick::{Fenwick, Node};

/// Smallest height an estimate may take.
///
/// A zero estimate would let an unbounded number of unmeasured rows fit into any viewport.
pub const MIN_ESTIMATE: f64 = 1.0;

/// Cumulative heights over `0..len` items whose real heights are discovered lazily.
///
/// Every item starts at the estimate. [`HeightIndex::write_single`] records a measured height,
/// which is used by every later query. The estimate itself can be replaced in `O(1)` through
/// [`HeightIndex::set_estimate`]; recorded measurements are unaffected.
///
/// All queries are `O(log n)`.
#[derive(Clone, Debug)]
pub struct HeightIndex {
    sums: Fenwick,
    measured: Vec<Option<f64>>,
    estimate: f64,
}

impl HeightIndex {
    /// Creates an index of `len` items, all at `default_height` (at least [`MIN_ESTIMATE`]).
    pub fn new(default_height: f64, len: usize) -> Self {
        Self {
            sums: Fenwick::new(len),
            measured: vec![None; len],
            estimate: sanitize_estimate(default_height),
        }
    }

    pub fn len(&self) -> usize {
        self.measured.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measured.is_empty()
    }

    /// Height used for items that have not been measured yet.
    pub fn estimate(&self) -> f64 {
        self.estimate
    }

    /// Replaces the height of every unmeasured item.
    ///
    /// Returns `true` if the estimate changed.
    pub fn set_estimate(&mut self, height: f64) -> bool {
        let height = sanitize_estimate(height);
        if (height - self.estimate).abs() <= f64::EPSILON {
            return false;
        }
        self.estimate = height;
        true
    }

    /// Cumulative height of items `[0, index)`. `index` is clamped to `len`.
    pub fn read(&self, index: usize) -> f64 {
        let index = index.min(self.len());
        self.sums.prefix(index).extent(index, self.estimate)
    }

    /// Total height of all items.
    pub fn total(&self) -> f64 {
        self.read(self.len())
    }

    /// Records the measured height of item `index`.
    ///
    /// Negative or non-finite heights are recorded as `0`. Out-of-range indices are ignored.
    /// Returns the change of the item's height.
    pub fn write_single(&mut self, index: usize, height: f64) -> f64 {
        let Some(slot) = self.measured.get_mut(index) else {
            return 0.0;
        };
        let height = if height.is_finite() { height.max(0.0) } else { 0.0 };
        let (before, sum, count) = match slot.replace(height) {
            Some(prev) => (prev, height - prev, 0),
            None => (self.estimate, height, 1),
        };
        if sum != 0.0 || count != 0 {
            self.sums.add(index, sum, count);
        }
        height - before
    }

    /// Height of item `index`: measured if known, estimated otherwise.
    pub fn item_height(&self, index: usize) -> Option<f64> {
        self.measured
            .get(index)
            .map(|h| h.unwrap_or(self.estimate))
    }

    pub fn is_measured(&self, index: usize) -> bool {
        self.measured.get(index).is_some_and(Option::is_some)
    }

    /// Number of items with a recorded measurement.
    pub fn measured_count(&self) -> usize {
        self.sums.prefix(self.len()).count
    }

    /// Smallest index `i` such that `read(i + 1) > offset`, i.e. the item covering `offset`.
    ///
    /// Returns `0` for `offset <= 0` and `len` when `offset` is at or past the end.
    pub fn lower_bound(&self, offset: f64) -> usize {
        if offset.is_nan() || offset <= 0.0 {
            return 0;
        }
        self.sums.search(self.estimate, |extent| extent <= offset)
    }

    /// Largest index `i` such that `read(i) < offset`, i.e. the last item starting before
    /// `offset`.
    ///
    /// Returns `0` for `offset <= 0` and `len` when `offset` is past the end.
    pub fn upper_bound(&self, offset: f64) -> usize {
        if offset.is_nan() || offset <= 0.0 {
            return 0;
        }
        self.sums.search(self.estimate, |extent| extent < offset)
    }

    /// Measured part of the first `count` items (sum, count).
    pub(crate) fn measured_prefix(&self, count: usize) -> (f64, usize) {
        let Node { sum, count } = self.sums.prefix(count.min(self.len()));
        (sum, count)
    }
}

fn sanitize_estimate(height: f64) -> f64 {
    if height.is_finite() {
        height.max(MIN_ESTIMATE)
    } else {
        MIN_ESTIMATE
    }
}
