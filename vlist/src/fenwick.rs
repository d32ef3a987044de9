use core::cmp;

/// One Fenwick node: the measured part of the span it covers.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Node {
    /// Sum of the measured heights in the span.
    pub(crate) sum: f64,
    /// Number of measured items in the span.
    pub(crate) count: usize,
}

impl Node {
    /// Height of a span of `len` items, unmeasured ones taking `estimate`.
    pub(crate) fn extent(self, len: usize, estimate: f64) -> f64 {
        self.sum + len.saturating_sub(self.count) as f64 * estimate
    }
}

/// Fenwick tree over per-item measurements.
///
/// Unmeasured items are not stored at all; callers combine a prefix [`Node`] with the current
/// estimate through [`Node::extent`]. This keeps construction a single zeroed allocation and
/// lets the estimate change without touching the tree.
#[derive(Clone, Debug)]
pub(crate) struct Fenwick {
    tree: Vec<Node>, // 1-indexed
    max_bit: usize,
}

impl Fenwick {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            tree: vec![Node::default(); n + 1],
            max_bit: highest_power_of_two_leq(n),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.tree.len().saturating_sub(1)
    }

    /// Adds `sum`/`count` deltas to the node chain covering `index`.
    pub(crate) fn add(&mut self, index: usize, sum: f64, count: isize) {
        let n = self.len();
        if index >= n {
            return;
        }
        let mut i = index + 1;
        while i <= n {
            let node = &mut self.tree[i];
            node.sum += sum;
            node.count = node.count.saturating_add_signed(count);
            debug_assert!(
                node.sum > -1e-6,
                "Fenwick underflow (idx={i}, sum={}, delta={sum})",
                node.sum
            );
            i += lsb(i);
        }
    }

    /// Measured part of the first `count` items.
    pub(crate) fn prefix(&self, count: usize) -> Node {
        let mut i = cmp::min(count, self.len());
        let mut acc = Node::default();
        while i > 0 {
            acc.sum += self.tree[i].sum;
            acc.count += self.tree[i].count;
            i &= i - 1;
        }
        acc
    }

    /// Returns the largest `count` such that `fits(extent of the first count items)` holds.
    ///
    /// `fits` must be monotone: once it rejects a prefix it must reject every longer one.
    /// Runs in `O(log n)` by descending the implicit tree.
    pub(crate) fn search(&self, estimate: f64, mut fits: impl FnMut(f64) -> bool) -> usize {
        let n = self.len();
        let mut idx = 0usize;
        let mut acc = 0.0f64;
        let mut bit = self.max_bit;
        while bit != 0 {
            let next = idx + bit;
            if next <= n {
                // `idx` is a multiple of `2 * bit`, so node `next` spans exactly `bit` items.
                let extent = acc + self.tree[next].extent(bit, estimate);
                if fits(extent) {
                    idx = next;
                    acc = extent;
                }
            }
            bit >>= 1;
        }
        idx
    }
}

fn lsb(i: usize) -> usize {
    i & i.wrapping_neg()
}

fn highest_power_of_two_leq(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    let mut p = 1usize;
    while p <= n / 2 {
        p <<= 1;
    }
    p
}
