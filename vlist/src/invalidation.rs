use core::mem;

use crate::{BatchId, RedrawStats, ScrollPosition};

bitflags::bitflags! {
    /// What must be rebuilt on the next redraw.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Dirty: u8 {
        /// Rows must be re-materialized from scratch.
        const ITEMS    = 0b0000_0001;
        /// Event delegation must be rebound.
        const EVENTS   = 0b0000_0010;
        /// The container markup must be remounted.
        const SKELETON = 0b0000_0100;
    }
}

/// One-shot callback run after the redraw of the batch it was attached to.
pub type Completion = Box<dyn FnOnce(&RedrawStats) + Send>;

/// A `scroll_to_item` request waiting for the next redraw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ScrollRequest {
    pub(crate) index: usize,
    pub(crate) position: ScrollPosition,
}

/// Everything that accumulated since the last redraw.
pub(crate) struct Invalidation {
    dirty: Dirty,
    scroll: Option<ScrollRequest>,
    completions: Vec<Completion>,
    batch: BatchId,
}

/// The part of an [`Invalidation`] a redraw consumes.
pub(crate) struct Batch {
    pub(crate) id: BatchId,
    pub(crate) dirty: Dirty,
    pub(crate) scroll: Option<ScrollRequest>,
    pub(crate) completions: Vec<Completion>,
}

impl Invalidation {
    pub(crate) fn new() -> Self {
        Self {
            dirty: Dirty::empty(),
            scroll: None,
            completions: Vec::new(),
            batch: BatchId(1),
        }
    }

    #[cfg(any(test, feature = "tracing"))]
    pub(crate) fn dirty(&self) -> Dirty {
        self.dirty
    }

    /// The batch that the next redraw will complete.
    pub(crate) fn batch(&self) -> BatchId {
        self.batch
    }

    pub(crate) fn mark(&mut self, flags: Dirty) {
        self.dirty |= flags;
    }

    /// Sets the scroll request; a later request replaces an earlier one.
    pub(crate) fn request_scroll(&mut self, request: ScrollRequest) {
        self.scroll = Some(request);
    }

    #[cfg(any(test, feature = "tracing"))]
    pub(crate) fn has_scroll_request(&self) -> bool {
        self.scroll.is_some()
    }

    pub(crate) fn attach(&mut self, completion: Option<Completion>) {
        if let Some(cb) = completion {
            self.completions.push(cb);
        }
    }

    /// Reads and clears the accumulated state, opening the next batch.
    pub(crate) fn take(&mut self) -> Batch {
        let id = self.batch;
        self.batch = BatchId(id.0 + 1);
        Batch {
            id,
            dirty: mem::take(&mut self.dirty),
            scroll: self.scroll.take(),
            completions: mem::take(&mut self.completions),
        }
    }

    /// Drops everything without running completions.
    pub(crate) fn discard(&mut self) {
        self.dirty = Dirty::empty();
        self.scroll = None;
        self.completions.clear();
    }
}

impl core::fmt::Debug for Invalidation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Invalidation")
            .field("dirty", &self.dirty)
            .field("scroll", &self.scroll)
            .field("completions", &self.completions.len())
            .field("batch", &self.batch)
            .finish()
    }
}
