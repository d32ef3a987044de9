use vlist::{ListView, ListViewOptions, ManualFrames, RedrawStats, Viewport};

use crate::{Page, PageSurface, Row};

/// Upper bound on event/frame rounds per [`Driver::settle`].
const MAX_SETTLE_ROUNDS: usize = 256;

/// Length of one simulated animation frame.
pub const FRAME_MS: u64 = 16;

/// Runs a [`ListView`] against a [`Page`] on a simulated clock.
///
/// The driver owns the list view and the frame queue it schedules on. Adapters advance it by
/// calling:
/// - `tick(now_ms)` once per animation frame: pumps viewport events, then delivers due frames
/// - `settle()` to run frames until the list is idle
pub struct Driver<T> {
    list: ListView<T, PageSurface>,
    frames: ManualFrames,
    page: Page,
    now_ms: u64,
}

impl<T> Driver<T> {
    pub fn new(
        page: &Page,
        viewport: impl Viewport + 'static,
        options: ListViewOptions<T, Row>,
    ) -> Self {
        Self::with_frames(page, viewport, ManualFrames::new(), options)
    }

    /// Uses `frames` as the frame queue; it must not be ticked by anyone else.
    pub fn with_frames(
        page: &Page,
        viewport: impl Viewport + 'static,
        frames: ManualFrames,
        options: ListViewOptions<T, Row>,
    ) -> Self {
        let now_ms = frames.now_ms();
        Self {
            list: ListView::new(PageSurface::new(page), viewport, frames.clone(), options),
            frames,
            page: page.clone(),
            now_ms,
        }
    }

    pub fn list(&self) -> &ListView<T, PageSurface> {
        &self.list
    }

    pub fn list_mut(&mut self) -> &mut ListView<T, PageSurface> {
        &mut self.list
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn frames(&self) -> &ManualFrames {
        &self.frames
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Advances the clock to `now_ms`, pumps viewport events and runs due frames.
    ///
    /// Returns the stats of the redraws that ran.
    pub fn tick(&mut self, now_ms: u64) -> Vec<RedrawStats> {
        self.now_ms = self.now_ms.max(now_ms);
        self.list.pump_events(self.now_ms);
        let mut out = Vec::new();
        for token in self.frames.tick(self.now_ms) {
            out.extend(self.list.on_frame(token, self.now_ms));
        }
        out
    }

    /// Ticks frame by frame, skipping ahead to pending timeouts, until no events or frames remain.
    ///
    /// Returns the stats of every redraw that ran.
    pub fn settle(&mut self) -> Vec<RedrawStats> {
        let mut out = Vec::new();
        for _ in 0..MAX_SETTLE_ROUNDS {
            let ran = self.tick(self.now_ms);
            if ran.is_empty() {
                // Only timeouts can still be outstanding; jump to the earliest.
                match self.frames.next_deadline() {
                    Some(deadline) => self.now_ms = deadline.max(self.now_ms),
                    None => break,
                }
            } else {
                out.extend(ran);
                self.now_ms += FRAME_MS;
            }
        }
        out
    }

    /// Detaches the list view and returns the page.
    pub fn remove(mut self) -> Page {
        self.list.remove();
        self.page
    }
}

impl<T> core::fmt::Debug for Driver<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Driver")
            .field("list", &self.list)
            .field("frames", &self.frames)
            .field("now_ms", &self.now_ms)
            .finish()
    }
}
