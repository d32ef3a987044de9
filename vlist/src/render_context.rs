//! One redraw's worth of reconciliation.
//!
//! Coordinates are viewport-relative pixels. The geometry is tracked as
//!
//! ```text
//!  el_top      ┬ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─   scrollable content
//!              │
//!  list_top    ├──┬ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─   list container
//!              │  │ padding top = read(first)
//!  items_top   │  ├──┬ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─   materialized rows
//!  visible_top │  │  │ ┬ ─ ─ ─ ─ ─ ─ ─ ─ ─   viewport
//!  visible_bot │  │  │ ┴
//!  items_bot   │  ├──┴
//!              │  │ padding bottom = read(N) - read(last)
//!  list_bot    ├──┴
//!  el_bot      ┴
//! ```
//!
//! Scroll changes are accumulated in [`Metrics::scroll_top`] while the content edges move the
//! opposite way; nothing is written to the viewport until [`RenderContext::commit`].

use core::mem;

use crate::height_index::HeightIndex;
use crate::invalidation::ScrollRequest;
use crate::options::{ItemRenderer, ListConfig};
use crate::surface::Surface;
use crate::viewport::{ScrollTo, Viewport};
use crate::{Anchor, RenderWindow, ScrollPosition};

/// Anchor corrections at or below this many pixels are treated as converged.
pub const SCROLL_TOLERANCE: f64 = 1.0;

const PADDING_EPSILON: f64 = 1e-6;

/// Screens' worth of rows (at the current estimate, overscan included) one redraw may
/// materialize.
const ROW_BUDGET_SCREENS: usize = 8;

/// Geometry snapshot of a redraw; see the module docs for the layout.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Metrics {
    pub el_top: f64,
    pub el_height: f64,
    pub visible_top: f64,
    pub visible_height: f64,
    pub list_top: f64,
    pub list_height: f64,
    pub scroll_top: f64,
}

impl Metrics {
    pub fn visible_bot(&self) -> f64 {
        self.visible_top + self.visible_height
    }

    pub fn list_bot(&self) -> f64 {
        self.list_top + self.list_height
    }

    /// Top of the first materialized row, given the container's top padding.
    pub fn items_top(&self, padding_top: f64) -> f64 {
        self.list_top + padding_top
    }

    /// Bottom of the last materialized row, given the container's bottom padding.
    pub fn items_bot(&self, padding_bot: f64) -> f64 {
        self.list_bot() - padding_bot
    }

    /// Largest scroll offset the content allows.
    pub fn max_scroll(&self) -> f64 {
        (self.el_height - self.visible_height).max(0.0)
    }

    /// Moves the scroll offset by `delta`; content edges move the other way.
    fn scroll_by(&mut self, delta: f64) {
        self.scroll_top += delta;
        self.el_top -= delta;
        self.list_top -= delta;
    }
}

/// Window state owned by the list view between redraws.
#[derive(Clone, Debug)]
pub(crate) struct WindowState {
    pub(crate) heights: HeightIndex,
    pub(crate) window: RenderWindow,
    /// Padding last committed to the surface.
    pub(crate) padding: (f64, f64),
}

impl WindowState {
    pub(crate) fn new(default_height: f64, len: usize) -> Self {
        Self {
            heights: HeightIndex::new(default_height, len),
            window: RenderWindow::default(),
            padding: (0.0, 0.0),
        }
    }
}

impl Default for WindowState {
    fn default() -> Self {
        Self::new(0.0, 0)
    }
}

/// Result of the pass loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Convergence {
    pub(crate) passes: usize,
    pub(crate) converged: bool,
}

/// Result of a commit.
#[derive(Clone, Debug)]
pub(crate) struct Committed {
    pub(crate) state: WindowState,
    pub(crate) metrics: Metrics,
    pub(crate) changed: bool,
}

/// The unit of work of one redraw.
///
/// Takes the window state by value, threads it through the passes and hands it back from
/// [`RenderContext::commit`]. Rows are inserted and measured on the surface as the window grows,
/// but padding and scroll offset are only written at commit.
pub(crate) struct RenderContext<'a, T, S: Surface> {
    surface: &'a mut S,
    viewport: &'a mut dyn Viewport,
    items: &'a [T],
    render_item: &'a ItemRenderer<T, S::Markup>,
    config: ListConfig,
    state: WindowState,
    metrics: Metrics,
    initial_scroll: f64,
    anchor: Anchor,
    /// The anchor is a `Middle` request; its top follows the item's measured height.
    centered: bool,
    force_clear: bool,
    changed: bool,
    row_budget: usize,
    rows_rendered: usize,
}

impl<'a, T, S: Surface> RenderContext<'a, T, S> {
    /// Measures the current geometry and settles on the anchor for this redraw.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn begin(
        surface: &'a mut S,
        viewport: &'a mut dyn Viewport,
        items: &'a [T],
        render_item: &'a ItemRenderer<T, S::Markup>,
        config: ListConfig,
        state: WindowState,
        scroll: Option<ScrollRequest>,
        force_clear: bool,
    ) -> Self {
        let metrics = measure(&*viewport, &*surface);
        let mut ctx = Self {
            surface,
            viewport,
            items,
            render_item,
            config,
            state,
            metrics,
            initial_scroll: metrics.scroll_top,
            anchor: Anchor {
                index: 0,
                top: metrics.list_top,
            },
            centered: false,
            force_clear,
            changed: false,
            row_budget: 0,
            rows_rendered: 0,
        };
        debug_assert_eq!(
            ctx.state.heights.len(),
            ctx.items.len(),
            "height index out of sync with items"
        );
        if !force_clear && ctx.remeasure() {
            ctx.normalize();
        } else {
            ctx.sync_list_height();
        }
        ctx.row_budget = row_budget(
            ctx.metrics.visible_height,
            ctx.state.heights.estimate(),
            config.overscan,
        );
        ctx.clamp_scroll();
        let resolved = scroll.and_then(|req| ctx.resolve_scroll(req));
        ctx.centered = resolved.is_some()
            && scroll.is_some_and(|req| req.position == ScrollPosition::Middle);
        ctx.anchor = resolved.unwrap_or_else(|| ctx.default_anchor());
        vtrace!(
            index = ctx.anchor.index,
            top = ctx.anchor.top,
            scroll_top = ctx.metrics.scroll_top,
            "RenderContext::begin"
        );
        ctx
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn rows_left(&self) -> usize {
        self.row_budget.saturating_sub(self.rows_rendered)
    }

    /// Re-reads the heights of the rows already on the surface, which may have reflowed since
    /// they were inserted. Returns `true` if any height changed.
    fn remeasure(&mut self) -> bool {
        let window = self.state.window;
        if window.index_last > self.len() {
            return false;
        }
        let rows = self.surface.row_count().min(window.len());
        let mut reflowed = false;
        for row in 0..rows {
            let Some(rect) = self.surface.row_rect(row) else {
                continue;
            };
            let delta = self
                .state
                .heights
                .write_single(window.index_first + row, rect.height);
            reflowed |= delta.abs() > PADDING_EPSILON;
        }
        if reflowed {
            vtrace!(rows, "materialized rows reflowed");
        }
        reflowed
    }

    /// Viewport-relative top of item `index` (`index == len` is the list bottom).
    fn item_top(&self, index: usize) -> f64 {
        self.metrics.list_top + self.state.heights.read(index)
    }

    /// Turns a `scroll_to_item` request into an anchor. `None` means "leave the scroll alone".
    fn resolve_scroll(&self, req: ScrollRequest) -> Option<Anchor> {
        let n = self.len();
        if n == 0 {
            return None;
        }
        let index = req.index.min(n - 1);
        let height = self.state.heights.item_height(index).unwrap_or(0.0);
        let top = self.item_top(index);
        let visible_top = self.metrics.visible_top;
        let visible_bot = self.metrics.visible_bot();

        let position = match req.position {
            ScrollPosition::Default if top < visible_top => ScrollPosition::Top,
            ScrollPosition::Default if top + height > visible_bot => ScrollPosition::Bottom,
            ScrollPosition::Default => return None,
            other => other,
        };
        let anchor = match position {
            ScrollPosition::Top => Anchor {
                index,
                top: visible_top,
            },
            // Anchor the next item's top so a late measurement of this one cannot misplace it.
            ScrollPosition::Bottom => Anchor {
                index: index + 1,
                top: visible_bot,
            },
            ScrollPosition::Middle => Anchor {
                index,
                top: (visible_top + visible_bot - height) / 2.0,
            },
            ScrollPosition::Offset(px) => Anchor {
                index,
                top: visible_top + px,
            },
            ScrollPosition::Default => return None,
        };
        vdebug!(
            index = anchor.index,
            top = anchor.top,
            position = %req.position,
            "resolved scroll request"
        );
        Some(anchor)
    }

    /// Keeps whatever is on screen where it is, preferring an already materialized item.
    fn default_anchor(&self) -> Anchor {
        let n = self.len();
        let heights = &self.state.heights;
        let window = self.state.window;
        let index_top = heights.lower_bound(self.metrics.visible_top - self.metrics.list_top);
        let index_bot = heights
            .upper_bound(self.metrics.visible_bot() - self.metrics.list_top)
            .min(n);

        let index = if window.contains(index_top) {
            index_top
        } else if window.contains(index_bot) {
            index_bot
        } else if index_top <= window.index_first && window.index_first < index_bot {
            window.index_first
        } else {
            index_top
        };
        Anchor {
            index,
            top: self.item_top(index),
        }
    }

    /// Runs reconciliation passes until a fixed point or the pass cap.
    pub(crate) fn run(&mut self) -> Convergence {
        let max_passes = self.config.max_passes.max(1);
        for pass in 1..=max_passes {
            let moved = self.align_to_anchor();
            let target = self.target_range();

            let restart = self.force_clear || !self.state.window.overlaps(&target);
            let short = restart
                || target.index_first < self.state.window.index_first
                || target.index_last > self.state.window.index_last;
            if short && self.rows_left() == 0 {
                vwarn!(
                    rows = self.rows_rendered,
                    first = self.state.window.index_first,
                    last = self.state.window.index_last,
                    "redraw stopped; row budget spent"
                );
                return Convergence {
                    passes: pass,
                    converged: false,
                };
            }

            if restart {
                self.restart_at(target.index_first);
                self.force_clear = false;
            }

            let mut grew = false;
            let first = self.state.window.index_first;
            if target.index_first < first {
                self.render_top(target.index_first.max(first.saturating_sub(self.rows_left())));
                grew = true;
            }
            let last = self.state.window.index_last;
            let end = target
                .index_last
                .min(last.saturating_add(self.rows_left()));
            if end > last {
                self.render_bottom(end);
                grew = true;
            }
            if grew {
                self.normalize();
            }
            let purged = self.purge(target);

            vtrace!(
                pass,
                moved,
                grew,
                purged,
                first = self.state.window.index_first,
                last = self.state.window.index_last,
                scroll_top = self.metrics.scroll_top,
                "reconcile pass"
            );

            if !moved && !grew && !purged {
                return Convergence {
                    passes: pass,
                    converged: true,
                };
            }
        }

        vwarn!(
            max_passes,
            first = self.state.window.index_first,
            last = self.state.window.index_last,
            "redraw did not converge; pass cap reached"
        );
        Convergence {
            passes: max_passes,
            converged: false,
        }
    }

    /// Moves the pending scroll offset so the anchor lands on its desired top.
    ///
    /// Returns `true` if the offset moved by more than [`SCROLL_TOLERANCE`].
    fn align_to_anchor(&mut self) -> bool {
        if self.centered {
            let height = self.state.heights.item_height(self.anchor.index).unwrap_or(0.0);
            self.anchor.top = (self.metrics.visible_top + self.metrics.visible_bot() - height) / 2.0;
        }
        let delta = self.item_top(self.anchor.index) - self.anchor.top;
        if delta.abs() <= SCROLL_TOLERANCE {
            return false;
        }
        let target = (self.metrics.scroll_top + delta).clamp(0.0, self.metrics.max_scroll());
        let applied = target - self.metrics.scroll_top;
        if applied.abs() <= SCROLL_TOLERANCE {
            return false;
        }
        self.metrics.scroll_by(applied);
        self.changed = true;
        true
    }

    /// Pulls the scroll offset back into range after the content shrank.
    fn clamp_scroll(&mut self) {
        let max = self.metrics.max_scroll();
        if self.metrics.scroll_top > max {
            self.metrics.scroll_by(max - self.metrics.scroll_top);
            self.changed = true;
        }
    }

    /// Items covering the visible range, widened by the overscan margin.
    fn target_range(&self) -> RenderWindow {
        let n = self.len();
        if n == 0 {
            return RenderWindow::default();
        }
        let heights = &self.state.heights;
        let top_offset = self.metrics.visible_top - self.metrics.list_top;
        let bot_offset = self.metrics.visible_bot() - self.metrics.list_top;

        let first = heights.lower_bound(top_offset).min(n);
        let last = if bot_offset <= 0.0 {
            0
        } else {
            heights.upper_bound(bot_offset).saturating_add(1).min(n)
        };
        let last = last.max(first);

        let overscan = self.config.overscan;
        RenderWindow::new(
            first.saturating_sub(overscan),
            last.saturating_add(overscan).min(n),
        )
    }

    /// Drops every materialized row and restarts the window, empty, at `index`.
    fn restart_at(&mut self, index: usize) {
        let restarted = RenderWindow::new(index, index);
        if self.surface.row_count() == 0 && self.state.window == restarted {
            return;
        }
        vtrace!(
            from_first = self.state.window.index_first,
            from_last = self.state.window.index_last,
            index,
            "clear window"
        );
        if self.surface.row_count() > 0 {
            self.surface.clear_rows();
        }
        self.state.window = restarted;
        self.changed = true;
    }

    fn render_rows(&self, start: usize, end: usize) -> Vec<S::Markup> {
        self.items[start..end]
            .iter()
            .map(|item| (self.render_item)(item))
            .collect()
    }

    /// Materializes `[index, index_first)` above the window and measures the new rows.
    fn render_top(&mut self, index: usize) {
        let first = self.state.window.index_first;
        let rows = self.render_rows(index, first);
        let count = rows.len();
        self.surface.insert_front(rows);
        self.rows_rendered += count;
        for row in 0..count {
            self.record_height(index + row, row);
        }
        self.state.window.index_first = index;
        self.changed = true;
        debug_assert_eq!(self.surface.row_count(), self.state.window.len());
    }

    /// Materializes `[index_last, index)` below the window and measures the new rows.
    fn render_bottom(&mut self, index: usize) {
        let last = self.state.window.index_last;
        let rows = self.render_rows(last, index);
        let count = rows.len();
        self.surface.insert_back(rows);
        self.rows_rendered += count;
        let base = self.surface.row_count().saturating_sub(count);
        for row in 0..count {
            self.record_height(last + row, base + row);
        }
        self.state.window.index_last = index;
        self.changed = true;
        debug_assert_eq!(self.surface.row_count(), self.state.window.len());
    }

    fn record_height(&mut self, index: usize, row: usize) {
        let height = self.surface.row_rect(row).map_or(0.0, |r| r.height);
        self.state.heights.write_single(index, height);
    }

    /// Re-estimates unmeasured items from the window's observed average height.
    fn normalize(&mut self) {
        let window = self.state.window;
        let (sum_last, count_last) = self.state.heights.measured_prefix(window.index_last);
        let (sum_first, count_first) = self.state.heights.measured_prefix(window.index_first);
        let count = count_last.saturating_sub(count_first);
        if count > 0 {
            let average = (sum_last - sum_first) / count as f64;
            if self.state.heights.set_estimate(average) {
                vtrace!(estimate = self.state.heights.estimate(), "re-estimated item height");
            }
        }
        self.sync_list_height();
    }

    /// Brings list and content heights in line with the height index.
    fn sync_list_height(&mut self) {
        let total = self.state.heights.total();
        let delta = total - self.metrics.list_height;
        self.metrics.list_height = total;
        self.metrics.el_height = (self.metrics.el_height + delta).max(0.0);
    }

    /// Removes rows outside `keep` that lie fully outside the visible range widened by half a
    /// viewport on each side. Returns `true` if anything was removed.
    fn purge(&mut self, keep: RenderWindow) -> bool {
        let half = self.metrics.visible_height / 2.0;
        let band_top = self.metrics.visible_top - half;
        let band_bot = self.metrics.visible_bot() + half;
        let window = self.state.window;

        let mut first = window.index_first;
        while first < window.index_last
            && first < keep.index_first
            && self.item_top(first + 1) < band_top
        {
            first += 1;
        }
        let mut last = window.index_last;
        while last > first && last > keep.index_last && self.item_top(last - 1) > band_bot {
            last -= 1;
        }

        let front = first - window.index_first;
        let back = window.index_last - last;
        if front == 0 && back == 0 {
            return false;
        }
        if front > 0 {
            self.surface.remove_front(front);
        }
        if back > 0 {
            self.surface.remove_back(back);
        }
        self.state.window = RenderWindow::new(first, last);
        self.changed = true;
        debug_assert_eq!(self.surface.row_count(), self.state.window.len());
        true
    }

    /// Writes padding and scroll offset if anything changed, and returns the state.
    pub(crate) fn commit(mut self) -> Committed {
        let window = self.state.window;
        let total = self.state.heights.total();
        let padding = (
            self.state.heights.read(window.index_first),
            total - self.state.heights.read(window.index_last),
        );
        let padding_changed = (padding.0 - self.state.padding.0).abs() > PADDING_EPSILON
            || (padding.1 - self.state.padding.1).abs() > PADDING_EPSILON;
        let scroll_changed = (self.metrics.scroll_top - self.initial_scroll).abs() > PADDING_EPSILON;
        let changed = self.changed || padding_changed || scroll_changed;

        if changed {
            self.surface.set_padding(padding.0, padding.1);
            self.state.padding = padding;
            if scroll_changed {
                self.viewport.scroll_to(ScrollTo::y(self.metrics.scroll_top));
            }
            vtrace!(
                items_top = self.metrics.items_top(padding.0),
                items_bot = self.metrics.items_bot(padding.1),
                padding_top = padding.0,
                padding_bot = padding.1,
                scroll_top = self.metrics.scroll_top,
                "commit"
            );
        }

        Committed {
            state: mem::take(&mut self.state),
            metrics: self.metrics,
            changed,
        }
    }
}

/// Rows one redraw may materialize when unmeasured items are `estimate` tall.
fn row_budget(visible_height: f64, estimate: f64, overscan: usize) -> usize {
    let screen = (visible_height.max(0.0) / estimate).ceil() as usize;
    screen
        .saturating_add(overscan.saturating_mul(2))
        .saturating_add(1)
        .saturating_mul(ROW_BUDGET_SCREENS)
}

fn measure<S: Surface>(viewport: &dyn Viewport, surface: &S) -> Metrics {
    let vp = viewport.metrics();
    let list = surface.container_rect();
    Metrics {
        el_top: vp.inner.top,
        el_height: vp.inner.height,
        visible_top: vp.outer.top,
        visible_height: vp.outer.height,
        list_top: list.top,
        list_height: list.height,
        scroll_top: vp.scroll.y,
    }
}
