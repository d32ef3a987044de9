use std::sync::Arc;

use crate::height_index::HeightIndex;
use crate::invalidation::{Completion, Dirty, Invalidation, ScrollRequest};
use crate::options::{ItemRenderer, ListConfig, ListViewOptions, SkeletonRenderer};
use crate::render_context::{Metrics, RenderContext, WindowState};
use crate::scheduler::{FrameDecision, FrameScheduler, FrameToken, RedrawScheduler};
use crate::surface::{EventMap, SkeletonModel, Surface};
use crate::viewport::{Viewport, ViewportEvent};
use crate::{BatchId, Error, RedrawEvent, RedrawStats, RenderWindow, Result, ScrollPosition};

/// Observer of [`RedrawEvent`]s.
pub type RedrawObserver = Arc<dyn Fn(&RedrawEvent) + Send + Sync>;

/// A virtualized list bound to a host surface and viewport.
///
/// Only the items near the visible range are materialized on the [`Surface`]; everything else is
/// represented by container padding computed from a [`HeightIndex`]. Heights are measured as rows
/// are materialized and unmeasured items use a running estimate.
///
/// Every mutating operation only records what changed and makes sure a redraw is pending. The
/// host delivers frames through [`ListView::on_frame`] and viewport events through
/// [`ListView::pump_events`]. Surface and viewport writes happen inside a redraw, except that
/// replacing the items or the default height drops the stale rows right away.
pub struct ListView<T, S: Surface> {
    options: ListViewOptions<T, S::Markup>,
    surface: S,
    viewport: Box<dyn Viewport>,
    scheduler: RedrawScheduler,
    invalidation: Invalidation,
    state: WindowState,
    rendered: bool,
    on_redraw: Option<RedrawObserver>,
    last_stats: Option<RedrawStats>,
    last_metrics: Option<Metrics>,
    events: Vec<ViewportEvent>,
}

impl<T, S: Surface> ListView<T, S> {
    /// Binds a list view to its host collaborators. Nothing is drawn until [`ListView::render`].
    pub fn new(
        surface: S,
        viewport: impl Viewport + 'static,
        frames: impl FrameScheduler + 'static,
        options: ListViewOptions<T, S::Markup>,
    ) -> Self {
        let mut options = options;
        options.config = options.config.sanitized();
        let config = options.config;
        vdebug!(
            items = options.items.len(),
            default_item_height = config.default_item_height,
            overscan = config.overscan,
            "ListView::new"
        );
        Self {
            state: WindowState::new(config.default_item_height, options.items.len()),
            scheduler: RedrawScheduler::new(
                Box::new(frames),
                config.key_debounce_ms,
                config.blocked_retry_ms,
            ),
            options,
            surface,
            viewport: Box::new(viewport),
            invalidation: Invalidation::new(),
            rendered: false,
            on_redraw: None,
            last_stats: None,
            last_metrics: None,
            events: Vec::new(),
        }
    }

    pub fn options(&self) -> &ListViewOptions<T, S::Markup> {
        &self.options
    }

    pub fn config(&self) -> ListConfig {
        self.options.config
    }

    pub fn items(&self) -> &[T] {
        &self.options.items
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn viewport(&self) -> &dyn Viewport {
        self.viewport.as_ref()
    }

    /// Whether [`ListView::render`] has been called (and [`ListView::remove`] has not).
    pub fn is_rendered(&self) -> bool {
        self.rendered
    }

    /// Materialized item range `[index_first, index_last)`.
    pub fn window(&self) -> RenderWindow {
        self.state.window
    }

    /// Padding last committed to the surface, `(top, bottom)`.
    pub fn padding(&self) -> (f64, f64) {
        self.state.padding
    }

    /// Current height estimate for unmeasured items.
    pub fn item_height(&self) -> f64 {
        self.state.heights.estimate()
    }

    pub fn heights(&self) -> &HeightIndex {
        &self.state.heights
    }

    pub fn last_stats(&self) -> Option<RedrawStats> {
        self.last_stats
    }

    /// Geometry as committed by the last redraw.
    pub fn last_metrics(&self) -> Option<Metrics> {
        self.last_metrics
    }

    pub fn is_redraw_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    /// The batch the next redraw will complete.
    pub fn pending_batch(&self) -> BatchId {
        self.invalidation.batch()
    }

    /// Item index of a materialized row, for delegated event handlers.
    pub fn index_for_row(&self, row: usize) -> Option<usize> {
        let index = self.state.window.index_first.checked_add(row)?;
        self.state.window.contains(index).then_some(index)
    }

    /// Subscribes to [`RedrawEvent`]s, replacing any previous observer.
    pub fn set_on_redraw(&mut self, observer: Option<RedrawObserver>) {
        self.on_redraw = observer;
    }

    /// Mounts the skeleton, binds events and draws the visible rows on the next frame.
    pub fn render(&mut self, on_done: Option<Completion>) -> BatchId {
        self.rendered = true;
        self.request(Dirty::SKELETON | Dirty::ITEMS | Dirty::EVENTS, on_done)
    }

    /// Replaces the items. Measurements and materialized rows are discarded.
    pub fn set_items(&mut self, items: impl Into<Arc<[T]>>) -> BatchId {
        self.options.items = items.into();
        self.rebuild_heights();
        self.request(Dirty::ITEMS, None)
    }

    /// Replaces all options and redraws everything, skeleton included.
    pub fn reset(
        &mut self,
        options: ListViewOptions<T, S::Markup>,
        on_done: Option<Completion>,
    ) -> BatchId {
        let mut options = options;
        options.config = options.config.sanitized();
        self.scheduler
            .configure(options.config.key_debounce_ms, options.config.blocked_retry_ms);
        self.options = options;
        self.rebuild_heights();
        vdebug!(items = self.options.items.len(), "ListView::reset");
        self.request(Dirty::SKELETON | Dirty::ITEMS | Dirty::EVENTS, on_done)
    }

    /// Re-materializes every row on the next redraw, keeping measured heights.
    pub fn invalidate(&mut self, on_done: Option<Completion>) -> BatchId {
        self.request(Dirty::ITEMS, on_done)
    }

    pub fn set_item_renderer(
        &mut self,
        f: impl Fn(&T) -> S::Markup + Send + Sync + 'static,
    ) -> BatchId {
        let renderer: ItemRenderer<T, S::Markup> = Arc::new(f);
        self.options.item_renderer = renderer;
        self.request(Dirty::ITEMS, None)
    }

    pub fn set_skeleton_renderer(
        &mut self,
        f: impl Fn(&SkeletonModel) -> S::Markup + Send + Sync + 'static,
    ) -> BatchId {
        let renderer: SkeletonRenderer<S::Markup> = Arc::new(f);
        self.options.skeleton_renderer = renderer;
        self.request(Dirty::SKELETON, None)
    }

    pub fn set_events(&mut self, events: EventMap) -> BatchId {
        self.options.events = events;
        self.request(Dirty::EVENTS, None)
    }

    /// Replaces the default height. Measurements are discarded.
    pub fn set_default_item_height(&mut self, height: f64) -> BatchId {
        self.options.config = ListConfig {
            default_item_height: height,
            ..self.options.config
        }
        .sanitized();
        self.rebuild_heights();
        self.request(Dirty::ITEMS, None)
    }

    /// Replaces the tuning knobs. A changed default height discards measurements.
    pub fn set_config(&mut self, config: ListConfig) -> BatchId {
        let config = config.sanitized();
        let height_changed = config.default_item_height != self.options.config.default_item_height;
        self.options.config = config;
        self.scheduler
            .configure(config.key_debounce_ms, config.blocked_retry_ms);
        if height_changed {
            self.rebuild_heights();
            self.request(Dirty::ITEMS, None)
        } else {
            self.request(Dirty::empty(), None)
        }
    }

    /// Scrolls so that item `index` sits at `position` once the next redraw completes.
    ///
    /// `index` is clamped to the last item; on an empty list the request is a no-op.
    ///
    /// # Errors
    ///
    /// [`Error::NotRendered`] before [`ListView::render`], [`Error::InvalidArgument`] for a
    /// non-finite offset. Nothing is scheduled on error.
    pub fn scroll_to_item(
        &mut self,
        index: usize,
        position: ScrollPosition,
        on_done: Option<Completion>,
    ) -> Result<BatchId> {
        if !self.rendered {
            return Err(Error::NotRendered);
        }
        let position = position.validate().inspect_err(|_err| {
            vwarn!(index, error = %_err, "rejected scroll request");
        })?;
        vdebug!(index, position = %position, "ListView::scroll_to_item");
        self.invalidation
            .request_scroll(ScrollRequest { index, position });
        Ok(self.request(Dirty::empty(), on_done))
    }

    /// Runs `on_done` after the next redraw without requesting one.
    pub fn once_did_redraw(&mut self, on_done: Completion) -> BatchId {
        self.invalidation.attach(Some(on_done));
        self.invalidation.batch()
    }

    /// Detaches from the host: cancels the pending frame, releases viewport listeners and drops
    /// materialized rows. Pending completions are discarded.
    pub fn remove(&mut self) {
        vdebug!(rendered = self.rendered, "ListView::remove");
        self.scheduler.cancel();
        self.viewport.remove();
        if self.surface.row_count() > 0 {
            self.surface.clear_rows();
        }
        self.invalidation.discard();
        self.state.window = RenderWindow::default();
        self.rendered = false;
    }

    /// Feeds one viewport event.
    pub fn handle_viewport_event(&mut self, event: ViewportEvent, now_ms: u64) {
        if !self.rendered {
            return;
        }
        match event {
            ViewportEvent::KeyPress => self.scheduler.block(now_ms),
            event if event.is_change() => self.scheduler.schedule_change(),
            _ => {}
        }
    }

    /// Drains the viewport's queued events. Returns how many were handled.
    pub fn pump_events(&mut self, now_ms: u64) -> usize {
        let mut events = core::mem::take(&mut self.events);
        self.viewport.poll_events(&mut events);
        let count = events.len();
        for event in events.drain(..) {
            self.handle_viewport_event(event, now_ms);
        }
        self.events = events;
        count
    }

    /// Delivers a frame requested from the [`FrameScheduler`].
    ///
    /// Returns the stats of the redraw it ran, if any. Stale tokens are ignored.
    pub fn on_frame(&mut self, token: FrameToken, now_ms: u64) -> Option<RedrawStats> {
        match self.scheduler.accept(token, now_ms) {
            FrameDecision::Run if self.rendered => Some(self.redraw()),
            FrameDecision::Run | FrameDecision::Stale | FrameDecision::Deferred => None,
        }
    }

    /// Runs the pending redraw now instead of waiting for its frame.
    pub fn flush(&mut self) -> Option<RedrawStats> {
        if !self.rendered || !self.scheduler.is_pending() {
            return None;
        }
        self.scheduler.cancel();
        Some(self.redraw())
    }

    fn request(&mut self, flags: Dirty, on_done: Option<Completion>) -> BatchId {
        self.invalidation.mark(flags);
        self.invalidation.attach(on_done);
        if self.rendered {
            self.scheduler.schedule();
        }
        vtrace!(
            dirty = ?self.invalidation.dirty(),
            scroll = self.invalidation.has_scroll_request(),
            rendered = self.rendered,
            "request redraw"
        );
        self.invalidation.batch()
    }

    fn rebuild_heights(&mut self) {
        self.state.heights =
            HeightIndex::new(self.options.config.default_item_height, self.options.items.len());
        // Rows of the old window no longer map to an item.
        if self.surface.row_count() > 0 {
            self.surface.clear_rows();
        }
        self.state.window = RenderWindow::default();
    }

    fn notify(&self, event: RedrawEvent) {
        if let Some(observer) = &self.on_redraw {
            observer(&event);
        }
    }

    fn redraw(&mut self) -> RedrawStats {
        let batch = self.invalidation.take();
        self.notify(RedrawEvent::WillRedraw(batch.id));

        let mut dirty = batch.dirty;
        if dirty.contains(Dirty::SKELETON) {
            let model = SkeletonModel {
                item_count: self.options.items.len(),
            };
            let skeleton = (self.options.skeleton_renderer)(&model);
            self.surface.mount_skeleton(skeleton);
            self.state.window = RenderWindow::default();
            self.state.padding = (0.0, 0.0);
            dirty |= Dirty::ITEMS | Dirty::EVENTS;
        }
        if dirty.contains(Dirty::EVENTS) {
            self.surface.delegate_events(&self.options.events);
        }

        let state = core::mem::take(&mut self.state);
        let mut ctx = RenderContext::begin(
            &mut self.surface,
            self.viewport.as_mut(),
            &self.options.items,
            &self.options.item_renderer,
            self.options.config,
            state,
            batch.scroll,
            dirty.contains(Dirty::ITEMS),
        );
        let convergence = ctx.run();
        let committed = ctx.commit();
        self.state = committed.state;

        let stats = RedrawStats {
            batch: batch.id,
            passes: convergence.passes,
            converged: convergence.converged,
            changed: committed.changed,
            window: self.state.window,
            scroll_top: committed.metrics.scroll_top,
            item_height: self.state.heights.estimate(),
        };
        self.last_stats = Some(stats);
        self.last_metrics = Some(committed.metrics);
        vdebug!(
            batch = stats.batch.0,
            passes = stats.passes,
            converged = stats.converged,
            changed = stats.changed,
            first = stats.window.index_first,
            last = stats.window.index_last,
            "redraw"
        );

        self.notify(RedrawEvent::DidRedraw(stats));
        for done in batch.completions {
            done(&stats);
        }
        stats
    }
}

impl<T, S: Surface + core::fmt::Debug> core::fmt::Debug for ListView<T, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ListView")
            .field("options", &self.options)
            .field("surface", &self.surface)
            .field("scheduler", &self.scheduler)
            .field("invalidation", &self.invalidation)
            .field("window", &self.state.window)
            .field("rendered", &self.rendered)
            .finish_non_exhaustive()
    }
}
