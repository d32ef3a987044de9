use crate::*;

use crate::invalidation::{Invalidation, ScrollRequest};
use crate::scheduler::{FrameDecision, RedrawScheduler};

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use proptest::prelude::*;

#[derive(Clone, Copy, Debug)]
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u64(&mut self) -> u64 {
        // Deterministic, dependency-free PRNG for tests.
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0
    }

    fn gen_range_u64(&mut self, start: u64, end_exclusive: u64) -> u64 {
        debug_assert!(start < end_exclusive);
        let span = end_exclusive - start;
        start + (self.next_u64() % span)
    }

    fn gen_height(&mut self, min: u64, max_exclusive: u64) -> f64 {
        self.gen_range_u64(min, max_exclusive) as f64
    }
}

fn naive_read(heights: &[Option<f64>], estimate: f64, index: usize) -> f64 {
    heights[..index].iter().map(|h| h.unwrap_or(estimate)).sum()
}

/// A page with a single scrolling window and the list container right below a header.
#[derive(Debug, Default)]
struct Page {
    view_height: f64,
    header: f64,
    scroll_y: f64,
    padding: (f64, f64),
    rows: Vec<f64>,
    skeletons: usize,
    delegations: usize,
    listening: bool,
    events: Vec<ViewportEvent>,
}

impl Page {
    fn list_height(&self) -> f64 {
        self.padding.0 + self.rows.iter().sum::<f64>() + self.padding.1
    }

    fn content_height(&self) -> f64 {
        self.header + self.list_height()
    }

    fn max_scroll(&self) -> f64 {
        (self.content_height() - self.view_height).max(0.0)
    }

    fn list_top(&self) -> f64 {
        self.header - self.scroll_y
    }

    fn row_top(&self, row: usize) -> f64 {
        self.list_top() + self.padding.0 + self.rows[..row].iter().sum::<f64>()
    }

    fn emit(&mut self, event: ViewportEvent) {
        if self.listening {
            self.events.push(event);
        }
    }
}

#[derive(Debug)]
struct TestSurface(Rc<RefCell<Page>>);

impl Surface for TestSurface {
    type Markup = f64;

    fn mount_skeleton(&mut self, _skeleton: f64) {
        let mut page = self.0.borrow_mut();
        page.rows.clear();
        page.padding = (0.0, 0.0);
        page.skeletons += 1;
    }

    fn delegate_events(&mut self, _events: &EventMap) {
        self.0.borrow_mut().delegations += 1;
    }

    fn container_rect(&self) -> Rect {
        let page = self.0.borrow();
        Rect::new(page.list_top(), 0.0, 320.0, page.list_height())
    }

    fn insert_front(&mut self, rows: Vec<f64>) {
        self.0.borrow_mut().rows.splice(0..0, rows);
    }

    fn insert_back(&mut self, rows: Vec<f64>) {
        self.0.borrow_mut().rows.extend(rows);
    }

    fn remove_front(&mut self, count: usize) {
        let mut page = self.0.borrow_mut();
        let count = count.min(page.rows.len());
        page.rows.drain(..count);
    }

    fn remove_back(&mut self, count: usize) {
        let mut page = self.0.borrow_mut();
        let keep = page.rows.len().saturating_sub(count);
        page.rows.truncate(keep);
    }

    fn clear_rows(&mut self) {
        self.0.borrow_mut().rows.clear();
    }

    fn row_count(&self) -> usize {
        self.0.borrow().rows.len()
    }

    fn row_rect(&self, row: usize) -> Option<Rect> {
        let page = self.0.borrow();
        let height = *page.rows.get(row)?;
        Some(Rect::new(page.row_top(row), 0.0, 320.0, height))
    }

    fn set_padding(&mut self, top: f64, bottom: f64) {
        self.0.borrow_mut().padding = (top, bottom);
    }
}

struct TestViewport(Rc<RefCell<Page>>);

impl Viewport for TestViewport {
    fn metrics(&self) -> ViewportMetrics {
        let page = self.0.borrow();
        let content = page.content_height();
        ViewportMetrics {
            outer: Rect::new(0.0, 0.0, 320.0, page.view_height),
            inner: Rect::new(-page.scroll_y, 0.0, 320.0, content),
            scroll: ScrollMetrics::new(0.0, page.scroll_y, page.view_height, content),
        }
    }

    fn scroll_to(&mut self, to: ScrollTo) {
        let mut page = self.0.borrow_mut();
        if let Some(y) = to.y {
            let y = y.clamp(0.0, page.max_scroll());
            if y != page.scroll_y {
                page.scroll_y = y;
                page.emit(ViewportEvent::Scroll);
            }
        }
    }

    fn poll_events(&mut self, out: &mut Vec<ViewportEvent>) {
        out.append(&mut self.0.borrow_mut().events);
    }

    fn remove(&mut self) {
        let mut page = self.0.borrow_mut();
        page.listening = false;
        page.events.clear();
    }
}

struct Harness {
    page: Rc<RefCell<Page>>,
    frames: ManualFrames,
    list: ListView<f64, TestSurface>,
    now: u64,
}

impl Harness {
    fn new(heights: Vec<f64>, view_height: f64) -> Self {
        Self::with_options(heights, view_height, |o| o)
    }

    fn with_options(
        heights: Vec<f64>,
        view_height: f64,
        configure: impl FnOnce(ListViewOptions<f64, f64>) -> ListViewOptions<f64, f64>,
    ) -> Self {
        let page = Rc::new(RefCell::new(Page {
            view_height,
            listening: true,
            ..Page::default()
        }));
        let frames = ManualFrames::new();
        let options = configure(ListViewOptions::new(heights, |h: &f64| *h, |_| 0.0));
        let list = ListView::new(
            TestSurface(Rc::clone(&page)),
            TestViewport(Rc::clone(&page)),
            frames.clone(),
            options,
        );
        Self {
            page,
            frames,
            list,
            now: 0,
        }
    }

    fn rendered(heights: Vec<f64>, view_height: f64) -> Self {
        let mut h = Self::new(heights, view_height);
        h.list.render(None);
        h.settle();
        h
    }

    /// Pumps events and fires frames (jumping to timeout deadlines) until nothing is pending.
    fn settle(&mut self) -> Vec<RedrawStats> {
        let mut stats = Vec::new();
        for _ in 0..64 {
            self.list.pump_events(self.now);
            let tokens = self.frames.tick(self.now);
            if tokens.is_empty() {
                match self.frames.next_deadline() {
                    Some(deadline) if deadline > self.now => {
                        self.now = deadline;
                        continue;
                    }
                    _ => break,
                }
            }
            for token in tokens {
                stats.extend(self.list.on_frame(token, self.now));
            }
            self.now += 16;
        }
        stats
    }

    fn user_scroll(&mut self, y: f64) {
        let mut page = self.page.borrow_mut();
        page.scroll_y = y.clamp(0.0, page.max_scroll());
        page.emit(ViewportEvent::Scroll);
    }

    fn resize(&mut self) {
        self.page.borrow_mut().emit(ViewportEvent::Resize);
    }

    fn scroll_y(&self) -> f64 {
        self.page.borrow().scroll_y
    }

    /// Viewport-relative rect of the materialized row of `index`.
    fn item_rect(&self, index: usize) -> Option<Rect> {
        let row = index.checked_sub(self.list.window().index_first)?;
        self.list.surface().row_rect(row)
    }

    fn assert_consistent(&self) {
        let page = self.page.borrow();
        let window = self.list.window();
        let heights = self.list.heights();
        assert_eq!(page.rows.len(), window.len());
        assert_eq!(page.padding, self.list.padding());
        assert!((page.padding.0 - heights.read(window.index_first)).abs() < 1e-6);
        assert!((page.list_height() - heights.total()).abs() < 1e-6);
        for (row, &h) in page.rows.iter().enumerate() {
            let index = window.index_first + row;
            assert_eq!(heights.item_height(index), Some(h), "index {index}");
            let expected = page.list_top() + heights.read(index);
            assert!((page.row_top(row) - expected).abs() < 1e-6, "index {index}");
        }
    }

    /// Every item intersecting the viewport is materialized.
    fn assert_filled(&self) {
        let page = self.page.borrow();
        let n = self.list.items().len();
        if n == 0 {
            return;
        }
        let heights = self.list.heights();
        let top = page.scroll_y - page.header;
        let bot = top + page.view_height;
        let window = self.list.window();
        let first_visible = heights.lower_bound(top).min(n - 1);
        let last_visible = heights.upper_bound(bot).min(n - 1);
        assert!(
            window.contains(first_visible),
            "{window:?} misses first visible {first_visible}"
        );
        assert!(
            window.contains(last_visible),
            "{window:?} misses last visible {last_visible}"
        );
    }
}

fn uniform(n: usize, height: f64) -> Vec<f64> {
    vec![height; n]
}

fn random_heights(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = Lcg::new(seed);
    (0..n).map(|_| rng.gen_height(5, 56)).collect()
}

fn counter() -> (Arc<AtomicUsize>, impl Fn() -> Option<Completion>) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    let make = move || -> Option<Completion> {
        let c = Arc::clone(&c);
        Some(Box::new(move |_: &RedrawStats| {
            c.fetch_add(1, Ordering::SeqCst);
        }))
    };
    (count, make)
}

#[test]
fn height_index_reads_estimates_and_measurements() {
    let mut h = HeightIndex::new(20.0, 5);
    assert_eq!(h.len(), 5);
    assert_eq!(h.read(3), 60.0);
    assert_eq!(h.total(), 100.0);
    assert!(!h.is_measured(1));

    assert_eq!(h.write_single(1, 50.0), 30.0);
    assert!(h.is_measured(1));
    assert_eq!(h.read(1), 20.0);
    assert_eq!(h.read(2), 70.0);
    assert_eq!(h.total(), 130.0);
    assert_eq!(h.measured_count(), 1);

    // Re-measuring replaces rather than accumulates.
    assert_eq!(h.write_single(1, 10.0), -40.0);
    assert_eq!(h.total(), 90.0);
    assert_eq!(h.measured_count(), 1);

    assert_eq!(h.read(99), h.total());
}

#[test]
fn height_index_bounds_follow_cumulative_heights() {
    let mut h = HeightIndex::new(20.0, 5);
    h.write_single(1, 50.0);
    // read: [0, 20, 70, 90, 110, 130]

    assert_eq!(h.lower_bound(-5.0), 0);
    assert_eq!(h.lower_bound(0.0), 0);
    assert_eq!(h.lower_bound(19.9), 0);
    assert_eq!(h.lower_bound(20.0), 1);
    assert_eq!(h.lower_bound(69.9), 1);
    assert_eq!(h.lower_bound(70.0), 2);
    assert_eq!(h.lower_bound(130.0), 5);
    assert_eq!(h.lower_bound(1e9), 5);

    assert_eq!(h.upper_bound(0.0), 0);
    assert_eq!(h.upper_bound(20.0), 0);
    assert_eq!(h.upper_bound(20.5), 1);
    assert_eq!(h.upper_bound(70.0), 1);
    assert_eq!(h.upper_bound(130.0), 4);
    assert_eq!(h.upper_bound(130.5), 5);
}

#[test]
fn height_index_estimate_change_keeps_measurements() {
    let mut h = HeightIndex::new(20.0, 4);
    h.write_single(0, 33.0);
    h.write_single(2, 7.0);

    assert!(h.set_estimate(10.0));
    assert!(!h.set_estimate(10.0));
    assert_eq!(h.estimate(), 10.0);
    assert_eq!(h.item_height(0), Some(33.0));
    assert_eq!(h.item_height(1), Some(10.0));
    assert_eq!(h.total(), 33.0 + 10.0 + 7.0 + 10.0);

    h.set_estimate(0.25);
    assert_eq!(h.estimate(), MIN_ESTIMATE);
    h.set_estimate(f64::NAN);
    assert_eq!(h.estimate(), MIN_ESTIMATE);
}

#[test]
fn height_index_sanitizes_writes() {
    let mut h = HeightIndex::new(20.0, 3);
    h.write_single(0, -4.0);
    h.write_single(1, f64::INFINITY);
    assert_eq!(h.item_height(0), Some(0.0));
    assert_eq!(h.item_height(1), Some(0.0));
    assert_eq!(h.total(), 20.0);

    assert_eq!(h.write_single(3, 10.0), 0.0);
    assert_eq!(h.item_height(3), None);
    assert_eq!(h.total(), 20.0);
}

#[test]
fn height_index_empty() {
    let h = HeightIndex::new(20.0, 0);
    assert!(h.is_empty());
    assert_eq!(h.total(), 0.0);
    assert_eq!(h.lower_bound(100.0), 0);
    assert_eq!(h.upper_bound(100.0), 0);
}

#[test]
fn height_index_matches_naive_sums_under_random_writes() {
    let mut rng = Lcg::new(7);
    let n = 300;
    let mut h = HeightIndex::new(20.0, n);
    let mut naive = vec![None; n];
    for step in 0..2_000 {
        let i = rng.gen_range_u64(0, n as u64) as usize;
        let height = rng.gen_height(0, 80);
        h.write_single(i, height);
        naive[i] = Some(height);
        if step % 97 == 0 {
            h.set_estimate(rng.gen_height(1, 60));
        }
        if step % 50 == 0 {
            for idx in [0, 1, n / 3, n / 2, n - 1, n] {
                assert_eq!(h.read(idx), naive_read(&naive, h.estimate(), idx));
            }
        }
    }
}

fn arb_index() -> impl Strategy<Value = (Vec<Option<f64>>, f64)> {
    (
        proptest::collection::vec(proptest::option::of(0u8..100), 1..200),
        1u8..50,
    )
        .prop_map(|(hs, est)| {
            (
                hs.into_iter().map(|h| h.map(f64::from)).collect(),
                f64::from(est),
            )
        })
}

fn build(heights: &[Option<f64>], estimate: f64) -> HeightIndex {
    let mut h = HeightIndex::new(estimate, heights.len());
    for (i, m) in heights.iter().enumerate() {
        if let Some(m) = m {
            h.write_single(i, *m);
        }
    }
    h
}

proptest! {
    #[test]
    fn read_is_the_prefix_sum((heights, estimate) in arb_index()) {
        let h = build(&heights, estimate);
        for i in 0..=heights.len() {
            prop_assert_eq!(h.read(i), naive_read(&heights, estimate, i));
        }
    }

    #[test]
    fn lower_bound_finds_the_covering_item(
        (heights, estimate) in arb_index(),
        offset in 0u32..20_000,
    ) {
        let h = build(&heights, estimate);
        let offset = f64::from(offset) / 2.0;
        let lb = h.lower_bound(offset);
        prop_assert!(lb <= h.len());
        if offset > 0.0 {
            prop_assert!(h.read(lb) <= offset);
            prop_assert!(lb == h.len() || h.read(lb + 1) > offset);
        } else {
            prop_assert_eq!(lb, 0);
        }
    }

    #[test]
    fn lower_bound_inverts_read_for_non_empty_items((heights, estimate) in arb_index()) {
        let h = build(&heights, estimate);
        for i in 0..heights.len() {
            let start = h.read(i);
            if h.item_height(i) > Some(0.0) && (i == 0 || start > 0.0) {
                prop_assert_eq!(h.lower_bound(start), i);
            }
        }
    }

    #[test]
    fn upper_bound_finds_the_last_item_starting_before(
        (heights, estimate) in arb_index(),
        offset in 1u32..20_000,
    ) {
        let h = build(&heights, estimate);
        let offset = f64::from(offset) / 2.0;
        let ub = h.upper_bound(offset);
        prop_assert!(h.read(ub) < offset);
        prop_assert!(ub == h.len() || h.read(ub + 1) >= offset);
    }

    #[test]
    fn set_estimate_only_moves_unmeasured_items(
        (heights, estimate) in arb_index(),
        next in 1u8..50,
    ) {
        let mut h = build(&heights, estimate);
        h.set_estimate(f64::from(next));
        for (i, m) in heights.iter().enumerate() {
            prop_assert_eq!(h.item_height(i), Some(m.unwrap_or(f64::from(next))));
        }
    }
}

#[test]
fn scroll_position_parses_keywords_and_offsets() {
    assert_eq!("top".parse::<ScrollPosition>(), Ok(ScrollPosition::Top));
    assert_eq!(" middle ".parse::<ScrollPosition>(), Ok(ScrollPosition::Middle));
    assert_eq!(ScrollPosition::try_from("bottom"), Ok(ScrollPosition::Bottom));
    assert_eq!(ScrollPosition::try_from("default"), Ok(ScrollPosition::Default));
    assert_eq!("-12.5".parse::<ScrollPosition>(), Ok(ScrollPosition::Offset(-12.5)));
    assert_eq!(ScrollPosition::from(3.0), ScrollPosition::Offset(3.0));
    assert_eq!(ScrollPosition::Top.to_string(), "top");

    assert!(matches!(
        "sideways".parse::<ScrollPosition>(),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        "NaN".parse::<ScrollPosition>(),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        "inf".parse::<ScrollPosition>(),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn render_window_ranges() {
    let w = RenderWindow::new(10, 20);
    assert_eq!(w.len(), 10);
    assert!(w.contains(10));
    assert!(!w.contains(20));
    assert!(w.overlaps(&RenderWindow::new(19, 30)));
    assert!(!w.overlaps(&RenderWindow::new(20, 30)));
    assert!(!w.overlaps(&RenderWindow::default()));
    assert!(RenderWindow::new(5, 5).is_empty());
}

#[test]
fn rect_edges_and_change_events() {
    let r = Rect::new(10.0, 5.0, 300.0, 40.0);
    assert_eq!(r.bottom(), 50.0);
    assert_eq!(r.right(), 305.0);
    assert!(ViewportEvent::Scroll.is_change());
    assert!(ViewportEvent::Resize.is_change());
    assert!(!ViewportEvent::KeyPress.is_change());
}

#[test]
fn invalidation_take_clears_and_opens_next_batch() {
    let mut inv = Invalidation::new();
    let first = inv.batch();
    inv.mark(Dirty::ITEMS);
    inv.mark(Dirty::EVENTS);
    inv.request_scroll(ScrollRequest {
        index: 1,
        position: ScrollPosition::Top,
    });
    inv.request_scroll(ScrollRequest {
        index: 9,
        position: ScrollPosition::Bottom,
    });
    inv.attach(Some(Box::new(|_: &RedrawStats| {})));
    inv.attach(None);

    let batch = inv.take();
    assert_eq!(batch.id, first);
    assert_eq!(batch.dirty, Dirty::ITEMS | Dirty::EVENTS);
    assert_eq!(batch.scroll.map(|s| s.index), Some(9));
    assert_eq!(batch.completions.len(), 1);

    assert_eq!(inv.dirty(), Dirty::empty());
    assert!(!inv.has_scroll_request());
    assert!(inv.batch() > first);
}

#[test]
fn redraw_scheduler_coalesces_requests() {
    let frames = ManualFrames::new();
    let mut sched = RedrawScheduler::new(Box::new(frames.clone()), 200, 100);
    sched.schedule();
    sched.schedule();
    sched.schedule();
    assert_eq!(frames.pending(), 1);

    let tokens = frames.tick(0);
    assert_eq!(tokens.len(), 1);
    assert_eq!(sched.accept(tokens[0], 0), FrameDecision::Run);
    assert!(!sched.is_pending());

    // Delivered twice, or never requested.
    assert_eq!(sched.accept(tokens[0], 0), FrameDecision::Stale);
    assert_eq!(sched.accept(FrameToken(999), 0), FrameDecision::Stale);
}

#[test]
fn redraw_scheduler_defers_while_blocked() {
    let frames = ManualFrames::new();
    let mut sched = RedrawScheduler::new(Box::new(frames.clone()), 200, 100);
    sched.schedule_change();
    sched.block(0);
    assert_eq!(sched.blocked_until_ms(), Some(200));
    // The animation frame was swapped for a timeout.
    assert_eq!(frames.pending(), 1);
    assert!(frames.tick(50).is_empty());

    let retry = frames.tick(100);
    assert_eq!(retry.len(), 1);
    assert_eq!(sched.accept(retry[0], 100), FrameDecision::Deferred);
    assert!(sched.is_pending());

    let retry = frames.tick(200);
    assert_eq!(retry.len(), 1);
    assert_eq!(sched.accept(retry[0], 200), FrameDecision::Run);
    assert_eq!(sched.blocked_until_ms(), None);
}

#[test]
fn redraw_scheduler_runs_operations_while_blocked() {
    let frames = ManualFrames::new();
    let mut sched = RedrawScheduler::new(Box::new(frames.clone()), 200, 100);
    sched.block(0);
    sched.schedule();
    let tokens = frames.tick(10);
    assert_eq!(tokens.len(), 1);
    assert_eq!(sched.accept(tokens[0], 10), FrameDecision::Run);

    // A change redraw already pushed to a retry is pulled forward when an operation joins it.
    sched.schedule_change();
    let tokens = frames.tick(20);
    assert_eq!(sched.accept(tokens[0], 20), FrameDecision::Deferred);
    sched.schedule();
    assert_eq!(frames.pending(), 1);
    let tokens = frames.tick(30);
    assert_eq!(tokens.len(), 1);
    assert_eq!(sched.accept(tokens[0], 30), FrameDecision::Run);
    assert_eq!(sched.blocked_until_ms(), Some(200));
}

#[test]
fn redraw_scheduler_cancel_drops_pending_frame() {
    let frames = ManualFrames::new();
    let mut sched = RedrawScheduler::new(Box::new(frames.clone()), 200, 100);
    sched.schedule();
    sched.cancel();
    assert!(!sched.is_pending());
    assert_eq!(frames.pending(), 0);
    assert!(frames.tick(1_000).is_empty());
}

#[test]
fn nothing_happens_before_render() {
    let mut h = Harness::new(uniform(100, 20.0), 600.0);
    h.list.set_items(uniform(50, 20.0));
    h.list.invalidate(None);
    assert!(!h.list.is_redraw_pending());
    assert_eq!(h.frames.pending(), 0);
    assert_eq!(
        h.list.scroll_to_item(3, ScrollPosition::Top, None),
        Err(Error::NotRendered)
    );
    assert!(h.settle().is_empty());
    assert_eq!(h.page.borrow().skeletons, 0);
}

#[test]
fn initial_render_materializes_the_first_screen() {
    let h = Harness::rendered(uniform(20_000, 20.0), 600.0);
    let page = h.page.borrow();
    assert_eq!(page.skeletons, 1);
    assert_eq!(page.delegations, 1);
    assert_eq!(h.list.window(), RenderWindow::new(0, 40));
    assert_eq!(page.padding, (0.0, 19_960.0 * 20.0));
    assert_eq!(page.content_height(), 400_000.0);
    assert_eq!(page.scroll_y, 0.0);
    drop(page);
    h.assert_consistent();
    h.assert_filled();

    let stats = h.list.last_stats().unwrap();
    assert!(stats.converged);
    assert!(stats.changed);
    assert_eq!(stats.item_height, 20.0);
}

#[test]
fn scrolling_moves_the_window() {
    let mut h = Harness::rendered(uniform(20_000, 20.0), 600.0);
    h.user_scroll(10_000.0);
    let stats = h.settle();
    assert_eq!(stats.len(), 1);
    assert_eq!(h.list.window(), RenderWindow::new(490, 540));
    assert_eq!(h.scroll_y(), 10_000.0);
    h.assert_consistent();
    h.assert_filled();
}

#[test]
fn redraw_without_changes_is_a_no_op() {
    let mut h = Harness::rendered(random_heights(3_000, 11), 600.0);
    h.user_scroll(20_000.0);
    h.settle();
    let window = h.list.window();
    let scroll = h.scroll_y();
    let padding = h.list.padding();

    h.resize();
    let stats = h.settle();
    assert_eq!(stats.len(), 1);
    assert!(!stats[0].changed);
    assert_eq!(stats[0].passes, 1);
    assert_eq!(h.list.window(), window);
    assert_eq!(h.scroll_y(), scroll);
    assert_eq!(h.list.padding(), padding);
}

#[test]
fn scroll_to_last_item_clamps_at_the_end() {
    let mut h = Harness::rendered(uniform(20_000, 20.0), 600.0);
    h.user_scroll(10_000.0);
    h.settle();

    let done = Arc::new(Mutex::new(None));
    let d = Arc::clone(&done);
    h.list
        .scroll_to_item(
            19_999,
            ScrollPosition::Top,
            Some(Box::new(move |stats: &RedrawStats| {
                *d.lock().unwrap() = Some(*stats);
            })),
        )
        .unwrap();
    h.settle();

    assert_eq!(h.scroll_y(), 400_000.0 - 600.0);
    assert_eq!(h.list.window(), RenderWindow::new(19_960, 20_000));
    let stats = done.lock().unwrap().expect("completion ran");
    assert_eq!(stats.scroll_top, 399_400.0);
    let last = h.item_rect(19_999).unwrap();
    assert_eq!(last.bottom(), 600.0);
    h.assert_consistent();
}

#[test]
fn scroll_to_item_positions() {
    let mut h = Harness::rendered(uniform(1_000, 20.0), 600.0);

    h.list.scroll_to_item(500, ScrollPosition::Top, None).unwrap();
    h.settle();
    assert_eq!(h.item_rect(500).unwrap().top, 0.0);

    h.list.scroll_to_item(300, ScrollPosition::Bottom, None).unwrap();
    h.settle();
    assert_eq!(h.item_rect(300).unwrap().bottom(), 600.0);

    h.list
        .scroll_to_item(400, ScrollPosition::Offset(100.0), None)
        .unwrap();
    h.settle();
    assert_eq!(h.item_rect(400).unwrap().top, 100.0);

    h.list.scroll_to_item(700, ScrollPosition::Middle, None).unwrap();
    h.settle();
    assert_eq!(h.item_rect(700).unwrap().top, 290.0);

    // Out-of-range indices clamp to the last item.
    h.list.scroll_to_item(5_000, ScrollPosition::Top, None).unwrap();
    h.settle();
    assert_eq!(h.scroll_y(), 20_000.0 - 600.0);
    h.assert_consistent();
}

#[test]
fn repeated_scroll_to_item_is_idempotent() {
    let mut h = Harness::rendered(random_heights(2_000, 5), 600.0);
    h.list.scroll_to_item(750, ScrollPosition::Top, None).unwrap();
    h.settle();
    let scroll = h.scroll_y();
    let window = h.list.window();

    h.list.scroll_to_item(750, ScrollPosition::Top, None).unwrap();
    let stats = h.settle();
    assert!(stats.iter().all(|s| !s.changed));
    assert_eq!(h.scroll_y(), scroll);
    assert_eq!(h.list.window(), window);
}

#[test]
fn scroll_to_item_default_reveals_only_when_needed() {
    let mut h = Harness::rendered(uniform(1_000, 20.0), 600.0);

    h.list.scroll_to_item(5, ScrollPosition::Default, None).unwrap();
    let stats = h.settle();
    assert_eq!(stats.len(), 1);
    assert!(!stats[0].changed);
    assert_eq!(h.scroll_y(), 0.0);

    h.list.scroll_to_item(100, ScrollPosition::Default, None).unwrap();
    h.settle();
    assert_eq!(h.item_rect(100).unwrap().bottom(), 600.0);

    h.list.scroll_to_item(10, ScrollPosition::Default, None).unwrap();
    h.settle();
    assert_eq!(h.item_rect(10).unwrap().top, 0.0);
}

#[test]
fn scroll_to_item_with_variable_heights_lands_within_a_pixel() {
    let heights = random_heights(2_000, 42);
    let mut h = Harness::rendered(heights.clone(), 600.0);

    h.list.scroll_to_item(1_000, ScrollPosition::Top, None).unwrap();
    h.settle();
    assert!(h.item_rect(1_000).unwrap().top.abs() <= SCROLL_TOLERANCE);
    h.assert_consistent();
    h.assert_filled();

    h.list.scroll_to_item(1_500, ScrollPosition::Middle, None).unwrap();
    h.settle();
    let rect = h.item_rect(1_500).unwrap();
    assert_eq!(rect.height, heights[1_500]);
    assert!((rect.top - (600.0 - rect.height) / 2.0).abs() <= SCROLL_TOLERANCE);

    h.list.scroll_to_item(200, ScrollPosition::Bottom, None).unwrap();
    h.settle();
    assert!((h.item_rect(200).unwrap().bottom() - 600.0).abs() <= SCROLL_TOLERANCE);
    h.assert_consistent();
}

#[test]
fn scroll_to_item_rejects_non_finite_offsets() {
    let mut h = Harness::rendered(uniform(100, 20.0), 600.0);
    let err = h
        .list
        .scroll_to_item(3, ScrollPosition::Offset(f64::NAN), None)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(!h.list.is_redraw_pending());
    assert_eq!(h.frames.pending(), 0);
}

#[test]
fn scroll_to_item_on_empty_list_is_a_no_op() {
    let mut h = Harness::rendered(Vec::new(), 600.0);
    assert_eq!(h.list.window(), RenderWindow::default());
    h.list.scroll_to_item(5, ScrollPosition::Top, None).unwrap();
    let stats = h.settle();
    assert_eq!(stats.len(), 1);
    assert!(stats[0].converged);
    assert_eq!(h.scroll_y(), 0.0);
    assert_eq!(h.page.borrow().rows.len(), 0);
}

#[test]
fn set_items_to_empty_clears_rows_and_padding() {
    let mut h = Harness::rendered(uniform(500, 20.0), 600.0);
    h.list.set_items(Vec::<f64>::new());
    h.settle();
    let page = h.page.borrow();
    assert!(page.rows.is_empty());
    assert_eq!(page.padding, (0.0, 0.0));
    assert_eq!(h.list.window(), RenderWindow::default());
}

#[test]
fn set_items_discards_measurements() {
    let mut h = Harness::rendered(uniform(500, 40.0), 600.0);
    assert!(h.list.heights().measured_count() > 0);
    h.list.set_items(uniform(10, 30.0));
    assert_eq!(h.list.heights().measured_count(), 0);
    assert_eq!(h.list.heights().len(), 10);
    h.settle();
    assert_eq!(h.list.window(), RenderWindow::new(0, 10));
    assert_eq!(h.page.borrow().list_height(), 300.0);
    h.assert_consistent();
}

#[test]
fn estimate_follows_measured_rows() {
    let h = Harness::rendered(uniform(5_000, 40.0), 600.0);
    assert_eq!(h.list.item_height(), 40.0);
    assert_eq!(h.list.heights().total(), 200_000.0);
    // 15 visible rows plus overscan below.
    assert_eq!(h.list.window(), RenderWindow::new(0, 25));
    h.assert_consistent();
}

#[test]
fn random_heights_converge_and_fill_the_viewport() {
    let mut rng = Lcg::new(0x5eed);
    let heights = random_heights(2_000, 3);
    let mut h = Harness::rendered(heights, 600.0);
    assert!(h.list.last_stats().unwrap().converged);
    h.assert_consistent();
    h.assert_filled();

    for _ in 0..25 {
        let max = h.page.borrow().max_scroll();
        let y = rng.gen_range_u64(0, max as u64 + 1) as f64;
        h.user_scroll(y);
        let stats = h.settle();
        assert!(stats.iter().all(|s| s.converged), "{stats:?}");
        h.assert_consistent();
        h.assert_filled();
        let estimate = h.list.item_height();
        assert!((5.0..=55.0).contains(&estimate), "estimate {estimate}");
    }
}

#[test]
fn materialized_rows_are_measured_in_place() {
    let heights = random_heights(400, 9);
    let h = Harness::rendered(heights.clone(), 600.0);
    let window = h.list.window();
    for index in window.index_first..window.index_last {
        assert_eq!(h.list.heights().item_height(index), Some(heights[index]));
        assert!(h.list.heights().is_measured(index));
    }
}

#[test]
fn reflowed_rows_are_remeasured() {
    let mut h = Harness::rendered(uniform(1_000, 20.0), 600.0);
    for row in h.page.borrow_mut().rows.iter_mut() {
        *row = 40.0;
    }
    h.resize();
    let stats = h.settle();
    assert!(stats.iter().all(|s| s.converged));
    assert_eq!(h.list.heights().item_height(5), Some(40.0));
    assert_eq!(h.list.item_height(), 40.0);
    assert_eq!(h.list.window(), RenderWindow::new(0, 25));
    h.assert_consistent();
    h.assert_filled();

    h.list.scroll_to_item(12, ScrollPosition::Top, None).unwrap();
    h.settle();
    assert!(h.item_rect(12).unwrap().top.abs() <= SCROLL_TOLERANCE);
    h.assert_consistent();
}

#[test]
fn replacing_items_drops_stale_rows_at_once() {
    let mut h = Harness::rendered(uniform(1_000, 20.0), 600.0);
    assert_eq!(h.list.index_for_row(0), Some(0));
    h.list.set_items(uniform(500, 30.0));
    assert!(h.page.borrow().rows.is_empty());
    assert_eq!(h.list.window(), RenderWindow::default());
    assert_eq!(h.list.index_for_row(0), None);

    h.settle();
    assert_eq!(h.list.index_for_row(0), Some(0));
    h.assert_consistent();
    h.assert_filled();
}

#[test]
fn zero_height_rows_stop_at_the_row_budget() {
    let h = Harness::rendered(uniform(200_000, 0.0), 600.0);
    let stats = h.list.last_stats().unwrap();
    assert!(!stats.converged);
    assert!(stats.passes < ListConfig::default().max_passes);
    // Eight screens of (600 / 20 + 2 * 10 + 1) rows at the initial estimate.
    let window = h.list.window();
    assert!(!window.is_empty());
    assert!(window.len() <= 8 * 51, "{window:?}");
    h.assert_consistent();
}

#[test]
fn purge_keeps_rows_near_the_viewport() {
    let mut h = Harness::rendered(uniform(20_000, 20.0), 600.0);
    // Small steps reuse rows; the window never grows without bound.
    for step in 1..=40 {
        h.user_scroll(step as f64 * 50.0);
        h.settle();
        let window = h.list.window();
        assert!(window.len() <= 30 + 2 * 10 + 30, "{window:?}");
        h.assert_filled();
    }
    h.assert_consistent();
}

#[test]
fn pass_cap_reports_non_convergence() {
    let mut h = Harness::with_options(uniform(1_000, 40.0), 600.0, |o| o.with_max_passes(1));
    h.list.render(None);
    let stats = h.settle();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].passes, 1);
    assert!(!stats[0].converged);

    // The next redraw picks up where the capped one stopped.
    h.list.set_config(ListConfig {
        max_passes: 32,
        ..h.list.config()
    });
    let stats = h.settle();
    assert!(stats.last().unwrap().converged);
    assert_eq!(h.list.window(), RenderWindow::new(0, 25));
    h.assert_consistent();
}

#[test]
fn operations_coalesce_into_one_redraw() {
    let mut h = Harness::rendered(uniform(1_000, 20.0), 600.0);
    let events = Arc::new(Mutex::new(Vec::new()));
    let e = Arc::clone(&events);
    h.list.set_on_redraw(Some(Arc::new(move |ev: &RedrawEvent| {
        e.lock().unwrap().push(*ev);
    })));

    let (count, make) = counter();
    let a = h.list.invalidate(make());
    let b = h.list.invalidate(make());
    let c = h.list.scroll_to_item(200, ScrollPosition::Top, make()).unwrap();
    assert_eq!(a, b);
    assert_eq!(b, c);
    assert_eq!(h.frames.pending(), 1);

    let stats = h.settle();
    assert_eq!(stats[0].batch, a);
    assert_eq!(count.load(Ordering::SeqCst), 3);
    assert_eq!(h.item_rect(200).unwrap().top, 0.0);

    // The committed scroll comes back as a scroll event and one more (idle) redraw.
    assert_eq!(stats.len(), 2);
    assert!(!stats[1].changed);

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 4);
    assert_eq!(events[0], RedrawEvent::WillRedraw(a));
    assert!(matches!(events[1], RedrawEvent::DidRedraw(s) if s.batch == a));
    assert!(h.list.pending_batch() > a);
}

#[test]
fn once_did_redraw_waits_for_the_next_redraw() {
    let mut h = Harness::rendered(uniform(100, 20.0), 600.0);
    let (count, make) = counter();
    h.list.once_did_redraw(make().unwrap());
    assert!(!h.list.is_redraw_pending());
    h.settle();
    assert_eq!(count.load(Ordering::SeqCst), 0);

    h.user_scroll(100.0);
    h.settle();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn key_press_defers_redraws() {
    let mut h = Harness::rendered(uniform(1_000, 20.0), 600.0);
    let t0 = h.now;
    h.page.borrow_mut().emit(ViewportEvent::KeyPress);
    h.user_scroll(1_000.0);
    assert_eq!(h.list.pump_events(t0), 2);

    let mut redraws = 0;
    for t in [t0, t0 + 100] {
        for token in h.frames.tick(t) {
            redraws += usize::from(h.list.on_frame(token, t).is_some());
        }
    }
    assert_eq!(redraws, 0);
    assert!(h.list.is_redraw_pending());

    for token in h.frames.tick(t0 + 200) {
        redraws += usize::from(h.list.on_frame(token, t0 + 200).is_some());
    }
    assert_eq!(redraws, 1);
    h.assert_filled();
}

#[test]
fn key_press_does_not_hold_back_operations() {
    let mut h = Harness::rendered(uniform(1_000, 20.0), 600.0);
    let t0 = h.now;
    h.page.borrow_mut().emit(ViewportEvent::KeyPress);
    assert_eq!(h.list.pump_events(t0), 1);
    h.list.scroll_to_item(300, ScrollPosition::Top, None).unwrap();

    let mut redraws = 0;
    for token in h.frames.tick(t0) {
        redraws += usize::from(h.list.on_frame(token, t0).is_some());
    }
    assert_eq!(redraws, 1);
    assert_eq!(h.item_rect(300).unwrap().top, 0.0);

    // The scroll it committed is a viewport change and waits out the key window.
    assert_eq!(h.list.pump_events(t0 + 16), 1);
    for token in h.frames.tick(t0 + 16) {
        redraws += usize::from(h.list.on_frame(token, t0 + 16).is_some());
    }
    assert_eq!(redraws, 1);
    assert!(h.list.is_redraw_pending());
}

#[test]
fn flush_redraws_synchronously() {
    let mut h = Harness::rendered(uniform(1_000, 20.0), 600.0);
    assert!(h.list.flush().is_none());
    h.list.scroll_to_item(600, ScrollPosition::Top, None).unwrap();
    let stats = h.list.flush().unwrap();
    assert!(stats.converged);
    assert!(!h.list.is_redraw_pending());
    assert!(h.frames.tick(h.now).is_empty());
    assert_eq!(h.item_rect(600).unwrap().top, 0.0);
}

#[test]
fn remove_detaches_from_the_host() {
    let mut h = Harness::rendered(uniform(1_000, 20.0), 600.0);
    let (count, make) = counter();
    h.list.invalidate(make());
    assert_eq!(h.frames.pending(), 1);

    h.list.remove();
    assert!(!h.list.is_rendered());
    assert_eq!(h.frames.pending(), 0);
    assert!(!h.page.borrow().listening);
    assert!(h.page.borrow().rows.is_empty());

    h.user_scroll(500.0);
    assert!(h.settle().is_empty());
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert_eq!(
        h.list.scroll_to_item(1, ScrollPosition::Top, None),
        Err(Error::NotRendered)
    );
}

#[test]
fn skeleton_and_event_changes_are_applied() {
    let mut h = Harness::rendered(uniform(1_000, 20.0), 600.0);
    let mut events = EventMap::new();
    events.insert("click .row".into(), Arc::new(|_row: usize| {}));
    h.list.set_events(events);
    h.settle();
    assert_eq!(h.page.borrow().delegations, 2);
    assert_eq!(h.page.borrow().skeletons, 1);

    h.list.set_skeleton_renderer(|model: &SkeletonModel| model.item_count as f64);
    h.settle();
    assert_eq!(h.page.borrow().skeletons, 2);
    assert_eq!(h.page.borrow().delegations, 3);
    assert_eq!(h.list.window(), RenderWindow::new(0, 40));
    h.assert_consistent();
}

#[test]
fn reset_replaces_options() {
    let mut h = Harness::rendered(uniform(1_000, 20.0), 600.0);
    h.user_scroll(5_000.0);
    h.settle();

    let options = h
        .list
        .options()
        .clone()
        .with_items(uniform(50, 30.0))
        .with_overscan(2)
        .with_default_item_height(30.0);
    h.list.reset(options, None);
    h.settle();

    assert_eq!(h.page.borrow().skeletons, 2);
    assert_eq!(h.list.config().overscan, 2);
    assert_eq!(h.list.heights().len(), 50);
    assert_eq!(h.list.item_height(), 30.0);
    h.assert_consistent();
    h.assert_filled();
}

#[test]
fn item_renderer_change_rematerializes_rows() {
    let mut h = Harness::rendered(uniform(1_000, 20.0), 600.0);
    h.list.set_item_renderer(|h: &f64| *h * 2.0);
    h.settle();
    assert!(h.page.borrow().rows.iter().all(|&r| r == 40.0));
    assert_eq!(h.list.item_height(), 40.0);
    h.assert_consistent();
}

#[test]
fn index_for_row_maps_into_the_window() {
    let mut h = Harness::rendered(uniform(1_000, 20.0), 600.0);
    h.user_scroll(10_000.0);
    h.settle();
    let window = h.list.window();
    assert_eq!(h.list.index_for_row(0), Some(window.index_first));
    assert_eq!(h.list.index_for_row(window.len() - 1), Some(window.index_last - 1));
    assert_eq!(h.list.index_for_row(window.len()), None);
}

#[test]
fn config_is_sanitized() {
    let h = Harness::with_options(uniform(10, 20.0), 600.0, |o| {
        o.with_default_item_height(0.0).with_max_passes(0)
    });
    assert_eq!(h.list.config().default_item_height, MIN_ESTIMATE);
    assert_eq!(h.list.config().max_passes, 1);
    assert_eq!(h.list.item_height(), MIN_ESTIMATE);
}
