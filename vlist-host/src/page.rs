use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use vlist::{EventMap, Rect, ViewportEvent};

use crate::Row;

/// Static layout of a simulated page.
///
/// The document is `header`, then either the list container itself (window scrolling) or a
/// fixed-height scroll element holding the list container, then `footer`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageLayout {
    pub width: f64,
    pub window_height: f64,
    pub header_height: f64,
    pub footer_height: f64,
    /// Height of the scroll element; `None` lays the list out in the document flow.
    pub scroller_height: Option<f64>,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            width: 320.0,
            window_height: 600.0,
            header_height: 0.0,
            footer_height: 0.0,
            scroller_height: None,
        }
    }
}

impl PageLayout {
    pub fn with_window_height(mut self, height: f64) -> Self {
        self.window_height = height;
        self
    }

    pub fn with_header_height(mut self, height: f64) -> Self {
        self.header_height = height;
        self
    }

    pub fn with_footer_height(mut self, height: f64) -> Self {
        self.footer_height = height;
        self
    }

    pub fn with_scroller(mut self, height: f64) -> Self {
        self.scroller_height = Some(height);
        self
    }
}

/// Which scroll container a listener observes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScrollHost {
    Window,
    Element,
}

/// Handle of a registered listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

#[derive(Debug)]
struct Listener {
    host: ScrollHost,
    queue: Vec<ViewportEvent>,
}

#[derive(Debug, Default)]
struct Scroller {
    height: f64,
    scroll_y: f64,
    scrollable: bool,
}

#[derive(Default)]
struct Container {
    skeleton: Option<Row>,
    rows: Vec<Row>,
    padding: (f64, f64),
    handlers: EventMap,
}

struct PageState {
    layout: PageLayout,
    window_scroll: f64,
    scroller: Option<Scroller>,
    list: Container,
    listeners: BTreeMap<ListenerId, Listener>,
    next_listener: u64,
}

impl PageState {
    fn list_height(&self) -> f64 {
        let rows: f64 = self.list.rows.iter().map(|r| r.height).sum();
        self.list.padding.0 + rows + self.list.padding.1
    }

    /// Height of whatever sits between header and footer.
    fn main_height(&self) -> f64 {
        match &self.scroller {
            Some(s) => s.height,
            None => self.list_height(),
        }
    }

    fn document_height(&self) -> f64 {
        self.layout.header_height + self.main_height() + self.layout.footer_height
    }

    fn main_top(&self) -> f64 {
        self.layout.header_height - self.window_scroll
    }

    fn list_top(&self) -> f64 {
        match &self.scroller {
            Some(s) => self.main_top() - s.scroll_y,
            None => self.main_top(),
        }
    }

    fn max_window_scroll(&self) -> f64 {
        (self.document_height() - self.layout.window_height).max(0.0)
    }

    fn max_element_scroll(&self) -> Option<f64> {
        let s = self.scroller.as_ref()?;
        Some((self.list_height() - s.height).max(0.0))
    }

    fn emit(&mut self, host: Option<ScrollHost>, event: ViewportEvent) {
        for listener in self.listeners.values_mut() {
            if host.is_none_or(|h| h == listener.host) {
                listener.queue.push(event);
            }
        }
    }
}

/// A simulated document hosting one list container.
///
/// Clones share the same page: the surface, the viewports and the test driving them all hold a
/// handle. Layout is computed on demand from the row heights the item renderer declares.
#[derive(Clone)]
pub struct Page {
    state: Rc<RefCell<PageState>>,
}

impl Page {
    pub fn new(layout: PageLayout) -> Self {
        let scroller = layout.scroller_height.map(|height| Scroller {
            height: height.max(0.0),
            ..Scroller::default()
        });
        Self {
            state: Rc::new(RefCell::new(PageState {
                layout,
                window_scroll: 0.0,
                scroller,
                list: Container::default(),
                listeners: BTreeMap::new(),
                next_listener: 0,
            })),
        }
    }

    pub fn layout(&self) -> PageLayout {
        self.state.borrow().layout
    }

    pub fn has_scroller(&self) -> bool {
        self.state.borrow().scroller.is_some()
    }

    /// The browser window, in viewport coordinates.
    pub fn window_rect(&self) -> Rect {
        let s = self.state.borrow();
        Rect::new(0.0, 0.0, s.layout.width, s.layout.window_height)
    }

    pub fn document_rect(&self) -> Rect {
        let s = self.state.borrow();
        Rect::new(-s.window_scroll, 0.0, s.layout.width, s.document_height())
    }

    /// The visible box of the scroll element.
    pub fn scroller_rect(&self) -> Option<Rect> {
        let s = self.state.borrow();
        let scroller = s.scroller.as_ref()?;
        Some(Rect::new(s.main_top(), 0.0, s.layout.width, scroller.height))
    }

    /// The scrollable content of the scroll element.
    pub fn scroller_content_rect(&self) -> Option<Rect> {
        let s = self.state.borrow();
        let scroller = s.scroller.as_ref()?;
        Some(Rect::new(
            s.main_top() - scroller.scroll_y,
            0.0,
            s.layout.width,
            s.list_height(),
        ))
    }

    /// The list container, padding included.
    pub fn list_rect(&self) -> Rect {
        let s = self.state.borrow();
        Rect::new(s.list_top(), 0.0, s.layout.width, s.list_height())
    }

    pub fn window_scroll(&self) -> f64 {
        self.state.borrow().window_scroll
    }

    pub fn element_scroll(&self) -> Option<f64> {
        self.state.borrow().scroller.as_ref().map(|s| s.scroll_y)
    }

    pub fn max_window_scroll(&self) -> f64 {
        self.state.borrow().max_window_scroll()
    }

    pub fn max_element_scroll(&self) -> Option<f64> {
        self.state.borrow().max_element_scroll()
    }

    /// Scrolls the window, clamped to the document. Fires a scroll event if the offset moved.
    pub fn scroll_window_to(&self, y: f64) {
        let mut s = self.state.borrow_mut();
        let y = clamp_offset(y, s.max_window_scroll());
        if y != s.window_scroll {
            s.window_scroll = y;
            s.emit(Some(ScrollHost::Window), ViewportEvent::Scroll);
        }
    }

    /// Scrolls the scroll element, if it exists and has been made scrollable.
    pub fn scroll_element_to(&self, y: f64) {
        let mut s = self.state.borrow_mut();
        let Some(max) = s.max_element_scroll() else {
            return;
        };
        let y = clamp_offset(y, max);
        let Some(scroller) = s.scroller.as_mut().filter(|sc| sc.scrollable) else {
            return;
        };
        if y != scroller.scroll_y {
            scroller.scroll_y = y;
            s.emit(Some(ScrollHost::Element), ViewportEvent::Scroll);
        }
    }

    /// Resizes the window; every listener sees a resize.
    pub fn resize_window(&self, width: f64, height: f64) {
        let mut s = self.state.borrow_mut();
        s.layout.width = width.max(0.0);
        s.layout.window_height = height.max(0.0);
        s.emit(None, ViewportEvent::Resize);
    }

    /// A navigation key went down; every listener sees it.
    pub fn key_press(&self) {
        self.state.borrow_mut().emit(None, ViewportEvent::KeyPress);
    }

    /// Dispatches a delegated event on the materialized row at `row`.
    ///
    /// Returns `false` if nothing handles `descriptor` or the row does not exist.
    pub fn dispatch(&self, descriptor: &str, row: usize) -> bool {
        let handler = {
            let s = self.state.borrow();
            if row >= s.list.rows.len() {
                return false;
            }
            s.list.handlers.get(descriptor).cloned()
        };
        match handler {
            Some(handler) => {
                handler(row);
                true
            }
            None => false,
        }
    }

    pub fn rows(&self) -> Vec<Row> {
        self.state.borrow().list.rows.clone()
    }

    pub fn row_count(&self) -> usize {
        self.state.borrow().list.rows.len()
    }

    /// Padding of the list container, `(top, bottom)`.
    pub fn padding(&self) -> (f64, f64) {
        self.state.borrow().list.padding
    }

    pub fn skeleton(&self) -> Option<Row> {
        self.state.borrow().list.skeleton.clone()
    }

    /// Descriptors of the currently delegated events.
    pub fn delegated_events(&self) -> Vec<String> {
        self.state.borrow().list.handlers.keys().cloned().collect()
    }

    /// Number of registered viewport listeners.
    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    /// Bounding box of the materialized row at `row`.
    pub fn row_rect(&self, row: usize) -> Option<Rect> {
        let s = self.state.borrow();
        let height = s.list.rows.get(row)?.height;
        let above: f64 = s.list.rows[..row].iter().map(|r| r.height).sum();
        let top = s.list_top() + s.list.padding.0 + above;
        Some(Rect::new(top, 0.0, s.layout.width, height))
    }

    pub(crate) fn listen(&self, host: ScrollHost) -> ListenerId {
        let mut s = self.state.borrow_mut();
        s.next_listener += 1;
        let id = ListenerId(s.next_listener);
        s.listeners.insert(
            id,
            Listener {
                host,
                queue: Vec::new(),
            },
        );
        id
    }

    pub(crate) fn unlisten(&self, id: ListenerId) {
        self.state.borrow_mut().listeners.remove(&id);
    }

    pub(crate) fn drain(&self, id: ListenerId, out: &mut Vec<ViewportEvent>) {
        if let Some(listener) = self.state.borrow_mut().listeners.get_mut(&id) {
            out.append(&mut listener.queue);
        }
    }

    /// Turns on `overflow-y: auto` for the scroll element. Returns `false` without one.
    pub(crate) fn make_scrollable(&self) -> bool {
        match self.state.borrow_mut().scroller.as_mut() {
            Some(scroller) => {
                scroller.scrollable = true;
                true
            }
            None => false,
        }
    }

    pub(crate) fn mount_skeleton(&self, skeleton: Row) {
        let mut s = self.state.borrow_mut();
        s.list = Container {
            skeleton: Some(skeleton),
            handlers: std::mem::take(&mut s.list.handlers),
            ..Container::default()
        };
    }

    pub(crate) fn set_handlers(&self, events: &EventMap) {
        self.state.borrow_mut().list.handlers = events.clone();
    }

    pub(crate) fn with_rows<R>(&self, f: impl FnOnce(&mut Vec<Row>) -> R) -> R {
        f(&mut self.state.borrow_mut().list.rows)
    }

    pub(crate) fn set_padding(&self, top: f64, bottom: f64) {
        self.state.borrow_mut().list.padding = (top, bottom);
    }
}

impl core::fmt::Debug for Page {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = self.state.borrow();
        f.debug_struct("Page")
            .field("layout", &s.layout)
            .field("window_scroll", &s.window_scroll)
            .field("scroller", &s.scroller)
            .field("rows", &s.list.rows.len())
            .field("padding", &s.list.padding)
            .field("listeners", &s.listeners.len())
            .finish()
    }
}

fn clamp_offset(y: f64, max: f64) -> f64 {
    if y.is_nan() { 0.0 } else { y.clamp(0.0, max) }
}
