use vlist::{ScrollMetrics, ScrollTo, Viewport, ViewportEvent, ViewportMetrics};

use crate::page::{ListenerId, ScrollHost};
use crate::Page;

/// The whole window as the scroll container.
///
/// `outer` is the window and `inner` the document.
#[derive(Debug)]
pub struct WindowViewport {
    page: Page,
    listener: Option<ListenerId>,
}

impl WindowViewport {
    /// Starts listening for window scroll, resize and key events.
    pub fn attach(page: &Page) -> Self {
        Self {
            page: page.clone(),
            listener: Some(page.listen(ScrollHost::Window)),
        }
    }
}

impl Viewport for WindowViewport {
    fn metrics(&self) -> ViewportMetrics {
        let outer = self.page.window_rect();
        let inner = self.page.document_rect();
        ViewportMetrics {
            outer,
            inner,
            scroll: ScrollMetrics::new(0.0, self.page.window_scroll(), outer.height, inner.height),
        }
    }

    fn scroll_to(&mut self, to: ScrollTo) {
        if let Some(y) = to.y {
            self.page.scroll_window_to(y);
        }
    }

    fn poll_events(&mut self, out: &mut Vec<ViewportEvent>) {
        if let Some(id) = self.listener {
            self.page.drain(id, out);
        }
    }

    fn remove(&mut self) {
        if let Some(id) = self.listener.take() {
            self.page.unlisten(id);
        }
    }
}

/// The page's scroll element as the scroll container.
///
/// `outer` is the element's box and `inner` its scrollable content.
#[derive(Debug)]
pub struct ElementViewport {
    page: Page,
    listener: Option<ListenerId>,
}

impl ElementViewport {
    /// Makes the scroll element scrollable and starts listening to it.
    ///
    /// Returns `None` if the page has no scroll element.
    pub fn attach(page: &Page) -> Option<Self> {
        if !page.make_scrollable() {
            return None;
        }
        Some(Self {
            page: page.clone(),
            listener: Some(page.listen(ScrollHost::Element)),
        })
    }
}

impl Viewport for ElementViewport {
    fn metrics(&self) -> ViewportMetrics {
        let outer = self.page.scroller_rect().unwrap_or_default();
        let inner = self.page.scroller_content_rect().unwrap_or_default();
        let y = self.page.element_scroll().unwrap_or(0.0);
        ViewportMetrics {
            outer,
            inner,
            scroll: ScrollMetrics::new(0.0, y, outer.height, inner.height),
        }
    }

    fn scroll_to(&mut self, to: ScrollTo) {
        if let Some(y) = to.y {
            self.page.scroll_element_to(y);
        }
    }

    fn poll_events(&mut self, out: &mut Vec<ViewportEvent>) {
        if let Some(id) = self.listener {
            self.page.drain(id, out);
        }
    }

    fn remove(&mut self) {
        if let Some(id) = self.listener.take() {
            self.page.unlisten(id);
        }
    }
}

/// Either kind of page viewport.
#[derive(Debug)]
pub enum PageViewport {
    Window(WindowViewport),
    Element(ElementViewport),
}

impl PageViewport {
    pub fn kind(&self) -> ScrollHost {
        match self {
            Self::Window(_) => ScrollHost::Window,
            Self::Element(_) => ScrollHost::Element,
        }
    }

    fn inner(&self) -> &dyn Viewport {
        match self {
            Self::Window(v) => v,
            Self::Element(v) => v,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Viewport {
        match self {
            Self::Window(v) => v,
            Self::Element(v) => v,
        }
    }
}

impl From<WindowViewport> for PageViewport {
    fn from(v: WindowViewport) -> Self {
        Self::Window(v)
    }
}

impl From<ElementViewport> for PageViewport {
    fn from(v: ElementViewport) -> Self {
        Self::Element(v)
    }
}

impl Viewport for PageViewport {
    fn metrics(&self) -> ViewportMetrics {
        self.inner().metrics()
    }

    fn scroll_to(&mut self, to: ScrollTo) {
        self.inner_mut().scroll_to(to);
    }

    fn poll_events(&mut self, out: &mut Vec<ViewportEvent>) {
        self.inner_mut().poll_events(out);
    }

    fn remove(&mut self) {
        self.inner_mut().remove();
    }
}
