use crate::Rect;

/// Current scroll offsets of a viewport.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScrollMetrics {
    pub x: f64,
    pub y: f64,
    /// `y` relative to the largest reachable offset, in `[0, 1]`. `0` when nothing scrolls.
    pub ratio: f64,
}

impl ScrollMetrics {
    /// Builds scroll metrics, deriving `ratio` from the outer and inner heights.
    pub fn new(x: f64, y: f64, outer_height: f64, inner_height: f64) -> Self {
        let max = (inner_height - outer_height).max(0.0);
        let ratio = if max > 0.0 {
            (y / max).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self { x, y, ratio }
    }
}

/// A geometry snapshot of a scrollable region.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ViewportMetrics {
    /// The visible part of the region.
    pub outer: Rect,
    /// The full scrollable content.
    pub inner: Rect,
    pub scroll: ScrollMetrics,
}

/// A scroll request; `None` leaves that axis alone.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScrollTo {
    pub x: Option<f64>,
    pub y: Option<f64>,
}

impl ScrollTo {
    pub fn y(y: f64) -> Self {
        Self { x: None, y: Some(y) }
    }
}

/// Notifications a viewport reports to its list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViewportEvent {
    Scroll,
    Resize,
    /// Key-driven navigation; the host may be animating a native scroll.
    KeyPress,
}

impl ViewportEvent {
    /// Scroll and resize both change the visible geometry.
    pub fn is_change(self) -> bool {
        matches!(self, Self::Scroll | Self::Resize)
    }
}

/// The scrollable region a list lives in: the whole window, or a scrollable element.
///
/// Implementations belong to the host. The engine only measures, scrolls, drains events and
/// disposes.
pub trait Viewport {
    fn metrics(&self) -> ViewportMetrics;

    /// Requests new scroll offsets. The effect shows up in the next `metrics` call.
    fn scroll_to(&mut self, to: ScrollTo);

    /// Moves the events observed since the previous call into `out`.
    fn poll_events(&mut self, out: &mut Vec<ViewportEvent>);

    /// Releases every listener the viewport registered with its host.
    fn remove(&mut self);
}
