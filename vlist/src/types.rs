use core::fmt;
use core::str::FromStr;

use crate::Error;

/// An axis-aligned rectangle in viewport-relative pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }
}

/// The half-open range `[index_first, index_last)` of materialized items.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderWindow {
    pub index_first: usize,
    pub index_last: usize, // exclusive
}

impl RenderWindow {
    pub fn new(index_first: usize, index_last: usize) -> Self {
        debug_assert!(index_first <= index_last, "inverted window");
        Self {
            index_first,
            index_last,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.index_first >= self.index_last
    }

    pub fn len(&self) -> usize {
        self.index_last.saturating_sub(self.index_first)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.index_first <= index && index < self.index_last
    }

    /// Whether the two (non-empty) ranges share at least one index.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.index_first < other.index_last && other.index_first < self.index_last
    }
}

/// Where `scroll_to_item` should place the item.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScrollPosition {
    /// Scroll only as far as needed to reveal the item; no-op if it is already visible.
    #[default]
    Default,
    Top,
    Middle,
    Bottom,
    /// Item top this many pixels below the visible top.
    Offset(f64),
}

impl ScrollPosition {
    pub(crate) fn validate(self) -> Result<Self, Error> {
        match self {
            Self::Offset(px) if !px.is_finite() => Err(Error::InvalidArgument(format!(
                "scroll offset must be finite, got {px}"
            ))),
            other => Ok(other),
        }
    }
}

impl FromStr for ScrollPosition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "default" => Ok(Self::Default),
            "top" => Ok(Self::Top),
            "middle" => Ok(Self::Middle),
            "bottom" => Ok(Self::Bottom),
            other => other
                .parse::<f64>()
                .map_err(|_| Error::InvalidArgument(format!("unknown scroll position {other:?}")))
                .and_then(|px| Self::Offset(px).validate()),
        }
    }
}

impl TryFrom<&str> for ScrollPosition {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<f64> for ScrollPosition {
    fn from(px: f64) -> Self {
        Self::Offset(px)
    }
}

impl fmt::Display for ScrollPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Top => f.write_str("top"),
            Self::Middle => f.write_str("middle"),
            Self::Bottom => f.write_str("bottom"),
            Self::Offset(px) => write!(f, "{px}"),
        }
    }
}

/// An item index and the viewport-relative position its top edge must end up at.
///
/// `index` may equal the item count, in which case it names the bottom edge of the list.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Anchor {
    pub index: usize,
    pub top: f64,
}

/// Identifies one coalesced redraw batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatchId(pub u64);

/// What a completed redraw did.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RedrawStats {
    pub batch: BatchId,
    /// Reconciliation passes run.
    pub passes: usize,
    /// `false` when the pass cap was hit before reaching a fixed point.
    pub converged: bool,
    /// Whether anything was committed to the surface or the viewport.
    pub changed: bool,
    pub window: RenderWindow,
    pub scroll_top: f64,
    pub item_height: f64,
}

/// Redraw notifications, in emission order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RedrawEvent {
    WillRedraw(BatchId),
    DidRedraw(RedrawStats),
}
