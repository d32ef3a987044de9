//! A virtualized list engine for variable-height rows.
//!
//! Only the rows near the visible range are materialized into a host container; the rest of the
//! list is stood in for by top and bottom padding. Row heights are measured lazily as rows appear
//! and kept in a Fenwick-backed [`HeightIndex`], with unmeasured rows using a running average.
//!
//! The engine is host-agnostic. A host provides:
//! - a [`Surface`]: the container rows go into, plus row measurement
//! - a [`Viewport`]: the scrollable region (window or element) and its events
//! - a [`FrameScheduler`]: animation-frame and timeout primitives
//!
//! Each redraw runs bounded reconciliation passes that keep an anchor item visually fixed while
//! the materialized window and the height estimate converge. For a simulated host, see the
//! `vlist-host` crate.
#![forbid(unsafe_code)]

#[macro_use]
mod macros;

mod error;
mod fenwick;
mod height_index;
mod invalidation;
mod list_view;
mod options;
mod render_context;
mod scheduler;
mod surface;
mod types;
mod viewport;

#[cfg(test)]
mod tests;

pub use error::{Error, Result};
pub use height_index::{HeightIndex, MIN_ESTIMATE};
pub use invalidation::{Completion, Dirty};
pub use list_view::{ListView, RedrawObserver};
pub use options::{ItemRenderer, ListConfig, ListViewOptions, SkeletonRenderer};
pub use render_context::{Metrics, SCROLL_TOLERANCE};
pub use scheduler::{FrameScheduler, FrameToken, ManualFrames};
pub use surface::{EventHandler, EventMap, SkeletonModel, Surface};
pub use types::{Anchor, BatchId, Rect, RedrawEvent, RedrawStats, RenderWindow, ScrollPosition};
pub use viewport::{ScrollMetrics, ScrollTo, Viewport, ViewportEvent, ViewportMetrics};
