use std::collections::BTreeMap;
use std::sync::Arc;

use crate::Rect;

/// Handler invoked by the host when a delegated event fires on a row.
///
/// The argument is the position of the row inside the container; `ListView::index_for_row`
/// maps it back to an item index.
pub type EventHandler = Arc<dyn Fn(usize) + Send + Sync>;

/// Delegated events, keyed by a host-defined descriptor such as `"click .row"`.
pub type EventMap = BTreeMap<String, EventHandler>;

/// Input of the skeleton renderer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SkeletonModel {
    pub item_count: usize,
}

/// The host container rows are materialized into.
///
/// Rows sit directly adjacent to each other inside a container whose only layout-affecting
/// properties controlled by the engine are its top and bottom padding. Row indices are
/// positions inside the container (`0` is the first materialized row), not item indices.
pub trait Surface {
    /// Whatever the item and skeleton renderers produce.
    type Markup;

    /// Replaces the container markup. Any materialized rows are discarded.
    fn mount_skeleton(&mut self, skeleton: Self::Markup);

    /// Rebinds delegated event handlers.
    fn delegate_events(&mut self, events: &EventMap);

    /// Bounding box of the container, padding included, in viewport coordinates.
    fn container_rect(&self) -> Rect;

    fn insert_front(&mut self, rows: Vec<Self::Markup>);
    fn insert_back(&mut self, rows: Vec<Self::Markup>);
    fn remove_front(&mut self, count: usize);
    fn remove_back(&mut self, count: usize);
    fn clear_rows(&mut self);
    fn row_count(&self) -> usize;

    /// Rendered bounding box of a materialized row, in viewport coordinates.
    fn row_rect(&self, row: usize) -> Option<Rect>;

    fn set_padding(&mut self, top: f64, bottom: f64);
}
