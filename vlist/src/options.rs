use std::sync::Arc;

use crate::height_index::MIN_ESTIMATE;
use crate::surface::{EventMap, SkeletonModel};

/// Renders one item into host markup. Must be free of side effects the engine depends on and
/// must not add outer margins to the row.
pub type ItemRenderer<T, M> = Arc<dyn Fn(&T) -> M + Send + Sync>;

/// Renders the container markup.
pub type SkeletonRenderer<M> = Arc<dyn Fn(&SkeletonModel) -> M + Send + Sync>;

/// Plain numeric tuning knobs.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ListConfig {
    /// Height assumed for rows that were never measured (at least `1`).
    pub default_item_height: f64,
    /// Extra items materialized beyond each visible edge.
    pub overscan: usize,
    /// Upper bound on reconciliation passes per redraw.
    pub max_passes: usize,
    /// How long a key press suppresses redraws.
    pub key_debounce_ms: u64,
    /// Retry interval while redraws are suppressed.
    pub blocked_retry_ms: u64,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            default_item_height: 20.0,
            overscan: 10,
            max_passes: 32,
            key_debounce_ms: 200,
            blocked_retry_ms: 100,
        }
    }
}

impl ListConfig {
    pub(crate) fn sanitized(mut self) -> Self {
        if !self.default_item_height.is_finite() || self.default_item_height < MIN_ESTIMATE {
            self.default_item_height = MIN_ESTIMATE;
        }
        self.max_passes = self.max_passes.max(1);
        self
    }
}

/// Configuration for [`crate::ListView`].
///
/// Cheap to clone: items and renderers are shared through `Arc`s, so `reset` can be fed a
/// modified copy of the current options.
pub struct ListViewOptions<T, M> {
    pub items: Arc<[T]>,
    pub item_renderer: ItemRenderer<T, M>,
    pub skeleton_renderer: SkeletonRenderer<M>,
    pub events: EventMap,
    pub config: ListConfig,
}

impl<T, M> Clone for ListViewOptions<T, M> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            item_renderer: Arc::clone(&self.item_renderer),
            skeleton_renderer: Arc::clone(&self.skeleton_renderer),
            events: self.events.clone(),
            config: self.config,
        }
    }
}

impl<T, M> ListViewOptions<T, M> {
    pub fn new(
        items: impl Into<Arc<[T]>>,
        item_renderer: impl Fn(&T) -> M + Send + Sync + 'static,
        skeleton_renderer: impl Fn(&SkeletonModel) -> M + Send + Sync + 'static,
    ) -> Self {
        Self {
            items: items.into(),
            item_renderer: Arc::new(item_renderer),
            skeleton_renderer: Arc::new(skeleton_renderer),
            events: EventMap::new(),
            config: ListConfig::default(),
        }
    }

    pub fn with_items(mut self, items: impl Into<Arc<[T]>>) -> Self {
        self.items = items.into();
        self
    }

    pub fn with_item_renderer(mut self, f: impl Fn(&T) -> M + Send + Sync + 'static) -> Self {
        self.item_renderer = Arc::new(f);
        self
    }

    pub fn with_skeleton_renderer(
        mut self,
        f: impl Fn(&SkeletonModel) -> M + Send + Sync + 'static,
    ) -> Self {
        self.skeleton_renderer = Arc::new(f);
        self
    }

    pub fn with_events(mut self, events: EventMap) -> Self {
        self.events = events;
        self
    }

    pub fn with_config(mut self, config: ListConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_default_item_height(mut self, height: f64) -> Self {
        self.config.default_item_height = height;
        self
    }

    pub fn with_overscan(mut self, overscan: usize) -> Self {
        self.config.overscan = overscan;
        self
    }

    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.config.max_passes = max_passes;
        self
    }

    pub fn with_key_debounce_ms(mut self, delay_ms: u64) -> Self {
        self.config.key_debounce_ms = delay_ms;
        self
    }

    pub fn with_blocked_retry_ms(mut self, delay_ms: u64) -> Self {
        self.config.blocked_retry_ms = delay_ms;
        self
    }
}

impl<T, M> core::fmt::Debug for ListViewOptions<T, M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ListViewOptions")
            .field("items", &self.items.len())
            .field("events", &self.events.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
