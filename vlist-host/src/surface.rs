use vlist::{EventMap, Rect, Surface};

use crate::Page;

/// Markup of the simulated page: a block of text with a fixed laid-out height.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Row {
    pub text: String,
    pub height: f64,
}

impl Row {
    pub fn new(text: impl Into<String>, height: f64) -> Self {
        Self {
            text: text.into(),
            height,
        }
    }
}

/// The page's list container as a [`Surface`].
#[derive(Clone, Debug)]
pub struct PageSurface {
    page: Page,
}

impl PageSurface {
    pub fn new(page: &Page) -> Self {
        Self { page: page.clone() }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }
}

impl Surface for PageSurface {
    type Markup = Row;

    fn mount_skeleton(&mut self, skeleton: Row) {
        self.page.mount_skeleton(skeleton);
    }

    fn delegate_events(&mut self, events: &EventMap) {
        self.page.set_handlers(events);
    }

    fn container_rect(&self) -> Rect {
        self.page.list_rect()
    }

    fn insert_front(&mut self, rows: Vec<Row>) {
        self.page.with_rows(|r| {
            r.splice(0..0, rows);
        });
    }

    fn insert_back(&mut self, rows: Vec<Row>) {
        self.page.with_rows(|r| r.extend(rows));
    }

    fn remove_front(&mut self, count: usize) {
        self.page.with_rows(|r| {
            let count = count.min(r.len());
            r.drain(..count);
        });
    }

    fn remove_back(&mut self, count: usize) {
        self.page.with_rows(|r| {
            let keep = r.len().saturating_sub(count);
            r.truncate(keep);
        });
    }

    fn clear_rows(&mut self) {
        self.page.with_rows(Vec::clear);
    }

    fn row_count(&self) -> usize {
        self.page.row_count()
    }

    fn row_rect(&self, row: usize) -> Option<Rect> {
        self.page.row_rect(row)
    }

    fn set_padding(&mut self, top: f64, bottom: f64) {
        self.page.set_padding(top, bottom);
    }
}
