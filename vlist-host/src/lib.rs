//! A headless host for the `vlist` engine.
//!
//! `vlist` only talks to its host through the `Surface`, `Viewport` and `FrameScheduler` traits.
//! This crate implements them against a simulated page so the engine can be driven end to end
//! without a browser or GUI toolkit:
//!
//! - [`Page`]: a document with a header, the list container (or a scroll element holding it) and
//!   a footer; layout is computed from the row heights
//! - [`WindowViewport`] / [`ElementViewport`]: the two scroll container variants
//! - [`PageSurface`]: the list container, with [`Row`] as markup
//! - [`Driver`]: owns the list view and a frame queue, and runs it on a simulated clock
#![forbid(unsafe_code)]

mod driver;
mod page;
mod surface;
mod viewport;


pub use driver::{Driver, FRAME_MS};
pub use page::{ListenerId, Page, PageLayout, ScrollHost};
pub use surface::{PageSurface, Row};
pub use viewport::{ElementViewport, PageViewport, WindowViewport};
