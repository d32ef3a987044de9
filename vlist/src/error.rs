//! Caller-misuse errors.
//!
//! Layout conditions (empty lists, zero-height rows, sub-pixel deltas) are never errors; the
//! reconciler handles them as ordinary branches.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A malformed argument, such as an unknown scroll position.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The list has not been rendered yet (or was removed), so there is no geometry to act on.
    #[error("list view is not rendered")]
    NotRendered,
}

pub type Result<T> = core::result::Result<T, Error>;
