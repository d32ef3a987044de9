//! Crate-local log macros.
//!
//! With the `tracing` feature they forward to `tracing` under the `vlist` target. Without it the
//! arguments are dropped unevaluated.

macro_rules! vlog {
    ($level:ident, $($tt:tt)*) => {{
        #[cfg(feature = "tracing")]
        tracing::$level!(target: "vlist", $($tt)*);
    }};
}

/// Per-pass detail.
macro_rules! vtrace {
    ($($tt:tt)*) => {
        vlog!(trace, $($tt)*)
    };
}

/// One line per operation or redraw.
macro_rules! vdebug {
    ($($tt:tt)*) => {
        vlog!(debug, $($tt)*)
    };
}

/// Rejected requests and redraws that hit the pass cap.
macro_rules! vwarn {
    ($($tt:tt)*) => {
        vlog!(warn, $($tt)*)
    };
}
