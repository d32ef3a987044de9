//! Frame-aligned redraw scheduling.
//!
//! The engine never owns a clock or an event loop. It asks an injected [`FrameScheduler`] for a
//! callback on the next animation frame (or after a delay) and receives the resulting
//! [`FrameToken`] back through `ListView::on_frame`. Tokens of cancelled or superseded requests
//! are ignored when they arrive.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Identifies one frame or timeout request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameToken(pub u64);

/// The host's frame primitive (e.g. `requestAnimationFrame` / `setTimeout`).
pub trait FrameScheduler {
    /// Requests a callback on the next animation frame.
    fn request_frame(&mut self) -> FrameToken;

    /// Requests a callback once `delay_ms` have elapsed.
    fn request_timeout(&mut self, delay_ms: u64) -> FrameToken;

    /// Cancels a request that has not fired yet. Unknown tokens are ignored.
    fn cancel(&mut self, token: FrameToken);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Due {
    NextFrame,
    At(u64),
}

#[derive(Debug, Default)]
struct FrameQueue {
    now_ms: u64,
    next_token: u64,
    requests: VecDeque<(FrameToken, Due)>,
}

/// A manually ticked [`FrameScheduler`].
///
/// Clones share the same queue: hand one clone to the list view and keep another to drive it.
/// Every [`ManualFrames::tick`] fires all animation-frame requests plus the timeouts whose
/// deadline has passed.
#[derive(Clone, Debug, Default)]
pub struct ManualFrames {
    queue: Rc<RefCell<FrameQueue>>,
}

impl ManualFrames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the clock to `now_ms` and returns the due tokens in request order.
    pub fn tick(&self, now_ms: u64) -> Vec<FrameToken> {
        let mut q = self.queue.borrow_mut();
        q.now_ms = q.now_ms.max(now_ms);
        let now = q.now_ms;
        let mut due = Vec::new();
        q.requests.retain(|&(token, when)| {
            let fire = match when {
                Due::NextFrame => true,
                Due::At(deadline) => deadline <= now,
            };
            if fire {
                due.push(token);
            }
            !fire
        });
        due
    }

    pub fn now_ms(&self) -> u64 {
        self.queue.borrow().now_ms
    }

    /// Number of outstanding requests.
    pub fn pending(&self) -> usize {
        self.queue.borrow().requests.len()
    }

    /// Earliest deadline among outstanding timeouts; animation frames count as "now".
    pub fn next_deadline(&self) -> Option<u64> {
        let q = self.queue.borrow();
        q.requests
            .iter()
            .map(|&(_, when)| match when {
                Due::NextFrame => q.now_ms,
                Due::At(deadline) => deadline,
            })
            .min()
    }

    fn push(&self, due: Due) -> FrameToken {
        let mut q = self.queue.borrow_mut();
        q.next_token += 1;
        let token = FrameToken(q.next_token);
        let due = match due {
            Due::At(delay) => Due::At(q.now_ms.saturating_add(delay)),
            other => other,
        };
        q.requests.push_back((token, due));
        token
    }
}

impl FrameScheduler for ManualFrames {
    fn request_frame(&mut self) -> FrameToken {
        self.push(Due::NextFrame)
    }

    fn request_timeout(&mut self, delay_ms: u64) -> FrameToken {
        self.push(Due::At(delay_ms))
    }

    fn cancel(&mut self, token: FrameToken) {
        self.queue.borrow_mut().requests.retain(|&(t, _)| t != token);
    }
}

/// What to do with a delivered frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FrameDecision {
    /// Not the pending request; it was cancelled or superseded.
    Stale,
    /// Redraws are blocked; a retry has been scheduled.
    Deferred,
    Run,
}

/// Holds at most one pending frame request and gates it on key-driven scrolling.
///
/// Only redraws that viewport changes asked for are held back by a key press. Once an operation
/// joins the pending redraw it runs on the next frame.
pub(crate) struct RedrawScheduler {
    frames: Box<dyn FrameScheduler>,
    pending: Option<FrameToken>,
    /// The pending redraw was requested by viewport changes only.
    gated: bool,
    blocked_until_ms: Option<u64>,
    key_debounce_ms: u64,
    retry_ms: u64,
}

impl RedrawScheduler {
    pub(crate) fn new(frames: Box<dyn FrameScheduler>, key_debounce_ms: u64, retry_ms: u64) -> Self {
        Self {
            frames,
            pending: None,
            gated: false,
            blocked_until_ms: None,
            key_debounce_ms,
            retry_ms: retry_ms.max(1),
        }
    }

    pub(crate) fn configure(&mut self, key_debounce_ms: u64, retry_ms: u64) {
        self.key_debounce_ms = key_debounce_ms;
        self.retry_ms = retry_ms.max(1);
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    #[cfg(test)]
    pub(crate) fn blocked_until_ms(&self) -> Option<u64> {
        self.blocked_until_ms
    }

    /// Ensures a redraw runs on the next frame, key navigation or not. Repeated calls coalesce
    /// into the same request.
    pub(crate) fn schedule(&mut self) {
        if self.gated {
            // A retry timeout may be pending; an operation does not wait for it.
            self.cancel();
        }
        if self.pending.is_none() {
            let token = self.frames.request_frame();
            vtrace!(token = token.0, "schedule redraw");
            self.pending = Some(token);
        }
        self.gated = false;
    }

    /// Ensures a redraw is pending for a scroll or resize. Held back while keys are navigating.
    pub(crate) fn schedule_change(&mut self) {
        if self.pending.is_none() {
            let token = self.frames.request_frame();
            vtrace!(token = token.0, "schedule redraw for viewport change");
            self.pending = Some(token);
            self.gated = true;
        }
    }

    /// Blocks change redraws for the key debounce window, pushing a pending one back to a retry.
    pub(crate) fn block(&mut self, now_ms: u64) {
        let until = now_ms.saturating_add(self.key_debounce_ms);
        self.blocked_until_ms = Some(self.blocked_until_ms.map_or(until, |u| u.max(until)));
        if !self.gated {
            return;
        }
        if let Some(token) = self.pending.take() {
            self.frames.cancel(token);
            self.pending = Some(self.frames.request_timeout(self.retry_ms));
        }
    }

    pub(crate) fn accept(&mut self, token: FrameToken, now_ms: u64) -> FrameDecision {
        if self.pending != Some(token) {
            return FrameDecision::Stale;
        }
        self.pending = None;
        if self.blocked_until_ms.is_some_and(|until| now_ms >= until) {
            self.blocked_until_ms = None;
        }
        match self.blocked_until_ms {
            Some(_until) if self.gated => {
                vtrace!(now_ms, until = _until, "redraw blocked by key navigation");
                self.pending = Some(self.frames.request_timeout(self.retry_ms));
                FrameDecision::Deferred
            }
            _ => {
                self.gated = false;
                FrameDecision::Run
            }
        }
    }

    pub(crate) fn cancel(&mut self) {
        if let Some(token) = self.pending.take() {
            self.frames.cancel(token);
        }
        self.gated = false;
    }
}

impl core::fmt::Debug for RedrawScheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RedrawScheduler")
            .field("pending", &self.pending)
            .field("gated", &self.gated)
            .field("blocked_until_ms", &self.blocked_until_ms)
            .field("key_debounce_ms", &self.key_debounce_ms)
            .field("retry_ms", &self.retry_ms)
            .finish_non_exhaustive()
    }
}
