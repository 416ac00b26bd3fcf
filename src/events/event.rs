//! # Runtime events.
//!
//! [`EventKind`] classifies what happened; [`Event`] carries the metadata
//! (module, transition, attempt, delay) as optional builder-set fields.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! consumed from independent queues.
//!
//! ## Example
//! ```rust
//! use modkit::{Event, EventKind, ProcessState};
//!
//! let ev = Event::now(EventKind::StateChanged)
//!     .with_module("fetch@1.0.0")
//!     .with_transition(ProcessState::Ready, ProcessState::Running);
//!
//! assert_eq!(ev.kind, EventKind::StateChanged);
//! assert_eq!(ev.module.as_deref(), Some("fetch@1.0.0"));
//! assert_eq!(ev.to, Some(ProcessState::Running));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::state::ProcessState;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A module committed a state transition.
    ///
    /// Sets: `module`, `from`, `to`, `at`, `seq`.
    StateChanged,

    /// A loop composite is starting an iteration of its wrapped module.
    ///
    /// Sets: `module`, `attempt`, `at`, `seq`.
    IterationStarting,

    /// A loop composite parked before its next iteration.
    ///
    /// Sets: `module`, `attempt`, `delay_ms`, `at`, `seq`.
    IterationDelayed,

    /// Cooperative stop was requested on a module.
    ///
    /// Sets: `module`, `at`, `seq`.
    StopRequested,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Module description (`name@version`), if applicable.
    pub module: Option<Arc<str>>,
    /// Committed transition source state.
    pub from: Option<ProcessState>,
    /// Committed transition target state.
    pub to: Option<ProcessState>,
    /// Loop iteration number (starting from 1).
    pub attempt: Option<u64>,
    /// Inter-iteration delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Human-readable reason, when one exists.
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp
    /// and the next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            module: None,
            from: None,
            to: None,
            attempt: None,
            delay_ms: None,
            reason: None,
        }
    }

    /// Attaches the module description.
    #[inline]
    pub fn with_module(mut self, module: impl Into<Arc<str>>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Attaches a committed transition.
    #[inline]
    pub fn with_transition(mut self, from: ProcessState, to: ProcessState) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    /// Attaches an iteration number.
    #[inline]
    pub fn with_attempt(mut self, n: u64) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_monotonic() {
        let a = Event::now(EventKind::StateChanged);
        let b = Event::now(EventKind::StateChanged);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn builder_sets_only_requested_fields() {
        let ev = Event::now(EventKind::IterationDelayed)
            .with_module("loop@0.1.0")
            .with_attempt(4)
            .with_delay(Duration::from_millis(250));

        assert_eq!(ev.module.as_deref(), Some("loop@0.1.0"));
        assert_eq!(ev.attempt, Some(4));
        assert_eq!(ev.delay_ms, Some(250));
        assert!(ev.from.is_none());
        assert!(ev.reason.is_none());
    }

    #[test]
    fn oversized_delay_saturates() {
        let ev = Event::now(EventKind::IterationDelayed).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }
}
