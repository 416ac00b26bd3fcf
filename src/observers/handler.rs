//! # State-change observer contract.
//!
//! A [`StateHandler`] registered on a module (via
//! [`Module::add_state_handler`](crate::Module::add_state_handler)) is
//! called with `(meta, old, new)` after every committed transition.
//!
//! Handlers run synchronously on the thread that committed the
//! transition, outside the module's state lock. Keep them cheap; anything
//! slow belongs behind [`BusHandler`] and an async
//! [`Subscribe`](crate::Subscribe) worker.

use crate::events::{Bus, Event, EventKind};
use crate::modules::ModuleMeta;
use crate::state::ProcessState;

/// Observer of committed state transitions.
pub trait StateHandler: Send + Sync + 'static {
    /// Called after a transition commits, with the module's identity and
    /// the `(old, new)` pair.
    fn on_transition(&self, module: &ModuleMeta, from: ProcessState, to: ProcessState);
}

/// Bridges committed transitions onto an event [`Bus`] as
/// [`EventKind::StateChanged`] events.
///
/// Register one instance per tree (or per module of interest) and consume
/// the stream with [`SubscriberSet`](crate::SubscriberSet).
///
/// ## Example
/// ```rust
/// use std::sync::Arc;
/// use modkit::{Bus, BusHandler, Lifecycle, ModuleMeta, ProcessState};
///
/// let bus = Bus::new(64);
/// let cell = Lifecycle::new(ModuleMeta::new("demo", "1.0.0"));
/// cell.add_handler(Arc::new(BusHandler::new(bus.clone())));
///
/// let mut rx = bus.subscribe();
/// cell.change(ProcessState::Running);
/// let ev = rx.try_recv().expect("event");
/// assert_eq!(ev.to, Some(ProcessState::Running));
/// ```
pub struct BusHandler {
    bus: Bus,
}

impl BusHandler {
    /// Creates a handler publishing onto `bus`.
    pub fn new(bus: Bus) -> Self {
        Self { bus }
    }
}

impl StateHandler for BusHandler {
    fn on_transition(&self, module: &ModuleMeta, from: ProcessState, to: ProcessState) {
        self.bus.publish(
            Event::now(EventKind::StateChanged)
                .with_module(module.to_string())
                .with_transition(from, to),
        );
    }
}
