//! # Per-module state cell.
//!
//! [`Lifecycle`] owns a module's current [`ProcessState`] and its
//! [`Context`] slot behind a single mutex, so that two concurrent callers
//! can never both win the same transition and a context swap can never
//! race a transition into `Running`.
//!
//! ## Rules
//! - Transitions are validated against the table in
//!   [`ProcessState::can_transition`]; an illegal request returns `false`
//!   and changes nothing.
//! - Registered [`StateHandler`]s are notified with
//!   `(meta, old, new)` after the commit, outside the lock, so a handler
//!   may probe the module it observes without deadlocking.
//! - The context slot is refused while the state is `Running` or
//!   `Waiting`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::context::Context;
use crate::modules::ModuleMeta;
use crate::observers::StateHandler;
use crate::state::ProcessState;

struct Inner {
    state: ProcessState,
    context: Context,
}

/// State cell shared by every module implementation.
///
/// Holds the module's identity, its current state, its context slot, and
/// the registered state-change observers.
pub struct Lifecycle {
    meta: ModuleMeta,
    inner: Mutex<Inner>,
    handlers: RwLock<Vec<Arc<dyn StateHandler>>>,
}

impl Lifecycle {
    /// Creates a cell in `Ready` with a fresh, empty context.
    pub fn new(meta: ModuleMeta) -> Self {
        Self {
            meta,
            inner: Mutex::new(Inner {
                state: ProcessState::Ready,
                context: Context::new(),
            }),
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// The owning module's identity.
    pub fn meta(&self) -> &ModuleMeta {
        &self.meta
    }

    /// Current state.
    pub fn state(&self) -> ProcessState {
        self.lock().state
    }

    /// Probes whether a transition to `to` would be accepted right now.
    pub fn can_change(&self, to: ProcessState) -> bool {
        self.lock().state.can_transition(to)
    }

    /// Commits a transition to `to` if the table allows it.
    ///
    /// On success the committed `(old, new)` pair is delivered to every
    /// registered handler and `true` is returned. An illegal request
    /// returns `false` and leaves the state untouched.
    pub fn change(&self, to: ProcessState) -> bool {
        let old = {
            let mut inner = self.lock();
            if !inner.state.can_transition(to) {
                return false;
            }
            let old = inner.state;
            inner.state = to;
            old
        };
        self.notify(old, to);
        true
    }

    /// Commits `from -> to` only if the cell is currently in `from`.
    ///
    /// Closes the race where two callers both observe `Ready` and both
    /// start a run: exactly one `change_from(Ready, Running)` wins.
    pub fn change_from(&self, from: ProcessState, to: ProcessState) -> bool {
        {
            let mut inner = self.lock();
            if inner.state != from || !inner.state.can_transition(to) {
                return false;
            }
            inner.state = to;
        }
        self.notify(from, to);
        true
    }

    /// Handle to the current context.
    pub fn context(&self) -> Context {
        self.lock().context.clone()
    }

    /// True if a context swap would be accepted right now.
    pub fn can_set_context(&self) -> bool {
        !self.lock().state.is_active()
    }

    /// Swaps the context slot; refused while `Running` or `Waiting`.
    pub fn set_context(&self, ctx: Context) -> bool {
        let mut inner = self.lock();
        if inner.state.is_active() {
            return false;
        }
        inner.context = ctx;
        true
    }

    /// Registers an observer for every subsequently committed transition.
    pub fn add_handler(&self, handler: Arc<dyn StateHandler>) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    fn notify(&self, old: ProcessState, new: ProcessState) {
        let snapshot: Vec<Arc<dyn StateHandler>> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for handler in snapshot {
            handler.on_transition(&self.meta, old, new);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
