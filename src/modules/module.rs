//! # The base module contract.
//!
//! A [`Module`] is an executable unit with an identity, a shared
//! [`Context`], and a lifecycle state gated by the transition table in
//! [`ProcessState`](crate::ProcessState). Leaves ([`Step`](crate::Step))
//! execute user work; composites ([`Process`](crate::Process),
//! [`Chunk`](crate::Chunk), the loop family) own and drive other modules.
//!
//! ## Lifecycle
//! ```text
//! Ready ──start()──► Running ──► Succeeded / Failed / Stopped
//!   ▲                   │
//!   └─────reset()───────┴──(terminal states return to Ready)
//! ```
//!
//! ## Rules
//! - `start` is accepted only from `Ready`; the run ends in a terminal
//!   state. `Ok(())` means the run reached `Succeeded` **or** `Stopped`;
//!   `Err` carries the failure chain and the state is `Failed`.
//! - `stop` is cooperative: it requests termination and is honored at the
//!   next safe point; it never forcibly interrupts in-flight work.
//! - `reset` returns a terminal module (and, for composites, its children)
//!   to `Ready`; it is the only road out of a terminal state.
//! - `fork` produces an independent deep copy: fresh lifecycle in `Ready`,
//!   deep-copied children, and a forked context disjoint from the
//!   original's.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::ModuleError;
use crate::modules::ModuleMeta;
use crate::observers::StateHandler;
use crate::state::{Lifecycle, ProcessState};

/// Shared handle to a module (`Arc<dyn Module>`).
pub type ModuleRef = Arc<dyn Module>;

/// # Base executable unit.
///
/// Implementors hold their state in a [`Lifecycle`] cell and expose it via
/// [`lifecycle`](Module::lifecycle); the state/context accessors are
/// provided on top of it. Composites override [`set_context`]
/// (and [`can_set_context`]) to propagate recursively, and [`reset`] to
/// reset their children.
///
/// [`set_context`]: Module::set_context
/// [`can_set_context`]: Module::can_set_context
/// [`reset`]: Module::reset
#[async_trait]
pub trait Module: Send + Sync + 'static {
    /// The module's state cell.
    fn lifecycle(&self) -> &Lifecycle;

    /// Identity and version.
    fn meta(&self) -> &ModuleMeta {
        self.lifecycle().meta()
    }

    /// Current lifecycle state.
    fn state(&self) -> ProcessState {
        self.lifecycle().state()
    }

    /// Probes whether a transition to `to` would be accepted right now.
    fn can_change(&self, to: ProcessState) -> bool {
        self.lifecycle().can_change(to)
    }

    /// Handle to the module's context.
    fn context(&self) -> Context {
        self.lifecycle().context()
    }

    /// Swaps the module's context; refused while `Running` or `Waiting`.
    ///
    /// Composites propagate the handle to every child and refuse the whole
    /// operation if any descendant refuses.
    fn set_context(&self, ctx: Context) -> bool {
        self.lifecycle().set_context(ctx)
    }

    /// Probes whether [`set_context`](Module::set_context) would succeed.
    fn can_set_context(&self) -> bool {
        self.lifecycle().can_set_context()
    }

    /// Registers an observer for every committed transition of this
    /// module.
    fn add_state_handler(&self, handler: Arc<dyn StateHandler>) {
        self.lifecycle().add_handler(handler);
    }

    /// Runs the module to a terminal state.
    ///
    /// Accepted only from `Ready`. `Ok(())` when the run ended in
    /// `Succeeded` or `Stopped`; `Err` when it ended in `Failed` (the
    /// error names the failing descendant) or when the start itself was
    /// rejected ([`ModuleError::Rejected`]).
    async fn start(&self) -> Result<(), ModuleError>;

    /// Requests cooperative termination.
    ///
    /// Forwards to running descendants, then commits `Stopped` on this
    /// module. Returns [`ModuleError::Rejected`] when called in a state
    /// with no legal road to `Stopped` (`Succeeded`/`Failed`).
    async fn stop(&self) -> Result<(), ModuleError>;

    /// Returns the module (and, recursively, its children) to `Ready`.
    ///
    /// Legal from `Ready` and the terminal states; returns `false` (and
    /// changes nothing it can avoid) otherwise.
    fn reset(&self) -> bool;

    /// Produces an independent deep copy in `Ready`.
    ///
    /// Children are copied, never aliased; the copy's context is a fork of
    /// the original's, shared by the whole copied tree. Fails with
    /// [`ModuleError::Uncopyable`] if any descendant cannot be copied.
    fn fork(&self) -> Result<ModuleRef, ModuleError>;

    /// Human-readable description (identity/version only).
    fn describe(&self) -> String {
        self.meta().to_string()
    }
}
