//! # Counter: iteration-bounded loop.
//!
//! Re-runs its wrapped module up to `count` times; with `can_quit` set it
//! exits as soon as the module succeeds.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use modkit::{Counter, LoopPolicy, Module, ModuleMeta, ProcessState, Step, WorkError};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let flaky = Arc::new(Step::from_fn(ModuleMeta::new("flaky", "1.0.0"), |ctx, _t| async move {
//!     let attempt = ctx.get_or("attempt", 0u32) + 1;
//!     ctx.set("attempt", attempt);
//!     Ok::<_, WorkError>(attempt >= 2)
//! }));
//!
//! let retry = Counter::new(
//!     ModuleMeta::new("retry", "1.0.0"),
//!     flaky,
//!     5,
//!     LoopPolicy::default(),
//! );
//! retry.start().await.expect("succeeds on the second attempt");
//! assert_eq!(retry.state(), ProcessState::Succeeded);
//! # }
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::context::Context;
use crate::error::ModuleError;
use crate::events::Bus;
use crate::modules::{Module, ModuleMeta, ModuleRef};
use crate::policies::LoopPolicy;
use crate::state::Lifecycle;

use super::driver::{self, lock};
use super::CountController;

/// Loop composite bounded by an iteration count.
pub struct Counter {
    cell: Lifecycle,
    child: ModuleRef,
    policy: LoopPolicy,
    count: u64,
    ctl: Mutex<CountController>,
    token: Mutex<CancellationToken>,
    bus: Option<Bus>,
}

impl Counter {
    /// Creates a counter running `child` up to `count` times.
    ///
    /// The child inherits the counter's context. A zero `count` is
    /// reported as [`ModuleError::InvalidConfig`] from `start`.
    pub fn new(meta: ModuleMeta, child: ModuleRef, count: u64, policy: LoopPolicy) -> Self {
        let cell = Lifecycle::new(meta);
        let _ = child.set_context(cell.context());
        Self {
            cell,
            child,
            policy,
            count,
            ctl: Mutex::new(CountController::new(count)),
            token: Mutex::new(CancellationToken::new()),
            bus: None,
        }
    }

    /// Publishes iteration/stop events onto `bus`.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Handle to the wrapped module.
    pub fn child(&self) -> ModuleRef {
        Arc::clone(&self.child)
    }

    /// The configured iteration bound.
    pub fn count(&self) -> u64 {
        self.count
    }

    fn validate(&self) -> Result<(), ModuleError> {
        if self.count == 0 {
            return Err(ModuleError::InvalidConfig {
                module: self.describe(),
                reason: "iteration count must be positive".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Module for Counter {
    fn lifecycle(&self) -> &Lifecycle {
        &self.cell
    }

    fn set_context(&self, ctx: Context) -> bool {
        if !self.cell.can_set_context() || !self.child.can_set_context() {
            return false;
        }
        let _ = self.cell.set_context(ctx.clone());
        self.child.set_context(ctx)
    }

    fn can_set_context(&self) -> bool {
        self.cell.can_set_context() && self.child.can_set_context()
    }

    async fn start(&self) -> Result<(), ModuleError> {
        self.validate()?;
        let token = lock(&self.token).clone();
        driver::drive(
            &self.cell,
            &self.child,
            &self.policy,
            &self.ctl,
            &token,
            self.bus.as_ref(),
        )
        .await
    }

    async fn stop(&self) -> Result<(), ModuleError> {
        let token = lock(&self.token).clone();
        driver::request_stop(&self.cell, &self.child, token, self.bus.as_ref()).await
    }

    fn reset(&self) -> bool {
        driver::reset_loop(&self.cell, &self.child, &self.token)
    }

    fn fork(&self) -> Result<ModuleRef, ModuleError> {
        let copy = Counter::new(
            self.meta().clone(),
            self.child.fork()?,
            self.count,
            self.policy,
        );
        let _ = copy.set_context(self.context().fork());
        Ok(Arc::new(copy))
    }
}
