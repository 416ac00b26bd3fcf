//! # Repeater: wall-clock-bounded loop.
//!
//! Re-runs its wrapped module until a wall-clock budget measured from loop
//! start is spent; with `can_quit` set it exits as soon as the module
//! succeeds. See [`Timer`](crate::Timer) for the variant that reports the
//! measured elapsed duration.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::context::Context;
use crate::error::ModuleError;
use crate::events::Bus;
use crate::modules::{Module, ModuleMeta, ModuleRef};
use crate::policies::LoopPolicy;
use crate::state::Lifecycle;

use super::driver::{self, lock};
use super::ClockController;

/// Loop composite bounded by a wall-clock duration.
pub struct Repeater {
    cell: Lifecycle,
    child: ModuleRef,
    policy: LoopPolicy,
    bound: Duration,
    ctl: Mutex<ClockController>,
    token: Mutex<CancellationToken>,
    bus: Option<Bus>,
}

impl Repeater {
    /// Creates a repeater running `child` until `bound` has elapsed.
    ///
    /// The child inherits the repeater's context. A zero `bound` is
    /// reported as [`ModuleError::InvalidConfig`] from `start`.
    pub fn new(meta: ModuleMeta, child: ModuleRef, bound: Duration, policy: LoopPolicy) -> Self {
        let cell = Lifecycle::new(meta);
        let _ = child.set_context(cell.context());
        Self {
            cell,
            child,
            policy,
            bound,
            ctl: Mutex::new(ClockController::new(bound)),
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

    /// The configured wall-clock bound.
    pub fn bound(&self) -> Duration {
        self.bound
    }

    fn validate(&self) -> Result<(), ModuleError> {
        if self.bound.is_zero() {
            return Err(ModuleError::InvalidConfig {
                module: self.describe(),
                reason: "wall-clock bound must be positive".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Module for Repeater {
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
        let copy = Repeater::new(
            self.meta().clone(),
            self.child.fork()?,
            self.bound,
            self.policy,
        );
        let _ = copy.set_context(self.context().fork());
        Ok(Arc::new(copy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::modules::Step;
    use crate::state::ProcessState;

    #[tokio::test(start_paused = true)]
    async fn quits_early_on_success() {
        let runs = Arc::new(AtomicU32::new(0));
        let repeater = Repeater::new(
            ModuleMeta::new("poll", "1.0.0"),
            Arc::new(Step::from_fn(ModuleMeta::new("third", "1.0.0"), {
                let runs = Arc::clone(&runs);
                move |_ctx, _t| {
                    let runs = Arc::clone(&runs);
                    async move { Ok(runs.fetch_add(1, Ordering::SeqCst) + 1 >= 3) }
                }
            })),
            Duration::from_secs(60),
            LoopPolicy::default().with_delay(Duration::from_millis(10)),
        );

        repeater.start().await.expect("run");
        assert_eq!(repeater.state(), ProcessState::Succeeded);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn without_can_quit_the_budget_is_spent() {
        let runs = Arc::new(AtomicU32::new(0));
        let repeater = Repeater::new(
            ModuleMeta::new("tick", "1.0.0"),
            Arc::new(Step::from_fn(ModuleMeta::new("beat", "1.0.0"), {
                let runs = Arc::clone(&runs);
                move |_ctx, _t| {
                    let runs = Arc::clone(&runs);
                    async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        Ok(true)
                    }
                }
            })),
            Duration::from_millis(100),
            LoopPolicy::default()
                .can_quit(false)
                .with_delay(Duration::from_millis(30)),
        );

        repeater.start().await.expect("budget exhaustion succeeds");
        assert_eq!(repeater.state(), ProcessState::Succeeded);
        assert!(runs.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn zero_bound_is_invalid() {
        let repeater = Repeater::new(
            ModuleMeta::new("poll", "1.0.0"),
            Arc::new(Step::from_fn(ModuleMeta::new("x", "1.0.0"), |_c, _t| {
                async { Ok(true) }
            })),
            Duration::ZERO,
            LoopPolicy::default(),
        );
        let err = repeater.start().await.expect_err("invalid");
        assert!(matches!(err, ModuleError::InvalidConfig { .. }));
    }
}
