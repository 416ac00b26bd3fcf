//! # Timer: wall-clock-bounded loop that reports its measured duration.
//!
//! Identical run semantics to [`Repeater`](crate::Repeater); additionally
//! exposes the elapsed duration measured over the last completed run via
//! [`Timer::elapsed`].
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use modkit::{LoopPolicy, Module, ModuleMeta, Step, Timer, WorkError};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let probe = Arc::new(Step::from_fn(ModuleMeta::new("probe", "1.0.0"), |_c, _t| async {
//!     Ok::<_, WorkError>(false)
//! }));
//! let timer = Timer::new(
//!     ModuleMeta::new("deadline", "1.0.0"),
//!     probe,
//!     Duration::from_millis(500),
//!     LoopPolicy::default().with_delay(Duration::from_millis(100)),
//! );
//! let _ = timer.start().await;
//! println!("gave up after {:?}", timer.elapsed());
//! # }
//! ```

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

/// Wall-clock-bounded loop reporting its measured elapsed duration.
pub struct Timer {
    cell: Lifecycle,
    child: ModuleRef,
    policy: LoopPolicy,
    bound: Duration,
    ctl: Mutex<ClockController>,
    token: Mutex<CancellationToken>,
    bus: Option<Bus>,
}

impl Timer {
    /// Creates a timer running `child` until `bound` has elapsed.
    ///
    /// The child inherits the timer's context. A zero `bound` is reported
    /// as [`ModuleError::InvalidConfig`] from `start`.
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

    /// Duration measured over the last completed run, if any.
    pub fn elapsed(&self) -> Option<Duration> {
        lock(&self.ctl).elapsed()
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
impl Module for Timer {
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
        let copy = Timer::new(
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
    async fn reports_elapsed_at_least_the_bound_on_exhaustion() {
        let timer = Timer::new(
            ModuleMeta::new("deadline", "1.0.0"),
            Arc::new(Step::from_fn(
                ModuleMeta::new("never", "1.0.0"),
                |_c, _t| async { Ok(false) },
            )),
            Duration::from_millis(500),
            LoopPolicy::default().with_delay(Duration::from_millis(100)),
        );

        let err = timer.start().await.expect_err("never succeeds");
        assert_eq!(timer.state(), ProcessState::Failed);

        let elapsed = timer.elapsed().expect("measured");
        assert!(elapsed >= Duration::from_millis(500), "elapsed {elapsed:?}");
        match err {
            ModuleError::TimeLimitExceeded {
                limit,
                elapsed: reported,
                attempts,
                ..
            } => {
                assert_eq!(limit, Duration::from_millis(500));
                assert!(reported >= Duration::from_millis(500));
                assert!(attempts >= 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn measures_a_successful_run_too() {
        let runs = Arc::new(AtomicU32::new(0));
        let timer = Timer::new(
            ModuleMeta::new("deadline", "1.0.0"),
            Arc::new(Step::from_fn(ModuleMeta::new("second", "1.0.0"), {
                let runs = Arc::clone(&runs);
                move |_ctx, _t| {
                    let runs = Arc::clone(&runs);
                    async move { Ok(runs.fetch_add(1, Ordering::SeqCst) + 1 >= 2) }
                }
            })),
            Duration::from_secs(10),
            LoopPolicy::default().with_delay(Duration::from_millis(50)),
        );

        timer.start().await.expect("run");
        assert_eq!(timer.state(), ProcessState::Succeeded);

        let elapsed = timer.elapsed().expect("measured");
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_resets_with_the_loop() {
        let timer = Timer::new(
            ModuleMeta::new("deadline", "1.0.0"),
            Arc::new(Step::from_fn(ModuleMeta::new("ok", "1.0.0"), |_c, _t| {
                async { Ok(true) }
            })),
            Duration::from_secs(1),
            LoopPolicy::default(),
        );

        timer.start().await.expect("run");
        assert!(timer.elapsed().is_some());

        assert!(timer.reset());
        timer.start().await.expect("second run");
        assert!(timer.elapsed().is_some());
    }
}
