//! # Step: the leaf module.
//!
//! A [`Step`] executes user-supplied [`Work`] inside one state transition:
//! `Ready → Running → Succeeded/Failed`. [`StepFn`] wraps a closure
//! `F: Fn(Context, CancellationToken) -> Fut`, producing a fresh future
//! per run so restarts never share hidden state.
//!
//! ## Outcome mapping
//! - `Ok(true)` → `Succeeded`, `start` returns `Ok(())`
//! - `Ok(false)` → `Failed`, `start` returns `Ok(())` — plain failure is
//!   an outcome, not an exception; callers check [`state`](crate::Module::state)
//! - `Err(e)` → `Failed`, `start` returns the wrapped cause
//! - stop requested while the work ran → `Stopped`, `start` returns `Ok(())`

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::context::Context;
use crate::error::{ModuleError, WorkError};
use crate::modules::{Module, ModuleMeta, ModuleRef};
use crate::state::{Lifecycle, ProcessState};

/// # User work executed by a step.
///
/// Receives the step's [`Context`] and a [`CancellationToken`];
/// implementations should check the token at convenient points and exit
/// promptly when it fires. Return `Ok(true)` for success, `Ok(false)` for
/// plain failure, `Err` for an exceptional failure.
///
/// ## Example
/// ```rust
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use modkit::{Context, Work, WorkError};
///
/// struct Probe;
///
/// #[async_trait]
/// impl Work for Probe {
///     async fn step(&self, ctx: Context, token: CancellationToken) -> Result<bool, WorkError> {
///         if token.is_cancelled() {
///             return Err(WorkError::Canceled);
///         }
///         Ok(ctx.get_or("healthy", false))
///     }
/// }
/// ```
#[async_trait]
pub trait Work: Send + Sync + 'static {
    /// Executes one unit of work.
    async fn step(&self, ctx: Context, token: CancellationToken) -> Result<bool, WorkError>;
}

/// Function-backed [`Work`] implementation.
///
/// Wraps a closure that *creates* a new future per run.
pub struct StepFn<F> {
    f: F,
}

impl<F> StepFn<F> {
    /// Creates a new function-backed work item.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the work item and returns it as a shared handle.
    ///
    /// ## Example
    /// ```rust
    /// use tokio_util::sync::CancellationToken;
    /// use modkit::{Context, StepFn, WorkError};
    ///
    /// let work = StepFn::arc(|_ctx: Context, _token: CancellationToken| async { Ok::<_, WorkError>(true) });
    /// ```
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Work for StepFn<F>
where
    F: Fn(Context, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool, WorkError>> + Send + 'static,
{
    async fn step(&self, ctx: Context, token: CancellationToken) -> Result<bool, WorkError> {
        (self.f)(ctx, token).await
    }
}

/// Leaf module executing user [`Work`] under the lifecycle contract.
pub struct Step {
    cell: Lifecycle,
    work: Arc<dyn Work>,
    token: Mutex<CancellationToken>,
}

impl Step {
    /// Creates a step from an identity and a work implementation.
    pub fn new(meta: ModuleMeta, work: Arc<dyn Work>) -> Self {
        Self {
            cell: Lifecycle::new(meta),
            work,
            token: Mutex::new(CancellationToken::new()),
        }
    }

    /// Creates a step from an identity and a closure.
    ///
    /// ## Example
    /// ```rust
    /// use modkit::{ModuleMeta, Step, WorkError};
    ///
    /// let step = Step::from_fn(ModuleMeta::new("ping", "1.0.0"), |ctx, _token| async move {
    ///     Ok::<_, WorkError>(ctx.contains("target"))
    /// });
    /// ```
    pub fn from_fn<F, Fut>(meta: ModuleMeta, f: F) -> Self
    where
        F: Fn(Context, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, WorkError>> + Send + 'static,
    {
        Self::new(meta, StepFn::arc(f))
    }

    fn current_token(&self) -> CancellationToken {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// A fired token cannot be re-armed; reset swaps in a fresh one.
    fn rearm_token(&self) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = CancellationToken::new();
    }

    fn ensure_stopped(&self) {
        if self.cell.state() != ProcessState::Stopped {
            let _ = self.cell.change(ProcessState::Stopped);
        }
    }
}

#[async_trait]
impl Module for Step {
    fn lifecycle(&self) -> &Lifecycle {
        &self.cell
    }

    async fn start(&self) -> Result<(), ModuleError> {
        if !self
            .cell
            .change_from(ProcessState::Ready, ProcessState::Running)
        {
            return Err(ModuleError::Rejected {
                module: self.describe(),
                from: self.cell.state(),
                to: ProcessState::Running,
            });
        }

        let token = self.current_token();
        let outcome = self.work.step(self.cell.context(), token.clone()).await;

        if token.is_cancelled() {
            self.ensure_stopped();
            return Ok(());
        }
        match outcome {
            Ok(true) => {
                let _ = self.cell.change(ProcessState::Succeeded);
                Ok(())
            }
            Ok(false) => {
                let _ = self.cell.change(ProcessState::Failed);
                Ok(())
            }
            Err(cause) => {
                let _ = self.cell.change(ProcessState::Failed);
                Err(ModuleError::Step {
                    module: self.describe(),
                    cause,
                })
            }
        }
    }

    async fn stop(&self) -> Result<(), ModuleError> {
        self.current_token().cancel();
        match self.cell.state() {
            // mid-run: the run commits Stopped once step() returns
            ProcessState::Running | ProcessState::Waiting | ProcessState::Stopped => Ok(()),
            ProcessState::Ready => {
                let _ = self.cell.change(ProcessState::Stopped);
                Ok(())
            }
            from @ (ProcessState::Succeeded | ProcessState::Failed) => {
                Err(ModuleError::Rejected {
                    module: self.describe(),
                    from,
                    to: ProcessState::Stopped,
                })
            }
        }
    }

    fn reset(&self) -> bool {
        if !self.cell.change(ProcessState::Ready) {
            return false;
        }
        self.rearm_token();
        true
    }

    fn fork(&self) -> Result<ModuleRef, ModuleError> {
        let copy = Step::new(self.meta().clone(), Arc::clone(&self.work));
        let _ = copy.set_context(self.context().fork());
        Ok(Arc::new(copy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ok_step() -> Step {
        Step::from_fn(ModuleMeta::new("ok", "1.0.0"), |_ctx, _t| async {
            Ok(true)
        })
    }

    #[tokio::test]
    async fn success_path() {
        let step = ok_step();
        step.start().await.expect("start");
        assert_eq!(step.state(), ProcessState::Succeeded);
    }

    #[tokio::test]
    async fn plain_failure_is_an_outcome_not_an_error() {
        let step = Step::from_fn(ModuleMeta::new("no", "1.0.0"), |_ctx, _t| async {
            Ok(false)
        });
        assert!(step.start().await.is_ok());
        assert_eq!(step.state(), ProcessState::Failed);
    }

    #[tokio::test]
    async fn raised_error_is_wrapped() {
        let step = Step::from_fn(ModuleMeta::new("boom", "1.0.0"), |_ctx, _t| async {
            Err(WorkError::failed("db unreachable"))
        });
        let err = step.start().await.expect_err("must fail");
        assert_eq!(step.state(), ProcessState::Failed);
        assert!(matches!(
            err,
            ModuleError::Step { module, cause: WorkError::Failed { .. } } if module == "boom@1.0.0"
        ));
    }

    #[tokio::test]
    async fn start_is_only_legal_from_ready() {
        let step = ok_step();
        step.start().await.expect("first run");
        let err = step.start().await.expect_err("second run must be rejected");
        assert!(matches!(
            err,
            ModuleError::Rejected {
                from: ProcessState::Succeeded,
                to: ProcessState::Running,
                ..
            }
        ));

        assert!(step.reset());
        assert_eq!(step.state(), ProcessState::Ready);
        step.start().await.expect("runs again after reset");
    }

    #[tokio::test]
    async fn stop_is_honored_after_the_current_step_returns() {
        let step = Arc::new(Step::from_fn(
            ModuleMeta::new("slow", "1.0.0"),
            |_ctx, token: CancellationToken| async move {
                token.cancelled().await;
                Ok(true)
            },
        ));

        let runner = {
            let step = Arc::clone(&step);
            tokio::spawn(async move { step.start().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(step.state(), ProcessState::Running);

        step.stop().await.expect("stop");
        runner.await.expect("join").expect("start result");
        assert_eq!(step.state(), ProcessState::Stopped);
    }

    #[tokio::test]
    async fn stop_from_terminal_is_rejected() {
        let step = ok_step();
        step.start().await.expect("start");
        let err = step.stop().await.expect_err("no road from Succeeded");
        assert!(matches!(err, ModuleError::Rejected { .. }));
    }

    #[tokio::test]
    async fn reset_rearms_the_token() {
        let step = Step::from_fn(ModuleMeta::new("again", "1.0.0"), |_ctx, _t| async {
            Ok(true)
        });
        step.stop().await.expect("stop from ready");
        assert_eq!(step.state(), ProcessState::Stopped);

        assert!(step.reset());
        step.start().await.expect("token must be fresh");
        assert_eq!(step.state(), ProcessState::Succeeded);
    }

    #[tokio::test]
    async fn work_reads_the_shared_context() {
        let step = Step::from_fn(ModuleMeta::new("ctx", "1.0.0"), |ctx: Context, _t| async move {
            Ok(ctx.get_or("go", false))
        });
        let ctx = Context::new();
        ctx.set("go", true);
        assert!(step.set_context(ctx));

        step.start().await.expect("start");
        assert_eq!(step.state(), ProcessState::Succeeded);
    }

    #[tokio::test]
    async fn fork_shares_behavior_but_not_state() {
        let step = ok_step();
        step.context().set("k", 1u32);
        step.start().await.expect("start");

        let copy = step.fork().expect("fork");
        assert_eq!(copy.state(), ProcessState::Ready);
        assert_eq!(copy.context().get::<u32>("k"), Some(1));
        assert!(!copy.context().shares_store(&step.context()));

        copy.context().set("k", 2u32);
        assert_eq!(step.context().get::<u32>("k"), Some(1));
    }
}
