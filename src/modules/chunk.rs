//! # Chunk: the parallel composite.
//!
//! Launches every child concurrently on its own tokio task and joins on
//! **all** of them — a barrier, not a race: a child that fails first never
//! causes its siblings to be abandoned. The Chunk succeeds only if every
//! child succeeds; otherwise it fails with every child failure aggregated.
//!
//! ## Stop semantics
//! `stop` requests termination on every still-running child and waits for
//! the run to drain. With a configured stop grace, an expired wait
//! reports the children still outstanding via
//! [`ModuleError::StopGraceExceeded`].
//!
//! ## Context
//! All children share the chunk's one context store; siblings must avoid
//! key collisions (individual accesses are lock-consistent).

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::context::Context;
use crate::error::{ModuleError, WorkError};
use crate::modules::{Bundle, Module, ModuleMeta, ModuleRef};
use crate::state::{Lifecycle, ProcessState};

/// Parallel composite: one independently scheduled task per child, joined
/// on completion or stop.
pub struct Chunk {
    cell: Lifecycle,
    bundle: Bundle,
    token: Mutex<CancellationToken>,
    stop_grace: Option<Duration>,
    active: watch::Sender<bool>,
}

impl Chunk {
    /// Creates an empty chunk with no stop grace (stop waits
    /// indefinitely for children to drain).
    pub fn new(meta: ModuleMeta) -> Self {
        let (active, _) = watch::channel(false);
        Self {
            cell: Lifecycle::new(meta),
            bundle: Bundle::new(),
            token: Mutex::new(CancellationToken::new()),
            stop_grace: None,
            active,
        }
    }

    /// Bounds how long [`stop`](Module::stop) waits for children to reach
    /// a terminal state.
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = Some(grace);
        self
    }

    /// Appends a child; refused while running or when the child refuses
    /// this chunk's context.
    pub fn deploy(&self, module: ModuleRef) -> bool {
        self.bundle.deploy(&self.cell, module)
    }

    /// Inserts a child at `index` (clamped), with the same gating.
    pub fn deploy_at(&self, index: usize, module: ModuleRef) -> bool {
        self.bundle.deploy_at(&self.cell, index, module)
    }

    /// Removes the first child with this name; returns it if found.
    pub fn undeploy(&self, name: &str) -> Option<ModuleRef> {
        self.bundle.undeploy(&self.cell, name)
    }

    /// True if a child with this identity is deployed.
    pub fn contains(&self, meta: &ModuleMeta) -> bool {
        self.bundle.contains(meta)
    }

    /// Snapshot of the children.
    pub fn modules(&self) -> Vec<ModuleRef> {
        self.bundle.modules()
    }

    /// Number of deployed children.
    pub fn len(&self) -> usize {
        self.bundle.len()
    }

    /// True if no children are deployed.
    pub fn is_empty(&self) -> bool {
        self.bundle.is_empty()
    }

    fn current_token(&self) -> CancellationToken {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn ensure_stopped(&self) {
        if self.cell.state() != ProcessState::Stopped {
            let _ = self.cell.change(ProcessState::Stopped);
        }
    }

    fn outstanding(&self) -> Vec<String> {
        self.bundle
            .modules()
            .iter()
            .filter(|c| !c.state().is_terminal())
            .map(|c| c.describe())
            .collect()
    }
}

#[async_trait]
impl Module for Chunk {
    fn lifecycle(&self) -> &Lifecycle {
        &self.cell
    }

    fn set_context(&self, ctx: Context) -> bool {
        if !self.cell.can_set_context() || !self.bundle.can_set_context() {
            return false;
        }
        let _ = self.cell.set_context(ctx.clone());
        self.bundle.set_context(&ctx)
    }

    fn can_set_context(&self) -> bool {
        self.cell.can_set_context() && self.bundle.can_set_context()
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
        let children = self.bundle.modules();
        self.active.send_replace(true);

        let mut set = JoinSet::new();
        for child in children.iter().cloned() {
            let token = token.clone();
            set.spawn(async move {
                if token.is_cancelled() {
                    return (child, Ok(()));
                }
                if !child.reset() {
                    let rejected = ModuleError::Rejected {
                        module: child.describe(),
                        from: child.state(),
                        to: ProcessState::Ready,
                    };
                    return (child, Err(rejected));
                }
                let run = match std::panic::AssertUnwindSafe(child.start()).catch_unwind().await {
                    Ok(run) => run,
                    Err(_) => Err(ModuleError::Step {
                        module: child.describe(),
                        cause: WorkError::fatal("panicked"),
                    }),
                };
                (child, run)
            });
        }

        let mut causes = Vec::new();
        while let Some(joined) = set.join_next().await {
            let Ok((child, run)) = joined else {
                // task aborted from outside; nothing to attribute
                continue;
            };
            if child.state() == ProcessState::Succeeded {
                continue;
            }
            if child.state() == ProcessState::Stopped && token.is_cancelled() {
                continue;
            }
            causes.push(ModuleError::ChildFailed {
                parent: self.describe(),
                child: child.describe(),
                attempt: None,
                cause: run.err().map(Box::new),
            });
        }

        let result = if token.is_cancelled() {
            self.ensure_stopped();
            Ok(())
        } else if causes.is_empty() {
            let _ = self.cell.change(ProcessState::Succeeded);
            Ok(())
        } else {
            let _ = self.cell.change(ProcessState::Failed);
            Err(ModuleError::Aggregated {
                parent: self.describe(),
                total: children.len(),
                causes,
            })
        };
        self.active.send_replace(false);
        result
    }

    async fn stop(&self) -> Result<(), ModuleError> {
        self.current_token().cancel();
        for child in self.bundle.modules() {
            if !child.state().is_terminal() {
                let _ = child.stop().await;
            }
        }

        let mut rx = self.active.subscribe();
        let drained = rx.wait_for(|running| !*running);
        match self.stop_grace {
            None => {
                let _ = drained.await;
            }
            Some(grace) => {
                if tokio::time::timeout(grace, drained).await.is_err() {
                    return Err(ModuleError::StopGraceExceeded {
                        module: self.describe(),
                        grace,
                        outstanding: self.outstanding(),
                    });
                }
            }
        }

        match self.cell.state() {
            ProcessState::Stopped => Ok(()),
            ProcessState::Ready => {
                let _ = self.cell.change(ProcessState::Stopped);
                Ok(())
            }
            from => Err(ModuleError::Rejected {
                module: self.describe(),
                from,
                to: ProcessState::Stopped,
            }),
        }
    }

    fn reset(&self) -> bool {
        if !self.cell.can_change(ProcessState::Ready) {
            return false;
        }
        let children_ok = self.bundle.reset_all();
        let own = self.cell.change(ProcessState::Ready);
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = CancellationToken::new();
        own && children_ok
    }

    fn fork(&self) -> Result<ModuleRef, ModuleError> {
        let children = self.bundle.fork_all()?;
        let (active, _) = watch::channel(false);
        let copy = Chunk {
            cell: Lifecycle::new(self.meta().clone()),
            bundle: Bundle::with(children),
            token: Mutex::new(CancellationToken::new()),
            stop_grace: self.stop_grace,
            active,
        };
        let _ = copy.set_context(self.context().fork());
        Ok(Arc::new(copy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::modules::Step;

    fn timed_leaf(name: &str, after: Duration, succeed: bool) -> ModuleRef {
        Arc::new(Step::from_fn(
            ModuleMeta::new(name.to_string(), "1.0.0"),
            move |_ctx, _t| async move {
                tokio::time::sleep(after).await;
                Ok(succeed)
            },
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn join_barrier_waits_for_every_child() {
        let chunk = Chunk::new(ModuleMeta::new("fanout", "1.0.0"));
        let slow_ok = timed_leaf("slow-ok", Duration::from_millis(50), true);
        let fast_fail = timed_leaf("fast-fail", Duration::from_millis(10), false);
        chunk.deploy(slow_ok.clone());
        chunk.deploy(fast_fail.clone());

        let err = chunk.start().await.expect_err("must fail");
        assert_eq!(chunk.state(), ProcessState::Failed);

        // the slow sibling was not abandoned when the fast one failed
        assert_eq!(slow_ok.state(), ProcessState::Succeeded);
        assert_eq!(fast_fail.state(), ProcessState::Failed);

        match err {
            ModuleError::Aggregated { total, causes, .. } => {
                assert_eq!(total, 2);
                assert_eq!(causes.len(), 1);
                assert!(matches!(
                    &causes[0],
                    ModuleError::ChildFailed { child, .. } if child == "fast-fail@1.0.0"
                ));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn every_concurrent_failure_is_collected() {
        let chunk = Chunk::new(ModuleMeta::new("fanout", "1.0.0"));
        chunk.deploy(timed_leaf("a", Duration::from_millis(5), false));
        chunk.deploy(timed_leaf("b", Duration::from_millis(15), true));
        chunk.deploy(timed_leaf("c", Duration::from_millis(25), false));

        let err = chunk.start().await.expect_err("must fail");
        match err {
            ModuleError::Aggregated { total, causes, .. } => {
                assert_eq!(total, 3);
                assert_eq!(causes.len(), 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn all_children_succeed() {
        let chunk = Chunk::new(ModuleMeta::new("fanout", "1.0.0"));
        let runs = Arc::new(AtomicU32::new(0));
        for name in ["a", "b", "c"] {
            let runs = Arc::clone(&runs);
            chunk.deploy(Arc::new(Step::from_fn(
                ModuleMeta::new(name.to_string(), "1.0.0"),
                move |_ctx, _t| {
                    let runs = Arc::clone(&runs);
                    async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        Ok(true)
                    }
                },
            )));
        }

        chunk.start().await.expect("run");
        assert_eq!(chunk.state(), ProcessState::Succeeded);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_drains_cooperative_children() {
        let chunk = Arc::new(Chunk::new(ModuleMeta::new("fanout", "1.0.0")));
        chunk.deploy(Arc::new(Step::from_fn(
            ModuleMeta::new("obedient", "1.0.0"),
            |_ctx, token: CancellationToken| async move {
                token.cancelled().await;
                Ok(true)
            },
        )));

        let runner = {
            let chunk = Arc::clone(&chunk);
            tokio::spawn(async move { chunk.start().await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(chunk.state(), ProcessState::Running);

        chunk.stop().await.expect("stop");
        runner.await.expect("join").expect("stopped run is ok");
        assert_eq!(chunk.state(), ProcessState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_stop_grace_reports_outstanding_children() {
        let chunk = Arc::new(
            Chunk::new(ModuleMeta::new("fanout", "1.0.0"))
                .with_stop_grace(Duration::from_millis(50)),
        );
        // ignores its token entirely
        chunk.deploy(Arc::new(Step::from_fn(
            ModuleMeta::new("stubborn", "1.0.0"),
            |_ctx, _t| async move {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(true)
            },
        )));

        let runner = {
            let chunk = Arc::clone(&chunk);
            tokio::spawn(async move { chunk.start().await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;

        let err = chunk.stop().await.expect_err("grace must expire");
        match err {
            ModuleError::StopGraceExceeded {
                grace, outstanding, ..
            } => {
                assert_eq!(grace, Duration::from_millis(50));
                assert_eq!(outstanding, vec!["stubborn@1.0.0".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        runner.abort();
    }

    #[tokio::test]
    async fn children_share_the_chunk_context() {
        let chunk = Chunk::new(ModuleMeta::new("fanout", "1.0.0"));
        chunk.context().set("region", String::from("eu"));
        chunk.deploy(Arc::new(Step::from_fn(
            ModuleMeta::new("reader", "1.0.0"),
            |ctx, _t| async move { Ok(ctx.get::<String>("region").as_deref() == Some("eu")) },
        )));

        chunk.start().await.expect("run");
        assert_eq!(chunk.state(), ProcessState::Succeeded);
    }

    #[tokio::test]
    async fn fork_is_deep_and_reusable() {
        let chunk = Chunk::new(ModuleMeta::new("fanout", "1.0.0"));
        chunk.deploy(timed_leaf("a", Duration::ZERO, true));
        chunk.start().await.expect("run");

        let copy = chunk.fork().expect("fork");
        assert_eq!(copy.state(), ProcessState::Ready);
        assert!(!copy.context().shares_store(&chunk.context()));
        copy.start().await.expect("copy runs independently");
        assert_eq!(copy.state(), ProcessState::Succeeded);
    }
}
