//! # Process: the sequential composite.
//!
//! Runs its children in insertion order, fail-fast: the first child that
//! does not reach `Succeeded` ends the run as `Failed` and no further
//! child starts. A stopped Process never resumes mid-sequence; after
//! `reset` it restarts from the first child.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use modkit::{Module, ModuleMeta, Process, ProcessState, Step, WorkError};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let pipeline = Process::new(ModuleMeta::new("deploy", "1.0.0"));
//! pipeline.deploy(Arc::new(Step::from_fn(
//!     ModuleMeta::new("build", "1.0.0"),
//!     |_ctx, _t| async { Ok::<_, WorkError>(true) },
//! )));
//! pipeline.deploy(Arc::new(Step::from_fn(
//!     ModuleMeta::new("publish", "1.0.0"),
//!     |_ctx, _t| async { Ok::<_, WorkError>(true) },
//! )));
//!
//! pipeline.start().await.expect("run");
//! assert_eq!(pipeline.state(), ProcessState::Succeeded);
//! # }
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::context::Context;
use crate::error::ModuleError;
use crate::modules::{Bundle, Module, ModuleMeta, ModuleRef};
use crate::state::{Lifecycle, ProcessState};

/// Sequential composite: drives children in order on the caller's task.
pub struct Process {
    cell: Lifecycle,
    bundle: Bundle,
    current: Mutex<Option<ModuleRef>>,
    token: Mutex<CancellationToken>,
}

impl Process {
    /// Creates an empty process.
    pub fn new(meta: ModuleMeta) -> Self {
        Self {
            cell: Lifecycle::new(meta),
            bundle: Bundle::new(),
            current: Mutex::new(None),
            token: Mutex::new(CancellationToken::new()),
        }
    }

    /// Appends a child; refused while running or when the child refuses
    /// this process's context.
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

    /// Snapshot of the children, in execution order.
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

    fn set_current(&self, child: Option<ModuleRef>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = child;
    }

    fn current_child(&self) -> Option<ModuleRef> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn ensure_stopped(&self) {
        if self.cell.state() != ProcessState::Stopped {
            let _ = self.cell.change(ProcessState::Stopped);
        }
    }

    fn child_failed(&self, child: &ModuleRef, cause: Option<ModuleError>) -> ModuleError {
        let _ = self.cell.change(ProcessState::Failed);
        ModuleError::ChildFailed {
            parent: self.describe(),
            child: child.describe(),
            attempt: None,
            cause: cause.map(Box::new),
        }
    }
}

#[async_trait]
impl Module for Process {
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
        for child in self.bundle.modules() {
            if token.is_cancelled() {
                self.ensure_stopped();
                return Ok(());
            }

            self.set_current(Some(child.clone()));
            if !child.reset() {
                self.set_current(None);
                let rejected = ModuleError::Rejected {
                    module: child.describe(),
                    from: child.state(),
                    to: ProcessState::Ready,
                };
                return Err(self.child_failed(&child, Some(rejected)));
            }

            let run = child.start().await;
            self.set_current(None);

            if token.is_cancelled() {
                self.ensure_stopped();
                return Ok(());
            }
            if child.state() != ProcessState::Succeeded {
                return Err(self.child_failed(&child, run.err()));
            }
        }

        let _ = self.cell.change(ProcessState::Succeeded);
        Ok(())
    }

    async fn stop(&self) -> Result<(), ModuleError> {
        self.current_token().cancel();
        if let Some(child) = self.current_child() {
            if !child.state().is_terminal() {
                let _ = child.stop().await;
            }
        }
        match self.cell.state() {
            // mid-run: the run loop commits Stopped at the next child boundary
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
        if !self.cell.can_change(ProcessState::Ready) {
            return false;
        }
        let children_ok = self.bundle.reset_all();
        let own = self.cell.change(ProcessState::Ready);
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = CancellationToken::new();
        self.set_current(None);
        own && children_ok
    }

    fn fork(&self) -> Result<ModuleRef, ModuleError> {
        let children = self.bundle.fork_all()?;
        let copy = Process {
            cell: Lifecycle::new(self.meta().clone()),
            bundle: Bundle::with(children),
            current: Mutex::new(None),
            token: Mutex::new(CancellationToken::new()),
        };
        let _ = copy.set_context(self.context().fork());
        Ok(Arc::new(copy))
    }
}
