//! # Container: single-worker wrapper.
//!
//! Gives one standalone worker module the full composite treatment when it
//! must be the root of an execution tree: `start`/`stop`/`reset`/context
//! calls are forwarded, and the worker's terminal state is mirrored onto
//! the container. The worker may only be replaced while the container is
//! `Ready`.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::context::Context;
use crate::error::ModuleError;
use crate::modules::{Module, ModuleMeta, ModuleRef};
use crate::state::{Lifecycle, ProcessState};

/// Wrapper driving exactly one worker module.
pub struct Container {
    cell: Lifecycle,
    worker: Mutex<ModuleRef>,
}

impl Container {
    /// Creates a container around `worker`; the worker inherits the
    /// container's context.
    pub fn new(meta: ModuleMeta, worker: ModuleRef) -> Self {
        let cell = Lifecycle::new(meta);
        let _ = worker.set_context(cell.context());
        Self {
            cell,
            worker: Mutex::new(worker),
        }
    }

    /// Handle to the current worker.
    pub fn worker(&self) -> ModuleRef {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the worker; legal only while the container is `Ready` and
    /// the replacement accepts the container's context.
    pub fn set_worker(&self, worker: ModuleRef) -> bool {
        if self.cell.state() != ProcessState::Ready {
            return false;
        }
        if !worker.set_context(self.cell.context()) {
            return false;
        }
        *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = worker;
        true
    }
}

#[async_trait]
impl Module for Container {
    fn lifecycle(&self) -> &Lifecycle {
        &self.cell
    }

    fn set_context(&self, ctx: Context) -> bool {
        let worker = self.worker();
        if !self.cell.can_set_context() || !worker.can_set_context() {
            return false;
        }
        let _ = self.cell.set_context(ctx.clone());
        worker.set_context(ctx)
    }

    fn can_set_context(&self) -> bool {
        self.cell.can_set_context() && self.worker().can_set_context()
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

        let worker = self.worker();
        if !worker.reset() {
            let _ = self.cell.change(ProcessState::Failed);
            return Err(ModuleError::ChildFailed {
                parent: self.describe(),
                child: worker.describe(),
                attempt: None,
                cause: Some(Box::new(ModuleError::Rejected {
                    module: worker.describe(),
                    from: worker.state(),
                    to: ProcessState::Ready,
                })),
            });
        }

        let run = worker.start().await;
        match worker.state() {
            ProcessState::Succeeded => {
                let _ = self.cell.change(ProcessState::Succeeded);
                Ok(())
            }
            ProcessState::Stopped => {
                if self.cell.state() != ProcessState::Stopped {
                    let _ = self.cell.change(ProcessState::Stopped);
                }
                Ok(())
            }
            _ => {
                let _ = self.cell.change(ProcessState::Failed);
                Err(ModuleError::ChildFailed {
                    parent: self.describe(),
                    child: worker.describe(),
                    attempt: None,
                    cause: run.err().map(Box::new),
                })
            }
        }
    }

    async fn stop(&self) -> Result<(), ModuleError> {
        let worker = self.worker();
        if !worker.state().is_terminal() {
            let _ = worker.stop().await;
        }
        match self.cell.state() {
            // mid-run: start() mirrors the worker's Stopped once it returns
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
        let worker_ok = self.worker().reset();
        let own = self.cell.change(ProcessState::Ready);
        own && worker_ok
    }

    fn fork(&self) -> Result<ModuleRef, ModuleError> {
        let copy = Container {
            cell: Lifecycle::new(self.meta().clone()),
            worker: Mutex::new(self.worker().fork()?),
        };
        let _ = copy.set_context(self.context().fork());
        Ok(Arc::new(copy))
    }
}
