//! # Shared run algorithm for the loop composites.
//!
//! One driver serves `Counter`, `Repeater`, and `Timer`; only the
//! [`Controller`] strategy differs. Per iteration the wrapped module is
//! reset and started; between iterations the loop parks in `Waiting` for
//! the configured (jittered) delay, cancellably.
//!
//! ## Error policy
//! - A raised child error aborts the loop into `Failed` unless the policy
//!   sets `ignore_errors` — fatal errors abort regardless.
//! - Plain child failure (`Failed` state without a raised error) never
//!   aborts; it counts as a failed attempt.
//! - A stop request exits the loop immediately, leaving `Stopped`.
//!
//! ## Verdict
//! `Succeeded` when `can_quit` is off (the loop ran its bound) or when the
//! final iteration succeeded; otherwise `Failed` with the controller's
//! bound error.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::error::ModuleError;
use crate::events::{Bus, Event, EventKind};
use crate::modules::ModuleRef;
use crate::policies::LoopPolicy;
use crate::state::{Lifecycle, ProcessState};

use super::Controller;

/// Poison-tolerant lock helper for the loops' small sync mutexes.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn publish(bus: Option<&Bus>, ev: Event) {
    if let Some(bus) = bus {
        bus.publish(ev);
    }
}

/// Runs the shared loop algorithm to a terminal state.
///
/// The caller has already validated its configuration; this function owns
/// the `Ready -> Running` arm and every transition after it.
pub(crate) async fn drive<C: Controller>(
    cell: &Lifecycle,
    child: &ModuleRef,
    policy: &LoopPolicy,
    ctl: &Mutex<C>,
    token: &CancellationToken,
    bus: Option<&Bus>,
) -> Result<(), ModuleError> {
    let parent = cell.meta().to_string();
    if !cell.change_from(ProcessState::Ready, ProcessState::Running) {
        return Err(ModuleError::Rejected {
            module: parent,
            from: cell.state(),
            to: ProcessState::Running,
        });
    }

    lock(ctl).begin();
    let mut attempt: u64 = 0;
    let mut last_ok = false;
    let mut last_err: Option<ModuleError> = None;

    loop {
        if token.is_cancelled() {
            break;
        }
        if !lock(ctl).accept() {
            break;
        }

        attempt += 1;
        publish(
            bus,
            Event::now(EventKind::IterationStarting)
                .with_module(parent.clone())
                .with_attempt(attempt),
        );

        if !child.reset() {
            let _ = cell.change(ProcessState::Failed);
            return Err(ModuleError::ChildFailed {
                parent,
                child: child.describe(),
                attempt: Some(attempt),
                cause: Some(Box::new(ModuleError::Rejected {
                    module: child.describe(),
                    from: child.state(),
                    to: ProcessState::Ready,
                })),
            });
        }

        let run = child.start().await;
        last_ok = child.state() == ProcessState::Succeeded;
        last_err = match run {
            Ok(()) => None,
            Err(e) => {
                if e.is_fatal() || !policy.ignore_errors {
                    let _ = cell.change(ProcessState::Failed);
                    return Err(ModuleError::ChildFailed {
                        parent,
                        child: child.describe(),
                        attempt: Some(attempt),
                        cause: Some(Box::new(e)),
                    });
                }
                Some(e)
            }
        };

        if token.is_cancelled() {
            break;
        }
        if policy.can_quit && last_ok {
            break;
        }

        let delay = policy.next_delay();
        if !delay.is_zero() {
            publish(
                bus,
                Event::now(EventKind::IterationDelayed)
                    .with_module(parent.clone())
                    .with_attempt(attempt)
                    .with_delay(delay),
            );
            if !cell.change(ProcessState::Waiting) {
                break;
            }
            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            tokio::select! {
                _ = &mut sleep => {}
                _ = token.cancelled() => {}
            }
            if token.is_cancelled() || !cell.change(ProcessState::Running) {
                break;
            }
        }

        lock(ctl).advance();
    }

    lock(ctl).finish();

    if token.is_cancelled() {
        if cell.state() != ProcessState::Stopped {
            let _ = cell.change(ProcessState::Stopped);
        }
        return Ok(());
    }

    if !policy.can_quit || last_ok {
        let _ = cell.change(ProcessState::Succeeded);
        Ok(())
    } else {
        let _ = cell.change(ProcessState::Failed);
        Err(lock(ctl).bound_error(cell.meta(), attempt, last_err))
    }
}

/// Shared stop path: request cancellation, forward to the wrapped module,
/// and let the driver commit `Stopped` at the loop boundary.
pub(crate) async fn request_stop(
    cell: &Lifecycle,
    child: &ModuleRef,
    token: CancellationToken,
    bus: Option<&Bus>,
) -> Result<(), ModuleError> {
    publish(
        bus,
        Event::now(EventKind::StopRequested).with_module(cell.meta().to_string()),
    );
    token.cancel();
    if !child.state().is_terminal() {
        let _ = child.stop().await;
    }
    match cell.state() {
        ProcessState::Running | ProcessState::Waiting | ProcessState::Stopped => Ok(()),
        ProcessState::Ready => {
            let _ = cell.change(ProcessState::Stopped);
            Ok(())
        }
        from @ (ProcessState::Succeeded | ProcessState::Failed) => Err(ModuleError::Rejected {
            module: cell.meta().to_string(),
            from,
            to: ProcessState::Stopped,
        }),
    }
}

/// Shared reset path: rearm the loop, its wrapped module, and the token.
pub(crate) fn reset_loop(
    cell: &Lifecycle,
    child: &ModuleRef,
    token: &Mutex<CancellationToken>,
) -> bool {
    if !cell.can_change(ProcessState::Ready) {
        return false;
    }
    let child_ok = child.reset();
    let own = cell.change(ProcessState::Ready);
    *lock(token) = CancellationToken::new();
    own && child_ok
}
