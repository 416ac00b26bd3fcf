//! Error types used by the module framework and by user-supplied work.
//!
//! This module defines two main error enums:
//!
//! - [`WorkError`] — errors raised by user work inside a [`Step`](crate::Step).
//! - [`ModuleError`] — errors raised by the framework while driving modules.
//!
//! Illegal state transitions are deliberately **not** errors: probing and
//! committing transitions returns `bool` (see [`Lifecycle`](crate::Lifecycle)).
//! `start`/`stop` called from a state where the transition is impossible
//! surface [`ModuleError::Rejected`] so the `Result` channel stays honest.

use std::time::Duration;

use thiserror::Error;

use crate::state::ProcessState;

/// # Errors produced by user work inside a step.
///
/// A step body reports ordinary failure by returning `Ok(false)`; a
/// `WorkError` is the "exception" channel. `Fatal` errors are never retried
/// by the loop composites, even under `ignore_errors`.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WorkError {
    /// Execution failed but may succeed if retried.
    #[error("execution failed: {reason}")]
    Failed {
        /// The underlying failure message.
        reason: String,
    },

    /// Non-recoverable error; loop composites abort on it unconditionally.
    #[error("fatal error (no retry): {reason}")]
    Fatal {
        /// The underlying failure message.
        reason: String,
    },

    /// Work observed cancellation and gave up cooperatively.
    #[error("work canceled")]
    Canceled,
}

impl WorkError {
    /// Shorthand for [`WorkError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        WorkError::Failed {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`WorkError::Fatal`].
    pub fn fatal(reason: impl Into<String>) -> Self {
        WorkError::Fatal {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkError::Failed { .. } => "work_failed",
            WorkError::Fatal { .. } => "work_fatal",
            WorkError::Canceled => "work_canceled",
        }
    }

    /// Indicates whether the error is safe to retry.
    ///
    /// Returns `true` for [`WorkError::Failed`], `false` otherwise.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkError::Failed { .. })
    }
}

/// # Errors produced by the module framework.
///
/// Composite errors keep their cause chain: a `Process` wraps the first
/// failing child ([`ModuleError::ChildFailed`]), a `Chunk` keeps every
/// concurrent failure ([`ModuleError::Aggregated`]), and the loop family
/// reports bound exhaustion with the last observed cause.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ModuleError {
    /// `start`/`stop` was requested from a state where the transition is
    /// impossible per the transition table.
    #[error("'{module}': transition {from:?} -> {to:?} rejected")]
    Rejected {
        /// The module whose transition was refused.
        module: String,
        /// State the module was in when the request arrived.
        from: ProcessState,
        /// Requested target state.
        to: ProcessState,
    },

    /// A step's work raised an error (as opposed to reporting plain failure).
    #[error("step '{module}' failed")]
    Step {
        /// The step that failed.
        module: String,
        /// The raised cause.
        #[source]
        cause: WorkError,
    },

    /// A composite's child ended in `Failed` (sequential composites and
    /// loop iterations; fail-fast, so only the first cause is carried).
    #[error("'{parent}': child '{child}' failed")]
    ChildFailed {
        /// The composite that observed the failure.
        parent: String,
        /// The child that failed.
        child: String,
        /// Loop iteration the failure happened on, when applicable.
        attempt: Option<u64>,
        /// The child's failure cause, if its run surfaced one.
        #[source]
        cause: Option<Box<ModuleError>>,
    },

    /// Several concurrently running children failed; every cause is kept.
    #[error("'{parent}': {} of {total} children failed", .causes.len())]
    Aggregated {
        /// The parallel composite that observed the failures.
        parent: String,
        /// Number of children that were run.
        total: usize,
        /// One entry per failed child, in completion order.
        causes: Vec<ModuleError>,
    },

    /// A wall-clock bound was exhausted without the required success.
    #[error("'{module}': time limit {limit:?} exceeded after {attempts} attempts (ran {elapsed:?})")]
    TimeLimitExceeded {
        /// The loop that ran out of time.
        module: String,
        /// The configured bound.
        limit: Duration,
        /// Measured duration of the whole loop.
        elapsed: Duration,
        /// Iterations completed before the bound expired.
        attempts: u64,
        /// Cause of the last failed iteration, if one was raised.
        #[source]
        last: Option<Box<ModuleError>>,
    },

    /// An iteration-count bound was exhausted without the required success.
    #[error("'{module}': {attempts} attempts exhausted without success")]
    AttemptsExhausted {
        /// The loop that ran out of attempts.
        module: String,
        /// Iterations that were run.
        attempts: u64,
        /// Cause of the last failed iteration, if one was raised.
        #[source]
        last: Option<Box<ModuleError>>,
    },

    /// A stop request's grace period expired with children still running.
    #[error("'{module}': stop grace {grace:?} exceeded; outstanding: {outstanding:?}")]
    StopGraceExceeded {
        /// The composite that gave up waiting.
        module: String,
        /// The configured grace period.
        grace: Duration,
        /// Children that had not reached a terminal state in time.
        outstanding: Vec<String>,
    },

    /// A module was configured with values it cannot run with.
    #[error("'{module}': invalid configuration: {reason}")]
    InvalidConfig {
        /// The misconfigured module.
        module: String,
        /// What was wrong.
        reason: String,
    },

    /// A deep copy was requested of a module that does not support it.
    #[error("'{module}' cannot be copied")]
    Uncopyable {
        /// The module that refused the copy.
        module: String,
    },
}

impl ModuleError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ModuleError::Rejected { .. } => "transition_rejected",
            ModuleError::Step { .. } => "step_failed",
            ModuleError::ChildFailed { .. } => "child_failed",
            ModuleError::Aggregated { .. } => "aggregated_failure",
            ModuleError::TimeLimitExceeded { .. } => "time_limit_exceeded",
            ModuleError::AttemptsExhausted { .. } => "attempts_exhausted",
            ModuleError::StopGraceExceeded { .. } => "stop_grace_exceeded",
            ModuleError::InvalidConfig { .. } => "invalid_config",
            ModuleError::Uncopyable { .. } => "uncopyable",
        }
    }

    /// True if this error (or its step cause) is fatal and must not be
    /// retried by a loop, regardless of `ignore_errors`.
    pub fn is_fatal(&self) -> bool {
        match self {
            ModuleError::Step { cause, .. } => matches!(cause, WorkError::Fatal { .. }),
            ModuleError::ChildFailed {
                cause: Some(inner), ..
            } => inner.is_fatal(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(WorkError::failed("boom").is_retryable());
        assert!(!WorkError::fatal("dead").is_retryable());
        assert!(!WorkError::Canceled.is_retryable());
    }

    #[test]
    fn fatal_propagates_through_child_failed() {
        let step = ModuleError::Step {
            module: "leaf@1.0".into(),
            cause: WorkError::fatal("dead"),
        };
        assert!(step.is_fatal());

        let wrapped = ModuleError::ChildFailed {
            parent: "loop@1.0".into(),
            child: "leaf@1.0".into(),
            attempt: Some(2),
            cause: Some(Box::new(step)),
        };
        assert!(wrapped.is_fatal());

        let plain = ModuleError::ChildFailed {
            parent: "loop@1.0".into(),
            child: "leaf@1.0".into(),
            attempt: None,
            cause: None,
        };
        assert!(!plain.is_fatal());
    }

    #[test]
    fn aggregated_display_counts_causes() {
        let err = ModuleError::Aggregated {
            parent: "chunk@1.0".into(),
            total: 3,
            causes: vec![
                ModuleError::ChildFailed {
                    parent: "chunk@1.0".into(),
                    child: "a@1.0".into(),
                    attempt: None,
                    cause: None,
                },
                ModuleError::ChildFailed {
                    parent: "chunk@1.0".into(),
                    child: "b@1.0".into(),
                    attempt: None,
                    cause: None,
                },
            ],
        };
        assert_eq!(err.to_string(), "'chunk@1.0': 2 of 3 children failed");
        assert_eq!(err.as_label(), "aggregated_failure");
    }
}
