//! # Module lifecycle states and the transition table.
//!
//! [`ProcessState`] is a closed enumeration; exactly one state is held per
//! module at any time and it is the sole source of truth for which
//! operations are currently legal.
//!
//! ## Transition table
//! ```text
//! from \ to   Ready Running Waiting Succeeded Failed Stopped
//! Ready         ✓      ✓       –        –       –       ✓
//! Running       –      ✓       ✓        ✓       ✓       ✓
//! Waiting       –      ✓       ✓        –       –       ✓
//! Succeeded     ✓      –       –        ✓       ✓       –
//! Failed        ✓      –       –        ✓       ✓       –
//! Stopped       ✓      –       –        –       –       ✓
//! ```
//!
//! An illegal request is rejected, never raised: callers probe with
//! [`ProcessState::can_transition`] and check the boolean result of a
//! commit. Terminal states (`Succeeded`, `Failed`, `Stopped`) are not dead
//! ends; each returns to `Ready` via an explicit reset.

use std::fmt;

/// Lifecycle state of a module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProcessState {
    /// Armed and runnable; the only state `start` is accepted from.
    Ready,
    /// Actively executing work or driving children.
    Running,
    /// Parked between loop iterations (delay sleep).
    Waiting,
    /// Finished with a successful outcome.
    Succeeded,
    /// Finished with a failed outcome.
    Failed,
    /// Terminated on request before reaching a verdict.
    Stopped,
}

impl ProcessState {
    /// Pure lookup in the transition table: true if a module in `self` may
    /// move to `to`.
    pub fn can_transition(self, to: ProcessState) -> bool {
        use ProcessState::*;
        matches!(
            (self, to),
            (Ready, Ready | Running | Stopped)
                | (Running, Running | Waiting | Succeeded | Failed | Stopped)
                | (Waiting, Running | Waiting | Stopped)
                | (Succeeded, Ready | Succeeded | Failed)
                | (Failed, Ready | Succeeded | Failed)
                | (Stopped, Ready | Stopped)
        )
    }

    /// True for `Succeeded`, `Failed`, and `Stopped` — states from which
    /// only `Ready` (via reset) is reachable.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProcessState::Succeeded | ProcessState::Failed | ProcessState::Stopped
        )
    }

    /// True while the module is executing or parked mid-run
    /// (`Running` or `Waiting`); context swaps are refused here.
    pub fn is_active(self) -> bool {
        matches!(self, ProcessState::Running | ProcessState::Waiting)
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            ProcessState::Ready => "ready",
            ProcessState::Running => "running",
            ProcessState::Waiting => "waiting",
            ProcessState::Succeeded => "succeeded",
            ProcessState::Failed => "failed",
            ProcessState::Stopped => "stopped",
        }
    }

    /// All states, in declaration order. Handy for exhaustive checks.
    pub const ALL: [ProcessState; 6] = [
        ProcessState::Ready,
        ProcessState::Running,
        ProcessState::Waiting,
        ProcessState::Succeeded,
        ProcessState::Failed,
        ProcessState::Stopped,
    ];
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

#[cfg(test)]
mod tests {
    use super::ProcessState::{self, *};

    #[test]
    fn transition_table_is_exact() {
        // One row per source state, columns in ProcessState::ALL order.
        let expected: [(ProcessState, [bool; 6]); 6] = [
            (Ready, [true, true, false, false, false, true]),
            (Running, [false, true, true, true, true, true]),
            (Waiting, [false, true, true, false, false, true]),
            (Succeeded, [true, false, false, true, true, false]),
            (Failed, [true, false, false, true, true, false]),
            (Stopped, [true, false, false, false, false, true]),
        ];

        for (from, row) in expected {
            for (to, allowed) in ProcessState::ALL.into_iter().zip(row) {
                assert_eq!(
                    from.can_transition(to),
                    allowed,
                    "{from} -> {to} should be {allowed}"
                );
            }
        }
    }

    #[test]
    fn terminal_states_reach_only_ready_besides_peers() {
        for s in ProcessState::ALL {
            if s.is_terminal() {
                assert!(s.can_transition(Ready), "{s} must reset to Ready");
                assert!(!s.can_transition(Running), "{s} must not resume");
                assert!(!s.can_transition(Waiting), "{s} must not park");
            }
        }
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(Ready.as_label(), "ready");
        assert_eq!(Waiting.as_label(), "waiting");
        assert_eq!(Stopped.to_string(), "stopped");
    }

    #[test]
    fn active_states() {
        assert!(Running.is_active());
        assert!(Waiting.is_active());
        assert!(!Ready.is_active());
        assert!(!Succeeded.is_active());
    }
}
