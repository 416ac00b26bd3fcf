//! # Shared configuration for the loop composites.
//!
//! [`LoopPolicy`] carries the knobs common to `Counter`, `Repeater`, and
//! `Timer`; the loop-specific bound (iteration count or wall-clock
//! duration) lives on the owning loop.
//!
//! ## Field semantics
//! - `delay`: pause between iterations (`Duration::ZERO` = none)
//! - `jitter`: randomization applied to `delay` per iteration
//! - `ignore_errors`: a raised child error counts as a failed attempt and
//!   the loop continues (fatal errors still abort)
//! - `can_quit`: exit as soon as the wrapped module succeeds, instead of
//!   always running to the bound

use std::time::Duration;

use crate::policies::JitterPolicy;

/// Configuration shared by the loop composites.
#[derive(Clone, Copy, Debug)]
pub struct LoopPolicy {
    /// Pause between iterations.
    pub delay: Duration,
    /// Randomization applied to `delay`.
    pub jitter: JitterPolicy,
    /// Continue looping when an iteration raises a (non-fatal) error.
    pub ignore_errors: bool,
    /// Exit as soon as the wrapped module succeeds.
    pub can_quit: bool,
}

impl Default for LoopPolicy {
    /// Returns a policy with no delay, no jitter, errors aborting the
    /// loop, and early exit on success.
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            jitter: JitterPolicy::None,
            ignore_errors: false,
            can_quit: true,
        }
    }
}

impl LoopPolicy {
    /// Returns a new policy with the given delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns a new policy with the given jitter.
    pub fn with_jitter(mut self, jitter: JitterPolicy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns a new policy with `ignore_errors` set.
    pub fn ignore_errors(mut self, ignore: bool) -> Self {
        self.ignore_errors = ignore;
        self
    }

    /// Returns a new policy with `can_quit` set.
    pub fn can_quit(mut self, can_quit: bool) -> Self {
        self.can_quit = can_quit;
        self
    }

    /// Computes the next inter-iteration pause (jitter applied).
    pub fn next_delay(&self) -> Duration {
        self.jitter.apply(self.delay)
    }
}
