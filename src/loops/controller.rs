//! # Loop termination strategies.
//!
//! A [`Controller`] owns a loop's termination/progress state, decoupling
//! "when to stop" from "what to run": the shared run algorithm calls
//! [`begin`](Controller::begin) before the first iteration,
//! [`accept`](Controller::accept) ahead of each one,
//! [`advance`](Controller::advance) after it, and
//! [`finish`](Controller::finish) once the loop exits.
//!
//! Two strategies ship with the crate:
//! - [`CountController`] — a fixed iteration budget;
//! - [`ClockController`] — a wall-clock budget measured from loop start
//!   (on the tokio clock, so paused-time tests stay deterministic).

use std::time::Duration;

use tokio::time::Instant;

use crate::error::ModuleError;
use crate::modules::ModuleMeta;

/// Strategy deciding when a loop composite stops iterating.
pub trait Controller: Send + 'static {
    /// Called once when the loop starts; resets progress state.
    fn begin(&mut self);

    /// True if another iteration may run.
    fn accept(&self) -> bool;

    /// Records one completed iteration.
    fn advance(&mut self);

    /// Called once when the loop exits, before the verdict.
    fn finish(&mut self);

    /// Maps bound exhaustion without the required success onto the
    /// loop-specific error.
    fn bound_error(
        &self,
        module: &ModuleMeta,
        attempts: u64,
        last: Option<ModuleError>,
    ) -> ModuleError;
}

/// Bounds a loop by a fixed iteration count.
#[derive(Debug)]
pub struct CountController {
    limit: u64,
    used: u64,
}

impl CountController {
    /// Creates a controller allowing `limit` iterations per run.
    pub fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    /// The configured iteration budget.
    pub fn limit(&self) -> u64 {
        self.limit
    }
}

impl Controller for CountController {
    fn begin(&mut self) {
        self.used = 0;
    }

    fn accept(&self) -> bool {
        self.used < self.limit
    }

    fn advance(&mut self) {
        self.used += 1;
    }

    fn finish(&mut self) {}

    fn bound_error(
        &self,
        module: &ModuleMeta,
        attempts: u64,
        last: Option<ModuleError>,
    ) -> ModuleError {
        ModuleError::AttemptsExhausted {
            module: module.to_string(),
            attempts,
            last: last.map(Box::new),
        }
    }
}

/// Bounds a loop by wall-clock time measured from loop start.
#[derive(Debug)]
pub struct ClockController {
    bound: Duration,
    started: Option<Instant>,
    elapsed: Option<Duration>,
}

impl ClockController {
    /// Creates a controller allowing iterations until `bound` has elapsed.
    pub fn new(bound: Duration) -> Self {
        Self {
            bound,
            started: None,
            elapsed: None,
        }
    }

    /// The configured wall-clock budget.
    pub fn bound(&self) -> Duration {
        self.bound
    }

    /// Duration measured over the last completed run, if any.
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }
}

impl Controller for ClockController {
    fn begin(&mut self) {
        self.started = Some(Instant::now());
        self.elapsed = None;
    }

    fn accept(&self) -> bool {
        match self.started {
            Some(started) => started.elapsed() < self.bound,
            None => false,
        }
    }

    fn advance(&mut self) {}

    fn finish(&mut self) {
        self.elapsed = self.started.map(|s| s.elapsed());
    }

    fn bound_error(
        &self,
        module: &ModuleMeta,
        attempts: u64,
        last: Option<ModuleError>,
    ) -> ModuleError {
        ModuleError::TimeLimitExceeded {
            module: module.to_string(),
            limit: self.bound,
            elapsed: self.elapsed.unwrap_or_default(),
            attempts,
            last: last.map(Box::new),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_controller_budget() {
        let mut ctl = CountController::new(2);
        ctl.begin();
        assert!(ctl.accept());
        ctl.advance();
        assert!(ctl.accept());
        ctl.advance();
        assert!(!ctl.accept());

        // a fresh run restores the budget
        ctl.begin();
        assert!(ctl.accept());
    }

    #[test]
    fn count_controller_maps_to_attempts_exhausted() {
        let ctl = CountController::new(3);
        let err = ctl.bound_error(&ModuleMeta::new("retry", "1.0.0"), 3, None);
        assert!(matches!(err, ModuleError::AttemptsExhausted { attempts: 3, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn clock_controller_expires_with_the_clock() {
        let mut ctl = ClockController::new(Duration::from_millis(100));
        assert!(!ctl.accept(), "not accepting before begin");

        ctl.begin();
        assert!(ctl.accept());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!ctl.accept());

        ctl.finish();
        assert!(ctl.elapsed().unwrap_or_default() >= Duration::from_millis(150));
    }
}
