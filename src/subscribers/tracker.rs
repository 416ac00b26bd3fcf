//! # Stateful subscriber tracking the latest state of every module.
//!
//! [`StateTracker`] listens to [`EventKind::StateChanged`] events and keeps
//! the most recently committed state per module. Useful for dashboards and
//! for identifying modules still mid-run after a stop request.
//!
//! ## Example
//! ```no_run
//! # use std::sync::Arc;
//! # use modkit::{Bus, StateTracker, SubscriberSet, Subscribe};
//! # async fn demo() {
//! let bus = Bus::new(1024);
//! let tracker = Arc::new(StateTracker::new());
//! let set = Arc::new(SubscriberSet::new(vec![tracker.clone() as Arc<dyn Subscribe>]));
//! set.attach(&bus);
//!
//! // Later, inspect the tree:
//! for (module, state) in tracker.snapshot() {
//!     println!("{module}: {state}");
//! }
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::state::ProcessState;

/// Tracks the latest committed state per module.
///
/// Thread-safe and cloneable; clones share the same map.
#[derive(Clone, Default)]
pub struct StateTracker {
    inner: Arc<RwLock<HashMap<Arc<str>, ProcessState>>>,
}

impl StateTracker {
    /// Creates a new, empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest observed state of `module`, if any transition was seen.
    pub fn state_of(&self, module: &str) -> Option<ProcessState> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(module)
            .copied()
    }

    /// Snapshot of every tracked module and its latest state, sorted by
    /// module description.
    pub fn snapshot(&self) -> Vec<(String, ProcessState)> {
        let mut out: Vec<(String, ProcessState)> = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        out.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Modules whose latest state is `Running` or `Waiting`.
    pub fn active(&self) -> Vec<String> {
        self.snapshot()
            .into_iter()
            .filter(|(_, s)| s.is_active())
            .map(|(m, _)| m)
            .collect()
    }
}

#[async_trait]
impl super::Subscribe for StateTracker {
    async fn on_event(&self, event: &Event) {
        if event.kind != EventKind::StateChanged {
            return;
        }
        if let (Some(module), Some(to)) = (event.module.clone(), event.to) {
            self.inner
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(module, to);
        }
    }

    fn name(&self) -> &'static str {
        "state-tracker"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::events::Bus;
    use crate::modules::{Module, ModuleMeta, Step};
    use crate::observers::BusHandler;
    use crate::subscribers::{Subscribe, SubscriberSet};

    #[tokio::test]
    async fn keeps_latest_state_per_module() {
        let tracker = StateTracker::new();

        let ev = |to| {
            Event::now(EventKind::StateChanged)
                .with_module("a@1.0")
                .with_transition(ProcessState::Ready, to)
        };
        tracker.on_event(&ev(ProcessState::Running)).await;
        tracker.on_event(&ev(ProcessState::Succeeded)).await;
        tracker
            .on_event(
                &Event::now(EventKind::StateChanged)
                    .with_module("b@1.0")
                    .with_transition(ProcessState::Ready, ProcessState::Running),
            )
            .await;
        // non-transition events are ignored
        tracker
            .on_event(&Event::now(EventKind::StopRequested).with_module("a@1.0"))
            .await;

        assert_eq!(tracker.state_of("a@1.0"), Some(ProcessState::Succeeded));
        assert_eq!(tracker.active(), vec!["b@1.0".to_string()]);
        assert_eq!(tracker.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn tracks_a_live_module_run() {
        let bus = Bus::new(64);
        let tracker = Arc::new(StateTracker::new());
        let set = Arc::new(SubscriberSet::new(vec![
            tracker.clone() as Arc<dyn Subscribe>
        ]));
        set.attach(&bus);

        let step = Step::from_fn(ModuleMeta::new("job", "1.0.0"), |_ctx, _t| async {
            Ok(true)
        });
        step.add_state_handler(Arc::new(BusHandler::new(bus.clone())));
        step.start().await.expect("run");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            tracker.state_of("job@1.0.0"),
            Some(ProcessState::Succeeded)
        );
    }
}
