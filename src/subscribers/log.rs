//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//!
//! ## Output format
//! ```text
//! [state] module=fetch@1.0.0 ready -> running
//! [iteration] module=retry@1.0.0 attempt=3
//! [delay] module=retry@1.0.0 attempt=3 delay_ms=100
//! [stop-requested] module=pipeline@1.0.0
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};

use super::Subscribe;

/// Simple stdout logging subscriber.
///
/// Enabled via the `logging` feature. Not intended for production use —
/// implement a custom [`Subscribe`] for structured logging or metrics.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Creates the writer.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let module = e.module.as_deref().unwrap_or("?");
        match e.kind {
            EventKind::StateChanged => {
                if let (Some(from), Some(to)) = (e.from, e.to) {
                    println!("[state] module={module} {from} -> {to}");
                }
            }
            EventKind::IterationStarting => {
                println!("[iteration] module={module} attempt={:?}", e.attempt);
            }
            EventKind::IterationDelayed => {
                println!(
                    "[delay] module={module} attempt={:?} delay_ms={:?}",
                    e.attempt, e.delay_ms
                );
            }
            EventKind::StopRequested => {
                println!("[stop-requested] module={module}");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
