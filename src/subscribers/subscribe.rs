//! # Event subscriber trait.
//!
//! [`Subscribe`] plugs custom event handling (logging, metrics, tracing)
//! into the runtime. Each subscriber gets a dedicated worker task and a
//! per-subscriber bounded queue; a slow subscriber only ever affects its
//! own queue.
//!
//! ## Overflow behavior
//! 1. The new event is dropped for this subscriber only.
//! 2. A warning naming the subscriber is printed.
//! 3. Other subscribers are unaffected.

use async_trait::async_trait;

use crate::events::Event;

/// Async event consumer for runtime observability.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; do not panic (panics are caught and the
///   event is lost for this subscriber).
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    ///
    /// Called from a dedicated worker task, never in the publisher's
    /// context. Events arrive in FIFO order per subscriber.
    async fn on_event(&self, event: &Event);

    /// Subscriber name used in overflow/panic warnings.
    ///
    /// Prefer short, descriptive names (e.g., "metrics", "audit").
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred queue capacity for this subscriber (clamped to 1).
    ///
    /// Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
