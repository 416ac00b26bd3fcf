//! Per-module state-change observers.
//!
//! [`StateHandler`] is the synchronous observer contract delivered on
//! every committed transition; [`BusHandler`] bridges transitions onto an
//! event [`Bus`](crate::events::Bus) for the async subscriber stack.

mod handler;

pub use handler::{BusHandler, StateHandler};
