//! Runtime events emitted by modules and the loop composites.
//!
//! [`Event`] values describe committed state transitions, loop iteration
//! scheduling, and stop requests; [`Bus`] broadcasts them to any number of
//! subscribers without blocking the publisher.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
