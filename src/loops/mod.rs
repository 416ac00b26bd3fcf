//! Loop composites: re-run one wrapped module under a termination policy.
//!
//! [`Counter`] bounds by iteration count, [`Repeater`] and [`Timer`] by
//! wall-clock duration ([`Timer`] additionally reports the measured
//! elapsed time). The "when to stop" decision lives in a [`Controller`]
//! strategy, decoupled from the shared run algorithm.

mod controller;
mod counter;
mod driver;
mod repeater;
mod timer;

pub use controller::{ClockController, Controller, CountController};
pub use counter::Counter;
pub use repeater::Repeater;
pub use timer::Timer;
