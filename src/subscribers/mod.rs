//! Async consumers of the event stream.
//!
//! [`Subscribe`] is the extension point; [`SubscriberSet`] fans events out
//! to every subscriber through per-subscriber bounded queues;
//! [`StateTracker`] keeps a live map of module states. A demo
//! [`LogWriter`] is available behind the `logging` feature.

mod set;
mod subscribe;
mod tracker;

#[cfg(feature = "logging")]
mod log;

pub use set::SubscriberSet;
pub use subscribe::Subscribe;
pub use tracker::StateTracker;

#[cfg(feature = "logging")]
pub use log::LogWriter;
