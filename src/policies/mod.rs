//! Loop configuration policies.
//!
//! [`LoopPolicy`] bundles the knobs shared by every loop composite
//! (inter-iteration delay, jitter, error handling, early exit);
//! [`JitterPolicy`] randomizes the delay to desynchronize sibling loops.

mod jitter;
mod loop_policy;

pub use jitter::JitterPolicy;
pub use loop_policy::LoopPolicy;
