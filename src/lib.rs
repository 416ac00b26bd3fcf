//! # modkit
//!
//! **modkit** is a state-machine-governed module execution framework for
//! Rust: composable units of work ("modules") with a formal lifecycle,
//! combinators for sequential pipelines and parallel groups, and retry
//! loops driven by pluggable termination strategies.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                 ┌─────────────────────────────────────────────┐
//!                 │  Module tree (one shared Context per tree)  │
//!                 │                                             │
//!                 │   Process ──► [Step, Step, Chunk, Counter]  │
//!                 │                       │         │           │
//!                 │              [Step, Step]     Step          │
//!                 └──────────────┬──────────────────────────────┘
//!                                │ every committed transition
//!                                ▼
//!                     StateHandler (sync, per module)
//!                                │ BusHandler
//!                                ▼
//!                      Bus (broadcast channel)
//!                                │ SubscriberSet::attach
//!                ┌───────────────┼───────────────┐
//!                ▼               ▼               ▼
//!          [queue S1]      [queue S2]      [queue SN]
//!           worker S1       worker S2       worker SN
//!                ▼               ▼               ▼
//!          sub1.on_event   sub2.on_event   subN.on_event
//! ```
//!
//! ### Lifecycle
//! Every module holds exactly one [`ProcessState`]; the transition table
//! is identical for every module and an illegal request is refused with
//! `false`, never raised:
//! ```text
//! Ready ──start()──► Running ──► Succeeded / Failed / Stopped
//!   ▲                │    ▲
//!   │                ▼    │ (loop delay)
//!   │             Waiting ┘
//!   └──────reset()─────── (terminal states return to Ready)
//! ```
//!
//! ## Features
//! | Area           | Description                                             | Key types / traits                       |
//! |----------------|---------------------------------------------------------|------------------------------------------|
//! | **Modules**    | Leaf steps and the base contract.                       | [`Module`], [`Step`], [`Work`], [`StepFn`] |
//! | **Composites** | Sequential, parallel, and single-worker composition.    | [`Process`], [`Chunk`], [`Container`]    |
//! | **Loops**      | Count/clock-bounded re-runs with pluggable termination. | [`Counter`], [`Repeater`], [`Timer`], [`Controller`] |
//! | **Context**    | Shared typed key/value store per tree.                  | [`Context`]                              |
//! | **Observers**  | Transition observers and the async event stream.        | [`StateHandler`], [`Bus`], [`Subscribe`] |
//! | **Errors**     | Typed failure chains for every composite.               | [`ModuleError`], [`WorkError`]           |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use modkit::{
//!     Counter, LoopPolicy, Module, ModuleMeta, Process, ProcessState, Step, WorkError,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // A pipeline of two steps sharing one context.
//!     let pipeline = Process::new(ModuleMeta::new("ingest", "1.0.0"));
//!
//!     pipeline.deploy(Arc::new(Step::from_fn(
//!         ModuleMeta::new("fetch", "1.0.0"),
//!         |ctx, _token| async move {
//!             ctx.set("rows", 42u64);
//!             Ok::<_, WorkError>(true)
//!         },
//!     )));
//!
//!     // Retry the flaky load step up to 3 times.
//!     let load = Arc::new(Step::from_fn(
//!         ModuleMeta::new("load", "1.0.0"),
//!         |ctx, _token| async move { Ok::<_, WorkError>(ctx.get_or("rows", 0u64) > 0) },
//!     ));
//!     pipeline.deploy(Arc::new(Counter::new(
//!         ModuleMeta::new("load-retry", "1.0.0"),
//!         load,
//!         3,
//!         LoopPolicy::default(),
//!     )));
//!
//!     pipeline.start().await?;
//!     assert_eq!(pipeline.state(), ProcessState::Succeeded);
//!     Ok(())
//! }
//! ```

mod context;
mod error;
mod events;
mod loops;
mod modules;
mod observers;
mod policies;
mod state;
mod subscribers;

// ---- Public re-exports ----

pub use context::Context;
pub use error::{ModuleError, WorkError};
pub use events::{Bus, Event, EventKind};
pub use loops::{ClockController, Controller, CountController, Counter, Repeater, Timer};
pub use modules::{Bundle, Chunk, Container, Module, ModuleMeta, ModuleRef, Process, Step, StepFn, Work};
pub use observers::{BusHandler, StateHandler};
pub use policies::{JitterPolicy, LoopPolicy};
pub use state::{Lifecycle, ProcessState};
pub use subscribers::{StateTracker, Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
