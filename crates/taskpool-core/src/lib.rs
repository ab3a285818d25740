//! taskpool-core: route-driven hydration and resource synchronization.
//!
//! A location becomes a [`route::Route`]; the [`plan()`] function reads a
//! [`snapshot::Snapshot`] of the model and decides which resources to
//! fetch; the [`dispatch`] module executes those commands and folds
//! replies back into the model, discarding stale ones through
//! [`staleness`] tokens and merging per-project fan-outs with [`join`].
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` types in the library, `anyhow::Result` where a
//!   file is read.
//! - **Logging**: `tracing` macros with structured fields (`token`,
//!   `route`, `project`).

pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gesture;
pub mod join;
pub mod model;
pub mod plan;
pub mod resource;
pub mod route;
pub mod snapshot;
pub mod staleness;
pub mod toast;

/// Milliseconds on the host's monotonic clock.
pub type Millis = u64;

pub use plan::plan;
