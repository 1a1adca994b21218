//! Worker system: job/result lifecycle and descriptor merging.
//!
//! Core components:
//! - `lifecycle`: `JobLifecycle` / `ResultLifecycle` status sequencing
//! - `descriptor`: `DescriptorMerger` for incremental result metadata
//! - `worker`: `Worker` binding one job at a time, plus shared `WorkerDeps`

pub mod descriptor;
pub mod lifecycle;
pub mod worker;

pub use descriptor::DescriptorMerger;
pub use lifecycle::{JobLifecycle, ResultLifecycle};
pub use worker::{Worker, WorkerDeps};
