//! Background tasks and their progress streams.
//!
//! Every request becomes one task: a spawned future paired 1:1 with a
//! progress stream, addressed by an opaque id. The consumer takes the
//! stream once and reads until `end_stream`.

mod orchestrator;
mod registry;

pub use orchestrator::TaskOrchestrator;
pub use registry::{TaskKind, TaskRegistry};
