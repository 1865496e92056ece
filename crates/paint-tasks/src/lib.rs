//! Per-mesh serialized scheduling for paint and detect tasks
//!
//! Wraps the [`vertex_paint`] calculation engine with FIFO task queues: one
//! task per mesh executes at a time, different meshes run concurrently, and
//! full-replacement submissions supersede queued work for their mesh.
//! Results are delivered through per-task handles.

pub mod config;
pub mod error;
mod queue;
pub mod scheduler;

pub use config::*;
pub use error::*;
pub use scheduler::*;
