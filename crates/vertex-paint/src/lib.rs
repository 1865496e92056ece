//! Runtime per-vertex color paint and detect engine
//!
//! This crate computes new per-vertex colors and derived statistics for a
//! mesh, given a declarative request:
//! - [`shapes`] / [`falloff`] - area containment predicates and paint-strength falloff
//! - [`blend`] - per-channel add/set/lerp blending with limit policies
//! - [`conditions`] - per-vertex boolean predicates with fallback strengths
//! - [`pass`] - the paint and detect orchestrators
//! - [`stats`] - per-channel and per-surface result aggregation
//! - [`hooks`] - collaborator traits supplied by the embedding engine
//!
//! The engine never touches renderer or scene state: it consumes an immutable
//! [`mesh::MeshVertexSnapshot`] and produces a [`result::TaskResult`].

pub mod blend;
pub mod color;
pub mod conditions;
pub mod falloff;
pub mod hooks;
pub mod mesh;
pub mod pass;
pub mod request;
pub mod result;
pub mod sampling;
pub mod shapes;
pub mod stats;

pub use blend::*;
pub use color::*;
pub use conditions::*;
pub use falloff::*;
pub use hooks::*;
pub use mesh::*;
pub use pass::*;
pub use request::*;
pub use result::*;
pub use sampling::*;
pub use shapes::*;
pub use stats::*;
