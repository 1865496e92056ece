//! Mesh identity and the vertex snapshot consumed by a paint or detect pass

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::color::VertexColor;

/// Generation-checked opaque handle identifying a paintable mesh instance.
///
/// Issued by the embedding engine; the core never holds an engine object
/// reference, so liveness checking stays with the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeshId {
    pub index: u32,
    pub generation: u32,
}

impl MeshId {
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

/// Material / section identifier within a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaterialId(pub u32);

/// Symbolic physics-surface tag (e.g. "Mud", "Wet") registered to a channel
/// per material, so paint operations can target a concept instead of a raw
/// channel index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurfaceTag(pub String);

impl SurfaceTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl From<&str> for SurfaceTag {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// One vertex of a snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotVertex {
    /// World-space position.
    pub position: Vec3,
    /// World-space normal.
    pub normal: Vec3,
    /// Current paint color.
    pub color: VertexColor,
    /// Owning bone, when the mesh is skeletal.
    pub bone: Option<String>,
    /// Owning material / section.
    pub material: MaterialId,
    /// Whether this vertex belongs to a cloth section.
    pub cloth: bool,
}

impl SnapshotVertex {
    pub fn new(position: Vec3, normal: Vec3, color: VertexColor) -> Self {
        Self {
            position,
            normal,
            color,
            bone: None,
            material: MaterialId(0),
            cloth: false,
        }
    }
}

/// Immutable per-call view of one mesh's paintable vertices.
///
/// Vertex order is stable and addressable by index across a paint call's read
/// and the corresponding write-back; the snapshot is read-only for the
/// duration of a computation.
#[derive(Debug, Clone, Default)]
pub struct MeshVertexSnapshot {
    vertices: Vec<SnapshotVertex>,
}

impl MeshVertexSnapshot {
    pub fn new(vertices: Vec<SnapshotVertex>) -> Self {
        Self { vertices }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    #[inline]
    pub fn vertices(&self) -> &[SnapshotVertex] {
        &self.vertices
    }

    /// Copy of the current color buffer, in vertex order.
    pub fn colors(&self) -> Vec<VertexColor> {
        self.vertices.iter().map(|v| v.color).collect()
    }
}
