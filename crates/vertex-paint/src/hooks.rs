//! Integration points supplied by the embedding engine
//!
//! The engine has no notion of actors, components, physics scenes, or a
//! renderer. Everything it needs from the outside world comes in through
//! these traits: vertex snapshots, skeletal topology, the physics-surface to
//! channel registry, and collision probes for complex shapes and
//! line-of-sight checks.

use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::color::Channel;
use crate::mesh::{MaterialId, MeshId, MeshVertexSnapshot, SurfaceTag};

/// Failure of an injected collision/occlusion probe.
///
/// Probe failures degrade locally (the affected vertex counts as a failed
/// condition) instead of aborting the whole request.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe timed out")]
    Timeout,
    #[error("probe unavailable: {0}")]
    Unavailable(String),
}

/// Reference to caller-owned collision data backing a complex area shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComplexShapeRef(pub u64);

/// Produces the immutable vertex view for a mesh at computation time.
pub trait SnapshotProvider: Send + Sync {
    /// Number of paintable vertices, used for synchronous request validation.
    fn vertex_count(&self, mesh: MeshId) -> usize;

    /// Fresh snapshot for one computation, or `None` when the mesh is gone.
    fn fetch_snapshot(&self, mesh: MeshId) -> Option<MeshVertexSnapshot>;
}

/// Skeletal topology lookup for bone-restricted passes.
pub trait BoneSubsetResolver: Send + Sync {
    /// Vertex indices owned by any of the named bones, or `None` when
    /// topology is unavailable (the pass then visits every vertex).
    fn resolve_bone_subset(&self, mesh: MeshId, bones: &[String]) -> Option<Vec<u32>>;
}

/// Material registry mapping physics-surface tags to color channels.
pub trait SurfaceChannelRegistry: Send + Sync {
    /// Channel the surface tag is registered to on this material, if any.
    fn channel_for(&self, material: MaterialId, surface: &SurfaceTag) -> Option<Channel>;

    /// All surface registrations on a material, for per-surface statistics.
    fn surfaces_for(&self, material: MaterialId) -> Vec<(SurfaceTag, Channel)>;
}

/// Scene collision queries for complex shapes and line-of-sight conditions.
pub trait CollisionProbe: Send + Sync {
    fn line_of_sight(&self, from: Vec3, to: Vec3, ignore: &[MeshId]) -> Result<bool, ProbeError>;

    fn point_in_complex_shape(
        &self,
        point: Vec3,
        shape: ComplexShapeRef,
    ) -> Result<bool, ProbeError>;
}

/// Registry with no surface registrations.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptySurfaceRegistry;

impl SurfaceChannelRegistry for EmptySurfaceRegistry {
    fn channel_for(&self, _material: MaterialId, _surface: &SurfaceTag) -> Option<Channel> {
        None
    }

    fn surfaces_for(&self, _material: MaterialId) -> Vec<(SurfaceTag, Channel)> {
        Vec::new()
    }
}

/// Probe for scenes without collision data: sight lines are always clear and
/// complex shapes contain nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnobstructedProbe;

impl CollisionProbe for UnobstructedProbe {
    fn line_of_sight(&self, _from: Vec3, _to: Vec3, _ignore: &[MeshId]) -> Result<bool, ProbeError> {
        Ok(true)
    }

    fn point_in_complex_shape(
        &self,
        _point: Vec3,
        _shape: ComplexShapeRef,
    ) -> Result<bool, ProbeError> {
        Ok(false)
    }
}

/// Resolver for meshes without skeletal topology.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBoneTopology;

impl BoneSubsetResolver for NoBoneTopology {
    fn resolve_bone_subset(&self, _mesh: MeshId, _bones: &[String]) -> Option<Vec<u32>> {
        None
    }
}

/// Borrowed collaborator bundle for the duration of one pass.
#[derive(Clone, Copy)]
pub struct PassHooks<'a> {
    pub bones: &'a dyn BoneSubsetResolver,
    pub surfaces: &'a dyn SurfaceChannelRegistry,
    pub collision: &'a dyn CollisionProbe,
}

/// Owning collaborator bundle for long-lived consumers (the task scheduler).
#[derive(Clone)]
pub struct EngineHooks {
    pub snapshots: Arc<dyn SnapshotProvider>,
    pub bones: Arc<dyn BoneSubsetResolver>,
    pub surfaces: Arc<dyn SurfaceChannelRegistry>,
    pub collision: Arc<dyn CollisionProbe>,
}

impl EngineHooks {
    pub fn new(snapshots: Arc<dyn SnapshotProvider>) -> Self {
        Self {
            snapshots,
            bones: Arc::new(NoBoneTopology),
            surfaces: Arc::new(EmptySurfaceRegistry),
            collision: Arc::new(UnobstructedProbe),
        }
    }

    pub fn with_bones(mut self, bones: Arc<dyn BoneSubsetResolver>) -> Self {
        self.bones = bones;
        self
    }

    pub fn with_surfaces(mut self, surfaces: Arc<dyn SurfaceChannelRegistry>) -> Self {
        self.surfaces = surfaces;
        self
    }

    pub fn with_collision(mut self, collision: Arc<dyn CollisionProbe>) -> Self {
        self.collision = collision;
        self
    }

    /// Borrowed view handed to a pass.
    pub fn pass_hooks(&self) -> PassHooks<'_> {
        PassHooks {
            bones: self.bones.as_ref(),
            surfaces: self.surfaces.as_ref(),
            collision: self.collision.as_ref(),
        }
    }
}
