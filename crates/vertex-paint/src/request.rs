//! Paint and detect request descriptions and synchronous validation
//!
//! A request is an immutable value: mode, brush, conditions, bone filter and
//! result-inclusion flags. Validation runs at submission time so malformed
//! requests are rejected before they ever occupy a queue slot.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blend::PaintBrush;
use crate::color::PackedColor;
use crate::conditions::PaintCondition;
use crate::falloff::FalloffSpec;
use crate::shapes::{AreaShape, PaintArea};

/// How an entire-mesh paint selects its vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntireMeshCoverage {
    /// Percentage of vertices to paint, 0-100. 100 paints every vertex.
    Percent(f32),
    /// Per-vertex probability for vertices within a sphere around `center`;
    /// vertices outside the sphere are skipped.
    InSubArea {
        center: Vec3,
        radius: f32,
        probability: f32,
    },
}

impl Default for EntireMeshCoverage {
    fn default() -> Self {
        EntireMeshCoverage::Percent(100.0)
    }
}

/// The operation mode of a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RequestKind {
    /// Paint around a point with a radius and falloff.
    PaintAtLocation {
        location: Vec3,
        radius: f32,
        falloff: FalloffSpec,
    },
    /// Paint every vertex inside one or more areas (OR semantics).
    PaintWithinArea { areas: Vec<PaintArea> },
    /// Paint the whole mesh, optionally a seeded random subset.
    PaintEntireMesh {
        coverage: EntireMeshCoverage,
        /// Echoed in the result; drawn fresh when `None` so recipients can
        /// replay the same selection.
        seed: Option<u64>,
    },
    /// Replace the whole color buffer (snippet restore, load-from-save).
    ApplyColorBuffer { colors: Vec<PackedColor> },
    /// Closest vertex to a location, with an optional averaging radius.
    DetectClosestVertex { location: Vec3, average_radius: f32 },
    /// Full color buffer plus whatever statistics are requested.
    DetectAllVertices,
    /// Colors and statistics of the vertices inside one or more areas.
    DetectWithinArea { areas: Vec<PaintArea> },
}

impl RequestKind {
    pub fn is_detect(&self) -> bool {
        matches!(
            self,
            RequestKind::DetectClosestVertex { .. }
                | RequestKind::DetectAllVertices
                | RequestKind::DetectWithinArea { .. }
        )
    }
}

/// Per-channel comparison against a reference color array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareSpec {
    /// Reference colors, one per vertex.
    pub reference: Vec<PackedColor>,
    /// Normalized per-channel error tolerance.
    pub tolerance: f32,
    /// Skip reference entries that are all-zero (unpainted background).
    pub skip_empty_reference: bool,
}

/// Which derived data to include in the result. Some of it costs an extra
/// full pass, so everything beyond the color buffer is opt-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncludeFlags {
    /// Return the full post-operation color buffer.
    pub vertex_colors: bool,
    /// Per-channel counts and averages at or above `stats_threshold`.
    pub channel_stats: bool,
    pub stats_threshold: f32,
    /// Average color of the vertices inside the area / radius.
    pub average_in_area: bool,
    /// Color interpolated from the nearest vertices to the exact hit point.
    pub estimated_color_at_hit: bool,
    /// Per-surface statistics and the most dominant surface.
    pub dominant_surface: bool,
    pub compare: Option<CompareSpec>,
}

impl Default for IncludeFlags {
    fn default() -> Self {
        Self {
            vertex_colors: true,
            channel_stats: false,
            stats_threshold: 0.1,
            average_in_area: false,
            estimated_color_at_hit: false,
            dominant_surface: false,
            compare: None,
        }
    }
}

/// Scheduling options carried on the request.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TaskOptions {
    /// Exempt this submission from the per-mesh queue-depth cap (bulk
    /// load-from-save scenarios).
    pub bypass_queue_limit: bool,
}

/// A complete paint or detect request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub kind: RequestKind,
    pub brush: PaintBrush,
    pub conditions: Vec<PaintCondition>,
    /// Restrict the pass to vertices owned by these bones, when skeletal
    /// topology is available.
    pub bone_filter: Vec<String>,
    pub include: IncludeFlags,
    pub options: TaskOptions,
}

impl Request {
    pub fn paint(kind: RequestKind, brush: PaintBrush) -> Self {
        Self {
            kind,
            brush,
            conditions: Vec::new(),
            bone_filter: Vec::new(),
            include: IncludeFlags::default(),
            options: TaskOptions::default(),
        }
    }

    pub fn detect(kind: RequestKind) -> Self {
        Self::paint(kind, PaintBrush::Channels(Default::default()))
    }

    pub fn with_conditions(mut self, conditions: Vec<PaintCondition>) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn with_include(mut self, include: IncludeFlags) -> Self {
        self.include = include;
        self
    }

    /// A paint request that provably changes nothing. Completes immediately
    /// with `any_color_changed = false` instead of walking the mesh.
    pub fn is_noop(&self) -> bool {
        match &self.kind {
            RequestKind::ApplyColorBuffer { .. } => false,
            kind if kind.is_detect() => false,
            _ => self.brush.is_noop(),
        }
    }

    /// Full-replacement requests make queued (not yet running) work for the
    /// same mesh moot and may drop it at submission time.
    pub fn supersedes_queued(&self) -> bool {
        match &self.kind {
            RequestKind::ApplyColorBuffer { .. } => true,
            RequestKind::PaintEntireMesh { .. } => self.brush.is_full_replacement(),
            _ => false,
        }
    }

    /// Synchronous validation against the target mesh's vertex count.
    pub fn validate(&self, vertex_count: usize) -> Result<(), RequestError> {
        if vertex_count == 0 {
            return Err(RequestError::EmptySnapshot);
        }
        match &self.kind {
            RequestKind::PaintAtLocation { radius, .. } => {
                if *radius <= 0.0 {
                    return Err(RequestError::InvalidRadius(*radius));
                }
            }
            RequestKind::PaintWithinArea { areas } | RequestKind::DetectWithinArea { areas } => {
                if areas.is_empty() {
                    return Err(RequestError::NoAreas);
                }
                for area in areas {
                    validate_shape(&area.shape)?;
                }
            }
            RequestKind::PaintEntireMesh { coverage, .. } => match coverage {
                EntireMeshCoverage::Percent(percent) => {
                    if !(0.0..=100.0).contains(percent) {
                        return Err(RequestError::InvalidCoverage(*percent));
                    }
                }
                EntireMeshCoverage::InSubArea {
                    radius,
                    probability,
                    ..
                } => {
                    if *radius <= 0.0 {
                        return Err(RequestError::InvalidRadius(*radius));
                    }
                    if !(0.0..=1.0).contains(probability) {
                        return Err(RequestError::InvalidCoverage(*probability * 100.0));
                    }
                }
            },
            RequestKind::ApplyColorBuffer { colors } => {
                if colors.len() != vertex_count {
                    return Err(RequestError::BufferLengthMismatch {
                        got: colors.len(),
                        expected: vertex_count,
                    });
                }
            }
            RequestKind::DetectClosestVertex { average_radius, .. } => {
                if *average_radius < 0.0 {
                    return Err(RequestError::InvalidRadius(*average_radius));
                }
            }
            RequestKind::DetectAllVertices => {}
        }
        if let Some(compare) = &self.include.compare {
            if compare.reference.len() != vertex_count {
                return Err(RequestError::BufferLengthMismatch {
                    got: compare.reference.len(),
                    expected: vertex_count,
                });
            }
        }
        Ok(())
    }
}

fn validate_shape(shape: &AreaShape) -> Result<(), RequestError> {
    let ok = match shape {
        AreaShape::Box { half_extents, .. } => half_extents.cmpgt(Vec3::ZERO).all(),
        AreaShape::Sphere { radius, .. } => *radius > 0.0,
        AreaShape::Capsule { radius, .. } => *radius > 0.0,
        AreaShape::Cone {
            height,
            base_radius,
            ..
        } => *height > 0.0 && *base_radius > 0.0,
        AreaShape::Complex {
            bounds_min,
            bounds_max,
            ..
        } => bounds_max.cmpge(*bounds_min).all(),
    };
    if ok {
        Ok(())
    } else {
        Err(RequestError::MalformedShape(format!("{shape:?}")))
    }
}

/// Request-level validation failures, rejected synchronously at submission
/// and never enqueued.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("target mesh has no paintable vertices")]
    EmptySnapshot,
    #[error("no areas configured for a within-area request")]
    NoAreas,
    #[error("malformed shape parameters: {0}")]
    MalformedShape(String),
    #[error("radius must be positive, got {0}")]
    InvalidRadius(f32),
    #[error("coverage must be within 0-100 percent, got {0}")]
    InvalidCoverage(f32),
    #[error("color buffer length {got} does not match vertex count {expected}")]
    BufferLengthMismatch { got: usize, expected: usize },
}
