//! Per-vertex paint conditions
//!
//! A condition chain attenuates rather than excludes: every condition
//! independently returns 1.0 on pass or its own fallback strength on fail,
//! and the evaluator multiplies the results together. A failed probe counts
//! as a failed condition, never a fatal error.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::color::{Channel, VertexColor};
use crate::hooks::{CollisionProbe, ProbeError};
use crate::mesh::{MaterialId, MeshId};

/// What happens to a vertex when its condition fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FallbackMode {
    /// Multiply the fallback strength into the vertex weight; the vertex is
    /// still visited and still counts for statistics.
    #[default]
    Attenuate,
    /// Drop the vertex from the pass entirely.
    Exclude,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConditionFallback {
    pub strength: f32,
    pub mode: FallbackMode,
}

impl Default for ConditionFallback {
    fn default() -> Self {
        Self {
            strength: 0.0,
            mode: FallbackMode::Attenuate,
        }
    }
}

impl ConditionFallback {
    pub fn strength(strength: f32) -> Self {
        Self {
            strength,
            mode: FallbackMode::Attenuate,
        }
    }

    pub fn exclude() -> Self {
        Self {
            strength: 0.0,
            mode: FallbackMode::Exclude,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZSide {
    Above,
    Below,
}

/// Independent boolean predicate evaluated per vertex.
///
/// Dot thresholds compare against the cosine of the angle between the tested
/// directions: -1 accepts everything, 1 requires exact alignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PaintCondition {
    /// Vertex normal against a reference direction.
    NormalDotDirection {
        direction: Vec3,
        min_dot: f32,
        fallback: ConditionFallback,
    },
    /// Vertex normal against the direction from the vertex toward a point.
    DirectionTowardPoint {
        point: Vec3,
        min_dot: f32,
        fallback: ConditionFallback,
    },
    /// Vertex position within a cone opening from an origin.
    WithinDirectionCone {
        origin: Vec3,
        direction: Vec3,
        min_dot: f32,
        fallback: ConditionFallback,
    },
    /// Vertex world Z above or below a threshold.
    AboveBelowZ {
        z: f32,
        side: ZSide,
        fallback: ConditionFallback,
    },
    /// Existing value of one channel within a range.
    ColorInRange {
        channel: Channel,
        min: f32,
        max: f32,
        fallback: ConditionFallback,
    },
    /// Vertex owned by one of the named bones.
    OnBone {
        bones: Vec<String>,
        fallback: ConditionFallback,
    },
    /// Vertex belonging to one of the listed materials.
    OnMaterial {
        materials: Vec<MaterialId>,
        fallback: ConditionFallback,
    },
    /// Unobstructed sight line from a point to the vertex, via the injected
    /// collision probe.
    LineOfSight {
        from: Vec3,
        ignore: Vec<MeshId>,
        fallback: ConditionFallback,
    },
}

impl PaintCondition {
    fn fallback(&self) -> ConditionFallback {
        match self {
            PaintCondition::NormalDotDirection { fallback, .. }
            | PaintCondition::DirectionTowardPoint { fallback, .. }
            | PaintCondition::WithinDirectionCone { fallback, .. }
            | PaintCondition::AboveBelowZ { fallback, .. }
            | PaintCondition::ColorInRange { fallback, .. }
            | PaintCondition::OnBone { fallback, .. }
            | PaintCondition::OnMaterial { fallback, .. }
            | PaintCondition::LineOfSight { fallback, .. } => *fallback,
        }
    }

    fn passes(&self, ctx: &VertexContext<'_>, probe: &dyn CollisionProbe) -> Result<bool, ProbeError> {
        let passed = match self {
            PaintCondition::NormalDotDirection { direction, min_dot, .. } => {
                ctx.normal.normalize_or_zero().dot(direction.normalize_or_zero()) >= *min_dot
            }
            PaintCondition::DirectionTowardPoint { point, min_dot, .. } => {
                let toward = (*point - ctx.position).normalize_or_zero();
                ctx.normal.normalize_or_zero().dot(toward) >= *min_dot
            }
            PaintCondition::WithinDirectionCone {
                origin,
                direction,
                min_dot,
                ..
            } => {
                let toward = (ctx.position - *origin).normalize_or_zero();
                toward.dot(direction.normalize_or_zero()) >= *min_dot
            }
            PaintCondition::AboveBelowZ { z, side, .. } => match side {
                ZSide::Above => ctx.position.z >= *z,
                ZSide::Below => ctx.position.z <= *z,
            },
            PaintCondition::ColorInRange { channel, min, max, .. } => {
                let value = ctx.color.channel(*channel);
                value >= *min && value <= *max
            }
            PaintCondition::OnBone { bones, .. } => match ctx.bone {
                Some(bone) => bones.iter().any(|name| name == bone),
                None => false,
            },
            PaintCondition::OnMaterial { materials, .. } => materials.contains(&ctx.material),
            PaintCondition::LineOfSight { from, ignore, .. } => {
                probe.line_of_sight(*from, ctx.position, ignore)?
            }
        };
        Ok(passed)
    }
}

/// Everything a condition can inspect on one vertex.
#[derive(Debug, Clone, Copy)]
pub struct VertexContext<'a> {
    pub position: Vec3,
    pub normal: Vec3,
    pub color: VertexColor,
    pub bone: Option<&'a str>,
    pub material: MaterialId,
}

/// Multiply all condition multipliers together.
///
/// `None` means an `Exclude`-mode condition failed and the vertex is skipped
/// entirely. With no configured conditions the multiplier is 1.0.
pub fn evaluate(
    conditions: &[PaintCondition],
    ctx: &VertexContext<'_>,
    probe: &dyn CollisionProbe,
) -> Option<f32> {
    let mut weight = 1.0f32;
    for condition in conditions {
        // A probe error degrades to a failed condition.
        let passed = condition.passes(ctx, probe).unwrap_or(false);
        if passed {
            continue;
        }
        let fallback = condition.fallback();
        match fallback.mode {
            FallbackMode::Attenuate => weight *= fallback.strength.clamp(0.0, 1.0),
            FallbackMode::Exclude => return None,
        }
    }
    Some(weight)
}
