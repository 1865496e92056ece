//! Area shapes and containment predicates
//!
//! Each shape answers "is this world-space point inside me" in O(1), plus
//! supplies the distance and vertical span the falloff ramps are built on.
//! Complex shapes delegate containment to an injected collision probe, since
//! they require scene data the engine does not own.

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::falloff::FalloffSpec;
use crate::hooks::{CollisionProbe, ComplexShapeRef};

/// Tagged shape variants usable as paint/detect areas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AreaShape {
    Box {
        center: Vec3,
        rotation: Quat,
        half_extents: Vec3,
    },
    Sphere {
        center: Vec3,
        radius: f32,
    },
    Capsule {
        start: Vec3,
        end: Vec3,
        radius: f32,
    },
    Cone {
        apex: Vec3,
        direction: Vec3,
        height: f32,
        base_radius: f32,
    },
    /// Containment comes from a caller-supplied collision probe; the bounds
    /// only feed falloff ramps.
    Complex {
        reference_center: Vec3,
        bounds_min: Vec3,
        bounds_max: Vec3,
        shape: ComplexShapeRef,
    },
}

impl AreaShape {
    /// Containment test with an optional inflation margin.
    ///
    /// A probe error makes a complex shape contain nothing, degrading that
    /// vertex instead of failing the request.
    pub fn contains(&self, point: Vec3, margin: f32, probe: &dyn CollisionProbe) -> bool {
        match self {
            AreaShape::Box {
                center,
                rotation,
                half_extents,
            } => {
                let local = rotation.inverse() * (point - *center);
                local
                    .abs()
                    .cmple(*half_extents + Vec3::splat(margin))
                    .all()
            }
            AreaShape::Sphere { center, radius } => {
                let r = radius + margin;
                point.distance_squared(*center) <= r * r
            }
            AreaShape::Capsule { start, end, radius } => {
                segment_distance(point, *start, *end) <= radius + margin
            }
            AreaShape::Cone {
                apex,
                direction,
                height,
                base_radius,
            } => {
                let axis = direction.normalize_or_zero();
                if axis == Vec3::ZERO {
                    return false;
                }
                let v = point - *apex;
                let h = v.dot(axis);
                let full_height = height + margin;
                if h < 0.0 || h > full_height {
                    return false;
                }
                // Lateral radius grows linearly from 0 at the apex to the
                // base radius at full height.
                let lateral = (v - axis * h).length();
                let radius_at = (base_radius + margin) * (h / full_height.max(f32::EPSILON));
                lateral <= radius_at
            }
            AreaShape::Complex { shape, .. } => probe
                .point_in_complex_shape(point, *shape)
                .unwrap_or(false),
        }
    }

    /// Distance feeding the distance-based falloff ramps.
    pub fn falloff_distance(&self, point: Vec3) -> f32 {
        match self {
            AreaShape::Box { center, .. } => point.distance(*center),
            AreaShape::Sphere { center, .. } => point.distance(*center),
            AreaShape::Capsule { start, end, .. } => segment_distance(point, *start, *end),
            AreaShape::Cone { apex, .. } => point.distance(*apex),
            AreaShape::Complex {
                reference_center, ..
            } => point.distance(*reference_center),
        }
    }

    /// Vertical (world Z) span used by the gradient falloff ramps.
    pub fn vertical_span(&self) -> (f32, f32) {
        match self {
            AreaShape::Box {
                center,
                rotation,
                half_extents,
            } => {
                let m = Mat3::from_quat(*rotation);
                let half_z = m.x_axis.z.abs() * half_extents.x
                    + m.y_axis.z.abs() * half_extents.y
                    + m.z_axis.z.abs() * half_extents.z;
                (center.z - half_z, center.z + half_z)
            }
            AreaShape::Sphere { center, radius } => (center.z - radius, center.z + radius),
            AreaShape::Capsule { start, end, radius } => (
                start.z.min(end.z) - radius,
                start.z.max(end.z) + radius,
            ),
            AreaShape::Cone {
                apex,
                direction,
                height,
                base_radius,
            } => {
                let axis = direction.normalize_or_zero();
                let base = *apex + axis * *height;
                let lateral = (1.0 - axis.z * axis.z).max(0.0).sqrt();
                let lo = apex.z.min(base.z - base_radius * lateral);
                let hi = apex.z.max(base.z + base_radius * lateral);
                (lo, hi)
            }
            AreaShape::Complex {
                bounds_min,
                bounds_max,
                ..
            } => (bounds_min.z, bounds_max.z),
        }
    }
}

/// Distance from a point to a segment.
fn segment_distance(point: Vec3, a: Vec3, b: Vec3) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return point.distance(a);
    }
    let t = ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    point.distance(a + ab * t)
}

/// One paintable area: a shape, its falloff, and an extra-extent margin that
/// inflates the containment test only.
///
/// Multiple areas on a request combine with OR semantics; the first
/// containing area's falloff applies to the vertex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaintArea {
    pub shape: AreaShape,
    pub falloff: FalloffSpec,
    pub extra_extent: f32,
}

impl PaintArea {
    pub fn new(shape: AreaShape, falloff: FalloffSpec) -> Self {
        Self {
            shape,
            falloff,
            extra_extent: 0.0,
        }
    }

    pub fn with_extra_extent(mut self, extra_extent: f32) -> Self {
        self.extra_extent = extra_extent;
        self
    }

    pub fn contains(&self, point: Vec3, probe: &dyn CollisionProbe) -> bool {
        self.shape.contains(point, self.extra_extent, probe)
    }

    /// Paint-strength multiplier for a contained point.
    pub fn weight(&self, point: Vec3) -> f32 {
        self.falloff.weight_for(&self.shape, point)
    }
}
