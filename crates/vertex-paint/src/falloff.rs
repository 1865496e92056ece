//! Distance and height based paint-strength falloff
//!
//! A falloff spec turns a vertex's position relative to its containing shape
//! into a `[0, 1]` multiplier on the paint amount. A weight of 0 is a valid
//! outcome - the vertex was still visited, it just received no paint.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::shapes::AreaShape;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FalloffKind {
    /// 1.0 at `range_min`, decaying to 0 at `range_max`.
    #[default]
    Outward,
    /// 0 at `range_min`, rising to 1.0 at `range_max`.
    Inward,
    /// Peaks at `scale_from_distance`, decaying toward both range ends.
    Spherical,
    /// Height-based within the shape's vertical span, 1.0 at the top.
    GradientUpward,
    /// Height-based within the shape's vertical span, 1.0 at the bottom.
    GradientDownward,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FalloffSpec {
    pub kind: FalloffKind,
    /// How strongly the ramp applies: 0 paints at full strength everywhere,
    /// 1 applies the full ramp.
    pub strength: f32,
    /// Distance at which the `Spherical` ramp peaks.
    pub scale_from_distance: f32,
    pub range_min: f32,
    pub range_max: f32,
}

impl Default for FalloffSpec {
    fn default() -> Self {
        Self {
            kind: FalloffKind::Outward,
            strength: 1.0,
            scale_from_distance: 0.0,
            range_min: 0.0,
            range_max: 0.0,
        }
    }
}

impl FalloffSpec {
    pub fn outward(range_min: f32, range_max: f32) -> Self {
        Self {
            kind: FalloffKind::Outward,
            range_min,
            range_max,
            ..Self::default()
        }
    }

    /// No falloff: full strength everywhere inside the shape.
    pub fn flat() -> Self {
        Self {
            strength: 0.0,
            ..Self::default()
        }
    }

    /// Substitute a range when the caller left it unset (`max <= min`).
    pub fn or_range(self, range_min: f32, range_max: f32) -> Self {
        if self.range_max > self.range_min {
            self
        } else {
            Self {
                range_min,
                range_max,
                ..self
            }
        }
    }

    /// Weight for a point relative to its containing shape.
    pub fn weight_for(&self, shape: &AreaShape, point: Vec3) -> f32 {
        let ramp = match self.kind {
            FalloffKind::Outward => ramp_down(shape.falloff_distance(point), self.range_min, self.range_max),
            FalloffKind::Inward => {
                1.0 - ramp_down(shape.falloff_distance(point), self.range_min, self.range_max)
            }
            FalloffKind::Spherical => {
                self.spherical_ramp(shape.falloff_distance(point))
            }
            FalloffKind::GradientUpward => height_fraction(shape, point.z),
            FalloffKind::GradientDownward => 1.0 - height_fraction(shape, point.z),
        };
        // Strength lerps the ramp against full weight.
        let strength = self.strength.clamp(0.0, 1.0);
        (1.0 + (ramp - 1.0) * strength).clamp(0.0, 1.0)
    }

    fn spherical_ramp(&self, distance: f32) -> f32 {
        let peak = self.scale_from_distance.clamp(self.range_min, self.range_max.max(self.range_min));
        if distance <= peak {
            if peak - self.range_min <= f32::EPSILON {
                1.0
            } else {
                ((distance - self.range_min) / (peak - self.range_min)).clamp(0.0, 1.0)
            }
        } else if self.range_max - peak <= f32::EPSILON {
            0.0
        } else {
            (1.0 - (distance - peak) / (self.range_max - peak)).clamp(0.0, 1.0)
        }
    }
}

/// Linear 1 -> 0 ramp between `min` and `max`; degenerate ranges become a
/// hard cutoff at `min`.
fn ramp_down(distance: f32, min: f32, max: f32) -> f32 {
    if max <= min {
        if distance <= min { 1.0 } else { 0.0 }
    } else if distance <= min {
        1.0
    } else if distance >= max {
        0.0
    } else {
        1.0 - (distance - min) / (max - min)
    }
}

/// Fraction of the shape's vertical span below `z`: 0 at the bottom, 1 at
/// the top.
fn height_fraction(shape: &AreaShape, z: f32) -> f32 {
    let (lo, hi) = shape.vertical_span();
    if hi - lo <= f32::EPSILON {
        1.0
    } else {
        ((z - lo) / (hi - lo)).clamp(0.0, 1.0)
    }
}
