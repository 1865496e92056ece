//! Per-channel color blend engine
//!
//! Turns a current vertex color plus a set of channel operations (or
//! physics-surface-indirected operations) into the new color and a changed
//! flag. All outputs are clamped to `[0, 1]`; applied amounts below the 8-bit
//! storage quantum snap to zero so float rounding cannot raise a phantom
//! changed flag.

use serde::{Deserialize, Serialize};

use crate::color::{Channel, COLOR_EPSILON, MIN_PAINT_DELTA, VertexColor};
use crate::hooks::SurfaceChannelRegistry;
use crate::mesh::{MaterialId, SurfaceTag};

/// Clamp ceiling policy for add and set operations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelLimit {
    pub max: f32,
    /// Whether a value already above `max` gets pulled down to it. Off by
    /// default, so a stricter new limit never reduces an already-saturated
    /// vertex.
    pub clamp_if_already_over_limit: bool,
}

impl ChannelLimit {
    pub fn at(max: f32) -> Self {
        Self {
            max,
            clamp_if_already_over_limit: false,
        }
    }
}

/// Operation applied to a single color channel.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum ChannelOp {
    #[default]
    None,
    Add {
        amount: f32,
        limit: Option<ChannelLimit>,
    },
    /// Direct replacement, ignoring the current value. Idempotent.
    Set {
        amount: f32,
        limit: Option<ChannelLimit>,
    },
    LerpToTarget {
        target: f32,
        strength: f32,
    },
}

impl ChannelOp {
    pub fn add(amount: f32) -> Self {
        ChannelOp::Add {
            amount,
            limit: None,
        }
    }

    pub fn set(amount: f32) -> Self {
        ChannelOp::Set {
            amount,
            limit: None,
        }
    }

    /// True when applying this op can never change a channel.
    pub fn is_noop(&self) -> bool {
        match self {
            ChannelOp::None => true,
            ChannelOp::Add { amount, .. } => amount.abs() < MIN_PAINT_DELTA,
            ChannelOp::Set { .. } => false,
            ChannelOp::LerpToTarget { strength, .. } => strength.abs() < f32::EPSILON,
        }
    }

    /// True for a full-replacement op (used by the queue supersede rule).
    pub fn is_set(&self) -> bool {
        matches!(self, ChannelOp::Set { .. })
    }

    /// New channel value after applying this op scaled by `falloff`.
    fn apply(&self, current: f32, falloff: f32) -> f32 {
        match *self {
            ChannelOp::None => current,
            ChannelOp::Add { amount, limit } => {
                let delta = snap(amount * falloff);
                if delta == 0.0 {
                    return current;
                }
                match limit {
                    Some(l) if current > l.max => {
                        if l.clamp_if_already_over_limit {
                            l.max.clamp(0.0, 1.0)
                        } else {
                            // Already over the limit: leave untouched rather
                            // than reduce a saturated vertex.
                            current
                        }
                    }
                    Some(l) => (current + delta).clamp(0.0, l.max.clamp(0.0, 1.0)),
                    None => (current + delta).clamp(0.0, 1.0),
                }
            }
            ChannelOp::Set { amount, limit } => {
                let value = snap(amount * falloff).clamp(0.0, 1.0);
                match limit {
                    Some(l) => value.min(l.max.clamp(0.0, 1.0)),
                    None => value,
                }
            }
            ChannelOp::LerpToTarget { target, strength } => {
                let t = (strength * falloff).clamp(0.0, 1.0);
                (current + (target.clamp(0.0, 1.0) - current) * t).clamp(0.0, 1.0)
            }
        }
    }
}

/// Snap sub-quantum amounts to zero.
#[inline]
fn snap(value: f32) -> f32 {
    if value.abs() < MIN_PAINT_DELTA { 0.0 } else { value }
}

/// One operation per channel, applied directly.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelOps {
    pub red: ChannelOp,
    pub green: ChannelOp,
    pub blue: ChannelOp,
    pub alpha: ChannelOp,
}

impl ChannelOps {
    pub fn single(channel: Channel, op: ChannelOp) -> Self {
        let mut ops = Self::default();
        ops.set_op(channel, op);
        ops
    }

    pub fn set_op(&mut self, channel: Channel, op: ChannelOp) {
        match channel {
            Channel::Red => self.red = op,
            Channel::Green => self.green = op,
            Channel::Blue => self.blue = op,
            Channel::Alpha => self.alpha = op,
        }
    }

    pub fn as_array(&self) -> [ChannelOp; 4] {
        [self.red, self.green, self.blue, self.alpha]
    }

    pub fn is_noop(&self) -> bool {
        self.as_array().iter().all(ChannelOp::is_noop)
    }
}

/// Physics-surface-indirected operations: each op lands on whichever channel
/// its tag is registered to on the vertex's material, so the same logical
/// "apply mud" lands on different channels on different materials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfacePaint {
    pub ops: Vec<(SurfaceTag, ChannelOp)>,
    /// Applied to channels with no matching surface registration.
    pub fallback: ChannelOp,
}

impl SurfacePaint {
    pub fn new(ops: Vec<(SurfaceTag, ChannelOp)>) -> Self {
        Self {
            ops,
            fallback: ChannelOp::None,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.fallback.is_noop() && self.ops.iter().all(|(_, op)| op.is_noop())
    }
}

/// What a paint request applies per vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PaintBrush {
    Channels(ChannelOps),
    Surfaces(SurfacePaint),
}

impl PaintBrush {
    pub fn is_noop(&self) -> bool {
        match self {
            PaintBrush::Channels(ops) => ops.is_noop(),
            PaintBrush::Surfaces(surface) => surface.is_noop(),
        }
    }

    /// True when every configured op is a full replacement.
    pub fn is_full_replacement(&self) -> bool {
        let has_set = |ops: &[ChannelOp]| {
            ops.iter().any(ChannelOp::is_set)
                && ops.iter().all(|op| op.is_set() || matches!(op, ChannelOp::None))
        };
        match self {
            PaintBrush::Channels(ops) => has_set(&ops.as_array()),
            PaintBrush::Surfaces(surface) => {
                let ops: Vec<ChannelOp> = surface.ops.iter().map(|(_, op)| *op).collect();
                has_set(&ops) && matches!(surface.fallback, ChannelOp::None | ChannelOp::Set { .. })
            }
        }
    }
}

/// Resolve a brush to four concrete channel ops for one material.
pub fn resolve_ops(
    brush: &PaintBrush,
    material: MaterialId,
    registry: &dyn SurfaceChannelRegistry,
) -> [ChannelOp; 4] {
    match brush {
        PaintBrush::Channels(ops) => ops.as_array(),
        PaintBrush::Surfaces(surface) => {
            let mut resolved = [surface.fallback; 4];
            for (tag, op) in &surface.ops {
                if let Some(channel) = registry.channel_for(material, tag) {
                    resolved[channel.index()] = *op;
                }
            }
            resolved
        }
    }
}

/// Apply four channel ops scaled by a falloff weight.
///
/// Returns the new color and whether any channel moved by more than the
/// comparison epsilon.
pub fn blend(current: VertexColor, ops: &[ChannelOp; 4], falloff: f32) -> (VertexColor, bool) {
    let mut out = current;
    for (index, op) in ops.iter().enumerate() {
        out.0[index] = op.apply(current.0[index], falloff).clamp(0.0, 1.0);
    }
    let changed = out.max_delta(&current) > COLOR_EPSILON;
    (out, changed)
}
