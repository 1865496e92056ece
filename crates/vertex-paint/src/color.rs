//! Working and packed color representations for vertex color buffers
//!
//! Computation runs on normalized `f32` channels; storage and write-back use
//! 8-bit RGBA quads, so anything smaller than the storage quantum is snapped
//! to zero before it can produce a phantom "changed" flag.

use serde::{Deserialize, Serialize};

/// Applied amounts below this normalized magnitude snap to zero - just above
/// the 1/255 quantum of the 8-bit storage format.
pub const MIN_PAINT_DELTA: f32 = 0.005;

/// Per-channel tolerance used for the changed-flag comparison.
pub const COLOR_EPSILON: f32 = 1e-6;

/// One of the four paint-amount slots of a vertex color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Channel {
    Red = 0,
    Green = 1,
    Blue = 2,
    Alpha = 3,
}

impl Channel {
    /// All channels in tie-break order (red before green before blue before alpha).
    pub const ALL: [Channel; 4] = [Channel::Red, Channel::Green, Channel::Blue, Channel::Alpha];

    /// Index into a `[_; 4]` channel array.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Normalized RGBA working color, one `f32` in `[0, 1]` per channel.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VertexColor(pub [f32; 4]);

impl VertexColor {
    pub const TRANSPARENT: VertexColor = VertexColor([0.0; 4]);

    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self([r, g, b, a])
    }

    #[inline]
    pub fn channel(&self, channel: Channel) -> f32 {
        self.0[channel.index()]
    }

    #[inline]
    pub fn set_channel(&mut self, channel: Channel, value: f32) {
        self.0[channel.index()] = value.clamp(0.0, 1.0);
    }

    /// True when every channel is effectively zero (an unpainted vertex).
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|c| c.abs() < COLOR_EPSILON)
    }

    /// Largest per-channel difference against `other`.
    pub fn max_delta(&self, other: &VertexColor) -> f32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f32::max)
    }

    pub fn to_packed(&self) -> PackedColor {
        PackedColor {
            r: quantize(self.0[0]),
            g: quantize(self.0[1]),
            b: quantize(self.0[2]),
            a: quantize(self.0[3]),
        }
    }

    pub fn from_packed(packed: PackedColor) -> Self {
        Self([
            packed.r as f32 / 255.0,
            packed.g as f32 / 255.0,
            packed.b as f32 / 255.0,
            packed.a as f32 / 255.0,
        ])
    }
}

#[inline]
fn quantize(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// 8-bit RGBA quad as stored in serialized per-LOD color buffers.
///
/// `Pod`-castable so whole buffers can be handed off as byte slices for
/// upload or persistence.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    bytemuck::Pod,
    bytemuck::Zeroable,
)]
#[repr(C)]
pub struct PackedColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// View a packed color buffer as raw bytes for upload or persistence.
pub fn packed_as_bytes(colors: &[PackedColor]) -> &[u8] {
    bytemuck::cast_slice(colors)
}
