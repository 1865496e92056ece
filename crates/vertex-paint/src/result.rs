//! Results delivered on task completion
//!
//! Every outcome short of a synchronous validation error arrives through the
//! same completion path: `successful` plus an optional reason code, so
//! callers have one place to check.

use std::time::Duration;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::color::{Channel, PackedColor, VertexColor};
use crate::mesh::SurfaceTag;

/// Why a dispatched task did not complete normally. Carried inside the
/// result, never a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TaskFailure {
    #[error("snapshot was empty or unavailable at execution time")]
    SnapshotUnavailable,
    #[error("replacement color buffer length did not match the snapshot")]
    BufferLengthMismatch,
    #[error("dropped while queued by a later full-replacement request")]
    Superseded,
}

/// Rollup for one channel.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ChannelStat {
    /// Vertices at or above the requested threshold.
    pub count_at_or_above: usize,
    /// Those vertices as a percentage of the whole buffer, 0-100.
    pub percent_at_or_above: f32,
    /// Average value among the vertices at or above the threshold.
    pub average_at_or_above: f32,
    /// Average value across the whole buffer.
    pub average: f32,
}

/// Per-channel statistics over the post-operation color buffer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelStats {
    pub threshold: f32,
    pub red: ChannelStat,
    pub green: ChannelStat,
    pub blue: ChannelStat,
    pub alpha: ChannelStat,
}

impl ChannelStats {
    pub fn get(&self, channel: Channel) -> &ChannelStat {
        match channel {
            Channel::Red => &self.red,
            Channel::Green => &self.green,
            Channel::Blue => &self.blue,
            Channel::Alpha => &self.alpha,
        }
    }
}

/// Rollup for one registered physics surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceStat {
    pub surface: SurfaceTag,
    pub channel: Channel,
    pub count_at_or_above: usize,
    pub average: f32,
}

/// The surface with the highest average value across the buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DominantSurface {
    pub surface: SurfaceTag,
    pub channel: Channel,
    pub average: f32,
}

/// Closest vertex to a queried location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosestVertex {
    pub index: u32,
    pub position: Vec3,
    pub normal: Vec3,
    pub color: VertexColor,
    pub distance: f32,
}

/// Everything a completed paint or detect task can report back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub successful: bool,
    pub failure: Option<TaskFailure>,
    /// True iff at least one vertex's post-operation color differs from its
    /// pre-operation color.
    pub any_color_changed: bool,
    /// Full post-operation buffer, when requested.
    pub colors: Option<Vec<PackedColor>>,
    pub channel_stats: Option<ChannelStats>,
    pub surface_stats: Vec<SurfaceStat>,
    pub dominant_surface: Option<DominantSurface>,
    pub average_color: Option<VertexColor>,
    pub estimated_color_at_hit: Option<VertexColor>,
    pub closest_vertex: Option<ClosestVertex>,
    /// Percentage of vertices matching the comparison reference, 0-100.
    pub compare_match_percent: Option<f32>,
    /// Seed used for random-subset selection, echoed for replay.
    pub seed: Option<u64>,
    pub duration: Duration,
}

impl Default for TaskResult {
    fn default() -> Self {
        Self {
            successful: true,
            failure: None,
            any_color_changed: false,
            colors: None,
            channel_stats: None,
            surface_stats: Vec::new(),
            dominant_surface: None,
            average_color: None,
            estimated_color_at_hit: None,
            closest_vertex: None,
            compare_match_percent: None,
            seed: None,
            duration: Duration::ZERO,
        }
    }
}

impl TaskResult {
    /// Failed outcome delivered through the normal completion path.
    pub fn failed(failure: TaskFailure) -> Self {
        Self {
            successful: false,
            failure: Some(failure),
            ..Self::default()
        }
    }

    /// Fast successful completion for a request that changes nothing.
    pub fn no_op() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result_reports_reason() {
        let result = TaskResult::failed(TaskFailure::SnapshotUnavailable);
        assert!(!result.successful);
        assert_eq!(result.failure, Some(TaskFailure::SnapshotUnavailable));
        assert!(!result.any_color_changed);
    }

    #[test]
    fn test_no_op_is_successful() {
        let result = TaskResult::no_op();
        assert!(result.successful);
        assert!(result.failure.is_none());
        assert!(!result.any_color_changed);
    }
}
