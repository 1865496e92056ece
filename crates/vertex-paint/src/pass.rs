//! Paint and detect orchestrators
//!
//! One pass per request: resolve the vertex subset, walk the candidate
//! vertices (containment, falloff, conditions, blend), then aggregate the
//! requested statistics. Vertices outside every configured area are never
//! blended or condition-evaluated; no-op requests return without a walk.

use std::time::Instant;

use glam::Vec3;
use tracing::debug;

use crate::blend;
use crate::color::{COLOR_EPSILON, PackedColor, VertexColor};
use crate::conditions::{self, VertexContext};
use crate::falloff::FalloffSpec;
use crate::hooks::PassHooks;
use crate::mesh::{MeshId, MeshVertexSnapshot};
use crate::request::{EntireMeshCoverage, IncludeFlags, Request, RequestKind};
use crate::result::{ChannelStats, ClosestVertex, DominantSurface, SurfaceStat, TaskFailure, TaskResult};
use crate::sampling::{self, SubsetSampler};
use crate::shapes::{AreaShape, PaintArea};
use crate::stats::{StatsAggregator, average_color, compare_match_percent};

/// Run one paint or detect request against a snapshot.
///
/// This is the whole calculation: pure CPU work apart from the injected
/// collision probes. The result carries the task duration.
pub fn run_request(
    mesh: MeshId,
    request: &Request,
    snapshot: &MeshVertexSnapshot,
    hooks: &PassHooks<'_>,
) -> TaskResult {
    let started = Instant::now();
    let mut result = dispatch(mesh, request, snapshot, hooks);
    result.duration = started.elapsed();
    result
}

fn dispatch(
    mesh: MeshId,
    request: &Request,
    snapshot: &MeshVertexSnapshot,
    hooks: &PassHooks<'_>,
) -> TaskResult {
    if snapshot.is_empty() {
        return TaskResult::failed(TaskFailure::SnapshotUnavailable);
    }
    if request.is_noop() {
        debug!(?mesh, "no-op paint request, skipping vertex pass");
        return TaskResult::no_op();
    }

    match &request.kind {
        RequestKind::PaintAtLocation {
            location,
            radius,
            falloff,
        } => paint_at_location(mesh, request, snapshot, hooks, *location, *radius, *falloff),
        RequestKind::PaintWithinArea { areas } => {
            paint_within_area(mesh, request, snapshot, hooks, areas)
        }
        RequestKind::PaintEntireMesh { coverage, seed } => {
            paint_entire_mesh(mesh, request, snapshot, hooks, coverage, *seed)
        }
        RequestKind::ApplyColorBuffer { colors } => {
            apply_color_buffer(request, snapshot, hooks, colors)
        }
        RequestKind::DetectClosestVertex {
            location,
            average_radius,
        } => detect_closest(request, snapshot, hooks, *location, *average_radius),
        RequestKind::DetectAllVertices => detect_all(request, snapshot, hooks),
        RequestKind::DetectWithinArea { areas } => {
            detect_within_area(mesh, request, snapshot, hooks, areas)
        }
    }
}

/// Candidate indices for the per-vertex walk, honoring the bone filter when
/// skeletal topology is available.
fn candidate_indices(
    mesh: MeshId,
    request: &Request,
    snapshot: &MeshVertexSnapshot,
    hooks: &PassHooks<'_>,
) -> Vec<u32> {
    if !request.bone_filter.is_empty() {
        if let Some(subset) = hooks.bones.resolve_bone_subset(mesh, &request.bone_filter) {
            debug!(
                ?mesh,
                vertices = subset.len(),
                "restricting pass to bone subset"
            );
            return subset
                .into_iter()
                .filter(|&index| (index as usize) < snapshot.len())
                .collect();
        }
    }
    (0..snapshot.len() as u32).collect()
}

/// Shared state of one painting walk.
struct PaintPass<'a> {
    request: &'a Request,
    snapshot: &'a MeshVertexSnapshot,
    hooks: &'a PassHooks<'a>,
    colors: Vec<VertexColor>,
    any_changed: bool,
    /// Hit location and averaging radius for location-based extras.
    hit: Option<(Vec3, f32)>,
    want_closest: bool,
}

impl<'a> PaintPass<'a> {
    fn new(request: &'a Request, snapshot: &'a MeshVertexSnapshot, hooks: &'a PassHooks<'a>) -> Self {
        Self {
            request,
            snapshot,
            hooks,
            colors: snapshot.colors(),
            any_changed: false,
            hit: None,
            want_closest: false,
        }
    }

    /// Blend one candidate vertex at the given area weight.
    fn apply(&mut self, index: u32, area_weight: f32) {
        let vertex = &self.snapshot.vertices()[index as usize];
        let ctx = VertexContext {
            position: vertex.position,
            normal: vertex.normal,
            color: vertex.color,
            bone: vertex.bone.as_deref(),
            material: vertex.material,
        };
        let Some(condition_weight) =
            conditions::evaluate(&self.request.conditions, &ctx, self.hooks.collision)
        else {
            return;
        };
        let ops = blend::resolve_ops(&self.request.brush, vertex.material, self.hooks.surfaces);
        let (new, changed) = blend::blend(vertex.color, &ops, area_weight * condition_weight);
        if changed {
            self.colors[index as usize] = new;
            self.any_changed = true;
        }
    }

    fn finish(self) -> TaskResult {
        let include = &self.request.include;
        let mut result = TaskResult {
            any_color_changed: self.any_changed,
            ..TaskResult::default()
        };

        let (channel_stats, surface_stats, dominant) =
            build_stats(include, self.snapshot, &self.colors, self.hooks, None);
        result.channel_stats = channel_stats;
        result.surface_stats = surface_stats;
        result.dominant_surface = dominant;

        if let Some(compare) = &include.compare {
            result.compare_match_percent = compare_match_percent(&self.colors, compare);
        }

        if let Some((location, radius)) = self.hit {
            if include.average_in_area && radius > 0.0 {
                let radius_sq = radius * radius;
                result.average_color = average_color(
                    self.snapshot
                        .vertices()
                        .iter()
                        .zip(self.colors.iter())
                        .filter(|(vertex, _)| {
                            vertex.position.distance_squared(location) <= radius_sq
                        })
                        .map(|(_, color)| *color),
                );
            }
            if self.want_closest {
                result.closest_vertex = closest_vertex(self.snapshot, &self.colors, location);
            }
            if include.estimated_color_at_hit {
                result.estimated_color_at_hit =
                    estimate_color_at(self.snapshot, &self.colors, location);
            }
        }

        if include.vertex_colors {
            result.colors = Some(pack_colors(&self.colors));
        }
        result
    }
}

fn paint_at_location(
    mesh: MeshId,
    request: &Request,
    snapshot: &MeshVertexSnapshot,
    hooks: &PassHooks<'_>,
    location: Vec3,
    radius: f32,
    falloff: FalloffSpec,
) -> TaskResult {
    // An unset falloff range defaults to the area of effect.
    let falloff = falloff.or_range(0.0, radius);
    let area = PaintArea::new(
        AreaShape::Sphere {
            center: location,
            radius,
        },
        falloff,
    );
    let candidates = candidate_indices(mesh, request, snapshot, hooks);
    let mut pass = PaintPass::new(request, snapshot, hooks);
    pass.hit = Some((location, radius));
    for index in candidates {
        let position = snapshot.vertices()[index as usize].position;
        if !area.contains(position, hooks.collision) {
            continue;
        }
        pass.apply(index, area.weight(position));
    }
    pass.finish()
}

fn paint_within_area(
    mesh: MeshId,
    request: &Request,
    snapshot: &MeshVertexSnapshot,
    hooks: &PassHooks<'_>,
    areas: &[PaintArea],
) -> TaskResult {
    let candidates = candidate_indices(mesh, request, snapshot, hooks);
    let mut pass = PaintPass::new(request, snapshot, hooks);
    for index in candidates {
        let position = snapshot.vertices()[index as usize].position;
        // OR semantics: the first containing area supplies the falloff.
        let Some(area) = areas.iter().find(|area| area.contains(position, hooks.collision))
        else {
            continue;
        };
        pass.apply(index, area.weight(position));
    }
    pass.finish()
}

fn paint_entire_mesh(
    mesh: MeshId,
    request: &Request,
    snapshot: &MeshVertexSnapshot,
    hooks: &PassHooks<'_>,
    coverage: &EntireMeshCoverage,
    seed: Option<u64>,
) -> TaskResult {
    let seed_value = sampling::seed_or_random(seed);
    let mut sampler = SubsetSampler::new(seed_value);
    let candidates = candidate_indices(mesh, request, snapshot, hooks);
    let mut pass = PaintPass::new(request, snapshot, hooks);
    for index in candidates {
        let selected = match coverage {
            EntireMeshCoverage::Percent(percent) => sampler.select(percent / 100.0),
            EntireMeshCoverage::InSubArea {
                center,
                radius,
                probability,
            } => {
                // Roll first so vertex N's selection never depends on
                // geometry, then gate on the sub-area.
                let roll = sampler.select(*probability);
                let position = snapshot.vertices()[index as usize].position;
                roll && position.distance_squared(*center) <= radius * radius
            }
        };
        if selected {
            pass.apply(index, 1.0);
        }
    }
    let mut result = pass.finish();
    result.seed = Some(seed_value);
    result
}

fn apply_color_buffer(
    request: &Request,
    snapshot: &MeshVertexSnapshot,
    hooks: &PassHooks<'_>,
    replacement: &[PackedColor],
) -> TaskResult {
    // Validated at submission, but the snapshot may have changed since.
    if replacement.len() != snapshot.len() {
        return TaskResult::failed(TaskFailure::BufferLengthMismatch);
    }
    let mut pass = PaintPass::new(request, snapshot, hooks);
    for (index, packed) in replacement.iter().enumerate() {
        let new = VertexColor::from_packed(*packed);
        if new.max_delta(&pass.colors[index]) > COLOR_EPSILON {
            pass.colors[index] = new;
            pass.any_changed = true;
        }
    }
    pass.finish()
}

fn detect_closest(
    request: &Request,
    snapshot: &MeshVertexSnapshot,
    hooks: &PassHooks<'_>,
    location: Vec3,
    average_radius: f32,
) -> TaskResult {
    let mut pass = PaintPass::new(request, snapshot, hooks);
    pass.hit = Some((location, average_radius));
    pass.want_closest = true;
    pass.finish()
}

fn detect_all(
    request: &Request,
    snapshot: &MeshVertexSnapshot,
    hooks: &PassHooks<'_>,
) -> TaskResult {
    PaintPass::new(request, snapshot, hooks).finish()
}

fn detect_within_area(
    mesh: MeshId,
    request: &Request,
    snapshot: &MeshVertexSnapshot,
    hooks: &PassHooks<'_>,
    areas: &[PaintArea],
) -> TaskResult {
    let candidates = candidate_indices(mesh, request, snapshot, hooks);
    let colors = snapshot.colors();
    let contained: Vec<u32> = candidates
        .into_iter()
        .filter(|&index| {
            let position = snapshot.vertices()[index as usize].position;
            areas.iter().any(|area| area.contains(position, hooks.collision))
        })
        .collect();

    let include = &request.include;
    let mut result = TaskResult::default();
    // The point of the query: what color is this area on average.
    result.average_color = average_color(
        contained
            .iter()
            .map(|&index| colors[index as usize]),
    );
    let (channel_stats, surface_stats, dominant) =
        build_stats(include, snapshot, &colors, hooks, Some(&contained));
    result.channel_stats = channel_stats;
    result.surface_stats = surface_stats;
    result.dominant_surface = dominant;
    if include.vertex_colors {
        result.colors = Some(pack_colors(&colors));
    }
    result
}

/// Channel/surface statistics over the whole buffer, or over a subset of
/// indices for area-scoped detection.
fn build_stats(
    include: &IncludeFlags,
    snapshot: &MeshVertexSnapshot,
    colors: &[VertexColor],
    hooks: &PassHooks<'_>,
    indices: Option<&[u32]>,
) -> (Option<ChannelStats>, Vec<SurfaceStat>, Option<DominantSurface>) {
    if !include.channel_stats && !include.dominant_surface {
        return (None, Vec::new(), None);
    }
    let mut aggregator = StatsAggregator::new(
        include.stats_threshold,
        hooks.surfaces,
        include.dominant_surface,
    );
    match indices {
        Some(indices) => {
            for &index in indices {
                let vertex = &snapshot.vertices()[index as usize];
                aggregator.record(colors[index as usize], vertex.material);
            }
        }
        None => {
            for (vertex, color) in snapshot.vertices().iter().zip(colors.iter()) {
                aggregator.record(*color, vertex.material);
            }
        }
    }
    let channel_stats = include.channel_stats.then(|| aggregator.channel_stats());
    let (surface_stats, dominant) = if include.dominant_surface {
        (aggregator.surface_stats(), aggregator.dominant_surface())
    } else {
        (Vec::new(), None)
    };
    (channel_stats, surface_stats, dominant)
}

fn pack_colors(colors: &[VertexColor]) -> Vec<PackedColor> {
    colors.iter().map(VertexColor::to_packed).collect()
}

fn closest_vertex(
    snapshot: &MeshVertexSnapshot,
    colors: &[VertexColor],
    location: Vec3,
) -> Option<ClosestVertex> {
    snapshot
        .vertices()
        .iter()
        .enumerate()
        .map(|(index, vertex)| (index, vertex.position.distance(location)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(index, distance)| {
            let vertex = &snapshot.vertices()[index];
            ClosestVertex {
                index: index as u32,
                position: vertex.position,
                normal: vertex.normal,
                color: colors[index],
                distance,
            }
        })
}

/// Color at the exact hit point, interpolated from the three nearest
/// vertices with inverse-distance weights.
fn estimate_color_at(
    snapshot: &MeshVertexSnapshot,
    colors: &[VertexColor],
    location: Vec3,
) -> Option<VertexColor> {
    if snapshot.is_empty() {
        return None;
    }
    let mut nearest: Vec<(f32, usize)> = snapshot
        .vertices()
        .iter()
        .enumerate()
        .map(|(index, vertex)| (vertex.position.distance(location), index))
        .collect();
    nearest.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    nearest.truncate(3);

    // A vertex exactly at the hit point wins outright.
    if nearest[0].0 <= f32::EPSILON {
        return Some(colors[nearest[0].1]);
    }

    let mut sum = [0.0f32; 4];
    let mut total_weight = 0.0f32;
    for (distance, index) in nearest {
        let weight = 1.0 / distance;
        total_weight += weight;
        for (slot, value) in sum.iter_mut().zip(colors[index].0.iter()) {
            *slot += value * weight;
        }
    }
    Some(VertexColor(sum.map(|value| value / total_weight)))
}
