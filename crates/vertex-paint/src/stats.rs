//! Per-channel and per-surface result aggregation
//!
//! The aggregator consumes the post-operation color stream and rolls it up
//! into the summaries a result can carry: counts and averages at or above a
//! threshold per channel, the same per registered physics surface, the most
//! dominant surface, and comparison percentages against a reference buffer.

use std::collections::HashMap;

use crate::color::{Channel, VertexColor};
use crate::hooks::SurfaceChannelRegistry;
use crate::mesh::{MaterialId, SurfaceTag};
use crate::request::CompareSpec;
use crate::result::{ChannelStat, ChannelStats, DominantSurface, SurfaceStat};

#[derive(Debug)]
struct SurfaceAccumulator {
    channel: Channel,
    sum: f32,
    count: usize,
    count_at_or_above: usize,
}

/// Streaming rollup over the post-operation colors.
pub struct StatsAggregator<'a> {
    threshold: f32,
    registry: &'a dyn SurfaceChannelRegistry,
    want_surfaces: bool,
    total: usize,
    count_at: [usize; 4],
    sum_at: [f32; 4],
    sum_all: [f32; 4],
    surfaces: HashMap<SurfaceTag, SurfaceAccumulator>,
}

impl<'a> StatsAggregator<'a> {
    pub fn new(
        threshold: f32,
        registry: &'a dyn SurfaceChannelRegistry,
        want_surfaces: bool,
    ) -> Self {
        Self {
            threshold,
            registry,
            want_surfaces,
            total: 0,
            count_at: [0; 4],
            sum_at: [0.0; 4],
            sum_all: [0.0; 4],
            surfaces: HashMap::new(),
        }
    }

    /// Fold one vertex's post-operation color into the rollup.
    pub fn record(&mut self, color: VertexColor, material: MaterialId) {
        self.total += 1;
        for channel in Channel::ALL {
            let value = color.channel(channel);
            let index = channel.index();
            self.sum_all[index] += value;
            if value >= self.threshold {
                self.count_at[index] += 1;
                self.sum_at[index] += value;
            }
        }
        if self.want_surfaces {
            for (tag, channel) in self.registry.surfaces_for(material) {
                let value = color.channel(channel);
                let entry = self.surfaces.entry(tag).or_insert(SurfaceAccumulator {
                    channel,
                    sum: 0.0,
                    count: 0,
                    count_at_or_above: 0,
                });
                entry.sum += value;
                entry.count += 1;
                if value >= self.threshold {
                    entry.count_at_or_above += 1;
                }
            }
        }
    }

    pub fn channel_stats(&self) -> ChannelStats {
        let stat = |channel: Channel| {
            let index = channel.index();
            ChannelStat {
                count_at_or_above: self.count_at[index],
                percent_at_or_above: if self.total == 0 {
                    0.0
                } else {
                    self.count_at[index] as f32 * 100.0 / self.total as f32
                },
                average_at_or_above: if self.count_at[index] == 0 {
                    0.0
                } else {
                    self.sum_at[index] / self.count_at[index] as f32
                },
                average: if self.total == 0 {
                    0.0
                } else {
                    self.sum_all[index] / self.total as f32
                },
            }
        };
        ChannelStats {
            threshold: self.threshold,
            red: stat(Channel::Red),
            green: stat(Channel::Green),
            blue: stat(Channel::Blue),
            alpha: stat(Channel::Alpha),
        }
    }

    /// Per-surface rollups, ordered by channel (tie-break order) then tag.
    pub fn surface_stats(&self) -> Vec<SurfaceStat> {
        let mut stats: Vec<SurfaceStat> = self
            .surfaces
            .iter()
            .map(|(tag, acc)| SurfaceStat {
                surface: tag.clone(),
                channel: acc.channel,
                count_at_or_above: acc.count_at_or_above,
                average: if acc.count == 0 {
                    0.0
                } else {
                    acc.sum / acc.count as f32
                },
            })
            .collect();
        stats.sort_by(|a, b| {
            a.channel
                .index()
                .cmp(&b.channel.index())
                .then_with(|| a.surface.cmp(&b.surface))
        });
        stats
    }

    /// Surface with the highest average value; ties break by channel order
    /// (red before green before blue before alpha), then tag.
    pub fn dominant_surface(&self) -> Option<DominantSurface> {
        self.surface_stats()
            .into_iter()
            .max_by(|a, b| {
                a.average
                    .partial_cmp(&b.average)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    // On equal averages, prefer the earlier channel / tag,
                    // i.e. the one sorted first.
                    .then_with(|| {
                        b.channel
                            .index()
                            .cmp(&a.channel.index())
                            .then_with(|| b.surface.cmp(&a.surface))
                    })
            })
            .map(|stat| DominantSurface {
                surface: stat.surface,
                channel: stat.channel,
                average: stat.average,
            })
    }
}

/// Percentage of vertices whose post-operation color matches the reference
/// within a per-channel tolerance. Empty (all-zero) reference entries can be
/// skipped so unpainted background does not dilute the match.
pub fn compare_match_percent(colors: &[VertexColor], spec: &CompareSpec) -> Option<f32> {
    if colors.len() != spec.reference.len() {
        return None;
    }
    let mut considered = 0usize;
    let mut matched = 0usize;
    for (color, reference) in colors.iter().zip(spec.reference.iter()) {
        let reference = VertexColor::from_packed(*reference);
        if spec.skip_empty_reference && reference.is_empty() {
            continue;
        }
        considered += 1;
        if color.max_delta(&reference) <= spec.tolerance {
            matched += 1;
        }
    }
    if considered == 0 {
        return Some(100.0);
    }
    Some(matched as f32 * 100.0 / considered as f32)
}

/// Average of a color slice; `None` when empty.
pub fn average_color(colors: impl IntoIterator<Item = VertexColor>) -> Option<VertexColor> {
    let mut sum = [0.0f32; 4];
    let mut count = 0usize;
    for color in colors {
        for (slot, value) in sum.iter_mut().zip(color.0.iter()) {
            *slot += value;
        }
        count += 1;
    }
    if count == 0 {
        return None;
    }
    Some(VertexColor(sum.map(|v| v / count as f32)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::PackedColor;
    use crate::hooks::EmptySurfaceRegistry;

    struct FixedRegistry(Vec<(SurfaceTag, Channel)>);

    impl SurfaceChannelRegistry for FixedRegistry {
        fn channel_for(&self, _material: MaterialId, surface: &SurfaceTag) -> Option<Channel> {
            self.0
                .iter()
                .find(|(tag, _)| tag == surface)
                .map(|(_, channel)| *channel)
        }

        fn surfaces_for(&self, _material: MaterialId) -> Vec<(SurfaceTag, Channel)> {
            self.0.clone()
        }
    }

    #[test]
    fn test_threshold_counts_and_percent() {
        let mut agg = StatsAggregator::new(0.5, &EmptySurfaceRegistry, false);
        agg.record(VertexColor::new(0.6, 0.0, 0.0, 0.0), MaterialId(0));
        agg.record(VertexColor::new(0.8, 0.0, 0.0, 0.0), MaterialId(0));
        agg.record(VertexColor::new(0.2, 0.0, 0.0, 0.0), MaterialId(0));
        agg.record(VertexColor::new(0.0, 0.0, 0.0, 0.0), MaterialId(0));

        let stats = agg.channel_stats();
        assert_eq!(stats.red.count_at_or_above, 2);
        assert!((stats.red.percent_at_or_above - 50.0).abs() < 1e-4);
        assert!((stats.red.average_at_or_above - 0.7).abs() < 1e-5);
        assert!((stats.red.average - 0.4).abs() < 1e-5);
        assert_eq!(stats.green.count_at_or_above, 0);
    }

    #[test]
    fn test_dominant_surface_by_average() {
        let registry = FixedRegistry(vec![
            (SurfaceTag::from("Mud"), Channel::Red),
            (SurfaceTag::from("Wet"), Channel::Green),
        ]);
        let mut agg = StatsAggregator::new(0.1, &registry, true);
        agg.record(VertexColor::new(0.2, 0.9, 0.0, 0.0), MaterialId(0));
        agg.record(VertexColor::new(0.4, 0.7, 0.0, 0.0), MaterialId(0));

        let dominant = agg.dominant_surface().expect("surfaces registered");
        assert_eq!(dominant.surface, SurfaceTag::from("Wet"));
        assert_eq!(dominant.channel, Channel::Green);
        assert!((dominant.average - 0.8).abs() < 1e-5);
    }

    #[test]
    fn test_dominant_surface_tie_breaks_by_channel_order() {
        let registry = FixedRegistry(vec![
            (SurfaceTag::from("Sand"), Channel::Blue),
            (SurfaceTag::from("Mud"), Channel::Red),
        ]);
        let mut agg = StatsAggregator::new(0.1, &registry, true);
        agg.record(VertexColor::new(0.5, 0.0, 0.5, 0.0), MaterialId(0));

        let dominant = agg.dominant_surface().expect("surfaces registered");
        assert_eq!(dominant.channel, Channel::Red);
        assert_eq!(dominant.surface, SurfaceTag::from("Mud"));
    }

    #[test]
    fn test_compare_match_percent_with_tolerance() {
        let colors = vec![
            VertexColor::new(0.5, 0.0, 0.0, 0.0),
            VertexColor::new(1.0, 0.0, 0.0, 0.0),
        ];
        let spec = CompareSpec {
            reference: vec![
                VertexColor::new(0.52, 0.0, 0.0, 0.0).to_packed(),
                VertexColor::new(0.0, 0.0, 0.0, 0.0).to_packed(),
            ],
            tolerance: 0.05,
            skip_empty_reference: false,
        };
        let percent = compare_match_percent(&colors, &spec).expect("same length");
        assert!((percent - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_compare_skips_empty_reference() {
        let colors = vec![
            VertexColor::new(0.5, 0.0, 0.0, 0.0),
            VertexColor::new(1.0, 0.0, 0.0, 0.0),
        ];
        let spec = CompareSpec {
            reference: vec![
                VertexColor::new(0.5, 0.0, 0.0, 0.0).to_packed(),
                PackedColor::default(),
            ],
            tolerance: 0.05,
            skip_empty_reference: true,
        };
        let percent = compare_match_percent(&colors, &spec).expect("same length");
        assert!((percent - 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_average_color() {
        let average = average_color(vec![
            VertexColor::new(0.0, 1.0, 0.0, 0.0),
            VertexColor::new(1.0, 0.0, 0.0, 0.0),
        ])
        .expect("non-empty");
        assert!((average.0[0] - 0.5).abs() < 1e-6);
        assert!((average.0[1] - 0.5).abs() < 1e-6);
        assert!(average_color(Vec::new()).is_none());
    }
}
