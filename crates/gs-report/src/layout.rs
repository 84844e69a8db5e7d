//! Bar geometry for the breakdown charts.
//!
//! Every builder here is a pure function of its inputs: the same decomposed
//! matrix and configuration always produce identical positions and heights.
//! The renderer only draws what these layouts describe.

use serde::{Deserialize, Serialize};

use gs_types::{config_error, BenchmarkParams, GsResult, ResultMatrix};

use crate::config::{ReportConfig, VariantLabels};
use crate::variants::{DecomposedMatrix, Segment, SegmentRole};

/// Bar width and inter-cluster gap for a merged layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterGeometry {
    pub bar_width: f64,
    /// Extra space between neighbouring clusters.
    pub spacing: f64,
}

impl ClusterGeometry {
    pub fn new(bar_width: f64, spacing: f64) -> Self {
        Self { bar_width, spacing }
    }

    pub fn validate(&self) -> GsResult<()> {
        if !(self.bar_width > 0.0 && self.bar_width.is_finite()) {
            return Err(config_error!(
                "bar_width must be positive, got {}",
                self.bar_width
            ));
        }
        if !(self.spacing >= 0.0 && self.spacing.is_finite()) {
            return Err(config_error!(
                "spacing must be non-negative, got {}",
                self.spacing
            ));
        }
        Ok(())
    }

    /// Distance between the centers of two adjacent clusters.
    pub fn cluster_stride(&self, bars_per_cluster: usize) -> f64 {
        bars_per_cluster as f64 * self.bar_width + self.spacing
    }

    pub fn cluster_center(&self, cluster: usize, bars_per_cluster: usize) -> f64 {
        cluster as f64 * self.cluster_stride(bars_per_cluster)
    }

    /// Offset of bar `index` from its cluster center; bars are centered as a block.
    pub fn bar_offset(&self, index: usize, bars_per_cluster: usize) -> f64 {
        (index as f64 - bars_per_cluster as f64 / 2.0 + 0.5) * self.bar_width
    }

    pub fn bar_x(&self, cluster: usize, index: usize, bars_per_cluster: usize) -> f64 {
        self.cluster_center(cluster, bars_per_cluster) + self.bar_offset(index, bars_per_cluster)
    }
}

/// Legend text for a segment drawn at layout position `(outer, inner)`.
///
/// Only the bar at `(0, 0)` is labelled, so each role appears once per legend.
pub fn legend_label(
    role: SegmentRole,
    outer: usize,
    inner: usize,
    labels: &VariantLabels,
) -> Option<&str> {
    if outer != 0 || inner != 0 {
        return None;
    }
    Some(match role {
        SegmentRole::Base => labels.base.as_str(),
        SegmentRole::DeltaA => labels.delta_a.as_str(),
        SegmentRole::DeltaB => labels.delta_b.as_str(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutKind {
    /// One panel per group, M slots equally spaced.
    Faceted,
    /// The faceted geometry for a single group.
    SingleRepresentative { group_index: usize },
    /// One cluster per M value, one bar per group inside it.
    MergedByM,
    /// One cluster per group, one bar per M value inside it.
    MergedByGroups,
}

/// One stacked bar. `outer` and `inner` are its position within the panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSpec {
    pub x: f64,
    pub width: f64,
    pub outer: usize,
    pub inner: usize,
    /// `None` when the cell is missing in any variant; nothing is drawn.
    pub segments: Option<[Segment; 3]>,
}

impl BarSpec {
    pub fn legend_label<'a>(&self, role: SegmentRole, labels: &'a VariantLabels) -> Option<&'a str> {
        legend_label(role, self.outer, self.inner, labels)
    }

    pub fn left(&self) -> f64 {
        self.x - self.width / 2.0
    }

    pub fn right(&self) -> f64 {
        self.x + self.width / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelLayout {
    pub title: Option<String>,
    pub x_label: String,
    pub y_label: String,
    pub ticks: Vec<(f64, String)>,
    pub bars: Vec<BarSpec>,
}

impl PanelLayout {
    /// Horizontal extent covering every bar and tick, with half a bar of margin.
    pub fn x_range(&self) -> (f64, f64) {
        let margin = self.bars.first().map_or(0.5, |bar| bar.width);
        let lo = self
            .bars
            .iter()
            .map(BarSpec::left)
            .chain(self.ticks.iter().map(|(x, _)| *x))
            .fold(f64::INFINITY, f64::min);
        let hi = self
            .bars
            .iter()
            .map(BarSpec::right)
            .chain(self.ticks.iter().map(|(x, _)| *x))
            .fold(f64::NEG_INFINITY, f64::max);
        if lo.is_finite() && hi.is_finite() {
            (lo - margin / 2.0, hi + margin / 2.0)
        } else {
            (0.0, 1.0)
        }
    }

    /// Vertical extent from zero (or the lowest segment edge) to the tallest
    /// bar plus headroom for the legend.
    pub fn y_range(&self) -> (f64, f64) {
        let edges = self
            .bars
            .iter()
            .filter_map(|bar| bar.segments.as_ref())
            .flatten()
            .flat_map(|segment| [segment.bottom, segment.top]);
        let (lo, hi) = edges.fold((0.0_f64, 0.0_f64), |(lo, hi), y| (lo.min(y), hi.max(y)));
        if hi <= lo {
            return (lo, lo + 1.0);
        }
        (lo, hi * 1.15)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartLayout {
    pub kind: LayoutKind,
    pub title: String,
    pub panels: Vec<PanelLayout>,
    /// Corner note describing the order of bars inside each cluster.
    pub annotation: Option<String>,
}

impl ChartLayout {
    pub fn bar_count(&self) -> usize {
        self.panels.iter().map(|p| p.bars.len()).sum()
    }
}

const Y_LABEL: &str = "Runtime (ms)";

fn shape_suffix(params: &BenchmarkParams) -> String {
    format!("n={}, k={}", params.n, params.k)
}

fn group_panel(
    matrix: &DecomposedMatrix,
    group_index: usize,
    bar_width: f64,
    title: Option<String>,
) -> PanelLayout {
    let grid = matrix.grid();
    let bars = (0..grid.n_m())
        .map(|m_index| BarSpec {
            x: m_index as f64,
            width: bar_width,
            outer: 0,
            inner: m_index,
            segments: matrix.get(group_index, m_index).map(|cell| cell.segments()),
        })
        .collect();
    let ticks = grid
        .m
        .iter()
        .enumerate()
        .map(|(i, m)| (i as f64, m.to_string()))
        .collect();
    PanelLayout {
        title,
        x_label: "M (batch size)".to_string(),
        y_label: Y_LABEL.to_string(),
        ticks,
        bars,
    }
}

/// One panel per group. Each panel is its own legend scope.
pub fn faceted(
    matrix: &DecomposedMatrix,
    config: &ReportConfig,
    params: &BenchmarkParams,
) -> ChartLayout {
    let panels = matrix
        .grid()
        .groups
        .iter()
        .enumerate()
        .map(|(group_index, groups)| {
            group_panel(
                matrix,
                group_index,
                config.facet_bar_width,
                Some(format!("Groups = {groups}")),
            )
        })
        .collect();
    ChartLayout {
        kind: LayoutKind::Faceted,
        title: format!(
            "{} Performance Breakdown ({})",
            config.title,
            shape_suffix(params)
        ),
        panels,
        annotation: None,
    }
}

/// The faceted panel of the configured representative group, on its own.
pub fn single_representative(
    matrix: &DecomposedMatrix,
    config: &ReportConfig,
    params: &BenchmarkParams,
) -> GsResult<ChartLayout> {
    let group_index = config.representative_index(matrix.grid().n_groups())?;
    let groups = matrix.grid().groups[group_index];
    Ok(ChartLayout {
        kind: LayoutKind::SingleRepresentative { group_index },
        title: format!(
            "{} Performance Breakdown (Groups={groups}, {})",
            config.title,
            shape_suffix(params)
        ),
        panels: vec![group_panel(matrix, group_index, config.facet_bar_width, None)],
        annotation: None,
    })
}

/// Clusters keyed by M, one bar per group inside each cluster.
pub fn merged_by_m(
    matrix: &DecomposedMatrix,
    config: &ReportConfig,
    params: &BenchmarkParams,
) -> ChartLayout {
    let grid = matrix.grid();
    let geometry = config.merged_by_m;
    let n_groups = grid.n_groups();

    let mut bars = Vec::with_capacity(grid.total_cells());
    for m_index in 0..grid.n_m() {
        for group_index in 0..n_groups {
            bars.push(BarSpec {
                x: geometry.bar_x(m_index, group_index, n_groups),
                width: geometry.bar_width,
                outer: m_index,
                inner: group_index,
                segments: matrix.get(group_index, m_index).map(|cell| cell.segments()),
            });
        }
    }
    let ticks = grid
        .m
        .iter()
        .enumerate()
        .map(|(i, m)| (geometry.cluster_center(i, n_groups), format!("M={m}")))
        .collect();

    ChartLayout {
        kind: LayoutKind::MergedByM,
        title: format!(
            "{} Performance Breakdown ({}) - All Groups Combined",
            config.title,
            shape_suffix(params)
        ),
        panels: vec![PanelLayout {
            title: None,
            x_label: "Batch Size (M)".to_string(),
            y_label: Y_LABEL.to_string(),
            ticks,
            bars,
        }],
        annotation: Some(format!("Within each cluster: groups={:?}", grid.groups)),
    }
}

/// Clusters keyed by group count, one bar per M value inside each cluster.
pub fn merged_by_groups(
    matrix: &DecomposedMatrix,
    config: &ReportConfig,
    params: &BenchmarkParams,
) -> ChartLayout {
    let grid = matrix.grid();
    let geometry = config.merged_by_groups;
    let n_m = grid.n_m();

    let mut bars = Vec::with_capacity(grid.total_cells());
    for group_index in 0..grid.n_groups() {
        for m_index in 0..n_m {
            bars.push(BarSpec {
                x: geometry.bar_x(group_index, m_index, n_m),
                width: geometry.bar_width,
                outer: group_index,
                inner: m_index,
                segments: matrix.get(group_index, m_index).map(|cell| cell.segments()),
            });
        }
    }
    let ticks = grid
        .groups
        .iter()
        .enumerate()
        .map(|(i, g)| (geometry.cluster_center(i, n_m), format!("Groups={g}")))
        .collect();

    ChartLayout {
        kind: LayoutKind::MergedByGroups,
        title: format!(
            "{} Performance Breakdown ({}) - Grouped by Group Count",
            config.title,
            shape_suffix(params)
        ),
        panels: vec![PanelLayout {
            title: None,
            x_label: "Number of Groups".to_string(),
            y_label: Y_LABEL.to_string(),
            ticks,
            bars,
        }],
        annotation: Some(format!("Within each cluster: M={:?}", grid.m)),
    }
}

/// Build the layout for `kind`.
pub fn build(
    kind: LayoutKind,
    matrix: &DecomposedMatrix,
    config: &ReportConfig,
    params: &BenchmarkParams,
) -> GsResult<ChartLayout> {
    match kind {
        LayoutKind::Faceted => Ok(faceted(matrix, config, params)),
        LayoutKind::SingleRepresentative { group_index } => {
            let config = config.clone().with_representative_group(group_index);
            single_representative(matrix, &config, params)
        }
        LayoutKind::MergedByM => Ok(merged_by_m(matrix, config, params)),
        LayoutKind::MergedByGroups => Ok(merged_by_groups(matrix, config, params)),
    }
}

/// Runtime of one group across the M axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSpec {
    pub groups: u32,
    pub label: String,
    /// `(m_index, millis)` for every measured cell; missing cells are left out.
    pub points: Vec<(f64, f64)>,
}

/// One line per group over equally spaced M slots.
pub fn runtime_lines(matrix: &ResultMatrix) -> Vec<LineSpec> {
    matrix
        .grid()
        .groups
        .iter()
        .zip(matrix.rows())
        .map(|(&groups, row)| LineSpec {
            groups,
            label: format!("groups={groups}"),
            points: row
                .iter()
                .enumerate()
                .filter_map(|(m_index, cell)| cell.map(|millis| (m_index as f64, millis)))
                .collect(),
        })
        .filter(|line| {
            if line.points.is_empty() {
                tracing::debug!("No measured cells for groups={}", line.groups);
            }
            !line.points.is_empty()
        })
        .collect()
}

/// Check that a layout has something to draw.
pub fn ensure_drawable(layout: &ChartLayout) -> GsResult<()> {
    if layout.panels.is_empty() {
        return Err(config_error!("layout {:?} has no panels", layout.kind));
    }
    Ok(())
}
