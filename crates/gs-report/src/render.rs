//! PNG rendering of chart layouts with plotters.

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::info;

use gs_types::{BenchmarkParams, GsError, GsResult, ResultMatrix};

use crate::config::{ReportConfig, VariantLabels};
use crate::layout::{self, runtime_lines, ChartLayout, LayoutKind, PanelLayout};
use crate::variants::{DecomposedMatrix, SegmentRole};

type DrawResult<T = ()> = Result<T, Box<dyn Error>>;

/// Pixels between the x axis and the top of a tick label.
const TICK_GAP: i32 = 8;

pub const RUNTIME_LINES_FILE: &str = "gemm_performance.png";

const BASE_COLOR: RGBColor = RGBColor(0x2e, 0xcc, 0x71);
const DELTA_A_COLOR: RGBColor = RGBColor(0x34, 0x98, 0xdb);
const DELTA_B_COLOR: RGBColor = RGBColor(0xe7, 0x4c, 0x3c);

pub fn segment_color(role: SegmentRole) -> RGBColor {
    match role {
        SegmentRole::Base => BASE_COLOR,
        SegmentRole::DeltaA => DELTA_A_COLOR,
        SegmentRole::DeltaB => DELTA_B_COLOR,
    }
}

/// Output file name for a layout.
pub fn file_name(kind: LayoutKind) -> &'static str {
    match kind {
        LayoutKind::Faceted => "barplot_nvfp4_breakdown.png",
        LayoutKind::SingleRepresentative { .. } => "barplot_nvfp4_single.png",
        LayoutKind::MergedByM => "barplot_mega.png",
        LayoutKind::MergedByGroups => "barplot_mega_by_groups.png",
    }
}

/// Canvas size in pixels (figure inches at 150 dpi).
pub fn canvas_size(kind: LayoutKind) -> (u32, u32) {
    match kind {
        LayoutKind::Faceted => (2250, 1500),
        LayoutKind::SingleRepresentative { .. } => (2100, 1200),
        LayoutKind::MergedByM | LayoutKind::MergedByGroups => (2700, 1200),
    }
}

fn render_error(path: &Path, err: Box<dyn Error>) -> GsError {
    GsError::Render(format!("{}: {err}", path.display()))
}

/// Draw a layout into a PNG at `path`.
pub fn render_layout(
    layout: &ChartLayout,
    labels: &VariantLabels,
    facet_columns: usize,
    path: &Path,
) -> GsResult<()> {
    layout::ensure_drawable(layout)?;
    draw_layout(layout, labels, facet_columns, path).map_err(|e| render_error(path, e))
}

fn draw_layout(
    layout: &ChartLayout,
    labels: &VariantLabels,
    facet_columns: usize,
    path: &Path,
) -> DrawResult {
    let root = BitMapBackend::new(path, canvas_size(layout.kind)).into_drawing_area();
    root.fill(&WHITE)?;

    if layout.panels.len() == 1 {
        let panel = &layout.panels[0];
        let caption = panel.title.as_deref().unwrap_or(&layout.title);
        draw_panel(&root, panel, caption, labels, 30)?;
    } else {
        let body = root.titled(&layout.title, ("sans-serif", 34))?;
        let columns = facet_columns.max(1);
        let rows = layout.panels.len().div_ceil(columns);
        let areas = body.split_evenly((rows, columns));
        for (panel, area) in layout.panels.iter().zip(areas.iter()) {
            let caption = panel.title.as_deref().unwrap_or_default();
            draw_panel(area, panel, caption, labels, 24)?;
        }
    }

    if let Some(note) = &layout.annotation {
        let (width, height) = root.dim_in_pixel();
        let style = TextStyle::from(("sans-serif", 20).into_font())
            .pos(Pos::new(HPos::Right, VPos::Bottom))
            .color(&BLACK);
        root.draw_text(note, &style, (width as i32 - 60, height as i32 - 90))?;
    }

    root.present()?;
    Ok(())
}

/// Write each label centered just below its pixel position on the x axis.
///
/// Positions are absolute backend pixels, as returned by
/// `ChartContext::backend_coord`.
fn draw_tick_labels(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    placed: &[((i32, i32), &str)],
) -> DrawResult {
    let (base_x, base_y) = area.get_base_pixel();
    let style = TextStyle::from(("sans-serif", 18).into_font())
        .pos(Pos::new(HPos::Center, VPos::Top))
        .color(&BLACK);
    for &((x, y), label) in placed {
        area.draw_text(label, &style, (x - base_x, y - base_y + TICK_GAP))?;
    }
    Ok(())
}

fn draw_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    panel: &PanelLayout,
    caption: &str,
    labels: &VariantLabels,
    caption_size: u32,
) -> DrawResult {
    let (x_lo, x_hi) = panel.x_range();
    let (y_lo, y_hi) = panel.y_range();

    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", caption_size))
        .margin(16)
        .x_label_area_size(60)
        .y_label_area_size(90)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .bold_line_style(BLACK.mix(0.3))
        .light_line_style(WHITE)
        .x_labels(0)
        .y_label_formatter(&|y| format!("{y:.3}"))
        .x_desc(panel.x_label.as_str())
        .y_desc(panel.y_label.as_str())
        .label_style(("sans-serif", 18))
        .draw()?;

    let placed: Vec<_> = panel
        .ticks
        .iter()
        .map(|(x, label)| (chart.backend_coord(&(*x, y_lo)), label.as_str()))
        .collect();
    draw_tick_labels(area, &placed)?;

    let mut labelled = false;
    for bar in &panel.bars {
        let Some(segments) = &bar.segments else {
            continue;
        };
        for segment in segments {
            let color = segment_color(segment.role);
            let corners = [(bar.left(), segment.bottom), (bar.right(), segment.top)];
            let series = chart.draw_series(std::iter::once(Rectangle::new(corners, color.filled())))?;
            if let Some(label) = bar.legend_label(segment.role, labels) {
                labelled = true;
                series
                    .label(label)
                    .legend(move |(x, y)| Rectangle::new([(x, y - 6), (x + 18, y + 6)], color.filled()));
            }
            chart.draw_series(std::iter::once(Rectangle::new(
                corners,
                WHITE.stroke_width(1),
            )))?;
        }
    }

    if labelled {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .label_font(("sans-serif", 18))
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}

/// Render all four breakdown charts into `config.output_dir`.
pub fn render_report(
    matrix: &DecomposedMatrix,
    config: &ReportConfig,
    params: &BenchmarkParams,
) -> GsResult<Vec<PathBuf>> {
    config.validate()?;
    std::fs::create_dir_all(&config.output_dir)?;

    let group_index = config.representative_index(matrix.grid().n_groups())?;
    let kinds = [
        LayoutKind::Faceted,
        LayoutKind::SingleRepresentative { group_index },
        LayoutKind::MergedByM,
        LayoutKind::MergedByGroups,
    ];

    let mut written = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let chart = layout::build(kind, matrix, config, params)?;
        let path = config.output_dir.join(file_name(kind));
        render_layout(&chart, &config.labels, config.facet_columns, &path)?;
        info!("Saved: {}", path.display());
        written.push(path);
    }
    Ok(written)
}

/// Runtime-per-group overview of a single sweep, written as
/// [`RUNTIME_LINES_FILE`] in `config.output_dir`.
pub fn render_runtime_lines(
    matrix: &ResultMatrix,
    config: &ReportConfig,
    params: &BenchmarkParams,
) -> GsResult<PathBuf> {
    std::fs::create_dir_all(&config.output_dir)?;
    let path = config.output_dir.join(RUNTIME_LINES_FILE);
    draw_runtime_lines(matrix, config, params, &path).map_err(|e| render_error(&path, e))?;
    info!("Plot saved to {}", path.display());
    Ok(path)
}

fn draw_runtime_lines(
    matrix: &ResultMatrix,
    config: &ReportConfig,
    params: &BenchmarkParams,
    path: &Path,
) -> DrawResult {
    let lines = runtime_lines(matrix);
    let m_values = &matrix.grid().m;
    let y_max = lines
        .iter()
        .flat_map(|line| line.points.iter().map(|(_, y)| *y))
        .fold(0.0_f64, f64::max);
    let y_max = if y_max > 0.0 { y_max * 1.1 } else { 1.0 };
    let ticks: Vec<(f64, String)> = m_values
        .iter()
        .enumerate()
        .map(|(i, m)| (i as f64, m.to_string()))
        .collect();

    let root = BitMapBackend::new(path, (900, 1800)).into_drawing_area();
    root.fill(&WHITE)?;
    let title = format!(
        "{} Performance (n={}, k={}, alpha={}, beta={})",
        config.title, params.n, params.k, params.alpha, params.beta
    );
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(16)
        .x_label_area_size(60)
        .y_label_area_size(90)
        .build_cartesian_2d(-0.5..(m_values.len() as f64 - 0.5), 0.0..y_max)?;

    chart
        .configure_mesh()
        .bold_line_style(BLACK.mix(0.3))
        .light_line_style(WHITE)
        .x_labels(0)
        .y_label_formatter(&|y| format!("{y:.3}"))
        .x_desc("M (batch size)")
        .y_desc("Average CUDA Runtime (ms)")
        .label_style(("sans-serif", 18))
        .draw()?;

    for (x, _) in &ticks {
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(*x, 0.0), (*x, y_max)],
            BLACK.mix(0.15),
        )))?;
    }
    let placed: Vec<_> = ticks
        .iter()
        .map(|(x, label)| (chart.backend_coord(&(*x, 0.0)), label.as_str()))
        .collect();
    draw_tick_labels(&root, &placed)?;

    for (i, line) in lines.iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        chart
            .draw_series(LineSeries::new(line.points.iter().copied(), color.stroke_width(2)))?
            .label(line.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        chart.draw_series(
            line.points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 4, color.filled())),
        )?;
    }

    if !lines.is_empty() {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .label_font(("sans-serif", 18))
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VariantNames;
    use crate::variants::VariantTriple;
    use gs_types::GridSpec;
    use tempfile::tempdir;

    fn uniform(grid: &GridSpec, value: f64) -> ResultMatrix {
        let (rows, cols) = grid.dims();
        ResultMatrix::from_rows(grid.clone(), vec![vec![Some(value); cols]; rows]).unwrap()
    }

    #[test]
    fn every_layout_has_its_own_file() {
        let kinds = [
            LayoutKind::Faceted,
            LayoutKind::SingleRepresentative { group_index: 0 },
            LayoutKind::MergedByM,
            LayoutKind::MergedByGroups,
        ];
        let mut names: Vec<&str> = kinds.iter().map(|k| file_name(*k)).collect();
        names.push(RUNTIME_LINES_FILE);
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 5);
        assert_eq!(canvas_size(LayoutKind::Faceted), (2250, 1500));
    }

    #[test]
    fn colors_follow_segment_roles() {
        assert_eq!(segment_color(SegmentRole::Base), RGBColor(0x2e, 0xcc, 0x71));
        assert_eq!(segment_color(SegmentRole::DeltaA), RGBColor(0x34, 0x98, 0xdb));
        assert_eq!(segment_color(SegmentRole::DeltaB), RGBColor(0xe7, 0x4c, 0x3c));
    }

    #[test]
    fn renders_all_charts() {
        let dir = tempdir().unwrap();
        let grid = GridSpec::default();
        let triple = VariantTriple::new(
            VariantNames::default(),
            uniform(&grid, 0.02),
            uniform(&grid, 0.03),
            uniform(&grid, 0.05),
        )
        .unwrap();
        let config = ReportConfig::default().with_output_dir(dir.path());
        let params = BenchmarkParams::default();

        let written = render_report(&triple.decompose(), &config, &params).unwrap();
        assert_eq!(written.len(), 4);
        for name in [
            "barplot_nvfp4_breakdown.png",
            "barplot_nvfp4_single.png",
            "barplot_mega.png",
            "barplot_mega_by_groups.png",
        ] {
            let path = dir.path().join(name);
            assert!(written.contains(&path));
            assert!(std::fs::metadata(&path).unwrap().len() > 0);
        }

        let lines = render_runtime_lines(triple.full(), &config, &params).unwrap();
        assert_eq!(lines, dir.path().join(RUNTIME_LINES_FILE));
        assert!(std::fs::metadata(&lines).unwrap().len() > 0);
    }

    #[test]
    fn merged_chart_draws_negative_and_missing_cells() {
        let dir = tempdir().unwrap();
        let grid = GridSpec::new(vec![8, 16, 32], vec![1, 8, 16, 32]).unwrap();
        let mut with_a = uniform(&grid, 0.015);
        with_a.set(2, 3, None).unwrap();
        let triple = VariantTriple::new(
            VariantNames::default(),
            uniform(&grid, 0.02),
            with_a,
            uniform(&grid, 0.05),
        )
        .unwrap();
        let config = ReportConfig::default();
        let params = BenchmarkParams::default();
        let decomposed = triple.decompose();

        for kind in [LayoutKind::MergedByM, LayoutKind::MergedByGroups] {
            let chart = layout::build(kind, &decomposed, &config, &params).unwrap();
            let path = dir.path().join(file_name(kind));
            render_layout(&chart, &config.labels, config.facet_columns, &path).unwrap();
            assert!(path.exists());
        }
    }

    #[test]
    fn runtime_chart_with_no_measurements_still_renders() {
        let dir = tempdir().unwrap();
        let grid = GridSpec::new(vec![8], vec![1, 8]).unwrap();
        let config = ReportConfig::default().with_output_dir(dir.path());

        let path = render_runtime_lines(&ResultMatrix::empty(grid), &config, &BenchmarkParams::default())
            .unwrap();
        assert!(path.exists());
    }
}
