//! Breakdown charts for three nested benchmark variants.
//!
//! Results are loaded into a [`VariantTriple`], decomposed into stacked
//! segments, laid out by one of the [`LayoutKind`]s and drawn to PNG.

pub mod config;
pub mod layout;
pub mod render;
pub mod variants;

pub use config::*;
pub use layout::{
    faceted, legend_label, merged_by_groups, merged_by_m, runtime_lines, single_representative,
    BarSpec, ChartLayout, ClusterGeometry, LayoutKind, LineSpec, PanelLayout,
};
pub use render::{render_layout, render_report, render_runtime_lines, RUNTIME_LINES_FILE};
pub use variants::*;
