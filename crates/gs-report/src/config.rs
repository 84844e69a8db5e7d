use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use gs_types::{config_error, GsResult};

use crate::layout::ClusterGeometry;

/// Stored configuration names of the three nested variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantNames {
    /// Neither feature enabled.
    pub baseline: String,
    /// Baseline plus feature A (MMA).
    pub with_a: String,
    /// Baseline plus features A and B (MMA + TMA).
    pub full: String,
}

impl Default for VariantNames {
    fn default() -> Self {
        Self {
            baseline: "nvfp4_no_tma_no_mma".to_string(),
            with_a: "nvfp4_no_tma".to_string(),
            full: "nvfp4".to_string(),
        }
    }
}

/// Legend text for the three stacked segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantLabels {
    pub base: String,
    pub delta_a: String,
    pub delta_b: String,
}

impl Default for VariantLabels {
    fn default() -> Self {
        Self {
            base: "Baseline (no MMA, no TMA)".to_string(),
            delta_a: "+MMA".to_string(),
            delta_b: "+TMA".to_string(),
        }
    }
}

/// Configuration for the breakdown charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub variants: VariantNames,
    pub labels: VariantLabels,
    /// Chart title prefix, e.g. "NVFP4 Grouped GEMM".
    pub title: String,
    pub output_dir: PathBuf,
    pub facet_bar_width: f64,
    pub facet_columns: usize,
    pub merged_by_m: ClusterGeometry,
    pub merged_by_groups: ClusterGeometry,
    /// Group index drawn in the single-panel chart; `None` picks the middle one.
    pub representative_group: Option<usize>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            variants: VariantNames::default(),
            labels: VariantLabels::default(),
            title: "NVFP4 Grouped GEMM".to_string(),
            output_dir: PathBuf::from("."),
            facet_bar_width: 0.6,
            facet_columns: 3,
            merged_by_m: ClusterGeometry::new(0.12, 0.15),
            merged_by_groups: ClusterGeometry::new(0.10, 0.15),
            representative_group: None,
        }
    }
}

impl ReportConfig {
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_representative_group(mut self, group_index: usize) -> Self {
        self.representative_group = Some(group_index);
        self
    }

    /// Index of the group drawn in the single-panel chart.
    pub fn representative_index(&self, n_groups: usize) -> GsResult<usize> {
        match self.representative_group {
            Some(index) if index < n_groups => Ok(index),
            Some(index) => Err(config_error!(
                "representative_group {index} is outside a grid of {n_groups} groups"
            )),
            None => Ok(n_groups / 2),
        }
    }

    pub fn validate(&self) -> GsResult<()> {
        if !(self.facet_bar_width > 0.0 && self.facet_bar_width.is_finite()) {
            return Err(config_error!("facet_bar_width must be positive"));
        }
        if self.facet_columns == 0 {
            return Err(config_error!("facet_columns must be at least 1"));
        }
        self.merged_by_m.validate()?;
        self.merged_by_groups.validate()?;
        Ok(())
    }
}
