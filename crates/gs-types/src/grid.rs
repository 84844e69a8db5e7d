use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::errors::{Axis, GridError, GsResult};

/// Batch sizes swept by the reference NVFP4 experiment
pub const DEFAULT_M_VALUES: [u32; 8] = [1, 8, 16, 32, 64, 128, 256, 512];

/// Group counts swept by the reference NVFP4 experiment
pub const DEFAULT_GROUP_VALUES: [u32; 6] = [8, 16, 32, 64, 128, 256];

/// The two ordered axes of the parameter grid.
///
/// `groups` is the outer axis and `m` the inner one. Label order is
/// meaningful: it is the order trials run in, the order cells are stored in
/// and the order axes are drawn in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSpec {
    pub groups: Vec<u32>,
    pub m: Vec<u32>,
}

impl GridSpec {
    pub fn new(groups: Vec<u32>, m: Vec<u32>) -> GsResult<Self> {
        let grid = Self { groups, m };
        grid.validate()?;
        Ok(grid)
    }

    /// Check that both axes are non-empty, positive and free of duplicates.
    pub fn validate(&self) -> GsResult<()> {
        validate_axis(Axis::Groups, &self.groups)?;
        validate_axis(Axis::M, &self.m)?;
        Ok(())
    }

    /// `(number of group rows, number of m columns)`
    pub fn dims(&self) -> (usize, usize) {
        (self.groups.len(), self.m.len())
    }

    pub fn n_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn n_m(&self) -> usize {
        self.m.len()
    }

    pub fn total_cells(&self) -> usize {
        self.groups.len() * self.m.len()
    }

    /// All grid points in sweep order: groups outer, m inner.
    pub fn points(&self) -> impl Iterator<Item = GridPoint> + '_ {
        self.groups
            .iter()
            .enumerate()
            .flat_map(move |(group_index, &groups)| {
                self.m.iter().enumerate().map(move |(m_index, &m)| GridPoint {
                    group_index,
                    m_index,
                    groups,
                    m,
                })
            })
    }

    /// Compare labels axis by axis.
    pub fn ensure_matches(&self, other: &GridSpec) -> Result<(), GridError> {
        if self.dims() != other.dims() {
            return Err(GridError::DimensionMismatch {
                expected: self.dims(),
                actual: other.dims(),
            });
        }
        if self.groups != other.groups {
            return Err(GridError::LabelMismatch {
                axis: Axis::Groups,
                expected: self.groups.clone(),
                actual: other.groups.clone(),
            });
        }
        if self.m != other.m {
            return Err(GridError::LabelMismatch {
                axis: Axis::M,
                expected: self.m.clone(),
                actual: other.m.clone(),
            });
        }
        Ok(())
    }
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            groups: DEFAULT_GROUP_VALUES.to_vec(),
            m: DEFAULT_M_VALUES.to_vec(),
        }
    }
}

fn validate_axis(axis: Axis, values: &[u32]) -> Result<(), GridError> {
    if values.is_empty() {
        return Err(GridError::EmptyAxis { axis });
    }
    let mut seen = HashSet::with_capacity(values.len());
    for &value in values {
        if value == 0 {
            return Err(GridError::NonPositiveLabel { axis, value });
        }
        if !seen.insert(value) {
            return Err(GridError::DuplicateLabel { axis, value });
        }
    }
    Ok(())
}

/// One cell coordinate of the grid, by index and by label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPoint {
    pub group_index: usize,
    pub m_index: usize,
    pub groups: u32,
    pub m: u32,
}

impl std::fmt::Display for GridPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "m={:4}, groups={:3}", self.m, self.groups)
    }
}

/// Scalars shared by every trial of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkParams {
    pub n: u32,
    pub k: u32,
    pub alpha: f64,
    pub beta: f64,
}

impl Default for BenchmarkParams {
    fn default() -> Self {
        Self {
            n: 768,
            k: 2048,
            alpha: 1.0,
            beta: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::GsError;

    #[test]
    fn default_grid_matches_nvfp4_experiment() {
        let grid = GridSpec::default();
        assert_eq!(grid.dims(), (6, 8));
        assert_eq!(grid.total_cells(), 48);
        assert!(grid.validate().is_ok());
    }

    #[test]
    fn points_iterate_groups_outer_m_inner() {
        let grid = GridSpec::new(vec![8, 16], vec![1, 32, 512]).unwrap();
        let points: Vec<GridPoint> = grid.points().collect();

        assert_eq!(points.len(), 6);
        assert_eq!((points[0].groups, points[0].m), (8, 1));
        assert_eq!((points[2].groups, points[2].m), (8, 512));
        assert_eq!((points[3].groups, points[3].m), (16, 1));
        assert_eq!((points[5].group_index, points[5].m_index), (1, 2));
    }

    #[test]
    fn rejects_empty_zero_and_duplicate_labels() {
        assert!(matches!(
            GridSpec::new(vec![], vec![1]),
            Err(GsError::Grid(GridError::EmptyAxis { axis: Axis::Groups }))
        ));
        assert!(matches!(
            GridSpec::new(vec![8], vec![0, 1]),
            Err(GsError::Grid(GridError::NonPositiveLabel { axis: Axis::M, value: 0 }))
        ));
        assert!(matches!(
            GridSpec::new(vec![8, 8], vec![1]),
            Err(GsError::Grid(GridError::DuplicateLabel { value: 8, .. }))
        ));
    }

    #[test]
    fn ensure_matches_reports_dimensions_before_labels() {
        let a = GridSpec::new(vec![8, 16], vec![1, 8]).unwrap();
        let b = GridSpec::new(vec![8, 16, 32], vec![1, 8]).unwrap();
        let c = GridSpec::new(vec![8, 16], vec![1, 16]).unwrap();

        assert!(a.ensure_matches(&a.clone()).is_ok());
        assert_eq!(
            a.ensure_matches(&b),
            Err(GridError::DimensionMismatch {
                expected: (2, 2),
                actual: (3, 2)
            })
        );
        assert!(matches!(
            a.ensure_matches(&c),
            Err(GridError::LabelMismatch { axis: Axis::M, .. })
        ));
    }

    #[test]
    fn params_default_and_round_trip() {
        let params = BenchmarkParams::default();
        assert_eq!((params.n, params.k), (768, 2048));

        let json = serde_json::to_string(&params).unwrap();
        let back: BenchmarkParams = serde_json::from_str(&json).unwrap();
        assert_eq!(params, back);
    }

    #[test]
    fn partial_params_keep_defaults() {
        let params: BenchmarkParams = serde_json::from_str(r#"{"alpha": 5}"#).unwrap();
        assert_eq!(params.alpha, 5.0);
        assert_eq!((params.n, params.k), (768, 2048));
        assert_eq!(params.beta, 0.0);
    }
}
