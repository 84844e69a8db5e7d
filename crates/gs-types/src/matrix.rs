use serde::Serialize;

use crate::errors::{GridError, GsResult};
use crate::grid::GridSpec;

/// One measured runtime in milliseconds, or `None` when the trial timed
/// out, failed, or reported no timing.
pub type Cell = Option<f64>;

/// Rectangular matrix of trial outcomes over a [`GridSpec`].
///
/// `values[g][m]` holds the outcome for `grid.groups[g]` and `grid.m[m]`.
/// Every constructor checks that there are exactly `|groups|` rows of
/// `|m|` cells and that every present value is finite and nonnegative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultMatrix {
    grid: GridSpec,
    values: Vec<Vec<Cell>>,
}

impl ResultMatrix {
    /// A matrix with every cell missing.
    pub fn empty(grid: GridSpec) -> Self {
        let (rows, cols) = grid.dims();
        Self {
            values: vec![vec![None; cols]; rows],
            grid,
        }
    }

    pub fn from_rows(grid: GridSpec, rows: Vec<Vec<Cell>>) -> GsResult<Self> {
        grid.validate()?;
        let (expected_rows, expected_cols) = grid.dims();

        if rows.len() != expected_rows {
            return Err(GridError::RowCount {
                expected: expected_rows,
                actual: rows.len(),
            }
            .into());
        }
        for (group_index, row) in rows.iter().enumerate() {
            if row.len() != expected_cols {
                return Err(GridError::RaggedRow {
                    row: group_index,
                    expected: expected_cols,
                    actual: row.len(),
                }
                .into());
            }
            for (m_index, cell) in row.iter().enumerate() {
                if let Some(value) = cell {
                    check_value(group_index, m_index, *value)?;
                }
            }
        }

        Ok(Self { grid, values: rows })
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn dims(&self) -> (usize, usize) {
        self.grid.dims()
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.values
    }

    pub fn row(&self, group_index: usize) -> Option<&[Cell]> {
        self.values.get(group_index).map(Vec::as_slice)
    }

    pub fn get(&self, group_index: usize, m_index: usize) -> Cell {
        self.values
            .get(group_index)
            .and_then(|row| row.get(m_index))
            .copied()
            .flatten()
    }

    pub fn set(&mut self, group_index: usize, m_index: usize, cell: Cell) -> GsResult<()> {
        let (rows, cols) = self.dims();
        if group_index >= rows || m_index >= cols {
            return Err(GridError::IndexOutOfRange {
                group_index,
                m_index,
                rows,
                cols,
            }
            .into());
        }
        if let Some(value) = cell {
            check_value(group_index, m_index, value)?;
        }
        self.values[group_index][m_index] = cell;
        Ok(())
    }

    pub fn measured_count(&self) -> usize {
        self.values.iter().flatten().filter(|c| c.is_some()).count()
    }

    pub fn missing_count(&self) -> usize {
        self.grid.total_cells() - self.measured_count()
    }

    /// Label-for-label comparison of the underlying grids.
    pub fn ensure_same_grid(&self, other: &ResultMatrix) -> Result<(), GridError> {
        self.grid.ensure_matches(&other.grid)
    }
}

fn check_value(group_index: usize, m_index: usize, value: f64) -> Result<(), GridError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(GridError::InvalidValue {
            group_index,
            m_index,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::GsError;

    fn small_grid() -> GridSpec {
        GridSpec::new(vec![8, 16], vec![1, 8, 16]).unwrap()
    }

    #[test]
    fn empty_matrix_is_rectangular_and_missing() {
        let matrix = ResultMatrix::empty(GridSpec::default());
        assert_eq!(matrix.rows().len(), 6);
        assert!(matrix.rows().iter().all(|row| row.len() == 8));
        assert_eq!(matrix.missing_count(), 48);
        assert_eq!(matrix.get(0, 0), None);
    }

    #[test]
    fn set_and_get_by_index() {
        let mut matrix = ResultMatrix::empty(small_grid());
        matrix.set(1, 2, Some(0.0172)).unwrap();

        assert_eq!(matrix.get(1, 2), Some(0.0172));
        assert_eq!(matrix.row(1).unwrap(), &[None, None, Some(0.0172)]);
        assert_eq!(matrix.measured_count(), 1);
        assert_eq!(matrix.get(5, 5), None);
    }

    #[test]
    fn set_rejects_out_of_range_and_negative() {
        let mut matrix = ResultMatrix::empty(small_grid());
        assert!(matches!(
            matrix.set(2, 0, Some(1.0)),
            Err(GsError::Grid(GridError::IndexOutOfRange { .. }))
        ));
        assert!(matches!(
            matrix.set(0, 0, Some(-0.5)),
            Err(GsError::Grid(GridError::InvalidValue { .. }))
        ));
        assert!(matches!(
            matrix.set(0, 0, Some(f64::NAN)),
            Err(GsError::Grid(GridError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn from_rows_checks_shape() {
        let too_few = vec![vec![Some(1.0), None, Some(2.0)]];
        assert!(matches!(
            ResultMatrix::from_rows(small_grid(), too_few),
            Err(GsError::Grid(GridError::RowCount { expected: 2, actual: 1 }))
        ));

        let ragged = vec![vec![Some(1.0), None, Some(2.0)], vec![Some(1.0)]];
        assert!(matches!(
            ResultMatrix::from_rows(small_grid(), ragged),
            Err(GsError::Grid(GridError::RaggedRow { row: 1, expected: 3, actual: 1 }))
        ));

        let ok = vec![vec![Some(1.0), None, Some(2.0)], vec![None, None, None]];
        let matrix = ResultMatrix::from_rows(small_grid(), ok).unwrap();
        assert_eq!(matrix.measured_count(), 2);
    }
}
