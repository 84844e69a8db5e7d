//! Variant loading and incremental-delta decomposition.
//!
//! Three result matrices measured with strictly nested feature sets
//! (baseline, baseline + A, baseline + A + B) are aligned cell for cell and
//! split into stacked segments: the baseline runtime, the change from adding
//! A and the change from adding B on top of that.
//!
//! Deltas are not clamped. Measurement noise can make a later variant
//! faster than an earlier one; the resulting negative segment is kept as is.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use gs_data::ResultStore;
use gs_types::{GridSpec, GsResult, ResultMatrix, VariantError};

use crate::config::VariantNames;

/// Which stacked segment a value belongs to, bottom to top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentRole {
    Base,
    DeltaA,
    DeltaB,
}

impl SegmentRole {
    pub const ALL: [SegmentRole; 3] = [SegmentRole::Base, SegmentRole::DeltaA, SegmentRole::DeltaB];
}

/// One vertical piece of a stacked bar, between two measured runtimes.
///
/// `top` may lie below `bottom` when a variant got faster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub role: SegmentRole,
    pub bottom: f64,
    pub top: f64,
}

impl Segment {
    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }
}

/// Runtimes of the three variants at one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecomposedCell {
    pub base: f64,
    pub with_a: f64,
    pub full: f64,
}

impl DecomposedCell {
    pub fn new(base: f64, with_a: f64, full: f64) -> Self {
        Self { base, with_a, full }
    }

    pub fn delta_a(&self) -> f64 {
        self.with_a - self.base
    }

    pub fn delta_b(&self) -> f64 {
        self.full - self.with_a
    }

    /// `base + delta_a + delta_b`, summed bottom to top.
    ///
    /// Equal to `full` only up to rounding; the stacked segments end on
    /// `full` exactly.
    pub fn total(&self) -> f64 {
        self.base + self.delta_a() + self.delta_b()
    }

    /// Stacked segments bounded by the measured runtimes, so each one starts
    /// exactly where the one below it ends and the stack tops out at `full`.
    pub fn segments(&self) -> [Segment; 3] {
        [
            Segment {
                role: SegmentRole::Base,
                bottom: 0.0,
                top: self.base,
            },
            Segment {
                role: SegmentRole::DeltaA,
                bottom: self.base,
                top: self.with_a,
            },
            Segment {
                role: SegmentRole::DeltaB,
                bottom: self.with_a,
                top: self.full,
            },
        ]
    }
}

/// Decomposed cells over a grid; `None` where any variant is missing.
#[derive(Debug, Clone, PartialEq)]
pub struct DecomposedMatrix {
    grid: GridSpec,
    cells: Vec<Vec<Option<DecomposedCell>>>,
}

impl DecomposedMatrix {
    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn get(&self, group_index: usize, m_index: usize) -> Option<DecomposedCell> {
        self.cells
            .get(group_index)
            .and_then(|row| row.get(m_index))
            .copied()
            .flatten()
    }

    pub fn rows(&self) -> &[Vec<Option<DecomposedCell>>] {
        &self.cells
    }

    pub fn complete_cells(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.is_some()).count()
    }
}

/// The baseline, +A and +A+B matrices, checked to share one grid.
#[derive(Debug, Clone)]
pub struct VariantTriple {
    names: VariantNames,
    baseline: ResultMatrix,
    with_a: ResultMatrix,
    full: ResultMatrix,
}

impl VariantTriple {
    /// Align three matrices. Any difference in dimensions or grid labels
    /// from the baseline is an error.
    pub fn new(
        names: VariantNames,
        baseline: ResultMatrix,
        with_a: ResultMatrix,
        full: ResultMatrix,
    ) -> GsResult<Self> {
        check_alignment(&baseline, &names.with_a, &with_a)?;
        check_alignment(&baseline, &names.full, &full)?;
        Ok(Self {
            names,
            baseline,
            with_a,
            full,
        })
    }

    /// Load the three named matrices from `store`.
    ///
    /// `grid` is needed only for legacy files that carry no labels; when
    /// given, tagged files must match it too.
    pub fn load(
        store: &ResultStore,
        names: &VariantNames,
        grid: Option<&GridSpec>,
    ) -> GsResult<Self> {
        let load = |name: &str| match grid {
            Some(grid) => store.load_with_grid(name, grid),
            None => store.load(name),
        };
        let baseline = load(&names.baseline)?;
        let with_a = load(&names.with_a)?;
        let full = load(&names.full)?;
        info!(
            "Loaded variants '{}', '{}', '{}' from {}",
            names.baseline,
            names.with_a,
            names.full,
            store.root.display()
        );
        Self::new(names.clone(), baseline, with_a, full)
    }

    pub fn names(&self) -> &VariantNames {
        &self.names
    }

    pub fn grid(&self) -> &GridSpec {
        self.baseline.grid()
    }

    pub fn baseline(&self) -> &ResultMatrix {
        &self.baseline
    }

    pub fn with_a(&self) -> &ResultMatrix {
        &self.with_a
    }

    pub fn full(&self) -> &ResultMatrix {
        &self.full
    }

    pub fn cell(&self, group_index: usize, m_index: usize) -> Option<DecomposedCell> {
        Some(DecomposedCell::new(
            self.baseline.get(group_index, m_index)?,
            self.with_a.get(group_index, m_index)?,
            self.full.get(group_index, m_index)?,
        ))
    }

    pub fn decompose(&self) -> DecomposedMatrix {
        let (rows, cols) = self.grid().dims();
        let cells = (0..rows)
            .map(|g| {
                (0..cols)
                    .map(|m| {
                        let cell = self.cell(g, m);
                        if cell.is_none() {
                            debug!("Cell ({g}, {m}) is missing in at least one variant");
                        }
                        cell
                    })
                    .collect()
            })
            .collect();
        DecomposedMatrix {
            grid: self.grid().clone(),
            cells,
        }
    }
}

fn check_alignment(
    baseline: &ResultMatrix,
    variant: &str,
    other: &ResultMatrix,
) -> Result<(), VariantError> {
    if baseline.dims() != other.dims() {
        return Err(VariantError::DimensionMismatch {
            variant: variant.to_string(),
            expected: baseline.dims(),
            actual: other.dims(),
        });
    }
    baseline
        .ensure_same_grid(other)
        .map_err(|source| VariantError::LabelMismatch {
            variant: variant.to_string(),
            source,
        })
}
