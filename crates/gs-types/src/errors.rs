use thiserror::Error;

/// Main error type for the GemmSweep system
#[derive(Error, Debug)]
pub enum GsError {
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Variant error: {0}")]
    Variant(#[from] VariantError),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Which axis of the parameter grid an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Groups,
    M,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::Groups => write!(f, "groups"),
            Axis::M => write!(f, "m"),
        }
    }
}

/// Grid and result-matrix shape errors
#[derive(Error, Debug, PartialEq)]
pub enum GridError {
    #[error("Axis {axis} has no values")]
    EmptyAxis { axis: Axis },

    #[error("Axis {axis} contains non-positive label {value}")]
    NonPositiveLabel { axis: Axis, value: u32 },

    #[error("Axis {axis} contains duplicate label {value}")]
    DuplicateLabel { axis: Axis, value: u32 },

    #[error("Expected {expected} group rows, found {actual}")]
    RowCount { expected: usize, actual: usize },

    #[error("Row {row} has {actual} cells, expected {expected}")]
    RaggedRow { row: usize, expected: usize, actual: usize },

    #[error("Cell ({group_index}, {m_index}) holds invalid runtime {value}")]
    InvalidValue { group_index: usize, m_index: usize, value: f64 },

    #[error("Cell ({group_index}, {m_index}) is outside a {rows}x{cols} grid")]
    IndexOutOfRange {
        group_index: usize,
        m_index: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Grid dimensions differ: expected {expected:?}, found {actual:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Grid labels differ on axis {axis}: expected {expected:?}, found {actual:?}")]
    LabelMismatch {
        axis: Axis,
        expected: Vec<u32>,
        actual: Vec<u32>,
    },
}

/// Result storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("No stored results for '{name}' at {path}")]
    NotFound { name: String, path: String },

    #[error("Unsupported result record version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Corrupt result file {path}: {message}")]
    Corrupt { path: String, message: String },
}

/// Variant triple errors
#[derive(Error, Debug)]
pub enum VariantError {
    #[error("Variant '{variant}' has dimensions {actual:?}, expected {expected:?}")]
    DimensionMismatch {
        variant: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Variant '{variant}' was measured on a different grid: {source}")]
    LabelMismatch {
        variant: String,
        #[source]
        source: GridError,
    },
}

/// Result type alias for GemmSweep operations
pub type GsResult<T> = Result<T, GsError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::GsError::Config(format!($($arg)*))
    };
}
