use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use gs_types::{
    BenchmarkParams, Cell, GridSpec, GsResult, ResultMatrix, StorageError,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

/// Current on-disk record version
pub const RECORD_VERSION: u32 = 1;

const FILE_PREFIX: &str = "exp_results_";
const FILE_EXTENSION: &str = "json";

/// Persisted form of a result matrix.
///
/// The grid labels travel with the values so a reader can check that row
/// `g`, column `m` means what it thinks it means.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixRecord {
    pub version: u32,
    pub name: String,
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<BenchmarkParams>,
    pub grid: GridSpec,
    pub values: Vec<Vec<Cell>>,
}

impl MatrixRecord {
    pub fn new(name: &str, matrix: &ResultMatrix, params: Option<BenchmarkParams>) -> Self {
        Self {
            version: RECORD_VERSION,
            name: name.to_string(),
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            params,
            grid: matrix.grid().clone(),
            values: matrix.rows().to_vec(),
        }
    }
}

/// Either the tagged record or the bare array-of-arrays written by the
/// older sweep scripts.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredMatrix {
    Tagged(MatrixRecord),
    Legacy(Vec<Vec<Cell>>),
}

/// Storage manager for result matrices, one JSON file per configuration name
#[derive(Debug, Clone)]
pub struct ResultStore {
    pub root: PathBuf,
}

impl ResultStore {
    pub fn new<P: AsRef<Path>>(root: P) -> GsResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;

        Ok(Self { root })
    }

    /// Storage path for a configuration name
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root
            .join(format!("{FILE_PREFIX}{name}.{FILE_EXTENSION}"))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }

    /// Persist a matrix under `name`, replacing any previous run.
    pub fn save(
        &self,
        name: &str,
        matrix: &ResultMatrix,
        params: Option<BenchmarkParams>,
    ) -> GsResult<PathBuf> {
        let path = self.path_for(name);
        let record = MatrixRecord::new(name, matrix, params);
        let json = serde_json::to_string_pretty(&record)?;

        // Write beside the target and rename so readers never see half a file.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;

        info!(
            "Saved results '{}' ({} measured, {} missing) to {}",
            name,
            matrix.measured_count(),
            matrix.missing_count(),
            path.display()
        );
        Ok(path)
    }

    /// Load the full record for `name`. Legacy files carry no grid and are
    /// rejected here; use [`ResultStore::load_with_grid`] for them.
    pub fn load_record(&self, name: &str) -> GsResult<MatrixRecord> {
        let path = self.path_for(name);
        match self.read(name, &path)? {
            StoredMatrix::Tagged(record) => {
                check_version(&record)?;
                Ok(record)
            }
            StoredMatrix::Legacy(_) => Err(StorageError::Corrupt {
                path: path.display().to_string(),
                message: "untagged array-of-arrays file; a grid must be supplied to load it"
                    .to_string(),
            }
            .into()),
        }
    }

    pub fn load(&self, name: &str) -> GsResult<ResultMatrix> {
        let record = self.load_record(name)?;
        ResultMatrix::from_rows(record.grid, record.values)
    }

    /// Load `name`, accepting legacy files by attaching `grid` to them.
    ///
    /// Tagged records must have been measured on exactly `grid`.
    pub fn load_with_grid(&self, name: &str, grid: &GridSpec) -> GsResult<ResultMatrix> {
        let path = self.path_for(name);
        match self.read(name, &path)? {
            StoredMatrix::Tagged(record) => {
                check_version(&record)?;
                grid.ensure_matches(&record.grid)?;
                ResultMatrix::from_rows(record.grid, record.values)
            }
            StoredMatrix::Legacy(rows) => {
                debug!("Loading legacy result file {}", path.display());
                ResultMatrix::from_rows(grid.clone(), rows)
            }
        }
    }

    fn read(&self, name: &str, path: &Path) -> GsResult<StoredMatrix> {
        if !path.is_file() {
            return Err(StorageError::NotFound {
                name: name.to_string(),
                path: path.display().to_string(),
            }
            .into());
        }
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            StorageError::Corrupt {
                path: path.display().to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// List stored configuration names, sorted
    pub fn list(&self) -> GsResult<Vec<String>> {
        let mut names = Vec::new();

        if !self.root.exists() {
            return Ok(names);
        }

        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if !path.is_file()
                || path.extension().and_then(|s| s.to_str()) != Some(FILE_EXTENSION)
            {
                continue;
            }
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.strip_prefix(FILE_PREFIX));
            if let Some(name) = name {
                names.push(name.to_string());
            }
        }

        names.sort();
        Ok(names)
    }
}

fn check_version(record: &MatrixRecord) -> GsResult<()> {
    if record.version != RECORD_VERSION {
        return Err(StorageError::UnsupportedVersion {
            found: record.version,
            expected: RECORD_VERSION,
        }
        .into());
    }
    Ok(())
}
