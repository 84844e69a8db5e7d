use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::GsResult;
use crate::grid::{BenchmarkParams, GridSpec};

/// Build directory of the CUTLASS checkout the benchmark lives in
pub const DEFAULT_BUILD_DIR: &str = "/workspace/cutlass/build";

/// Benchmark path relative to the build directory
pub const DEFAULT_EXECUTABLE: &str =
    "examples/79_blackwell_geforce_gemm/79d_blackwell_geforce_nvfp4_grouped_gemm";

/// Configuration for one sweep over the parameter grid.
///
/// A sweep is immutable once started; every component receives it by
/// reference, so several configurations can live in one process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Configuration name; the result matrix is stored under it.
    pub name: String,
    pub grid: GridSpec,
    pub params: BenchmarkParams,
    pub build_dir: PathBuf,
    /// Benchmark executable, absolute or relative to `build_dir`.
    pub executable: PathBuf,
    /// Optional launcher placed in front of the executable
    /// (e.g. `["taskset", "-c", "0"]`).
    pub wrapper: Vec<String>,
    pub timeout_secs: u64,
    pub results_dir: PathBuf,
    /// Reload a stored matrix with the same grid instead of re-measuring.
    pub reuse_stored: bool,
}

impl SweepConfig {
    pub fn new(name: impl Into<String>, grid: GridSpec) -> Self {
        Self {
            name: name.into(),
            grid,
            ..Self::default()
        }
    }

    pub fn with_params(mut self, params: BenchmarkParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_build_dir(mut self, build_dir: impl Into<PathBuf>) -> Self {
        self.build_dir = build_dir.into();
        self
    }

    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn with_wrapper(mut self, wrapper: Vec<String>) -> Self {
        self.wrapper = wrapper;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_results_dir(mut self, results_dir: impl Into<PathBuf>) -> Self {
        self.results_dir = results_dir.into();
        self
    }

    pub fn with_reuse_stored(mut self, reuse: bool) -> Self {
        self.reuse_stored = reuse;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve the benchmark path.
    ///
    /// A file named like the executable directly inside `build_dir` (usually
    /// a symlink) takes precedence over the nested build path.
    pub fn resolve_executable(&self) -> PathBuf {
        if self.executable.is_absolute() {
            return self.executable.clone();
        }
        if let Some(file_name) = self.executable.file_name() {
            let shortcut = self.build_dir.join(file_name);
            if shortcut.exists() {
                return shortcut;
            }
        }
        self.build_dir.join(&self.executable)
    }

    pub fn validate(&self) -> GsResult<()> {
        self.grid.validate()?;
        if self.name.trim().is_empty() {
            return Err(crate::config_error!("sweep name must not be empty"));
        }
        if self.timeout_secs == 0 {
            return Err(crate::config_error!("timeout_secs must be positive"));
        }
        if self.executable.as_os_str().is_empty() {
            return Err(crate::config_error!("executable must be set"));
        }
        Ok(())
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            name: "nvfp4".to_string(),
            grid: GridSpec::default(),
            params: BenchmarkParams::default(),
            build_dir: PathBuf::from(DEFAULT_BUILD_DIR),
            executable: PathBuf::from(DEFAULT_EXECUTABLE),
            wrapper: Vec::new(),
            timeout_secs: 60,
            results_dir: PathBuf::from("."),
            reuse_stored: false,
        }
    }
}

/// Read a JSON document into any config section, or `Default` when the
/// path is `None`.
pub fn load_json_config<T>(path: Option<&Path>) -> GsResult<T>
where
    T: Default + serde::de::DeserializeOwned,
{
    match path {
        None => Ok(T::default()),
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| {
                crate::config_error!("cannot read config {}: {}", path.display(), e)
            })?;
            Ok(serde_json::from_str(&text)?)
        }
    }
}
