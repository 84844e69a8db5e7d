//! GemmSweep CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gs_data::ResultStore;
use gs_report::{render_report, render_runtime_lines, ReportConfig, VariantTriple};
use gs_sweep::{ExternalBenchmark, GridSweep};
use gs_types::{load_json_config, GridSpec, ResultMatrix, SweepConfig};

/// Everything a config file may set. Missing sections fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct ToolConfig {
    sweep: SweepConfig,
    report: ReportConfig,
}

#[derive(Parser)]
#[command(name = "gemmsweep")]
#[command(about = "GemmSweep - grouped GEMM parameter sweeps and variant breakdown charts")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error). RUST_LOG overrides it.
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,

    /// JSON configuration file with optional `sweep` and `report` sections
    #[arg(short, long, global = true, env = "GEMMSWEEP_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the exp_results_<name>.json files
    #[arg(long, global = true)]
    results_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the benchmark over the grid and store the result matrix
    Sweep {
        /// Configuration name the matrix is stored under
        #[arg(long)]
        name: Option<String>,

        /// Build directory holding the benchmark executable
        #[arg(long, env = "BUILD_DIR")]
        build_dir: Option<PathBuf>,

        /// Benchmark executable, absolute or relative to the build directory
        #[arg(long)]
        executable: Option<PathBuf>,

        /// Per-trial timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Launcher placed in front of the executable, comma separated
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        wrapper: Vec<String>,

        /// Reload a stored matrix for the same grid instead of measuring
        #[arg(long)]
        reuse: bool,

        /// Also draw the runtime-per-group line chart
        #[arg(long)]
        lines: bool,
    },

    /// Decompose the three stored variants and draw the breakdown charts
    Render {
        /// Directory the PNG files are written to
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Group index drawn in the single-panel chart
        #[arg(long)]
        group: Option<usize>,
    },

    /// Print a stored result matrix
    Show {
        /// Configuration name
        name: String,
    },
}

fn init_tracing(level: tracing::Level) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn load_tool_config(cli: &Cli) -> Result<ToolConfig> {
    let mut tool: ToolConfig = load_json_config(cli.config.as_deref())
        .with_context(|| "failed to load configuration")?;
    if let Some(dir) = &cli.results_dir {
        tool.sweep.results_dir = dir.clone();
    }
    Ok(tool)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    let tool = load_tool_config(&cli)?;

    match cli.command {
        Commands::Sweep {
            name,
            build_dir,
            executable,
            timeout,
            wrapper,
            reuse,
            lines,
        } => {
            let overrides = SweepOverrides {
                name,
                build_dir,
                executable,
                timeout,
                wrapper,
                reuse,
            };
            cmd_sweep(tool, overrides, lines).await
        }
        Commands::Render { output_dir, group } => cmd_render(tool, output_dir, group),
        Commands::Show { name } => cmd_show(&tool, &name),
    }
}

#[derive(Debug, Default)]
struct SweepOverrides {
    name: Option<String>,
    build_dir: Option<PathBuf>,
    executable: Option<PathBuf>,
    timeout: Option<u64>,
    wrapper: Vec<String>,
    reuse: bool,
}

impl SweepOverrides {
    fn apply(self, mut config: SweepConfig) -> SweepConfig {
        if let Some(name) = self.name {
            config.name = name;
        }
        if let Some(build_dir) = self.build_dir {
            config = config.with_build_dir(build_dir);
        }
        if let Some(executable) = self.executable {
            config = config.with_executable(executable);
        }
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }
        if !self.wrapper.is_empty() {
            config = config.with_wrapper(self.wrapper);
        }
        if self.reuse {
            config = config.with_reuse_stored(true);
        }
        config
    }
}

async fn cmd_sweep(tool: ToolConfig, overrides: SweepOverrides, lines: bool) -> Result<()> {
    let config = overrides.apply(tool.sweep);
    config.validate()?;

    let store = ResultStore::new(&config.results_dir)?;
    let runner = ExternalBenchmark::from_config(&config);
    if config.wrapper.is_empty() && !runner.program().exists() {
        warn!(
            "Benchmark executable {} does not exist; every trial will fail",
            runner.program().display()
        );
    }
    info!("Using executable: {}", runner.program().display());

    let sweep = GridSweep::new(&config, runner);
    let report = sweep.load_or_run(&store).await?;

    println!("{}", format_matrix(&report.matrix));
    println!(
        "Stored '{}' in {} ({} measured, {} missing)",
        config.name,
        store.path_for(&config.name).display(),
        report.matrix.measured_count(),
        report.matrix.missing_count()
    );

    if lines {
        let path = render_runtime_lines(&report.matrix, &tool.report, &config.params)?;
        println!("Plot saved to: {}", path.display());
    }
    Ok(())
}

fn cmd_render(tool: ToolConfig, output_dir: Option<PathBuf>, group: Option<usize>) -> Result<()> {
    let mut report = tool.report;
    if let Some(dir) = output_dir {
        report = report.with_output_dir(dir);
    }
    if let Some(group) = group {
        report = report.with_representative_group(group);
    }

    let store = ResultStore::new(&tool.sweep.results_dir)?;
    let triple = VariantTriple::load(&store, &report.variants, Some(&tool.sweep.grid))
        .with_context(|| format!("failed to load variants from {}", store.root.display()))?;

    let decomposed = triple.decompose();
    let total = tool.sweep.grid.total_cells();
    if decomposed.complete_cells() < total {
        warn!(
            "{} of {} cells are missing in at least one variant and are left blank",
            total - decomposed.complete_cells(),
            total
        );
    }

    for path in render_report(&decomposed, &report, &tool.sweep.params)? {
        println!("Saved: {}", path.display());
    }
    Ok(())
}

fn cmd_show(tool: &ToolConfig, name: &str) -> Result<()> {
    let store = ResultStore::new(&tool.sweep.results_dir)?;
    let matrix = load_any(&store, name, &tool.sweep.grid)?;
    println!("{}", format_matrix(&matrix));
    Ok(())
}

/// Load a tagged record as stored, or a legacy file against the configured grid.
fn load_any(store: &ResultStore, name: &str, grid: &GridSpec) -> Result<ResultMatrix> {
    match store.load(name) {
        Ok(matrix) => Ok(matrix),
        Err(gs_types::GsError::Storage(gs_types::StorageError::Corrupt { .. })) => store
            .load_with_grid(name, grid)
            .with_context(|| format!("failed to load '{name}'")),
        Err(e) => Err(anyhow::Error::new(e).context(format!("failed to load '{name}'"))),
    }
}

/// Plain-text table: one row per group count, one column per M, `-` for missing.
fn format_matrix(matrix: &ResultMatrix) -> String {
    let grid = matrix.grid();
    let mut out = format!("{:>8}", "groups\\m");
    for m in &grid.m {
        out.push_str(&format!(" {m:>10}"));
    }
    for (groups, row) in grid.groups.iter().zip(matrix.rows()) {
        out.push('\n');
        out.push_str(&format!("{groups:>8}"));
        for cell in row {
            match cell {
                Some(millis) => out.push_str(&format!(" {millis:>10.6}")),
                None => out.push_str(&format!(" {:>10}", "-")),
            }
        }
    }
    out
}
