//! Launching the external benchmark for one grid cell.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

use gs_types::{BenchmarkParams, GridPoint, SweepConfig};

/// Raw result of launching the benchmark once.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationOutcome {
    /// The process exited; stdout is kept even for a failing exit status.
    Completed { stdout: String, exit_ok: bool },
    TimedOut { after: Duration },
    ProcessError { detail: String },
}

/// Runs one trial of the benchmark.
///
/// Implementations never retry and never panic: every failure is reported
/// through [`InvocationOutcome`].
#[async_trait]
pub trait BenchmarkRunner: Send + Sync {
    async fn run(&self, point: &GridPoint, params: &BenchmarkParams) -> InvocationOutcome;

    /// Human-readable runner name.
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: BenchmarkRunner + ?Sized> BenchmarkRunner for &T {
    async fn run(&self, point: &GridPoint, params: &BenchmarkParams) -> InvocationOutcome {
        (**self).run(point, params).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Benchmark flags for one cell, in the order the benchmark documents them.
pub fn benchmark_args(point: &GridPoint, params: &BenchmarkParams) -> Vec<String> {
    vec![
        "--no_verif".to_string(),
        format!("--alpha={}", params.alpha),
        format!("--beta={}", params.beta),
        format!("--m={}", point.m),
        format!("--n={}", params.n),
        format!("--k={}", params.k),
        format!("--groups={}", point.groups),
    ]
}

/// The real benchmark executable, run as a child process.
#[derive(Debug, Clone)]
pub struct ExternalBenchmark {
    program: PathBuf,
    wrapper: Vec<String>,
    timeout: Duration,
}

impl ExternalBenchmark {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            wrapper: Vec::new(),
            timeout,
        }
    }

    pub fn from_config(config: &SweepConfig) -> Self {
        Self::new(config.resolve_executable(), config.timeout()).with_wrapper(config.wrapper.clone())
    }

    pub fn with_wrapper(mut self, wrapper: Vec<String>) -> Self {
        self.wrapper = wrapper;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = match self.wrapper.split_first() {
            Some((launcher, launcher_args)) => {
                let mut cmd = Command::new(launcher);
                cmd.args(launcher_args).arg(&self.program);
                cmd
            }
            None => Command::new(&self.program),
        };
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl BenchmarkRunner for ExternalBenchmark {
    async fn run(&self, point: &GridPoint, params: &BenchmarkParams) -> InvocationOutcome {
        let args = benchmark_args(point, params);
        debug!("{point}: launching {} {}", self.program.display(), args.join(" "));

        let child = match self.command(&args).spawn() {
            Ok(child) => child,
            Err(e) => {
                let detail = format!("failed to launch {}: {e}", self.program.display());
                warn!("{point}: Error - {detail}");
                return InvocationOutcome::ProcessError { detail };
            }
        };

        let started = Instant::now();
        // Dropping the wait future on timeout drops the child, which kills it.
        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Err(_) => {
                warn!("{point}: Timeout after {}s", self.timeout.as_secs_f64());
                InvocationOutcome::TimedOut {
                    after: started.elapsed(),
                }
            }
            Ok(Err(e)) => {
                let detail = format!("waiting for {} failed: {e}", self.program.display());
                warn!("{point}: Error - {detail}");
                InvocationOutcome::ProcessError { detail }
            }
            Ok(Ok(output)) => {
                let exit_ok = output.status.success();
                if !exit_ok {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    warn!(
                        "{point}: benchmark exited with {} ({})",
                        output.status,
                        stderr.trim()
                    );
                }
                debug!("{point}: finished in {:.2?}", started.elapsed());
                InvocationOutcome::Completed {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    exit_ok,
                }
            }
        }
    }

    fn name(&self) -> &str {
        "external"
    }
}
