//! Grid sweep executor: one benchmark run per cell, groups outer, m inner.

use tracing::{debug, info, warn};

use gs_data::ResultStore;
use gs_types::{GridPoint, GsResult, ResultMatrix, SweepConfig};

use crate::extractor::{extract, Extraction};
use crate::invoker::{BenchmarkRunner, InvocationOutcome};
use crate::trial::{MissingReason, SweepId, SweepState, SweepStatus, TrialRecord};

/// Everything a sweep produced.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub matrix: ResultMatrix,
    /// Per-cell trial records in sweep order; empty when `reused` is set.
    pub trials: Vec<TrialRecord>,
    pub status: SweepStatus,
    /// The matrix was reloaded from storage rather than measured.
    pub reused: bool,
}

/// Drives a [`BenchmarkRunner`] over every cell of the configured grid.
///
/// Trials run strictly one after another. A failing cell becomes a missing
/// value and the sweep moves on.
pub struct GridSweep<'a, R> {
    config: &'a SweepConfig,
    runner: R,
}

impl<'a, R: BenchmarkRunner> GridSweep<'a, R> {
    pub fn new(config: &'a SweepConfig, runner: R) -> Self {
        Self { config, runner }
    }

    /// Measure every cell of the grid.
    pub async fn run(&self) -> GsResult<SweepReport> {
        self.config.validate()?;
        let grid = &self.config.grid;
        let params = &self.config.params;

        info!(
            "Running sweep '{}' with n={}, k={}, alpha={}, beta={} using {} runner",
            self.config.name,
            params.n,
            params.k,
            params.alpha,
            params.beta,
            self.runner.name()
        );
        info!("M values: {:?}", grid.m);
        info!("Group values: {:?}", grid.groups);

        let mut matrix = ResultMatrix::empty(grid.clone());
        let mut trials = Vec::with_capacity(grid.total_cells());
        let mut status = SweepStatus::new(self.config.name.clone());
        status.mark_running();

        for (trial_number, point) in grid.points().enumerate() {
            if point.m_index == 0 {
                info!("=== Groups = {} ===", point.groups);
            }
            let trial = self.run_trial(status.id, trial_number, point).await;
            matrix.set(point.group_index, point.m_index, trial.millis)?;
            status.record(&trial);
            trials.push(trial);
        }

        status.mark_completed();
        match status.fastest.as_ref() {
            Some(best) => info!(
                "Sweep '{}' finished: {} measured, {} missing, fastest {} at {:.6}ms",
                self.config.name,
                status.trials_measured,
                status.trials_missing,
                best.point,
                best.millis.unwrap_or_default()
            ),
            None => warn!(
                "Sweep '{}' finished without a single measurement ({} cells missing)",
                self.config.name, status.trials_missing
            ),
        }

        Ok(SweepReport {
            matrix,
            trials,
            status,
            reused: false,
        })
    }

    /// Invoke, extract and record a single cell.
    pub async fn run_trial(
        &self,
        sweep_id: SweepId,
        trial_number: usize,
        point: GridPoint,
    ) -> TrialRecord {
        let mut trial = TrialRecord::new(sweep_id, trial_number, point);
        trial.mark_running();

        let stdout = match self.runner.run(&point, &self.config.params).await {
            InvocationOutcome::Completed { stdout, .. } => stdout,
            InvocationOutcome::TimedOut { .. } => {
                info!("  {point}: Timeout");
                trial.mark_missing(MissingReason::TimedOut);
                return trial;
            }
            InvocationOutcome::ProcessError { detail } => {
                info!("  {point}: Error - {detail}");
                trial.mark_missing(MissingReason::ProcessError(detail));
                return trial;
            }
        };

        match extract(&stdout) {
            Extraction::Selected {
                millis,
                winner,
                cooperative,
                pingpong,
            } => {
                info!(
                    "  {point}: Coop={cooperative:.6}ms, Ping={pingpong:.6}ms -> {winner} ({millis:.6}ms)"
                );
                trial.mark_measured(millis, Some(winner), None);
            }
            Extraction::SingleSchedule { millis } => {
                info!("  {point}: Only one result={millis}ms");
                trial.mark_measured(millis, None, Some("only one schedule reported".to_string()));
            }
            Extraction::NoTiming { excerpt } => {
                info!("  {point}: No timing found in output");
                info!("    stdout: {excerpt}");
                trial.mark_missing(MissingReason::NoTiming);
            }
        }
        trial
    }

    /// Measure every cell and store the matrix under the configuration name.
    pub async fn run_and_persist(&self, store: &ResultStore) -> GsResult<SweepReport> {
        let report = self.run().await?;
        store.save(&self.config.name, &report.matrix, Some(self.config.params))?;
        Ok(report)
    }

    /// Reload the stored matrix when `reuse_stored` is set and a matrix for
    /// the same grid exists; otherwise measure and persist.
    pub async fn load_or_run(&self, store: &ResultStore) -> GsResult<SweepReport> {
        if self.config.reuse_stored && store.exists(&self.config.name) {
            match store.load_with_grid(&self.config.name, &self.config.grid) {
                Ok(matrix) => {
                    info!(
                        "Reusing stored results for '{}' from {}",
                        self.config.name,
                        store.path_for(&self.config.name).display()
                    );
                    return Ok(reused_report(&self.config.name, matrix));
                }
                Err(e) => warn!(
                    "Stored results for '{}' are unusable ({}); measuring again",
                    self.config.name, e
                ),
            }
        } else {
            debug!("No reusable results for '{}'", self.config.name);
        }
        self.run_and_persist(store).await
    }
}

fn reused_report(name: &str, matrix: ResultMatrix) -> SweepReport {
    let mut status = SweepStatus::new(name);
    status.state = SweepState::Completed;
    status.trials_measured = matrix.measured_count();
    status.trials_missing = matrix.missing_count();
    SweepReport {
        matrix,
        trials: Vec::new(),
        status,
        reused: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gs_types::{BenchmarkParams, GridSpec};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::trial::TrialStatus;

    /// Replays canned outcomes and remembers the order cells were asked for.
    struct ScriptedRunner {
        outcomes: HashMap<(u32, u32), InvocationOutcome>,
        default_millis: f64,
        calls: Mutex<Vec<(u32, u32)>>,
    }

    impl ScriptedRunner {
        fn new(default_millis: f64) -> Self {
            Self {
                outcomes: HashMap::new(),
                default_millis,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn with(mut self, groups: u32, m: u32, outcome: InvocationOutcome) -> Self {
            self.outcomes.insert((groups, m), outcome);
            self
        }

        fn calls(&self) -> Vec<(u32, u32)> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn two_schedules(coop: f64, ping: f64) -> InvocationOutcome {
        InvocationOutcome::Completed {
            stdout: format!(
                "Running kernel with Cooperative kernel schedule:\n  Cuda Graph Avg Time : {coop} ms\n\
                 Running kernel with Pingpong kernel schedule:\n  Cuda Graph Avg Time : {ping} ms\n"
            ),
            exit_ok: true,
        }
    }

    #[async_trait]
    impl BenchmarkRunner for ScriptedRunner {
        async fn run(&self, point: &GridPoint, _params: &BenchmarkParams) -> InvocationOutcome {
            self.calls.lock().unwrap().push((point.groups, point.m));
            self.outcomes
                .get(&(point.groups, point.m))
                .cloned()
                .unwrap_or_else(|| two_schedules(self.default_millis, self.default_millis * 2.0))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn small_config() -> SweepConfig {
        SweepConfig::new(
            "nvfp4",
            GridSpec::new(vec![8, 16], vec![1, 32, 512]).unwrap(),
        )
    }

    #[tokio::test]
    async fn sweeps_groups_outer_m_inner() {
        let config = small_config();
        let runner = ScriptedRunner::new(0.01);
        let report = GridSweep::new(&config, &runner).run().await.unwrap();

        assert_eq!(
            runner.calls(),
            vec![(8, 1), (8, 32), (8, 512), (16, 1), (16, 32), (16, 512)]
        );
        assert_eq!(report.matrix.dims(), (2, 3));
        assert_eq!(report.trials.len(), 6);
        assert_eq!(report.trials[4].point.m, 32);
        assert!(!report.reused);
    }

    #[tokio::test]
    async fn failed_cells_become_missing_and_sweep_continues() {
        let config = small_config();
        let runner = ScriptedRunner::new(0.01)
            .with(8, 32, InvocationOutcome::TimedOut {
                after: std::time::Duration::from_secs(60),
            })
            .with(16, 1, InvocationOutcome::ProcessError {
                detail: "exec format error".into(),
            })
            .with(16, 512, InvocationOutcome::Completed {
                stdout: "Capture failed\n".into(),
                exit_ok: false,
            })
            .with(8, 512, two_schedules(0.0172, 0.0091));

        let report = GridSweep::new(&config, &runner).run().await.unwrap();
        let m = &report.matrix;

        assert_eq!(m.get(0, 1), None);
        assert_eq!(m.get(1, 0), None);
        assert_eq!(m.get(1, 2), None);
        assert_eq!(m.get(0, 2), Some(0.0091));
        assert_eq!(m.get(0, 0), Some(0.01));
        assert_eq!(report.status.trials_missing, 3);
        assert_eq!(report.status.trials_measured, 3);
        assert_eq!(report.status.state, SweepState::Completed);
        assert_eq!(
            report.trials[1].missing_reason,
            Some(MissingReason::TimedOut)
        );
        assert_eq!(report.trials[5].status, TrialStatus::Missing);
        assert_eq!(runner.calls().len(), 6);
    }

    #[tokio::test]
    async fn single_schedule_is_kept_with_note() {
        let config = small_config();
        let runner = ScriptedRunner::new(0.01).with(
            8,
            1,
            InvocationOutcome::Completed {
                stdout: "Cuda Graph Avg Time : 0.042 ms\n".into(),
                exit_ok: true,
            },
        );

        let report = GridSweep::new(&config, &runner).run().await.unwrap();
        assert_eq!(report.matrix.get(0, 0), Some(0.042));
        assert!(report.trials[0].note.is_some());
        assert_eq!(report.trials[0].winner, None);
    }

    #[tokio::test]
    async fn random_grids_stay_rectangular() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..10 {
            let n_groups = rng.gen_range(1..=6);
            let n_m = rng.gen_range(1..=8);
            let groups: Vec<u32> = (1..=n_groups).map(|g| g * 8).collect();
            let m: Vec<u32> = (0..n_m).map(|i| 1 << i).collect();
            let config = SweepConfig::new("random", GridSpec::new(groups, m).unwrap());

            let runner = ScriptedRunner::new(rng.gen_range(0.001..1.0));
            let report = GridSweep::new(&config, &runner).run().await.unwrap();

            let rows = report.matrix.rows();
            assert_eq!(rows.len(), n_groups as usize);
            assert!(rows.iter().all(|row| row.len() == n_m as usize));
        }
    }

    #[tokio::test]
    async fn persisted_matrix_mirrors_grid_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path()).unwrap();
        let config = small_config();
        let runner = ScriptedRunner::new(0.01).with(16, 512, two_schedules(0.5, 0.7));

        let report = GridSweep::new(&config, &runner)
            .run_and_persist(&store)
            .await
            .unwrap();
        let loaded = store.load("nvfp4").unwrap();

        assert_eq!(loaded, report.matrix);
        assert_eq!(loaded.get(1, 2), Some(0.5));
        assert_eq!(loaded.grid().groups, vec![8, 16]);
    }

    #[tokio::test]
    async fn reuse_skips_measurement() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path()).unwrap();
        let config = small_config().with_reuse_stored(true);

        let first = ScriptedRunner::new(0.01);
        GridSweep::new(&config, &first).load_or_run(&store).await.unwrap();
        assert_eq!(first.calls().len(), 6);

        let second = ScriptedRunner::new(0.02);
        let report = GridSweep::new(&config, &second).load_or_run(&store).await.unwrap();
        assert!(report.reused);
        assert!(second.calls().is_empty());
        assert_eq!(report.matrix.get(0, 0), Some(0.01));
        assert_eq!(report.status.trials_measured, 6);
    }

    #[tokio::test]
    async fn without_reuse_every_run_measures() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path()).unwrap();
        let config = small_config();

        GridSweep::new(&config, ScriptedRunner::new(0.01))
            .load_or_run(&store)
            .await
            .unwrap();
        let runner = ScriptedRunner::new(0.02);
        let report = GridSweep::new(&config, &runner).load_or_run(&store).await.unwrap();

        assert!(!report.reused);
        assert_eq!(runner.calls().len(), 6);
        assert_eq!(store.load("nvfp4").unwrap().get(0, 0), Some(0.02));
    }
}
