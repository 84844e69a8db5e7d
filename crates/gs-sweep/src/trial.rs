//! Trial tracking and sweep run status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gs_types::GridPoint;

use crate::extractor::Schedule;

/// Unique sweep run identifier.
pub type SweepId = Uuid;

/// Why a cell ended up without a runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MissingReason {
    TimedOut,
    ProcessError(String),
    NoTiming,
}

impl std::fmt::Display for MissingReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TimedOut => write!(f, "timeout"),
            Self::ProcessError(detail) => write!(f, "process error: {detail}"),
            Self::NoTiming => write!(f, "no timing found in output"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialStatus {
    Pending,
    Running,
    Measured,
    Missing,
}

/// A single trial (one grid cell evaluated by the benchmark).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub id: Uuid,
    pub sweep_id: SweepId,
    pub trial_number: usize,
    pub point: GridPoint,
    pub status: TrialStatus,
    pub millis: Option<f64>,
    pub winner: Option<Schedule>,
    /// Extra context such as "only one schedule reported".
    pub note: Option<String>,
    pub missing_reason: Option<MissingReason>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TrialRecord {
    pub fn new(sweep_id: SweepId, trial_number: usize, point: GridPoint) -> Self {
        Self {
            id: Uuid::new_v4(),
            sweep_id,
            trial_number,
            point,
            status: TrialStatus::Pending,
            millis: None,
            winner: None,
            note: None,
            missing_reason: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = TrialStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_measured(&mut self, millis: f64, winner: Option<Schedule>, note: Option<String>) {
        self.status = TrialStatus::Measured;
        self.finished_at = Some(Utc::now());
        self.millis = Some(millis);
        self.winner = winner;
        self.note = note;
    }

    pub fn mark_missing(&mut self, reason: MissingReason) {
        self.status = TrialStatus::Missing;
        self.finished_at = Some(Utc::now());
        self.missing_reason = Some(reason);
    }
}

/// Lifecycle state for a sweep run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepState {
    Pending,
    Running,
    Completed,
}

/// Aggregate status of a sweep run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepStatus {
    pub id: SweepId,
    pub name: String,
    pub state: SweepState,
    pub trials_measured: usize,
    pub trials_missing: usize,
    pub fastest: Option<TrialRecord>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SweepStatus {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            state: SweepState::Pending,
            trials_measured: 0,
            trials_missing: 0,
            fastest: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.state = SweepState::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.state = SweepState::Completed;
        self.finished_at = Some(Utc::now());
    }

    /// Count a finished trial and keep the fastest measured one.
    pub fn record(&mut self, trial: &TrialRecord) {
        match (trial.status, trial.millis) {
            (TrialStatus::Measured, Some(millis)) => {
                self.trials_measured += 1;
                let faster = match self.fastest.as_ref().and_then(|best| best.millis) {
                    None => true,
                    Some(best) => millis < best,
                };
                if faster {
                    self.fastest = Some(trial.clone());
                }
            }
            (TrialStatus::Missing, _) => self.trials_missing += 1,
            _ => {}
        }
    }

    pub fn trials_finished(&self) -> usize {
        self.trials_measured + self.trials_missing
    }
}
