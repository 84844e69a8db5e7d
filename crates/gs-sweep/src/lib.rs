//! # gs-sweep
//!
//! Parameter sweep over the grouped-GEMM benchmark.
//!
//! Provides the benchmark runner seam, timing extraction, per-trial tracking
//! and the grid sweep executor that fills and persists a result matrix.

mod extractor;
mod invoker;
mod sweep;
mod trial;

pub use extractor::{extract, parse_timings, Extraction, Schedule, EXCERPT_CHARS};
pub use invoker::{benchmark_args, BenchmarkRunner, ExternalBenchmark, InvocationOutcome};
pub use sweep::{GridSweep, SweepReport};
pub use trial::{MissingReason, SweepId, SweepState, SweepStatus, TrialRecord, TrialStatus};
