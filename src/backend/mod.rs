//! Interfaces to the external tools the tuner drives.

mod evaluator;
mod klee;
mod process;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::models::Parameters;

pub use evaluator::{parse_report, CommandEvaluator, DEFAULT_REPLAY_TIMEOUT};
pub use klee::{collect_ktests, klee_arguments, Klee, FAILURE_LOG};
pub use process::{absolute, locate, run_with_timeout, smoke_test, TimedOutput};

/// A test-generation tool that can be run with a flat option set.
pub trait SearchProcedure {
    fn name(&self) -> &str;

    /// Option through which the time slice is passed.
    fn time_parameter(&self) -> &str;

    /// Option through which the per-round output directory is passed.
    fn output_parameter(&self) -> &str;

    /// Run once and return the generated artifacts.
    ///
    /// Failures are logged and yield an empty list.
    fn run(&self, target: &Path, parameters: &Parameters, time_slice: u64) -> Vec<PathBuf>;
}

/// Coverage and defects exhibited by one artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    pub coverage: BTreeSet<String>,
    pub defects: BTreeSet<String>,
}

/// Replays artifacts against an instrumented target.
pub trait Evaluator {
    fn evaluate(&self, target: &Path, artifact: &Path) -> Evaluation;
}
