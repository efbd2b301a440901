use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use log::{debug, warn};

use crate::backend::process::{locate, run_with_timeout};
use crate::backend::{Evaluation, Evaluator};
use crate::error::Result;

/// Default deadline for replaying one artifact.
pub const DEFAULT_REPLAY_TIMEOUT: Duration = Duration::from_millis(100);

/// Evaluator backed by an external replay command.
///
/// The command is invoked as `<bin> <target> <artifact>` and reports one id
/// per stdout line:
///
/// ```text
/// cov src/main.c 42
/// bug src/main.c 57
/// ```
///
/// Other lines are ignored. When the deadline passes the command is killed;
/// coverage lines it already flushed are kept and defect lines are dropped.
#[derive(Debug, Clone)]
pub struct CommandEvaluator {
    bin: PathBuf,
    timeout: Duration,
}

impl CommandEvaluator {
    /// Locate the evaluator executable.
    ///
    /// Locating is the only startup check: the replay protocol has no
    /// side-effect-free invocation to smoke-test with.
    pub fn new(bin: &str, timeout: Duration) -> Result<Self> {
        let path = locate("evaluator", bin)?;
        Ok(Self { bin: path, timeout })
    }
}

/// Split evaluator output into coverage and defect ids.
pub fn parse_report(stdout: &str) -> Evaluation {
    let mut evaluation = Evaluation::default();
    for line in stdout.lines() {
        let line = line.trim();
        if let Some(id) = line.strip_prefix("cov ") {
            evaluation.coverage.insert(id.trim().to_string());
        } else if let Some(id) = line.strip_prefix("bug ") {
            evaluation.defects.insert(id.trim().to_string());
        }
    }
    evaluation
}

impl Evaluator for CommandEvaluator {
    fn evaluate(&self, target: &Path, artifact: &Path) -> Evaluation {
        let mut command = Command::new(&self.bin);
        command.arg(target).arg(artifact);
        debug!(
            "evaluator command: {} {} {}",
            self.bin.display(),
            target.display(),
            artifact.display()
        );

        let output = match run_with_timeout(&mut command, self.timeout) {
            Ok(output) => output,
            Err(e) => {
                warn!("Failed to run evaluator on {}: {}", artifact.display(), e);
                return Evaluation::default();
            }
        };

        let mut evaluation = parse_report(&output.stdout);
        if output.timed_out() {
            warn!("Replay timeout: {}", artifact.display());
            evaluation.defects.clear();
        }
        evaluation
    }
}
