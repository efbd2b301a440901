use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::models::Draw;

/// Evaluation result of one generated artifact.
///
/// Created once per artifact and never changed afterwards.
#[derive(Debug, Clone)]
pub struct Observation {
    /// Coverage ids hit by replaying the artifact.
    pub coverage: BTreeSet<String>,

    /// Defect ids exhibited by the artifact.
    pub defects: BTreeSet<String>,

    /// The generated test input.
    pub artifact: PathBuf,

    /// Tuning-space values used in the round that produced the artifact.
    pub draw: Draw,
}

impl Observation {
    pub fn new(
        coverage: BTreeSet<String>,
        defects: BTreeSet<String>,
        artifact: PathBuf,
        draw: Draw,
    ) -> Self {
        Self {
            coverage,
            defects,
            artifact,
            draw,
        }
    }
}
