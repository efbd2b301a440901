use std::collections::BTreeSet;
use std::path::Path;

use crate::models::Observation;

/// Append-only record of every evaluated artifact, oldest first.
///
/// Keeps the union of all coverage and defects up to date as observations
/// are appended.
#[derive(Debug, Clone, Default)]
pub struct ObservationLog {
    observations: Vec<Observation>,
    coverage: BTreeSet<String>,
    defects: BTreeSet<String>,
}

impl ObservationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, observation: Observation) {
        self.coverage.extend(observation.coverage.iter().cloned());
        self.defects.extend(observation.defects.iter().cloned());
        self.observations.push(observation);
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Union of the coverage of every observation.
    pub fn coverage(&self) -> &BTreeSet<String> {
        &self.coverage
    }

    /// Union of the defects of every observation.
    pub fn defects(&self) -> &BTreeSet<String> {
        &self.defects
    }

    /// Latest artifact exhibiting `defect`.
    pub fn artifact_causing(&self, defect: &str) -> Option<&Path> {
        self.observations
            .iter()
            .rev()
            .find(|o| o.defects.contains(defect))
            .map(|o| o.artifact.as_path())
    }
}
