use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::backend::{Evaluator, SearchProcedure};
use crate::error::Result;
use crate::models::{Observation, ParamSetting, ParamValue, Parameters};
use crate::space::{ParameterModel, SpaceDocument};
use crate::tuner::cover::curated_artifacts;
use crate::tuner::history::ObservationLog;
use crate::tuner::sampler::{Policy, Sample, Sampler};
use crate::tuner::schedule::{Clock, ScheduleConfig, TimeBudgetScheduler};

/// Feedback value replaced by a random earlier artifact.
pub const RANDOM_FROM_ALL: &str = "random_from_all";

/// Configuration for the tuner.
#[derive(Debug, Clone)]
pub struct TunerConfig {
    pub schedule: ScheduleConfig,
    /// Probability of exploiting once warm-up is over.
    pub exploit_portion: f64,
    /// Initial rounds that always explore.
    pub exploration_steps: usize,
    /// Coverage picks kept in the feedback domain.
    pub seed_corpus_size: usize,
    pub seed: u64,
    /// Root of the per-round output directories.
    pub output_dir: PathBuf,
    /// Candidate names of the feedback parameter; the first one present in
    /// the space is used.
    pub feedback_parameters: Vec<String>,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            schedule: ScheduleConfig::default(),
            exploit_portion: 0.7,
            exploration_steps: 20,
            seed_corpus_size: 10,
            seed: 123,
            output_dir: PathBuf::from("symtuner-out"),
            feedback_parameters: vec!["-seed-file".to_string(), "--seed-file".to_string()],
        }
    }
}

/// Owns the tuning space, its statistics and the observation history.
#[derive(Debug)]
pub struct Tuner {
    model: ParameterModel,
    defaults: Parameters,
    history: ObservationLog,
    sampler: Sampler,
    feedback: Option<String>,
    seed_corpus_size: usize,
    rng: StdRng,
}

impl Tuner {
    pub fn new(document: &SpaceDocument, config: &TunerConfig) -> Result<Self> {
        let model = ParameterModel::new(document.space.clone())?;
        let feedback = config
            .feedback_parameters
            .iter()
            .find(|name| model.contains(name))
            .cloned();
        if let Some(name) = &feedback {
            debug!("feedback parameter: {}", name);
        }

        Ok(Self {
            model,
            defaults: document.default_parameters(),
            history: ObservationLog::new(),
            sampler: Sampler::new(config.exploit_portion),
            feedback,
            seed_corpus_size: config.seed_corpus_size,
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    pub fn model(&self) -> &ParameterModel {
        &self.model
    }

    pub fn history(&self) -> &ObservationLog {
        &self.history
    }

    pub fn feedback_parameter(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    /// Latest artifact exhibiting `defect`.
    pub fn artifact_causing(&self, defect: &str) -> Option<&Path> {
        self.history.artifact_causing(defect)
    }

    /// Draw the next configuration.
    pub fn sample(&mut self, policy: Option<Policy>) -> Sample {
        let mut sample = self.sampler.sample(
            &mut self.rng,
            policy,
            &self.model,
            &self.defaults,
            &self.history,
        );
        self.resolve_random_seed(&mut sample);
        sample
    }

    /// Replace `random_from_all` feedback values by random earlier artifacts,
    /// or drop the option while there are none.
    fn resolve_random_seed(&mut self, sample: &mut Sample) {
        let Some(name) = self.feedback.clone() else {
            return;
        };
        let placeholder = ParamValue::text(RANDOM_FROM_ALL);
        let wants_random = match sample.parameters.get(&name) {
            Some(ParamSetting::Single(v)) => *v == placeholder,
            Some(ParamSetting::Many(vs)) => vs.contains(&placeholder),
            _ => false,
        };
        if !wants_random {
            return;
        }

        if self.history.is_empty() {
            sample.parameters.remove(&name);
            sample.draw.remove(&name);
            return;
        }

        let artifacts: Vec<&Path> = self
            .history
            .observations()
            .iter()
            .map(|o| o.artifact.as_path())
            .collect();
        let rng = &mut self.rng;
        let mut pick = || {
            let path = artifacts.choose(&mut *rng).copied().unwrap_or(Path::new(""));
            ParamValue::Text(path.display().to_string())
        };

        match sample.parameters.get_mut(&name) {
            Some(ParamSetting::Single(v)) => *v = pick(),
            Some(ParamSetting::Many(vs)) => {
                for v in vs.iter_mut().filter(|v| **v == placeholder) {
                    *v = pick();
                }
                sample.draw.insert(name.clone(), vs.clone());
            }
            _ => {}
        }
    }

    /// Evaluate a round's artifacts and fold them into the statistics.
    pub fn add(
        &mut self,
        target: &Path,
        sample: &Sample,
        artifacts: &[PathBuf],
        evaluator: &dyn Evaluator,
    ) -> Result<()> {
        for artifact in artifacts {
            let evaluation = evaluator.evaluate(target, artifact);
            self.history.push(Observation::new(
                evaluation.coverage,
                evaluation.defects,
                artifact.clone(),
                sample.draw.clone(),
            ));
        }
        self.model.record_draw(&sample.draw);

        if let Some(name) = &self.feedback {
            let seeds = curated_artifacts(self.history.observations(), self.seed_corpus_size)
                .into_iter()
                .map(|path| ParamValue::Text(path.display().to_string()))
                .collect();
            self.model.replace_domain(name, seeds)?;
        }
        Ok(())
    }
}

/// Progress after one round.
pub struct RoundReport<'a> {
    /// Zero-based round index.
    pub iteration: usize,
    pub time_slice: u64,
    pub elapsed: Duration,
    pub policy: Policy,
    pub artifacts: usize,
    pub tuner: &'a Tuner,
}

impl RoundReport<'_> {
    pub fn coverage(&self) -> usize {
        self.tuner.history().coverage().len()
    }

    pub fn defects(&self) -> usize {
        self.tuner.history().defects().len()
    }
}

/// Receives a report after every round.
pub trait RoundSink {
    fn on_round(&mut self, report: &RoundReport<'_>) -> Result<()>;
}

/// Discards reports.
pub struct NullSink;

impl RoundSink for NullSink {
    fn on_round(&mut self, _report: &RoundReport<'_>) -> Result<()> {
        Ok(())
    }
}

/// The external side of a tuning run.
pub struct Backends<'a> {
    pub procedure: &'a dyn SearchProcedure,
    pub evaluator: &'a dyn Evaluator,
    /// Program handed to the search procedure.
    pub target: &'a Path,
    /// Instrumented program handed to the evaluator.
    pub evaluation_target: &'a Path,
}

/// Results from a tuning run.
#[derive(Debug, Clone)]
pub struct TunerResults {
    pub rounds: usize,
    pub elapsed: Duration,
    pub coverage: usize,
    pub defects: usize,
}

/// Run rounds until the scheduler runs out of budget.
pub fn run_tuner<C: Clock>(
    config: &TunerConfig,
    tuner: &mut Tuner,
    mut scheduler: TimeBudgetScheduler<C>,
    backends: &Backends<'_>,
    sink: &mut dyn RoundSink,
) -> TunerResults {
    let mut iteration = 0;

    info!("All configuration loaded. Start testing.");
    while let Some(time_slice) = scheduler.next_slice() {
        let policy = if iteration < config.exploration_steps {
            Some(Policy::Explore)
        } else {
            None
        };
        let mut sample = tuner.sample(policy);

        let iteration_dir = config.output_dir.join(format!("iteration-{}", iteration));
        sample.parameters.insert(
            backends.procedure.time_parameter().to_string(),
            ParamSetting::Single(ParamValue::Int(time_slice as i64)),
        );
        sample.parameters.insert(
            backends.procedure.output_parameter().to_string(),
            ParamSetting::Single(ParamValue::Text(iteration_dir.display().to_string())),
        );

        let artifacts = backends
            .procedure
            .run(backends.target, &sample.parameters, time_slice);
        if artifacts.is_empty() {
            let name = backends.procedure.name();
            debug!("{} produced no artifacts in round {}", name, iteration);
        }

        let evaluator = backends.evaluator;
        if let Err(e) = tuner.add(backends.evaluation_target, &sample, &artifacts, evaluator) {
            warn!("Failed to update tuning space after round {}: {}", iteration, e);
        }

        let report = RoundReport {
            iteration,
            time_slice,
            elapsed: scheduler.elapsed(),
            policy: sample.policy,
            artifacts: artifacts.len(),
            tuner,
        };
        info!(
            "Iteration: {} Time budget: {} Time elapsed: {} Coverage: {} Bugs: {}",
            iteration + 1,
            time_slice,
            report.elapsed.as_secs(),
            report.coverage(),
            report.defects()
        );
        if let Err(e) = sink.on_round(&report) {
            warn!("Failed to record round {}: {}", iteration, e);
        }

        iteration += 1;
    }

    let results = TunerResults {
        rounds: iteration,
        elapsed: scheduler.elapsed(),
        coverage: tuner.history().coverage().len(),
        defects: tuner.history().defects().len(),
    };
    info!(
        "SymTuner done. Achieve {} coverage and found {} bugs.",
        results.coverage, results.defects
    );
    results
}
