pub mod cover;
pub mod history;
pub mod output;
pub mod sampler;
pub mod schedule;
pub mod search;

pub use cover::{coverage_core, curated_artifacts, defect_core, extract_core};
pub use history::ObservationLog;
pub use output::{prepare_output_dir, RunFiles};
pub use sampler::{normalize, ParamDistribution, Policy, Sample, Sampler, UNEXPLORED_WEIGHT};
pub use schedule::{Clock, ManualClock, MonotonicClock, ScheduleConfig, TimeBudgetScheduler};
pub use search::{
    run_tuner, Backends, NullSink, RoundReport, RoundSink, Tuner, TunerConfig, TunerResults,
    RANDOM_FROM_ALL,
};
