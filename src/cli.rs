use std::path::PathBuf;

use clap::Parser;

/// SymTuner: adaptive parameter tuning for symbolic execution under a time budget.
#[derive(Parser, Debug)]
#[command(name = "symtuner")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the "klee" executable.
    #[arg(long, default_value = "klee", help_heading = "Executable settings")]
    pub klee: String,

    /// Path to the evaluator executable, run as `<evaluator> <gcov_obj> <testcase>`.
    #[arg(long, default_value = "symtuner-eval", help_heading = "Executable settings")]
    pub evaluator: String,

    /// Json file defining parameter search space.
    #[arg(short = 's', long, value_name = "JSON", help_heading = "Hyperparameters")]
    pub search_space: Option<PathBuf>,

    /// Portion of exploitation.
    #[arg(long, default_value_t = 0.7, value_name = "FLOAT", help_heading = "Hyperparameters")]
    pub exploit_portion: f64,

    /// Number of symbolic execution runs before increasing the time budget.
    #[arg(long, default_value_t = 20, value_name = "INT", help_heading = "Hyperparameters")]
    pub step: u32,

    /// Minimum portion of the total budget for one iteration.
    #[arg(long, default_value_t = 0.005, value_name = "FLOAT", help_heading = "Hyperparameters")]
    pub minimum_time_portion: f64,

    /// Multiplier applied to the time budget every `--step` runs.
    #[arg(long, default_value_t = 2.0, value_name = "FLOAT", help_heading = "Hyperparameters")]
    pub increase_ratio: f64,

    /// Minimum time budget of one symbolic execution run, in seconds.
    #[arg(long, default_value_t = 30, value_name = "INT", help_heading = "Hyperparameters")]
    pub minimum_time_budget: u64,

    /// Number of initial runs that only explore.
    #[arg(long, default_value_t = 20, value_name = "INT", help_heading = "Hyperparameters")]
    pub exploration_steps: usize,

    /// Number of coverage-selected seed files kept for `-seed-file`.
    #[arg(long, default_value_t = 10, value_name = "INT", help_heading = "Hyperparameters")]
    pub k_seeds: usize,

    /// Random seed for reproducibility.
    #[arg(long, default_value_t = 123)]
    pub seed: u64,

    /// Deadline for replaying one test case, in milliseconds.
    #[arg(long, default_value_t = 100, value_name = "MS")]
    pub replay_timeout_ms: u64,

    /// Directory to store the generated files.
    #[arg(short = 'd', long, default_value = "symtuner-out")]
    pub output_dir: PathBuf,

    /// Write the built-in parameter space to example-space.json and exit.
    #[arg(long)]
    pub generate_search_space_json: bool,

    /// Log debug messages.
    #[arg(long)]
    pub debug: bool,

    /// Total time budget in seconds.
    #[arg(short = 't', long, value_name = "INT")]
    pub budget: Option<u64>,

    /// LLVM bitcode file for klee.
    pub llvm_bc: Option<PathBuf>,

    /// Executable built with coverage instrumentation.
    pub gcov_obj: Option<PathBuf>,
}
