use std::io::Write;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use log::{info, LevelFilter};

use symtuner_rs::backend::{CommandEvaluator, Klee};
use symtuner_rs::cli::Cli;
use symtuner_rs::error::{Result, TunerError};
use symtuner_rs::space::{default_klee_document, load_space, save_space};
use symtuner_rs::tuner::{
    prepare_output_dir, run_tuner, Backends, ScheduleConfig, TimeBudgetScheduler, Tuner,
    TunerConfig,
};

const EXAMPLE_SPACE_JSON: &str = "example-space.json";

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} symtuner [{}] {}",
                buf.timestamp_seconds(),
                record.level(),
                record.args()
            )
        })
        .init();
}

fn run(cli: Cli) -> Result<()> {
    if cli.generate_search_space_json {
        save_space(EXAMPLE_SPACE_JSON, &default_klee_document())?;
        info!("Example space configuration json is generated: {}", EXAMPLE_SPACE_JSON);
        return Ok(());
    }

    let (Some(llvm_bc), Some(gcov_obj), Some(budget)) = (&cli.llvm_bc, &cli.gcov_obj, cli.budget)
    else {
        let _ = Cli::command().print_help();
        return Err(TunerError::InvalidInput(
            "following parameters are required: -t, llvm_bc, gcov_obj".to_string(),
        ));
    };

    let mut files = prepare_output_dir(&cli.output_dir)?;

    let klee = Klee::new(&cli.klee)?;
    let evaluator =
        CommandEvaluator::new(&cli.evaluator, Duration::from_millis(cli.replay_timeout_ms))?;

    let document = match &cli.search_space {
        Some(path) => {
            let document = load_space(path)?;
            info!("Parameter space loaded from a file: {}", path.display());
            document
        }
        None => {
            info!("Parameter space not defined. Default space is loaded.");
            default_klee_document()
        }
    };

    let config = TunerConfig {
        schedule: ScheduleConfig {
            total_budget: budget,
            minimum_ratio: cli.minimum_time_portion,
            steps_per_round: cli.step,
            increase_ratio: cli.increase_ratio,
            minimum_slice: cli.minimum_time_budget,
        },
        exploit_portion: cli.exploit_portion,
        exploration_steps: cli.exploration_steps,
        seed_corpus_size: cli.k_seeds,
        seed: cli.seed,
        output_dir: cli.output_dir.clone(),
        ..TunerConfig::default()
    };

    let mut tuner = Tuner::new(&document, &config)?;
    if let Some(name) = tuner.feedback_parameter() {
        info!("Seed files are curated through {}.", name);
    }
    let scheduler = TimeBudgetScheduler::new(config.schedule.clone());
    let backends = Backends {
        procedure: &klee,
        evaluator: &evaluator,
        target: llvm_bc.as_path(),
        evaluation_target: gcov_obj.as_path(),
    };

    run_tuner(&config, &mut tuner, scheduler, &backends, &mut files);
    Ok(())
}
