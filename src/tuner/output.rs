use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::backend::absolute;
use crate::error::Result;
use crate::tuner::search::{RoundReport, RoundSink};

pub const COVERAGE_CSV: &str = "coverage.csv";
pub const FOUND_BUGS_TXT: &str = "found_bugs.txt";

/// Files updated after every round: coverage progress and found bugs.
#[derive(Debug, Clone)]
pub struct RunFiles {
    pub coverage_csv: PathBuf,
    pub found_bugs: PathBuf,
}

/// Create a fresh output directory with empty report files.
///
/// An existing directory at `dir` is deleted first.
pub fn prepare_output_dir(dir: &Path) -> Result<RunFiles> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
        warn!("Existing output directory is deleted: {}", dir.display());
    }
    fs::create_dir_all(dir)?;

    let files = RunFiles {
        coverage_csv: dir.join(COVERAGE_CSV),
        found_bugs: dir.join(FOUND_BUGS_TXT),
    };
    File::create(&files.coverage_csv)?;
    info!(
        "Coverage will be recorded at \"{}\" at every iteration.",
        files.coverage_csv.display()
    );
    File::create(&files.found_bugs)?;
    info!(
        "Found bugs will be recorded at \"{}\" at every iteration.",
        files.found_bugs.display()
    );
    Ok(files)
}

/// Append one `elapsed,coverage` row.
pub fn append_coverage(path: &Path, elapsed_secs: u64, coverage: usize) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    wtr.write_record([elapsed_secs.to_string(), coverage.to_string()])?;
    wtr.flush()?;
    Ok(())
}

/// Rewrite the bug list: one line per defect with its latest test case.
pub fn write_found_bugs(path: &Path, report: &RoundReport<'_>) -> Result<()> {
    let mut file = File::create(path)?;
    let history = report.tuner.history();
    for bug in history.defects() {
        let Some(testcase) = history.artifact_causing(bug) else {
            continue;
        };
        writeln!(
            file,
            "Testcase: {} Bug: {}",
            absolute(testcase).display(),
            bug
        )?;
    }
    Ok(())
}

impl RoundSink for RunFiles {
    fn on_round(&mut self, report: &RoundReport<'_>) -> Result<()> {
        append_coverage(&self.coverage_csv, report.elapsed.as_secs(), report.coverage())?;
        write_found_bugs(&self.found_bugs, report)
    }
}
