use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, warn};

use crate::backend::process::{absolute, locate, render, smoke_test};
use crate::backend::SearchProcedure;
use crate::error::Result;
use crate::models::{ParamSetting, ParamValue, Parameters};

/// Options whose value follows as a separate argument.
const SPACE_SEPARATED: [&str; 4] = ["sym-arg", "sym-args", "sym-files", "sym-stdin"];
const SYM_ARG: [&str; 2] = ["sym-arg", "sym-args"];
const OUTPUT_DIR_KEYS: [&str; 2] = ["-output-dir", "--output-dir"];

/// Name of the diagnostics file written after a failed run.
pub const FAILURE_LOG: &str = "symtuner.log";

/// The KLEE symbolic executor.
#[derive(Debug, Clone)]
pub struct Klee {
    bin: PathBuf,
}

impl Klee {
    /// Locate `bin` and check that `bin -version` runs.
    pub fn new(bin: &str) -> Result<Self> {
        let path = locate("klee", bin)?;
        smoke_test("klee", &path, &["-version"])?;
        Ok(Self { bin: path })
    }
}

fn output_dir_of(parameters: &Parameters) -> Option<PathBuf> {
    OUTPUT_DIR_KEYS.iter().find_map(|key| match parameters.get(*key) {
        Some(ParamSetting::Single(v)) => Some(PathBuf::from(v.as_arg())),
        Some(ParamSetting::Many(vs)) => vs.last().map(|v| PathBuf::from(v.as_arg())),
        _ => None,
    })
}

/// Arguments of a KLEE run, without the executable itself.
///
/// KLEE options come first, then the target, then the program-argument
/// options in the order `-sym-arg(s)`, `-sym-files`, `-sym-stdin`,
/// `-sym-stdout`. A `-sym-stdout` of `off` is dropped.
pub fn klee_arguments(target: &Path, parameters: &Parameters) -> Vec<String> {
    let mut klee_options = Vec::new();
    let mut sym_args = Vec::new();
    let mut sym_files = Vec::new();
    let mut sym_stdin = Vec::new();
    let mut sym_stdout = Vec::new();

    for (key, setting) in parameters {
        let stripped = key
            .trim_start_matches('-')
            .split_whitespace()
            .next()
            .unwrap_or_default();

        for value in setting.values() {
            // Only the key is split, so `-sym-files 1` yields two tokens while
            // values containing spaces stay whole.
            let key_tokens = key.split_whitespace().map(str::to_string);
            let tokens: Vec<String> = match value {
                None => key_tokens.collect(),
                Some(v) if SPACE_SEPARATED.contains(&stripped) => {
                    key_tokens.chain(std::iter::once(v.as_arg())).collect()
                }
                Some(v) if stripped == "sym-stdout" => {
                    if v.as_arg() == "off" {
                        continue;
                    }
                    key_tokens.collect()
                }
                Some(v) => vec![format!("{}={}", key, v)],
            };

            let bucket = if SYM_ARG.contains(&stripped) {
                &mut sym_args
            } else if stripped == "sym-files" {
                &mut sym_files
            } else if stripped == "sym-stdin" {
                &mut sym_stdin
            } else if stripped == "sym-stdout" {
                &mut sym_stdout
            } else {
                &mut klee_options
            };
            bucket.extend(tokens);
        }
    }

    let mut args = klee_options;
    args.push(target.display().to_string());
    args.extend(sym_args);
    args.extend(sym_files);
    args.extend(sym_stdin);
    args.extend(sym_stdout);
    args
}

/// Generated test cases (`*.ktest`) in `dir`, sorted by path.
pub fn collect_ktests(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut testcases: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "ktest"))
        .map(|path| absolute(&path))
        .collect();
    testcases.sort();
    testcases
}

fn write_failure_log(
    path: &Path,
    command: &str,
    code: Option<i32>,
    stdout: &str,
    stderr: &str,
) -> std::io::Result<()> {
    let code = code.map_or_else(|| "none".to_string(), |c| c.to_string());
    let report = format!(
        "command: {}\nreturn code: {}\n\n-- stdout --\n{}\n-- stderr --\n{}\n",
        command, code, stdout, stderr
    );
    fs::write(path, report)
}

impl SearchProcedure for Klee {
    fn name(&self) -> &str {
        "klee"
    }

    fn time_parameter(&self) -> &str {
        "-max-time"
    }

    fn output_parameter(&self) -> &str {
        "-output-dir"
    }

    fn run(&self, target: &Path, parameters: &Parameters, time_slice: u64) -> Vec<PathBuf> {
        let target = absolute(target);
        let workdir = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        // KLEE runs inside the target's directory, so paths must be absolute.
        let mut parameters = parameters.clone();
        let output_dir = output_dir_of(&parameters).map(|dir| absolute(&dir));
        if let Some(dir) = &output_dir {
            for key in OUTPUT_DIR_KEYS {
                if parameters.contains_key(key) {
                    let value = ParamValue::Text(dir.display().to_string());
                    parameters.insert(key.to_string(), ParamSetting::Single(value));
                }
            }
        }

        let args = klee_arguments(&target, &parameters);
        let command = render(&self.bin, args.iter().map(String::as_str));
        debug!("klee command ({}s): {}", time_slice, command);

        let output_dir = output_dir.unwrap_or_else(|| workdir.join("klee-last"));
        let output = Command::new(&self.bin)
            .args(&args)
            .current_dir(&workdir)
            .output();

        match output {
            Ok(output) if output.status.success() => {}
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                let last_line = stderr.trim().lines().last().unwrap_or_default();
                if last_line.contains("KLEE") && last_line.contains("kill(9)") {
                    warn!("KLEE process kill(9)ed. Failed to terminate nicely.");
                } else {
                    let log_dir = if output_dir.exists() {
                        output_dir.canonicalize().unwrap_or_else(|_| output_dir.clone())
                    } else {
                        absolute(Path::new("."))
                    };
                    let log_file = log_dir.join(FAILURE_LOG);
                    warn!(
                        "Fail({})ed to execute KLEE. See for more details: {}",
                        output.status.code().unwrap_or(-1),
                        log_file.display()
                    );
                    if let Err(e) = write_failure_log(
                        &log_file,
                        &command,
                        output.status.code(),
                        &stdout,
                        &stderr,
                    ) {
                        warn!("Could not write {}: {}", log_file.display(), e);
                    }
                }
            }
            Err(e) => {
                warn!("Failed to launch KLEE ({}): {}", e, command);
            }
        }

        collect_ktests(&output_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn params(entries: Vec<(&str, ParamSetting)>) -> Parameters {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn test_argument_layout() {
        let parameters = params(vec![
            ("-max-time", ParamSetting::Single(ParamValue::Int(30))),
            ("-posix-runtime", ParamSetting::Flag),
            (
                "-sym-arg",
                ParamSetting::Many(vec![ParamValue::Int(3), ParamValue::Int(3)]),
            ),
            ("-sym-files 1", ParamSetting::Many(vec![ParamValue::Int(8)])),
            ("-sym-stdin", ParamSetting::Many(vec![ParamValue::Int(4)])),
            ("-sym-stdout", ParamSetting::Many(vec!["on".into()])),
            ("-search", ParamSetting::Many(vec!["bfs".into()])),
        ]);

        let args = klee_arguments(Path::new("/t/prog.bc"), &parameters);
        assert_eq!(
            args,
            vec![
                "-max-time=30",
                "-posix-runtime",
                "-search=bfs",
                "/t/prog.bc",
                "-sym-arg",
                "3",
                "-sym-arg",
                "3",
                "-sym-files",
                "1",
                "8",
                "-sym-stdin",
                "4",
                "-sym-stdout",
            ]
        );
    }

    #[test]
    fn test_sym_stdout_off_is_dropped() {
        let parameters = params(vec![(
            "-sym-stdout",
            ParamSetting::Many(vec!["off".into()]),
        )]);
        let args = klee_arguments(Path::new("prog.bc"), &parameters);
        assert_eq!(args, vec!["prog.bc"]);
    }

    #[test]
    fn test_output_dir_lookup() {
        let parameters = params(vec![(
            "--output-dir",
            ParamSetting::Single("out/iteration-0".into()),
        )]);
        assert_eq!(
            output_dir_of(&parameters),
            Some(PathBuf::from("out/iteration-0"))
        );
        assert_eq!(output_dir_of(&Parameters::new()), None);
    }

    #[test]
    fn test_collect_ktests_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        for name in ["test000002.ktest", "test000001.ktest", "info", "test000001.cov"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        let found = collect_ktests(dir.path());
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["test000001.ktest", "test000002.ktest"]);
        assert!(collect_ktests(&dir.path().join("missing")).is_empty());
    }

    #[test]
    fn test_failure_log_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(FAILURE_LOG);
        write_failure_log(&path, "klee prog.bc", Some(1), "out", "boom").unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.starts_with("command: klee prog.bc\nreturn code: 1\n"));
        assert!(text.contains("-- stderr --\nboom"));
    }

    #[test]
    fn test_values_with_spaces_stay_single_arguments() {
        let parameters = params(vec![
            (
                "-output-dir",
                ParamSetting::Single("/tmp/my out/iteration-0".into()),
            ),
            (
                "-seed-file",
                ParamSetting::Many(vec!["/tmp/my out/iteration-0/test000001.ktest".into()]),
            ),
            ("-sym-stdin", ParamSetting::Many(vec!["4 bytes".into()])),
        ]);

        let args = klee_arguments(Path::new("/t/prog.bc"), &parameters);
        assert_eq!(
            args,
            vec![
                "-output-dir=/tmp/my out/iteration-0",
                "-seed-file=/tmp/my out/iteration-0/test000001.ktest",
                "/t/prog.bc",
                "-sym-stdin",
                "4 bytes",
            ]
        );
    }

    #[cfg(unix)]
    mod with_shell {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn stand_in(dir: &TempDir, body: &str) -> Klee {
            let path = dir.path().join("klee.sh");
            fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            Klee { bin: path }
        }

        fn round_parameters(out: &Path) -> Parameters {
            params(vec![
                ("-max-time", ParamSetting::Single(ParamValue::Int(5))),
                (
                    "-output-dir",
                    ParamSetting::Single(ParamValue::Text(out.display().to_string())),
                ),
            ])
        }

        #[test]
        fn test_run_collects_generated_testcases() {
            let dir = TempDir::new().unwrap();
            let out = dir.path().join("iteration-0");
            fs::create_dir(&out).unwrap();
            fs::write(out.join("test000001.ktest"), b"").unwrap();
            let klee = stand_in(&dir, "exit 0");

            let found = klee.run(&dir.path().join("prog.bc"), &round_parameters(&out), 5);
            assert_eq!(found, vec![out.join("test000001.ktest")]);
            assert!(!out.join(FAILURE_LOG).exists());
        }

        #[test]
        fn test_failed_run_writes_diagnostics() {
            let dir = TempDir::new().unwrap();
            let out = dir.path().join("iteration-0");
            fs::create_dir(&out).unwrap();
            let klee = stand_in(
                &dir,
                "echo 'KLEE: output directory is ready'\necho 'KLEE: ERROR: bad option' >&2\nexit 3",
            );

            let found = klee.run(&dir.path().join("prog.bc"), &round_parameters(&out), 5);
            assert!(found.is_empty());

            let text = fs::read_to_string(out.join(FAILURE_LOG)).unwrap();
            assert!(text.contains("-max-time=5"));
            assert!(text.contains("prog.bc"));
            assert!(text.contains("return code: 3"));
            assert!(text.contains("KLEE: output directory is ready"));
            assert!(text.contains("KLEE: ERROR: bad option"));
        }

        #[test]
        fn test_killed_run_only_warns() {
            let dir = TempDir::new().unwrap();
            let out = dir.path().join("iteration-0");
            fs::create_dir(&out).unwrap();
            fs::write(out.join("test000001.ktest"), b"").unwrap();
            let klee = stand_in(
                &dir,
                "echo 'KLEE: WARNING: halting, sending kill(9)' >&2\nexit 1",
            );

            let found = klee.run(&dir.path().join("prog.bc"), &round_parameters(&out), 5);
            assert_eq!(found.len(), 1);
            assert!(!out.join(FAILURE_LOG).exists());
        }
    }
}
