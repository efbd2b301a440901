use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info};

use crate::error::{Result, TunerError};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// How long output is still collected once the child has ended.
const READ_GRACE: Duration = Duration::from_millis(500);

/// Resolve `bin` on `PATH` (or as a path) and report where it was found.
pub fn locate(tool: &str, bin: &str) -> Result<PathBuf> {
    match which::which(bin) {
        Ok(path) => {
            if bin != tool {
                info!("Use {} executable at: {}", tool, path.display());
            }
            debug!("{} found: {}", tool, path.display());
            Ok(path)
        }
        Err(_) => {
            error!("Failed to find {}: {}", tool, bin);
            Err(TunerError::ExecutableNotFound {
                tool: tool.to_string(),
                path: PathBuf::from(bin),
            })
        }
    }
}

/// Run `bin args...` once and require a zero exit.
pub fn smoke_test(tool: &str, bin: &Path, args: &[&str]) -> Result<()> {
    let command = render(bin, args.iter().copied());
    let output = Command::new(bin)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| TunerError::SmokeTestFailed {
            tool: tool.to_string(),
            command: command.clone(),
            status: e.to_string(),
        })?;

    if !output.status.success() {
        error!("Smoke test of {} failed: {}", tool, command);
        return Err(TunerError::SmokeTestFailed {
            tool: tool.to_string(),
            command,
            status: output.status.to_string(),
        });
    }
    Ok(())
}

/// `path` resolved against the current directory.
pub fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Command line as a single printable string.
pub fn render<'a>(bin: &Path, args: impl IntoIterator<Item = &'a str>) -> String {
    let mut line = bin.display().to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Outcome of a child process run under a deadline.
#[derive(Debug)]
pub struct TimedOutput {
    /// `None` when the process was killed at the deadline.
    pub status: Option<ExitStatus>,
    /// Everything the process flushed before it exited or was killed.
    pub stdout: String,
    pub stderr: String,
}

impl TimedOutput {
    pub fn timed_out(&self) -> bool {
        self.status.is_none()
    }
}

/// Read a pipe on a detached thread, forwarding chunks as they arrive.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let Some(mut pipe) = pipe else {
            return;
        };
        let mut buf = [0u8; 4096];
        loop {
            match pipe.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

/// Chunks received until the pipe closes or `until` passes.
fn collect(rx: &mpsc::Receiver<Vec<u8>>, until: Instant) -> String {
    let mut bytes = Vec::new();
    while let Ok(chunk) = rx.recv_timeout(until.saturating_duration_since(Instant::now())) {
        bytes.extend(chunk);
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn wait_until(child: &mut Child, deadline: Instant) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Kill the child together with everything it spawned.
fn kill_group(child: &mut Child) {
    #[cfg(unix)]
    {
        // The child leads its own process group, see `run_with_timeout`.
        let _ = unsafe { libc::kill(-(child.id() as libc::pid_t), libc::SIGKILL) };
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Run `command`, killing it and its descendants if still alive after
/// `timeout`.
///
/// Output is gathered for at most half a second after the child ends, so a
/// descendant that keeps the pipes open cannot stall the caller.
pub fn run_with_timeout(command: &mut Command, timeout: Duration) -> io::Result<TimedOutput> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    let mut child = command.spawn()?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = wait_until(&mut child, Instant::now() + timeout)?;
    if status.is_none() {
        kill_group(&mut child);
    }

    let until = Instant::now() + READ_GRACE;
    Ok(TimedOutput {
        status,
        stdout: collect(&stdout, until),
        stderr: collect(&stderr, until),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_locate_missing_executable() {
        let err = locate("klee", "definitely-not-a-real-klee-binary").unwrap_err();
        assert!(matches!(err, TunerError::ExecutableNotFound { .. }));
    }

    #[test]
    fn test_smoke_test_failure() {
        let sh = locate("sh", "sh").unwrap();
        assert!(smoke_test("sh", &sh, &["-c", "exit 0"]).is_ok());
        let err = smoke_test("sh", &sh, &["-c", "exit 3"]).unwrap_err();
        assert!(matches!(err, TunerError::SmokeTestFailed { .. }));
    }

    #[test]
    fn test_run_with_timeout_completes() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo out; echo err >&2"]);
        let output = run_with_timeout(&mut command, Duration::from_secs(5)).unwrap();
        assert!(!output.timed_out());
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[test]
    fn test_run_with_timeout_kills_and_keeps_flushed_output() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo early; exec sleep 5"]);
        let started = Instant::now();
        let output = run_with_timeout(&mut command, Duration::from_millis(200)).unwrap();
        assert!(output.timed_out());
        assert_eq!(output.stdout.trim(), "early");
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_run_with_timeout_kills_spawned_descendants() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo early; sleep 3; echo late"]);
        let started = Instant::now();
        let output = run_with_timeout(&mut command, Duration::from_millis(100)).unwrap();
        assert!(output.timed_out());
        assert_eq!(output.stdout.trim(), "early");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_absolute_resolves_relative_paths_only() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(absolute(Path::new("out/t1.ktest")), cwd.join("out/t1.ktest"));
        assert_eq!(absolute(Path::new("/tmp/t1.ktest")), PathBuf::from("/tmp/t1.ktest"));
    }

    #[test]
    fn test_render_command() {
        let line = render(Path::new("klee"), ["-max-time=10", "prog.bc"]);
        assert_eq!(line, "klee -max-time=10 prog.bc");
    }
}
