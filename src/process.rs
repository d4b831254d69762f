//! External process execution with output capture and timeouts.
//!
//! Introspection tools are short-lived, but a corrupt binary can wedge them,
//! so every invocation runs under a deadline. Stdout and stderr are drained
//! on reader threads while the deadline runs, which keeps a chatty tool from
//! filling the pipe buffer and stalling behind it.

use log::{debug, warn};
use std::ffi::OsStr;
use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

use crate::{Error, Result};

/// Captured result of one tool invocation.
///
/// A non-zero exit code is data, not an error: some tools exit non-zero while
/// still printing usable output (ldd on a partially resolvable binary). The
/// caller decides whether the output is worth parsing.
#[derive(Debug)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// A short diagnostic excerpt for error messages: first non-empty stderr
    /// line, falling back to the first stdout line.
    pub fn excerpt(&self) -> String {
        self.stderr
            .lines()
            .chain(self.stdout.lines())
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("")
            .to_string()
    }
}

/// Run `program` with `args`, capturing output, enforcing `timeout`.
///
/// Failure classification:
/// - spawn fails with ENOENT -> [`Error::ToolNotFound`]
/// - deadline elapses -> process killed, [`Error::ToolTimedOut`]
/// - terminated by signal -> [`Error::ToolCrashed`]
pub fn run<I, S>(program: &str, args: I, timeout: Duration) -> Result<RunOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let start = Instant::now();
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ToolNotFound(program.to_string())
            } else {
                Error::Io(e)
            }
        })?;

    let stdout_reader = spawn_reader(child.stdout.take());
    let stderr_reader = spawn_reader(child.stderr.take());

    let status = match child.wait_timeout(timeout)? {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            warn!("{program} killed after {timeout:?}");
            return Err(Error::ToolTimedOut {
                tool: program.to_string(),
                timeout,
            });
        }
    };

    let stdout = join_reader(stdout_reader);
    let stderr = join_reader(stderr_reader);

    let exit_code = match status.code() {
        Some(code) => code,
        None => {
            return Err(Error::ToolCrashed {
                tool: program.to_string(),
                signal: termination_signal(&status),
            });
        }
    };

    debug!(
        "{program} exited with {exit_code} in {:?} ({} bytes stdout)",
        start.elapsed(),
        stdout.len()
    );

    Ok(RunOutput {
        stdout,
        stderr,
        exit_code,
    })
}

fn spawn_reader<R: Read + Send + 'static>(source: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut reader) = source {
            // Non-UTF8 bytes are unexpected from these tools; drop them.
            let mut bytes = Vec::new();
            if reader.read_to_end(&mut bytes).is_ok() {
                buf = String::from_utf8_lossy(&bytes).into_owned();
            }
        }
        buf
    })
}

fn join_reader(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

#[cfg(unix)]
fn termination_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn termination_signal(_status: &ExitStatus) -> Option<i32> {
    None
}
