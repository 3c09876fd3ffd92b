//! Process and filesystem collaborators.
//!
//! The interpreter never touches `std::process` or `std::fs` directly; it
//! goes through these traits so tests can substitute recording fakes and
//! `parallel` tasks can share one implementation behind an `Arc`.

use crate::error::{EvalError, EvalErrorKind};
use std::io;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs `run` commands and the `exec()` builtin.
pub trait ProcessRunner: Send + Sync {
    fn run(&self, command: &str, timeout: Duration) -> Result<ProcessOutput, EvalError>;
}

/// Executes commands through `sh -c`, polling for completion so a hung
/// command can be killed at the timeout instead of stalling the hook.
pub struct ShellRunner;

/// Reads a pipe to EOF on its own thread. The poll loop never reads the
/// pipes itself, so a command writing more than the pipe buffer would
/// otherwise stall and hit the timeout.
fn drain(pipe: Option<impl io::Read + Send + 'static>) -> std::thread::JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn join_drained(handle: std::thread::JoinHandle<Vec<u8>>) -> String {
    String::from_utf8_lossy(&handle.join().unwrap_or_default()).to_string()
}

impl ProcessRunner for ShellRunner {
    fn run(&self, command: &str, timeout: Duration) -> Result<ProcessOutput, EvalError> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EvalError::io(format!("failed to start '{}': {}", command, e), None))?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if started.elapsed() >= timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(EvalError::new(
                            EvalErrorKind::Timeout,
                            format!(
                                "command '{}' timed out after {}s",
                                command,
                                timeout.as_secs()
                            ),
                            None,
                        ));
                    }
                    std::thread::sleep(Duration::from_millis(25));
                }
                Err(e) => {
                    return Err(EvalError::io(
                        format!("failed waiting for '{}': {}", command, e),
                        None,
                    ));
                }
            }
        };

        Ok(ProcessOutput {
            code: status.code(),
            stdout: join_drained(stdout),
            stderr: join_drained(stderr),
        })
    }
}

/// Filesystem access for `file()`, `dir()`, `glob()`, and `rm()`.
pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &str) -> io::Result<String>;
    fn exists(&self, path: &str) -> bool;
    fn is_file(&self, path: &str) -> bool;
    fn size(&self, path: &str) -> io::Result<u64>;
    /// Entry paths of a directory, sorted for stable iteration order.
    fn read_dir(&self, path: &str) -> io::Result<Vec<String>>;
    /// Paths matching a shell glob, sorted for stable iteration order.
    fn glob(&self, pattern: &str) -> io::Result<Vec<String>>;
    fn remove(&self, path: &str) -> io::Result<()>;
}

/// The real filesystem, rooted at the process working directory.
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn read_to_string(&self, path: &str) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &str) -> bool {
        std::path::Path::new(path).exists()
    }

    fn is_file(&self, path: &str) -> bool {
        std::path::Path::new(path).is_file()
    }

    fn size(&self, path: &str) -> io::Result<u64> {
        Ok(std::fs::metadata(path)?.len())
    }

    fn read_dir(&self, path: &str) -> io::Result<Vec<String>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path)? {
            entries.push(entry?.path().to_string_lossy().to_string());
        }
        entries.sort();
        Ok(entries)
    }

    fn glob(&self, pattern: &str) -> io::Result<Vec<String>> {
        let paths = glob::glob(pattern).map_err(io::Error::other)?;
        let mut matches = Vec::new();
        for entry in paths {
            let path = entry.map_err(io::Error::other)?;
            matches.push(path.to_string_lossy().to_string());
        }
        matches.sort();
        Ok(matches)
    }

    fn remove(&self, path: &str) -> io::Result<()> {
        std::fs::remove_file(path)
    }
}
