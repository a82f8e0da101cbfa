//! Bounded execution of external conversion tools.
//!
//! Conversions run on worker threads, so tools are spawned synchronously
//! and polled until they exit or the deadline passes. Stderr is drained
//! on a separate thread; ffmpeg alone can emit enough to fill the pipe
//! buffer and deadlock a polling parent.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use crate::error::EngineError;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How much trailing stderr is kept in failure messages.
const STDERR_TAIL: usize = 500;

/// Runs a tool to completion, killing it once `timeout` elapses.
pub fn run_tool(
    engine: &'static str,
    mut command: Command,
    timeout: Duration,
) -> Result<(), EngineError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    log::debug!("Running {}: {:?}", engine, command);

    let mut child = command.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            EngineError::Unavailable(engine)
        } else {
            EngineError::Failed {
                engine,
                message: format!("failed to spawn: {}", e),
            }
        }
    })?;

    let mut stderr_pipe = child.stderr.take();
    let stderr_thread = std::thread::spawn(move || {
        let mut buf = String::new();
        if let Some(pipe) = stderr_pipe.as_mut() {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    });

    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let stderr = stderr_thread.join().unwrap_or_default();
                if status.success() {
                    return Ok(());
                }
                return Err(EngineError::Failed {
                    engine,
                    message: failure_message(&stderr, status),
                });
            }
            Ok(None) => {
                if started.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = stderr_thread.join();
                    return Err(EngineError::Timeout {
                        engine,
                        timeout_secs: timeout.as_secs(),
                    });
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = stderr_thread.join();
                return Err(EngineError::Failed {
                    engine,
                    message: format!("failed to poll: {}", e),
                });
            }
        }
    }
}

/// Checks whether a tool responds to its version flag.
pub fn probe_tool(binary: &str, version_arg: &str) -> bool {
    Command::new(binary)
        .arg(version_arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

fn failure_message(stderr: &str, status: ExitStatus) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        return format!("exited with {}", status);
    }
    // Keep the tail; tools print the actual error last.
    let tail: String = if trimmed.chars().count() > STDERR_TAIL {
        let skip = trimmed.chars().count() - STDERR_TAIL;
        trimmed.chars().skip(skip).collect()
    } else {
        trimmed.to_string()
    };
    format!("exited with {}: {}", status, tail)
}
