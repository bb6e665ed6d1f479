//! # External Process Runner
//!
//! Spawns an external tool and blocks until it exits, emitting a
//! `task-progress` heartbeat on every poll interval while it runs.

use std::process::{Command, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info};

use crate::constants::TASK_PROGRESS_EVENT;
use crate::progress::ProgressReporter;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("empty command line")]
    EmptyCommand,
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// How a finished external process ended.
#[derive(Debug, Clone, Copy)]
pub struct ToolOutcome {
    pub status: ExitStatus,
    pub heartbeats: u64,
    pub elapsed: Duration,
}

impl ToolOutcome {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, or a signal description when the process was killed.
    pub fn describe_exit(&self) -> String {
        if let Some(code) = self.status.code() {
            return format!("exit code {code}");
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = self.status.signal() {
                return format!("signal SIG{signal}");
            }
        }
        "unknown exit status".to_string()
    }
}

/// Run `argv` to completion, sending a heartbeat every `interval`.
///
/// The liveness check happens before each heartbeat, so no heartbeat is
/// sent once the process has been observed as exited. Stdout and stderr
/// are inherited from the worker.
pub fn run_with_heartbeat(
    argv: &[String],
    interval: Duration,
    reporter: &dyn ProgressReporter,
) -> Result<ToolOutcome, ProcessError> {
    let (program, args) = argv.split_first().ok_or(ProcessError::EmptyCommand)?;

    let start = Instant::now();
    let mut child = Command::new(program)
        .args(args)
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            program: program.clone(),
            source,
        })?;
    info!(pid = child.id(), "spawned {program}");

    let mut heartbeats = 0u64;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                reporter.send_event(TASK_PROGRESS_EVENT);
                heartbeats += 1;
                thread::sleep(interval);
            }
            Err(source) => {
                return Err(ProcessError::Wait {
                    program: program.clone(),
                    source,
                });
            }
        }
    };

    let elapsed = start.elapsed();
    debug!(heartbeats, elapsed_ms = elapsed.as_millis() as u64, "{program} exited");
    Ok(ToolOutcome {
        status,
        heartbeats,
        elapsed,
    })
}
