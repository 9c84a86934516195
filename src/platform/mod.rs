//! Short-lived OS helper processes (volume, keep-awake).
//!
//! Every helper is awaited with a bounded timeout and reports a typed error;
//! callers decide whether to fall back, but nothing here ever retries.

pub mod power;
pub mod volume;

use std::{future::Future, process::Stdio, time::Duration};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl HelperCommand {
    pub fn new<P, I, S>(program: P, args: I) -> Self
    where
        P: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Error)]
pub enum HelperError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("`{program}` did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },
    #[error("no helper available on this platform")]
    Unsupported,
}

/// Runs one helper to completion.
pub trait HelperRunner: Send + Sync {
    fn run(&self, command: &HelperCommand)
        -> impl Future<Output = Result<(), HelperError>> + Send;
}

/// Spawns real child processes with `tokio::process`.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

impl HelperRunner for ProcessRunner {
    async fn run(&self, command: &HelperCommand) -> Result<(), HelperError> {
        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let child = cmd.spawn().map_err(|source| HelperError::Spawn {
            program: command.program.clone(),
            source,
        })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| HelperError::Spawn {
                program: command.program.clone(),
                source,
            })?,
            Err(_) => {
                return Err(HelperError::TimedOut {
                    program: command.program.clone(),
                    timeout: self.timeout,
                })
            }
        };

        if output.status.success() {
            Ok(())
        } else {
            Err(HelperError::Failed {
                program: command.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}
