//! Checker process spawning and control.
//!
//! The checker runs with its standard input inherited from the wrapper, so
//! interactive prompts keep working, while stdout and stderr are piped back
//! for filtering.

use std::io::IsTerminal;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use crate::config::ColorMode;

use super::Invocation;

/// Exit code used when the checker executable cannot be found.
pub const EXIT_NOT_FOUND: i32 = 127;

/// Exit code used when the checker exists but cannot be executed.
pub const EXIT_NOT_EXECUTABLE: i32 = 126;

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The binary was not found.
    #[error("{0} could not be found in your PATH")]
    NotFound(String),
    /// Permission denied when spawning.
    #[error("{0} is not executable")]
    PermissionDenied(String),
    /// Other I/O error.
    #[error("failed to start {program}: {source}")]
    Io {
        program: String,
        source: std::io::Error,
    },
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    fn from_io(program: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(program.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(program.to_string()),
            _ => Self::Io {
                program: program.to_string(),
                source: err,
            },
        }
    }

    /// Process exit code for this failure.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound(_) => EXIT_NOT_FOUND,
            Self::PermissionDenied(_) | Self::Io { .. } => EXIT_NOT_EXECUTABLE,
        }
    }
}

/// Environment variables requesting colored output for the given mode.
#[must_use]
pub fn color_env(mode: ColorMode, stdout_is_terminal: bool) -> Vec<(&'static str, &'static str)> {
    match mode {
        ColorMode::Always => vec![("FORCE_COLOR", "1")],
        ColorMode::Auto if stdout_is_terminal => vec![("FORCE_COLOR", "1")],
        ColorMode::Auto => Vec::new(),
        ColorMode::Never => vec![("NO_COLOR", "1"), ("FORCE_COLOR", "0")],
    }
}

/// A running checker process.
#[derive(Debug)]
pub struct CheckerProcess {
    child: Child,
    program: String,
}

impl CheckerProcess {
    /// Spawn the checker described by the invocation.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn spawn(invocation: &Invocation, color: ColorMode) -> Result<Self, SpawnError> {
        let program = invocation.program();

        let mut cmd = Command::new(program);
        cmd.args(invocation.args())
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in color_env(color, std::io::stdout().is_terminal()) {
            cmd.env(key, value);
        }

        let child = cmd
            .spawn()
            .map_err(|e| SpawnError::from_io(program, e))?;

        tracing::debug!(
            program,
            args = ?invocation.args(),
            pid = child.id(),
            "Spawned checker"
        );

        Ok(Self {
            child,
            program: program.to_string(),
        })
    }

    /// Take ownership of the stdout handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take ownership of the stderr handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Check if the process has exited without blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the process state cannot be queried.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Wait for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Send a kill signal without waiting.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill signal cannot be sent.
    pub fn start_kill(&mut self) -> std::io::Result<()> {
        self.child.start_kill()
    }

    /// Ask the checker to shut down the way an interactive Ctrl-C would.
    ///
    /// On Unix this sends SIGINT; a launcher that runs the real checker as
    /// its own child only stops that child on SIGINT. Elsewhere the process
    /// is killed. A process that already exited is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be delivered.
    pub fn request_shutdown(&mut self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let Some(pid) = self.id() else {
                return Ok(());
            };
            let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
            match kill(nix_pid, Signal::SIGINT) {
                Ok(()) | Err(Errno::ESRCH) => Ok(()),
                Err(errno) => Err(std::io::Error::from(errno)),
            }
        }

        #[cfg(not(unix))]
        {
            self.child.start_kill()
        }
    }

    /// Request shutdown, then kill the process if it outlives the timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if termination fails.
    pub async fn graceful_terminate(&mut self, timeout: Duration) -> std::io::Result<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }
        self.request_shutdown()?;

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::warn!(
                    program = %self.program,
                    "Checker ignored shutdown request, killing"
                );
                self.child.kill().await
            }
        }
    }
}
