//! Final status of a run.

use std::process::ExitStatus;

use crate::checker::StreamStats;

use super::Interruption;

/// Exit code for a failure reading checker output or writing it back out.
pub const EXIT_STREAM_FAILURE: i32 = 74;

/// Exit code for an unusable configuration.
pub const EXIT_CONFIG_ERROR: i32 = 78;

/// How the run ended, produced once both streams hit end of data and the
/// checker has exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Code the wrapper should exit with.
    pub code: i32,
    /// Exit code of the checker itself.
    pub checker_code: i32,
    /// The interruption that ended the run, if any.
    pub interruption: Option<Interruption>,
    pub stdout: StreamStats,
    pub stderr: StreamStats,
}

impl ExitOutcome {
    /// Resolve the wrapper's exit code.
    ///
    /// The checker's code is passed through unless the run was interrupted,
    /// in which case the interruption's conventional code wins.
    #[must_use]
    pub fn resolve(
        status: ExitStatus,
        interruption: Option<Interruption>,
        stdout: StreamStats,
        stderr: StreamStats,
    ) -> Self {
        let checker_code = status_code(status);
        let code = interruption.map_or(checker_code, Interruption::exit_code);
        Self {
            code,
            checker_code,
            interruption,
            stdout,
            stderr,
        }
    }

    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.code
    }

    #[must_use]
    pub fn was_interrupted(&self) -> bool {
        self.interruption.is_some()
    }
}

/// Map an exit status to a process exit code.
///
/// A process killed by a signal maps to 128 plus the signal number.
#[must_use]
pub fn status_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
