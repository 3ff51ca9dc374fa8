//! Supervisor runner for orchestrating one checker run.
//!
//! This module connects the process spawner, the two stream readers and
//! the interrupt handler. Both readers start right after the spawn so
//! neither pipe can fill up while the other is being waited on.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::checker::{
    CheckerProcess, Invocation, InvocationFlags, SpawnError, StreamError, StreamReader,
    StreamStats,
};
use crate::config::{CheckConfig, ColorMode};
use crate::filter::{RuleError, RuleTable};
use crate::output::{OutputSink, StreamTag};

use super::{
    ExitOutcome, InterruptAction, InterruptHandler, Interrupts, RunState, RunStateMachine,
    EXIT_STREAM_FAILURE,
};

/// Default timeout for graceful process termination.
pub const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

type ReaderTask = JoinHandle<Result<StreamStats, StreamError>>;

/// Error type for supervisor operations.
#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    /// The checker could not be started.
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    /// Process stdout was not available.
    #[error("Process stdout not available")]
    NoStdout,
    /// Process stderr was not available.
    #[error("Process stderr not available")]
    NoStderr,
    /// A stream reader failed.
    #[error(transparent)]
    Stream(#[from] StreamError),
    /// A stream reader task panicked or was cancelled.
    #[error("{stream} reader stopped unexpectedly: {source}")]
    ReaderFailed {
        stream: StreamTag,
        source: JoinError,
    },
    /// Waiting for the checker failed.
    #[error("failed to wait for checker: {0}")]
    Wait(std::io::Error),
}

impl SupervisorError {
    /// Process exit code for this failure.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Spawn(e) => e.exit_code(),
            _ => EXIT_STREAM_FAILURE,
        }
    }
}

/// Supervisor for running the checker with filtered output.
pub struct Supervisor {
    table: Arc<RuleTable>,
    sink: Arc<dyn OutputSink>,
    interrupts: Interrupts,
    color: ColorMode,
    stdout_delay: Duration,
    terminate_timeout: Duration,
    state: RunStateMachine,
}

impl Supervisor {
    /// Create a supervisor that filters with `table` and writes to `sink`.
    #[must_use]
    pub fn new(table: RuleTable, sink: Arc<dyn OutputSink>) -> Self {
        Self {
            table: Arc::new(table),
            sink,
            interrupts: Interrupts::none(),
            color: ColorMode::Auto,
            stdout_delay: Duration::ZERO,
            terminate_timeout: DEFAULT_TERMINATE_TIMEOUT,
            state: RunStateMachine::new(),
        }
    }

    /// Create a supervisor from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns `RuleError` if a configured filter rule is invalid.
    pub fn from_config(
        config: &CheckConfig,
        sink: Arc<dyn OutputSink>,
    ) -> Result<Self, RuleError> {
        let table = RuleTable::from_config(&config.filter)?;
        Ok(Self::new(table, sink)
            .with_color(config.color)
            .with_stdout_delay(config.stdout_delay())
            .with_terminate_timeout(config.terminate_timeout()))
    }

    /// Set the source of external interruptions.
    #[must_use]
    pub fn with_interrupts(mut self, interrupts: Interrupts) -> Self {
        self.interrupts = interrupts;
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: ColorMode) -> Self {
        self.color = color;
        self
    }

    /// Delay reading stdout so the checker's first stderr lines print first.
    #[must_use]
    pub fn with_stdout_delay(mut self, delay: Duration) -> Self {
        self.stdout_delay = delay;
        self
    }

    #[must_use]
    pub fn with_terminate_timeout(mut self, timeout: Duration) -> Self {
        self.terminate_timeout = timeout;
        self
    }

    /// Get the current run state.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.state.state()
    }

    /// Run the checker to completion.
    ///
    /// Returns only after both streams reached end of data and the checker
    /// exited. In watch mode that is whenever the long-lived checker stops,
    /// normally after a forwarded interruption.
    ///
    /// # Errors
    ///
    /// Returns `SupervisorError::Spawn` if the checker cannot be started, and
    /// a stream or reader error if output handling fails. The checker is
    /// terminated before a stream error is returned.
    pub async fn run(&mut self, invocation: &Invocation) -> Result<ExitOutcome, SupervisorError> {
        let flags = invocation.flags();
        let mut process = match CheckerProcess::spawn(invocation, self.color) {
            Ok(process) => process,
            Err(e) => {
                self.state.transition(RunState::Failed);
                return Err(e.into());
            }
        };
        self.state.transition(RunState::Running);
        tracing::info!(
            program = invocation.program(),
            watch = flags.watch,
            passthrough = flags.passthrough,
            "Checker started"
        );

        let stdout = process.take_stdout().ok_or(SupervisorError::NoStdout)?;
        let stderr = process.take_stderr().ok_or(SupervisorError::NoStderr)?;

        let token = CancellationToken::new();
        let mut out_task = self.spawn_reader(
            StreamTag::Stdout,
            stdout,
            flags,
            &token,
            self.stdout_delay,
        );
        let mut err_task =
            self.spawn_reader(StreamTag::Stderr, stderr, flags, &token, Duration::ZERO);
        let mut handler = InterruptHandler::new(token);

        let mut out_stats: Option<StreamStats> = None;
        let mut err_stats: Option<StreamStats> = None;
        let mut status = None;

        let (stdout_stats, stderr_stats, status) = loop {
            if let (Some(out), Some(err), Some(status)) = (out_stats, err_stats, status) {
                break (out, err, status);
            }

            tokio::select! {
                joined = &mut out_task, if out_stats.is_none() => {
                    match reader_result(joined, StreamTag::Stdout) {
                        Ok(stats) => out_stats = Some(stats),
                        Err(e) => return Err(self.fail(&mut process, &err_task, e).await),
                    }
                }
                joined = &mut err_task, if err_stats.is_none() => {
                    match reader_result(joined, StreamTag::Stderr) {
                        Ok(stats) => err_stats = Some(stats),
                        Err(e) => return Err(self.fail(&mut process, &out_task, e).await),
                    }
                }
                exited = process.wait(), if status.is_none() => {
                    let exited = exited.map_err(SupervisorError::Wait)?;
                    tracing::debug!(status = %exited, "Checker exited");
                    status = Some(exited);
                }
                Some(interruption) = self.interrupts.recv() => {
                    match handler.on_interrupt(interruption) {
                        InterruptAction::Forward => {
                            self.state.transition(RunState::ShuttingDown);
                            tracing::info!(?interruption, "Forwarding interruption to checker");
                            if let Err(e) = process.request_shutdown() {
                                tracing::warn!(error = %e, "Failed to forward interruption");
                            }
                        }
                        InterruptAction::Escalate => {
                            self.state.transition(RunState::Killing);
                            tracing::warn!(
                                ?interruption,
                                received = handler.received(),
                                "Repeated interruption, killing checker"
                            );
                            if status.is_none() {
                                if let Err(e) = process.start_kill() {
                                    tracing::warn!(error = %e, "Failed to kill checker");
                                }
                            }
                        }
                    }
                }
            }
        };

        self.state.transition(RunState::Completed);
        let outcome =
            ExitOutcome::resolve(status, handler.interruption(), stdout_stats, stderr_stats);
        tracing::debug!(
            code = outcome.code,
            checker_code = outcome.checker_code,
            interrupted = outcome.was_interrupted(),
            transitions = self.state.transitions(),
            "Run finished"
        );
        Ok(outcome)
    }

    fn spawn_reader<R>(
        &self,
        stream: StreamTag,
        reader: R,
        flags: InvocationFlags,
        token: &CancellationToken,
        start_delay: Duration,
    ) -> ReaderTask
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let reader = StreamReader::new(stream, reader, Arc::clone(&self.table), flags)
            .with_interrupt(token.clone())
            .with_start_delay(start_delay);
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move { reader.pump(sink.as_ref()).await })
    }

    /// Stop everything after a reader failure.
    ///
    /// The checker must not be left writing into a pipe nobody drains.
    async fn fail(
        &mut self,
        process: &mut CheckerProcess,
        other: &ReaderTask,
        error: SupervisorError,
    ) -> SupervisorError {
        self.state.transition(RunState::Failed);
        tracing::error!(error = %error, "Output handling failed, terminating checker");
        if let Err(e) = process.graceful_terminate(self.terminate_timeout).await {
            tracing::warn!(error = %e, "Failed to terminate checker");
        }
        other.abort();
        error
    }
}

fn reader_result(
    joined: Result<Result<StreamStats, StreamError>, JoinError>,
    stream: StreamTag,
) -> Result<StreamStats, SupervisorError> {
    match joined {
        Ok(Ok(stats)) => Ok(stats),
        Ok(Err(e)) => Err(SupervisorError::Stream(e)),
        Err(source) => Err(SupervisorError::ReaderFailed { stream, source }),
    }
}
