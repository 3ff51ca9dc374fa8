//! Line-by-line reader for one checker output stream.

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_util::sync::CancellationToken;

use crate::filter::{RuleTable, StreamContext};
use crate::output::{OutputSink, StreamTag};

use super::InvocationFlags;

/// Error type for stream operations.
#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    /// Reading from the checker failed before end of stream.
    #[error("failed to read checker {stream}: {source}")]
    Read {
        stream: StreamTag,
        source: std::io::Error,
    },
    /// Writing a kept line to the output sink failed.
    #[error("failed to write checker {stream} output: {source}")]
    Write {
        stream: StreamTag,
        source: std::io::Error,
    },
}

impl StreamError {
    #[must_use]
    pub fn stream(&self) -> StreamTag {
        match self {
            Self::Read { stream, .. } | Self::Write { stream, .. } => *stream,
        }
    }
}

/// One line read from the checker and the filter's verdict on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredLine {
    /// The raw line, always newline-terminated.
    pub bytes: Vec<u8>,
    pub kept: bool,
}

/// Line counts for one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub kept: usize,
    pub dropped: usize,
}

/// Reads one checker stream until end of data, classifying each line.
pub struct StreamReader<R> {
    reader: BufReader<R>,
    ctx: StreamContext,
    table: Arc<RuleTable>,
    flags: InvocationFlags,
    interrupt: Option<CancellationToken>,
    start_delay: Duration,
}

impl<R> StreamReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    #[must_use]
    pub fn new(
        stream: StreamTag,
        reader: R,
        table: Arc<RuleTable>,
        flags: InvocationFlags,
    ) -> Self {
        Self {
            reader: BufReader::new(reader),
            ctx: StreamContext::new(stream),
            table,
            flags,
            interrupt: None,
            start_delay: Duration::ZERO,
        }
    }

    /// Observe this token to know when an interruption was forwarded.
    #[must_use]
    pub fn with_interrupt(mut self, token: CancellationToken) -> Self {
        self.interrupt = Some(token);
        self
    }

    /// Wait this long before the first read.
    #[must_use]
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    #[must_use]
    pub fn stream(&self) -> StreamTag {
        self.ctx.stream()
    }

    /// The lazy sequence of classified lines.
    ///
    /// Ends at end of data, or right after yielding a read error.
    pub fn decisions(
        self,
    ) -> impl futures_core::Stream<Item = Result<FilteredLine, StreamError>> + Send {
        futures_util::stream::unfold(Some(self), |state| async move {
            let mut reader = state?;
            if !reader.start_delay.is_zero() {
                tokio::time::sleep(std::mem::take(&mut reader.start_delay)).await;
            }

            let mut bytes = Vec::new();
            match reader.read_line(&mut bytes).await {
                Ok(false) => None,
                Ok(true) => {
                    let kept = reader.classify(&bytes);
                    Some((Ok(FilteredLine { bytes, kept }), Some(reader)))
                }
                Err(source) => {
                    let stream = reader.stream();
                    Some((Err(StreamError::Read { stream, source }), None))
                }
            }
        })
    }

    /// Forward every kept line to the sink until end of data.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Read` if the stream fails and
    /// `StreamError::Write` if the sink rejects a line.
    pub async fn pump(self, sink: &dyn OutputSink) -> Result<StreamStats, StreamError> {
        let stream = self.stream();
        let mut decisions = pin!(self.decisions());
        let mut stats = StreamStats::default();

        while let Some(line) = decisions.next().await {
            let line = line?;
            if line.kept {
                sink.write_line(stream, &line.bytes)
                    .map_err(|source| StreamError::Write { stream, source })?;
                stats.kept += 1;
            } else {
                stats.dropped += 1;
            }
        }

        tracing::debug!(
            %stream,
            kept = stats.kept,
            dropped = stats.dropped,
            "Reached end of stream"
        );
        Ok(stats)
    }

    /// Read one line into `buf`, returning `false` at end of data.
    ///
    /// A final line without a newline gets one appended.
    async fn read_line(&mut self, buf: &mut Vec<u8>) -> std::io::Result<bool> {
        if self.reader.read_until(b'\n', buf).await? == 0 {
            return Ok(false);
        }
        if !buf.ends_with(b"\n") {
            buf.push(b'\n');
        }
        Ok(true)
    }

    fn classify(&mut self, line: &[u8]) -> bool {
        if let Some(token) = &self.interrupt {
            self.ctx.set_interrupted(token.is_cancelled());
        }
        self.table.classify(line, &mut self.ctx, &self.flags).is_keep()
    }
}
