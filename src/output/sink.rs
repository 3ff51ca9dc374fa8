//! Destinations for lines that survive filtering.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// One of the two standard output channels of the checker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamTag {
    Stdout,
    Stderr,
}

impl StreamTag {
    /// Name used in logs and error messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives every kept line, tagged with the stream it came from.
///
/// Implementations are shared between the two stream readers, so writes
/// for different tags may arrive concurrently. Writes for the same tag
/// always arrive in the order the checker produced them.
pub trait OutputSink: Send + Sync {
    /// Write one complete line, line ending included.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the destination rejects the write.
    fn write_line(&self, stream: StreamTag, line: &[u8]) -> io::Result<()>;
}

/// Sink that mirrors each stream onto this process's own stdout or stderr.
///
/// Every line is flushed immediately so a human watching a terminal sees
/// output as the checker produces it.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdSink;

impl OutputSink for StdSink {
    fn write_line(&self, stream: StreamTag, line: &[u8]) -> io::Result<()> {
        match stream {
            StreamTag::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(line)?;
                out.flush()
            }
            StreamTag::Stderr => {
                let mut err = io::stderr().lock();
                err.write_all(line)?;
                err.flush()
            }
        }
    }
}

/// Sink that records kept lines in memory.
#[derive(Debug, Default)]
pub struct CaptureSink {
    lines: Mutex<Vec<(StreamTag, Vec<u8>)>>,
}

impl CaptureSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured lines in arrival order.
    #[must_use]
    pub fn lines(&self) -> Vec<(StreamTag, Vec<u8>)> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Captured lines of one stream, decoded lossily and without line endings.
    #[must_use]
    pub fn text(&self, stream: StreamTag) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(tag, _)| *tag == stream)
            .map(|(_, bytes)| {
                String::from_utf8_lossy(bytes)
                    .trim_end_matches(['\n', '\r'])
                    .to_string()
            })
            .collect()
    }

    /// Raw bytes written to one stream, concatenated.
    #[must_use]
    pub fn bytes(&self, stream: StreamTag) -> Vec<u8> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(tag, _)| *tag == stream)
            .flat_map(|(_, bytes)| bytes.iter().copied())
            .collect()
    }
}

impl OutputSink for CaptureSink {
    fn write_line(&self, stream: StreamTag, line: &[u8]) -> io::Result<()> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((stream, line.to_vec()));
        Ok(())
    }
}
