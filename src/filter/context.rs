//! Per-stream classification state.

use crate::output::StreamTag;

use super::Terminator;

/// Suppression state carried from one line to the next.
#[derive(Debug, Clone, Default)]
pub enum SuppressState {
    #[default]
    Normal,
    /// The previous line was noise whose blank separator should go too.
    AfterNoise,
    /// Inside a dropped block; lines are dropped until the terminator.
    SuppressingUntil(Terminator),
}

/// State owned by exactly one stream reader.
#[derive(Debug, Clone)]
pub struct StreamContext {
    stream: StreamTag,
    interrupted: bool,
    state: SuppressState,
}

impl StreamContext {
    #[must_use]
    pub fn new(stream: StreamTag) -> Self {
        Self {
            stream,
            interrupted: false,
            state: SuppressState::Normal,
        }
    }

    #[must_use]
    pub fn stream(&self) -> StreamTag {
        self.stream
    }

    #[must_use]
    pub fn interrupted(&self) -> bool {
        self.interrupted
    }

    /// Record that an interruption has been forwarded to the checker.
    pub fn set_interrupted(&mut self, interrupted: bool) {
        self.interrupted = interrupted;
    }

    #[must_use]
    pub fn state(&self) -> &SuppressState {
        &self.state
    }

    pub(crate) fn transition(&mut self, state: SuppressState) {
        self.state = state;
    }

    pub(crate) fn take_state(&mut self) -> SuppressState {
        std::mem::take(&mut self.state)
    }

    #[must_use]
    pub fn is_suppressing(&self) -> bool {
        matches!(self.state, SuppressState::SuppressingUntil(_))
    }
}

/// Outcome of classifying one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision<'a> {
    /// Emit these bytes, which are always the input line unchanged.
    Keep(&'a [u8]),
    Drop,
}

impl Decision<'_> {
    #[must_use]
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep(_))
    }
}
