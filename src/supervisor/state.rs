//! Run state machine.

/// Current state of a supervised run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    /// An interruption was forwarded; waiting for the checker to wind down.
    ShuttingDown,
    /// A repeated interruption forced a kill.
    Killing,
    Completed,
    Failed,
}

impl RunState {
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// State machine for tracking run progress.
#[derive(Debug, Clone, Default)]
pub struct RunStateMachine {
    state: RunState,
    transitions: usize,
}

impl RunStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn transition(&mut self, new_state: RunState) {
        tracing::debug!(from = ?self.state, to = ?new_state, "State transition");
        self.state = new_state;
        self.transitions = self.transitions.saturating_add(1);
    }

    #[must_use]
    pub fn transitions(&self) -> usize {
        self.transitions
    }
}
