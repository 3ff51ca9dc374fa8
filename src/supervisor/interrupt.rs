//! External interruptions and their forwarding to the checker.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Windows exit status for a program terminated by Ctrl-C (`0xC000013A`).
#[cfg(windows)]
pub const STATUS_CONTROL_C_EXIT: i32 = -1_073_741_510;

/// An interruption directed at the wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    Hangup,
    Interrupt,
    Quit,
    Alarm,
    Terminate,
    /// Console Ctrl-C on platforms without Unix signals.
    CtrlC,
}

impl Interruption {
    /// Exit code the wrapper reports after this interruption.
    #[must_use]
    pub fn exit_code(self) -> i32 {
        #[cfg(windows)]
        {
            if self == Self::CtrlC {
                return STATUS_CONTROL_C_EXIT;
            }
        }

        match self {
            Self::Hangup => 129,
            Self::Interrupt | Self::CtrlC => 130,
            Self::Quit => 131,
            Self::Alarm => 142,
            Self::Terminate => 143,
        }
    }
}

/// A source of interruptions.
#[derive(Debug)]
pub struct Interrupts {
    rx: mpsc::Receiver<Interruption>,
    // Keeps `none()` pending forever instead of reporting a closed channel.
    _keepalive: Option<mpsc::Sender<Interruption>>,
}

impl Interrupts {
    /// Listen for the process signals that stop an interactive run.
    ///
    /// # Errors
    ///
    /// Returns an error if a signal handler cannot be installed.
    #[cfg(unix)]
    pub fn listen() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut hangup = signal(SignalKind::hangup())?;
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut quit = signal(SignalKind::quit())?;
        let mut alarm = signal(SignalKind::alarm())?;
        let mut terminate = signal(SignalKind::terminate())?;

        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    Some(()) = hangup.recv() => Interruption::Hangup,
                    Some(()) = interrupt.recv() => Interruption::Interrupt,
                    Some(()) = quit.recv() => Interruption::Quit,
                    Some(()) = alarm.recv() => Interruption::Alarm,
                    Some(()) = terminate.recv() => Interruption::Terminate,
                    else => break,
                };
                tracing::debug!(signal = ?received, "Received interruption");
                if tx.send(received).await.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            rx,
            _keepalive: None,
        })
    }

    /// Listen for console Ctrl-C.
    ///
    /// # Errors
    ///
    /// This function currently does not return errors; failures to listen
    /// are logged and end the listener.
    #[cfg(not(unix))]
    pub fn listen() -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
                    break;
                }
                tracing::debug!("Received Ctrl+C");
                if tx.send(Interruption::CtrlC).await.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            rx,
            _keepalive: None,
        })
    }

    /// A source fed by hand, for embedding and tests.
    #[must_use]
    pub fn channel(buffer: usize) -> (mpsc::Sender<Interruption>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (
            tx,
            Self {
                rx,
                _keepalive: None,
            },
        )
    }

    /// A source that never interrupts.
    #[must_use]
    pub fn none() -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            rx,
            _keepalive: Some(tx),
        }
    }

    /// Wait for the next interruption.
    ///
    /// Returns `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Interruption> {
        self.rx.recv().await
    }
}

/// What the supervisor should do about an interruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// Ask the checker to shut down gracefully.
    Forward,
    /// Shutdown is already underway; kill the checker.
    Escalate,
}

/// Tracks interruptions over one run.
///
/// The first interruption is forwarded exactly once and cancels the token
/// the stream readers observe; any later one escalates.
#[derive(Debug)]
pub struct InterruptHandler {
    first: Option<Interruption>,
    received: usize,
    token: CancellationToken,
}

impl InterruptHandler {
    #[must_use]
    pub fn new(token: CancellationToken) -> Self {
        Self {
            first: None,
            received: 0,
            token,
        }
    }

    pub fn on_interrupt(&mut self, interruption: Interruption) -> InterruptAction {
        self.received = self.received.saturating_add(1);
        if self.first.is_some() {
            return InterruptAction::Escalate;
        }
        self.first = Some(interruption);
        self.token.cancel();
        InterruptAction::Forward
    }

    /// The interruption that started shutdown, if any.
    #[must_use]
    pub fn interruption(&self) -> Option<Interruption> {
        self.first
    }

    /// Number of interruptions seen so far.
    #[must_use]
    pub fn received(&self) -> usize {
        self.received
    }
}
