// Signal handling for graceful server shutdown

use crate::error::{Result, SiftError};
use std::fmt;
use tokio::signal::unix::{signal, Signal as TokioSignal, SignalKind};

/// Shutdown signals the server reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Terminate,
    Interrupt,
    Hangup,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Terminate => write!(f, "SIGTERM"),
            Signal::Interrupt => write!(f, "SIGINT"),
            Signal::Hangup => write!(f, "SIGHUP"),
        }
    }
}

/// Signal handler that manages multiple Unix signals
pub struct SignalHandler {
    sigterm: TokioSignal,
    sigint: TokioSignal,
    sighup: TokioSignal,
}

impl SignalHandler {
    /// Create a new signal handler
    /// Sets up handlers for SIGTERM, SIGINT and SIGHUP
    pub fn new() -> Result<Self> {
        let sigterm = signal(SignalKind::terminate()).map_err(|e| SiftError::Io {
            source: e,
            context: "Failed to setup SIGTERM handler".to_string(),
        })?;
        let sigint = signal(SignalKind::interrupt()).map_err(|e| SiftError::Io {
            source: e,
            context: "Failed to setup SIGINT handler".to_string(),
        })?;
        let sighup = signal(SignalKind::hangup()).map_err(|e| SiftError::Io {
            source: e,
            context: "Failed to setup SIGHUP handler".to_string(),
        })?;

        Ok(Self {
            sigterm,
            sigint,
            sighup,
        })
    }

    /// Wait for any signal to be received
    pub async fn wait(&mut self) -> Signal {
        let received = tokio::select! {
            _ = self.sigterm.recv() => Signal::Terminate,
            _ = self.sigint.recv() => Signal::Interrupt,
            _ = self.sighup.recv() => Signal::Hangup,
        };
        tracing::info!("Received {}", received);
        received
    }
}
