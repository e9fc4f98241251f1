//! Graceful Shutdown Handler
//!
//! A single request flips the shared flag and wakes every token. Tokens are
//! polled at cycle boundaries and raced against the inter-cycle delay, so a
//! cycle that has started always runs to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Shutdown signal types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Ctrl+C / SIGINT
    Interrupt,
    /// SIGTERM
    Terminate,
    /// Requested from inside the process
    Internal,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::Interrupt => write!(f, "interrupt"),
            ShutdownSignal::Terminate => write!(f, "terminate"),
            ShutdownSignal::Internal => write!(f, "internal"),
        }
    }
}

/// Graceful shutdown coordinator
pub struct GracefulShutdown {
    shutdown_requested: Arc<AtomicBool>,
    signal_tx: watch::Sender<Option<ShutdownSignal>>,
    signal_rx: watch::Receiver<Option<ShutdownSignal>>,
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl GracefulShutdown {
    pub fn new() -> Self {
        let (signal_tx, signal_rx) = watch::channel(None);
        Self {
            shutdown_requested: Arc::new(AtomicBool::new(false)),
            signal_tx,
            signal_rx,
        }
    }

    /// Check if shutdown has been requested
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    /// The signal that triggered shutdown, if any
    pub fn signal(&self) -> Option<ShutdownSignal> {
        *self.signal_rx.borrow()
    }

    /// Request shutdown; only the first request is recorded
    pub fn request_shutdown(&self, signal: ShutdownSignal) {
        if self.shutdown_requested.swap(true, Ordering::SeqCst) {
            warn!("Shutdown already requested, ignoring duplicate signal: {}", signal);
            return;
        }

        info!("Shutdown requested: {}", signal);
        let _ = self.signal_tx.send(Some(signal));
    }

    /// Create a token that can be used to check shutdown status
    pub fn token(&self) -> ShutdownToken {
        ShutdownToken {
            shutdown_requested: self.shutdown_requested.clone(),
            signal_rx: self.signal_rx.clone(),
        }
    }
}

/// Token for checking shutdown status in async tasks
#[derive(Clone)]
pub struct ShutdownToken {
    shutdown_requested: Arc<AtomicBool>,
    signal_rx: watch::Receiver<Option<ShutdownSignal>>,
}

impl ShutdownToken {
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    /// Resolves once shutdown is requested; never resolves otherwise
    pub async fn cancelled(&self) {
        let mut rx = self.signal_rx.clone();
        loop {
            if self.is_shutdown_requested() || rx.borrow().is_some() {
                return;
            }
            if rx.changed().await.is_err() {
                // coordinator dropped without a request
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Install OS signal handlers that request shutdown
pub fn install_signal_handlers(shutdown: Arc<GracefulShutdown>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        for (kind, sig) in [
            (SignalKind::interrupt(), ShutdownSignal::Interrupt),
            (SignalKind::terminate(), ShutdownSignal::Terminate),
        ] {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let mut stream = match signal(kind) {
                    Ok(stream) => stream,
                    Err(e) => {
                        error!("Failed to install {} handler: {}", sig, e);
                        return;
                    }
                };
                if stream.recv().await.is_some() {
                    info!("Received {} signal", sig);
                    shutdown.request_shutdown(sig);
                }
            });
        }
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C");
                    shutdown.request_shutdown(ShutdownSignal::Interrupt);
                }
                Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
            }
        });
    }
}
