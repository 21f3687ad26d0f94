//! Interrupt handling for a review run
//!
//! The first SIGINT/SIGTERM cancels the run token: in-flight reviews stop,
//! queued files are reported as cancelled and the partial report is still
//! printed. A second signal exits immediately.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Exit code used when a second signal forces termination.
pub const FORCED_EXIT_CODE: i32 = 130;

/// Shutdown coordinator tied to the run's cancellation token
#[derive(Clone)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    signals: Arc<AtomicUsize>,
}

impl std::fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("shutdown_requested", &self.is_shutdown_requested())
            .field("signals", &self.signals.load(Ordering::SeqCst))
            .finish()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Coordinate an existing token.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            signals: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Token to hand to the runner.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel the run; idempotent.
    pub fn request_shutdown(&self) {
        if !self.token.is_cancelled() {
            info!("Shutdown requested, cancelling review run");
            self.token.cancel();
        }
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn wait_for_shutdown(&self) {
        self.token.cancelled().await;
    }

    /// Record one received signal. Returns true when it was a repeat and the
    /// process should exit without waiting for the run.
    pub fn on_signal(&self) -> bool {
        let previous = self.signals.fetch_add(1, Ordering::SeqCst);
        self.request_shutdown();
        previous > 0
    }

    /// Install signal handlers for SIGINT and SIGTERM (Ctrl+C elsewhere)
    pub fn install_signal_handlers(&self) -> tokio::task::JoinHandle<()> {
        let coordinator = self.clone();

        tokio::spawn(async move {
            loop {
                if let Err(e) = wait_for_signal().await {
                    error!(error = %e, "Failed to install signal handler; interrupts will not cancel the run");
                    return;
                }
                if coordinator.on_signal() {
                    warn!("Received second interrupt, exiting immediately");
                    std::process::exit(FORCED_EXIT_CODE);
                }
                warn!("Received interrupt, finishing with partial results (press Ctrl+C again to abort)");
            }
        })
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_request_shutdown_cancels_token() {
        let coordinator = ShutdownCoordinator::new();
        let token = coordinator.token();
        assert!(!coordinator.is_shutdown_requested());

        coordinator.request_shutdown();
        coordinator.request_shutdown();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_second_signal_forces_exit() {
        let coordinator = ShutdownCoordinator::new();
        assert!(!coordinator.on_signal());
        assert!(coordinator.is_shutdown_requested());
        assert!(coordinator.on_signal());
    }

    #[tokio::test]
    async fn test_wait_for_shutdown() {
        let coordinator = ShutdownCoordinator::new();
        let waiter_side = coordinator.clone();

        let waiter = tokio::spawn(async move {
            waiter_side.wait_for_shutdown().await;
            "shutdown received"
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        coordinator.request_shutdown();

        let result = tokio::time::timeout(Duration::from_millis(100), waiter).await;
        assert_eq!(result.unwrap().unwrap(), "shutdown received");
    }

    #[tokio::test]
    async fn test_child_of_shared_token_sees_shutdown() {
        let parent = CancellationToken::new();
        let coordinator = ShutdownCoordinator::with_token(parent.clone());
        let child = parent.child_token();

        coordinator.request_shutdown();
        assert!(child.is_cancelled());
    }
}
