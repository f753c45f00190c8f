//! Graceful shutdown handling
//!
//! Ties signal handling to the cache lifecycle: a shutdown request stops
//! every background refetch and poller before long-running commands exit.

use crate::cache::TaskCache;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{info, warn};

/// Shutdown coordinator for graceful termination
#[derive(Clone)]
pub struct ShutdownCoordinator {
    /// Flag indicating shutdown has been requested
    shutdown_requested: Arc<AtomicBool>,
    /// Notifier for shutdown signal
    shutdown_notify: Arc<Notify>,
    /// Cache torn down on shutdown
    cache: Option<TaskCache>,
}

impl std::fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("shutdown_requested", &self.shutdown_requested.load(Ordering::SeqCst))
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator
    pub fn new() -> Self {
        Self {
            shutdown_requested: Arc::new(AtomicBool::new(false)),
            shutdown_notify: Arc::new(Notify::new()),
            cache: None,
        }
    }

    /// Shut `cache` down when shutdown is requested.
    pub fn with_cache(mut self, cache: TaskCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Request shutdown
    pub fn request_shutdown(&self) {
        if !self.shutdown_requested.swap(true, Ordering::SeqCst) {
            info!("Shutdown requested");
            if let Some(cache) = &self.cache {
                cache.shutdown();
            }
            self.shutdown_notify.notify_waiters();
        }
    }

    /// Check if shutdown has been requested
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    /// Wait for shutdown signal. Returns at once if already requested.
    pub async fn wait_for_shutdown(&self) {
        let notified = self.shutdown_notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_shutdown_requested() {
            return;
        }
        notified.await;
    }

    /// Install signal handlers for SIGINT and SIGTERM
    ///
    /// This spawns a background task that listens for signals and calls request_shutdown()
    pub fn install_signal_handlers(&self) -> tokio::task::JoinHandle<()> {
        let coordinator = self.clone();

        tokio::spawn(async move {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};

                let (mut sigint, mut sigterm) =
                    match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
                        (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
                        (Err(e), _) | (_, Err(e)) => {
                            warn!(error = %e, "Failed to install signal handlers");
                            return;
                        }
                    };

                tokio::select! {
                    _ = sigint.recv() => {
                        warn!("Received SIGINT, shutting down...");
                    }
                    _ = sigterm.recv() => {
                        warn!("Received SIGTERM, shutting down...");
                    }
                }
                coordinator.request_shutdown();
            }

            #[cfg(not(unix))]
            {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "Failed to install Ctrl+C handler");
                    return;
                }
                warn!("Received Ctrl+C, shutting down...");
                coordinator.request_shutdown();
            }
        })
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
