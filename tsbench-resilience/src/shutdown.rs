//! Run-wide shutdown coordination
//!
//! A run stops in two steps. A graceful stop makes the scheduler stop reading
//! points and lets queued batches drain. A forced stop additionally makes
//! workers abandon batches that are still being resent.

use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Shutdown signal types with escalating urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShutdownSignal {
    /// Stop reading points, drain what is queued
    Graceful,
    /// Abandon in-flight work
    Forced,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::Graceful => write!(f, "graceful"),
            ShutdownSignal::Forced => write!(f, "forced"),
        }
    }
}

/// Shutdown errors
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("Shutdown already at {0} level")]
    AlreadyShuttingDown(ShutdownSignal),

    #[error("Failed to listen for interrupt signal: {0}")]
    SignalHandler(String),
}

/// Shutdown coordinator shared by the scheduler, the workers and whoever
/// may stop a run (timers, signal handlers, tests)
#[derive(Debug)]
pub struct ShutdownCoordinator {
    state: watch::Sender<Option<ShutdownSignal>>,
    stopping: AtomicBool,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state,
            stopping: AtomicBool::new(false),
        }
    }

    /// Subscribe to shutdown state changes
    pub fn subscribe(&self) -> watch::Receiver<Option<ShutdownSignal>> {
        self.state.subscribe()
    }

    /// Check if any shutdown was requested; cheap enough for per-point checks
    pub fn is_shutting_down(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// Current shutdown level
    pub fn signal(&self) -> Option<ShutdownSignal> {
        *self.state.borrow()
    }

    pub fn is_forced(&self) -> bool {
        self.signal() == Some(ShutdownSignal::Forced)
    }

    /// Request a shutdown; a request never lowers the current level
    pub fn request(&self, signal: ShutdownSignal) -> Result<(), ShutdownError> {
        let mut current = None;
        let escalated = self.state.send_if_modified(|state| {
            current = *state;
            match *state {
                Some(existing) if existing >= signal => false,
                _ => {
                    *state = Some(signal);
                    true
                }
            }
        });

        if !escalated {
            return Err(ShutdownError::AlreadyShuttingDown(current.unwrap_or(signal)));
        }

        self.stopping.store(true, Ordering::Release);
        match signal {
            ShutdownSignal::Graceful => info!("Graceful shutdown requested, draining queued batches"),
            ShutdownSignal::Forced => warn!("Forced shutdown requested, abandoning in-flight batches"),
        }
        Ok(())
    }

    /// Request a graceful stop, ignoring repeated requests
    pub fn cancel(&self) {
        let _ = self.request(ShutdownSignal::Graceful);
    }

    /// Wait until at least the given level has been requested
    pub async fn wait_for(&self, level: ShutdownSignal) {
        let mut receiver = self.state.subscribe();
        // The sender lives in self, so the channel cannot close while we wait
        let _ = receiver
            .wait_for(|state| state.is_some_and(|current| current >= level))
            .await;
    }

    /// Escalate a graceful stop to a forced one once `grace` has passed
    pub fn escalate_after(self: &Arc<Self>, grace: Duration) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            coordinator.wait_for(ShutdownSignal::Graceful).await;
            tokio::time::sleep(grace).await;
            if coordinator.request(ShutdownSignal::Forced).is_ok() {
                warn!("Batches did not drain within {:?}", grace);
            }
        })
    }

    /// Request a graceful stop after `after` has elapsed
    pub fn stop_after(self: &Arc<Self>, after: Duration) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if coordinator.request(ShutdownSignal::Graceful).is_ok() {
                info!("Maximum run time of {:?} reached", after);
            }
        })
    }

    /// Map interrupts onto shutdown requests: the first one stops gracefully,
    /// the second forces
    pub fn install_signal_handler(self: &Arc<Self>) -> JoinHandle<Result<(), ShutdownError>> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            for signal in [ShutdownSignal::Graceful, ShutdownSignal::Forced] {
                tokio::signal::ctrl_c()
                    .await
                    .map_err(|e| ShutdownError::SignalHandler(e.to_string()))?;
                info!("Interrupt received");
                let _ = coordinator.request(signal);
            }
            Ok(())
        })
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_only_escalate() {
        let coordinator = ShutdownCoordinator::new();
        assert!(!coordinator.is_shutting_down());
        assert_eq!(coordinator.signal(), None);

        coordinator.request(ShutdownSignal::Graceful).unwrap();
        assert!(coordinator.is_shutting_down());
        assert!(!coordinator.is_forced());

        assert!(matches!(
            coordinator.request(ShutdownSignal::Graceful),
            Err(ShutdownError::AlreadyShuttingDown(ShutdownSignal::Graceful))
        ));

        coordinator.request(ShutdownSignal::Forced).unwrap();
        assert!(coordinator.is_forced());

        assert!(coordinator.request(ShutdownSignal::Graceful).is_err());
        assert_eq!(coordinator.signal(), Some(ShutdownSignal::Forced));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.cancel();
        coordinator.cancel();
        assert_eq!(coordinator.signal(), Some(ShutdownSignal::Graceful));
    }

    #[tokio::test]
    async fn test_wait_for_forced_after_direct_force() {
        let coordinator = Arc::new(ShutdownCoordinator::new());
        let waiter = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.wait_for(ShutdownSignal::Forced).await })
        };

        coordinator.request(ShutdownSignal::Forced).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_after_then_escalate() {
        let coordinator = Arc::new(ShutdownCoordinator::new());
        let _stop = coordinator.stop_after(Duration::from_secs(5));
        let _escalate = coordinator.escalate_after(Duration::from_secs(2));

        let start = tokio::time::Instant::now();
        coordinator.wait_for(ShutdownSignal::Graceful).await;
        assert_eq!(start.elapsed(), Duration::from_secs(5));

        coordinator.wait_for(ShutdownSignal::Forced).await;
        assert_eq!(start.elapsed(), Duration::from_secs(7));
    }
}
