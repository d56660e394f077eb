//! Change notification and periodic reloading.
//!
//! - [`PolicyChange`] - events published by [`crate::PolicyService`]
//! - [`PolicyChangeNotifier`] - broadcast channel for those events
//! - [`PolicyWatcher`] - background task that polls for changed documents
//!
//! ```ignore
//! let watcher = PolicyWatcher::new(service.clone(), ReloadConfig::default());
//! let stats = watcher.stats();
//! let handle = watcher.spawn();
//! // ...
//! handle.stop().await;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{broadcast, oneshot};
use tokio::time::{Duration, MissedTickBehavior};

use crate::service::PolicyService;

// =============================================================================
// Policy Change Types
// =============================================================================

/// Events emitted when the published snapshot changes or fails to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyChange {
    /// A new snapshot was published.
    Reloaded {
        generation: u64,
        fingerprint: String,
    },
    /// Loading failed; the previous snapshot is still published.
    ReloadFailed {
        /// Generation still in effect.
        generation: u64,
        error: String,
    },
}

impl PolicyChange {
    #[must_use]
    pub fn generation(&self) -> u64 {
        match self {
            Self::Reloaded { generation, .. } | Self::ReloadFailed { generation, .. } => *generation,
        }
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::ReloadFailed { .. })
    }
}

// =============================================================================
// Policy Change Notifier
// =============================================================================

/// Broadcast channel for policy change notifications.
pub struct PolicyChangeNotifier {
    sender: broadcast::Sender<PolicyChange>,
}

impl PolicyChangeNotifier {
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of pending notifications per subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Send to all subscribers. Dropped silently when nobody listens.
    pub fn notify(&self, change: PolicyChange) {
        let _ = self.sender.send(change);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PolicyChange> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for PolicyChangeNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

impl std::fmt::Debug for PolicyChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyChangeNotifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

// =============================================================================
// Reload Configuration
// =============================================================================

/// Shortest time between change checks; smaller intervals are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration for [`PolicyWatcher`].
#[derive(Debug, Clone)]
pub struct ReloadConfig {
    /// Time between change checks. Never below [`MIN_POLL_INTERVAL`].
    poll_interval: Duration,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
        }
    }
}

impl ReloadConfig {
    /// Intervals below [`MIN_POLL_INTERVAL`], zero included, are raised to it.
    #[must_use]
    pub fn with_interval(poll_interval: Duration) -> Self {
        if poll_interval < MIN_POLL_INTERVAL {
            tracing::warn!(
                requested_ms = poll_interval.as_millis() as u64,
                minimum_ms = MIN_POLL_INTERVAL.as_millis() as u64,
                "Policy poll interval raised to the minimum"
            );
        }
        Self {
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
        }
    }

    /// Fast polling for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            poll_interval: MIN_POLL_INTERVAL,
        }
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

// =============================================================================
// Reload Statistics
// =============================================================================

/// Counters maintained by a [`PolicyWatcher`].
#[derive(Debug, Default)]
pub struct ReloadStats {
    successful: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`ReloadStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadStatsSnapshot {
    /// Reloads that published a new snapshot.
    pub successful: u64,
    /// Checks that found nothing changed.
    pub skipped: u64,
    /// Checks that failed to load.
    pub failed: u64,
}

impl ReloadStats {
    #[must_use]
    pub fn snapshot(&self) -> ReloadStatsSnapshot {
        ReloadStatsSnapshot {
            successful: self.successful.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// Watcher
// =============================================================================

/// Handle for a running watcher.
pub struct WatchHandle {
    handle: tokio::task::JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
}

impl WatchHandle {
    /// Stop the watcher and wait for it to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, panicked = e.is_panic(), "Policy watcher task failed");
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Polls [`PolicyService::reload_if_changed`] until stopped.
///
/// Failed checks are not retried early; the next tick tries again.
pub struct PolicyWatcher {
    service: Arc<PolicyService>,
    config: ReloadConfig,
    stats: Arc<ReloadStats>,
}

impl PolicyWatcher {
    #[must_use]
    pub fn new(service: Arc<PolicyService>, config: ReloadConfig) -> Self {
        Self {
            service,
            config,
            stats: Arc::new(ReloadStats::default()),
        }
    }

    #[must_use]
    pub fn stats(&self) -> Arc<ReloadStats> {
        self.stats.clone()
    }

    /// Run one check and record its outcome.
    pub async fn check_once(&self) {
        match self.service.reload_if_changed().await {
            Ok(Some(snapshot)) => {
                self.stats.successful.fetch_add(1, Ordering::Relaxed);
                tracing::info!(generation = snapshot.generation, "Policy change picked up");
            }
            Ok(None) => {
                self.stats.skipped.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("Policy unchanged");
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, category = e.category(), "Policy check failed");
            }
        }
    }

    /// Start polling in a background task.
    #[must_use]
    pub fn spawn(self) -> WatchHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the service already holds a fresh load.
            ticker.tick().await;

            tracing::info!(
                interval_ms = self.config.poll_interval.as_millis() as u64,
                "Policy watcher started"
            );

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        tracing::info!("Policy watcher shutting down");
                        break;
                    }
                    _ = ticker.tick() => self.check_once().await,
                }
            }
        });

        WatchHandle {
            handle,
            shutdown: shutdown_tx,
        }
    }
}
