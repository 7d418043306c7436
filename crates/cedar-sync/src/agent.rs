//! # Sync Agent
//!
//! Background task that decides WHEN the queue drains. The queue decides
//! HOW.
//!
//! ## Drain Triggers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SyncAgent Run Loop                               │
//! │                                                                         │
//! │   ┌──────────────────┐                                                  │
//! │   │ offline → online │──┐                                               │
//! │   │ (watch channel)  │  │                                               │
//! │   └──────────────────┘  │      ┌───────────────┐      ┌────────────┐   │
//! │   ┌──────────────────┐  ├─────►│ tokio::select!│─────►│ queue.drain│   │
//! │   │ poll interval    │──┤      └───────────────┘      └────────────┘   │
//! │   │ tick (online)    │  │              ▲                               │
//! │   └──────────────────┘  │              │                               │
//! │   ┌──────────────────┐  │       shutdown breaks                        │
//! │   │ manual trigger   │──┘                                               │
//! │   │ (capacity-1 mpsc)│                                                  │
//! │   └──────────────────┘                                                  │
//! │                                                                         │
//! │  COALESCING: the manual-trigger channel has capacity 1 and try_send    │
//! │  semantics; the queue's own single-flight guard absorbs the rest.      │
//! │  A flapping network cannot stack up concurrent drains.                 │
//! │                                                                         │
//! │  COOLDOWN: after a pass with failures the timer-driven triggers back   │
//! │  off exponentially; a clean pass or a reconnect edge resets it.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::connectivity::ConnectivityWatcher;
use crate::error::SyncResult;
use crate::queue::{DrainReport, QueueStats, SyncQueue};
use crate::transport::{SendAck, SyncTransport};

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Trait for pushing sync events to the host UI.
pub trait SyncEventEmitter: Send + Sync {
    /// Queue depth changed (for the sync badge).
    fn emit_progress(&self, stats: &QueueStats);

    /// Server acknowledgements arrived; the host reconciles `server_id`s
    /// onto its local records.
    fn emit_acks(&self, acks: &[SendAck]);

    /// A drain pass hit an error.
    fn emit_error(&self, message: &str, retryable: bool);
}

/// No-op event emitter for tests and headless runs.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_progress(&self, _stats: &QueueStats) {}
    fn emit_acks(&self, _acks: &[SendAck]) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
}

// =============================================================================
// Sync Agent
// =============================================================================

/// Owns the drain loop. Created via [`SyncAgent::spawn`].
pub struct SyncAgent {
    queue: Arc<SyncQueue>,
    transport: Arc<dyn SyncTransport>,
    connectivity: ConnectivityWatcher,
    emitter: Arc<dyn SyncEventEmitter>,
    poll_interval: Duration,
    drain_rx: mpsc::Receiver<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl SyncAgent {
    /// Spawns the agent's background task and returns its control handle.
    pub fn spawn(
        queue: Arc<SyncQueue>,
        transport: Arc<dyn SyncTransport>,
        connectivity: ConnectivityWatcher,
        config: &SyncConfig,
        emitter: Arc<dyn SyncEventEmitter>,
    ) -> SyncAgentHandle {
        // Capacity 1: a trigger fired while one is queued is redundant.
        let (drain_tx, drain_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let agent = SyncAgent {
            queue: queue.clone(),
            transport,
            connectivity,
            emitter,
            poll_interval: config.poll_interval(),
            drain_rx,
            shutdown_rx,
        };

        info!(
            poll_interval_secs = config.sync.poll_interval_secs,
            "Starting sync agent"
        );
        tokio::spawn(agent.run());

        SyncAgentHandle {
            drain_tx,
            shutdown_tx,
            queue,
        }
    }

    /// Main loop: waits for any trigger, drains, repeats until shutdown.
    async fn run(mut self) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // Timer-driven drains back off while the backend keeps failing.
        let mut cooldown = ExponentialBackoff {
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };
        let mut cooldown_until: Option<Instant> = None;

        loop {
            tokio::select! {
                changed = self.connectivity.changed() => {
                    match changed {
                        Some(true) => {
                            info!("Connectivity restored, draining queue");
                            // A fresh link deserves a fresh start
                            cooldown.reset();
                            cooldown_until = None;
                            self.drain_once(&mut cooldown, &mut cooldown_until).await;
                        }
                        Some(false) => {
                            info!("Connectivity lost, queueing locally");
                        }
                        None => {
                            warn!("Connectivity handle dropped, stopping sync agent");
                            break;
                        }
                    }
                }

                _ = interval.tick() => {
                    if !self.connectivity.is_online() {
                        continue;
                    }
                    if cooldown_until.is_some_and(|until| Instant::now() < until) {
                        debug!("Within failure cooldown, skipping periodic drain");
                        continue;
                    }
                    self.drain_once(&mut cooldown, &mut cooldown_until).await;
                }

                Some(()) = self.drain_rx.recv() => {
                    // Manual trigger bypasses the cooldown: the operator
                    // pressing "sync now" is the override.
                    self.drain_once(&mut cooldown, &mut cooldown_until).await;
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Sync agent received shutdown");
                    break;
                }
            }
        }

        info!("Sync agent stopped");
    }

    /// Runs one drain pass and routes its outcome to the emitter.
    async fn drain_once(
        &self,
        cooldown: &mut ExponentialBackoff,
        cooldown_until: &mut Option<Instant>,
    ) {
        let report = match self.queue.drain(self.transport.as_ref()).await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Drain pass failed");
                self.emitter.emit_error(&e.to_string(), e.is_retryable());
                return;
            }
        };

        if report.skipped {
            return;
        }

        self.handle_report(&report);

        if report.failed > 0 {
            if let Some(delay) = cooldown.next_backoff() {
                debug!(?delay, "Entering failure cooldown");
                *cooldown_until = Some(Instant::now() + delay);
            }
        } else {
            cooldown.reset();
            *cooldown_until = None;
        }
    }

    fn handle_report(&self, report: &DrainReport) {
        if !report.acks.is_empty() {
            self.emitter.emit_acks(&report.acks);
        }
        if report.sent > 0 || report.failed > 0 {
            match self.queue.stats() {
                Ok(stats) => self.emitter.emit_progress(&stats),
                Err(e) => warn!(error = %e, "Failed to read queue stats"),
            }
        }
    }
}

// =============================================================================
// Agent Handle (for external control)
// =============================================================================

/// Handle for controlling a running [`SyncAgent`] from the host app.
#[derive(Clone)]
pub struct SyncAgentHandle {
    drain_tx: mpsc::Sender<()>,
    shutdown_tx: mpsc::Sender<()>,
    queue: Arc<SyncQueue>,
}

impl SyncAgentHandle {
    /// Requests a drain pass ("sync now" button).
    ///
    /// Coalescing: if a request is already queued, this one is dropped -
    /// the pending pass will pick up everything anyway.
    pub fn request_drain(&self) {
        if self.drain_tx.try_send(()).is_err() {
            debug!("Drain request coalesced with a pending one");
        }
    }

    /// Current queue depth.
    pub fn stats(&self) -> SyncResult<QueueStats> {
        self.queue.stats()
    }

    /// Signals the agent to shut down gracefully.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::connectivity_channel;
    use crate::queue::{EntityKind, QueueAction, QueueItem};
    use crate::storage::MemoryStore;
    use async_trait::async_trait;

    struct OkTransport;

    #[async_trait]
    impl SyncTransport for OkTransport {
        async fn send(&self, item: &QueueItem) -> SyncResult<SendAck> {
            Ok(SendAck {
                entity_id: item.entity_id.clone(),
                server_id: Some(format!("srv-{}", item.entity_id)),
            })
        }
    }

    /// Routes agent logs through the test harness; filter with RUST_LOG.
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn queue() -> Arc<SyncQueue> {
        let config = SyncConfig::default();
        Arc::new(SyncQueue::load(Arc::new(MemoryStore::new()), &config).unwrap())
    }

    async fn wait_until_empty(handle: &SyncAgentHandle) {
        for _ in 0..200 {
            if handle.stats().unwrap().total() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("queue never drained: {:?}", handle.stats().unwrap());
    }

    #[tokio::test]
    async fn test_manual_trigger_drains() {
        init_tracing();
        let queue = queue();
        queue
            .enqueue(EntityKind::Sale, "sale-1", QueueAction::Create, &42)
            .unwrap();

        let (_conn, watcher) = connectivity_channel(true);
        let handle = SyncAgent::spawn(
            queue,
            Arc::new(OkTransport),
            watcher,
            &SyncConfig::default(),
            Arc::new(NoOpEmitter),
        );

        handle.request_drain();
        wait_until_empty(&handle).await;

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_reconnect_edge_drains() {
        init_tracing();
        let queue = queue();
        queue
            .enqueue(EntityKind::Sale, "sale-1", QueueAction::Create, &42)
            .unwrap();

        let (conn, watcher) = connectivity_channel(false);
        let handle = SyncAgent::spawn(
            queue,
            Arc::new(OkTransport),
            watcher,
            &SyncConfig::default(),
            Arc::new(NoOpEmitter),
        );

        // Still offline: nothing moves
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(handle.stats().unwrap().total(), 1);

        // Coming back online fires a drain without waiting for the timer
        conn.set_online(true);
        wait_until_empty(&handle).await;

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_repeated_triggers_coalesce() {
        init_tracing();
        let queue = queue();
        queue
            .enqueue(EntityKind::Sale, "sale-1", QueueAction::Create, &42)
            .unwrap();

        let (_conn, watcher) = connectivity_channel(true);
        let handle = SyncAgent::spawn(
            queue,
            Arc::new(OkTransport),
            watcher,
            &SyncConfig::default(),
            Arc::new(NoOpEmitter),
        );

        // Hammering the button must not panic or deadlock
        for _ in 0..50 {
            handle.request_drain();
        }
        wait_until_empty(&handle).await;

        handle.shutdown().await;
    }
}
