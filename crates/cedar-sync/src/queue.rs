//! # Sync Queue
//!
//! Durable, priority-ordered outbox for offline-created records.
//!
//! ## Item Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Queue Item Lifecycle                              │
//! │                                                                         │
//! │   enqueue()                                                             │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │   PENDING ──── drain picks up ────► SYNCING                            │
//! │      ▲                                 │                                │
//! │      │                                 ├── ack ──► removed (done)      │
//! │      │  backoff elapsed,               │                                │
//! │      │  attempts < max                 └── error ─► FAILED             │
//! │      │                                               │                  │
//! │      └───────────────────────────────────────────────┤                  │
//! │                                                      │                  │
//! │   retry_item() / retry_failed() ─────────────────────┘                  │
//! │   (manual, always allowed, even past max attempts)                      │
//! │                                                                         │
//! │   FAILED items are NEVER auto-purged. An unsynced sale is money the    │
//! │   books don't know about yet.                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Drain Pass
//! ```text
//! 1. try_lock the drain guard      → skipped report if a pass is running
//! 2. promote eligible FAILED items → PENDING (backoff elapsed, not at max)
//! 3. sort PENDING by (priority, created_at), take batch_size
//! 4. per item: mark SYNCING, persist, send with deadline
//!      ack      → remove, persist
//!      error    → attempts += 1, FAILED, schedule next_attempt_at, persist
//! ```
//!
//! Persisting after every state change means a power cut mid-drain leaves
//! items SYNCING; they revert to PENDING on the next load and the server
//! dedupes the resend by `entity_id`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{RetryPolicy, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::storage::KeyValueStore;
use crate::transport::{SendAck, SyncTransport};

/// Storage key the queue persists under.
const QUEUE_STORAGE_KEY: &str = "sync_queue";

// =============================================================================
// Entity Kind
// =============================================================================

/// What kind of record a queue item carries.
///
/// ## Drain Order
/// Sessions sync first so the backend can attach sales to them, then cash
/// movements, then sales, then barcode links. Lower number drains first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Session,
    CashMovement,
    Sale,
    BarcodeLink,
}

impl EntityKind {
    /// Default drain priority (lower drains first).
    pub const fn default_priority(&self) -> u8 {
        match self {
            EntityKind::Session => 0,
            EntityKind::CashMovement => 1,
            EntityKind::Sale => 2,
            EntityKind::BarcodeLink => 3,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Session => "session",
            EntityKind::CashMovement => "cash_movement",
            EntityKind::Sale => "sale",
            EntityKind::BarcodeLink => "barcode_link",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the backend should do with the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueAction {
    Create,
    Update,
    Delete,
}

// =============================================================================
// Queue Item
// =============================================================================

/// Sync state of one queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueItemStatus {
    /// Waiting for a drain pass.
    Pending,
    /// A drain pass is currently sending this item.
    Syncing,
    /// Last send failed; waiting for backoff or manual retry.
    Failed,
}

/// One durable entry in the outbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    /// Queue-internal id.
    pub id: String,

    pub entity_kind: EntityKind,

    /// The entity's client-side `local_id` - the idempotency key the
    /// server dedupes on.
    pub entity_id: String,

    pub action: QueueAction,

    /// Full entity snapshot as JSON.
    pub payload: serde_json::Value,

    /// Drain priority (lower first). Defaults from the entity kind.
    pub priority: u8,

    /// Failed send attempts so far.
    pub attempts: u32,

    /// Message of the last send failure.
    pub last_error: Option<String>,

    /// Earliest time the next automatic attempt may run.
    /// `None` on a FAILED item means manual retry only.
    pub next_attempt_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub status: QueueItemStatus,
}

// =============================================================================
// Stats and Drain Report
// =============================================================================

/// Queue depth by status, for the sync badge in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub syncing: usize,
    pub failed: usize,
}

impl QueueStats {
    /// Total items still in the queue.
    pub fn total(&self) -> usize {
        self.pending + self.syncing + self.failed
    }
}

/// Outcome of one drain pass.
#[derive(Debug, Default)]
pub struct DrainReport {
    /// Items acknowledged and removed.
    pub sent: usize,

    /// Items that failed this pass.
    pub failed: usize,

    /// True when another drain pass held the guard and this call did
    /// nothing.
    pub skipped: bool,

    /// Server acknowledgements, for reconciling local records.
    pub acks: Vec<SendAck>,
}

// =============================================================================
// Persisted Form
// =============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedQueue {
    items: Vec<QueueItem>,
}

// =============================================================================
// Sync Queue
// =============================================================================

/// The durable outbox.
///
/// Shared via `Arc`; `enqueue` and `stats` are callable from anywhere,
/// `drain` is single-flight (concurrent callers get a skipped report).
pub struct SyncQueue {
    store: Arc<dyn KeyValueStore>,
    retry: RetryPolicy,
    batch_size: usize,
    send_timeout: Duration,

    /// Item list guard. Never held across an await.
    items: Mutex<Vec<QueueItem>>,

    /// Single-flight drain guard.
    drain_guard: tokio::sync::Mutex<()>,
}

impl SyncQueue {
    /// Loads the queue from storage.
    ///
    /// ## Crash Recovery
    /// Items found in SYNCING state were mid-send when the process died;
    /// the ack never arrived, so they revert to PENDING. The server's
    /// `entity_id` dedupe makes the resend harmless.
    pub fn load(store: Arc<dyn KeyValueStore>, config: &SyncConfig) -> SyncResult<Self> {
        let mut persisted: PersistedQueue = match store.get(QUEUE_STORAGE_KEY)? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => PersistedQueue::default(),
        };

        let mut recovered = 0;
        for item in &mut persisted.items {
            if item.status == QueueItemStatus::Syncing {
                item.status = QueueItemStatus::Pending;
                recovered += 1;
            }
        }
        if recovered > 0 {
            info!(recovered, "Recovered in-flight queue items from previous run");
        }

        let queue = SyncQueue {
            store,
            retry: config.retry.clone(),
            batch_size: config.sync.batch_size,
            send_timeout: config.send_timeout(),
            items: Mutex::new(persisted.items),
            drain_guard: tokio::sync::Mutex::new(()),
        };

        if recovered > 0 {
            queue.persist()?;
        }

        Ok(queue)
    }

    // =========================================================================
    // Enqueue
    // =========================================================================

    /// Adds an entity snapshot to the outbox.
    ///
    /// Serializes the entity, assigns the kind's default priority, and
    /// persists before returning - once this returns `Ok`, the record
    /// survives a process kill.
    ///
    /// ## Errors
    /// [`SyncError::DuplicateEntry`] when an item for the same entity and
    /// action is already pending or in flight. Re-enqueueing after a
    /// failure is allowed via [`retry_item`](Self::retry_item) instead.
    pub fn enqueue<T: Serialize>(
        &self,
        entity_kind: EntityKind,
        entity_id: impl Into<String>,
        action: QueueAction,
        entity: &T,
    ) -> SyncResult<String> {
        let entity_id = entity_id.into();
        let payload = serde_json::to_value(entity)?;

        let item = QueueItem {
            id: Uuid::new_v4().to_string(),
            entity_kind,
            entity_id: entity_id.clone(),
            action,
            payload,
            priority: entity_kind.default_priority(),
            attempts: 0,
            last_error: None,
            next_attempt_at: None,
            created_at: Utc::now(),
            status: QueueItemStatus::Pending,
        };
        let id = item.id.clone();

        {
            let mut items = self.lock_items()?;
            let duplicate = items.iter().any(|existing| {
                existing.entity_id == entity_id
                    && existing.entity_kind == entity_kind
                    && existing.action == action
                    && matches!(
                        existing.status,
                        QueueItemStatus::Pending | QueueItemStatus::Syncing
                    )
            });
            if duplicate {
                return Err(SyncError::DuplicateEntry {
                    entity_kind: entity_kind.to_string(),
                    entity_id,
                });
            }
            items.push(item);
        }

        // A record that could not be persisted must not linger in memory
        // either, or a later drain would send something a restart forgets.
        if let Err(e) = self.persist() {
            self.lock_items()?.retain(|i| i.id != id);
            return Err(e);
        }
        debug!(%entity_kind, %entity_id, "Enqueued for sync");
        Ok(id)
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Queue depth by status.
    pub fn stats(&self) -> SyncResult<QueueStats> {
        let items = self.lock_items()?;
        let mut stats = QueueStats::default();
        for item in items.iter() {
            match item.status {
                QueueItemStatus::Pending => stats.pending += 1,
                QueueItemStatus::Syncing => stats.syncing += 1,
                QueueItemStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }

    /// Snapshot of all items (failed-item review screen).
    pub fn items(&self) -> SyncResult<Vec<QueueItem>> {
        Ok(self.lock_items()?.clone())
    }

    // =========================================================================
    // Manual Retry
    // =========================================================================

    /// Returns a FAILED item to PENDING, eligible immediately.
    ///
    /// Manual retry ignores the attempt cap - the cashier pressing
    /// "retry" is the override.
    pub fn retry_item(&self, item_id: &str) -> SyncResult<()> {
        {
            let mut items = self.lock_items()?;
            let item = items
                .iter_mut()
                .find(|i| i.id == item_id)
                .ok_or_else(|| SyncError::ItemNotFound(item_id.to_string()))?;
            item.status = QueueItemStatus::Pending;
            item.next_attempt_at = None;
        }
        self.persist()
    }

    /// Returns every FAILED item to PENDING.
    pub fn retry_failed(&self) -> SyncResult<usize> {
        let count;
        {
            let mut items = self.lock_items()?;
            count = items
                .iter_mut()
                .filter(|i| i.status == QueueItemStatus::Failed)
                .map(|i| {
                    i.status = QueueItemStatus::Pending;
                    i.next_attempt_at = None;
                })
                .count();
        }
        if count > 0 {
            self.persist()?;
        }
        Ok(count)
    }

    // =========================================================================
    // Drain
    // =========================================================================

    /// Runs one drain pass: send eligible items in priority order until
    /// the batch is exhausted or the queue is empty.
    ///
    /// ## Single Flight
    /// If another pass is already running, returns immediately with
    /// `skipped: true`. Callers (timer tick, reconnect edge, manual
    /// button) can all fire freely; at most one pass touches the wire.
    pub async fn drain(&self, transport: &dyn SyncTransport) -> SyncResult<DrainReport> {
        let _guard = match self.drain_guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Drain already in progress, skipping");
                return Ok(DrainReport {
                    skipped: true,
                    ..DrainReport::default()
                });
            }
        };

        let batch = self.claim_batch()?;
        if batch.is_empty() {
            return Ok(DrainReport::default());
        }

        info!(count = batch.len(), "Draining sync queue");
        let mut report = DrainReport::default();

        for item in batch {
            let outcome =
                match tokio::time::timeout(self.send_timeout, transport.send(&item)).await {
                    Ok(result) => result,
                    Err(_) => Err(SyncError::Timeout {
                        timeout_secs: self.send_timeout.as_secs(),
                    }),
                };

            match outcome {
                Ok(ack) => {
                    debug!(entity_id = %item.entity_id, kind = %item.entity_kind, "Item synced");
                    self.remove_item(&item.id)?;
                    report.sent += 1;
                    report.acks.push(ack);
                }
                Err(e) => {
                    warn!(
                        entity_id = %item.entity_id,
                        kind = %item.entity_kind,
                        error = %e,
                        retryable = e.is_retryable(),
                        "Item send failed"
                    );
                    self.mark_failed(&item.id, &e)?;
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Promotes eligible FAILED items, then claims a PENDING batch as
    /// SYNCING. Persists the claim before any network I/O.
    fn claim_batch(&self) -> SyncResult<Vec<QueueItem>> {
        let now = Utc::now();
        let batch;
        {
            let mut items = self.lock_items()?;

            // Failed items whose backoff has elapsed re-enter the pool,
            // unless they have exhausted automatic retries.
            for item in items.iter_mut() {
                if item.status == QueueItemStatus::Failed
                    && !self.retry.is_exhausted(item.attempts)
                    && item.next_attempt_at.is_some_and(|at| at <= now)
                {
                    item.status = QueueItemStatus::Pending;
                }
            }

            let mut eligible: Vec<&mut QueueItem> = items
                .iter_mut()
                .filter(|i| {
                    i.status == QueueItemStatus::Pending
                        && i.next_attempt_at.map_or(true, |at| at <= now)
                })
                .collect();
            eligible.sort_by_key(|i| (i.priority, i.created_at));

            batch = eligible
                .into_iter()
                .take(self.batch_size)
                .map(|item| {
                    item.status = QueueItemStatus::Syncing;
                    item.clone()
                })
                .collect::<Vec<_>>();
        }

        if !batch.is_empty() {
            self.persist()?;
        }
        Ok(batch)
    }

    /// Removes an acknowledged item and persists.
    fn remove_item(&self, item_id: &str) -> SyncResult<()> {
        {
            let mut items = self.lock_items()?;
            items.retain(|i| i.id != item_id);
        }
        self.persist()
    }

    /// Records a send failure: bump attempts, schedule or park.
    fn mark_failed(&self, item_id: &str, error: &SyncError) -> SyncResult<()> {
        {
            let mut items = self.lock_items()?;
            if let Some(item) = items.iter_mut().find(|i| i.id == item_id) {
                item.attempts += 1;
                item.last_error = Some(error.to_string());
                item.status = QueueItemStatus::Failed;
                item.next_attempt_at =
                    if error.is_retryable() && !self.retry.is_exhausted(item.attempts) {
                        let delay = self.retry.delay_for(item.attempts);
                        Some(Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default())
                    } else {
                        // Rejected or out of attempts: manual retry only
                        None
                    };
            }
        }
        self.persist()
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    fn lock_items(&self) -> SyncResult<std::sync::MutexGuard<'_, Vec<QueueItem>>> {
        self.items
            .lock()
            .map_err(|_| SyncError::Persistence("queue lock poisoned".into()))
    }

    /// Writes the full queue to storage.
    fn persist(&self) -> SyncResult<()> {
        let raw = {
            let items = self.lock_items()?;
            serde_json::to_string(&PersistedQueue {
                items: items.clone(),
            })?
        };
        self.store.set(QUEUE_STORAGE_KEY, &raw)
    }
}

impl std::fmt::Debug for SyncQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncQueue")
            .field("batch_size", &self.batch_size)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
