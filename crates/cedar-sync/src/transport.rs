//! # Sync Transport
//!
//! Injected seam between the queue and the actual wire.
//!
//! ## Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Transport Contract                                │
//! │                                                                         │
//! │  SyncQueue ──► dyn SyncTransport::send(item) ──► backend API           │
//! │                                                                         │
//! │  Ok(SendAck)                 item confirmed, remove from queue         │
//! │  Err(retryable)              schedule retry with backoff               │
//! │  Err(non-retryable)          park as FAILED for manual review          │
//! │                                                                         │
//! │  Idempotency: the payload carries the entity's local_id; the server    │
//! │  dedupes on it, so resending after an ambiguous timeout is safe.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SyncResult;
use crate::queue::QueueItem;

// =============================================================================
// Send Acknowledgement
// =============================================================================

/// Server acknowledgement for one delivered queue item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendAck {
    /// The entity's client-side local id, echoed back.
    pub entity_id: String,

    /// Server-assigned id for the entity, when the server created one.
    pub server_id: Option<String>,
}

// =============================================================================
// Transport Trait
// =============================================================================

/// Delivers one queue item to the backend.
///
/// Implemented by the host app (HTTP client, gRPC, test double). The queue
/// calls `send` one item at a time in priority order and interprets the
/// error's [`is_retryable`](crate::error::SyncError::is_retryable) flag.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Sends a single queue item, returning the server acknowledgement.
    async fn send(&self, item: &QueueItem) -> SyncResult<SendAck>;
}
