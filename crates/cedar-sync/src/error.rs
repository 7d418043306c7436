//! # Sync Error Types
//!
//! Error types for the sync engine.
//!
//! ## Retryability
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Error Classification                              │
//! │                                                                         │
//! │  RETRYABLE (transient - backoff and try again)                         │
//! │  ──────────────────────────────────────────────                        │
//! │  • SendFailed   - network error, server unreachable                    │
//! │  • Timeout      - request exceeded the send deadline                   │
//! │                                                                         │
//! │  NON-RETRYABLE (permanent - park the item for manual review)           │
//! │  ────────────────────────────────────────────────────────              │
//! │  • Rejected     - server understood and refused (validation, auth)     │
//! │  • Serialization- payload cannot round-trip, retrying won't help      │
//! │                                                                         │
//! │  A failed queue item is NEVER auto-purged: an unsynced sale is money   │
//! │  the books don't know about yet.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use cedar_core::CoreError;

// =============================================================================
// Sync Error
// =============================================================================

/// Errors from the sync engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network-level send failure (unreachable, connection reset).
    /// Retryable.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The send exceeded its deadline. Retryable.
    #[error("Send timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The server received the item and refused it. NOT retryable -
    /// resending the same payload would be refused again.
    #[error("Server rejected item: {reason}")]
    Rejected { reason: String },

    /// Underlying key-value store failure.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Queue payload serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration value.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Config file could not be read or parsed.
    #[error("Failed to load config: {0}")]
    ConfigLoad(String),

    /// Config file could not be written.
    #[error("Failed to save config: {0}")]
    ConfigSave(String),

    /// An item for the same entity and action is already queued.
    #[error("Duplicate queue entry for {entity_kind} {entity_id}")]
    DuplicateEntry {
        entity_kind: String,
        entity_id: String,
    },

    /// Queue item not found (manual retry of an unknown id).
    #[error("Queue item not found: {0}")]
    ItemNotFound(String),

    /// A control channel to a background task has closed.
    #[error("Sync channel closed: {0}")]
    ChannelClosed(String),

    /// Receipt printer or cash drawer failure. Never fails a sale; the
    /// terminal logs it and moves on.
    #[error("Hardware error: {0}")]
    Hardware(String),

    /// Domain error bubbled up from cedar-core.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl SyncError {
    /// Checks if this error is worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::SendFailed(_) | SyncError::Timeout { .. })
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Persistence(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoad(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSave(err.to_string())
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with SyncError.
pub type SyncResult<T> = Result<T, SyncError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability() {
        assert!(SyncError::SendFailed("connection refused".into()).is_retryable());
        assert!(SyncError::Timeout { timeout_secs: 10 }.is_retryable());

        assert!(!SyncError::Rejected {
            reason: "unknown product".into()
        }
        .is_retryable());
        assert!(!SyncError::Persistence("disk full".into()).is_retryable());
        assert!(!SyncError::ItemNotFound("q-1".into()).is_retryable());
    }

    #[test]
    fn test_core_error_conversion() {
        let err: SyncError = CoreError::CartEmpty.into();
        assert_eq!(err.to_string(), "Cart is empty");
    }
}
