//! # cedar-sync: Offline Sync Engine for Cedar POS
//!
//! Durable queueing and background synchronization for records created
//! while the register is offline.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cedar POS Sync Layer                             │
//! │                                                                         │
//! │  cedar-core (pure logic)                                               │
//! │       │ Sale / Session / CashMovement                                  │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     cedar-sync (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │  Terminal ──► SyncQueue ──► dyn SyncTransport ──► backend API  │   │
//! │  │                  ▲   │                                          │   │
//! │  │                  │   └──► dyn KeyValueStore (durable JSON)     │   │
//! │  │              SyncAgent ◄── ConnectivityWatcher                 │   │
//! │  │              (drain loop: reconnect edge, timer, manual)       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  GUARANTEE: a sale that checks out is durable before any network I/O   │
//! │  is attempted, and a failed sync is parked, never dropped.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`queue`] - Durable, priority-ordered outbox with per-item backoff
//! - [`agent`] - Background drain loop and its control handle
//! - [`terminal`] - Register glue: cart + session + queue + hardware
//! - [`transport`] - Injected send seam to the backend
//! - [`connectivity`] - Online/offline watch channel
//! - [`storage`] - Key-value persistence seam (file or memory)
//! - [`config`] - TOML + environment configuration, retry policy
//! - [`error`] - Sync error types with retryability classification

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod queue;
pub mod storage;
pub mod terminal;
pub mod transport;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use agent::{NoOpEmitter, SyncAgent, SyncAgentHandle, SyncEventEmitter};
pub use config::{RetryPolicy, SyncConfig, SyncSettings, TerminalConfig};
pub use connectivity::{connectivity_channel, ConnectivityHandle, ConnectivityWatcher};
pub use error::{SyncError, SyncResult};
pub use queue::{
    DrainReport, EntityKind, QueueAction, QueueItem, QueueItemStatus, QueueStats, SyncQueue,
};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore};
pub use terminal::{BarcodeLink, NoOpHardware, ReceiptHardware, Terminal};
pub use transport::{SendAck, SyncTransport};
