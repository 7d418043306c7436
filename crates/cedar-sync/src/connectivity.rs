//! # Connectivity Watcher
//!
//! Online/offline state shared between the host app and the sync agent.
//!
//! ## Signal Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Connectivity Signal Flow                           │
//! │                                                                         │
//! │  Host app probes                ConnectivityHandle::set_online(bool)   │
//! │  (HTTP ping, NetworkManager,          │                                 │
//! │   browser online event, ...)          ▼                                 │
//! │                              tokio::sync::watch<bool>                  │
//! │                                       │                                 │
//! │                                       ▼                                 │
//! │  SyncAgent select loop    ConnectivityWatcher::changed().await         │
//! │                                                                         │
//! │  The agent reacts ONLY to the offline→online edge: that is the         │
//! │  moment queued work becomes sendable. online→online repeats are        │
//! │  deduped by the watch channel itself.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tokio::sync::watch;

// =============================================================================
// Channel Pair
// =============================================================================

/// Writer half: the host app reports probe results here.
#[derive(Debug, Clone)]
pub struct ConnectivityHandle {
    tx: watch::Sender<bool>,
}

impl ConnectivityHandle {
    /// Reports the current connectivity state.
    ///
    /// Repeated reports of the same state are absorbed by the watch
    /// channel; subscribers only wake on actual transitions.
    pub fn set_online(&self, online: bool) {
        self.tx.send_if_modified(|current| {
            if *current != online {
                *current = online;
                true
            } else {
                false
            }
        });
    }

    /// Current state as last reported.
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Creates another watcher subscribed to this handle.
    pub fn watcher(&self) -> ConnectivityWatcher {
        ConnectivityWatcher {
            rx: self.tx.subscribe(),
        }
    }
}

/// Reader half: the sync agent waits on transitions here.
#[derive(Debug, Clone)]
pub struct ConnectivityWatcher {
    rx: watch::Receiver<bool>,
}

impl ConnectivityWatcher {
    /// Current state without waiting.
    pub fn is_online(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits for the next state change and returns the new state.
    ///
    /// Returns `None` if the handle side has been dropped.
    pub async fn changed(&mut self) -> Option<bool> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}

/// Creates a connectivity channel pair with the given initial state.
pub fn connectivity_channel(initially_online: bool) -> (ConnectivityHandle, ConnectivityWatcher) {
    let (tx, rx) = watch::channel(initially_online);
    (ConnectivityHandle { tx }, ConnectivityWatcher { rx })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transition_wakes_watcher() {
        let (handle, mut watcher) = connectivity_channel(false);
        assert!(!watcher.is_online());

        handle.set_online(true);
        assert_eq!(watcher.changed().await, Some(true));
        assert!(handle.is_online());
    }

    #[tokio::test]
    async fn test_same_state_reports_are_absorbed() {
        let (handle, mut watcher) = connectivity_channel(true);

        // Reporting online while already online produces no wakeup
        handle.set_online(true);
        handle.set_online(true);
        handle.set_online(false);

        // Only the real transition is observed
        assert_eq!(watcher.changed().await, Some(false));
    }

    #[tokio::test]
    async fn test_watcher_sees_handle_drop() {
        let (handle, mut watcher) = connectivity_channel(true);
        drop(handle);
        assert_eq!(watcher.changed().await, None);
    }
}
