//! Transport connectivity state.
//!
//! Transitions are driven exclusively by the transport adapter's events;
//! the rest of the engine only reads. Readers sample the current status
//! synchronously; no engine operation blocks waiting for a transition.
//! Callers observe and re-invoke.

use tokio::sync::watch;
use tracing::info;
use vouch_core::ConnectionStatus;

/// Single-writer, many-reader connectivity monitor.
#[derive(Debug)]
pub struct ConnectionMonitor {
    tx: watch::Sender<ConnectionStatus>,
}

impl ConnectionMonitor {
    /// Create a monitor in the initial `Disconnected` state.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ConnectionStatus::Disconnected);
        Self { tx }
    }

    /// Apply a connectivity transition reported by the transport.
    pub fn set(&self, status: ConnectionStatus) {
        let previous = *self.tx.borrow();
        if previous != status {
            info!(from = %previous, to = %status, "transport connectivity changed");
        }
        // send_replace delivers even when no reader is subscribed
        self.tx.send_replace(status);
    }

    /// Current status, sampled synchronously.
    pub fn current(&self) -> ConnectionStatus {
        *self.tx.borrow()
    }

    /// Subscribe for change notifications (presentation layer use).
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.tx.subscribe()
    }
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        let monitor = ConnectionMonitor::new();
        assert_eq!(monitor.current(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn readers_observe_transitions() {
        let monitor = ConnectionMonitor::new();
        let rx = monitor.subscribe();

        monitor.set(ConnectionStatus::Connecting);
        monitor.set(ConnectionStatus::Connected);
        assert_eq!(monitor.current(), ConnectionStatus::Connected);
        assert_eq!(*rx.borrow(), ConnectionStatus::Connected);

        // Transport failure drops back to a retry state.
        monitor.set(ConnectionStatus::Connecting);
        assert_eq!(monitor.current(), ConnectionStatus::Connecting);
    }
}
