//! Daemon state machine and graceful shutdown coordination.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

/// Lifecycle state of the daemon.
///
/// State machine: Starting -> Listening -> Draining -> Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonState {
    /// Routing table built, listener not yet bound.
    Starting,
    /// Accepting and serving requests.
    Listening,
    /// No new connections; in-flight requests finish.
    Draining,
    /// Listener closed and all replies sent. Terminal.
    Stopped,
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::Listening => "listening",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Coordinates state transitions and tracks in-flight requests.
///
/// 1. `set_listening()` once the listener is bound
/// 2. `begin_draining()` from `/stop`, a signal, or a serving error
/// 3. `draining()` resolves for the server's graceful-shutdown hook
/// 4. `drain_deadline()` bounds the wait for in-flight requests
/// 5. `set_stopped()` after the listener and lanes are closed
#[derive(Debug, Clone)]
pub struct ShutdownController {
    state: Arc<watch::Sender<DaemonState>>,
    in_flight: Arc<AtomicUsize>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(DaemonState::Starting);
        Self {
            state: Arc::new(tx),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn state(&self) -> DaemonState {
        *self.state.borrow()
    }

    pub fn set_listening(&self) -> bool {
        self.advance(DaemonState::Listening)
    }

    /// Move to `Draining`. Returns false if already draining or stopped.
    pub fn begin_draining(&self, reason: &str) -> bool {
        let moved = self.advance(DaemonState::Draining);
        if moved {
            tracing::info!(reason = %reason, in_flight = self.in_flight_count(), "Draining");
        }
        moved
    }

    pub fn set_stopped(&self) -> bool {
        self.advance(DaemonState::Stopped)
    }

    /// Resolves once the daemon is draining or stopped.
    pub async fn draining(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so this only errors if it is gone.
        let _ = rx.wait_for(|state| *state >= DaemonState::Draining).await;
    }

    /// Track a request until the guard is dropped.
    pub fn in_flight_guard(&self) -> InFlightGuard {
        let count = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::gauge!("format_daemon_in_flight_requests").set(count as f64);
        InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Resolves `timeout` after draining begins.
    ///
    /// The server stops waiting for open connections at this point.
    pub async fn drain_deadline(&self, timeout: Duration) {
        self.draining().await;
        tokio::time::sleep(timeout).await;
    }

    /// Only forward transitions are applied; `Stopped` is terminal.
    fn advance(&self, next: DaemonState) -> bool {
        let mut from = next;
        let moved = self.state.send_if_modified(|current| {
            if *current >= next {
                return false;
            }
            from = *current;
            *current = next;
            true
        });
        if moved {
            tracing::debug!(from = %from, to = %next, "Daemon state changed");
        }
        moved
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight counter when dropped, including on unwind.
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let count = self.in_flight.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        metrics::gauge!("format_daemon_in_flight_requests").set(count as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_only_move_forward() {
        let controller = ShutdownController::new();
        assert_eq!(controller.state(), DaemonState::Starting);

        assert!(controller.set_listening());
        assert!(controller.begin_draining("test"));
        assert!(!controller.begin_draining("again"));
        assert!(!controller.set_listening());
        assert_eq!(controller.state(), DaemonState::Draining);

        assert!(controller.set_stopped());
        assert!(!controller.set_listening());
        assert!(!controller.begin_draining("after stop"));
        assert_eq!(controller.state(), DaemonState::Stopped);
    }

    #[test]
    fn draining_may_skip_listening() {
        let controller = ShutdownController::new();
        assert!(controller.begin_draining("bind failed"));
        assert_eq!(controller.state(), DaemonState::Draining);
    }

    #[test]
    fn in_flight_guard_increments_and_decrements() {
        let controller = ShutdownController::new();
        let a = controller.in_flight_guard();
        let b = controller.in_flight_guard();
        assert_eq!(controller.in_flight_count(), 2);
        drop(a);
        assert_eq!(controller.in_flight_count(), 1);
        drop(b);
        assert_eq!(controller.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn draining_future_resolves_on_transition() {
        let controller = ShutdownController::new();
        controller.set_listening();

        let waiter = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.draining().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        controller.begin_draining("test");
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn drain_deadline_starts_counting_at_draining() {
        let controller = ShutdownController::new();
        controller.set_listening();

        let deadline = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.drain_deadline(Duration::from_millis(50)).await })
        };
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!deadline.is_finished());

        controller.begin_draining("test");
        tokio::time::timeout(Duration::from_secs(1), deadline).await.unwrap().unwrap();
    }
}
