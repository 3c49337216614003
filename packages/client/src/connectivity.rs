// ABOUTME: Backend reachability probe with a tri-state health signal
// ABOUTME: Only the most recently started probe may publish its result

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::watch;
use tracing::debug;

use crate::backend::Backend;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ConnectivityState {
    Unknown,
    Reachable,
    Unreachable { detail: String },
}

impl ConnectivityState {
    pub fn is_reachable(&self) -> bool {
        matches!(self, ConnectivityState::Reachable)
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            ConnectivityState::Unreachable { detail } => Some(detail),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConnectivityState::Unknown => "unknown",
            ConnectivityState::Reachable => "reachable",
            ConnectivityState::Unreachable { .. } => "unreachable",
        }
    }
}

/// Result of a single probe
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub state: ConnectivityState,
    /// Sequence number of this probe
    pub generation: u64,
    /// False when a newer probe started before this one finished; such a
    /// result must not be trusted and was not published.
    pub is_latest: bool,
    pub checked_at: DateTime<Utc>,
    pub response_time_ms: u64,
}

pub struct ConnectivityMonitor {
    generation: AtomicU64,
    state: watch::Sender<ConnectivityState>,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityMonitor {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ConnectivityState::Unknown);
        Self {
            generation: AtomicU64::new(0),
            state,
        }
    }

    /// Last published state
    pub fn current(&self) -> ConnectivityState {
        self.state.borrow().clone()
    }

    /// Receive every published state change
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.state.subscribe()
    }

    /// Back to `Unknown`, discarding any probe still in flight
    pub fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.state.send_replace(ConnectivityState::Unknown);
    }

    /// Probe the backend once. A newer probe supersedes this one: both run to
    /// completion, but only the latest publishes its state.
    pub async fn probe(&self, backend: &dyn Backend) -> ProbeReport {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Instant::now();

        let state = match backend.health().await {
            Ok(_) => ConnectivityState::Reachable,
            Err(e) => ConnectivityState::Unreachable { detail: e.detail() },
        };
        let response_time_ms = started.elapsed().as_millis() as u64;

        let is_latest = self.generation.load(Ordering::SeqCst) == generation;
        if is_latest {
            self.state.send_replace(state.clone());
        } else {
            debug!("Discarding superseded probe #{}", generation);
        }
        debug!(
            "Probe #{} finished in {}ms: {}",
            generation,
            response_time_ms,
            state.label()
        );

        ProbeReport {
            state,
            generation,
            is_latest,
            checked_at: Utc::now(),
            response_time_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBackend;
    use std::time::Duration;

    #[tokio::test]
    async fn test_starts_unknown() {
        let monitor = ConnectivityMonitor::new();
        assert_eq!(monitor.current(), ConnectivityState::Unknown);
    }

    #[tokio::test]
    async fn test_probe_reachable() {
        let monitor = ConnectivityMonitor::new();
        let report = monitor.probe(&MockBackend::new()).await;
        assert!(report.is_latest);
        assert_eq!(report.state, ConnectivityState::Reachable);
        assert_eq!(monitor.current(), ConnectivityState::Reachable);
    }

    #[tokio::test]
    async fn test_probe_unreachable_has_detail() {
        let monitor = ConnectivityMonitor::new();
        let report = monitor.probe(&MockBackend::new().failing_health()).await;
        let detail = report.state.detail().unwrap();
        assert!(!detail.is_empty());
        assert_eq!(monitor.current().label(), "unreachable");
    }

    #[tokio::test]
    async fn test_newer_probe_supersedes_older() {
        let monitor = ConnectivityMonitor::new();
        let slow_failing = MockBackend::new()
            .failing_health()
            .with_health_delay(Duration::from_millis(100));
        let fast_ok = MockBackend::new();

        let (old, new) = tokio::join!(monitor.probe(&slow_failing), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            monitor.probe(&fast_ok).await
        });

        assert!(!old.is_latest);
        assert!(new.is_latest);
        assert!(new.generation > old.generation);
        // The slow failure finished last but must not overwrite the newer result
        assert_eq!(monitor.current(), ConnectivityState::Reachable);
    }

    #[tokio::test]
    async fn test_reset_invalidates_in_flight_probe() {
        let monitor = ConnectivityMonitor::new();
        let slow = MockBackend::new().with_health_delay(Duration::from_millis(50));

        let (report, _) = tokio::join!(monitor.probe(&slow), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            monitor.reset();
        });

        assert!(!report.is_latest);
        assert_eq!(monitor.current(), ConnectivityState::Unknown);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let monitor = ConnectivityMonitor::new();
        let mut receiver = monitor.subscribe();

        monitor.probe(&MockBackend::new()).await;
        assert!(receiver.has_changed().unwrap());
        assert!(receiver.borrow_and_update().is_reachable());
    }
}
