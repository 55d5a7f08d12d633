//! Shutdown coordination for the gateway.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Process-wide lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    /// Accepting and dispatching connections.
    Running,
    /// Shutdown requested: the accept loop halts, adapters are released.
    Draining,
    /// Listener and adapters have released their resources.
    Stopped,
}

/// Coordinator for graceful shutdown.
///
/// Holds the lifecycle state in a watch channel so every long-running task
/// can observe transitions. Cloning shares the same state.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<ShutdownState>>,
}

impl Shutdown {
    /// Create a new coordinator in the `Running` state.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ShutdownState::Running);
        Self { tx: Arc::new(tx) }
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ShutdownState> {
        self.tx.subscribe()
    }

    /// Current state.
    pub fn state(&self) -> ShutdownState {
        *self.tx.borrow()
    }

    /// Request shutdown. Only `Running` moves to `Draining`; repeated
    /// triggers are ignored. Returns whether this call made the transition.
    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == ShutdownState::Running {
                *state = ShutdownState::Draining;
                true
            } else {
                false
            }
        })
    }

    /// Record that every resource has been released.
    pub fn mark_stopped(&self) {
        self.tx.send_if_modified(|state| {
            if *state == ShutdownState::Draining {
                *state = ShutdownState::Stopped;
                true
            } else {
                false
            }
        });
    }

    /// Resolve once shutdown has been requested.
    pub async fn draining(&self) {
        wait_for(self.subscribe(), |s| *s != ShutdownState::Running).await;
    }

    /// Resolve once the gateway has fully stopped.
    pub async fn stopped(&self) {
        wait_for(self.subscribe(), |s| *s == ShutdownState::Stopped).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

async fn wait_for<F>(mut rx: watch::Receiver<ShutdownState>, done: F)
where
    F: FnMut(&ShutdownState) -> bool,
{
    // The sender lives in `Shutdown`, which the caller holds.
    let _ = rx.wait_for(done).await;
}

/// Run `fut` for at most `limit`, logging when the deadline passes.
pub async fn with_deadline<F>(limit: Duration, what: &'static str, fut: F) -> bool
where
    F: std::future::Future<Output = ()>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(()) => true,
        Err(_) => {
            tracing::warn!(timeout = ?limit, task = what, "Shutdown deadline reached");
            false
        }
    }
}
