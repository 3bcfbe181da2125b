//! Per-submission session: status channel and cancellation.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use vshorts_models::StatusSnapshot;

/// Handle for one submission.
///
/// The presentation layer subscribes to status snapshots and may cancel the
/// submission at any time. Sessions share nothing with each other.
#[derive(Debug, Clone)]
pub struct Session {
    status: Arc<watch::Sender<StatusSnapshot>>,
    cancel: CancellationToken,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let (status, _) = watch::channel(StatusSnapshot::idle());
        Self {
            status: Arc::new(status),
            cancel: CancellationToken::new(),
        }
    }

    /// Receive status snapshots as they change.
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.subscribe()
    }

    /// Latest published snapshot.
    pub fn status(&self) -> StatusSnapshot {
        self.status.borrow().clone()
    }

    /// Publish a snapshot. Works with or without subscribers.
    pub fn report(&self, snapshot: StatusSnapshot) {
        self.status.send_replace(snapshot);
    }

    /// A reporter that can be moved into `'static` callbacks.
    pub fn reporter(&self) -> impl Fn(StatusSnapshot) + Send + Sync + 'static {
        let status = Arc::clone(&self.status);
        move |snapshot| {
            status.send_replace(snapshot);
        }
    }

    /// Abandon the submission.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}
