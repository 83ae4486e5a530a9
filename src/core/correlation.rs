//! # Correlation table: waiting publishers keyed by event id.
//!
//! ```text
//! publish_and_wait ──► register(id) ──► enqueue ──► Waiter::outcome().await
//!                                                          ▲
//! dispatch loop ──► resolve(id, aggregate) ────────────────┘
//! shutdown      ──► abort_all() ───────────────────────────┘ (Aborted)
//! ```
//!
//! ## Rules
//! - Each id is inserted once by its publisher and removed once, by the loop or by shutdown
//! - A second registration of an id still in the table is rejected
//! - A dropped sender (loop gone) resolves the waiter as aborted, never hangs

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::error::PublishError;
use crate::events::EventId;

/// Final state delivered to a waiting publisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    /// All handlers finished; aggregate outcome.
    Completed(bool),
    /// The bus shut down before the event was dispatched.
    Aborted,
}

/// Pending completion signals.
pub(crate) struct Correlations {
    pending: Mutex<HashMap<EventId, oneshot::Sender<Resolution>>>,
}

impl Correlations {
    pub(crate) fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Inserts a pending entry for `id` and returns the waiting side.
    pub(crate) fn register(&self, id: EventId) -> Result<Waiter, PublishError> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if pending.contains_key(&id) {
            return Err(PublishError::DuplicateId { id });
        }
        let (tx, rx) = oneshot::channel();
        pending.insert(id, tx);
        Ok(Waiter { id, rx })
    }

    /// Removes `id` and delivers the aggregate outcome.
    ///
    /// Returns `false` if nobody was waiting (fire-and-forget publish).
    pub(crate) fn resolve(&self, id: EventId, outcome: bool) -> bool {
        self.finish(id, Resolution::Completed(outcome))
    }

    /// Removes `id` and delivers [`Resolution::Aborted`].
    pub(crate) fn abort(&self, id: EventId) -> bool {
        self.finish(id, Resolution::Aborted)
    }

    /// Aborts every outstanding entry; returns how many were pending.
    pub(crate) fn abort_all(&self) -> usize {
        let drained: Vec<oneshot::Sender<Resolution>> = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.drain().map(|(_, tx)| tx).collect()
        };
        let n = drained.len();
        for tx in drained {
            let _ = tx.send(Resolution::Aborted);
        }
        n
    }

    /// Number of outstanding waits.
    pub(crate) fn len(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn finish(&self, id: EventId, resolution: Resolution) -> bool {
        let tx = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
        match tx {
            Some(tx) => {
                // receiver may be gone if the publisher stopped waiting
                let _ = tx.send(resolution);
                true
            }
            None => false,
        }
    }
}

/// Waiting side of a registered correlation.
#[derive(Debug)]
pub(crate) struct Waiter {
    id: EventId,
    rx: oneshot::Receiver<Resolution>,
}

impl Waiter {
    /// Suspends until the event is resolved.
    pub(crate) async fn outcome(self) -> Result<bool, PublishError> {
        match self.rx.await {
            Ok(Resolution::Completed(ok)) => Ok(ok),
            Ok(Resolution::Aborted) | Err(_) => Err(PublishError::Aborted { id: self.id }),
        }
    }
}
