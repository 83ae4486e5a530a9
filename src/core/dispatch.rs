//! # Dispatch loop: the single consumer of the event queue.
//!
//! ```text
//! loop {
//!   ├─► recv() (or shutdown token)          Idle
//!   ├─► dispatch(event)                     Dispatching
//!   │     ├─ lookup handlers by tag
//!   │     ├─ [] → true (vacuous success)
//!   │     ├─ fan-out, join all → AND
//!   │     └─ resolve correlation (only for items enqueued by a waiter)
//!   └─► back to recv()
//! }
//! on shutdown:                              Draining
//!   ├─► close queue (pending reserves fail, buffered items stay)
//!   ├─► Drain: dispatch the rest │ Discard: abort their waiters
//!   ├─► join in-flight dispatches
//!   └─► abort remaining waiters             Stopped
//! ```
//!
//! With `max_in_flight == 1` the next event is dequeued only after the
//! previous one resolved. Otherwise dispatches run as tasks, bounded by a
//! semaphore when a limit is set; dequeue order is FIFO either way.

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;

use super::bus::Shared;
use super::config::ShutdownPolicy;
use super::fanout;
use super::state::BusState;
use crate::events::Event;

/// Item carried by the dispatch queue.
///
/// Only the item enqueued by `publish_and_wait` resolves the correlation for
/// its id, so a fire-and-forget event reusing that id cannot answer it.
pub(crate) struct Queued {
    pub(crate) event: Arc<Event>,
    pub(crate) waited: bool,
}

/// How dequeued events are handed to [`dispatch`].
enum Mode {
    Sequential,
    Concurrent(Option<Arc<Semaphore>>),
}

impl Mode {
    fn from_shared(shared: &Shared) -> Self {
        if shared.cfg.is_sequential() {
            Mode::Sequential
        } else {
            Mode::Concurrent(
                shared
                    .cfg
                    .in_flight_limit()
                    .map(|n| Arc::new(Semaphore::new(n))),
            )
        }
    }
}

/// Runs until shutdown, then drains and releases every waiter.
pub(crate) async fn run(shared: Arc<Shared>, mut rx: mpsc::Receiver<Queued>) {
    let mode = Mode::from_shared(&shared);
    let mut in_flight = JoinSet::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = shared.token.cancelled() => None,
            ev = rx.recv() => ev,
        };
        let Some(item) = next else { break };
        submit(&shared, &mode, &mut in_flight, item).await;
    }

    shared.state.set(BusState::Draining);
    rx.close();
    tracing::debug!(queued = rx.len(), policy = ?shared.cfg.shutdown, "dispatch loop draining");

    match shared.cfg.shutdown {
        ShutdownPolicy::Drain => {
            while let Some(item) = rx.recv().await {
                submit(&shared, &mode, &mut in_flight, item).await;
            }
        }
        ShutdownPolicy::Discard => {
            let mut discarded = 0usize;
            while let Some(item) = rx.recv().await {
                if item.waited {
                    shared.correlations.abort(item.event.id);
                }
                discarded += 1;
            }
            if discarded > 0 {
                tracing::warn!(discarded, "queued events discarded on shutdown");
            }
        }
    }
    while in_flight.join_next().await.is_some() {}

    let aborted = shared.finish();
    tracing::info!(aborted, "dispatch loop stopped");
}

/// Dispatches inline, or as a task once a concurrency permit is available.
async fn submit(
    shared: &Arc<Shared>,
    mode: &Mode,
    in_flight: &mut JoinSet<()>,
    item: Queued,
) {
    match mode {
        Mode::Sequential => dispatch(shared, item).await,
        Mode::Concurrent(limit) => {
            while in_flight.try_join_next().is_some() {}

            let permit = match limit {
                Some(sem) => Arc::clone(sem).acquire_owned().await.ok(),
                None => None,
            };
            let shared = Arc::clone(shared);
            in_flight.spawn(async move {
                let _permit = permit;
                dispatch(&shared, item).await;
            });
        }
    }
}

/// Runs every handler for `event` and resolves its correlation.
async fn dispatch(shared: &Shared, item: Queued) {
    let _active = shared.state.begin();
    let Queued { event, waited } = item;

    let handlers = shared.registry.lookup(event.tag.as_str());
    let outcome = if handlers.is_empty() {
        tracing::debug!(event_id = %event.id, tag = %event.tag, "no handlers; vacuous success");
        true
    } else {
        fanout::fan_out(&event, &handlers, shared.cfg.handler_timeout()).await
    };

    if waited {
        shared.correlations.resolve(event.id, outcome);
    }
    tracing::trace!(
        event_id = %event.id,
        tag = %event.tag,
        handlers = handlers.len(),
        outcome,
        waited,
        "event dispatched"
    );
}
