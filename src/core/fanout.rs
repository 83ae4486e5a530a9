//! # Concurrent fan-out of one event to its handlers.
//!
//! ## Architecture
//! ```text
//! fan_out(event, handlers)
//!     │
//!     ├──► spawn ──► invoke(h1) ──► Ok(bool) | Err → logged, false
//!     ├──► spawn ──► invoke(h2) ──► panic caught → logged, false
//!     └──► spawn ──► invoke(hN) ──► timeout → logged, false
//!                         │
//!                         ▼
//!                 join all ──► AND of outcomes
//! ```
//!
//! ## Rules
//! - **All start together**: every handler is spawned before any is awaited
//! - **Wait for all**: no short-circuit on the first `false`
//! - **Isolation**: a failing/panicking handler affects only its own contribution
//!
//! ## Panic handling
//! Invocations use `catch_unwind`. **Warning**: `AssertUnwindSafe` is used, which
//! can leave shared state inconsistent if a handler panics while holding a lock.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinSet;

use crate::error::HandlerError;
use crate::events::Event;
use crate::handlers::HandlerRef;

/// Runs every handler concurrently and returns the logical AND of their outcomes.
///
/// An empty handler list is a vacuous success.
pub(crate) async fn fan_out(
    event: &Arc<Event>,
    handlers: &[HandlerRef],
    timeout: Option<Duration>,
) -> bool {
    let mut set = JoinSet::new();
    for handler in handlers {
        let handler = Arc::clone(handler);
        let event = Arc::clone(event);
        set.spawn(async move {
            let result = invoke(&handler, Arc::clone(&event), timeout).await;
            report(&event, handler.name(), result)
        });
    }

    let mut all = true;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(ok) => all &= ok,
            Err(join_err) => {
                tracing::error!(
                    event_id = %event.id,
                    tag = %event.tag,
                    error = %join_err,
                    "handler task did not complete"
                );
                all = false;
            }
        }
    }
    all
}

/// Invokes one handler inside the panic boundary and optional timeout.
pub(crate) async fn invoke(
    handler: &HandlerRef,
    event: Arc<Event>,
    timeout: Option<Duration>,
) -> Result<bool, HandlerError> {
    let guarded = AssertUnwindSafe(handler.handle(event)).catch_unwind();

    let caught = match timeout {
        Some(limit) => tokio::time::timeout(limit, guarded)
            .await
            .map_err(|_| HandlerError::TimedOut { timeout: limit })?,
        None => guarded.await,
    };

    caught.unwrap_or_else(|panic_err| {
        Err(HandlerError::Panicked {
            info: panic_info(&*panic_err),
        })
    })
}

/// Logs a failed invocation and maps it to its contribution.
fn report(event: &Event, handler: &str, result: Result<bool, HandlerError>) -> bool {
    match result {
        Ok(true) => true,
        Ok(false) => {
            tracing::debug!(event_id = %event.id, tag = %event.tag, handler, "handler returned false");
            false
        }
        Err(err) => {
            tracing::error!(
                event_id = %event.id,
                tag = %event.tag,
                handler,
                kind = err.as_label(),
                error = %err,
                "handler failed"
            );
            false
        }
    }
}

fn panic_info(any: &(dyn Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
