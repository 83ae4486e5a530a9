//! # EventBus: bounded dispatch queue, handler registry and result correlation.
//!
//! The [`EventBus`] owns the registry of handlers, the bounded dispatch queue,
//! the correlation table of waiting publishers and the dispatch loop task.
//! It is an explicit, cheaply cloneable handle: pass it to producers and
//! subscribers at startup instead of reaching for a global.
//!
//! ## Key responsibilities
//! - register handlers per [`EventTag`] (safe while the loop runs)
//! - accept events with backpressure when the queue is full
//! - correlate waiting publishers with the aggregated outcome of their event
//! - start the dispatch loop once; drain and release every waiter on shutdown
//!
//! ## High-level architecture
//! ```text
//! Producers:
//!   publish(ev)           ──► reserve slot (blocks when full) ──► enqueue
//!   publish_and_wait(ev)  ──► reserve slot ──► register(id) ──► enqueue ──► await outcome
//!
//! Dispatch loop (one task, spawned by start()):
//!   recv() ──► registry.lookup(tag)
//!                 ├─ []        ──► vacuous success (true)
//!                 └─ [h1..hN]  ──► fan-out, join all ──► AND
//!              ──► correlations.resolve(id, outcome)
//!
//! Shutdown path:
//!   shutdown()
//!     └─► token.cancel()           → new publishes fail with Closed
//!     └─► loop: close queue, drain or discard queued events (ShutdownPolicy)
//!     └─► abort every remaining waiter
//!     └─► wait up to cfg.grace, else abort the loop → BusError::GraceExceeded
//! ```
//!
//! Dropping the last [`EventBus`] handle cancels the bus the same way, so a
//! started loop drains in the background and exits.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use eventvisor::{BusConfig, Event, EventBus, HandlerError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus = EventBus::new(BusConfig::default());
//!     bus.subscribe_fn("greet", "hello", |ev: Arc<Event>| async move {
//!         Ok::<_, HandlerError>(ev.field("name").is_some())
//!     })?;
//!     bus.start()?;
//!
//!     let ok = bus
//!         .publish_and_wait(Event::new("greet").with_field("name", "ada"))
//!         .await?;
//!     assert!(ok);
//!
//!     bus.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::builder::EventBusBuilder;
use super::config::BusConfig;
use super::correlation::Correlations;
use super::dispatch::{self, Queued};
use super::registry::Registry;
use super::shutdown;
use super::state::{BusState, StateCell};
use crate::error::{BusError, HandlerError, PublishError, SubscribeError};
use crate::events::{Event, EventId, EventTag, EventType};
use crate::handlers::{HandlerFn, HandlerRef, TypedHandler};

/// State shared between bus handles and the dispatch loop.
pub(crate) struct Shared {
    pub(crate) cfg: BusConfig,
    pub(crate) registry: Registry,
    pub(crate) correlations: Correlations,
    pub(crate) state: StateCell,
    pub(crate) token: CancellationToken,
    tx: mpsc::Sender<Queued>,
    /// Queue consumer; taken once by whoever spawns the loop.
    rx: Mutex<Option<mpsc::Receiver<Queued>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    /// Flips to `true` once the bus is stopped and every waiter released.
    done: watch::Sender<bool>,
}

impl Shared {
    /// Marks the bus stopped, aborts every waiter and wakes shutdown callers.
    ///
    /// Returns how many waiters were aborted.
    pub(crate) fn finish(&self) -> usize {
        self.state.set(BusState::Stopped);
        let aborted = self.correlations.abort_all();
        self.done.send_replace(true);
        aborted
    }
}

/// Held only by user-facing handles; the last one to drop cancels the bus.
struct Owner {
    token: CancellationToken,
}

impl Drop for Owner {
    fn drop(&mut self) {
        if !self.token.is_cancelled() {
            tracing::debug!("last event bus handle dropped; shutting down");
            self.token.cancel();
        }
    }
}

/// In-process publish/subscribe bus.
///
/// ### Properties
/// - **Bounded**: producers suspend while the queue is full.
/// - **FIFO dequeue**: events are taken off the queue in enqueue order.
/// - **Isolated handlers**: errors, panics and timeouts count as `false`, never propagate.
/// - **Cloneable**: every clone refers to the same bus.
#[derive(Clone)]
pub struct EventBus {
    shared: Arc<Shared>,
    _owner: Arc<Owner>,
}

impl EventBus {
    /// Creates a bus with an empty registry. Call [`start`](Self::start) to begin dispatching.
    ///
    /// Events published before `start` are queued and processed once the loop runs.
    pub fn new(cfg: BusConfig) -> Self {
        let (tx, rx) = mpsc::channel(cfg.queue_capacity_clamped());
        let token = CancellationToken::new();
        Self {
            shared: Arc::new(Shared {
                cfg,
                registry: Registry::new(),
                correlations: Correlations::new(),
                state: StateCell::new(),
                token: token.clone(),
                tx,
                rx: Mutex::new(Some(rx)),
                handle: Mutex::new(None),
                done: watch::channel(false).0,
            }),
            _owner: Arc::new(Owner { token }),
        }
    }

    /// Returns a builder that registers handlers before the bus is shared.
    pub fn builder(cfg: BusConfig) -> EventBusBuilder {
        EventBusBuilder::new(cfg)
    }

    /// Returns the configuration the bus was built with.
    pub fn config(&self) -> &BusConfig {
        &self.shared.cfg
    }

    /// Spawns the dispatch loop on the current tokio runtime.
    ///
    /// ### Errors
    /// - [`BusError::AlreadyStarted`] if the loop was already spawned
    /// - [`BusError::Stopped`] if the bus was shut down
    pub fn start(&self) -> Result<(), BusError> {
        if self.shared.token.is_cancelled() {
            return Err(BusError::Stopped);
        }
        if self.spawn_loop() {
            tracing::debug!(
                capacity = self.shared.cfg.queue_capacity_clamped(),
                max_in_flight = self.shared.cfg.max_in_flight,
                "event bus started"
            );
            Ok(())
        } else {
            Err(BusError::AlreadyStarted)
        }
    }

    /// Registers `handler` for events tagged `tag`.
    ///
    /// Repeated calls append; nothing is de-duplicated. Safe while the loop runs.
    pub fn subscribe(
        &self,
        tag: impl Into<EventTag>,
        handler: HandlerRef,
    ) -> Result<(), SubscribeError> {
        let tag = tag.into();
        tracing::debug!(tag = %tag, handler = handler.name(), "handler subscribed");
        self.shared.registry.insert(tag, handler)
    }

    /// Registers a closure as a handler for `tag`.
    pub fn subscribe_fn<F, Fut>(
        &self,
        tag: impl Into<EventTag>,
        name: impl Into<Cow<'static, str>>,
        f: F,
    ) -> Result<(), SubscribeError>
    where
        F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, HandlerError>> + Send + 'static,
    {
        self.subscribe(tag, HandlerFn::arc(name, f))
    }

    /// Registers a closure receiving decoded `T` payloads under `T::TAG`.
    ///
    /// Events whose payload does not decode into `T` fail this handler only.
    pub fn subscribe_typed<T, F, Fut>(
        &self,
        name: impl Into<Cow<'static, str>>,
        f: F,
    ) -> Result<(), SubscribeError>
    where
        T: EventType,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, HandlerError>> + Send + 'static,
    {
        self.subscribe(T::TAG, TypedHandler::<T, F>::arc(name, f))
    }

    /// Enqueues `event` without waiting for its handlers.
    ///
    /// Suspends while the queue is full. Success means "accepted for processing",
    /// not a business outcome.
    ///
    /// ### Errors
    /// - [`PublishError::Closed`] if the bus is shutting down
    /// - [`PublishError::EmptyTag`] for an untagged event
    pub async fn publish(&self, event: Event) -> Result<EventId, PublishError> {
        let event = prepare(event)?;
        let id = event.id;
        let permit = self.reserve().await?;
        permit.send(Queued {
            event: Arc::new(event),
            waited: false,
        });
        Ok(id)
    }

    /// Enqueues `event` and waits for the aggregated outcome of its handlers.
    ///
    /// Returns the logical AND of all handler outcomes, or `true` when no
    /// handler is registered for the tag.
    ///
    /// ### Errors
    /// - [`PublishError::Closed`] if the bus is shutting down before the enqueue
    /// - [`PublishError::Aborted`] if shutdown happened before the event resolved
    /// - [`PublishError::DuplicateId`] if an event with the same id is still awaited
    ///
    /// Only this call's own queue item resolves the wait; a fire-and-forget
    /// event carrying the same id is dispatched without touching it.
    /// - [`PublishError::EmptyTag`] for an untagged event
    pub async fn publish_and_wait(&self, event: Event) -> Result<bool, PublishError> {
        let event = prepare(event)?;
        let id = event.id;
        let permit = self.reserve().await?;

        // Registered before the send, with no await in between.
        let waiter = self.shared.correlations.register(id)?;
        permit.send(Queued {
            event: Arc::new(event),
            waited: true,
        });

        // The loop may have finished its final sweep before we registered.
        if self.shared.state.get() == BusState::Stopped {
            self.shared.correlations.abort(id);
        }
        waiter.outcome().await
    }

    /// Enqueues `event` only if there is room right now.
    ///
    /// ### Errors
    /// - [`PublishError::Full`] if the queue is at capacity
    /// - [`PublishError::Closed`] if the bus is shutting down
    pub fn try_publish(&self, event: Event) -> Result<EventId, PublishError> {
        let event = prepare(event)?;
        let id = event.id;
        if self.shared.token.is_cancelled() {
            return Err(PublishError::Closed);
        }
        self.shared
            .tx
            .try_send(Queued {
                event: Arc::new(event),
                waited: false,
            })
            .map(|()| id)
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => PublishError::Full,
                mpsc::error::TrySendError::Closed(_) => PublishError::Closed,
            })
    }

    /// Stops accepting events, drains the queue and releases every waiter.
    ///
    /// Waits up to [`BusConfig::grace`] for the loop to finish. Calling it on
    /// a bus that was never started still processes (or discards) what is
    /// queued, per [`BusConfig::shutdown`]. Concurrent and later calls wait
    /// until the bus is stopped and return `Ok(())`; only the call that drives
    /// the loop reports [`BusError::GraceExceeded`].
    ///
    /// ### Errors
    /// [`BusError::GraceExceeded`] if draining did not finish in time; the
    /// loop is aborted and outstanding waiters receive [`PublishError::Aborted`].
    pub async fn shutdown(&self) -> Result<(), BusError> {
        let shared = &self.shared;
        shared.token.cancel();

        // A bus that never started still has to drain its queue.
        self.spawn_loop();
        let handle = shared
            .handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(handle) = handle else {
            let mut done = shared.done.subscribe();
            let _ = done.wait_for(|stopped| *stopped).await;
            return Ok(());
        };

        let grace = shared.cfg.grace;
        let abort = handle.abort_handle();
        match tokio::time::timeout(grace, handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(join_err)) => {
                tracing::error!(error = %join_err, "dispatch loop terminated abnormally");
                self.stop_now();
                Ok(())
            }
            Err(_) => {
                abort.abort();
                let pending = self.stop_now();
                tracing::warn!(?grace, pending, "shutdown grace exceeded; dispatch loop aborted");
                Err(BusError::GraceExceeded { grace, pending })
            }
        }
    }

    /// Waits for a termination signal (SIGINT/SIGTERM/SIGQUIT, or Ctrl-C) and shuts down.
    pub async fn run_until_signal(&self) -> Result<(), BusError> {
        if let Err(e) = shutdown::wait_for_shutdown_signal().await {
            return Err(BusError::Signal {
                error: e.to_string(),
            });
        }
        tracing::info!("termination signal received; shutting down event bus");
        self.shutdown().await
    }

    /// Current state of the dispatch loop.
    pub fn state(&self) -> BusState {
        self.shared.state.get()
    }

    /// Returns `true` once shutdown has begun.
    pub fn is_closed(&self) -> bool {
        self.shared.token.is_cancelled()
    }

    /// Number of publishers currently waiting for an outcome.
    pub fn pending(&self) -> usize {
        self.shared.correlations.len()
    }

    /// Number of occupied queue slots.
    ///
    /// Counts slots reserved by publishers that have not sent yet, so it can
    /// briefly exceed the number of events the loop could receive.
    pub fn queued(&self) -> usize {
        self.shared.tx.max_capacity() - self.shared.tx.capacity()
    }

    /// Number of handlers registered for `tag`.
    pub fn handler_count(&self, tag: &str) -> usize {
        self.shared.registry.count(tag)
    }

    /// Sorted list of tags with at least one handler.
    pub fn tags(&self) -> Vec<EventTag> {
        self.shared.registry.tags()
    }

    /// Waits for a queue slot, or fails once shutdown begins.
    async fn reserve(&self) -> Result<mpsc::Permit<'_, Queued>, PublishError> {
        let shared = &self.shared;
        if shared.token.is_cancelled() {
            return Err(PublishError::Closed);
        }
        tokio::select! {
            biased;
            _ = shared.token.cancelled() => Err(PublishError::Closed),
            permit = shared.tx.reserve() => permit.map_err(|_| PublishError::Closed),
        }
    }

    /// Spawns the loop if the queue consumer is still available.
    fn spawn_loop(&self) -> bool {
        let mut handle = self
            .shared
            .handle
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let rx = self
            .shared
            .rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        match rx {
            Some(rx) => {
                *handle = Some(tokio::spawn(dispatch::run(Arc::clone(&self.shared), rx)));
                true
            }
            None => false,
        }
    }

    /// Marks the bus stopped and aborts every waiter; returns how many were aborted.
    fn stop_now(&self) -> usize {
        self.shared.finish()
    }
}

/// Validates the tag and assigns an id when none was set.
fn prepare(mut event: Event) -> Result<Event, PublishError> {
    if event.tag.is_empty() {
        return Err(PublishError::EmptyTag);
    }
    if event.id.is_nil() {
        event.id = EventId::new();
    }
    Ok(event)
}
