//! # eventvisor
//!
//! **Eventvisor** is an in-process, asynchronous publish/subscribe event bus for tokio.
//!
//! Producers publish tagged events into a bounded queue; a single dispatch loop
//! fans each event out to every handler registered for its tag, isolates
//! handler failures from one another, and lets a producer optionally wait for
//! the aggregated outcome.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  Producer #1 │   │  Producer #2 │   │  Producer #3 │
//!     │  publish()   │   │ publish_and_ │   │ try_publish()│
//!     │              │   │   wait()     │   │              │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │                  │ register(id)     │
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │          Dispatch queue (bounded mpsc, BusConfig::queue_capacity) │
//! │          full → publish suspends (backpressure)                   │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │     dispatch loop      │
//!                       │  lookup(tag) in        │
//!                       │  Registry              │
//!                       └───┬────────┬───────┬───┘
//!                           ▼        ▼       ▼
//!                        spawn    spawn    spawn        (fan-out)
//!                        h1()     h2()     hN()
//!                           └────────┼───────┘
//!                                    ▼
//!                         join all → AND of outcomes
//!                         (errors/panics/timeouts = false)
//!                                    ▼
//!                     Correlations.resolve(id, outcome) ──► waiting producer
//! ```
//!
//! ### Lifecycle
//! ```text
//! EventBus::new(cfg) ──► subscribe(..) ──► start() ──► publish(..) ... ──► shutdown()
//!
//! shutdown():
//!   ├─► new publishes fail with PublishError::Closed
//!   ├─► queued events drained (ShutdownPolicy::Drain) or discarded (Discard)
//!   ├─► every remaining waiter resolved with PublishError::Aborted
//!   └─► loop aborted if draining exceeds BusConfig::grace → BusError::GraceExceeded
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                        |
//! |-------------------|--------------------------------------------------------------|-------------------------------------------|
//! | **Bus**           | Bounded queue, dispatch loop, correlation, lifecycle.        | [`EventBus`], [`BusState`]                |
//! | **Events**        | Tagged events with JSON payloads and typed narrowing.        | [`Event`], [`EventTag`], [`EventType`]    |
//! | **Handlers**      | Async handlers, closure and typed-closure wrappers.          | [`Handler`], [`HandlerFn`], [`TypedHandler`] |
//! | **Errors**        | Typed errors for producers, handlers and lifecycle.          | [`PublishError`], [`HandlerError`], [`BusError`] |
//! | **Configuration** | Queue size, dispatch concurrency, timeouts, shutdown policy. | [`BusConfig`], [`ShutdownPolicy`]         |
//!
//! Handler failures are reported through [`tracing`] at `ERROR` level with
//! `event_id`, `tag`, `handler` and `error` fields.
//!
//! ## Example
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use eventvisor::{BusConfig, Event, EventBus, EventType, HandlerError};
//!
//! #[derive(Serialize, Deserialize)]
//! struct OrderCreated { order_id: u64, total_cents: u64 }
//!
//! impl EventType for OrderCreated {
//!     const TAG: &'static str = "order.created";
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus = EventBus::new(BusConfig::default());
//!
//!     bus.subscribe_typed("reserve-stock", |o: OrderCreated| async move {
//!         Ok::<_, HandlerError>(o.order_id > 0)
//!     })?;
//!     bus.subscribe_typed("charge", |o: OrderCreated| async move {
//!         Ok::<_, HandlerError>(o.total_cents < 100_000)
//!     })?;
//!     bus.start()?;
//!
//!     let ev = Event::typed(&OrderCreated { order_id: 1, total_cents: 4_200 })?;
//!     assert!(bus.publish_and_wait(ev).await?);
//!
//!     bus.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod handlers;

// ---- Public re-exports ----

pub use crate::core::{BusConfig, BusState, EventBus, EventBusBuilder, ShutdownPolicy};
pub use error::{BusError, EventError, HandlerError, PublishError, SubscribeError};
pub use events::{Event, EventId, EventTag, EventType, Payload};
pub use handlers::{Handler, HandlerFn, HandlerRef, TypedHandler};
