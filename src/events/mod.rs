//! Events: identity, tags and payloads.
//!
//! This module groups the event **data model** moved through the bus.
//!
//! ## Contents
//! - [`Event`], [`EventId`], [`Payload`] the unit of communication
//! - [`EventTag`] discriminator used to route events to handlers
//! - [`EventType`] binds a serde payload type to a stable tag
//!
//! See `core/mod.rs` for how events flow through the dispatch queue.

mod event;
mod tag;

pub use event::{Event, EventId, EventType, Payload};
pub use tag::EventTag;
