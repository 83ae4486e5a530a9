//! # Event handlers.
//!
//! This module provides the [`Handler`] trait and closure-backed
//! implementations registered on the [`EventBus`](crate::EventBus).
//!
//! ## Contents
//! - [`Handler`] async trait returning a boolean outcome
//! - [`HandlerRef`] shared handle (`Arc<dyn Handler>`)
//! - [`HandlerFn`] closure over `Arc<Event>`
//! - [`TypedHandler`] closure over a decoded [`EventType`](crate::EventType)

mod handler;
mod handler_fn;

pub use handler::{Handler, HandlerRef};
pub use handler_fn::{HandlerFn, TypedHandler};
