//! # Event handler trait.
//!
//! Provides [`Handler`], the extension point for reacting to published events.
//!
//! Each invocation gets:
//! - **Its own task**: all handlers of one event start together and run concurrently
//! - **Panic isolation**: a panic is caught and counted as a `false` outcome
//! - **Optional timeout**: see `BusConfig::handler_timeout`
//!
//! ## Architecture
//! ```text
//! dispatch loop ──► fan-out ──► spawn(handler.handle(event)) ──► Ok(bool)
//!                                   └─► Err / panic / timeout ──► logged, counts as false
//! ```
//!
//! ## Rules
//! - `Ok(true)` means success, `Ok(false)` a business-level "no".
//! - `Err(_)` is logged at error level and contributes `false`.
//! - Handlers of the same event observe no relative order.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use eventvisor::{Event, Handler, HandlerError};
//!
//! struct Audit;
//!
//! #[async_trait]
//! impl Handler for Audit {
//!     async fn handle(&self, event: Arc<Event>) -> Result<bool, HandlerError> {
//!         Ok(event.field("user").is_some())
//!     }
//!
//!     fn name(&self) -> &str { "audit" }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::events::Event;

/// Shared handle to a registered handler.
pub type HandlerRef = Arc<dyn Handler>;

/// Asynchronous event handler reporting a boolean outcome.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Return errors instead of panicking; panics are contained but noisy.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Processes one event and reports whether it succeeded.
    async fn handle(&self, event: Arc<Event>) -> Result<bool, HandlerError>;

    /// Returns the handler name used in logs.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose - override it when possible.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
