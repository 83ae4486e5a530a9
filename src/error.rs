//! Error types used by the eventvisor bus, its producers and its handlers.
//!
//! This module defines the error enums surfaced at each boundary:
//!
//! - [`PublishError`] — returned to producers (queue closed, full, aborted wait).
//! - [`HandlerError`] — produced by handlers; never reaches producers, always
//!   converted into a `false` contribution and logged.
//! - [`EventError`] — payload encoding/decoding failures.
//! - [`SubscribeError`] — invalid subscriptions.
//! - [`BusError`] — lifecycle failures (start twice, grace exceeded).
//!
//! The enums provide `as_label` for logging/metrics, in the same spirit across types.

use std::time::Duration;

use thiserror::Error;

use crate::events::EventId;

/// # Errors returned to producers by the publish operations.
///
/// Only queue-level and shutdown-level failures propagate here; handler
/// faults are contained inside the dispatch loop.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The dispatch queue is closed (bus shutting down or stopped).
    #[error("dispatch queue closed")]
    Closed,

    /// The dispatch queue is at capacity (only from `try_publish`).
    #[error("dispatch queue full")]
    Full,

    /// The event carries an empty type tag.
    #[error("event tag must not be empty")]
    EmptyTag,

    /// Another waiting publish with the same event id is still in flight.
    #[error("event {id} is already awaiting a result")]
    DuplicateId {
        /// The conflicting event id.
        id: EventId,
    },

    /// The bus shut down before the event's outcome was known.
    #[error("event {id} aborted by shutdown")]
    Aborted {
        /// The id of the event whose wait was aborted.
        id: EventId,
    },
}

impl PublishError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use eventvisor::PublishError;
    ///
    /// assert_eq!(PublishError::Closed.as_label(), "publish_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            PublishError::Closed => "publish_closed",
            PublishError::Full => "publish_full",
            PublishError::EmptyTag => "publish_empty_tag",
            PublishError::DuplicateId { .. } => "publish_duplicate_id",
            PublishError::Aborted { .. } => "publish_aborted",
        }
    }

    /// Indicates whether the failure came from the bus shutting down.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, PublishError::Closed | PublishError::Aborted { .. })
    }
}

/// # Errors raised by a single handler invocation.
///
/// Each variant turns into a `false` contribution for that handler only.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The handler reported a failure.
    #[error("handler failed: {error}")]
    Failed {
        /// The underlying error message.
        error: String,
    },

    /// The handler panicked; the panic was caught at the dispatch boundary.
    #[error("handler panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },

    /// The handler did not finish within the configured handler timeout.
    #[error("handler timed out after {timeout:?}")]
    TimedOut {
        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// The event payload did not match the shape the handler expects.
    #[error(transparent)]
    Payload(#[from] EventError),
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Failed`].
    pub fn fail(error: impl Into<String>) -> Self {
        HandlerError::Failed {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use eventvisor::HandlerError;
    ///
    /// assert_eq!(HandlerError::fail("boom").as_label(), "handler_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Failed { .. } => "handler_failed",
            HandlerError::Panicked { .. } => "handler_panicked",
            HandlerError::TimedOut { .. } => "handler_timeout",
            HandlerError::Payload(_) => "handler_payload",
        }
    }
}

/// # Errors converting between typed payloads and [`Event`](crate::Event)s.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum EventError {
    /// The value could not be serialized.
    #[error("payload encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The value serialized to something other than a JSON object.
    #[error("payload must encode to an object")]
    NotAnObject,

    /// The payload does not decode into the requested type.
    #[error("payload of '{tag}' does not match expected shape: {source}")]
    Decode {
        /// Tag of the event being decoded.
        tag: String,
        /// Underlying decoding error.
        #[source]
        source: serde_json::Error,
    },
}

/// # Errors returned by subscription calls.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeError {
    /// Handlers cannot be registered under an empty tag.
    #[error("subscription tag must not be empty")]
    EmptyTag,
}

/// # Errors produced by the bus lifecycle.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// `start` was called on a bus whose dispatch loop is already running.
    #[error("dispatch loop already started")]
    AlreadyStarted,

    /// `start` was called after shutdown.
    #[error("bus is stopped")]
    Stopped,

    /// Draining did not finish within the grace period; the loop was aborted.
    #[error("shutdown grace {grace:?} exceeded; aborted {pending} pending waits")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Number of waiting publishers that were aborted.
        pending: usize,
    },

    /// Termination signal handlers could not be installed.
    #[error("signal registration failed: {error}")]
    Signal {
        /// The underlying I/O error message.
        error: String,
    },
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::AlreadyStarted => "bus_already_started",
            BusError::Stopped => "bus_stopped",
            BusError::GraceExceeded { .. } => "bus_grace_exceeded",
            BusError::Signal { .. } => "bus_signal",
        }
    }
}
