//! # Bus configuration.
//!
//! Provides [`BusConfig`] centralized settings for an [`EventBus`](crate::EventBus).
//!
//! ## Sentinel values
//! - `max_in_flight = 0` → unlimited concurrent dispatches (no semaphore created)
//! - `handler_timeout = 0s` → no per-handler timeout
//! - `queue_capacity = 0` → clamped to 1

use std::time::Duration;

/// What happens to events still queued when shutdown begins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShutdownPolicy {
    /// Dispatch everything already queued, then stop.
    #[default]
    Drain,
    /// Drop queued events; their waiting publishers are aborted.
    Discard,
}

/// Configuration for the event bus.
///
/// ## Field semantics
/// - `queue_capacity`: dispatch queue size; producers block when it is full (min 1)
/// - `max_in_flight`: events dispatched at once (`1` = strictly one after another, `0` = unlimited)
/// - `handler_timeout`: per-handler time limit (`0s` = none)
/// - `grace`: maximum wait for draining on shutdown
/// - `shutdown`: drain or discard queued events on shutdown
///
/// ## Notes
/// All fields are public. Prefer the helper accessors to avoid sprinkling
/// sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct BusConfig {
    /// Capacity of the bounded dispatch queue.
    ///
    /// `publish` suspends while the queue holds this many events (backpressure).
    pub queue_capacity: usize,

    /// Maximum number of events dispatched concurrently.
    ///
    /// - `1` = the next event is dequeued only after the previous one resolved;
    ///   a handler that never completes stalls the bus unless `handler_timeout` is set
    /// - `n > 1` = up to `n` events in flight, dequeue order is still FIFO
    /// - `0` = unlimited
    pub max_in_flight: usize,

    /// Time limit for a single handler invocation.
    ///
    /// - `Duration::ZERO` = no limit
    /// - `> 0` = an expired handler contributes `false`
    pub handler_timeout: Duration,

    /// Maximum time `shutdown` waits for draining before aborting the loop.
    pub grace: Duration,

    /// Fate of queued events when shutdown begins.
    pub shutdown: ShutdownPolicy,
}

impl BusConfig {
    /// Returns the queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn queue_capacity_clamped(&self) -> usize {
        self.queue_capacity.max(1)
    }

    /// Returns the concurrent dispatch limit as an `Option`.
    ///
    /// - `None` → unlimited
    /// - `Some(n)` → at most `n` events in flight
    #[inline]
    pub fn in_flight_limit(&self) -> Option<usize> {
        if self.max_in_flight == 0 {
            None
        } else {
            Some(self.max_in_flight)
        }
    }

    /// Returns `true` when dispatch is serialized with dequeue.
    #[inline]
    pub fn is_sequential(&self) -> bool {
        self.max_in_flight == 1
    }

    /// Returns the per-handler timeout as an `Option`.
    #[inline]
    pub fn handler_timeout(&self) -> Option<Duration> {
        if self.handler_timeout == Duration::ZERO {
            None
        } else {
            Some(self.handler_timeout)
        }
    }
}

impl Default for BusConfig {
    /// Default configuration:
    ///
    /// - `queue_capacity = 1024`
    /// - `max_in_flight = 1` (sequential dispatch)
    /// - `handler_timeout = 0s` (no timeout)
    /// - `grace = 30s`
    /// - `shutdown = ShutdownPolicy::Drain`
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            max_in_flight: 1,
            handler_timeout: Duration::ZERO,
            grace: Duration::from_secs(30),
            shutdown: ShutdownPolicy::Drain,
        }
    }
}
