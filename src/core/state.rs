//! Observable dispatch-loop state.
//!
//! The cell stores the lifecycle phase and the number of events in dispatch;
//! `Dispatching` is derived from the counter when read, so concurrent
//! dispatches never race on a shared flag.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// Dispatch loop state.
///
/// ```text
/// Idle ⇄ Dispatching ──► Draining ──► Stopped
///   └──────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusState {
    /// Waiting on the queue (also the state before `start`).
    Idle,
    /// Processing at least one event.
    Dispatching,
    /// Shutdown in progress; queue closed to new writes.
    Draining,
    /// Terminal.
    Stopped,
}

impl BusState {
    const fn as_u8(self) -> u8 {
        match self {
            BusState::Idle => 0,
            BusState::Dispatching => 1,
            BusState::Draining => 2,
            BusState::Stopped => 3,
        }
    }

    const fn from_u8(v: u8) -> Self {
        match v {
            0 => BusState::Idle,
            1 => BusState::Dispatching,
            2 => BusState::Draining,
            _ => BusState::Stopped,
        }
    }
}

/// Lifecycle phase plus in-flight dispatch count.
pub(crate) struct StateCell {
    phase: AtomicU8,
    active: AtomicUsize,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self {
            phase: AtomicU8::new(BusState::Idle.as_u8()),
            active: AtomicUsize::new(0),
        }
    }

    /// Current state; an idle phase with events in dispatch reads as `Dispatching`.
    pub(crate) fn get(&self) -> BusState {
        match BusState::from_u8(self.phase.load(Ordering::Acquire)) {
            BusState::Idle if self.active.load(Ordering::Acquire) > 0 => BusState::Dispatching,
            phase => phase,
        }
    }

    /// Sets the lifecycle phase unless the cell is already `Stopped`.
    pub(crate) fn set(&self, next: BusState) {
        let _ = self
            .phase
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                (cur != BusState::Stopped.as_u8()).then_some(next.as_u8())
            });
    }

    /// Marks one event as being dispatched until the guard drops.
    pub(crate) fn begin(&self) -> Active<'_> {
        self.active.fetch_add(1, Ordering::AcqRel);
        Active(&self.active)
    }
}

/// Decrements the in-flight count on drop.
pub(crate) struct Active<'a>(&'a AtomicUsize);

impl Drop for Active<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
