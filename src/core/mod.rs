//! Bus core: queue, dispatch loop and lifecycle.
//!
//! The public API from this module is [`EventBus`] with its [`BusConfig`],
//! [`EventBusBuilder`] and observable [`BusState`].
//!
//! Internal modules:
//! - [`bus`]: the bus handle, publish paths, start/shutdown;
//! - [`dispatch`]: the single-consumer loop and drain sequence;
//! - [`fanout`]: concurrent handler invocation with panic/timeout isolation;
//! - [`correlation`]: waiting publishers keyed by event id;
//! - [`registry`]: tag → handler snapshots;
//! - [`shutdown`]: OS termination signals.

mod builder;
mod bus;
mod config;
mod correlation;
mod dispatch;
mod fanout;
mod registry;
mod shutdown;
mod state;

pub use builder::EventBusBuilder;
pub use bus::EventBus;
pub use config::{BusConfig, ShutdownPolicy};
pub use state::BusState;
