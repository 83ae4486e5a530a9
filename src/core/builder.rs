use crate::{
    core::{BusConfig, EventBus},
    error::SubscribeError,
    events::EventTag,
    handlers::HandlerRef,
};

/// Builder for constructing an [`EventBus`] with its handlers registered up front.
pub struct EventBusBuilder {
    cfg: BusConfig,
    handlers: Vec<(EventTag, HandlerRef)>,
}

impl EventBusBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: BusConfig) -> Self {
        Self {
            cfg,
            handlers: Vec::new(),
        }
    }

    /// Adds a handler for `tag`.
    pub fn with_handler(mut self, tag: impl Into<EventTag>, handler: HandlerRef) -> Self {
        self.handlers.push((tag.into(), handler));
        self
    }

    /// Adds several handlers, registered in iteration order.
    pub fn with_handlers<I, T>(mut self, handlers: I) -> Self
    where
        I: IntoIterator<Item = (T, HandlerRef)>,
        T: Into<EventTag>,
    {
        self.handlers
            .extend(handlers.into_iter().map(|(tag, h)| (tag.into(), h)));
        self
    }

    /// Builds the bus and registers every handler.
    ///
    /// The bus is not started; call [`EventBus::start`] once the runtime is up.
    pub fn build(self) -> Result<EventBus, SubscribeError> {
        let bus = EventBus::new(self.cfg);
        for (tag, handler) in self.handlers {
            bus.subscribe(tag, handler)?;
        }
        Ok(bus)
    }
}
