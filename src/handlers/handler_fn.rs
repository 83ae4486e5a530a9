//! # Function-backed handlers
//!
//! [`HandlerFn`] wraps a closure `F: Fn(Arc<Event>) -> Fut`, producing a fresh
//! future per event. [`TypedHandler`] does the same for closures taking a
//! decoded [`EventType`] value: the payload is narrowed first, and a mismatch
//! fails that handler with [`HandlerError::Payload`].
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use eventvisor::{Event, HandlerError, HandlerFn, HandlerRef};
//!
//! let h: HandlerRef = HandlerFn::arc("counter", |ev: Arc<Event>| async move {
//!     Ok::<_, HandlerError>(ev.field("n").is_some())
//! });
//! assert_eq!(h.name(), "counter");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use super::handler::Handler;
use crate::error::HandlerError;
use crate::events::{Event, EventType};

/// Closure-backed handler.
#[derive(Debug)]
pub struct HandlerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> HandlerFn<F> {
    /// Creates a new function-backed handler.
    ///
    /// Prefer [`HandlerFn::arc`] when you immediately need a [`HandlerRef`](super::HandlerRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the handler and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool, HandlerError>> + Send + 'static,
{
    async fn handle(&self, event: Arc<Event>) -> Result<bool, HandlerError> {
        (self.f)(event).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Closure-backed handler receiving a decoded payload of type `T`.
pub struct TypedHandler<T, F> {
    name: Cow<'static, str>,
    f: F,
    _payload: PhantomData<fn() -> T>,
}

impl<T, F> TypedHandler<T, F> {
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            _payload: PhantomData,
        }
    }

    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<T, F, Fut> Handler for TypedHandler<T, F>
where
    T: EventType,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool, HandlerError>> + Send + 'static,
{
    async fn handle(&self, event: Arc<Event>) -> Result<bool, HandlerError> {
        let value = event.decode::<T>()?;
        (self.f)(value).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::error::EventError;

    #[derive(Serialize, Deserialize)]
    struct Ping {
        n: u32,
    }

    impl EventType for Ping {
        const TAG: &'static str = "ping";
    }

    #[tokio::test]
    async fn closure_receives_event() {
        let h = HandlerFn::new("even", |ev: Arc<Event>| async move {
            Ok::<_, HandlerError>(ev.field("n").and_then(|v| v.as_u64()) == Some(2))
        });
        let ev = Arc::new(Event::new("ping").with_field("n", 2));
        assert!(h.handle(ev).await.unwrap());
        assert_eq!(h.name(), "even");
    }

    #[tokio::test]
    async fn typed_handler_decodes_payload() {
        let h = TypedHandler::new("ping", |p: Ping| async move {
            Ok::<_, HandlerError>(p.n > 1)
        });
        let ev = Arc::new(Event::typed(&Ping { n: 3 }).unwrap());
        assert!(h.handle(ev).await.unwrap());
    }

    #[tokio::test]
    async fn typed_handler_rejects_foreign_shape() {
        let h = TypedHandler::new("ping", |_: Ping| async move {
            Ok::<_, HandlerError>(true)
        });
        let ev = Arc::new(Event::new("ping").with_field("n", "not-a-number"));
        let err = h.handle(ev).await.unwrap_err();
        assert!(matches!(err, HandlerError::Payload(EventError::Decode { .. })));
    }
}
