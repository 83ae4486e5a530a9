//! # Events published through the bus.
//!
//! An [`Event`] is one unit of broadcastable work:
//! - `id`: process-unique [`EventId`] (UUID v4), used to correlate waiting publishers
//! - `tag`: the [`EventTag`] that selects handlers
//! - `payload`: a JSON object of named values
//! - `at`: wall-clock creation time (for logs)
//!
//! Payloads can be built field by field, or from a typed value implementing
//! [`EventType`]. Handlers narrow an event back to a typed value with
//! [`Event::decode`]; a mismatch fails only that handler.
//!
//! ## Example
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use eventvisor::{Event, EventType};
//!
//! #[derive(Serialize, Deserialize, Debug, PartialEq)]
//! struct OrderCreated { order_id: u64 }
//!
//! impl EventType for OrderCreated {
//!     const TAG: &'static str = "order.created";
//! }
//!
//! let ev = Event::typed(&OrderCreated { order_id: 7 }).unwrap();
//! assert_eq!(ev.tag, "order.created");
//! assert_eq!(ev.decode::<OrderCreated>().unwrap(), OrderCreated { order_id: 7 });
//!
//! let raw = Event::new("audit").with_field("user", "ada");
//! assert_eq!(raw.field("user").and_then(|v| v.as_str()), Some("ada"));
//! ```

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use uuid::Uuid;

use super::tag::EventTag;
use crate::error::EventError;

/// Named payload values carried by an event.
pub type Payload = serde_json::Map<String, Value>;

/// Process-unique event identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The nil id; replaced by a fresh one at publish time.
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    #[inline]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for EventId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A payload type bound to a stable tag.
///
/// Implementors serialize to a JSON object; the bus routes them by [`EventType::TAG`].
pub trait EventType: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Tag under which events of this type are published and subscribed.
    const TAG: &'static str;
}

/// Event broadcast to every handler registered for its tag.
#[derive(Clone, Debug)]
pub struct Event {
    /// Unique id among events in flight.
    pub id: EventId,
    /// Discriminator used to select handlers.
    pub tag: EventTag,
    /// Named values; insertion order irrelevant.
    pub payload: Payload,
    /// Wall-clock timestamp.
    pub at: SystemTime,
}

impl Event {
    /// Creates an empty event with a fresh id and current timestamp.
    pub fn new(tag: impl Into<EventTag>) -> Self {
        Self {
            id: EventId::new(),
            tag: tag.into(),
            payload: Payload::new(),
            at: SystemTime::now(),
        }
    }

    /// Encodes a typed value as the payload of a new event tagged `T::TAG`.
    pub fn typed<T: EventType>(value: &T) -> Result<Self, EventError> {
        match serde_json::to_value(value).map_err(EventError::Encode)? {
            Value::Object(payload) => Ok(Self::new(T::TAG).with_payload(payload)),
            _ => Err(EventError::NotAnObject),
        }
    }

    /// Overrides the generated id.
    #[inline]
    pub fn with_id(mut self, id: EventId) -> Self {
        self.id = id;
        self
    }

    /// Replaces the whole payload.
    #[inline]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Sets one named payload value.
    #[inline]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Returns a payload value by name.
    #[inline]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Returns `true` if this event carries the tag of `T`.
    #[inline]
    pub fn is<T: EventType>(&self) -> bool {
        self.tag == T::TAG
    }

    /// Narrows the payload into `T`.
    ///
    /// Fails with [`EventError::Decode`] if the payload does not have the expected shape.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, EventError> {
        serde_json::from_value(Value::Object(self.payload.clone())).map_err(|source| {
            EventError::Decode {
                tag: self.tag.to_string(),
                source,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Shipped {
        parcel: String,
        weight: u32,
    }

    impl EventType for Shipped {
        const TAG: &'static str = "parcel.shipped";
    }

    #[derive(Serialize, Deserialize)]
    struct Bare(u32);

    impl EventType for Bare {
        const TAG: &'static str = "bare";
    }

    #[test]
    fn ids_are_unique_and_never_nil() {
        let a = EventId::new();
        let b = EventId::new();
        assert_ne!(a, b);
        assert!(!a.is_nil());
        assert!(EventId::nil().is_nil());
    }

    #[test]
    fn typed_event_carries_tag_and_decodes_back() {
        let ev = Event::typed(&Shipped {
            parcel: "p-1".into(),
            weight: 12,
        })
        .unwrap();

        assert!(ev.is::<Shipped>());
        assert_eq!(ev.field("weight"), Some(&Value::from(12)));
        assert_eq!(
            ev.decode::<Shipped>().unwrap(),
            Shipped {
                parcel: "p-1".into(),
                weight: 12
            }
        );
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(matches!(Event::typed(&Bare(1)), Err(EventError::NotAnObject)));
    }

    #[test]
    fn mismatched_payload_fails_decode() {
        let ev = Event::new("parcel.shipped").with_field("parcel", 5);
        match ev.decode::<Shipped>() {
            Err(EventError::Decode { tag, .. }) => assert_eq!(tag, "parcel.shipped"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
