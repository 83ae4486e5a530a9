//! # Event type tags.
//!
//! [`EventTag`] is the discriminator matching events to handlers. It is a
//! cheap-to-clone shared string; equality and hashing are by content, and it
//! borrows as `&str` so registries can be queried without allocating.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Stable identifier of an event type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventTag(Arc<str>);

impl EventTag {
    /// Creates a tag from any string-like value.
    pub fn new(tag: impl Into<Arc<str>>) -> Self {
        Self(tag.into())
    }

    /// Returns the tag as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the empty tag, which no handler may subscribe to.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for EventTag {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventTag {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for EventTag {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<Arc<str>> for EventTag {
    fn from(s: Arc<str>) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for EventTag {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for EventTag {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}
