//! # Subscriber registry - tag-indexed handler lists.
//!
//! Maps each [`EventTag`] to the handlers subscribed under it.
//!
//! ## Architecture
//! ```text
//! subscribe(tag, h) ──► write lock ──► old list + h ──► new Arc<[HandlerRef]>
//! dispatch loop     ──► read lock  ──► clone Arc snapshot ──► fan-out
//! ```
//!
//! ## Rules
//! - Lists are copy-on-write: a reader holds an immutable snapshot, never a partial list
//! - Subscribing appends; the same handler may appear more than once
//! - There is no removal

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::SubscribeError;
use crate::events::EventTag;
use crate::handlers::HandlerRef;

/// Snapshot of the handlers registered for one tag.
pub(crate) type HandlerList = Arc<[HandlerRef]>;

/// Concurrent tag → handlers map.
pub(crate) struct Registry {
    routes: RwLock<HashMap<EventTag, HandlerList>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
        }
    }

    /// Appends `handler` to the list of `tag`.
    pub(crate) fn insert(&self, tag: EventTag, handler: HandlerRef) -> Result<(), SubscribeError> {
        if tag.is_empty() {
            return Err(SubscribeError::EmptyTag);
        }

        let mut routes = self.routes.write().unwrap_or_else(|e| e.into_inner());
        let list: Vec<HandlerRef> = match routes.get(&tag) {
            Some(current) => current.iter().cloned().chain(Some(handler)).collect(),
            None => vec![handler],
        };
        routes.insert(tag, list.into());
        Ok(())
    }

    /// Returns the current snapshot for `tag` (empty if nobody subscribed).
    pub(crate) fn lookup(&self, tag: &str) -> HandlerList {
        self.routes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(tag)
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    /// Number of handlers registered for `tag`.
    pub(crate) fn count(&self, tag: &str) -> usize {
        self.routes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(tag)
            .map_or(0, |list| list.len())
    }

    /// Returns sorted list of tags with at least one handler.
    pub(crate) fn tags(&self) -> Vec<EventTag> {
        let routes = self.routes.read().unwrap_or_else(|e| e.into_inner());
        let mut tags: Vec<EventTag> = routes.keys().cloned().collect();
        tags.sort_unstable();
        tags
    }
}
