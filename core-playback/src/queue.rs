//! # Request Queue
//!
//! One pending slot per [`RequestCategory`]. A request waits in its slot until
//! the engine event that satisfies it arrives; the state manager then serves
//! the slot, attaching the request to that event.
//!
//! Enqueueing into an occupied slot replaces the occupant. The superseded
//! request is dropped without notification and only shows up in the debug log
//! and in [`QueueStats::superseded`].

use std::collections::HashMap;
use std::sync::Arc;

use core_runtime::events::{RequestCategory, RequestEvent};
use tracing::{debug, trace};

/// Counters over the lifetime of a queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: u64,
    pub served: u64,
    pub deleted: u64,
    pub superseded: u64,
}

/// Pending request slots, keyed by category.
#[derive(Debug, Default)]
pub struct RequestQueue {
    slots: HashMap<RequestCategory, Arc<RequestEvent>>,
    stats: QueueStats,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `request` in `category`'s slot, returning the request it
    /// replaced.
    pub fn enqueue(
        &mut self,
        category: RequestCategory,
        request: Arc<RequestEvent>,
    ) -> Option<Arc<RequestEvent>> {
        self.stats.enqueued += 1;
        let request_id = request.id;
        let previous = self.slots.insert(category, request);

        if let Some(previous) = &previous {
            self.stats.superseded += 1;
            debug!(
                category = %category,
                superseded = %previous.id,
                request_id = %request_id,
                "Pending request superseded"
            );
        } else {
            trace!(category = %category, request_id = %request_id, "Request enqueued");
        }

        previous
    }

    /// Removes the pending request of `category` and hands it to `callback`.
    ///
    /// Does nothing (and never calls `callback`) when the slot is empty.
    pub fn serve<R>(
        &mut self,
        category: RequestCategory,
        callback: impl FnOnce(Arc<RequestEvent>) -> R,
    ) -> Option<R> {
        let request = self.slots.remove(&category)?;
        self.stats.served += 1;
        trace!(category = %category, request_id = %request.id, "Request served");
        Some(callback(request))
    }

    /// Removes the pending request of `category` without serving it.
    pub fn delete(&mut self, category: RequestCategory) -> Option<Arc<RequestEvent>> {
        let removed = self.slots.remove(&category);
        if let Some(request) = &removed {
            self.stats.deleted += 1;
            debug!(category = %category, request_id = %request.id, "Pending request deleted");
        }
        removed
    }

    /// Deletes `category`'s slot only while it still holds `request`.
    pub fn withdraw(
        &mut self,
        category: RequestCategory,
        request: &RequestEvent,
    ) -> Option<Arc<RequestEvent>> {
        if self.peek(category)?.id != request.id {
            trace!(category = %category, request_id = %request.id, "Request no longer pending");
            return None;
        }
        self.delete(category)
    }

    /// Clears every slot.
    pub fn reset(&mut self) {
        if !self.slots.is_empty() {
            debug!(pending = self.slots.len(), "Request queue reset");
        }
        self.slots.clear();
    }

    pub fn has(&self, category: RequestCategory) -> bool {
        self.slots.contains_key(&category)
    }

    pub fn peek(&self, category: RequestCategory) -> Option<&Arc<RequestEvent>> {
        self.slots.get(&category)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn stats(&self) -> QueueStats {
        self.stats
    }
}
