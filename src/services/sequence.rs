//! Monotonic request sequencing
//!
//! Preview requests can complete out of order. Each request takes a ticket
//! before it starts; when the response arrives it is applied only if no newer
//! ticket has been issued in the meantime.

use crate::tracing_config::events;
use std::sync::atomic::{AtomicU64, Ordering};

/// Position of a request in issue order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Issues tickets and answers whether a ticket is still the latest
#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: AtomicU64,
}

impl RequestSequencer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next ticket; every earlier ticket becomes stale
    pub fn issue(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    #[must_use]
    pub fn is_latest(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::Acquire) == ticket.0
    }

    /// Make every outstanding ticket stale without starting a request
    pub fn invalidate(&self) {
        self.latest.fetch_add(1, Ordering::AcqRel);
    }

    /// Run `apply` with `value` only when `ticket` is current
    ///
    /// Returns whether the value was applied.
    pub fn apply_if_latest<T, F: FnOnce(T)>(&self, ticket: Ticket, value: T, apply: F) -> bool {
        if self.is_latest(ticket) {
            apply(value);
            true
        } else {
            events::stale_response(ticket.0, self.latest.load(Ordering::Acquire));
            false
        }
    }
}
