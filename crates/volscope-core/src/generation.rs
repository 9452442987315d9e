//! Generation tagging for in-flight dataset loads.
//!
//! Every load is issued with a [`LoadTicket`] carrying the generation that was
//! current when it started. Any later attach, release or load advances the
//! generation, which turns all older tickets stale. Results arriving with a
//! stale ticket must be dropped without touching the session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonically increasing generation counter shared with outstanding tickets.
#[derive(Debug, Clone, Default)]
pub struct LoadGeneration {
    current: Arc<AtomicU64>,
}

impl LoadGeneration {
    /// Creates a counter at generation 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current generation.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    /// Advances the generation, invalidating every ticket issued so far.
    pub fn advance(&self) -> u64 {
        self.current.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Advances the generation and returns a ticket for the new one.
    #[must_use]
    pub fn issue(&self) -> LoadTicket {
        let generation = self.advance();
        LoadTicket {
            generation,
            current: Arc::clone(&self.current),
        }
    }

    /// Returns whether `ticket` was issued by this counter and is still current.
    #[must_use]
    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        Arc::ptr_eq(&self.current, &ticket.current) && ticket.generation == self.current()
    }
}

/// Tag attached to one in-flight load.
#[derive(Debug, Clone)]
pub struct LoadTicket {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl LoadTicket {
    /// Returns the generation this ticket was issued at.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns whether a newer generation has superseded this ticket.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.current.load(Ordering::Acquire) != self.generation
    }
}
