//! Generation tags for async work that a newer user action can supersede.
//!
//! There is no cancellation of in-flight requests. Instead every superseding
//! action (a navigation, a new editor selection) bumps the counter, async
//! work captures a [`Ticket`] when it starts, and its result is applied only
//! if the ticket is still current.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Generation(u64);

/// Proof of the generation some async work started under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supersede all outstanding tickets.
    pub fn bump(&mut self) -> Ticket {
        self.0 = self.0.wrapping_add(1);
        Ticket(self.0)
    }

    pub fn ticket(&self) -> Ticket {
        Ticket(self.0)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.0 == ticket.0
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}
