use async_trait::async_trait;

use crate::{domain::UserId, Result};

/// Pairing-related event pushed to a user who did not initiate the
/// triggering operation. The party that did gets the outcome as a return
/// value instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// A partner was found while this user was waiting in a queue.
    Matched,
    /// The conversation ended (partner left, was banned, or became
    /// unreachable).
    PartnerLeft,
}

/// Transport port implemented by the messaging adapter.
///
/// The engine computes outcomes inside its critical section and calls these
/// only after the lock is released, so a slow or failing transport never
/// blocks matching for other users.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Push an event notification. Best-effort: an unreachable user here
    /// does not fail the operation that produced the event.
    async fn notify(&self, user: UserId, event: Event);

    /// Deliver relayed conversation text. Failure is meaningful: the engine
    /// tears the pairing down when delivery to the partner fails.
    async fn deliver(&self, user: UserId, text: &str) -> Result<()>;
}
