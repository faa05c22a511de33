use thiserror::Error;

use super::TicketEventType;
use crate::ticket::TicketId;

/// Failures raised by a ticket board. Always returned to the immediate caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TicketBoardError {
    /// The board's role may not observe or fire this event.
    #[error("Unsupported event type: {0}")]
    UnsupportedEventType(TicketEventType),

    /// No ticket with this identity is registered.
    #[error("Ticket not found: {0}")]
    TicketNotFound(TicketId),
}

impl TicketBoardError {
    /// Whether the caller can shrug this off.
    ///
    /// A missing ticket is the normal outcome of the two ends racing each other.
    /// An unsupported event type means the call site is wrong.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TicketBoardError::TicketNotFound(_))
    }
}
