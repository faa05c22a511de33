//! Tickets: one per pizza of a command.

mod types;

pub use types::{Ticket, TicketId};
