//! Ticket board: the registry both ends of a reception/kitchen link keep,
//! the events it fires, and the line protocol that mirrors it to the peer.

mod error;
pub mod protocol;
mod ticket_board;
mod types;

pub use error::TicketBoardError;
pub use protocol::{MessageType, ProtocolError, ProtocolMessage};
pub use ticket_board::TicketBoard;
pub use types::{ChannelId, KitchenId, Role, TicketCallback, TicketEvent, TicketEventType};
