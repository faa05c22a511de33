pub mod board;
pub mod config;
pub mod link;
pub mod metrics;
pub mod order;
pub mod testing;
pub mod ticket;

pub use board::{
    ChannelId, KitchenId, MessageType, ProtocolError, ProtocolMessage, Role, TicketBoard,
    TicketBoardError, TicketCallback, TicketEvent, TicketEventType,
};
pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, Config,
    ConfigError, HttpConfig, KitchenConfig, LinkConfig,
};
pub use link::{
    read_loop, read_welcome, spawn_reader, BoardLink, LinkError, LinkStats, Worker,
};
pub use order::{parse_order, Command, CommandId, OrderError, Pizza, PizzaSize, PizzaType};
pub use ticket::{Ticket, TicketId};
