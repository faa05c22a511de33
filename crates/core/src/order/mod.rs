//! Pizzas and the commands (orders) that group them.

mod parser;
mod types;

pub use parser::{parse_order, MAX_QUANTITY};
pub use types::{Command, CommandId, Pizza, PizzaSize, PizzaType};

use thiserror::Error;

/// Errors raised while reading an order line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("empty order")]
    Empty,

    #[error("unknown pizza type: {0}")]
    UnknownType(String),

    #[error("unknown pizza size: {0}")]
    UnknownSize(String),

    #[error("quantity must be between 1 and 99, got {0}")]
    InvalidQuantity(u32),

    #[error("malformed order group: '{0}'")]
    Malformed(String),
}
