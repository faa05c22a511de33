//! Transport side of a board: line I/O, the greeting, and background workers.

mod connection;
mod worker;

pub use connection::{
    read_loop, read_welcome, spawn_reader, BoardLink, LinkStats, WELCOME_KEYWORD,
};
pub use worker::Worker;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected greeting: '{0}'")]
    Handshake(String),

    #[error("link closed by peer")]
    Closed,

    #[error("worker {worker} panicked: {reason}")]
    WorkerPanicked { worker: String, reason: String },

    #[error("worker {worker} was cancelled")]
    WorkerCancelled { worker: String },
}
