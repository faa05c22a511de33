//! Core ticket data types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::order::{Command, CommandId};

/// Unique identifier for a ticket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(Uuid);

impl TicketId {
    /// Creates a new random `TicketId`.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TicketId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// One unit of work: a single pizza of a command.
///
/// The ticket only points back at its command by identity; the command itself
/// stays with whoever took the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ticket {
    id: TicketId,
    command_id: CommandId,
    pizza_index: usize,
    done: bool,
    in_progress: bool,
}

impl Ticket {
    /// Create a ticket for the pizza at `pizza_index` in `command`.
    pub fn new(command: &Command, pizza_index: usize) -> Self {
        Self::from_parts(TicketId::new(), command.id(), pizza_index)
    }

    /// Rebuild a ticket announced by the peer.
    pub fn from_parts(id: TicketId, command_id: CommandId, pizza_index: usize) -> Self {
        Self {
            id,
            command_id,
            pizza_index,
            done: false,
            in_progress: false,
        }
    }

    pub fn id(&self) -> TicketId {
        self.id
    }

    pub fn command_id(&self) -> CommandId {
        self.command_id
    }

    pub fn pizza_index(&self) -> usize {
        self.pizza_index
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress
    }

    /// Neither completed nor being worked on.
    pub fn is_pending(&self) -> bool {
        !self.done && !self.in_progress
    }

    /// Completion always clears the in-progress flag.
    pub(crate) fn mark_done(&mut self) {
        self.done = true;
        self.in_progress = false;
    }

    pub(crate) fn mark_in_progress(&mut self) {
        self.in_progress = true;
    }
}
