//! Roles, event types and the events handed to listeners.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ticket::Ticket;

/// Which end of the reception/kitchen link a board serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The reception: hands tickets out and collects results.
    Master,
    /// A kitchen: receives tickets and cooks them.
    Slave,
}

impl Role {
    /// Events this role is allowed to listen for and fire.
    ///
    /// A master only hears what kitchens report back; a slave only hears what
    /// the reception hands out.
    pub fn supported_events(&self) -> &'static [TicketEventType] {
        match self {
            Role::Master => &[
                TicketEventType::MarkedAsDone,
                TicketEventType::RequestedAssignment,
            ],
            Role::Slave => &[TicketEventType::Assigned, TicketEventType::Added],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Master => f.write_str("master"),
            Role::Slave => f.write_str("slave"),
        }
    }
}

/// Lifecycle transitions a ticket can go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketEventType {
    Added,
    RequestedAssignment,
    Assigned,
    MarkedAsDone,
}

impl TicketEventType {
    pub const ALL: [TicketEventType; 4] = [
        TicketEventType::Added,
        TicketEventType::RequestedAssignment,
        TicketEventType::Assigned,
        TicketEventType::MarkedAsDone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketEventType::Added => "ADDED",
            TicketEventType::RequestedAssignment => "REQUESTED_ASSIGNMENT",
            TicketEventType::Assigned => "ASSIGNED",
            TicketEventType::MarkedAsDone => "MARKED_AS_DONE",
        }
    }
}

impl fmt::Display for TicketEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a kitchen, handed out by the reception when it connects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KitchenId(Uuid);

impl KitchenId {
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

impl Default for KitchenId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for KitchenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for KitchenId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Identity of the channel a board talks over, e.g. `tcp://127.0.0.1:4242`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a listener receives when an event fires.
///
/// `ticket` is a snapshot taken when the event fired; the board may have moved
/// on by the time the listener reads it.
#[derive(Debug, Clone, Serialize)]
pub struct TicketEvent {
    pub event_type: TicketEventType,
    pub ticket: Ticket,
    /// Requesting kitchen for `RequestedAssignment`, assignee for `Assigned`.
    pub kitchen: Option<KitchenId>,
    pub fired_at: DateTime<Utc>,
}

/// Listener callback registered on a board.
pub type TicketCallback = Arc<dyn Fn(&TicketEvent) + Send + Sync>;
