//! Line protocol spoken between the reception and its kitchens.
//!
//! One message per line, a keyword followed by space-separated fields:
//!
//! ```text
//! NEW_TICKET <ticket> <command> <pizza index>
//! TICKET_REQUEST_ASSIGNMENT <ticket>
//! TICKET_ASSIGNED <ticket> <kitchen>
//! TICKET_MARKED_AS_DONE <ticket>
//! ```
//!
//! Every message type maps to exactly one [`TicketEventType`], which is what the
//! receiving board fires once the line has been applied.

use std::fmt;

use once_cell::sync::Lazy;
use regex_lite::{Captures, Regex};
use thiserror::Error;

use super::{KitchenId, TicketEventType};
use crate::order::CommandId;
use crate::ticket::TicketId;

const UUID: &str = "[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}";

/// Errors raised while decoding a protocol line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unrecognized message: '{0}'")]
    UnknownMessage(String),

    #[error("invalid {field} in message: '{value}'")]
    InvalidField { field: &'static str, value: String },
}

/// Kind of message on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    NewTicket,
    TicketRequestAssignment,
    TicketAssigned,
    TicketMarkedAsDone,
}

struct ProtocolEntry {
    keyword: &'static str,
    pattern: Regex,
}

impl ProtocolEntry {
    fn new(keyword: &'static str, fields: &[&str]) -> Self {
        let mut pattern = format!("^{}", keyword);
        for field in fields {
            pattern.push(' ');
            pattern.push_str(field);
        }
        pattern.push('$');
        Self {
            keyword,
            pattern: Regex::new(&pattern).unwrap(),
        }
    }
}

/// Keyword and matcher for each message type, indexed by [`MessageType::index`].
static PROTOCOL_TABLE: Lazy<[ProtocolEntry; 4]> = Lazy::new(|| {
    let uuid = format!("({})", UUID);
    [
        ProtocolEntry::new("NEW_TICKET", &[&uuid, &uuid, r"(\d+)"]),
        ProtocolEntry::new("TICKET_REQUEST_ASSIGNMENT", &[&uuid]),
        ProtocolEntry::new("TICKET_ASSIGNED", &[&uuid, &uuid]),
        ProtocolEntry::new("TICKET_MARKED_AS_DONE", &[&uuid]),
    ]
});

impl MessageType {
    pub const ALL: [MessageType; 4] = [
        MessageType::NewTicket,
        MessageType::TicketRequestAssignment,
        MessageType::TicketAssigned,
        MessageType::TicketMarkedAsDone,
    ];

    fn index(&self) -> usize {
        match self {
            MessageType::NewTicket => 0,
            MessageType::TicketRequestAssignment => 1,
            MessageType::TicketAssigned => 2,
            MessageType::TicketMarkedAsDone => 3,
        }
    }

    /// Literal tag that starts a message of this type.
    pub fn keyword(&self) -> &'static str {
        PROTOCOL_TABLE[self.index()].keyword
    }

    /// Anchored matcher that recognizes and destructures a message of this type.
    pub fn pattern(&self) -> &'static Regex {
        &PROTOCOL_TABLE[self.index()].pattern
    }

    /// Event fired on the receiving board.
    pub fn event_type(&self) -> TicketEventType {
        match self {
            MessageType::NewTicket => TicketEventType::Added,
            MessageType::TicketRequestAssignment => TicketEventType::RequestedAssignment,
            MessageType::TicketAssigned => TicketEventType::Assigned,
            MessageType::TicketMarkedAsDone => TicketEventType::MarkedAsDone,
        }
    }

    pub fn from_event_type(event_type: TicketEventType) -> Self {
        match event_type {
            TicketEventType::Added => MessageType::NewTicket,
            TicketEventType::RequestedAssignment => MessageType::TicketRequestAssignment,
            TicketEventType::Assigned => MessageType::TicketAssigned,
            TicketEventType::MarkedAsDone => MessageType::TicketMarkedAsDone,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A decoded protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolMessage {
    NewTicket {
        ticket_id: TicketId,
        command_id: CommandId,
        pizza_index: usize,
    },
    RequestAssignment {
        ticket_id: TicketId,
    },
    Assigned {
        ticket_id: TicketId,
        kitchen: KitchenId,
    },
    MarkedAsDone {
        ticket_id: TicketId,
    },
}

impl ProtocolMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            ProtocolMessage::NewTicket { .. } => MessageType::NewTicket,
            ProtocolMessage::RequestAssignment { .. } => MessageType::TicketRequestAssignment,
            ProtocolMessage::Assigned { .. } => MessageType::TicketAssigned,
            ProtocolMessage::MarkedAsDone { .. } => MessageType::TicketMarkedAsDone,
        }
    }

    pub fn ticket_id(&self) -> TicketId {
        match self {
            ProtocolMessage::NewTicket { ticket_id, .. }
            | ProtocolMessage::RequestAssignment { ticket_id }
            | ProtocolMessage::Assigned { ticket_id, .. }
            | ProtocolMessage::MarkedAsDone { ticket_id } => *ticket_id,
        }
    }

    /// Render the message as a single line, without the trailing newline.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Decode one line. A trailing `\n` or `\r\n` is ignored.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim_end_matches(['\r', '\n']);

        for message_type in MessageType::ALL {
            if let Some(caps) = message_type.pattern().captures(line) {
                return Self::from_captures(message_type, &caps);
            }
        }

        Err(ProtocolError::UnknownMessage(line.to_string()))
    }

    fn from_captures(message_type: MessageType, caps: &Captures<'_>) -> Result<Self, ProtocolError> {
        let ticket_id = parse_field(caps, 1, "ticket id")?;
        let message = match message_type {
            MessageType::NewTicket => ProtocolMessage::NewTicket {
                ticket_id,
                command_id: parse_field(caps, 2, "command id")?,
                pizza_index: parse_field(caps, 3, "pizza index")?,
            },
            MessageType::TicketRequestAssignment => ProtocolMessage::RequestAssignment { ticket_id },
            MessageType::TicketAssigned => ProtocolMessage::Assigned {
                ticket_id,
                kitchen: parse_field(caps, 2, "kitchen id")?,
            },
            MessageType::TicketMarkedAsDone => ProtocolMessage::MarkedAsDone { ticket_id },
        };
        Ok(message)
    }
}

fn parse_field<T: std::str::FromStr>(
    caps: &Captures<'_>,
    group: usize,
    field: &'static str,
) -> Result<T, ProtocolError> {
    let value = caps.get(group).map(|m| m.as_str()).unwrap_or_default();
    value.parse().map_err(|_| ProtocolError::InvalidField {
        field,
        value: value.to_string(),
    })
}

impl fmt::Display for ProtocolMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = self.message_type().keyword();
        match self {
            ProtocolMessage::NewTicket {
                ticket_id,
                command_id,
                pizza_index,
            } => write!(f, "{} {} {} {}", keyword, ticket_id, command_id, pizza_index),
            ProtocolMessage::RequestAssignment { ticket_id }
            | ProtocolMessage::MarkedAsDone { ticket_id } => write!(f, "{} {}", keyword, ticket_id),
            ProtocolMessage::Assigned { ticket_id, kitchen } => {
                write!(f, "{} {} {}", keyword, ticket_id, kitchen)
            }
        }
    }
}
