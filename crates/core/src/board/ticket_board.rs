//! The ticket board: registry, permissions and event dispatch for one link end.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, trace};

use super::protocol::ProtocolMessage;
use super::{
    ChannelId, KitchenId, Role, TicketBoardError, TicketCallback, TicketEvent, TicketEventType,
};
use crate::metrics::{EVENTS_FIRED, TICKETS_ADDED, TICKETS_REMOVED};
use crate::order::{Command, CommandId};
use crate::ticket::{Ticket, TicketId};

type Registry = HashMap<TicketId, Ticket>;
type Listeners = HashMap<TicketEventType, Vec<TicketCallback>>;

/// Thread-safe, role-aware registry of outstanding tickets.
///
/// The registry and the listener table sit behind separate locks. Listeners are
/// always invoked with both locks released, so a callback may call back into the
/// board.
pub struct TicketBoard {
    role: Role,
    supported_events: &'static [TicketEventType],
    socket: Option<ChannelId>,
    tickets: Mutex<Registry>,
    listeners: RwLock<Listeners>,
    running: watch::Sender<bool>,
}

impl TicketBoard {
    /// Create a board that is not bound to any channel yet.
    pub fn new(role: Role) -> Self {
        let (running, _) = watch::channel(true);
        Self {
            role,
            supported_events: role.supported_events(),
            socket: None,
            tickets: Mutex::new(HashMap::new()),
            listeners: RwLock::new(HashMap::new()),
            running,
        }
    }

    /// Create a board bound to `channel`.
    pub fn bound(role: Role, channel: ChannelId) -> Self {
        Self {
            socket: Some(channel),
            ..Self::new(role)
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Channel this board is bound to, for the transport to use.
    pub fn socket(&self) -> Option<&ChannelId> {
        self.socket.as_ref()
    }

    // ------------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------------

    /// Create one ticket per pizza of `command`.
    ///
    /// No event fires; announcing the tickets is up to the caller.
    pub fn add_command(&self, command: &Command) -> Vec<TicketId> {
        let new_tickets: Vec<Ticket> = (0..command.len())
            .map(|index| Ticket::new(command, index))
            .collect();
        let ids = new_tickets.iter().map(Ticket::id).collect();

        let mut tickets = self.lock_tickets();
        for ticket in new_tickets {
            tickets.insert(ticket.id(), ticket);
        }
        drop(tickets);

        TICKETS_ADDED.inc_by(command.len() as u64);
        debug!(
            role = %self.role,
            command_id = %command.id(),
            count = command.len(),
            "Added tickets for command"
        );
        ids
    }

    /// Insert a ticket. A ticket with the same identity is replaced.
    pub fn add_ticket(&self, ticket: Ticket) {
        let id = ticket.id();
        let replaced = self.lock_tickets().insert(id, ticket).is_some();

        if replaced {
            debug!(role = %self.role, ticket_id = %id, "Replaced existing ticket");
        } else {
            TICKETS_ADDED.inc();
            trace!(role = %self.role, ticket_id = %id, "Added ticket");
        }
    }

    /// Remove a ticket. Returns the removed ticket, or `None` if it was absent.
    pub fn remove_ticket(&self, ticket_id: TicketId) -> Option<Ticket> {
        let removed = self.lock_tickets().remove(&ticket_id);
        if removed.is_some() {
            TICKETS_REMOVED.inc();
            trace!(role = %self.role, ticket_id = %ticket_id, "Removed ticket");
        }
        removed
    }

    /// Remove every ticket of a command. Returns how many were removed.
    pub fn remove_all_tickets_of(&self, command_id: CommandId) -> usize {
        let mut tickets = self.lock_tickets();
        let before = tickets.len();
        tickets.retain(|_, ticket| ticket.command_id() != command_id);
        let removed = before - tickets.len();
        drop(tickets);

        if removed > 0 {
            TICKETS_REMOVED.inc_by(removed as u64);
            debug!(role = %self.role, command_id = %command_id, removed, "Removed command tickets");
        }
        removed
    }

    /// Mark a ticket as done. This also clears its in-progress flag.
    pub fn mark_done(&self, ticket_id: TicketId) -> Result<(), TicketBoardError> {
        self.update(ticket_id, Ticket::mark_done).map(|_| ())
    }

    /// Mark a ticket as being worked on.
    ///
    /// The done flag is left untouched; do not call this on a completed ticket.
    pub fn mark_in_progress(&self, ticket_id: TicketId) -> Result<(), TicketBoardError> {
        self.update(ticket_id, Ticket::mark_in_progress).map(|_| ())
    }

    /// Atomically move a pending ticket to in-progress.
    ///
    /// Returns `false` when the ticket is already done or taken.
    pub fn try_claim(&self, ticket_id: TicketId) -> Result<bool, TicketBoardError> {
        let mut tickets = self.lock_tickets();
        let ticket = tickets
            .get_mut(&ticket_id)
            .ok_or(TicketBoardError::TicketNotFound(ticket_id))?;

        if !ticket.is_pending() {
            return Ok(false);
        }
        ticket.mark_in_progress();
        Ok(true)
    }

    /// Look a ticket up. Absence is not an error here.
    pub fn get_ticket(&self, ticket_id: TicketId) -> Option<Ticket> {
        self.lock_tickets().get(&ticket_id).cloned()
    }

    /// Snapshot of every ticket, grouped by command in pizza order.
    pub fn get_tickets(&self) -> Vec<Ticket> {
        let mut tickets: Vec<Ticket> = self.lock_tickets().values().cloned().collect();
        tickets.sort_by_key(|t| (t.command_id(), t.pizza_index()));
        tickets
    }

    /// Copy of the tickets of one command, in pizza order.
    pub fn get_tickets_of(&self, command_id: CommandId) -> Vec<Ticket> {
        let mut tickets: Vec<Ticket> = self
            .lock_tickets()
            .values()
            .filter(|t| t.command_id() == command_id)
            .cloned()
            .collect();
        tickets.sort_by_key(Ticket::pizza_index);
        tickets
    }

    /// True when the command has tickets and all of them are done.
    pub fn is_command_done(&self, command_id: CommandId) -> bool {
        let tickets = self.lock_tickets();
        let mut of_command = tickets.values().filter(|t| t.command_id() == command_id);
        let mut any = false;
        let all_done = of_command.all(|t| {
            any = true;
            t.is_done()
        });
        any && all_done
    }

    pub fn len(&self) -> usize {
        self.lock_tickets().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_tickets().is_empty()
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    /// Whether this board's role may observe `event_type`.
    pub fn supports(&self, event_type: TicketEventType) -> bool {
        self.supported_events.contains(&event_type)
    }

    /// Subscribe `callback` to `event_type`.
    ///
    /// Fails without registering anything if the role may not observe the event.
    pub fn add_listener<F>(
        &self,
        event_type: TicketEventType,
        callback: F,
    ) -> Result<(), TicketBoardError>
    where
        F: Fn(&TicketEvent) + Send + Sync + 'static,
    {
        self.ensure_supported(event_type)?;
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event_type)
            .or_default()
            .push(Arc::new(callback));
        Ok(())
    }

    /// Fire `event_type` for a registered ticket.
    pub fn fire(
        &self,
        event_type: TicketEventType,
        ticket_id: TicketId,
        kitchen: Option<KitchenId>,
    ) -> Result<TicketEvent, TicketBoardError> {
        self.ensure_supported(event_type)?;
        let ticket = self
            .get_ticket(ticket_id)
            .ok_or(TicketBoardError::TicketNotFound(ticket_id))?;
        Ok(self.dispatch(event_type, ticket, kitchen))
    }

    /// Apply a message received from the peer and fire the matching event.
    ///
    /// `peer` identifies the kitchen on the other end of the link, when known.
    /// The role check and the ticket lookup both happen before anything is
    /// written.
    pub fn receive(
        &self,
        message: &ProtocolMessage,
        peer: Option<KitchenId>,
    ) -> Result<TicketEvent, TicketBoardError> {
        let event_type = message.message_type().event_type();
        self.ensure_supported(event_type)?;

        let (ticket, kitchen) = match *message {
            ProtocolMessage::NewTicket {
                ticket_id,
                command_id,
                pizza_index,
            } => {
                let ticket = Ticket::from_parts(ticket_id, command_id, pizza_index);
                self.add_ticket(ticket.clone());
                (ticket, None)
            }
            ProtocolMessage::RequestAssignment { ticket_id } => {
                let ticket = self
                    .get_ticket(ticket_id)
                    .ok_or(TicketBoardError::TicketNotFound(ticket_id))?;
                (ticket, peer)
            }
            ProtocolMessage::Assigned { ticket_id, kitchen } => {
                (self.update(ticket_id, Ticket::mark_in_progress)?, Some(kitchen))
            }
            ProtocolMessage::MarkedAsDone { ticket_id } => {
                (self.update(ticket_id, Ticket::mark_done)?, None)
            }
        };

        Ok(self.dispatch(event_type, ticket, kitchen))
    }

    fn dispatch(
        &self,
        event_type: TicketEventType,
        ticket: Ticket,
        kitchen: Option<KitchenId>,
    ) -> TicketEvent {
        let callbacks: Vec<TicketCallback> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event_type)
            .cloned()
            .unwrap_or_default();

        let event = TicketEvent {
            event_type,
            ticket,
            kitchen,
            fired_at: Utc::now(),
        };

        EVENTS_FIRED.with_label_values(&[event_type.as_str()]).inc();
        debug!(
            role = %self.role,
            event = %event_type,
            ticket_id = %event.ticket.id(),
            listeners = callbacks.len(),
            "Firing ticket event"
        );

        for callback in &callbacks {
            callback(&event);
        }
        event
    }

    fn ensure_supported(&self, event_type: TicketEventType) -> Result<(), TicketBoardError> {
        if self.supports(event_type) {
            Ok(())
        } else {
            Err(TicketBoardError::UnsupportedEventType(event_type))
        }
    }

    // ------------------------------------------------------------------------
    // Outgoing messages
    // ------------------------------------------------------------------------

    /// `NEW_TICKET` for a registered ticket.
    pub fn announce(&self, ticket_id: TicketId) -> Result<ProtocolMessage, TicketBoardError> {
        let ticket = self
            .get_ticket(ticket_id)
            .ok_or(TicketBoardError::TicketNotFound(ticket_id))?;
        Ok(ProtocolMessage::NewTicket {
            ticket_id,
            command_id: ticket.command_id(),
            pizza_index: ticket.pizza_index(),
        })
    }

    /// `TICKET_REQUEST_ASSIGNMENT` for a registered ticket.
    pub fn request_assignment(
        &self,
        ticket_id: TicketId,
    ) -> Result<ProtocolMessage, TicketBoardError> {
        self.ensure_present(ticket_id)?;
        Ok(ProtocolMessage::RequestAssignment { ticket_id })
    }

    /// `TICKET_ASSIGNED` for a registered ticket.
    pub fn assign(
        &self,
        ticket_id: TicketId,
        kitchen: KitchenId,
    ) -> Result<ProtocolMessage, TicketBoardError> {
        self.ensure_present(ticket_id)?;
        Ok(ProtocolMessage::Assigned { ticket_id, kitchen })
    }

    /// `TICKET_MARKED_AS_DONE` for a registered ticket.
    pub fn done(&self, ticket_id: TicketId) -> Result<ProtocolMessage, TicketBoardError> {
        self.ensure_present(ticket_id)?;
        Ok(ProtocolMessage::MarkedAsDone { ticket_id })
    }

    fn ensure_present(&self, ticket_id: TicketId) -> Result<(), TicketBoardError> {
        if self.lock_tickets().contains_key(&ticket_id) {
            Ok(())
        } else {
            Err(TicketBoardError::TicketNotFound(ticket_id))
        }
    }

    // ------------------------------------------------------------------------
    // Running flag
    // ------------------------------------------------------------------------

    /// Ask the I/O loop to stop. Nothing is joined or cancelled here.
    pub fn stop(&self) {
        if self.running.send_replace(false) {
            debug!(role = %self.role, "Ticket board stopping");
        }
    }

    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    /// Receiver that observes the running flag, for loops that need to wake on `stop`.
    pub fn running_signal(&self) -> watch::Receiver<bool> {
        self.running.subscribe()
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn lock_tickets(&self) -> MutexGuard<'_, Registry> {
        self.tickets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Find and mutate a ticket under one lock, returning the updated copy.
    fn update(
        &self,
        ticket_id: TicketId,
        apply: impl FnOnce(&mut Ticket),
    ) -> Result<Ticket, TicketBoardError> {
        let mut tickets = self.lock_tickets();
        let ticket = tickets
            .get_mut(&ticket_id)
            .ok_or(TicketBoardError::TicketNotFound(ticket_id))?;
        apply(ticket);
        Ok(ticket.clone())
    }
}

impl std::fmt::Debug for TicketBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketBoard")
            .field("role", &self.role)
            .field("socket", &self.socket)
            .field("tickets", &self.len())
            .field("running", &self.is_running())
            .finish()
    }
}
