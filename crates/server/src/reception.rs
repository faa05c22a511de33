//! The reception: takes orders, hands tickets out to kitchens, collects results.
//!
//! Runs the master end of every link. Board listeners are synchronous, so
//! anything that has to go over the wire is queued on an outbox. A dispatcher
//! task copies the outbox into one queue per kitchen, and each kitchen has a
//! writer task draining its queue in order.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use tokio::io::BufReader;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};

use plazza_core::{
    parse_order, spawn_reader, BoardLink, ChannelId, Command, CommandId, KitchenId, LinkError,
    OrderError, ProtocolMessage, Role, Ticket, TicketBoard, TicketEvent, TicketEventType,
    TicketId, Worker,
};

use crate::metrics::{
    COMMANDS_ACCEPTED, COMMANDS_COMPLETED, KITCHENS_CONNECTED, TICKETS_REQUEUED,
};

/// Buffer size for completed-command notifications.
const COMPLETED_BUFFER_SIZE: usize = 64;

type KitchenQueue = mpsc::UnboundedSender<ProtocolMessage>;

/// Shared state between the reception handle, its listeners and its workers.
struct Shared {
    board: Arc<TicketBoard>,
    kitchens: RwLock<HashMap<KitchenId, KitchenQueue>>,
    commands: Mutex<HashMap<CommandId, Command>>,
    /// Which kitchen each claimed ticket went to.
    assignments: Mutex<HashMap<TicketId, KitchenId>>,
    outbox: mpsc::UnboundedSender<ProtocolMessage>,
    completed: broadcast::Sender<Command>,
}

impl Shared {
    /// Queue `message` for every connected kitchen.
    fn forward(&self, message: ProtocolMessage) {
        let kitchens = self.kitchens.read().unwrap_or_else(PoisonError::into_inner);
        for (kitchen, queue) in kitchens.iter() {
            if queue.send(message).is_err() {
                debug!(
                    kitchen = %kitchen,
                    "Kitchen writer gone, dropping {}",
                    message.message_type()
                );
            }
        }
    }

    /// Make a kitchen visible to the dispatcher, queueing every ticket nobody
    /// has taken yet ahead of anything dispatched later.
    fn join_kitchen(&self, kitchen: KitchenId, queue: KitchenQueue) {
        let mut kitchens = self.kitchens.write().unwrap_or_else(PoisonError::into_inner);
        for ticket in self.board.get_tickets().iter().filter(|t| t.is_pending()) {
            let _ = queue.send(ProtocolMessage::NewTicket {
                ticket_id: ticket.id(),
                command_id: ticket.command_id(),
                pizza_index: ticket.pizza_index(),
            });
        }
        kitchens.insert(kitchen, queue);
    }

    fn queue(&self, message: ProtocolMessage) {
        if self.outbox.send(message).is_err() {
            warn!("Outbox closed, dropping {}", message.message_type());
        }
    }

    /// A kitchen asked for a ticket: the first request wins.
    fn on_requested(&self, event: &TicketEvent) {
        let ticket_id = event.ticket.id();
        let Some(kitchen) = event.kitchen else {
            warn!(ticket_id = %ticket_id, "Assignment request without a kitchen");
            return;
        };

        match self.board.try_claim(ticket_id) {
            Ok(true) => {
                self.assignments
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(ticket_id, kitchen);
                info!(ticket_id = %ticket_id, kitchen = %kitchen, "Assigned ticket");
                self.queue(ProtocolMessage::Assigned { ticket_id, kitchen });
            }
            Ok(false) => {
                debug!(ticket_id = %ticket_id, kitchen = %kitchen, "Ticket already taken");
            }
            Err(e) => debug!("Ignoring assignment request: {}", e),
        }
    }

    /// A kitchen finished a pizza; report the command once all of it is ready.
    fn on_done(&self, event: &TicketEvent) {
        let ticket_id = event.ticket.id();
        let command_id = event.ticket.command_id();
        self.assignments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&ticket_id);

        if !self.board.is_command_done(command_id) {
            return;
        }

        self.board.remove_all_tickets_of(command_id);
        let command = self
            .commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&command_id);

        if let Some(command) = command {
            COMMANDS_COMPLETED.inc();
            info!(command_id = %command_id, "Command ready");
            // No subscribers is fine.
            let _ = self.completed.send(command);
        }
    }

    /// Put a lost kitchen's unfinished tickets back up for grabs.
    fn requeue_tickets_of(&self, kitchen: KitchenId) {
        let lost: Vec<TicketId> = {
            let mut assignments = self
                .assignments
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let lost = assignments
                .iter()
                .filter(|(_, k)| **k == kitchen)
                .map(|(t, _)| *t)
                .collect::<Vec<_>>();
            for ticket_id in &lost {
                assignments.remove(ticket_id);
            }
            lost
        };

        for ticket_id in lost {
            let Some(ticket) = self.board.get_ticket(ticket_id) else {
                continue;
            };
            if ticket.is_done() {
                continue;
            }

            // Re-inserting under the same identity resets its flags.
            self.board.add_ticket(Ticket::from_parts(
                ticket_id,
                ticket.command_id(),
                ticket.pizza_index(),
            ));
            TICKETS_REQUEUED.inc();
            info!(ticket_id = %ticket_id, kitchen = %kitchen, "Requeued ticket");
            if let Ok(message) = self.board.announce(ticket_id) {
                self.queue(message);
            }
        }
    }
}

/// Handle on a running reception.
#[derive(Clone)]
pub struct Reception {
    shared: Arc<Shared>,
    local_addr: SocketAddr,
}

impl Reception {
    /// Bind the kitchen listener and start the accept and dispatch workers.
    pub async fn bind(addr: SocketAddr) -> Result<Self, LinkError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let board = Arc::new(TicketBoard::bound(
            Role::Master,
            ChannelId::new(format!("tcp://{}", local_addr)),
        ));

        let (outbox, outbox_rx) = mpsc::unbounded_channel();
        let (completed, _) = broadcast::channel(COMPLETED_BUFFER_SIZE);
        let shared = Arc::new(Shared {
            board,
            kitchens: RwLock::new(HashMap::new()),
            commands: Mutex::new(HashMap::new()),
            assignments: Mutex::new(HashMap::new()),
            outbox,
            completed,
        });
        register_listeners(&shared);

        Worker::start("reception-dispatch", dispatch(Arc::clone(&shared), outbox_rx)).detach();
        Worker::start("reception-accept", accept_loop(Arc::clone(&shared), listener)).detach();

        info!("Listening for kitchens on {}", local_addr);
        Ok(Self { shared, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn board(&self) -> &Arc<TicketBoard> {
        &self.shared.board
    }

    /// Parse an order line, register its tickets and announce them to every kitchen.
    pub fn take_order(&self, line: &str) -> Result<Command, OrderError> {
        let command = parse_order(line)?;
        self.shared
            .commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(command.id(), command.clone());

        for ticket_id in self.shared.board.add_command(&command) {
            if let Ok(message) = self.shared.board.announce(ticket_id) {
                self.shared.queue(message);
            }
        }

        COMMANDS_ACCEPTED.inc();
        info!(command_id = %command.id(), pizzas = command.len(), "Accepted command");
        Ok(command)
    }

    /// Receive every command as soon as all of its pizzas are cooked.
    pub fn subscribe_completed(&self) -> broadcast::Receiver<Command> {
        self.shared.completed.subscribe()
    }

    pub fn kitchen_count(&self) -> usize {
        self.shared
            .kitchens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Commands taken but not yet completed.
    pub fn pending_commands(&self) -> Vec<Command> {
        self.shared
            .commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Stop accepting kitchens and reading from them.
    pub fn shutdown(&self) {
        self.shared.board.stop();
    }
}

fn register_listeners(shared: &Arc<Shared>) {
    let weak: Weak<Shared> = Arc::downgrade(shared);
    let on_requested = move |event: &TicketEvent| {
        if let Some(shared) = weak.upgrade() {
            shared.on_requested(event);
        }
    };

    let weak: Weak<Shared> = Arc::downgrade(shared);
    let on_done = move |event: &TicketEvent| {
        if let Some(shared) = weak.upgrade() {
            shared.on_done(event);
        }
    };

    // Both events are part of the master's set.
    if let Err(e) = shared
        .board
        .add_listener(TicketEventType::RequestedAssignment, on_requested)
        .and_then(|_| {
            shared
                .board
                .add_listener(TicketEventType::MarkedAsDone, on_done)
        })
    {
        error!("Failed to register reception listeners: {}", e);
    }
}

/// Copy outbox messages onto every connected kitchen's queue.
async fn dispatch(shared: Arc<Shared>, mut outbox: mpsc::UnboundedReceiver<ProtocolMessage>) {
    let mut running = shared.board.running_signal();

    loop {
        let keep_running = *running.borrow_and_update();
        if !keep_running {
            break;
        }

        let message = tokio::select! {
            message = outbox.recv() => match message {
                Some(message) => message,
                None => break,
            },
            changed = running.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        };

        shared.forward(message);
    }
    debug!("Reception dispatcher finished");
}

/// Write one kitchen's queue to its link, in order.
async fn write_to_kitchen(
    kitchen: KitchenId,
    link: BoardLink<OwnedWriteHalf>,
    mut queue: mpsc::UnboundedReceiver<ProtocolMessage>,
    mut running: watch::Receiver<bool>,
) {
    loop {
        let keep_running = *running.borrow_and_update();
        if !keep_running {
            break;
        }

        let message = tokio::select! {
            message = queue.recv() => match message {
                Some(message) => message,
                None => break,
            },
            changed = running.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        };

        if let Err(e) = link.send(&message).await {
            warn!(kitchen = %kitchen, "Failed to send {}: {}", message.message_type(), e);
            break;
        }
    }
    debug!(kitchen = %kitchen, "Kitchen writer finished");
}

async fn accept_loop(shared: Arc<Shared>, listener: TcpListener) {
    let mut running = shared.board.running_signal();

    loop {
        let keep_running = *running.borrow_and_update();
        if !keep_running {
            break;
        }

        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr)) => {
                    if let Err(e) = welcome_kitchen(&shared, stream).await {
                        warn!("Failed to set up kitchen at {}: {}", peer_addr, e);
                    }
                }
                Err(e) => error!("Failed to accept kitchen: {}", e),
            },
            changed = running.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!("Reception stopped accepting kitchens");
}

async fn welcome_kitchen(shared: &Arc<Shared>, stream: TcpStream) -> Result<(), LinkError> {
    let kitchen = KitchenId::new();
    let (read_half, write_half) = stream.into_split();
    let link = BoardLink::new(write_half);

    link.send_welcome(kitchen).await?;

    // A ticket announced while the newcomer joins may arrive twice, which
    // only replaces it.
    let (queue, queued) = mpsc::unbounded_channel();
    shared.join_kitchen(kitchen, queue);
    Worker::start(
        format!("kitchen-writer-{}", kitchen),
        write_to_kitchen(kitchen, link, queued, shared.board.running_signal()),
    )
    .detach();
    KITCHENS_CONNECTED.inc();
    info!(kitchen = %kitchen, "Kitchen connected");

    let reader = spawn_reader(
        Arc::clone(&shared.board),
        BufReader::new(read_half),
        Some(kitchen),
    );
    let shared = Arc::clone(shared);
    Worker::start(format!("kitchen-watch-{}", kitchen), async move {
        match reader.join().await {
            Ok(Ok(stats)) => debug!(kitchen = %kitchen, ?stats, "Kitchen link closed"),
            Ok(Err(e)) => warn!(kitchen = %kitchen, "Kitchen link failed: {}", e),
            Err(e) => error!("{}", e),
        }

        shared
            .kitchens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&kitchen);
        KITCHENS_CONNECTED.dec();
        info!(kitchen = %kitchen, "Kitchen disconnected");
        shared.requeue_tickets_of(kitchen);
    })
    .detach();

    Ok(())
}
