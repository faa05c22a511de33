//! A kitchen: the slave end of a link, cooking the tickets it is assigned.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::BufReader;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use plazza_core::{
    read_welcome, spawn_reader, BoardLink, ChannelId, KitchenConfig, KitchenId, LinkError,
    LinkStats, Role, TicketBoard, TicketEvent, TicketEventType,
    TicketId, Worker,
};

use crate::metrics::{COOKING_DURATION, PIZZAS_COOKED};

/// Cooking time of one pizza before the kitchen's multiplier.
const BASE_COOKING_TIME: Duration = Duration::from_secs(2);

/// Attempts made to reach the reception before giving up.
const CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(200);

/// What the kitchen loop reacts to.
#[derive(Debug)]
enum KitchenEvent {
    /// A new ticket is waiting on the board.
    Offered,
    Assigned { ticket_id: TicketId, kitchen: KitchenId },
    Cooked(TicketId),
    /// Time to give up on requests the reception never answered.
    Sweep,
}

/// A kitchen connected to a reception.
pub struct Kitchen {
    id: KitchenId,
    config: KitchenConfig,
    board: Arc<TicketBoard>,
    link: BoardLink<OwnedWriteHalf>,
    reader: Worker<Result<LinkStats, LinkError>>,
    events: mpsc::UnboundedReceiver<KitchenEvent>,
    events_tx: mpsc::UnboundedSender<KitchenEvent>,
}

impl Kitchen {
    /// Connect to the reception at `addr` and complete the greeting.
    pub async fn connect(addr: SocketAddr, config: KitchenConfig) -> Result<Self, LinkError> {
        let stream = connect_with_retry(addr).await?;
        let (read_half, write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let id = read_welcome(&mut reader).await?;
        info!(kitchen = %id, cooks = config.cooks, "Kitchen connected to {}", addr);

        let board = Arc::new(TicketBoard::bound(
            Role::Slave,
            ChannelId::new(format!("tcp://{}", addr)),
        ));
        let (events_tx, events) = mpsc::unbounded_channel();
        register_listeners(&board, &events_tx);

        // Listeners are in place before the first line is read.
        let reader = spawn_reader(Arc::clone(&board), reader, None);

        Ok(Self {
            id,
            config,
            board,
            link: BoardLink::new(write_half),
            reader,
            events,
            events_tx,
        })
    }

    /// Identity the reception gave this kitchen.
    pub fn id(&self) -> KitchenId {
        self.id
    }

    pub fn board(&self) -> &Arc<TicketBoard> {
        &self.board
    }

    /// Cook until the reception closes the link or the board is stopped.
    pub async fn run(mut self) -> Result<LinkStats, LinkError> {
        let cooks = Arc::new(Semaphore::new(self.config.cooks));
        // When each outstanding request was sent.
        let mut requested: HashMap<TicketId, Instant> = HashMap::new();
        let mut cooking: HashSet<TicketId> = HashSet::new();
        let mut sweep = tokio::time::interval(self.config.request_timeout());
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let event = tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
                _ = sweep.tick() => KitchenEvent::Sweep,
                result = self.reader.wait() => {
                    self.board.stop();
                    return result?;
                }
            };

            match event {
                KitchenEvent::Offered => {}
                KitchenEvent::Sweep => self.expire(&mut requested),
                KitchenEvent::Assigned { ticket_id, kitchen } => {
                    requested.remove(&ticket_id);
                    if kitchen == self.id {
                        cooking.insert(ticket_id);
                        self.start_cooking(ticket_id, Arc::clone(&cooks));
                    } else {
                        self.board.remove_ticket(ticket_id);
                    }
                }
                KitchenEvent::Cooked(ticket_id) => {
                    cooking.remove(&ticket_id);
                    self.finish(ticket_id).await?;
                }
            }

            self.fill(&mut requested, cooking.len()).await?;
        }

        self.board.stop();
        self.reader.join().await?
    }

    /// Ask for waiting tickets until every cook is spoken for.
    async fn fill(
        &self,
        requested: &mut HashMap<TicketId, Instant>,
        cooking: usize,
    ) -> Result<(), LinkError> {
        for ticket in self.board.get_tickets() {
            if requested.len() + cooking >= self.config.cooks {
                break;
            }
            if !ticket.is_pending() || requested.contains_key(&ticket.id()) {
                continue;
            }
            match self.board.request_assignment(ticket.id()) {
                Ok(message) => {
                    self.link.send(&message).await?;
                    requested.insert(ticket.id(), Instant::now());
                }
                Err(e) => debug!("Not requesting {}: {}", ticket.id(), e),
            }
        }
        Ok(())
    }

    /// Forget requests older than the timeout and drop their tickets.
    ///
    /// An assignment can reach this kitchen before the ticket it names, in
    /// which case the answer to its request was already lost.
    fn expire(&self, requested: &mut HashMap<TicketId, Instant>) {
        let timeout = self.config.request_timeout();
        let stale: Vec<TicketId> = requested
            .iter()
            .filter(|(_, sent_at)| sent_at.elapsed() >= timeout)
            .map(|(ticket_id, _)| *ticket_id)
            .collect();

        for ticket_id in stale {
            requested.remove(&ticket_id);
            self.board.remove_ticket(ticket_id);
            warn!(
                kitchen = %self.id,
                ticket_id = %ticket_id,
                "No answer to assignment request, dropping ticket"
            );
        }
    }

    fn start_cooking(&self, ticket_id: TicketId, cooks: Arc<Semaphore>) {
        let cooking_time = BASE_COOKING_TIME.mul_f64(self.config.cooking_multiplier);
        let done = self.events_tx.clone();
        let assigned_at = Instant::now();

        Worker::start(format!("cook-{}", ticket_id), async move {
            let Ok(_permit) = cooks.acquire_owned().await else {
                return;
            };
            debug!(ticket_id = %ticket_id, ?cooking_time, "Cooking");
            tokio::time::sleep(cooking_time).await;

            PIZZAS_COOKED.inc();
            COOKING_DURATION.observe(assigned_at.elapsed().as_secs_f64());
            let _ = done.send(KitchenEvent::Cooked(ticket_id));
        })
        .detach();
    }

    async fn finish(&self, ticket_id: TicketId) -> Result<(), LinkError> {
        if let Err(e) = self.board.mark_done(ticket_id) {
            warn!("Cooked ticket vanished: {}", e);
            return Ok(());
        }
        match self.board.done(ticket_id) {
            Ok(message) => self.link.send(&message).await?,
            Err(e) => warn!("Cannot report {}: {}", ticket_id, e),
        }
        self.board.remove_ticket(ticket_id);
        info!(kitchen = %self.id, ticket_id = %ticket_id, "Ticket cooked");
        Ok(())
    }
}

fn register_listeners(board: &TicketBoard, events: &mpsc::UnboundedSender<KitchenEvent>) {
    let offered = events.clone();
    let assigned = events.clone();

    let added = board.add_listener(TicketEventType::Added, move |_: &TicketEvent| {
        let _ = offered.send(KitchenEvent::Offered);
    });
    let taken = board.add_listener(TicketEventType::Assigned, move |event: &TicketEvent| {
        if let Some(kitchen) = event.kitchen {
            let _ = assigned.send(KitchenEvent::Assigned {
                ticket_id: event.ticket.id(),
                kitchen,
            });
        }
    });

    // Both are part of the slave's set.
    if let Err(e) = added.and(taken) {
        warn!("Failed to register kitchen listeners: {}", e);
    }
}

async fn connect_with_retry(addr: SocketAddr) -> Result<TcpStream, LinkError> {
    let mut attempt = 1;
    loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) if attempt < CONNECT_ATTEMPTS => {
                debug!(attempt, "Reception at {} not reachable yet: {}", addr, e);
                attempt += 1;
                tokio::time::sleep(CONNECT_RETRY_DELAY).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
