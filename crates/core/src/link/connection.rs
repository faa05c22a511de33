//! Carries protocol lines between a board and its peer.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::{LinkError, Worker};
use crate::board::{KitchenId, ProtocolMessage, TicketBoard};
use crate::metrics::{PROTOCOL_DECODE_ERRORS, PROTOCOL_LINES};

/// Keyword of the greeting the reception sends to every kitchen it accepts.
pub const WELCOME_KEYWORD: &str = "WELCOME";

/// Counters returned when a read loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Lines applied to the board.
    pub applied: usize,
    /// Lines naming a ticket the board no longer has.
    pub not_found: usize,
    /// Lines that could not be decoded or were not allowed for the board's role.
    pub rejected: usize,
}

/// Write half of a link. Cheap to clone; writes are serialized.
pub struct BoardLink<W> {
    writer: Arc<Mutex<W>>,
}

impl<W> Clone for BoardLink<W> {
    fn clone(&self) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
        }
    }
}

impl<W> BoardLink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Send one protocol message as a line.
    pub async fn send(&self, message: &ProtocolMessage) -> Result<(), LinkError> {
        debug!(message = %message, "Sending protocol line");
        self.send_line(&message.encode()).await
    }

    /// Greet a freshly accepted kitchen with the identity it was given.
    pub async fn send_welcome(&self, kitchen: KitchenId) -> Result<(), LinkError> {
        self.send_line(&format!("{} {}", WELCOME_KEYWORD, kitchen))
            .await
    }

    async fn send_line(&self, line: &str) -> Result<(), LinkError> {
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Read the reception's greeting and return the identity it assigned.
pub async fn read_welcome<R>(reader: &mut R) -> Result<KitchenId, LinkError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Err(LinkError::Closed);
    }

    let line = line.trim_end();
    line.strip_prefix(WELCOME_KEYWORD)
        .and_then(|rest| rest.strip_prefix(' '))
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| LinkError::Handshake(line.to_string()))
}

/// Apply every line read from `reader` to `board`.
///
/// Runs until the peer closes the stream or the board is stopped. Bad lines are
/// logged and skipped; only I/O errors end the loop early.
pub async fn read_loop<R>(
    board: Arc<TicketBoard>,
    reader: R,
    peer: Option<KitchenId>,
) -> Result<LinkStats, LinkError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut running = board.running_signal();
    let mut stats = LinkStats::default();

    loop {
        let keep_running = *running.borrow_and_update();
        if !keep_running {
            break;
        }

        let line = tokio::select! {
            line = lines.next_line() => line?,
            changed = running.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        };

        let Some(line) = line else {
            info!(role = %board.role(), "Peer closed the link");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        apply_line(&board, &line, peer, &mut stats);
    }

    debug!(
        role = %board.role(),
        applied = stats.applied,
        not_found = stats.not_found,
        rejected = stats.rejected,
        "Read loop finished"
    );
    Ok(stats)
}

/// Spawn [`read_loop`] as a worker.
pub fn spawn_reader<R>(
    board: Arc<TicketBoard>,
    reader: R,
    peer: Option<KitchenId>,
) -> Worker<Result<LinkStats, LinkError>>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let name = match peer {
        Some(peer) => format!("reader-{}", peer),
        None => format!("reader-{}", board.role()),
    };
    Worker::start(name, read_loop(board, reader, peer))
}

fn apply_line(board: &TicketBoard, line: &str, peer: Option<KitchenId>, stats: &mut LinkStats) {
    let message = match ProtocolMessage::parse(line) {
        Ok(message) => message,
        Err(e) => {
            PROTOCOL_DECODE_ERRORS.inc();
            warn!(role = %board.role(), "Dropping protocol line: {}", e);
            stats.rejected += 1;
            return;
        }
    };

    let keyword = message.message_type().keyword();
    match board.receive(&message, peer) {
        Ok(_) => {
            PROTOCOL_LINES.with_label_values(&[keyword, "applied"]).inc();
            stats.applied += 1;
        }
        Err(e) if e.is_recoverable() => {
            PROTOCOL_LINES.with_label_values(&[keyword, "not_found"]).inc();
            debug!(role = %board.role(), "Ignoring {}: {}", keyword, e);
            stats.not_found += 1;
        }
        Err(e) => {
            PROTOCOL_LINES.with_label_values(&[keyword, "rejected"]).inc();
            error!(role = %board.role(), "Rejected {}: {}", keyword, e);
            stats.rejected += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncWriteExt, BufReader};

    use super::*;
    use crate::board::{Role, TicketEventType};
    use crate::order::CommandId;
    use crate::testing::{fixtures, EventRecorder};
    use crate::ticket::TicketId;

    #[tokio::test]
    async fn test_read_loop_applies_lines_until_eof() {
        let board = Arc::new(TicketBoard::new(Role::Slave));
        let recorder = EventRecorder::new();
        recorder.listen_all(&board);

        let ticket_id = TicketId::new();
        let new_ticket = ProtocolMessage::NewTicket {
            ticket_id,
            command_id: CommandId::new(),
            pizza_index: 0,
        };
        let assigned = ProtocolMessage::Assigned {
            ticket_id,
            kitchen: KitchenId::new(),
        };
        let input = format!("{}\n\n{}\n", new_ticket, assigned);
        let reader = tokio_test::io::Builder::new()
            .read(input.as_bytes())
            .build();

        let stats = read_loop(Arc::clone(&board), BufReader::new(reader), None)
            .await
            .unwrap();

        assert_eq!(stats.applied, 2);
        assert_eq!(
            recorder
                .events()
                .iter()
                .map(|e| e.event_type)
                .collect::<Vec<_>>(),
            vec![TicketEventType::Added, TicketEventType::Assigned]
        );
        assert!(board.get_ticket(ticket_id).unwrap().is_in_progress());
    }

    #[tokio::test]
    async fn test_read_loop_skips_bad_lines() {
        let board = Arc::new(TicketBoard::new(Role::Master));
        let ids = board.add_command(&fixtures::command(1));

        let input = format!(
            "garbage\nNEW_TICKET {} {} 0\nTICKET_MARKED_AS_DONE {}\nTICKET_MARKED_AS_DONE {}\n",
            TicketId::new(),
            CommandId::new(),
            TicketId::new(),
            ids[0]
        );
        let reader = tokio_test::io::Builder::new()
            .read(input.as_bytes())
            .build();

        let stats = read_loop(Arc::clone(&board), BufReader::new(reader), None)
            .await
            .unwrap();

        assert_eq!(
            stats,
            LinkStats {
                applied: 1,
                not_found: 1,
                rejected: 2,
            }
        );
        assert!(board.get_ticket(ids[0]).unwrap().is_done());
    }

    #[tokio::test]
    async fn test_read_loop_passes_peer_to_requests() {
        let board = Arc::new(TicketBoard::new(Role::Master));
        let recorder = EventRecorder::new();
        recorder
            .listen(&board, TicketEventType::RequestedAssignment)
            .unwrap();
        let ids = board.add_command(&fixtures::command(1));
        let peer = KitchenId::new();

        let input = format!("{}\n", ProtocolMessage::RequestAssignment { ticket_id: ids[0] });
        let reader = tokio_test::io::Builder::new()
            .read(input.as_bytes())
            .build();

        read_loop(Arc::clone(&board), BufReader::new(reader), Some(peer))
            .await
            .unwrap();

        assert_eq!(recorder.events()[0].kitchen, Some(peer));
    }

    #[tokio::test]
    async fn test_stop_ends_idle_read_loop() {
        let board = Arc::new(TicketBoard::new(Role::Slave));
        let (_peer, ours) = tokio::io::duplex(64);

        let worker = spawn_reader(Arc::clone(&board), BufReader::new(ours), None);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!worker.is_finished());

        board.stop();

        let stats = tokio::time::timeout(Duration::from_secs(2), worker.join())
            .await
            .expect("read loop ignored stop")
            .unwrap()
            .unwrap();
        assert_eq!(stats, LinkStats::default());
    }

    #[tokio::test]
    async fn test_send_writes_one_line() {
        let ticket_id = TicketId::new();
        let message = ProtocolMessage::MarkedAsDone { ticket_id };
        let writer = tokio_test::io::Builder::new()
            .write(message.encode().as_bytes())
            .write(b"\n")
            .build();

        let link = BoardLink::new(writer);
        link.send(&message).await.unwrap();
    }

    #[tokio::test]
    async fn test_welcome_handshake() {
        let (client, server) = tokio::io::duplex(256);
        let kitchen = KitchenId::new();

        BoardLink::new(server).send_welcome(kitchen).await.unwrap();

        let mut reader = BufReader::new(client);
        assert_eq!(read_welcome(&mut reader).await.unwrap(), kitchen);
    }

    #[tokio::test]
    async fn test_welcome_rejects_other_lines() {
        let (mut client, server) = tokio::io::duplex(256);
        client.write_all(b"HELLO there\n").await.unwrap();
        drop(client);

        let mut reader = BufReader::new(server);
        assert!(matches!(
            read_welcome(&mut reader).await,
            Err(LinkError::Handshake(line)) if line == "HELLO there"
        ));
    }

    #[tokio::test]
    async fn test_welcome_on_closed_stream() {
        let (client, server) = tokio::io::duplex(16);
        drop(client);
        let mut reader = BufReader::new(server);
        assert!(matches!(read_welcome(&mut reader).await, Err(LinkError::Closed)));
    }
}
