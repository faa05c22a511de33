//! Master and slave boards talking over an in-memory link.
//!
//! Walks one ticket through its whole lifecycle:
//! added -> requested assignment -> assigned -> marked as done

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{split, BufReader};
use tokio::sync::mpsc;
use tokio::time::timeout;

use plazza_core::{
    read_welcome, spawn_reader, testing::fixtures, BoardLink, KitchenId, Role, TicketBoard,
    TicketEvent, TicketEventType,
};

const STEP_TIMEOUT: Duration = Duration::from_secs(2);

fn forward(
    board: &TicketBoard,
    event_type: TicketEventType,
) -> mpsc::UnboundedReceiver<TicketEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    board
        .add_listener(event_type, move |event| {
            let _ = tx.send(event.clone());
        })
        .unwrap();
    rx
}

async fn next(rx: &mut mpsc::UnboundedReceiver<TicketEvent>) -> TicketEvent {
    timeout(STEP_TIMEOUT, rx.recv())
        .await
        .expect("event did not arrive in time")
        .expect("listener dropped")
}

#[tokio::test]
async fn test_ticket_lifecycle_over_link() {
    let (master_io, slave_io) = tokio::io::duplex(4096);
    let (master_read, master_write) = split(master_io);
    let (slave_read, slave_write) = split(slave_io);

    let master = Arc::new(TicketBoard::new(Role::Master));
    let slave = Arc::new(TicketBoard::new(Role::Slave));
    let mut requested = forward(&master, TicketEventType::RequestedAssignment);
    let mut completed = forward(&master, TicketEventType::MarkedAsDone);
    let mut added = forward(&slave, TicketEventType::Added);
    let mut assigned = forward(&slave, TicketEventType::Assigned);

    let to_slave = BoardLink::new(master_write);
    let to_master = BoardLink::new(slave_write);

    // Greeting happens before the slave starts its read loop.
    let kitchen = KitchenId::new();
    to_slave.send_welcome(kitchen).await.unwrap();
    let mut slave_reader = BufReader::new(slave_read);
    assert_eq!(read_welcome(&mut slave_reader).await.unwrap(), kitchen);

    let master_worker = spawn_reader(
        Arc::clone(&master),
        BufReader::new(master_read),
        Some(kitchen),
    );
    let slave_worker = spawn_reader(Arc::clone(&slave), slave_reader, None);

    // Master takes an order and announces it.
    let command = fixtures::command(1);
    let ids = master.add_command(&command);
    to_slave.send(&master.announce(ids[0]).unwrap()).await.unwrap();

    // Slave sees it and asks for it.
    let event = next(&mut added).await;
    assert_eq!(event.ticket.id(), ids[0]);
    assert_eq!(event.ticket.command_id(), command.id());
    to_master
        .send(&slave.request_assignment(ids[0]).unwrap())
        .await
        .unwrap();

    // Master hands it to the requesting kitchen.
    let event = next(&mut requested).await;
    assert_eq!(event.kitchen, Some(kitchen));
    assert!(master.try_claim(ids[0]).unwrap());
    to_slave
        .send(&master.assign(ids[0], kitchen).unwrap())
        .await
        .unwrap();

    // Slave cooks and reports back.
    let event = next(&mut assigned).await;
    assert_eq!(event.kitchen, Some(kitchen));
    assert!(slave.get_ticket(ids[0]).unwrap().is_in_progress());
    slave.mark_done(ids[0]).unwrap();
    to_master.send(&slave.done(ids[0]).unwrap()).await.unwrap();
    slave.remove_ticket(ids[0]);

    let event = next(&mut completed).await;
    assert!(event.ticket.is_done());
    assert!(master.is_command_done(command.id()));
    assert_eq!(master.remove_all_tickets_of(command.id()), 1);

    // Shut both loops down cooperatively.
    master.stop();
    slave.stop();
    let master_stats = timeout(STEP_TIMEOUT, master_worker.join())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let slave_stats = timeout(STEP_TIMEOUT, slave_worker.join())
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(master_stats.applied, 2);
    assert_eq!(slave_stats.applied, 2);
    assert_eq!(master_stats.rejected + slave_stats.rejected, 0);
}

#[tokio::test]
async fn test_slave_rejects_master_only_messages() {
    let (peer, ours) = tokio::io::duplex(1024);
    let slave = Arc::new(TicketBoard::new(Role::Slave));
    let ids = slave.add_command(&fixtures::command(1));

    let worker = spawn_reader(Arc::clone(&slave), BufReader::new(ours), None);

    let from_peer = BoardLink::new(peer);
    from_peer
        .send(&slave.done(ids[0]).unwrap())
        .await
        .unwrap();
    drop(from_peer);

    let stats = timeout(STEP_TIMEOUT, worker.join())
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(stats.rejected, 1);
    assert!(!slave.get_ticket(ids[0]).unwrap().is_done());
}
