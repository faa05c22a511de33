//! A reception and real kitchens talking over TCP in one process.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};

use plazza_core::{CommandId, KitchenConfig, KitchenId, ProtocolMessage, TicketId};
use plazza_server::{Kitchen, Reception};

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

fn fast_kitchen(cooks: usize) -> KitchenConfig {
    KitchenConfig {
        cooks,
        // 2s base time becomes 10ms
        cooking_multiplier: 0.005,
        request_timeout_ms: 5000,
    }
}

async fn start_reception() -> Reception {
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    Reception::bind(addr).await.unwrap()
}

type LinkLines = Lines<BufReader<OwnedReadHalf>>;

/// A hand-driven kitchen: a bare TCP client past the greeting.
async fn raw_kitchen(reception: &Reception) -> (LinkLines, OwnedWriteHalf) {
    let stream = TcpStream::connect(reception.local_addr()).await.unwrap();
    let (read_half, write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();
    let welcome = lines.next_line().await.unwrap().unwrap();
    assert!(welcome.starts_with("WELCOME "));
    (lines, write_half)
}

async fn next_message(lines: &mut LinkLines) -> ProtocolMessage {
    let line = timeout(TEST_TIMEOUT, lines.next_line())
        .await
        .expect("no line in time")
        .unwrap()
        .expect("link closed");
    ProtocolMessage::parse(&line).unwrap()
}

async fn send_line(writer: &mut OwnedWriteHalf, line: &str) {
    writer.write_all(line.as_bytes()).await.unwrap();
    writer.write_all(b"\n").await.unwrap();
}

async fn wait_for_kitchens(reception: &Reception, count: usize) {
    timeout(TEST_TIMEOUT, async {
        while reception.kitchen_count() < count {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("kitchens did not connect in time");
}

#[tokio::test]
async fn test_single_kitchen_cooks_whole_command() {
    let reception = start_reception().await;
    let mut completed = reception.subscribe_completed();

    let kitchen = Kitchen::connect(reception.local_addr(), fast_kitchen(2))
        .await
        .unwrap();
    let kitchen_worker = tokio::spawn(kitchen.run());
    wait_for_kitchens(&reception, 1).await;

    let command = reception.take_order("regina XXL x2; fantasia M x3").unwrap();
    assert_eq!(command.len(), 5);

    let ready = timeout(TEST_TIMEOUT, completed.recv())
        .await
        .expect("command never completed")
        .unwrap();
    assert_eq!(ready.id(), command.id());

    // Completed commands leave no tickets behind.
    assert!(reception.board().get_tickets_of(command.id()).is_empty());
    assert!(reception.pending_commands().is_empty());

    reception.shutdown();
    kitchen_worker.abort();
}

#[tokio::test]
async fn test_commands_spread_over_several_kitchens() {
    let reception = start_reception().await;
    let mut completed = reception.subscribe_completed();

    let mut workers = Vec::new();
    for _ in 0..3 {
        let kitchen = Kitchen::connect(reception.local_addr(), fast_kitchen(1))
            .await
            .unwrap();
        workers.push(tokio::spawn(kitchen.run()));
    }
    wait_for_kitchens(&reception, 3).await;

    let mut expected = HashSet::new();
    for order in ["margarita S x4", "americana L x2", "regina M x1; fantasia XL x1"] {
        expected.insert(reception.take_order(order).unwrap().id());
    }

    let mut ready = HashSet::new();
    while ready.len() < expected.len() {
        let command = timeout(TEST_TIMEOUT, completed.recv())
            .await
            .expect("not every command completed")
            .unwrap();
        // Each command is reported exactly once.
        assert!(ready.insert(command.id()));
    }
    assert_eq!(ready, expected);
    assert!(reception.board().is_empty());

    reception.shutdown();
    for worker in workers {
        worker.abort();
    }
}

#[tokio::test]
async fn test_late_kitchen_picks_up_waiting_tickets() {
    let reception = start_reception().await;
    let mut completed = reception.subscribe_completed();

    // Nobody is around to cook yet.
    let command = reception.take_order("fantasia S x2").unwrap();
    assert_eq!(reception.board().len(), 2);

    let kitchen = Kitchen::connect(reception.local_addr(), fast_kitchen(2))
        .await
        .unwrap();
    let worker = tokio::spawn(kitchen.run());

    let ready = timeout(TEST_TIMEOUT, completed.recv())
        .await
        .expect("late kitchen never cooked")
        .unwrap();
    assert_eq!(ready.id(), command.id());

    reception.shutdown();
    worker.abort();
}

#[tokio::test]
async fn test_rejected_order_leaves_board_untouched() {
    let reception = start_reception().await;

    assert!(reception.take_order("calzone S x1").is_err());
    assert!(reception.take_order("regina S x0").is_err());
    assert!(reception.board().is_empty());
    assert!(reception.pending_commands().is_empty());

    reception.shutdown();
}

#[tokio::test]
async fn test_kitchen_run_ends_when_board_stops() {
    let reception = start_reception().await;
    let kitchen = Kitchen::connect(reception.local_addr(), fast_kitchen(1))
        .await
        .unwrap();
    let board = kitchen.board().clone();
    let worker = tokio::spawn(kitchen.run());
    wait_for_kitchens(&reception, 1).await;

    board.stop();
    let stats = timeout(TEST_TIMEOUT, worker)
        .await
        .expect("kitchen did not stop")
        .unwrap()
        .unwrap();
    assert_eq!(stats.rejected, 0);

    reception.shutdown();
}

#[tokio::test]
async fn test_lost_kitchen_tickets_are_offered_again() {
    let reception = start_reception().await;
    let (mut lost_lines, mut lost_writer) = raw_kitchen(&reception).await;
    wait_for_kitchens(&reception, 1).await;

    let command = reception.take_order("margarita S x1").unwrap();
    let ticket_id = reception.board().get_tickets_of(command.id())[0].id();
    assert_eq!(next_message(&mut lost_lines).await.ticket_id(), ticket_id);

    let request = ProtocolMessage::RequestAssignment { ticket_id };
    send_line(&mut lost_writer, &request.encode()).await;
    let assigned = next_message(&mut lost_lines).await;
    assert!(matches!(
        assigned,
        ProtocolMessage::Assigned { ticket_id: t, .. } if t == ticket_id
    ));
    assert!(reception.board().get_ticket(ticket_id).unwrap().is_in_progress());

    // Joins while the ticket is taken, so it is not part of its catch-up.
    let (mut other_lines, _other_writer) = raw_kitchen(&reception).await;
    wait_for_kitchens(&reception, 2).await;

    drop(lost_lines);
    drop(lost_writer);

    timeout(TEST_TIMEOUT, async {
        while !reception.board().get_ticket(ticket_id).unwrap().is_pending() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("ticket was never requeued");
    assert_eq!(reception.kitchen_count(), 1);

    let offered = next_message(&mut other_lines).await;
    assert!(matches!(
        offered,
        ProtocolMessage::NewTicket { ticket_id: t, pizza_index: 0, .. } if t == ticket_id
    ));

    reception.shutdown();
}

#[tokio::test]
async fn test_kitchen_gives_up_on_unanswered_request() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let mut config = fast_kitchen(1);
    config.request_timeout_ms = 50;

    let worker = tokio::spawn(async move {
        let kitchen = Kitchen::connect(addr, config).await.unwrap();
        kitchen.run().await
    });
    let (stream, _) = listener.accept().await.unwrap();
    let (read_half, mut writer) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    // The assignment of `first` overtakes its announcement, so the kitchen's
    // request for it is never answered.
    let first = TicketId::new();
    let second = TicketId::new();
    let command_id = CommandId::new();
    let script = [
        format!("WELCOME {}", KitchenId::new()),
        ProtocolMessage::Assigned {
            ticket_id: first,
            kitchen: KitchenId::new(),
        }
        .encode(),
        ProtocolMessage::NewTicket {
            ticket_id: first,
            command_id,
            pizza_index: 0,
        }
        .encode(),
        ProtocolMessage::NewTicket {
            ticket_id: second,
            command_id,
            pizza_index: 1,
        }
        .encode(),
    ];
    for line in &script {
        send_line(&mut writer, line).await;
    }

    let wanted = ProtocolMessage::RequestAssignment { ticket_id: second }.encode();
    timeout(TEST_TIMEOUT, async {
        while let Some(line) = lines.next_line().await.unwrap() {
            if line == wanted {
                return;
            }
        }
        panic!("kitchen closed the link");
    })
    .await
    .expect("kitchen never requested the second ticket");

    worker.abort();
}
