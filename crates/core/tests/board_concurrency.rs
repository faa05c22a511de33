//! Concurrent access to a single ticket board.
//!
//! Many threads insert, then many threads remove or complete disjoint tickets;
//! the registry must end up with exactly the tickets nobody removed.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use plazza_core::{
    testing::fixtures, Role, Ticket, TicketBoard, TicketEventType, TicketId,
};

const WRITERS: usize = 8;
const TICKETS_PER_WRITER: usize = 50;

#[test]
fn test_concurrent_add_then_remove_and_complete() {
    let board = TicketBoard::new(Role::Master);
    let command = fixtures::command(TICKETS_PER_WRITER);

    let per_writer: Vec<Vec<Ticket>> = (0..WRITERS)
        .map(|_| {
            (0..TICKETS_PER_WRITER)
                .map(|index| Ticket::new(&command, index))
                .collect()
        })
        .collect();

    thread::scope(|s| {
        for tickets in &per_writer {
            let board = &board;
            s.spawn(move || {
                for ticket in tickets {
                    board.add_ticket(ticket.clone());
                }
            });
        }
    });
    assert_eq!(board.len(), WRITERS * TICKETS_PER_WRITER);

    // Even writers' tickets get removed, odd writers' tickets get completed.
    thread::scope(|s| {
        for (writer, tickets) in per_writer.iter().enumerate() {
            let board = &board;
            s.spawn(move || {
                for ticket in tickets {
                    if writer % 2 == 0 {
                        assert!(board.remove_ticket(ticket.id()).is_some());
                    } else {
                        board.mark_done(ticket.id()).unwrap();
                    }
                }
            });
        }
    });

    let remaining = board.get_tickets();
    let odd_writers = WRITERS / 2;
    assert_eq!(remaining.len(), odd_writers * TICKETS_PER_WRITER);
    assert!(remaining.iter().all(Ticket::is_done));
    assert!(remaining.iter().all(|t| !t.is_in_progress()));

    let ids: HashSet<TicketId> = remaining.iter().map(Ticket::id).collect();
    assert_eq!(ids.len(), remaining.len());

    let expected: HashSet<TicketId> = per_writer
        .iter()
        .enumerate()
        .filter(|(writer, _)| writer % 2 == 1)
        .flat_map(|(_, tickets)| tickets.iter().map(Ticket::id))
        .collect();
    assert_eq!(ids, expected);
}

#[test]
fn test_concurrent_claims_hand_out_each_ticket_once() {
    let board = TicketBoard::new(Role::Master);
    let ids = board.add_command(&fixtures::command(100));
    let claimed = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for id in &ids {
                    if board.try_claim(*id).unwrap() {
                        claimed.fetch_add(1, Ordering::SeqCst);
                    }
                }
            });
        }
    });

    assert_eq!(claimed.load(Ordering::SeqCst), ids.len());
    assert!(board.get_tickets().iter().all(Ticket::is_in_progress));
}

#[test]
fn test_listeners_registered_while_firing() {
    let board = Arc::new(TicketBoard::new(Role::Master));
    let ids = board.add_command(&fixtures::command(20));
    let calls = Arc::new(AtomicUsize::new(0));

    thread::scope(|s| {
        let registering = Arc::clone(&board);
        let calls_for_listeners = Arc::clone(&calls);
        s.spawn(move || {
            for _ in 0..50 {
                let calls = Arc::clone(&calls_for_listeners);
                registering
                    .add_listener(TicketEventType::MarkedAsDone, move |_| {
                        calls.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap();
            }
        });

        let firing = Arc::clone(&board);
        let ids = &ids;
        s.spawn(move || {
            for id in ids {
                firing.mark_done(*id).unwrap();
                firing
                    .fire(TicketEventType::MarkedAsDone, *id, None)
                    .unwrap();
            }
        });
    });

    // Every fire saw some prefix of the 50 listeners.
    assert!(calls.load(Ordering::SeqCst) <= 50 * ids.len());

    calls.store(0, Ordering::SeqCst);
    board
        .fire(TicketEventType::MarkedAsDone, ids[0], None)
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 50);
}
