//! Listener that records every event it sees.

use std::sync::{Arc, Mutex};

use crate::board::{TicketBoard, TicketBoardError, TicketEvent, TicketEventType};

/// Records fired events for test assertions.
///
/// # Example
///
/// ```rust,ignore
/// use plazza_core::testing::EventRecorder;
///
/// let recorder = EventRecorder::new();
/// recorder.listen(&board, TicketEventType::Added)?;
///
/// board.receive(&message, None)?;
///
/// assert_eq!(recorder.events().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<TicketEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe this recorder to `event_type` on `board`.
    pub fn listen(
        &self,
        board: &TicketBoard,
        event_type: TicketEventType,
    ) -> Result<(), TicketBoardError> {
        let events = Arc::clone(&self.events);
        board.add_listener(event_type, move |event| {
            events.lock().unwrap().push(event.clone());
        })
    }

    /// Subscribe to every event the board's role supports.
    pub fn listen_all(&self, board: &TicketBoard) {
        for event_type in board.role().supported_events() {
            // Supported by construction.
            let _ = self.listen(board, *event_type);
        }
    }

    /// Events recorded so far, in firing order.
    pub fn events(&self) -> Vec<TicketEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Recorded events of one type.
    pub fn events_of(&self, event_type: TicketEventType) -> Vec<TicketEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}
