//! Testing utilities shared by unit and integration tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use plazza_core::testing::{fixtures, EventRecorder};
//!
//! let board = TicketBoard::new(Role::Master);
//! let recorder = EventRecorder::new();
//! recorder.listen_all(&board);
//!
//! let ids = board.add_command(&fixtures::command(3));
//! ```

mod event_recorder;

pub use event_recorder::EventRecorder;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::order::{Command, Pizza, PizzaSize, PizzaType};

    /// Create a command with `pizzas` items, cycling through the menu.
    pub fn command(pizzas: usize) -> Command {
        let menu: Vec<Pizza> = PizzaType::ALL
            .iter()
            .zip(PizzaSize::ALL.iter().cycle())
            .map(|(t, s)| Pizza::new(*t, *s))
            .collect();
        Command::new(menu.iter().copied().cycle().take(pizzas).collect())
    }

    /// Create a command of identical pizzas.
    pub fn uniform_command(pizza_type: PizzaType, size: PizzaSize, count: usize) -> Command {
        Command::new(vec![Pizza::new(pizza_type, size); count])
    }
}
