//! Reception and kitchen runtimes built on the `plazza-core` ticket board.

pub mod api;
pub mod kitchen;
pub mod metrics;
pub mod reception;
pub mod state;

pub use kitchen::Kitchen;
pub use reception::Reception;
