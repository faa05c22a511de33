//! Background execution unit with start/join/detach semantics.

use std::future::Future;

use tokio::task::{JoinError, JoinHandle};
use tracing::debug;

use super::LinkError;

/// A named background task.
///
/// Nothing is cancelled implicitly: dropping or detaching a worker leaves the
/// task running. Anything the task touches must be owned by it (typically an
/// `Arc<TicketBoard>`), so detaching never leaves it with dangling state.
#[derive(Debug)]
pub struct Worker<T> {
    name: String,
    handle: JoinHandle<T>,
}

impl<T: Send + 'static> Worker<T> {
    /// Spawn `future` on the current tokio runtime.
    pub fn start<F>(name: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        let name = name.into();
        debug!(worker = %name, "Starting worker");
        Self {
            name,
            handle: tokio::spawn(future),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task to finish.
    pub async fn join(self) -> Result<T, LinkError> {
        self.handle.await.map_err(|e| join_error(&self.name, e))
    }

    /// Wait for the task without giving up the handle, e.g. inside `select!`.
    ///
    /// Must not be polled again once it has returned.
    pub async fn wait(&mut self) -> Result<T, LinkError> {
        (&mut self.handle)
            .await
            .map_err(|e| join_error(&self.name, e))
    }

    /// Cancel the task at its next await point. A later `join` reports
    /// `WorkerCancelled` unless the task had already finished.
    pub fn abort(&self) {
        debug!(worker = %self.name, "Aborting worker");
        self.handle.abort();
    }

    /// Give up the ability to join; the task keeps running.
    pub fn detach(self) {
        debug!(worker = %self.name, "Detaching worker");
        drop(self.handle);
    }
}

fn join_error(worker: &str, e: JoinError) -> LinkError {
    if e.is_cancelled() {
        LinkError::WorkerCancelled {
            worker: worker.to_string(),
        }
    } else {
        LinkError::WorkerPanicked {
            worker: worker.to_string(),
            reason: e.to_string(),
        }
    }
}
