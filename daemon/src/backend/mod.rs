//! The recording backend capability the coordinator drives.
//!
//! Requests are fire-and-confirm-later: a successful `request_start` or
//! `request_stop` means the backend accepted the command.  The resulting state
//! change arrives asynchronously as a [`BackendEvent`] on the channel handed
//! to [`RecordingBackend::connect`].

pub mod obs;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::BackendError;
use crate::event::BackendEvent;

#[async_trait]
pub trait RecordingBackend: Send {
    /// Human-readable address used in log lines.
    fn address(&self) -> String;

    /// Opens a fresh connection, replacing any previous one. State changes are
    /// pushed to `events` for as long as the connection lives.
    async fn connect(&mut self, events: mpsc::Sender<BackendEvent>) -> Result<(), BackendError>;

    async fn request_start(&mut self) -> Result<(), BackendError>;

    async fn request_stop(&mut self) -> Result<(), BackendError>;

    /// Lightweight no-op round trip used as a liveness check.
    async fn probe(&mut self) -> Result<(), BackendError>;

    /// Best-effort teardown. Calling it without a live connection is a no-op.
    async fn disconnect(&mut self);
}
