use std::path::PathBuf;

/// Capacity of the queue carrying backend notifications to the coordinator.
pub const EVENT_QUEUE_DEPTH: usize = 32;

/// Notifications pushed by the recording backend, drained by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    /// The backend's recording output changed state. Both fields travel
    /// together so the session never observes one without the other.
    RecordStateChanged {
        active: bool,
        output_path: Option<PathBuf>,
    },
}
