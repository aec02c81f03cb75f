/// Recording coordinator: the single owner of the backend connection and of
/// the [`RecordingSession`] the rest of the daemon reads.
///
/// Backend state changes arrive on an mpsc queue and are applied whenever the
/// coordinator is consulted, so callers always see the latest state the
/// backend has reported without holding any lock.
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::backend::RecordingBackend;
use crate::config::RecorderConfig;
use crate::error::RecorderError;
use crate::event::{BackendEvent, EVENT_QUEUE_DEPTH};

/// Lower bound on the polling sub-interval so a zero setting cannot spin.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Backend-reported recording state plus the staged last attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingSession {
    pub is_recording: bool,
    pub current_output_path: Option<PathBuf>,
    pub last_attempt_path: Option<PathBuf>,
}

pub struct RecordingCoordinator {
    backend: Box<dyn RecordingBackend>,
    events_tx: mpsc::Sender<BackendEvent>,
    events_rx: mpsc::Receiver<BackendEvent>,
    session: RecordingSession,
    connected: bool,
    reconnect_backoff: Duration,
    stop_timeout: Duration,
    stop_poll: Duration,
    output_path_timeout: Duration,
}

impl RecordingCoordinator {
    pub fn new(backend: Box<dyn RecordingBackend>, config: &RecorderConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        Self {
            backend,
            events_tx,
            events_rx,
            session: RecordingSession::default(),
            connected: false,
            reconnect_backoff: config.reconnect_backoff(),
            stop_timeout: config.stop_timeout(),
            stop_poll: config.stop_poll().max(MIN_POLL_INTERVAL),
            output_path_timeout: config.output_path_timeout(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Snapshot of the session after applying every queued backend event.
    pub fn session(&mut self) -> &RecordingSession {
        self.drain_events();
        &self.session
    }

    pub fn is_recording(&mut self) -> bool {
        self.session().is_recording
    }

    pub fn last_attempt_path(&self) -> Option<&Path> {
        self.session.last_attempt_path.as_deref()
    }

    pub fn set_last_attempt(&mut self, path: Option<PathBuf>) {
        self.session.last_attempt_path = path;
    }

    pub fn output_path_timeout(&self) -> Duration {
        self.output_path_timeout
    }

    /// Returns once the backend is reachable.
    ///
    /// A connected backend is probed first; a failed probe starts an outage.
    /// During an outage connection attempts repeat every `reconnect_backoff`
    /// with a single warning for the whole outage.  Queued backend events are
    /// applied first, so the queue empties every tick even while idle.
    pub async fn ensure_connected(&mut self) {
        self.drain_events();
        let address = self.backend.address();
        let mut outage_logged = false;

        if self.connected {
            match self.backend.probe().await {
                Ok(()) => return,
                Err(e) => {
                    warn!(%address, error = %e, "Lost connection to recording backend");
                    self.connected = false;
                    outage_logged = true;
                }
            }
        }

        loop {
            match self.backend.connect(self.events_tx.clone()).await {
                Ok(()) => {
                    self.connected = true;
                    self.drain_events();
                    info!(%address, recording = self.session.is_recording, "Connected to recording backend");
                    return;
                }
                Err(e) if outage_logged => {
                    debug!(%address, error = %e, "Recording backend still unavailable");
                }
                Err(e) => {
                    warn!(
                        %address,
                        error = %e,
                        retry_in = ?self.reconnect_backoff,
                        "Recording backend unavailable, retrying until it comes back"
                    );
                    outage_logged = true;
                }
            }
            sleep(self.reconnect_backoff).await;
        }
    }

    /// Asks the backend to start recording. Success means the request was accepted.
    pub async fn start(&mut self) -> Result<(), RecorderError> {
        self.ensure_connected().await;
        self.drain_events();
        self.session.current_output_path = None;
        self.backend.request_start().await?;
        Ok(())
    }

    /// Asks the backend to stop recording. Success means the request was accepted.
    pub async fn stop(&mut self) -> Result<(), RecorderError> {
        self.ensure_connected().await;
        self.backend.request_stop().await?;
        Ok(())
    }

    /// `stop` followed by `await_stopped` with the configured timeout.
    pub async fn stop_and_wait(&mut self) -> Result<(), RecorderError> {
        self.stop().await?;
        self.await_stopped(self.stop_timeout).await
    }

    /// Polls until the backend reports recording inactive or `timeout` elapses.
    /// The stop request itself is never cancelled.
    pub async fn await_stopped(&mut self, timeout: Duration) -> Result<(), RecorderError> {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.is_recording() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(RecorderError::StopTimeout(timeout));
            }
            sleep(self.stop_poll).await;
        }
    }

    /// Waits up to `timeout` for the backend to report an output path.
    pub async fn await_output_path(&mut self, timeout: Duration) -> Option<PathBuf> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(path) = self.session().current_output_path.clone() {
                return Some(path);
            }
            if Instant::now() >= deadline {
                return None;
            }
            sleep(self.stop_poll).await;
        }
    }

    /// Best-effort teardown; safe to call repeatedly.
    pub async fn disconnect(&mut self) {
        self.backend.disconnect().await;
        if self.connected {
            info!(address = %self.backend.address(), "Disconnected from recording backend");
        }
        self.connected = false;
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply(event);
        }
    }

    fn apply(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::RecordStateChanged { active, output_path } => {
                debug!(active, path = ?output_path, "Recording state changed");
                self.session.is_recording = active;
                if output_path.is_some() {
                    self.session.current_output_path = output_path;
                }
            }
        }
    }
}
