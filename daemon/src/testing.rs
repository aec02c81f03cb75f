//! In-process fakes for the daemon's external collaborators.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::backend::RecordingBackend;
use crate::capture::{Frame, Rgb, ScreenCapture};
use crate::error::BackendError;
use crate::event::BackendEvent;
use crate::feedback::{Cue, CuePlayer};
use crate::foreground::{ForegroundContext, ForegroundProbe};
use crate::hotkey::KeyState;

pub const FRAME_SIZE: u32 = 32;

/// A `FRAME_SIZE`² black frame with the given pixels painted in.
pub fn frame_with(points: &[(u32, u32, Rgb)]) -> Frame {
    let mut rgba = vec![0u8; (FRAME_SIZE * FRAME_SIZE * 4) as usize];
    for &(x, y, c) in points {
        let offset = ((y * FRAME_SIZE + x) * 4) as usize;
        rgba[offset..offset + 4].copy_from_slice(&[c.r, c.g, c.b, 255]);
    }
    Frame { width: FRAME_SIZE, height: FRAME_SIZE, rgba }
}

// ── Recording backend ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct FakeBackendState {
    pub connect_calls: usize,
    pub start_calls: usize,
    pub stop_calls: usize,
    pub probe_calls: usize,
    pub disconnect_calls: usize,
    pub connect_failures_remaining: usize,
    pub probe_failures_remaining: usize,
    /// When false, stop requests are accepted but recording never ends.
    pub confirm_stop: bool,
    /// Whether start / stop events carry the output path.
    pub report_start_path: bool,
    pub report_stop_path: bool,
    pub recording: bool,
    pub current_file: Option<PathBuf>,
    pub files_written: Vec<PathBuf>,
    events: Option<mpsc::Sender<BackendEvent>>,
}

impl Default for FakeBackendState {
    fn default() -> Self {
        Self {
            connect_calls: 0,
            start_calls: 0,
            stop_calls: 0,
            probe_calls: 0,
            disconnect_calls: 0,
            connect_failures_remaining: 0,
            probe_failures_remaining: 0,
            confirm_stop: true,
            report_start_path: true,
            report_stop_path: true,
            recording: false,
            current_file: None,
            files_written: Vec::new(),
            events: None,
        }
    }
}

impl FakeBackendState {
    /// Pushes a state change as the backend would. False when it was not queued.
    pub fn emit(&self, active: bool, output_path: Option<PathBuf>) -> bool {
        self.events
            .as_ref()
            .is_some_and(|events| events.try_send(BackendEvent::RecordStateChanged { active, output_path }).is_ok())
    }
}

/// Writes a real file into `output_dir` for every recording it starts.
#[derive(Clone)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeBackendState>>,
    output_dir: PathBuf,
}

impl FakeBackend {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeBackendState::default())),
            output_dir: output_dir.to_path_buf(),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, FakeBackendState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl RecordingBackend for FakeBackend {
    fn address(&self) -> String {
        "fake://recorder".to_string()
    }

    async fn connect(&mut self, events: mpsc::Sender<BackendEvent>) -> Result<(), BackendError> {
        let mut s = self.state();
        s.connect_calls += 1;
        if s.connect_failures_remaining > 0 {
            s.connect_failures_remaining -= 1;
            return Err(BackendError::Connect {
                address: "fake://recorder".to_string(),
                reason: "connection refused".to_string(),
            });
        }
        s.events = Some(events);
        let recording = s.recording;
        s.emit(recording, None);
        Ok(())
    }

    async fn request_start(&mut self) -> Result<(), BackendError> {
        let mut s = self.state();
        if s.events.is_none() {
            return Err(BackendError::Closed);
        }
        s.start_calls += 1;
        let path = self.output_dir.join(format!("take{}.mkv", s.files_written.len() + 1));
        std::fs::write(&path, b"video").unwrap();
        s.recording = true;
        s.current_file = Some(path.clone());
        s.files_written.push(path.clone());
        let reported = s.report_start_path.then_some(path);
        s.emit(true, reported);
        Ok(())
    }

    async fn request_stop(&mut self) -> Result<(), BackendError> {
        let mut s = self.state();
        if s.events.is_none() {
            return Err(BackendError::Closed);
        }
        s.stop_calls += 1;
        if !s.recording {
            return Err(BackendError::Request {
                request: "StopRecord".to_string(),
                code: 501,
                comment: Some("Output not active".to_string()),
            });
        }
        if s.confirm_stop {
            s.recording = false;
            let reported = if s.report_stop_path { s.current_file.clone() } else { None };
            s.emit(false, reported);
        }
        Ok(())
    }

    async fn probe(&mut self) -> Result<(), BackendError> {
        let mut s = self.state();
        s.probe_calls += 1;
        if s.probe_failures_remaining > 0 {
            s.probe_failures_remaining -= 1;
            s.events = None;
            return Err(BackendError::Closed);
        }
        if s.events.is_none() {
            return Err(BackendError::Closed);
        }
        Ok(())
    }

    async fn disconnect(&mut self) {
        let mut s = self.state();
        s.disconnect_calls += 1;
        s.events = None;
    }
}

// ── Cues ──────────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingCues {
    played: Arc<Mutex<Vec<Cue>>>,
}

impl RecordingCues {
    pub fn played(&self) -> Vec<Cue> {
        self.played.lock().unwrap().clone()
    }

    pub fn count(&self, cue: Cue) -> usize {
        self.played().iter().filter(|&&c| c == cue).count()
    }
}

impl CuePlayer for RecordingCues {
    fn play(&self, cue: Cue) {
        self.played.lock().unwrap().push(cue);
    }
}

// ── Save key ──────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct ToggleKey {
    pressed: Arc<AtomicBool>,
}

impl ToggleKey {
    pub fn set(&self, pressed: bool) {
        self.pressed.store(pressed, Ordering::SeqCst);
    }
}

impl KeyState for ToggleKey {
    fn is_pressed(&self) -> bool {
        self.pressed.load(Ordering::SeqCst)
    }
}

// ── Screen capture ────────────────────────────────────────────────────────────

/// Returns whatever frame was last set; errors when none is set.
#[derive(Clone, Default)]
pub struct FixedCapture {
    frame: Arc<Mutex<Option<Frame>>>,
}

impl FixedCapture {
    pub fn new(frame: Frame) -> Self {
        let capture = Self::default();
        capture.set(Some(frame));
        capture
    }

    pub fn set(&self, frame: Option<Frame>) {
        *self.frame.lock().unwrap() = frame;
    }
}

impl ScreenCapture for FixedCapture {
    fn capture(&mut self) -> Result<Frame> {
        match self.frame.lock().unwrap().clone() {
            Some(frame) => Ok(frame),
            None => bail!("no frame available"),
        }
    }
}

// ── Foreground probe ──────────────────────────────────────────────────────────

/// Replays a fixed script of foreground contexts, repeating the last one.
pub struct ScriptedProbe {
    script: VecDeque<Option<ForegroundContext>>,
    last: Option<ForegroundContext>,
}

impl ScriptedProbe {
    pub fn new(script: Vec<Option<ForegroundContext>>) -> Self {
        Self { script: script.into(), last: None }
    }
}

impl ForegroundProbe for ScriptedProbe {
    fn foreground(&mut self) -> Option<ForegroundContext> {
        if let Some(next) = self.script.pop_front() {
            self.last = next;
        }
        self.last.clone()
    }
}
