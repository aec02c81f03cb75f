/// Debounced phase-transition engine.
///
/// Raw per-tick phase labels go into a [`DetectionWindow`]; a transition fires
/// only when the window is full, unanimous, and names a phase different from
/// the current one.  On a transition the phase-entry handler is looked up in a
/// [`TransitionTable`] (exact `(from, to)` pair first, then the wildcard entry
/// for `to`) and run against the recording coordinator.
///
/// Handler failures never escape `update`: the save latch is dropped, the
/// error is logged, and detection carries on with the next tick.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::artifact::{companion_path, kept_clip_name, ArtifactManager};
use crate::capture::ScreenCapture;
use crate::config::GlobalConfig;
use crate::coordinator::RecordingCoordinator;
use crate::debounce::DetectionWindow;
use crate::error::RecorderError;
use crate::feedback::{Cue, CuePlayer};
use crate::hotkey::KeyState;
use crate::phase::Phase;

/// Phase-entry actions the engine knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEntry {
    /// Discard any running attempt, then start a fresh recording.
    Playing,
    /// Stop the attempt and stage it as the last attempt.
    Result,
    /// Discard any running attempt.
    Select,
}

/// Dispatch from a transition to its entry action.
#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    exact: HashMap<(Phase, Phase), PhaseEntry>,
    wildcard: HashMap<Phase, PhaseEntry>,
}

impl TransitionTable {
    /// Wildcard entries for Playing, Result and Select.
    pub fn standard() -> Self {
        let mut table = Self::default();
        table.wildcard.insert(Phase::Playing, PhaseEntry::Playing);
        table.wildcard.insert(Phase::Result, PhaseEntry::Result);
        table.wildcard.insert(Phase::Select, PhaseEntry::Select);
        table
    }

    /// Runs `entry` for the exact transition `from → to`, ahead of any wildcard.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn with_override(mut self, from: Phase, to: Phase, entry: PhaseEntry) -> Self {
        self.exact.insert((from, to), entry);
        self
    }

    pub fn lookup(&self, previous: Option<&Phase>, next: &Phase) -> Option<PhaseEntry> {
        previous
            .and_then(|prev| self.exact.get(&(prev.clone(), next.clone())))
            .or_else(|| self.wildcard.get(next))
            .copied()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionState {
    pub current_phase: Option<Phase>,
    pub previous_phase: Option<Phase>,
    /// Armed by a successful Result entry, consumed by one save.
    pub can_save: bool,
}

pub struct TransitionEngine {
    window: DetectionWindow,
    state: TransitionState,
    table: TransitionTable,
    recorder: RecordingCoordinator,
    artifacts: ArtifactManager,
    cues: Box<dyn CuePlayer>,
    save_key: Box<dyn KeyState>,
    /// Present when result screenshots are enabled.
    screenshots: Option<Box<dyn ScreenCapture>>,
    result_hold: Duration,
}

impl TransitionEngine {
    pub fn new(
        global: &GlobalConfig,
        recorder: RecordingCoordinator,
        cues: Box<dyn CuePlayer>,
        save_key: Box<dyn KeyState>,
        screenshots: Option<Box<dyn ScreenCapture>>,
    ) -> Self {
        Self {
            window: DetectionWindow::new(global.effective_debounce_depth()),
            state: TransitionState::default(),
            table: TransitionTable::standard(),
            recorder,
            artifacts: ArtifactManager::new(global.video_subfolders),
            cues,
            save_key,
            screenshots: if global.capture_screenshot { screenshots } else { None },
            result_hold: global.result_hold(),
        }
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn with_table(mut self, table: TransitionTable) -> Self {
        self.table = table;
        self
    }

    pub fn state(&self) -> &TransitionState {
        &self.state
    }

    pub fn recorder(&mut self) -> &mut RecordingCoordinator {
        &mut self.recorder
    }

    /// Feeds one raw observation. Returns the phase entered when a transition fired.
    pub async fn update(&mut self, raw: Phase, short_name: &str) -> Option<Phase> {
        self.window.push(raw);
        let stable = self.window.stable()?.clone();
        if self.state.current_phase.as_ref() == Some(&stable) {
            return None;
        }

        info!(
            from = phase_label(self.state.current_phase.as_ref()),
            to = %stable,
            "Phase changed"
        );
        self.state.previous_phase = self.state.current_phase.replace(stable.clone());

        if let Some(entry) = self.table.lookup(self.state.previous_phase.as_ref(), &stable) {
            self.state.can_save = false;
            if let Err(e) = self.run_entry(entry, short_name).await {
                self.state.can_save = false;
                error!(phase = %stable, error = %e, "Phase entry failed");
            }
        }
        Some(stable)
    }

    /// Keeps the staged last attempt if the save key is down and a save is armed.
    /// The latch is consumed by the first attempt whether or not the move succeeds.
    pub fn poll_save(&mut self, short_name: &str) -> Option<PathBuf> {
        if !self.state.can_save || !self.save_key.is_pressed() {
            return None;
        }
        self.state.can_save = false;

        let Some(staged) = self.recorder.last_attempt_path().map(Path::to_path_buf) else {
            warn!("Save requested but no last attempt is staged");
            self.cues.play(Cue::Fail);
            return None;
        };

        match self.artifacts.promote(&staged, &kept_clip_name(short_name), short_name) {
            Some(kept) => {
                self.recorder.set_last_attempt(None);
                self.cues.play(Cue::Saved);
                info!(path = %kept.display(), "Saved last attempt");
                Some(kept)
            }
            None => {
                self.cues.play(Cue::Fail);
                None
            }
        }
    }

    /// The game window lost focus: an attempt in progress is abandoned.
    pub async fn handle_focus_lost(&mut self) {
        if !self.recorder.is_recording() {
            return;
        }
        info!("Game lost focus while recording, discarding the attempt");
        if let Err(e) = self.abandon_recording().await {
            error!(error = %e, "Failed to discard recording after focus loss");
        }
    }

    /// Focus moved straight to a different game. The attempt in progress is
    /// abandoned and detection starts over; phases and the staged attempt
    /// belonged to the previous game.
    pub async fn handle_game_switch(&mut self) {
        self.handle_focus_lost().await;
        self.window.clear();
        self.state = TransitionState::default();
    }

    async fn run_entry(&mut self, entry: PhaseEntry, short_name: &str) -> Result<(), RecorderError> {
        match entry {
            PhaseEntry::Playing => self.enter_playing().await,
            PhaseEntry::Result => self.enter_result(short_name).await,
            PhaseEntry::Select => self.enter_select().await,
        }
    }

    async fn enter_playing(&mut self) -> Result<(), RecorderError> {
        if self.recorder.is_recording() {
            self.abandon_recording().await?;
        }
        self.recorder.start().await?;
        self.cues.play(Cue::Start);
        info!("Recording started");
        Ok(())
    }

    async fn enter_result(&mut self, short_name: &str) -> Result<(), RecorderError> {
        if !self.recorder.is_recording() {
            debug!("Result screen without an active recording");
            return Ok(());
        }

        sleep(self.result_hold).await;
        self.recorder.stop_and_wait().await?;

        let timeout = self.recorder.output_path_timeout();
        let Some(output) = self.recorder.await_output_path(timeout).await else {
            warn!(?timeout, "Recorder did not report an output path");
            return Ok(());
        };

        if let Some(capture) = self.screenshots.as_mut() {
            write_screenshot(capture.as_mut(), &output);
        }

        if let Some(staged) = self.artifacts.stage(&output, short_name) {
            self.recorder.set_last_attempt(Some(staged));
            self.state.can_save = true;
            self.cues.play(Cue::Ready);
            info!("Ready to save, press the save key to keep the last attempt");
        }
        Ok(())
    }

    async fn enter_select(&mut self) -> Result<(), RecorderError> {
        if self.recorder.is_recording() {
            self.abandon_recording().await?;
        }
        self.state.can_save = false;
        Ok(())
    }

    /// Stops the running recording, deletes its file and plays the fail cue.
    async fn abandon_recording(&mut self) -> Result<(), RecorderError> {
        self.recorder.stop_and_wait().await?;
        let timeout = self.recorder.output_path_timeout();
        match self.recorder.await_output_path(timeout).await {
            Some(path) => {
                self.artifacts.discard(&path);
            }
            None => warn!("Recorder did not report the abandoned recording's path"),
        }
        self.cues.play(Cue::Fail);
        Ok(())
    }
}

/// Best-effort `<stem>.png` next to `video`.
fn write_screenshot(capture: &mut dyn ScreenCapture, video: &Path) {
    let target = companion_path(video);
    match capture.capture().and_then(|frame| frame.save_png(&target)) {
        Ok(()) => debug!(path = %target.display(), "Saved result screenshot"),
        Err(e) => warn!(error = %format!("{e:#}"), "Could not save result screenshot"),
    }
}

fn phase_label(phase: Option<&Phase>) -> &str {
    phase.map_or("None", Phase::label)
}
