/// Fixed-interval detection loop.
///
/// Each tick:
///   1. make sure the recording backend is reachable (may block during an outage)
///   2. read the foreground window and look for a configured game
///   3. on regained focus, wait out the settle delay and skip detection once;
///      focus moving straight to another game first abandons the old attempt
///   4. while focused, capture a frame, classify it and feed the transition engine
///   5. on lost focus, abandon any recording in progress
///   6. sleep for what is left of the tick interval
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::capture::ScreenCapture;
use crate::classifier::classify_phase;
use crate::config::Config;
use crate::engine::TransitionEngine;
use crate::foreground::ForegroundProbe;
use crate::phase::Phase;
use crate::profile::ProfileRegistry;

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No configured game in the foreground.
    Idle,
    /// A game just gained focus; detection resumes next tick.
    Settling,
    /// The focused game lost focus this tick.
    FocusLost,
    /// The frame could not be captured.
    CaptureFailed,
    /// A phase was observed; `transition` is set when it became the stable phase.
    Detected { phase: Phase, transition: Option<Phase> },
}

pub struct Orchestrator {
    registry: ProfileRegistry,
    engine: TransitionEngine,
    probe: Box<dyn ForegroundProbe>,
    capture: Box<dyn ScreenCapture>,
    tolerance: u8,
    tick_interval: Duration,
    focus_settle: Duration,
    /// Name of the game focused on the previous tick.
    focused_game: Option<String>,
}

impl Orchestrator {
    pub fn new(
        config: &Config,
        engine: TransitionEngine,
        probe: Box<dyn ForegroundProbe>,
        capture: Box<dyn ScreenCapture>,
    ) -> Self {
        Self {
            registry: ProfileRegistry::from_config(&config.games),
            engine,
            probe,
            capture,
            tolerance: config.global.pixel_tolerance,
            tick_interval: config.global.tick_interval(),
            focus_settle: config.global.focus_settle(),
            focused_game: None,
        }
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    pub fn engine(&mut self) -> &mut TransitionEngine {
        &mut self.engine
    }

    /// Runs ticks until `shutdown` flips to true (or its sender goes away),
    /// then disconnects from the backend.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            games = self.registry.profiles().len(),
            tick = ?self.tick_interval,
            "Watching for games"
        );

        while !*shutdown.borrow() {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = self.engine.recorder().ensure_connected() => {}
            }

            let started = Instant::now();
            let outcome = self.tick().await;
            debug!(?outcome, "Tick");

            let remaining = self.tick_interval.saturating_sub(started.elapsed());
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = sleep(remaining) => {}
            }
        }

        info!(connected = self.engine.recorder().is_connected(), "Shutting down");
        self.engine.recorder().disconnect().await;
    }

    pub async fn tick(&mut self) -> TickOutcome {
        let context = self.probe.foreground();
        let focused = context
            .as_ref()
            .and_then(|ctx| self.registry.find(&ctx.process_name, &ctx.window_title));

        let Some(profile) = focused else {
            if let Some(game) = self.focused_game.take() {
                info!(%game, "Game lost focus");
                self.engine.handle_focus_lost().await;
                return TickOutcome::FocusLost;
            }
            return TickOutcome::Idle;
        };

        if self.focused_game.as_deref() != Some(profile.name.as_str()) {
            if let Some(previous) = self.focused_game.replace(profile.name.clone()) {
                info!(from = %previous, to = %profile.name, "Focus moved to another game");
                self.engine.handle_game_switch().await;
            }
            info!(game = %profile.name, settle = ?self.focus_settle, "Game focused");
            sleep(self.focus_settle).await;
            return TickOutcome::Settling;
        }

        let frame = match self.capture.capture() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Screen capture failed");
                return TickOutcome::CaptureFailed;
            }
        };

        let phase = classify_phase(profile, &frame, self.tolerance);
        let short_name = profile.file_token();
        let transition = self.engine.update(phase.clone(), &short_name).await;
        self.engine.poll_save(&short_name);
        TickOutcome::Detected { phase, transition }
    }
}
