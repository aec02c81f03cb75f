use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MIN_DEBOUNCE_DEPTH: usize = 1;
pub const MAX_DEBOUNCE_DEPTH: usize = 16;
pub const DEFAULT_DEBOUNCE_DEPTH: usize = 2;
pub const DEFAULT_SAVE_KEY: &str = "k";
pub const DEFAULT_RESULT_HOLD_SECS: f64 = 3.0;
pub const DEFAULT_PIXEL_TOLERANCE: u8 = 15;
pub const DEFAULT_TICK_INTERVAL_SECS: f64 = 0.5;
pub const DEFAULT_FOCUS_SETTLE_SECS: f64 = 1.0;

pub const DEFAULT_RECORDER_HOST: &str = "localhost";
pub const DEFAULT_RECORDER_PORT: u16 = 4455;
pub const DEFAULT_RECONNECT_BACKOFF_SECS: f64 = 3.0;
pub const DEFAULT_STOP_TIMEOUT_SECS: f64 = 3.0;
pub const DEFAULT_STOP_POLL_SECS: f64 = 0.25;
pub const DEFAULT_OUTPUT_PATH_TIMEOUT_SECS: f64 = 3.0;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: f64 = 5.0;

/// One probe of a signature group as written in the config: `[x, y, r, g, b]`.
pub type PixelSpec = (u32, u32, u8, u8, u8);

/// Root configuration structure, deserialized once at startup from config.toml.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
    #[serde(default)]
    pub sounds: SoundConfig,
    #[serde(default)]
    pub games: Vec<GameConfig>,
}

/// Detection and save behavior shared by every game.
#[derive(Debug, Deserialize, Clone)]
pub struct GlobalConfig {
    /// Key name that keeps the last attempt (e.g. "k", "F9").
    #[serde(default = "default_save_key")]
    pub save_key: String,
    /// Put kept clips under a per-game subfolder named after the game's shortname.
    #[serde(default)]
    pub video_subfolders: bool,
    /// Write a PNG of the result screen next to the staged recording.
    #[serde(default)]
    pub capture_screenshot: bool,
    /// How long to keep recording after the result screen appears.
    #[serde(default = "default_result_hold")]
    pub result_hold_secs: f64,
    /// Consecutive identical observations required before a phase change. Clamped to [1, 16].
    #[serde(default = "default_debounce_depth")]
    pub debounce_depth: usize,
    /// Maximum per-channel difference for a pixel to count as matching.
    #[serde(default = "default_pixel_tolerance")]
    pub pixel_tolerance: u8,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: f64,
    /// Pause after a game window regains focus before detection resumes.
    #[serde(default = "default_focus_settle")]
    pub focus_settle_secs: f64,
    #[serde(default)]
    pub debug: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            save_key: DEFAULT_SAVE_KEY.to_string(),
            video_subfolders: false,
            capture_screenshot: false,
            result_hold_secs: DEFAULT_RESULT_HOLD_SECS,
            debounce_depth: DEFAULT_DEBOUNCE_DEPTH,
            pixel_tolerance: DEFAULT_PIXEL_TOLERANCE,
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
            focus_settle_secs: DEFAULT_FOCUS_SETTLE_SECS,
            debug: false,
        }
    }
}

impl GlobalConfig {
    pub fn effective_debounce_depth(&self) -> usize {
        self.debounce_depth.clamp(MIN_DEBOUNCE_DEPTH, MAX_DEBOUNCE_DEPTH)
    }

    pub fn result_hold(&self) -> Duration {
        secs(self.result_hold_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        secs(self.tick_interval_secs)
    }

    pub fn focus_settle(&self) -> Duration {
        secs(self.focus_settle_secs)
    }
}

/// Connection and timing settings for the OBS WebSocket recording backend.
#[derive(Debug, Deserialize, Clone)]
pub struct RecorderConfig {
    #[serde(default = "default_recorder_host")]
    pub host: String,
    #[serde(default = "default_recorder_port")]
    pub port: u16,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_reconnect_backoff")]
    pub reconnect_backoff_secs: f64,
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: f64,
    #[serde(default = "default_stop_poll")]
    pub stop_poll_secs: f64,
    #[serde(default = "default_output_path_timeout")]
    pub output_path_timeout_secs: f64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: f64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RECORDER_HOST.to_string(),
            port: DEFAULT_RECORDER_PORT,
            password: String::new(),
            reconnect_backoff_secs: DEFAULT_RECONNECT_BACKOFF_SECS,
            stop_timeout_secs: DEFAULT_STOP_TIMEOUT_SECS,
            stop_poll_secs: DEFAULT_STOP_POLL_SECS,
            output_path_timeout_secs: DEFAULT_OUTPUT_PATH_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl RecorderConfig {
    /// WebSocket URL of the backend, e.g. `ws://localhost:4455`.
    pub fn address(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        secs(self.reconnect_backoff_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        secs(self.stop_timeout_secs)
    }

    pub fn stop_poll(&self) -> Duration {
        secs(self.stop_poll_secs)
    }

    pub fn output_path_timeout(&self) -> Duration {
        secs(self.output_path_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        secs(self.request_timeout_secs)
    }
}

/// Optional sound files for each feedback cue.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SoundConfig {
    pub start: Option<PathBuf>,
    pub fail: Option<PathBuf>,
    pub ready: Option<PathBuf>,
    pub saved: Option<PathBuf>,
}

/// A trackable game and the pixel signatures of its phases.
#[derive(Debug, Deserialize, Clone)]
pub struct GameConfig {
    pub name: String,
    /// Executable name(s); a leading `*` matches by suffix.
    pub processes: ProcessNames,
    /// Substring that must appear in the window title. Empty matches any title.
    #[serde(default)]
    pub title: String,
    /// Short token used in kept clip filenames and subfolders.
    #[serde(default)]
    pub shortname: String,
    /// Phases in evaluation order.
    #[serde(default)]
    pub phases: Vec<PhaseConfig>,
}

/// Accepts either `processes = "game.exe"` or `processes = ["a.exe", "b.exe"]`.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum ProcessNames {
    One(String),
    Many(Vec<String>),
}

impl ProcessNames {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            ProcessNames::One(name) => vec![name.clone()],
            ProcessNames::Many(names) => names.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PhaseConfig {
    pub name: String,
    /// Signature groups; each is a list of `[x, y, r, g, b]` probes.
    pub groups: Vec<Vec<PixelSpec>>,
}

impl Config {
    /// Rejects game entries the classifier could never use safely and
    /// durations too large to represent.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in self.durations() {
            if value.is_finite() && value > 0.0 && Duration::try_from_secs_f64(value).is_err() {
                bail!("{name} = {value} is too large");
            }
        }
        for game in &self.games {
            if game.processes.to_vec().iter().all(|p| p.trim().is_empty()) {
                bail!("Game '{}' has no process names", game.name);
            }
            for phase in &game.phases {
                if phase.groups.is_empty() {
                    bail!("Game '{}' phase '{}' has no signature groups", game.name, phase.name);
                }
                if phase.groups.iter().any(|g| g.is_empty()) {
                    bail!("Game '{}' phase '{}' has an empty signature group", game.name, phase.name);
                }
            }
        }
        Ok(())
    }

    fn durations(&self) -> [(&'static str, f64); 8] {
        let (g, r) = (&self.global, &self.recorder);
        [
            ("global.result_hold_secs", g.result_hold_secs),
            ("global.tick_interval_secs", g.tick_interval_secs),
            ("global.focus_settle_secs", g.focus_settle_secs),
            ("recorder.reconnect_backoff_secs", r.reconnect_backoff_secs),
            ("recorder.stop_timeout_secs", r.stop_timeout_secs),
            ("recorder.stop_poll_secs", r.stop_poll_secs),
            ("recorder.output_path_timeout_secs", r.output_path_timeout_secs),
            ("recorder.request_timeout_secs", r.request_timeout_secs),
        ]
    }
}

/// Loads and validates the config file at `path`.
/// A missing, unreadable, malformed or invalid file is an error.
pub fn load(path: &Path) -> Result<Config> {
    if !path.exists() {
        bail!("Config file not found: {}", path.display());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config file: {}", path.display()))?;
    Ok(config)
}

/// Negative and non-finite values collapse to zero; `validate` rejects
/// values too large for a `Duration`.
fn secs(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
    } else {
        Duration::ZERO
    }
}

fn default_save_key() -> String {
    DEFAULT_SAVE_KEY.to_string()
}

fn default_result_hold() -> f64 {
    DEFAULT_RESULT_HOLD_SECS
}

fn default_debounce_depth() -> usize {
    DEFAULT_DEBOUNCE_DEPTH
}

fn default_pixel_tolerance() -> u8 {
    DEFAULT_PIXEL_TOLERANCE
}

fn default_tick_interval() -> f64 {
    DEFAULT_TICK_INTERVAL_SECS
}

fn default_focus_settle() -> f64 {
    DEFAULT_FOCUS_SETTLE_SECS
}

fn default_recorder_host() -> String {
    DEFAULT_RECORDER_HOST.to_string()
}

fn default_recorder_port() -> u16 {
    DEFAULT_RECORDER_PORT
}

fn default_reconnect_backoff() -> f64 {
    DEFAULT_RECONNECT_BACKOFF_SECS
}

fn default_stop_timeout() -> f64 {
    DEFAULT_STOP_TIMEOUT_SECS
}

fn default_stop_poll() -> f64 {
    DEFAULT_STOP_POLL_SECS
}

fn default_output_path_timeout() -> f64 {
    DEFAULT_OUTPUT_PATH_TIMEOUT_SECS
}

fn default_request_timeout() -> f64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}
