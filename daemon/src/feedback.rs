/// Audible cues for recorder state changes.
///
/// Playback is fire-and-forget: a missing file or a failed play is logged and
/// otherwise ignored.
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::SoundConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    /// A fresh recording was requested.
    Start,
    /// An attempt was thrown away, or a save failed.
    Fail,
    /// The last attempt is staged and can be kept.
    Ready,
    /// The last attempt was kept.
    Saved,
}

impl Cue {
    pub fn name(self) -> &'static str {
        match self {
            Cue::Start => "start",
            Cue::Fail => "fail",
            Cue::Ready => "ready",
            Cue::Saved => "saved",
        }
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub trait CuePlayer: Send {
    fn play(&self, cue: Cue);
}

/// Plays the sound files configured in `[sounds]`.
#[derive(Debug, Clone, Default)]
pub struct SoundPlayer {
    sounds: SoundConfig,
}

impl SoundPlayer {
    pub fn new(sounds: &SoundConfig) -> Self {
        Self { sounds: sounds.clone() }
    }

    fn file_for(&self, cue: Cue) -> Option<&PathBuf> {
        match cue {
            Cue::Start => self.sounds.start.as_ref(),
            Cue::Fail => self.sounds.fail.as_ref(),
            Cue::Ready => self.sounds.ready.as_ref(),
            Cue::Saved => self.sounds.saved.as_ref(),
        }
    }
}

impl CuePlayer for SoundPlayer {
    fn play(&self, cue: Cue) {
        let Some(path) = self.file_for(cue) else {
            debug!(%cue, "No sound configured");
            return;
        };
        if !path.is_file() {
            warn!(%cue, path = %path.display(), "Sound file not found");
            return;
        }
        if let Err(e) = imp::play_file(path) {
            warn!(%cue, path = %path.display(), error = %e, "Failed to play sound");
        }
    }
}

#[cfg(windows)]
mod imp {
    use std::os::windows::ffi::OsStrExt;
    use std::path::Path;

    use anyhow::{bail, Result};
    use windows::core::PCWSTR;
    use windows::Win32::Media::Audio::{PlaySoundW, SND_ASYNC, SND_FILENAME, SND_NODEFAULT};

    pub fn play_file(path: &Path) -> Result<()> {
        let wide: Vec<u16> = path.as_os_str().encode_wide().chain(std::iter::once(0)).collect();
        let ok = unsafe { PlaySoundW(PCWSTR(wide.as_ptr()), None, SND_FILENAME | SND_ASYNC | SND_NODEFAULT) };
        if !ok.as_bool() {
            bail!("PlaySoundW returned FALSE");
        }
        Ok(())
    }
}

#[cfg(not(windows))]
mod imp {
    use std::path::Path;

    use anyhow::Result;

    pub fn play_file(path: &Path) -> Result<()> {
        tracing::debug!(path = %path.display(), "Sound playback is only supported on Windows");
        Ok(())
    }
}

/// Resolves a configured sound path relative to `base` when it is not absolute.
pub fn resolve_sounds(sounds: &SoundConfig, base: &Path) -> SoundConfig {
    let resolve = |p: &Option<PathBuf>| {
        p.as_ref().map(|p| if p.is_absolute() { p.clone() } else { base.join(p) })
    };
    SoundConfig {
        start: resolve(&sounds.start),
        fail: resolve(&sounds.fail),
        ready: resolve(&sounds.ready),
        saved: resolve(&sounds.saved),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cue_names_are_symbolic() {
        let names: Vec<_> = [Cue::Start, Cue::Fail, Cue::Ready, Cue::Saved]
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(names, vec!["start", "fail", "ready", "saved"]);
    }

    #[test]
    fn file_for_maps_each_cue() {
        let player = SoundPlayer::new(&SoundConfig {
            start: Some("s.wav".into()),
            fail: None,
            ready: Some("r.wav".into()),
            saved: None,
        });
        assert_eq!(player.file_for(Cue::Start), Some(&PathBuf::from("s.wav")));
        assert_eq!(player.file_for(Cue::Fail), None);
        assert_eq!(player.file_for(Cue::Ready), Some(&PathBuf::from("r.wav")));
    }

    #[test]
    fn missing_or_unconfigured_sounds_do_not_panic() {
        let player = SoundPlayer::new(&SoundConfig {
            start: Some("/definitely/not/here.wav".into()),
            ..SoundConfig::default()
        });
        player.play(Cue::Start);
        player.play(Cue::Saved);
    }

    #[test]
    fn relative_sounds_resolve_against_base() {
        let base = std::env::temp_dir();
        let absolute = base.join("abs.wav");
        let resolved = resolve_sounds(
            &SoundConfig {
                start: Some("sounds/start.wav".into()),
                fail: Some(absolute.clone()),
                ..SoundConfig::default()
            },
            &base,
        );
        assert_eq!(resolved.start, Some(base.join("sounds/start.wav")));
        assert_eq!(resolved.fail, Some(absolute));
        assert_eq!(resolved.ready, None);
    }
}
