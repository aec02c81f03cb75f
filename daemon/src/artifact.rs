/// Recorded-file bookkeeping: staging the last attempt, promoting it to a kept
/// clip, and discarding interrupted recordings.
///
/// All moves stay inside the recorder's output directory:
///   - staged:  `<output_dir>/lastplay.<ext>` (never subfoldered)
///   - kept:    `<output_dir>/<SHORT>_YYYY-MM-DD_HH-MM-SS.<ext>`, or
///              `<output_dir>/<SHORT>/<SHORT>_YYYY-MM-DD_HH-MM-SS.<ext>` with
///              `video_subfolders` enabled
///
/// A companion screenshot `<stem>.png` travels with its video.
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File stem of the staged last attempt.
pub const LAST_ATTEMPT_NAME: &str = "lastplay";
const COMPANION_EXTENSION: &str = "png";

// ── Path helpers ───────────────────────────────────────────────────────────────

/// Replaces characters that are illegal in Windows path components with `_`.
fn sanitize_component(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c => c,
        })
        .collect()
}

/// Returns the current local time formatted as `YYYY-MM-DD_HH-MM-SS`.
fn local_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// Timestamped name for a kept clip, e.g. `AB_2024-01-01_00-00-00`.
pub fn kept_clip_name(short_name: &str) -> String {
    if short_name.is_empty() {
        local_timestamp()
    } else {
        format!("{short_name}_{}", local_timestamp())
    }
}

/// The screenshot paired with `video`: same directory and stem, `.png`.
pub fn companion_path(video: &Path) -> PathBuf {
    video.with_extension(COMPANION_EXTENSION)
}

// ── Manager ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactManager {
    video_subfolders: bool,
}

impl ArtifactManager {
    pub fn new(video_subfolders: bool) -> Self {
        Self { video_subfolders }
    }

    /// Moves a freshly stopped recording to the last-attempt name.
    /// Returns `None` (logged) when the source is unusable or the move fails.
    pub fn stage(&self, path: &Path, short_name: &str) -> Option<PathBuf> {
        match self.relocate(path, LAST_ATTEMPT_NAME, short_name) {
            Ok(staged) => {
                info!(from = %path.display(), to = %staged.display(), "Staged last attempt");
                Some(staged)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{e:#}"), "Could not stage recording");
                None
            }
        }
    }

    /// Moves the staged last attempt to its permanent name.
    pub fn promote(&self, path: &Path, new_name: &str, short_name: &str) -> Option<PathBuf> {
        match self.relocate(path, new_name, short_name) {
            Ok(kept) => {
                info!(path = %kept.display(), "Kept clip");
                Some(kept)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{e:#}"), "Could not keep clip");
                None
            }
        }
    }

    /// Deletes an interrupted recording and its companion.
    /// Returns whether the video existed and was removed.
    pub fn discard(&self, path: &Path) -> bool {
        let companion = companion_path(path);
        if companion != path && companion.is_file() {
            if let Err(e) = std::fs::remove_file(&companion) {
                warn!(path = %companion.display(), error = %e, "Could not delete screenshot");
            }
        }
        if !path.is_file() {
            debug!(path = %path.display(), "Nothing to discard");
            return false;
        }
        match std::fs::remove_file(path) {
            Ok(()) => {
                info!(path = %path.display(), "Discarded recording");
                true
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not delete recording");
                false
            }
        }
    }

    /// Where `new_name` lands for a source in `output_dir`.
    fn destination_dir(&self, output_dir: &Path, new_name: &str, short_name: &str) -> PathBuf {
        if self.video_subfolders && new_name != LAST_ATTEMPT_NAME && !short_name.is_empty() {
            output_dir.join(sanitize_component(short_name))
        } else {
            output_dir.to_path_buf()
        }
    }

    fn relocate(&self, path: &Path, new_name: &str, short_name: &str) -> Result<PathBuf> {
        if !path.is_absolute() {
            bail!("Recording path is not absolute: {}", path.display());
        }
        if !path.is_file() {
            bail!("Recording not found: {}", path.display());
        }
        let output_dir = path
            .parent()
            .with_context(|| format!("Recording has no parent directory: {}", path.display()))?;

        let dir = self.destination_dir(output_dir, new_name, short_name);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

        let mut file_name = sanitize_component(new_name);
        if let Some(ext) = path.extension() {
            file_name.push('.');
            file_name.push_str(&ext.to_string_lossy());
        }
        let target = dir.join(file_name);

        std::fs::rename(path, &target).with_context(|| {
            format!("Failed to move {} to {}", path.display(), target.display())
        })?;
        move_companion(path, &target);
        Ok(target)
    }
}

/// Moves `<source stem>.png` next to `target`, or clears a stale one there.
fn move_companion(source: &Path, target: &Path) {
    let from = companion_path(source);
    let to = companion_path(target);
    if from == source || to == target || from == to {
        return;
    }

    let result = if from.is_file() {
        std::fs::rename(&from, &to)
    } else if to.is_file() {
        std::fs::remove_file(&to)
    } else {
        return;
    };
    if let Err(e) = result {
        warn!(path = %to.display(), error = %e, "Could not update screenshot");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    // ── path helpers ──────────────────────────────────────────────────────────

    #[test]
    fn local_timestamp_has_correct_format() {
        let ts = local_timestamp();
        assert_eq!(ts.len(), 19, "Unexpected timestamp length: {ts}");
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[7..8], "-");
        assert_eq!(&ts[10..11], "_");
        assert_eq!(&ts[13..14], "-");
        assert_eq!(&ts[16..17], "-");
    }

    #[test]
    fn kept_clip_name_prefixes_short_name() {
        let name = kept_clip_name("AB");
        assert!(name.starts_with("AB_"), "{name}");
        assert_eq!(name.len(), 3 + 19);
        assert_eq!(kept_clip_name("").len(), 19);
    }

    #[test]
    fn sanitize_component_replaces_illegal_characters() {
        let result = sanitize_component(r#"a<b>c:d"e/f\g|h?i*j"#);
        assert_eq!(result, "a_b_c_d_e_f_g_h_i_j");
    }

    #[test]
    fn companion_path_swaps_extension() {
        assert_eq!(companion_path(Path::new("/v/lastplay.mkv")), PathBuf::from("/v/lastplay.png"));
    }

    // ── stage ─────────────────────────────────────────────────────────────────

    #[test]
    fn stage_moves_to_flat_last_attempt_name() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("2024-01-01 10-00-00.mkv");
        write(&source, "video");

        let staged = ArtifactManager::new(true).stage(&source, "AB").unwrap();
        assert_eq!(staged, dir.path().join("lastplay.mkv"));
        assert!(staged.is_file());
        assert!(!source.exists());
    }

    #[test]
    fn stage_replaces_previous_last_attempt() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("lastplay.mkv"), "old");
        let source = dir.path().join("new.mkv");
        write(&source, "new");

        let staged = ArtifactManager::default().stage(&source, "AB").unwrap();
        assert_eq!(std::fs::read_to_string(staged).unwrap(), "new");
    }

    #[test]
    fn stage_missing_file_yields_nothing_every_time() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.mkv");
        let manager = ArtifactManager::default();
        assert!(manager.stage(&missing, "AB").is_none());
        assert!(manager.stage(&missing, "AB").is_none());
    }

    #[test]
    fn stage_relative_path_yields_nothing() {
        assert!(ArtifactManager::default().stage(Path::new("relative.mkv"), "AB").is_none());
    }

    #[test]
    fn stage_carries_companion_screenshot() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("take.mkv");
        write(&source, "video");
        write(&dir.path().join("take.png"), "shot");

        ArtifactManager::default().stage(&source, "AB").unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("lastplay.png")).unwrap(), "shot");
        assert!(!dir.path().join("take.png").exists());
    }

    #[test]
    fn stage_without_companion_clears_stale_screenshot() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("lastplay.png"), "stale");
        let source = dir.path().join("take.mkv");
        write(&source, "video");

        ArtifactManager::default().stage(&source, "AB").unwrap();
        assert!(!dir.path().join("lastplay.png").exists());
    }

    // ── promote ───────────────────────────────────────────────────────────────

    #[test]
    fn promote_with_subfolders_nests_under_short_name() {
        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join("lastplay.mkv");
        write(&staged, "video");
        write(&dir.path().join("lastplay.png"), "shot");

        let kept = ArtifactManager::new(true)
            .promote(&staged, "AB_2024-01-01_00-00-00", "AB")
            .unwrap();
        assert_eq!(kept, dir.path().join("AB").join("AB_2024-01-01_00-00-00.mkv"));
        assert!(kept.is_file());
        assert!(dir.path().join("AB").join("AB_2024-01-01_00-00-00.png").is_file());
        assert!(!staged.exists());
    }

    #[test]
    fn promote_without_subfolders_stays_flat() {
        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join("lastplay.mkv");
        write(&staged, "video");

        let kept = ArtifactManager::new(false)
            .promote(&staged, "AB_2024-01-01_00-00-00", "AB")
            .unwrap();
        assert_eq!(kept, dir.path().join("AB_2024-01-01_00-00-00.mkv"));
    }

    #[test]
    fn promote_with_empty_short_name_stays_flat() {
        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join("lastplay.mp4");
        write(&staged, "video");

        let kept = ArtifactManager::new(true).promote(&staged, "2024-01-01_00-00-00", "").unwrap();
        assert_eq!(kept, dir.path().join("2024-01-01_00-00-00.mp4"));
    }

    #[test]
    fn promote_missing_file_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let result = ArtifactManager::new(true).promote(&dir.path().join("lastplay.mkv"), "AB_x", "AB");
        assert!(result.is_none());
        assert!(!dir.path().join("AB").exists());
    }

    // ── discard ───────────────────────────────────────────────────────────────

    #[test]
    fn discard_removes_video_and_companion() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("take.mkv");
        write(&video, "video");
        write(&dir.path().join("take.png"), "shot");

        assert!(ArtifactManager::default().discard(&video));
        assert!(!video.exists());
        assert!(!dir.path().join("take.png").exists());
    }

    #[test]
    fn discard_missing_file_reports_false() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!ArtifactManager::default().discard(&dir.path().join("nope.mkv")));
    }
}
