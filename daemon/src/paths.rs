/// Canonical file paths for PhaseRec data files.
///
/// Both files live under the platform config directory
/// (`%APPDATA%\PhaseRec\` on Windows):
///   - config.toml   Games, phases and recorder settings, read at startup.
///   - phaserec.log  Mirror of the console log.
use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_DIR_NAME: &str = "PhaseRec";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const LOG_FILE_NAME: &str = "phaserec.log";

/// Returns the PhaseRec application data directory.
pub fn app_data_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Could not determine the user config directory")?;
    Ok(base.join(APP_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_ends_with_app_name() {
        if let Ok(dir) = app_data_dir() {
            assert_eq!(dir.file_name().unwrap(), APP_DIR_NAME);
        }
    }

    #[cfg(windows)]
    #[test]
    fn app_data_dir_is_inside_appdata() {
        let appdata = std::env::var("APPDATA").unwrap();
        assert!(app_data_dir().unwrap().starts_with(&appdata));
    }
}
