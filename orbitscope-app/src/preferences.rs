use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use orbitscope_core::{EvaluationOptions, ScreenSize};
use orbitscope_render::DEFAULT_NR_OF_BLOCKS;

use crate::error::SessionError;

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

/// Engine defaults persisted between runs. Every field falls back to its
/// default when missing, so older files keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    /// Worker threads; 0 uses the machine's available parallelism.
    #[serde(default)]
    pub nr_of_threads: usize,
    #[serde(default = "default_nr_of_blocks")]
    pub nr_of_blocks: usize,
    #[serde(default)]
    pub advanced_statistics: bool,
    #[serde(default)]
    pub invert_y: bool,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

fn default_nr_of_blocks() -> usize {
    DEFAULT_NR_OF_BLOCKS
}
fn default_width() -> u32 {
    800
}
fn default_height() -> u32 {
    600
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            nr_of_threads: 0,
            nr_of_blocks: default_nr_of_blocks(),
            advanced_statistics: false,
            invert_y: false,
            width: default_width(),
            height: default_height(),
        }
    }
}

impl Preferences {
    /// Load preferences from the platform config directory, falling back
    /// to defaults.
    pub fn load() -> Self {
        Self::load_or_default(&config_path())
    }

    /// Load from `path`; a missing or invalid file yields defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            debug!("No preferences file at {}", path.display());
            return Self::default();
        }
        match Self::load_from(path) {
            Ok(prefs) => {
                info!("Loaded preferences from {}", path.display());
                prefs
            }
            Err(e) => {
                warn!("Ignoring preferences file: {e}");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> crate::Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| SessionError::io(path, e))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Persist to the platform config directory.
    pub fn save(&self) -> crate::Result<()> {
        self.save_to(&config_path())
    }

    pub fn save_to(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| SessionError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| SessionError::io(path, e))?;
        debug!("Saved preferences to {}", path.display());
        Ok(())
    }

    pub fn screen(&self) -> crate::Result<ScreenSize> {
        Ok(ScreenSize::new(self.width, self.height)?)
    }

    pub fn evaluation_options(&self) -> EvaluationOptions {
        EvaluationOptions {
            advanced_statistics: self.advanced_statistics,
            invert_y: self.invert_y,
        }
    }
}

/// `preferences.json` in the platform config directory, or next to the
/// executable when the platform reports none.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "", "Orbitscope")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(exe_directory)
        .join("preferences.json")
}

fn exe_directory() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("orbitscope_prefs_{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn missing_fields_take_defaults() {
        let prefs: Preferences = serde_json::from_str(r#"{"nr_of_threads": 3}"#).unwrap();
        assert_eq!(prefs.nr_of_threads, 3);
        assert_eq!(prefs.nr_of_blocks, DEFAULT_NR_OF_BLOCKS);
        assert_eq!((prefs.width, prefs.height), (800, 600));
    }

    #[test]
    fn save_then_load() {
        let path = temp_path("save_then_load.json");
        let prefs = Preferences {
            nr_of_threads: 2,
            nr_of_blocks: 17,
            advanced_statistics: true,
            invert_y: true,
            width: 320,
            height: 200,
        };
        prefs.save_to(&path).unwrap();
        assert_eq!(Preferences::load_or_default(&path), prefs);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let path = temp_path("invalid.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Preferences::load_or_default(&path), Preferences::default());
        assert!(Preferences::load_from(&path).is_err());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = temp_path("does_not_exist.json");
        assert_eq!(Preferences::load_or_default(&path), Preferences::default());
    }

    #[test]
    fn config_path_names_the_file() {
        assert!(config_path().ends_with("preferences.json"));
    }
}
