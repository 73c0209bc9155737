use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};

use crate::api::client::{DEFAULT_API_ROOT, join_base};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "folio";

pub const DEFAULT_ORIGIN: &str = "http://api.librarysin.ru";
pub const DEFAULT_CELL_WIDTH: f32 = 8.0;
pub const DEFAULT_CELL_HEIGHT: f32 = 16.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_origin")]
    pub origin: String,

    /// Falls back to the build-time root, then `/api`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_root: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,

    /// Pixel size of one terminal cell, used to measure swipes.
    #[serde(default = "default_cell_width")]
    pub cell_width: f32,

    #[serde(default = "default_cell_height")]
    pub cell_height: f32,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_origin() -> String {
    DEFAULT_ORIGIN.to_string()
}

fn default_cell_width() -> f32 {
    DEFAULT_CELL_WIDTH
}

fn default_cell_height() -> f32 {
    DEFAULT_CELL_HEIGHT
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            origin: default_origin(),
            api_root: None,
            state_file: None,
            cell_width: DEFAULT_CELL_WIDTH,
            cell_height: DEFAULT_CELL_HEIGHT,
        }
    }
}

/// API root baked in at build time, if any.
pub fn build_time_api_root() -> Option<&'static str> {
    option_env!("FOLIO_API_BASE_URL").filter(|v| !v.is_empty())
}

impl Settings {
    pub fn effective_api_root(&self) -> String {
        self.api_root
            .clone()
            .filter(|r| !r.is_empty())
            .or_else(|| build_time_api_root().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_API_ROOT.to_string())
    }

    pub fn api_base(&self) -> String {
        join_base(&self.origin, &self.effective_api_root())
    }

    pub fn effective_state_file(&self) -> Option<PathBuf> {
        self.state_file
            .clone()
            .or_else(crate::storage::default_state_path)
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Loads `path` (or the default location) into the global settings, writing
/// a default file when none exists.
pub fn load_settings(path: Option<&Path>) {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match preferred_config_path() {
            Some(path) => path,
            None => {
                warn!("Could not determine config directory, using default settings");
                return;
            }
        },
    };

    if !path.exists() {
        info!("Settings file not found, creating with defaults at {path:?}");
        if let Ok(settings) = SETTINGS.read() {
            save_settings_to_file(&settings, &path);
        }
        return;
    }

    match read_settings(&path) {
        Ok(settings) => {
            debug!("Loaded settings from {path:?}");
            if let Ok(mut global) = SETTINGS.write() {
                *global = settings;
            }
        }
        Err(e) => error!("Failed to load settings file {path:?}: {e:#}"),
    }
}

pub fn read_settings(path: &Path) -> anyhow::Result<Settings> {
    let content = fs::read_to_string(path)?;
    let mut settings: Settings = serde_yaml::from_str(&content)?;
    if settings.version < CURRENT_VERSION {
        info!(
            "Migrating settings from v{} to v{}",
            settings.version, CURRENT_VERSION
        );
        settings.version = CURRENT_VERSION;
    }
    Ok(settings)
}

fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let body = match serde_yaml::to_string(settings) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to encode settings: {e}");
            return;
        }
    };

    match fs::write(path, format!("{SETTINGS_HEADER}{body}")) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

const SETTINGS_HEADER: &str = r#"# folio settings
#
# origin:      scheme and host of the page service
# api_root:    path (or absolute URL) of the API root, e.g. "/api"
# state_file:  where reading positions, notes and preferences are kept
# cell_width / cell_height: pixel size of a terminal cell, used for swipes

"#;

// Public API for accessing settings

pub fn get_settings() -> Settings {
    SETTINGS
        .read()
        .map(|s| s.clone())
        .unwrap_or_default()
}

pub fn set_settings(settings: Settings) {
    if let Ok(mut global) = SETTINGS.write() {
        *global = settings;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_keys_take_defaults() {
        let settings: Settings = serde_yaml::from_str("origin: \"http://example.org\"\n").unwrap();
        assert_eq!(settings.origin, "http://example.org");
        assert_eq!(settings.cell_height, DEFAULT_CELL_HEIGHT);
        assert_eq!(settings.api_root, None);
    }

    #[test]
    fn explicit_api_root_wins() {
        let settings = Settings {
            origin: "http://h/".into(),
            api_root: Some("/v2/".into()),
            ..Settings::default()
        };
        assert_eq!(settings.api_base(), "http://h/v2");
    }

    #[test]
    fn default_api_base_uses_origin() {
        if build_time_api_root().is_some() {
            return;
        }
        assert_eq!(Settings::default().api_base(), "http://api.librarysin.ru/api");
    }

    #[test]
    fn saved_file_reads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("folio").join(SETTINGS_FILENAME);
        let settings = Settings {
            api_root: Some("/api".into()),
            cell_width: 10.0,
            ..Settings::default()
        };
        save_settings_to_file(&settings, &path);
        assert_eq!(read_settings(&path).unwrap(), settings);
    }
}
