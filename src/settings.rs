use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use once_cell::sync::Lazy;

use crate::reader::ReadingDirection;
use crate::reader::split::SplitPreference;

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = ".tankobon_settings.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalingOption {
    Automatic,
    FitToHeight,
    FitToWidth,
    Original,
}

/// How the rendered page is fitted into the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FittingOption {
    Height,
    Width,
    Original,
}

/// Resolve the automatic scaling choice against the viewport shape:
/// portrait viewports fit to width, landscape ones to height.
pub fn fitting_for_viewport(option: ScalingOption, width: u32, height: u32) -> FittingOption {
    match option {
        ScalingOption::Automatic => {
            if height > width {
                FittingOption::Width
            } else {
                FittingOption::Height
            }
        }
        ScalingOption::FitToHeight => FittingOption::Height,
        ScalingOption::FitToWidth => FittingOption::Width,
        ScalingOption::Original => FittingOption::Original,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_server_url")]
    pub server_url: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,

    #[serde(default = "default_reading_direction")]
    pub reading_direction: ReadingDirection,

    #[serde(default = "default_page_split")]
    pub page_split: SplitPreference,

    #[serde(default = "default_scaling")]
    pub scaling: ScalingOption,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_server_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_reading_direction() -> ReadingDirection {
    ReadingDirection::LeftToRight
}

fn default_page_split() -> SplitPreference {
    SplitPreference::SplitRightToLeft
}

fn default_scaling() -> ScalingOption {
    ScalingOption::FitToHeight
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            server_url: default_server_url(),
            api_key: String::new(),
            reading_direction: default_reading_direction(),
            page_split: default_page_split(),
            scaling: default_scaling(),
        }
    }
}

static SETTINGS: Lazy<RwLock<Settings>> = Lazy::new(|| RwLock::new(Settings::default()));

fn settings_path() -> Option<PathBuf> {
    home::home_dir().map(|home| home.join(SETTINGS_FILENAME))
}

pub fn load_settings() {
    let Some(path) = settings_path() else {
        warn!("Could not determine home directory, using default settings");
        return;
    };

    if !path.exists() {
        info!("Settings file not found at {path:?}, creating with defaults");
        if let Ok(settings) = SETTINGS.read() {
            save_settings_to_file(&settings, &path);
        }
        return;
    }

    match read_settings_from(&path) {
        Ok(mut settings) => {
            debug!("Loaded settings from {path:?}");

            // Run migrations if needed
            if settings.version < CURRENT_VERSION {
                migrate_settings(&mut settings);
                save_settings_to_file(&settings, &path);
            }

            if let Ok(mut global) = SETTINGS.write() {
                *global = settings;
            }
        }
        Err(e) => {
            error!("Failed to load settings: {e:#}");
        }
    }
}

fn read_settings_from(path: &Path) -> Result<Settings> {
    let content = fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
    serde_yaml::from_str(&content).with_context(|| format!("parsing {path:?}"))
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    // Future migrations go here:
    // if settings.version < 2 {
    //     migrate_v1_to_v2(settings);
    // }

    settings.version = CURRENT_VERSION;
}

pub fn save_settings() {
    let Some(path) = settings_path() else {
        warn!("Could not determine home directory, cannot save settings");
        return;
    };

    if let Ok(settings) = SETTINGS.read() {
        save_settings_to_file(&settings, &path);
    }
}

fn save_settings_to_file(settings: &Settings, path: &Path) {
    match serde_yaml::to_string(settings) {
        Ok(content) => {
            if let Err(e) = fs::write(path, content) {
                error!("Failed to write settings file {path:?}: {e}");
            }
        }
        Err(e) => {
            error!("Failed to serialize settings: {e}");
        }
    }
}

pub fn server_url() -> String {
    SETTINGS
        .read()
        .map(|s| s.server_url.clone())
        .unwrap_or_else(|_| default_server_url())
}

pub fn api_key() -> String {
    SETTINGS
        .read()
        .map(|s| s.api_key.clone())
        .unwrap_or_default()
}

pub fn reading_direction() -> ReadingDirection {
    SETTINGS
        .read()
        .map(|s| s.reading_direction)
        .unwrap_or_else(|_| default_reading_direction())
}

pub fn set_reading_direction(direction: ReadingDirection) {
    if let Ok(mut settings) = SETTINGS.write() {
        settings.reading_direction = direction;
    }
}

pub fn page_split_option() -> SplitPreference {
    SETTINGS
        .read()
        .map(|s| s.page_split)
        .unwrap_or_else(|_| default_page_split())
}

pub fn set_page_split_option(preference: SplitPreference) {
    if let Ok(mut settings) = SETTINGS.write() {
        settings.page_split = preference;
    }
}

pub fn scaling_option() -> ScalingOption {
    SETTINGS
        .read()
        .map(|s| s.scaling)
        .unwrap_or_else(|_| default_scaling())
}

pub fn set_scaling_option(option: ScalingOption) {
    if let Ok(mut settings) = SETTINGS.write() {
        settings.scaling = option;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_round_trip_through_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");

        let mut settings = Settings::default();
        settings.api_key = "abc-123".to_string();
        settings.reading_direction = ReadingDirection::RightToLeft;
        settings.page_split = SplitPreference::SplitLeftToRight;
        save_settings_to_file(&settings, &path);

        let loaded = read_settings_from(&path).unwrap();
        assert_eq!(loaded.api_key, "abc-123");
        assert_eq!(loaded.reading_direction, ReadingDirection::RightToLeft);
        assert_eq!(loaded.page_split, SplitPreference::SplitLeftToRight);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "version: 1\n").unwrap();

        let loaded = read_settings_from(&path).unwrap();
        assert_eq!(loaded.server_url, default_server_url());
        assert_eq!(loaded.scaling, ScalingOption::FitToHeight);
    }

    #[test]
    fn stale_version_gets_migrated() {
        let mut settings = Settings {
            version: 0,
            ..Settings::default()
        };
        migrate_settings(&mut settings);
        assert_eq!(settings.version, CURRENT_VERSION);
    }

    #[test]
    fn automatic_fitting_follows_viewport_shape() {
        assert_eq!(
            fitting_for_viewport(ScalingOption::Automatic, 1080, 1920),
            FittingOption::Width
        );
        assert_eq!(
            fitting_for_viewport(ScalingOption::Automatic, 1920, 1080),
            FittingOption::Height
        );
        assert_eq!(
            fitting_for_viewport(ScalingOption::Original, 100, 100),
            FittingOption::Original
        );
    }
}
