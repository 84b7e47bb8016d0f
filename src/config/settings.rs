//! Application settings loading from config.toml
//!
//! Every field has a default, so a missing file or a missing table simply yields the
//! stock organization calendar (UTC+9, noon anchor) and a local upload directory.

use crate::core::calendar::OrgCalendar;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an alternative settings file
pub const CONFIG_PATH_VAR: &str = "ATTENDANCE_CONFIG";

/// Structure representing the entire config.toml file
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Organization calendar
    pub calendar: CalendarSettings,
    /// Photo storage
    pub storage: StorageSettings,
}

/// `[calendar]` table
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CalendarSettings {
    /// Fixed offset from UTC, in hours, that defines the organization's calendar day
    pub utc_offset_hours: i32,
    /// Local hour used as the check-in time for entries made on a day other than today
    pub anchor_hour: u32,
    /// How many recent years the year picker offers
    pub year_options: usize,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            utc_offset_hours: 9,
            anchor_hour: 12,
            year_options: 5,
        }
    }
}

impl CalendarSettings {
    /// Builds the calendar described by these settings.
    pub fn org_calendar(&self) -> Result<OrgCalendar> {
        OrgCalendar::new(self.utc_offset_hours, self.anchor_hour)
    }
}

/// `[storage]` table
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory uploaded photos are written to
    pub upload_dir: PathBuf,
    /// URL prefix under which `upload_dir` is served
    pub public_base_url: String,
    /// Bucket name appended to the public URL and the upload directory
    pub bucket: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("data/uploads"),
            public_base_url: "http://localhost:8080/uploads".to_string(),
            bucket: "avatars".to_string(),
        }
    }
}

/// Parses settings from TOML text.
pub fn parse_settings(contents: &str) -> Result<Settings> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse settings: {e}"),
    })
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path_ref = path.as_ref();
    debug!("Loading settings from {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;
    parse_settings(&contents)
}

/// Loads settings from `$ATTENDANCE_CONFIG` or `./config.toml`.
///
/// A missing file is not an error; defaults are used instead.
pub fn load_default_settings() -> Result<Settings> {
    let path =
        std::env::var(CONFIG_PATH_VAR).map_or_else(|_| PathBuf::from("config.toml"), PathBuf::from);
    if !path.exists() {
        info!("No settings file at {}, using defaults", path.display());
        return Ok(Settings::default());
    }
    load_settings(path)
}
