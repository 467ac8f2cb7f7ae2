//! Persisted user settings (`chess_settings.json`).

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

pub const SETTINGS_FILE: &str = "chess_settings.json";

/// 設定値。欠けているキーは既定値で補う。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub lichess_username: String,
    pub chesscom_username: String,
    pub theme: String,
    pub piece_style: String,
    pub piece_size: u32,
    pub skill_level: u8,
    pub multipv_count: u32,
    /// Engine think time per move, in seconds.
    pub think_time: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            lichess_username: String::new(),
            chesscom_username: String::new(),
            theme: "Classic".to_string(),
            piece_style: "Classic".to_string(),
            piece_size: 52,
            skill_level: 20,
            multipv_count: 3,
            think_time: 1.0,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&text)?;
        Ok(settings.normalized())
    }

    /// Load, falling back to defaults (with a warning) when the file is
    /// missing or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Could not load settings from {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Clamp values edited by hand into their valid ranges.
    pub fn normalized(mut self) -> Self {
        self.skill_level = self.skill_level.min(20);
        self.multipv_count = self.multipv_count.clamp(1, 5);
        if !self.think_time.is_finite() || self.think_time <= 0.0 {
            self.think_time = Self::default().think_time;
        }
        self
    }

    pub fn think_duration(&self) -> Duration {
        Duration::from_secs_f64(self.think_time.max(0.0))
    }
}
