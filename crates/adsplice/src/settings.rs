use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// ARGB yellow, the seekbar color used while an ad plays.
pub const AD_SEEKBAR_COLOR: u32 = 0xFFFF_FF00;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    pub version: u32,
    /// Period of the progress/stall reconciliation tick.
    pub progress_tick_ms: u64,
    /// Buffer the engine needs before starting playback.
    pub min_buffer_ms: u64,
    /// Buffer the engine needs before resuming after a rebuffer.
    pub min_rebuffer_ms: u64,
    /// Playback controls hide after this long without interaction.
    pub controls_timeout_ms: u64,
    pub ad_seekbar_color: u32,
    pub show_error_notices: bool,
    pub notice_duration_ms: u64,
    pub user_agent: String,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            version: 1,
            progress_tick_ms: 1000,
            min_buffer_ms: 1000,
            min_rebuffer_ms: 5000,
            controls_timeout_ms: 3000,
            ad_seekbar_color: AD_SEEKBAR_COLOR,
            show_error_notices: true,
            notice_duration_ms: 2000,
            user_agent: format!("adsplice/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl PlayerSettings {
    pub fn progress_tick(&self) -> Duration {
        // A zero period would spin the pump loop.
        Duration::from_millis(self.progress_tick_ms.max(1))
    }

    pub fn notice_duration(&self) -> Duration {
        Duration::from_millis(self.notice_duration_ms)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("adsplice").join("settings.json"))
    }

    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        Self::load_from_path(&path)
    }

    /// Missing or malformed files yield the defaults.
    pub fn load_from_path(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::warn!("Ignoring invalid settings at {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::default_path() else {
            return Ok(());
        };
        self.save_to_path(&path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
