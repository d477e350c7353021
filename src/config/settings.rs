// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Application settings stored as TOML.
//!
//! ```toml
//! [playback]
//! mode = "metronome"
//! countoff_bars = 1
//!
//! [auto_ramp]
//! enabled = false
//! start_percent = 60.0
//! target_percent = 100.0
//! step_percent = 5.0
//! loops_per_step = 4
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::practice::AutoRampSettings;
use crate::scheduler::PlaybackMode;

/// Default settings location: `<config dir>/timeline/settings.toml`
pub fn default_settings_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("timeline");
    path.push("settings.toml");
    path
}

/// Playback defaults applied when the command line does not say otherwise
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    pub mode: PlaybackMode,
    pub countoff_bars: u32,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            mode: PlaybackMode::Metronome,
            countoff_bars: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub playback: PlaybackSettings,
    pub auto_ramp: AutoRampSettings,
}

impl Settings {
    /// Read settings; a missing file yields defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        let mut settings: Settings = toml::from_str(&contents)?;
        settings.auto_ramp = settings.auto_ramp.sanitized();
        Ok(settings)
    }

    /// Read settings, falling back to defaults on any error
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable settings");
                Self::default()
            }
        }
    }

    /// Write settings, creating parent directories as needed
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        debug!(path = %path.display(), "settings saved");
        Ok(())
    }
}
