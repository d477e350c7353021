// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Load and save the `[auto_ramp]` table of the settings file.

use std::path::Path;

use crate::config::Settings;
use crate::error::Result;

use super::AutoRampSettings;

/// Persisted auto-ramp settings. Missing or corrupt data yields defaults.
pub fn load_auto_ramp(path: &Path) -> AutoRampSettings {
    Settings::load_or_default(path).auto_ramp
}

/// Store auto-ramp settings, keeping the rest of the file intact.
///
/// An existing file that cannot be read is left alone and the error is
/// returned.
pub fn save_auto_ramp(path: &Path, auto_ramp: &AutoRampSettings) -> Result<()> {
    let mut settings = Settings::load(path)?;
    settings.auto_ramp = *auto_ramp;
    settings.save(path)
}
