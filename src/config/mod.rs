// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Configuration system for timeline.
//!
//! This module provides data structures for loading and saving song files
//! (YAML) and application settings (TOML).

pub mod settings;
pub mod watcher;

pub use settings::{default_settings_path, PlaybackSettings, Settings};
pub use watcher::{SongEvent, SongWatcher};

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::arrangement::{recalculate_start_bars, Section, Song};
use crate::scheduler::{PlayOptions, PlaybackMode};

/// Root of a song file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SongFile {
    /// Song metadata
    pub song: SongConfig,
    /// Sections in playback order
    #[serde(default)]
    pub sections: Vec<Section>,
    /// Per-song playback preferences
    #[serde(default)]
    pub playback: PlaybackConfig,
}

impl SongFile {
    /// Load a song from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read song file: {:?}", path.as_ref()))?;
        Self::from_yaml(&contents)
    }

    /// Parse a song from a YAML string.
    ///
    /// Section order and start bars are recomputed from list order; values
    /// authored in the file are ignored.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut file: SongFile =
            serde_yaml::from_str(yaml).context("Failed to parse YAML song file")?;
        recalculate_start_bars(&mut file.sections);
        Ok(file)
    }

    /// Serialize to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize song to YAML")
    }

    /// Save the song to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = self.to_yaml()?;
        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write song file: {:?}", path.as_ref()))
    }

    /// Build a song file from an arrangement
    pub fn from_song(song: &Song) -> Self {
        Self {
            song: SongConfig {
                name: song.name().to_string(),
                metadata: song.metadata().clone(),
            },
            sections: song.sections().to_vec(),
            playback: PlaybackConfig::default(),
        }
    }

    /// Convert into an arrangement
    pub fn to_song(&self) -> Song {
        let mut song = Song::new(self.song.name.clone());
        song.set_sections(self.sections.clone());
        for (key, value) in &self.song.metadata {
            song.set_metadata(key.clone(), value.clone());
        }
        song
    }

    /// Play options from this file, falling back to `defaults`
    pub fn play_options(&self, defaults: &PlaybackSettings) -> PlayOptions {
        PlayOptions {
            tempo_override: self.playback.tempo_override,
            countoff_bars: self.playback.countoff_bars.unwrap_or(defaults.countoff_bars),
            loop_section: self.playback.loop_section,
        }
    }

    /// Playback mode from this file, falling back to `defaults`
    pub fn playback_mode(&self, defaults: &PlaybackSettings) -> PlaybackMode {
        self.playback.mode.unwrap_or(defaults.mode)
    }
}

/// Song-level metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SongConfig {
    /// Song name
    pub name: String,
    /// Free-form tags (artist, key, notes)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl Default for SongConfig {
    fn default() -> Self {
        Self {
            name: "Untitled".to_string(),
            metadata: HashMap::new(),
        }
    }
}

/// Playback preferences stored with a song
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PlaybackConfig {
    /// Lead-in bars
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countoff_bars: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<PlaybackMode>,
    /// 0-based section to loop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_section: Option<usize>,
    /// Fixed BPM in place of the tempo map
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tempo_override: Option<f64>,
}

/// Collect problems the scheduler would paper over with defaults
pub fn validate_song(sections: &[Section]) -> Vec<String> {
    let mut warnings = Vec::new();
    if sections.is_empty() {
        warnings.push("song has no sections".to_string());
    }
    for (index, section) in sections.iter().enumerate() {
        if let Err(e) = section.validate(index) {
            warnings.push(e.to_string());
        }
    }
    let mut ids: Vec<&str> = sections.iter().map(|s| s.id.as_str()).collect();
    ids.sort_unstable();
    for pair in ids.windows(2) {
        if pair[0] == pair[1] {
            warnings.push(format!("duplicate section id {:?}", pair[0]));
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrangement::TempoCurve;

    const SONG: &str = r#"
song:
  name: "Etude No. 3"
  metadata:
    composer: "Sor"
sections:
  - id: intro
    bars: 2
    tempo_start: 80
  - id: theme
    name: "Theme"
    bars: 8
    time_signature: "3/4"
    tempo_start: 80
    tempo_end: 104
    tempo_curve: exponential
  - id: coda
    bars: 4
    start_bar: 99
    tempo_start: 104
    tempo_curve: step
playback:
  countoff_bars: 2
  mode: both
  loop_section: 1
"#;

    #[test]
    fn test_parse_song_file() {
        let file = SongFile::from_yaml(SONG).unwrap();
        assert_eq!(file.song.name, "Etude No. 3");
        assert_eq!(file.song.metadata.get("composer").map(String::as_str), Some("Sor"));
        assert_eq!(file.sections.len(), 3);

        let theme = &file.sections[1];
        assert_eq!(theme.name, "Theme");
        assert_eq!(theme.beats_per_bar(), 3);
        assert_eq!(theme.tempo_end, Some(104.0));
        assert_eq!(theme.tempo_curve, TempoCurve::Exponential);
        assert_eq!(file.sections[0].name, "");
        assert_eq!(file.sections[0].time_signature, "4/4");
    }

    #[test]
    fn test_start_bars_are_recomputed() {
        let file = SongFile::from_yaml(SONG).unwrap();
        let starts: Vec<u32> = file.sections.iter().map(|s| s.start_bar).collect();
        assert_eq!(starts, vec![1, 3, 11]);
        assert_eq!(file.sections[2].order_index, 2);
    }

    #[test]
    fn test_play_options() {
        let file = SongFile::from_yaml(SONG).unwrap();
        let defaults = PlaybackSettings::default();
        let options = file.play_options(&defaults);
        assert_eq!(options.countoff_bars, 2);
        assert_eq!(options.loop_section, Some(1));
        assert_eq!(options.tempo_override, None);
        assert_eq!(file.playback_mode(&defaults), PlaybackMode::Both);

        let bare = SongFile::from_yaml("song:\n  name: Bare\n").unwrap();
        assert!(bare.sections.is_empty());
        assert_eq!(bare.play_options(&defaults).countoff_bars, defaults.countoff_bars);
        assert_eq!(bare.playback_mode(&defaults), PlaybackMode::Metronome);
    }

    #[test]
    fn test_round_trip() {
        let file = SongFile::from_yaml(SONG).unwrap();
        let yaml = file.to_yaml().unwrap();
        assert_eq!(SongFile::from_yaml(&yaml).unwrap(), file);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.yaml");
        let file = SongFile::from_yaml(SONG).unwrap();
        file.save(&path).unwrap();
        assert_eq!(SongFile::load(&path).unwrap(), file);
        assert!(SongFile::load(dir.path().join("missing.yaml")).is_err());
    }

    #[test]
    fn test_song_conversion() {
        let file = SongFile::from_yaml(SONG).unwrap();
        let song = file.to_song();
        assert_eq!(song.name(), "Etude No. 3");
        assert_eq!(song.total_bars(), 14);
        assert_eq!(song.get_metadata("composer"), Some("Sor"));

        let back = SongFile::from_song(&song);
        assert_eq!(back.sections, file.sections);
        assert_eq!(back.song, file.song);
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(SongFile::from_yaml("sections: [").is_err());
        assert!(SongFile::from_yaml("sections: []").is_err());
    }

    #[test]
    fn test_validate_song() {
        assert_eq!(validate_song(&[]), vec!["song has no sections".to_string()]);

        let file = SongFile::from_yaml(SONG).unwrap();
        assert!(validate_song(&file.sections).is_empty());

        let sections = vec![
            Section::new("a", 0, 120.0),
            Section::new("b", 2, -1.0),
            Section::new("a", 2, 90.0).with_time_signature("waltz"),
        ];
        let warnings = validate_song(&sections);
        assert_eq!(warnings.len(), 4);
        assert!(warnings[0].contains("bar count"));
        assert!(warnings[1].contains("start tempo"));
        assert!(warnings[2].contains("time signature"));
        assert!(warnings[3].contains("duplicate"));
    }
}
