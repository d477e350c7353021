// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Song arrangement: an ordered, contiguous list of sections.
//!
//! Every mutation renormalizes `order_index` and `start_bar` so the list can
//! be handed to the scheduler as-is.

use std::collections::HashMap;

use crate::error::{Result, TimelineError};
use crate::timing::tempo_map;

use super::section::{recalculate_start_bars, Section};

/// A complete song arrangement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Song {
    /// Song name
    name: String,
    /// Sections in playback order
    sections: Vec<Section>,
    /// Song metadata
    metadata: HashMap<String, String>,
}

impl Song {
    /// Create a new empty song
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sections: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// Get song name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set song name
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Append a section
    pub fn add_section(&mut self, section: Section) {
        self.sections.push(section);
        recalculate_start_bars(&mut self.sections);
    }

    /// Insert section at index, appending when the index is past the end
    pub fn insert_section(&mut self, index: usize, section: Section) {
        if index <= self.sections.len() {
            self.sections.insert(index, section);
        } else {
            self.sections.push(section);
        }
        recalculate_start_bars(&mut self.sections);
    }

    /// Remove section at index
    pub fn remove_section(&mut self, index: usize) -> Option<Section> {
        if index >= self.sections.len() {
            return None;
        }
        let removed = self.sections.remove(index);
        recalculate_start_bars(&mut self.sections);
        Some(removed)
    }

    /// Move the section at `from` so that it ends up at `to`
    pub fn move_section(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.sections.len();
        if from >= len {
            return Err(TimelineError::SectionOutOfRange(from));
        }
        if to >= len {
            return Err(TimelineError::SectionOutOfRange(to));
        }
        let section = self.sections.remove(from);
        self.sections.insert(to, section);
        recalculate_start_bars(&mut self.sections);
        Ok(())
    }

    /// Change a section's bar count; later sections shift
    pub fn resize_section(&mut self, index: usize, bars: u32) -> Result<()> {
        let section = self
            .sections
            .get_mut(index)
            .ok_or(TimelineError::SectionOutOfRange(index))?;
        section.bars = bars.max(1);
        recalculate_start_bars(&mut self.sections);
        Ok(())
    }

    /// Replace the whole section list
    pub fn set_sections(&mut self, sections: Vec<Section>) {
        self.sections = sections;
        recalculate_start_bars(&mut self.sections);
    }

    /// Get section at index
    pub fn get_section(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    /// Find a section by its id
    pub fn section_by_id(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// Get all sections
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Number of sections
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Total length in bars
    pub fn total_bars(&self) -> u32 {
        tempo_map::total_bars(&self.sections)
    }

    /// Total length in beats
    pub fn total_beats(&self) -> u64 {
        tempo_map::total_beats(&self.sections)
    }

    /// Duration in seconds at the authored tempos
    pub fn duration_seconds(&self) -> f64 {
        tempo_map::song_duration_seconds(&self.sections)
    }

    /// Set metadata
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Get metadata
    pub fn get_metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(|s| s.as_str())
    }

    /// All metadata
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// Builder: add section
    pub fn with_section(mut self, section: Section) -> Self {
        self.add_section(section);
        self
    }

    /// Builder: set metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
