// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Song sections and the tempo curves that shape them.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TimelineError};
use crate::timing::tempo_map;

/// Interpolation rule for a section whose tempo changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TempoCurve {
    /// Straight line from start to end tempo
    #[default]
    Linear,
    /// Constant ratio per beat
    Exponential,
    /// Start tempo for the whole section; the change lands on the next section
    Step,
}

/// An ordered unit of a song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Stable identifier
    pub id: String,
    /// Display label
    #[serde(default)]
    pub name: String,
    /// Position in the song (0-based, contiguous)
    #[serde(default)]
    pub order_index: usize,
    /// 1-based first bar. Derived, see [`recalculate_start_bars`]
    #[serde(default = "default_start_bar")]
    pub start_bar: u32,
    /// Length in bars
    pub bars: u32,
    /// "N/D"; only N matters for scheduling
    #[serde(default = "default_time_signature")]
    pub time_signature: String,
    /// Tempo at the first beat, in BPM
    pub tempo_start: f64,
    /// Tempo reached at the end of the section
    #[serde(default)]
    pub tempo_end: Option<f64>,
    #[serde(default)]
    pub tempo_curve: TempoCurve,
}

fn default_start_bar() -> u32 {
    1
}

fn default_time_signature() -> String {
    "4/4".to_string()
}

impl Section {
    /// Create a constant-tempo 4/4 section
    pub fn new(id: impl Into<String>, bars: u32, tempo: f64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            order_index: 0,
            start_bar: 1,
            bars,
            time_signature: default_time_signature(),
            tempo_start: tempo,
            tempo_end: None,
            tempo_curve: TempoCurve::Linear,
        }
    }

    /// Builder: set display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builder: set time signature
    pub fn with_time_signature(mut self, time_signature: impl Into<String>) -> Self {
        self.time_signature = time_signature.into();
        self
    }

    /// Builder: ramp towards `tempo_end` using `curve`
    pub fn with_ramp(mut self, tempo_end: f64, curve: TempoCurve) -> Self {
        self.tempo_end = Some(tempo_end);
        self.tempo_curve = curve;
        self
    }

    /// Beats per bar from the time signature numerator
    pub fn beats_per_bar(&self) -> u32 {
        tempo_map::beats_per_bar(&self.time_signature)
    }

    /// Number of beats in the whole section
    pub fn beat_count(&self) -> u64 {
        self.bars as u64 * self.beats_per_bar() as u64
    }

    /// Last bar covered by this section (inclusive)
    pub fn end_bar(&self) -> u32 {
        self.start_bar + self.bars.saturating_sub(1)
    }

    /// Whether the tempo actually changes across the section
    pub fn is_ramp(&self) -> bool {
        matches!(self.tempo_end, Some(end) if end != self.tempo_start)
    }

    /// Check the authored fields.
    ///
    /// The scheduler tolerates every failure reported here by falling back
    /// to defaults; editors use this to warn before saving.
    pub fn validate(&self, index: usize) -> Result<()> {
        let invalid = |reason: String| TimelineError::InvalidSection { index, reason };

        if self.bars == 0 {
            return Err(invalid("bar count must be positive".to_string()));
        }
        if !(self.tempo_start.is_finite() && self.tempo_start > 0.0) {
            return Err(invalid(format!("start tempo {} is not positive", self.tempo_start)));
        }
        if let Some(end) = self.tempo_end {
            if !(end.is_finite() && end > 0.0) {
                return Err(invalid(format!("end tempo {} is not positive", end)));
            }
        }
        if tempo_map::parse_beats_per_bar(&self.time_signature).is_none() {
            return Err(invalid(format!(
                "malformed time signature {:?}",
                self.time_signature
            )));
        }
        Ok(())
    }
}

/// Reassign `order_index` and `start_bar` from list order.
///
/// Run once after any insert, remove, reorder or resize so that sections
/// concatenate without gaps or overlaps.
pub fn recalculate_start_bars(sections: &mut [Section]) {
    let mut next_bar = 1u32;
    for (index, section) in sections.iter_mut().enumerate() {
        section.order_index = index;
        section.start_bar = next_bar;
        next_bar = next_bar.saturating_add(section.bars);
    }
}

/// Check that `order_index` and `start_bar` match the cumulative layout
pub fn is_contiguous(sections: &[Section]) -> bool {
    let mut next_bar = 1u32;
    for (index, section) in sections.iter().enumerate() {
        if section.order_index != index || section.start_bar != next_bar {
            return false;
        }
        next_bar = next_bar.saturating_add(section.bars);
    }
    true
}
