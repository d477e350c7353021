// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timing module.
//!
//! This module maps between global beats, bar/beat positions and elapsed
//! seconds for songs with piecewise-variable tempo.

pub mod tempo_map;

pub use tempo_map::{
    bar_and_beat_at_global_beat, beats_per_bar, global_beat_at_bar_and_beat,
    global_beat_at_seconds, seconds_at_global_beat, section_beat_range, song_duration_seconds,
    tempo_at_beat, total_bars, total_beats, BarBeat, TempoAt, DEFAULT_TEMPO,
};
