// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Tempo-map math over a section list.
//!
//! Three coordinate systems are kept in step here: the global beat index
//! (0-based, counted across the whole song), the 1-based (bar, beat) pair,
//! and elapsed seconds. Tempo is constant within one beat, so the seconds
//! mapping is an exact sum of per-beat durations rather than an integral.
//!
//! All functions are pure and never fail: malformed time signatures count as
//! 4/4 and unusable tempos as 120 BPM.

use std::fmt;
use std::ops::Range;

use crate::arrangement::{Section, TempoCurve};

/// Tempo used when no valid tempo is available
pub const DEFAULT_TEMPO: f64 = 120.0;

/// Beats per bar used for malformed time signatures
pub const DEFAULT_BEATS_PER_BAR: u32 = 4;

/// Tempo at a global beat and the section that owns it
#[derive(Debug, Clone, PartialEq)]
pub struct TempoAt {
    /// Rounded BPM
    pub tempo: f64,
    /// Index of the owning section (the last one past the end)
    pub section_index: usize,
    /// Id of the owning section, `None` for an empty song
    pub section_id: Option<String>,
}

/// A 1-based musical position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BarBeat {
    pub bar: u32,
    pub beat: u32,
}

impl BarBeat {
    pub fn new(bar: u32, beat: u32) -> Self {
        Self { bar, beat }
    }
}

impl fmt::Display for BarBeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.bar, self.beat)
    }
}

/// Parse the numerator of an "N/D" time signature
pub fn parse_beats_per_bar(time_signature: &str) -> Option<u32> {
    let numerator = time_signature.split('/').next()?.trim();
    match numerator.parse::<u32>() {
        Ok(n) if n > 0 => Some(n),
        _ => None,
    }
}

/// Beats per bar, 4 on malformed input
pub fn beats_per_bar(time_signature: &str) -> u32 {
    parse_beats_per_bar(time_signature).unwrap_or(DEFAULT_BEATS_PER_BAR)
}

/// Total number of beats in the song
pub fn total_beats(sections: &[Section]) -> u64 {
    sections.iter().map(Section::beat_count).sum()
}

/// Total number of bars in the song
pub fn total_bars(sections: &[Section]) -> u32 {
    sections.iter().map(|s| s.bars).fold(0u32, u32::saturating_add)
}

fn usable_tempo(bpm: f64) -> Option<f64> {
    (bpm.is_finite() && bpm > 0.0).then_some(bpm)
}

// Rounded BPMs below 1 would make a beat last forever.
fn round_bpm(bpm: f64) -> f64 {
    bpm.round().max(1.0)
}

/// Rounded tempo of the beat at `beat_in_section` within `section`
fn section_tempo(section: &Section, beat_in_section: u64) -> f64 {
    let start = usable_tempo(section.tempo_start).unwrap_or(DEFAULT_TEMPO);
    let end = match section.tempo_end.and_then(usable_tempo) {
        Some(end) if end != start => end,
        _ => return round_bpm(start),
    };

    let section_beats = section.beat_count().max(1);
    let progress = beat_in_section as f64 / section_beats as f64;

    let tempo = match section.tempo_curve {
        TempoCurve::Step => start,
        TempoCurve::Exponential => start * (end / start).powf(progress),
        TempoCurve::Linear => start + (end - start) * progress,
    };
    round_bpm(tempo)
}

/// Tempo that continues after the last section
fn trailing_tempo(sections: &[Section]) -> f64 {
    match sections.last() {
        Some(last) => {
            let start = usable_tempo(last.tempo_start).unwrap_or(DEFAULT_TEMPO);
            round_bpm(last.tempo_end.and_then(usable_tempo).unwrap_or(start))
        }
        None => DEFAULT_TEMPO,
    }
}

/// Find the section containing `beat` and the beat offset inside it
fn locate(sections: &[Section], beat: u64) -> Option<(usize, u64)> {
    let mut remaining = beat;
    for (index, section) in sections.iter().enumerate() {
        let count = section.beat_count();
        if remaining < count {
            return Some((index, remaining));
        }
        remaining -= count;
    }
    None
}

/// Tempo in effect at `global_beat`
pub fn tempo_at_beat(sections: &[Section], global_beat: u64) -> TempoAt {
    match locate(sections, global_beat) {
        Some((index, beat_in_section)) => {
            let section = &sections[index];
            TempoAt {
                tempo: section_tempo(section, beat_in_section),
                section_index: index,
                section_id: Some(section.id.clone()),
            }
        }
        None => TempoAt {
            tempo: trailing_tempo(sections),
            section_index: sections.len().saturating_sub(1),
            section_id: sections.last().map(|s| s.id.clone()),
        },
    }
}

/// Global beat to (bar, beat); positions past the end keep counting in the
/// last section's meter
pub fn bar_and_beat_at_global_beat(sections: &[Section], global_beat: u64) -> BarBeat {
    let mut remaining = global_beat;
    let mut bars_before = 0u64;

    for section in sections {
        let per_bar = section.beats_per_bar() as u64;
        let count = section.bars as u64 * per_bar;
        if remaining < count {
            return BarBeat {
                bar: (bars_before + remaining / per_bar + 1) as u32,
                beat: (remaining % per_bar + 1) as u32,
            };
        }
        remaining -= count;
        bars_before += section.bars as u64;
    }

    let per_bar = sections
        .last()
        .map(Section::beats_per_bar)
        .unwrap_or(DEFAULT_BEATS_PER_BAR) as u64;
    BarBeat {
        bar: (bars_before + remaining / per_bar + 1) as u32,
        beat: (remaining % per_bar + 1) as u32,
    }
}

/// Exact inverse of [`bar_and_beat_at_global_beat`].
///
/// Bar and beat are clamped to at least 1; a beat past the end of its bar is
/// clamped to the bar's last beat.
pub fn global_beat_at_bar_and_beat(sections: &[Section], bar: u32, beat: u32) -> u64 {
    let bar = bar.max(1) as u64;
    let beat = beat.max(1) as u64;
    let mut bars_before = 0u64;
    let mut beats_before = 0u64;

    for section in sections {
        let per_bar = section.beats_per_bar() as u64;
        let bars = section.bars as u64;
        if bar <= bars_before + bars {
            return beats_before + (bar - bars_before - 1) * per_bar + beat.min(per_bar) - 1;
        }
        bars_before += bars;
        beats_before += bars * per_bar;
    }

    let per_bar = sections
        .last()
        .map(Section::beats_per_bar)
        .unwrap_or(DEFAULT_BEATS_PER_BAR) as u64;
    beats_before + (bar - bars_before - 1) * per_bar + beat.min(per_bar) - 1
}

/// Global-beat bounds `[start, end)` of one section
pub fn section_beat_range(sections: &[Section], index: usize) -> Option<Range<u64>> {
    let section = sections.get(index)?;
    let start: u64 = sections[..index].iter().map(Section::beat_count).sum();
    Some(start..start + section.beat_count())
}

/// Duration of every beat in song order.
///
/// Both directions of the seconds mapping sum this same sequence, which keeps
/// them bit-for-bit consistent at integer beats.
fn beat_durations(sections: &[Section]) -> impl Iterator<Item = f64> + '_ {
    sections.iter().flat_map(|section| {
        (0..section.beat_count()).map(move |beat| 60.0 / section_tempo(section, beat))
    })
}

/// Elapsed seconds at the start of `target_beat`
pub fn seconds_at_global_beat(sections: &[Section], target_beat: u64) -> f64 {
    let limit = usize::try_from(target_beat).unwrap_or(usize::MAX);
    let mut seconds = 0.0;
    let mut counted = 0u64;

    for duration in beat_durations(sections).take(limit) {
        seconds += duration;
        counted += 1;
    }

    if counted < target_beat {
        seconds += (target_beat - counted) as f64 * 60.0 / trailing_tempo(sections);
    }
    seconds
}

/// Fractional global beat reached after `seconds`
pub fn global_beat_at_seconds(sections: &[Section], seconds: f64) -> f64 {
    // Also rejects NaN
    if !(seconds > 0.0) {
        return 0.0;
    }

    let mut elapsed = 0.0;
    let mut beat = 0u64;

    for duration in beat_durations(sections) {
        if elapsed + duration > seconds {
            let fraction = ((seconds - elapsed) / duration).clamp(0.0, 1.0 - f64::EPSILON);
            return beat as f64 + fraction;
        }
        elapsed += duration;
        beat += 1;
    }

    let duration = 60.0 / trailing_tempo(sections);
    beat as f64 + (seconds - elapsed) / duration
}

/// Length of the whole song in seconds
pub fn song_duration_seconds(sections: &[Section]) -> f64 {
    seconds_at_global_beat(sections, total_beats(sections))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrangement::recalculate_start_bars;

    const EPSILON: f64 = 1e-9;

    fn song(mut sections: Vec<Section>) -> Vec<Section> {
        recalculate_start_bars(&mut sections);
        sections
    }

    #[test]
    fn test_beats_per_bar_parsing() {
        assert_eq!(beats_per_bar("4/4"), 4);
        assert_eq!(beats_per_bar("7/8"), 7);
        assert_eq!(beats_per_bar(" 3 /4"), 3);
        assert_eq!(beats_per_bar("0/4"), 4);
        assert_eq!(beats_per_bar("x/4"), 4);
        assert_eq!(beats_per_bar(""), 4);
        assert_eq!(beats_per_bar("/4"), 4);
        assert_eq!(parse_beats_per_bar("12/8"), Some(12));
        assert_eq!(parse_beats_per_bar("-3/4"), None);
    }

    #[test]
    fn test_single_constant_section() {
        let sections = song(vec![Section::new("a", 4, 120.0)]);

        assert_eq!(total_beats(&sections), 16);
        let at = tempo_at_beat(&sections, 10);
        assert_eq!(at.tempo, 120.0);
        assert_eq!(at.section_index, 0);
        assert_eq!(at.section_id.as_deref(), Some("a"));
        assert_eq!(bar_and_beat_at_global_beat(&sections, 10), BarBeat::new(3, 3));
    }

    #[test]
    fn test_linear_ramp_midpoint() {
        let sections = song(vec![
            Section::new("a", 2, 100.0).with_ramp(140.0, TempoCurve::Linear),
            Section::new("b", 2, 140.0),
        ]);

        assert_eq!(tempo_at_beat(&sections, 0).tempo, 100.0);
        assert_eq!(tempo_at_beat(&sections, 4).tempo, 120.0);
        // 100 + 40 * 7/8 = 135
        assert_eq!(tempo_at_beat(&sections, 7).tempo, 135.0);
        let next = tempo_at_beat(&sections, 8);
        assert_eq!(next.tempo, 140.0);
        assert_eq!(next.section_index, 1);
    }

    #[test]
    fn test_exponential_ramp_midpoint() {
        let sections = song(vec![
            Section::new("a", 2, 100.0).with_ramp(200.0, TempoCurve::Exponential),
        ]);
        assert_eq!(tempo_at_beat(&sections, 4).tempo, 141.0);
        assert_eq!(tempo_at_beat(&sections, 0).tempo, 100.0);
    }

    #[test]
    fn test_step_curve_is_constant_within_section() {
        let sections = song(vec![
            Section::new("a", 2, 90.0).with_ramp(150.0, TempoCurve::Step),
            Section::new("b", 1, 150.0),
        ]);
        for beat in 0..8 {
            assert_eq!(tempo_at_beat(&sections, beat).tempo, 90.0, "beat {beat}");
        }
        assert_eq!(tempo_at_beat(&sections, 8).tempo, 150.0);
    }

    #[test]
    fn test_tempo_is_rounded() {
        let sections = song(vec![Section::new("a", 1, 100.0).with_ramp(101.0, TempoCurve::Linear)]);
        // 100.25, 100.5, 100.75
        assert_eq!(tempo_at_beat(&sections, 1).tempo, 100.0);
        assert_eq!(tempo_at_beat(&sections, 3).tempo, 101.0);
    }

    #[test]
    fn test_past_the_end() {
        let sections = song(vec![
            Section::new("a", 1, 100.0),
            Section::new("b", 1, 110.0).with_ramp(130.0, TempoCurve::Linear),
        ]);
        let at = tempo_at_beat(&sections, 50);
        assert_eq!(at.tempo, 130.0);
        assert_eq!(at.section_index, 1);
        assert_eq!(at.section_id.as_deref(), Some("b"));
        assert_eq!(bar_and_beat_at_global_beat(&sections, 8), BarBeat::new(3, 1));
    }

    #[test]
    fn test_empty_song() {
        let at = tempo_at_beat(&[], 0);
        assert_eq!(at.tempo, DEFAULT_TEMPO);
        assert_eq!(at.section_index, 0);
        assert_eq!(at.section_id, None);
        assert_eq!(total_beats(&[]), 0);
        assert_eq!(bar_and_beat_at_global_beat(&[], 5), BarBeat::new(2, 2));
        assert!((seconds_at_global_beat(&[], 2) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_total_bars_saturates() {
        let sections = vec![
            Section::new("a", u32::MAX, 120.0),
            Section::new("b", 8, 120.0),
        ];
        assert_eq!(total_bars(&sections), u32::MAX);
        assert_eq!(total_bars(&sections[1..]), 8);
    }

    #[test]
    fn test_invalid_tempo_falls_back() {
        let sections = song(vec![
            Section::new("zero", 1, 0.0),
            Section::new("nan", 1, f64::NAN).with_ramp(-20.0, TempoCurve::Linear),
        ]);
        assert_eq!(tempo_at_beat(&sections, 0).tempo, DEFAULT_TEMPO);
        assert_eq!(tempo_at_beat(&sections, 5).tempo, DEFAULT_TEMPO);
        assert!(seconds_at_global_beat(&sections, 8).is_finite());
    }

    #[test]
    fn test_mixed_meters() {
        let sections = song(vec![
            Section::new("a", 2, 120.0).with_time_signature("3/4"),
            Section::new("b", 2, 120.0).with_time_signature("5/4"),
        ]);
        assert_eq!(total_beats(&sections), 16);
        assert_eq!(bar_and_beat_at_global_beat(&sections, 5), BarBeat::new(2, 3));
        assert_eq!(bar_and_beat_at_global_beat(&sections, 6), BarBeat::new(3, 1));
        assert_eq!(bar_and_beat_at_global_beat(&sections, 15), BarBeat::new(4, 5));
    }

    #[test]
    fn test_bar_beat_inverse() {
        let sections = song(vec![
            Section::new("a", 2, 120.0).with_time_signature("3/4"),
            Section::new("b", 3, 120.0).with_time_signature("7/8"),
            Section::new("c", 1, 120.0),
        ]);
        for beat in 0..total_beats(&sections) + 6 {
            let position = bar_and_beat_at_global_beat(&sections, beat);
            assert_eq!(
                global_beat_at_bar_and_beat(&sections, position.bar, position.beat),
                beat,
                "position {position}"
            );
        }
        // beat clamped to the bar's meter
        assert_eq!(global_beat_at_bar_and_beat(&sections, 1, 9), 2);
        assert_eq!(global_beat_at_bar_and_beat(&sections, 0, 0), 0);
    }

    #[test]
    fn test_section_beat_range() {
        let sections = song(vec![
            Section::new("a", 2, 120.0),
            Section::new("b", 1, 120.0).with_time_signature("3/4"),
        ]);
        assert_eq!(section_beat_range(&sections, 0), Some(0..8));
        assert_eq!(section_beat_range(&sections, 1), Some(8..11));
        assert_eq!(section_beat_range(&sections, 2), None);
    }

    #[test]
    fn test_seconds_at_constant_tempo() {
        let sections = song(vec![Section::new("a", 4, 120.0)]);
        assert!((seconds_at_global_beat(&sections, 0)).abs() < EPSILON);
        assert!((seconds_at_global_beat(&sections, 4) - 2.0).abs() < EPSILON);
        assert!((song_duration_seconds(&sections) - 8.0).abs() < EPSILON);
        // past the end the trailing tempo continues
        assert!((seconds_at_global_beat(&sections, 18) - 9.0).abs() < EPSILON);
    }

    #[test]
    fn test_seconds_follow_each_beat_tempo() {
        let sections = song(vec![
            Section::new("a", 1, 60.0),
            Section::new("b", 1, 120.0),
        ]);
        // four beats at 1s, then beats at 0.5s
        assert!((seconds_at_global_beat(&sections, 4) - 4.0).abs() < EPSILON);
        assert!((seconds_at_global_beat(&sections, 6) - 5.0).abs() < EPSILON);
        assert!((global_beat_at_seconds(&sections, 4.25) - 4.5).abs() < EPSILON);
        assert!((global_beat_at_seconds(&sections, 1.5) - 1.5).abs() < EPSILON);
    }

    #[test]
    fn test_beat_at_seconds_edges() {
        let sections = song(vec![Section::new("a", 1, 120.0)]);
        assert_eq!(global_beat_at_seconds(&sections, -3.0), 0.0);
        assert_eq!(global_beat_at_seconds(&sections, f64::NAN), 0.0);
        assert_eq!(global_beat_at_seconds(&sections, 0.0), 0.0);
        // 2s covers the song, one more second at 120 BPM adds two beats
        assert!((global_beat_at_seconds(&sections, 3.0) - 6.0).abs() < EPSILON);
    }

    #[test]
    fn test_round_trip_and_monotonic() {
        let sections = song(vec![
            Section::new("a", 3, 72.0).with_ramp(133.0, TempoCurve::Exponential),
            Section::new("b", 2, 133.0).with_time_signature("6/8"),
            Section::new("c", 4, 150.0).with_ramp(95.0, TempoCurve::Linear),
            Section::new("d", 2, 95.0).with_ramp(180.0, TempoCurve::Step),
        ]);

        let mut previous = -1.0;
        for beat in 0..total_beats(&sections) {
            let seconds = seconds_at_global_beat(&sections, beat);
            assert!(seconds > previous, "not increasing at beat {beat}");
            previous = seconds;
            assert_eq!(global_beat_at_seconds(&sections, seconds).floor() as u64, beat);
        }
    }
}
