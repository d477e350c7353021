// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Transport state machine.
//!
//! Holds the published playback position and applies the phase transitions
//! behind play, pause, stop and seek. Timing decisions live in the
//! scheduler; this type only records their results.

use crate::timing::BarBeat;

/// Playback phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportPhase {
    #[default]
    Idle,
    CountingOff,
    Playing,
    Paused,
}

/// Snapshot of the transport published after every change
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransportState {
    pub is_playing: bool,
    pub is_paused: bool,
    /// 1-based bar, 0 before the first beat is published
    pub current_bar: u32,
    /// 1-based beat within the bar
    pub current_beat: u32,
    /// Effective BPM, after any override
    pub current_tempo: f64,
    pub current_section_index: usize,
    pub current_section_id: Option<String>,
    /// Wall-clock time since the last `play()`
    pub elapsed_ms: u64,
    /// Tempo-map time of the current beat, for audio sync
    pub current_time_seconds: f64,
    pub counting_off: bool,
    pub countoff_beats_remaining: u32,
    /// Completed loop repetitions in this session
    pub repetition_count: u32,
}

impl TransportState {
    /// Current position, if one has been published
    pub fn position(&self) -> Option<BarBeat> {
        (self.current_bar > 0).then(|| BarBeat::new(self.current_bar, self.current_beat))
    }
}

/// A beat position as computed by the scheduler
#[derive(Debug, Clone, PartialEq)]
pub struct PositionUpdate {
    pub position: BarBeat,
    pub tempo: f64,
    pub section_index: usize,
    pub section_id: Option<String>,
    pub time_seconds: f64,
}

/// Transport: current phase plus the published state
#[derive(Debug, Default)]
pub struct Transport {
    phase: TransportPhase,
    state: TransportState,
}

impl Transport {
    /// Create an idle transport with default state
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase
    pub fn phase(&self) -> TransportPhase {
        self.phase
    }

    /// Published state
    pub fn state(&self) -> &TransportState {
        &self.state
    }

    /// Counting off or playing
    pub fn is_running(&self) -> bool {
        matches!(
            self.phase,
            TransportPhase::CountingOff | TransportPhase::Playing
        )
    }

    /// Start from idle, counting off first when `countoff_beats > 0`
    pub fn start(&mut self, countoff_beats: u32) {
        self.phase = if countoff_beats > 0 {
            TransportPhase::CountingOff
        } else {
            TransportPhase::Playing
        };
        self.state.is_playing = true;
        self.state.is_paused = false;
        self.state.elapsed_ms = 0;
        self.state.counting_off = countoff_beats > 0;
        self.state.countoff_beats_remaining = countoff_beats;
    }

    /// Resume from pause without a count-off
    pub fn resume(&mut self) {
        self.phase = TransportPhase::Playing;
        self.state.is_playing = true;
        self.state.is_paused = false;
        self.state.elapsed_ms = 0;
        self.state.counting_off = false;
        self.state.countoff_beats_remaining = 0;
    }

    /// Pause, keeping bar, beat and tempo. Returns false when not running.
    pub fn pause(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.phase = TransportPhase::Paused;
        self.state.is_playing = false;
        self.state.is_paused = true;
        self.state.counting_off = false;
        self.state.countoff_beats_remaining = 0;
        true
    }

    /// Back to idle with default state
    pub fn reset(&mut self) {
        self.phase = TransportPhase::Idle;
        self.state = TransportState::default();
    }

    /// Publish a count-off beat; the last one switches to playing
    pub fn apply_countoff(&mut self, remaining: u32, tempo: f64, elapsed_ms: u64) {
        self.state.counting_off = remaining > 0;
        self.state.countoff_beats_remaining = remaining;
        self.state.current_tempo = tempo;
        self.state.elapsed_ms = elapsed_ms;
        if remaining == 0 && self.phase == TransportPhase::CountingOff {
            self.phase = TransportPhase::Playing;
        }
    }

    /// Publish a played beat
    pub fn apply_position(&mut self, update: PositionUpdate, elapsed_ms: u64) {
        self.set_position(update);
        self.state.elapsed_ms = elapsed_ms;
        self.state.counting_off = false;
        self.state.countoff_beats_remaining = 0;
        if self.phase == TransportPhase::CountingOff {
            self.phase = TransportPhase::Playing;
        }
    }

    /// Move the position without touching the phase
    pub fn set_position(&mut self, update: PositionUpdate) {
        self.state.current_bar = update.position.bar;
        self.state.current_beat = update.position.beat;
        self.state.current_tempo = update.tempo;
        self.state.current_section_index = update.section_index;
        self.state.current_section_id = update.section_id;
        self.state.current_time_seconds = update.time_seconds;
    }

    /// Record the loop repetition count
    pub fn set_repetition_count(&mut self, count: u32) {
        self.state.repetition_count = count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(bar: u32, beat: u32) -> PositionUpdate {
        PositionUpdate {
            position: BarBeat::new(bar, beat),
            tempo: 96.0,
            section_index: 1,
            section_id: Some("verse".to_string()),
            time_seconds: 12.5,
        }
    }

    #[test]
    fn test_defaults() {
        let transport = Transport::new();
        assert_eq!(transport.phase(), TransportPhase::Idle);
        assert_eq!(transport.state(), &TransportState::default());
        assert!(!transport.state().is_playing);
        assert_eq!(transport.state().position(), None);
    }

    #[test]
    fn test_start_with_countoff() {
        let mut transport = Transport::new();
        transport.start(4);
        assert_eq!(transport.phase(), TransportPhase::CountingOff);
        assert!(transport.state().counting_off);
        assert_eq!(transport.state().countoff_beats_remaining, 4);

        transport.apply_countoff(3, 100.0, 0);
        assert_eq!(transport.phase(), TransportPhase::CountingOff);
        transport.apply_countoff(0, 100.0, 1800);
        assert_eq!(transport.phase(), TransportPhase::Playing);
        assert!(!transport.state().counting_off);
        assert_eq!(transport.state().elapsed_ms, 1800);
    }

    #[test]
    fn test_start_without_countoff() {
        let mut transport = Transport::new();
        transport.start(0);
        assert_eq!(transport.phase(), TransportPhase::Playing);
        assert!(transport.state().is_playing);
        assert!(!transport.state().counting_off);
    }

    #[test]
    fn test_pause_keeps_position() {
        let mut transport = Transport::new();
        assert!(!transport.pause());

        transport.start(0);
        transport.apply_position(update(5, 2), 250);
        assert!(transport.pause());
        assert_eq!(transport.phase(), TransportPhase::Paused);
        assert!(transport.state().is_paused);
        assert!(!transport.state().is_playing);
        assert_eq!(transport.state().position(), Some(BarBeat::new(5, 2)));
        assert_eq!(transport.state().current_tempo, 96.0);
        assert!(!transport.pause());

        transport.resume();
        assert_eq!(transport.phase(), TransportPhase::Playing);
        assert!(!transport.state().is_paused);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut transport = Transport::new();
        transport.start(0);
        transport.apply_position(update(2, 1), 10);
        transport.set_repetition_count(3);

        transport.reset();
        let once = transport.state().clone();
        transport.reset();
        assert_eq!(transport.state(), &once);
        assert_eq!(once, TransportState::default());
        assert_eq!(transport.phase(), TransportPhase::Idle);
    }
}
