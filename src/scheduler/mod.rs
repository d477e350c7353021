// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Beat scheduler.
//!
//! This module provides the playback heartbeat:
//! - A self-rescheduling beat loop whose interval follows the tempo map
//! - Timer primitives (virtual for tests, tokio-backed for real time)
//! - A tokio driver that serializes commands and timer wake-ups

pub mod engine;
pub mod runtime;
pub mod timer;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::transport::TransportState;

pub use engine::Scheduler;
pub use runtime::{run, Command, RuntimeEvent};
pub use timer::{DeadlineTimer, ManualTimer, Timer, TimerHandle};

/// What playback drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    /// Metronome clicks only
    #[default]
    Metronome,
    /// Follow along with an attached audio clock, no clicks
    Audio,
    /// Clicks and audio clock
    Both,
}

impl PlaybackMode {
    /// Whether beats produce click events
    pub fn clicks(self) -> bool {
        matches!(self, PlaybackMode::Metronome | PlaybackMode::Both)
    }

    /// Whether the audio clock follows `current_time_seconds`
    pub fn drives_audio(self) -> bool {
        matches!(self, PlaybackMode::Audio | PlaybackMode::Both)
    }
}

impl std::str::FromStr for PlaybackMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "metronome" => Ok(PlaybackMode::Metronome),
            "audio" => Ok(PlaybackMode::Audio),
            "both" => Ok(PlaybackMode::Both),
            other => Err(format!("unknown playback mode: {}", other)),
        }
    }
}

/// External audio playback that follows the tempo map.
///
/// Decoding and output are the implementor's business; the scheduler only
/// tells it where the song is.
pub trait AudioClock {
    /// Align audio with tempo-map time in seconds
    fn sync(&mut self, seconds: f64);
    /// Hold the current audio position
    fn pause(&mut self);
    /// Stop audio and rewind
    fn stop(&mut self);
}

/// Options for a `play()` call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayOptions {
    /// Fixed BPM replacing the tempo map
    pub tempo_override: Option<f64>,
    /// Lead-in bars before the first beat
    pub countoff_bars: u32,
    /// Loop this section index instead of playing through
    pub loop_section: Option<usize>,
}

impl PlayOptions {
    /// Builder: fixed tempo
    pub fn with_tempo(mut self, bpm: f64) -> Self {
        self.tempo_override = Some(bpm);
        self
    }

    /// Builder: count-off bars
    pub fn with_countoff(mut self, bars: u32) -> Self {
        self.countoff_bars = bars;
        self
    }

    /// Builder: loop one section
    pub fn looping(mut self, section: usize) -> Self {
        self.loop_section = Some(section);
        self
    }
}

/// User-facing conditions worth a transient message
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// `play()` was called with nothing to play
    NoSections,
    /// The requested loop section does not exist; the whole song plays
    InvalidLoopSection(usize),
    /// Practice auto-ramp raised the tempo
    TempoRamped { percent: f64 },
    /// Practice auto-ramp reached its target
    RampComplete { percent: f64 },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::NoSections => write!(f, "No sections to play"),
            Notice::InvalidLoopSection(index) => {
                write!(f, "Section {} does not exist, playing the whole song", index + 1)
            }
            Notice::TempoRamped { percent } => write!(f, "Tempo increased to {:.0}%", percent),
            Notice::RampComplete { percent } => {
                write!(f, "Target tempo reached ({:.0}%)", percent)
            }
        }
    }
}

/// Everything the scheduler publishes, in tick order
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    /// A count-off or song beat was published
    Tick(TransportState),
    /// Metronome click for the beat just published
    Click { accent: bool },
    /// Playback wrapped from the loop end to the loop start
    LoopWrapped { repetition: u32 },
    /// The position moved without a beat being played
    Seeked(TransportState),
    Paused(TransportState),
    /// The last beat of the song was played
    Finished,
    Stopped,
    Notice(Notice),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_mode_flags() {
        assert!(PlaybackMode::Metronome.clicks());
        assert!(!PlaybackMode::Metronome.drives_audio());
        assert!(!PlaybackMode::Audio.clicks());
        assert!(PlaybackMode::Audio.drives_audio());
        assert!(PlaybackMode::Both.clicks() && PlaybackMode::Both.drives_audio());
    }

    #[test]
    fn test_playback_mode_parse() {
        assert_eq!("Audio".parse::<PlaybackMode>(), Ok(PlaybackMode::Audio));
        assert_eq!("both".parse::<PlaybackMode>(), Ok(PlaybackMode::Both));
        assert!("loud".parse::<PlaybackMode>().is_err());
    }

    #[test]
    fn test_play_options_builder() {
        let options = PlayOptions::default().with_tempo(90.0).with_countoff(1).looping(2);
        assert_eq!(options.tempo_override, Some(90.0));
        assert_eq!(options.countoff_bars, 1);
        assert_eq!(options.loop_section, Some(2));
    }

    #[test]
    fn test_notice_messages() {
        assert_eq!(Notice::NoSections.to_string(), "No sections to play");
        assert_eq!(
            Notice::TempoRamped { percent: 65.0 }.to_string(),
            "Tempo increased to 65%"
        );
        assert_eq!(
            Notice::InvalidLoopSection(4).to_string(),
            "Section 5 does not exist, playing the whole song"
        );
    }
}
