// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! The self-rescheduling beat loop.
//!
//! Tempo can change on every beat, so a fixed-rate timer is wrong. Each tick
//! publishes the current beat, advances, and arms the timer once more with
//! the duration of the beat it just published.
//!
//! Every command cancels the pending wake-up before it touches any state,
//! and `on_timer` drops handles that are no longer pending. A cancelled tick
//! therefore never runs, even if its wake-up was already in flight.

use std::ops::Range;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::arrangement::Section;
use crate::timing::tempo_map::{
    bar_and_beat_at_global_beat, global_beat_at_bar_and_beat, global_beat_at_seconds,
    seconds_at_global_beat, section_beat_range, song_duration_seconds, tempo_at_beat,
    total_bars, total_beats,
};
use crate::transport::{PositionUpdate, Transport, TransportPhase, TransportState};

use super::{AudioClock, Notice, PlayOptions, PlaybackMode, SchedulerEvent, Timer, TimerHandle};

/// Practice speed bounds, in percent of the mapped tempo
const MIN_SPEED_PERCENT: f64 = 10.0;
const MAX_SPEED_PERCENT: f64 = 400.0;

/// Beat scheduler over a section snapshot
pub struct Scheduler<T: Timer> {
    timer: T,
    /// The only armed wake-up this scheduler owns
    pending: Option<TimerHandle>,
    sections: Vec<Section>,
    total_beats: u64,
    transport: Transport,
    /// Next beat to publish
    global_beat: u64,
    loop_range: Option<Range<u64>>,
    tempo_override: Option<f64>,
    speed_percent: f64,
    countoff_remaining: u32,
    countoff_per_bar: u32,
    /// Start position chosen by a seek while idle
    cue_beat: Option<u64>,
    play_started: Duration,
    repetitions: u32,
    mode: PlaybackMode,
    audio: Option<Box<dyn AudioClock>>,
    events: Vec<SchedulerEvent>,
}

impl<T: Timer> Scheduler<T> {
    /// Create an idle scheduler
    pub fn new(timer: T) -> Self {
        Self {
            timer,
            pending: None,
            sections: Vec::new(),
            total_beats: 0,
            transport: Transport::new(),
            global_beat: 0,
            loop_range: None,
            tempo_override: None,
            speed_percent: 100.0,
            countoff_remaining: 0,
            countoff_per_bar: 0,
            cue_beat: None,
            play_started: Duration::ZERO,
            repetitions: 0,
            mode: PlaybackMode::default(),
            audio: None,
            events: Vec::new(),
        }
    }

    /// Attach an external audio clock
    pub fn attach_audio(&mut self, audio: Box<dyn AudioClock>) {
        self.audio = Some(audio);
    }

    /// Published transport state
    pub fn state(&self) -> &TransportState {
        self.transport.state()
    }

    /// Transport phase
    pub fn phase(&self) -> TransportPhase {
        self.transport.phase()
    }

    /// Section snapshot in use
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Beats in the current snapshot
    pub fn total_beats(&self) -> u64 {
        self.total_beats
    }

    /// Next beat to be published
    pub fn global_beat(&self) -> u64 {
        self.global_beat
    }

    /// Active loop bounds `[start, end)`
    pub fn loop_range(&self) -> Option<Range<u64>> {
        self.loop_range.clone()
    }

    /// Loop repetitions completed since the last fresh `play()`
    pub fn repetition_count(&self) -> u32 {
        self.repetitions
    }

    /// Fixed tempo in place of the tempo map
    pub fn tempo_override(&self) -> Option<f64> {
        self.tempo_override
    }

    /// Practice speed in percent
    pub fn speed_percent(&self) -> f64 {
        self.speed_percent
    }

    /// Current playback mode
    pub fn playback_mode(&self) -> PlaybackMode {
        self.mode
    }

    /// Whether a wake-up is armed
    pub fn has_pending_tick(&self) -> bool {
        self.pending.is_some()
    }

    /// The timer driving this scheduler
    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Mutable access for drivers
    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    /// Take all events published since the last call
    pub fn drain_events(&mut self) -> Vec<SchedulerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Replace the section snapshot and reset the transport.
    ///
    /// Used when the active song changes.
    pub fn load(&mut self, sections: &[Section]) {
        self.stop();
        self.sections = sections.to_vec();
        self.total_beats = total_beats(&self.sections);
        debug!(sections = self.sections.len(), beats = self.total_beats, "song loaded");
    }

    /// Start or resume playback.
    ///
    /// From pause this resumes at the held position without a count-off.
    /// Otherwise playback starts fresh at the cued position, the loop start
    /// or the top of the song. Empty songs are refused with a
    /// [`Notice::NoSections`] and leave everything untouched.
    pub fn play(&mut self, sections: &[Section], options: PlayOptions) {
        if total_beats(sections) == 0 {
            warn!("refusing to play a song without beats");
            self.emit(SchedulerEvent::Notice(Notice::NoSections));
            return;
        }

        self.cancel_pending();

        let resuming = self.transport.phase() == TransportPhase::Paused;
        let song_changed = self.sections.as_slice() != sections;
        if song_changed {
            self.sections = sections.to_vec();
            self.total_beats = total_beats(&self.sections);
            self.cue_beat = None;
        }

        self.tempo_override = options
            .tempo_override
            .filter(|bpm| bpm.is_finite() && *bpm > 0.0);
        self.loop_range = self.resolve_loop(options.loop_section);
        self.play_started = self.timer.now();

        if resuming {
            if song_changed {
                // The held beat may mean something else in the new layout
                let state = self.transport.state();
                self.global_beat = global_beat_at_bar_and_beat(
                    &self.sections,
                    state.current_bar,
                    state.current_beat,
                );
            }
            self.global_beat = self.clamp_to_playable(self.global_beat);
            self.countoff_remaining = 0;
            self.transport.resume();
            info!(beat = self.global_beat, "resuming playback");
        } else {
            let start = self
                .cue_beat
                .take()
                .or_else(|| self.loop_range.as_ref().map(|range| range.start))
                .unwrap_or(0);
            self.global_beat = self.clamp_to_playable(start);
            self.repetitions = 0;
            self.transport.reset();

            let section_index = tempo_at_beat(&self.sections, self.global_beat).section_index;
            self.countoff_per_bar = self.sections[section_index].beats_per_bar();
            self.countoff_remaining = options.countoff_bars.saturating_mul(self.countoff_per_bar);
            self.transport.start(self.countoff_remaining);
            info!(
                beat = self.global_beat,
                countoff_beats = self.countoff_remaining,
                looping = self.loop_range.is_some(),
                "starting playback"
            );
        }

        self.arm(Duration::ZERO);
    }

    /// Hold the current position
    pub fn pause(&mut self) {
        self.cancel_pending();
        if !self.transport.pause() {
            return;
        }
        self.countoff_remaining = 0;
        if self.mode.drives_audio() {
            if let Some(audio) = self.audio.as_mut() {
                audio.pause();
            }
        }
        info!(beat = self.global_beat, "playback paused");
        self.emit(SchedulerEvent::Paused(self.transport.state().clone()));
    }

    /// Stop and reset to defaults. Calling it again is a no-op.
    pub fn stop(&mut self) {
        self.cancel_pending();
        let was_idle = self.transport.phase() == TransportPhase::Idle
            && *self.transport.state() == TransportState::default();

        self.transport.reset();
        self.global_beat = 0;
        self.loop_range = None;
        self.tempo_override = None;
        self.countoff_remaining = 0;
        self.cue_beat = None;
        self.repetitions = 0;

        if was_idle {
            return;
        }
        if self.mode.drives_audio() {
            if let Some(audio) = self.audio.as_mut() {
                audio.stop();
            }
        }
        info!("playback stopped");
        self.emit(SchedulerEvent::Stopped);
    }

    /// Move to the first beat of `bar` (1-based, clamped to the song)
    pub fn seek_to_bar(&mut self, bar: u32) {
        if self.total_beats == 0 {
            return;
        }
        let bar = bar.clamp(1, total_bars(&self.sections).max(1));
        let beat = global_beat_at_bar_and_beat(&self.sections, bar, 1);
        self.seek_to_beat(beat, None);
    }

    /// Move to the beat playing at `seconds` of tempo-map time
    pub fn seek_to_time(&mut self, seconds: f64) {
        if self.total_beats == 0 {
            return;
        }
        let duration = song_duration_seconds(&self.sections);
        let seconds = if seconds.is_finite() {
            seconds.clamp(0.0, duration)
        } else {
            0.0
        };
        let requested = global_beat_at_seconds(&self.sections, seconds).floor() as u64;
        let beat = requested.min(self.total_beats - 1);
        // Past the last beat the position snaps to that beat's start
        self.seek_to_beat(beat, (beat == requested).then_some(seconds));
    }

    /// Change what playback drives; takes effect immediately
    pub fn set_playback_mode(&mut self, mode: PlaybackMode) {
        let previous = self.mode;
        self.mode = mode;
        if let Some(audio) = self.audio.as_mut() {
            if !previous.drives_audio() && mode.drives_audio() && self.transport.is_running() {
                audio.sync(self.transport.state().current_time_seconds);
            } else if previous.drives_audio() && !mode.drives_audio() {
                audio.pause();
            }
        }
        debug!(?mode, "playback mode changed");
    }

    /// Replace the tempo map with a fixed BPM from the next tick on
    pub fn set_tempo_override(&mut self, bpm: Option<f64>) {
        self.tempo_override = bpm.filter(|bpm| bpm.is_finite() && *bpm > 0.0);
    }

    /// Scale every tempo by `percent` from the next tick on
    pub fn set_speed_percent(&mut self, percent: f64) {
        if !percent.is_finite() {
            return;
        }
        self.speed_percent = percent.clamp(MIN_SPEED_PERCENT, MAX_SPEED_PERCENT);
        debug!(percent = self.speed_percent, "speed changed");
    }

    /// Deliver a fired wake-up. Stale handles are ignored.
    pub fn on_timer(&mut self, handle: TimerHandle) {
        if self.pending != Some(handle) {
            trace!(id = handle.id(), "ignoring stale tick");
            return;
        }
        self.pending = None;
        self.tick();
    }

    fn tick(&mut self) {
        if !self.transport.is_running() {
            return;
        }

        let at = tempo_at_beat(&self.sections, self.global_beat);
        let tempo = self.effective_tempo(at.tempo);
        let interval = Duration::from_secs_f64(60.0 / tempo);
        let elapsed_ms = self.elapsed_ms();

        if self.countoff_remaining > 0 {
            let accent = self.countoff_per_bar > 0
                && self.countoff_remaining % self.countoff_per_bar == 0;
            self.countoff_remaining -= 1;
            self.transport
                .apply_countoff(self.countoff_remaining, tempo, elapsed_ms);
            trace!(remaining = self.countoff_remaining, "count-off beat");
            self.publish_beat(accent);
        } else {
            let position = bar_and_beat_at_global_beat(&self.sections, self.global_beat);
            let time_seconds = seconds_at_global_beat(&self.sections, self.global_beat);
            self.transport.apply_position(
                PositionUpdate {
                    position,
                    tempo,
                    section_index: at.section_index,
                    section_id: at.section_id,
                    time_seconds,
                },
                elapsed_ms,
            );
            if self.mode.drives_audio() {
                if let Some(audio) = self.audio.as_mut() {
                    audio.sync(time_seconds);
                }
            }
            trace!(%position, tempo, "beat");
            self.publish_beat(position.beat == 1);

            self.global_beat += 1;
            if let Some(range) = self.loop_range.clone() {
                if self.global_beat >= range.end {
                    self.global_beat = range.start;
                    self.repetitions += 1;
                    self.transport.set_repetition_count(self.repetitions);
                    debug!(repetition = self.repetitions, "loop wrapped");
                    self.emit(SchedulerEvent::LoopWrapped {
                        repetition: self.repetitions,
                    });
                }
            } else if self.global_beat >= self.total_beats {
                info!("reached the end of the song");
                self.emit(SchedulerEvent::Finished);
                self.stop();
                return;
            }
        }

        self.arm(interval);
    }

    fn seek_to_beat(&mut self, requested: u64, seconds: Option<f64>) {
        let was_running = self.transport.is_running();
        self.cancel_pending();

        let beat = self.clamp_to_playable(requested);
        let time_seconds = match seconds {
            Some(seconds) if beat == requested => seconds,
            _ => seconds_at_global_beat(&self.sections, beat),
        };
        let at = tempo_at_beat(&self.sections, beat);
        let tempo = self.effective_tempo(at.tempo);

        self.global_beat = beat;
        self.transport.set_position(PositionUpdate {
            position: bar_and_beat_at_global_beat(&self.sections, beat),
            tempo,
            section_index: at.section_index,
            section_id: at.section_id,
            time_seconds,
        });
        if self.transport.phase() == TransportPhase::Idle {
            self.cue_beat = Some(beat);
        }
        if self.mode.drives_audio() {
            if let Some(audio) = self.audio.as_mut() {
                audio.sync(time_seconds);
            }
        }
        debug!(beat, time_seconds, "seek");
        self.emit(SchedulerEvent::Seeked(self.transport.state().clone()));

        if was_running {
            if self.countoff_remaining > 0 {
                self.countoff_remaining = 0;
                let elapsed_ms = self.elapsed_ms();
                self.transport.apply_countoff(0, tempo, elapsed_ms);
            }
            self.arm(Duration::ZERO);
        }
    }

    fn resolve_loop(&mut self, loop_section: Option<usize>) -> Option<Range<u64>> {
        let index = loop_section?;
        match section_beat_range(&self.sections, index) {
            Some(range) if !range.is_empty() => Some(range),
            _ => {
                warn!(index, "loop section out of range, playing the whole song");
                self.emit(SchedulerEvent::Notice(Notice::InvalidLoopSection(index)));
                None
            }
        }
    }

    fn clamp_to_playable(&self, beat: u64) -> u64 {
        match &self.loop_range {
            Some(range) => beat.clamp(range.start, range.end - 1),
            None => beat.min(self.total_beats.saturating_sub(1)),
        }
    }

    fn effective_tempo(&self, mapped: f64) -> f64 {
        let base = self.tempo_override.unwrap_or(mapped);
        (base * self.speed_percent / 100.0).max(1.0)
    }

    fn elapsed_ms(&self) -> u64 {
        self.timer.now().saturating_sub(self.play_started).as_millis() as u64
    }

    fn publish_beat(&mut self, accent: bool) {
        self.emit(SchedulerEvent::Tick(self.transport.state().clone()));
        if self.mode.clicks() {
            self.emit(SchedulerEvent::Click { accent });
        }
    }

    fn arm(&mut self, delay: Duration) {
        self.cancel_pending();
        self.pending = Some(self.timer.schedule(delay));
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.timer.cancel(handle);
        }
    }

    fn emit(&mut self, event: SchedulerEvent) {
        self.events.push(event);
    }
}

impl<T: Timer> Drop for Scheduler<T> {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
