// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! A scheduler with the auto-ramp policy wired to its loop repetitions.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::arrangement::Section;
use crate::error::Result;
use crate::scheduler::{Notice, PlayOptions, Scheduler, SchedulerEvent, Timer};
use crate::transport::TransportPhase;

use super::{save_auto_ramp, AutoRamp, AutoRampSettings};

/// Practice session.
///
/// Every `LoopWrapped` event drained from the scheduler is fed to the
/// auto-ramp; due steps raise the scheduler's speed and add a
/// [`Notice::TempoRamped`] right after the wrap.
pub struct PracticeSession<T: Timer> {
    scheduler: Scheduler<T>,
    ramp: AutoRamp,
    settings_path: Option<PathBuf>,
}

impl<T: Timer> PracticeSession<T> {
    pub fn new(scheduler: Scheduler<T>, settings: AutoRampSettings) -> Self {
        Self {
            scheduler,
            ramp: AutoRamp::new(settings),
            settings_path: None,
        }
    }

    /// Persist auto-ramp changes to `path`
    pub fn with_settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    pub fn scheduler(&self) -> &Scheduler<T> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler<T> {
        &mut self.scheduler
    }

    pub fn ramp(&self) -> &AutoRamp {
        &self.ramp
    }

    /// Ramp progress at the current speed
    pub fn progress(&self) -> f64 {
        self.ramp.progress(self.scheduler.speed_percent())
    }

    pub fn load(&mut self, sections: &[Section]) {
        self.stop();
        self.scheduler.load(sections);
    }

    /// Start or resume; a fresh start counts repetitions from zero again
    pub fn play(&mut self, sections: &[Section], options: PlayOptions) {
        if self.scheduler.phase() != TransportPhase::Paused {
            self.ramp.reset_repetitions();
        }
        self.scheduler.play(sections, options);
    }

    pub fn pause(&mut self) {
        self.scheduler.pause();
    }

    /// Stop playback; this also leaves practice mode
    pub fn stop(&mut self) {
        self.scheduler.stop();
        if self.ramp.is_enabled() {
            self.ramp.disable();
            self.persist();
        }
    }

    pub fn seek_to_bar(&mut self, bar: u32) {
        self.scheduler.seek_to_bar(bar);
    }

    pub fn seek_to_time(&mut self, seconds: f64) {
        self.scheduler.seek_to_time(seconds);
    }

    pub fn set_speed_percent(&mut self, percent: f64) {
        self.scheduler.set_speed_percent(percent);
    }

    /// Start ramping from the speed currently in effect
    pub fn enable_auto_ramp(&mut self) {
        self.ramp.enable(self.scheduler.speed_percent());
        self.persist();
    }

    pub fn disable_auto_ramp(&mut self) {
        self.ramp.disable();
        self.persist();
    }

    pub fn set_target(&mut self, percent: f64) -> Result<()> {
        self.ramp.set_target(percent)?;
        self.persist();
        Ok(())
    }

    pub fn set_step(&mut self, percent: f64) -> Result<()> {
        self.ramp.set_step(percent)?;
        self.persist();
        Ok(())
    }

    pub fn set_loops_per_step(&mut self, loops: u32) -> Result<()> {
        self.ramp.set_loops_per_step(loops)?;
        self.persist();
        Ok(())
    }

    /// Scheduler events with ramp notices spliced in
    pub fn drain_events(&mut self) -> Vec<SchedulerEvent> {
        let drained = self.scheduler.drain_events();
        let mut events = Vec::with_capacity(drained.len());

        for event in drained {
            let repetition = match &event {
                SchedulerEvent::LoopWrapped { repetition } => Some(*repetition),
                _ => None,
            };
            events.push(event);

            let Some(count) = repetition else {
                continue;
            };
            let playing = self.scheduler.state().is_playing;
            let current = self.scheduler.speed_percent();
            if let Some(next) = self.ramp.on_repetition(count, current, playing) {
                self.scheduler.set_speed_percent(next);
                info!(repetition = count, percent = next, "auto-ramp step");
                events.push(SchedulerEvent::Notice(Notice::TempoRamped { percent: next }));
                if self.ramp.is_complete(next) {
                    events.push(SchedulerEvent::Notice(Notice::RampComplete { percent: next }));
                }
            }
        }
        events
    }

    fn persist(&self) {
        let Some(path) = self.settings_path.as_deref() else {
            return;
        };
        if let Err(e) = save_auto_ramp(path, self.ramp.settings()) {
            warn!(path = %path.display(), error = %e, "failed to save auto-ramp settings");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrangement::recalculate_start_bars;
    use crate::practice::load_auto_ramp;
    use crate::scheduler::ManualTimer;

    fn one_bar_loop() -> Vec<Section> {
        let mut sections = vec![Section::new("a", 1, 120.0), Section::new("b", 1, 100.0)];
        recalculate_start_bars(&mut sections);
        sections
    }

    fn drive(session: &mut PracticeSession<ManualTimer>, ticks: usize) -> Vec<SchedulerEvent> {
        let mut events = Vec::new();
        for _ in 0..ticks {
            let Some(handle) = session.scheduler_mut().timer_mut().fire_next() else {
                break;
            };
            session.scheduler_mut().on_timer(handle);
            events.extend(session.drain_events());
        }
        events
    }

    fn ramp_notices(events: &[SchedulerEvent]) -> Vec<f64> {
        events
            .iter()
            .filter_map(|event| match event {
                SchedulerEvent::Notice(Notice::TempoRamped { percent }) => Some(*percent),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_ramp_follows_loop_wraps() {
        let sections = one_bar_loop();
        let settings = AutoRampSettings {
            loops_per_step: 2,
            step_percent: 10.0,
            ..AutoRampSettings::default()
        };
        let mut session = PracticeSession::new(Scheduler::new(ManualTimer::new()), settings);
        session.set_speed_percent(60.0);
        session.enable_auto_ramp();
        session.play(&sections, PlayOptions::default().looping(1));

        // 4 beats per repetition, 8 repetitions
        let events = drive(&mut session, 32);
        assert_eq!(ramp_notices(&events), vec![70.0, 80.0, 90.0, 100.0]);
        assert!(events.contains(&SchedulerEvent::Notice(Notice::RampComplete { percent: 100.0 })));
        assert_eq!(session.scheduler().speed_percent(), 100.0);
        assert_eq!(session.progress(), 1.0);
    }

    #[test]
    fn test_ramp_steps_after_restart() {
        let sections = one_bar_loop();
        let settings = AutoRampSettings {
            loops_per_step: 1,
            ..AutoRampSettings::default()
        };
        let mut session = PracticeSession::new(Scheduler::new(ManualTimer::new()), settings);
        session.set_speed_percent(60.0);
        session.enable_auto_ramp();
        session.play(&sections, PlayOptions::default().looping(0));
        assert_eq!(ramp_notices(&drive(&mut session, 4)), vec![65.0]);

        // starting over counts repetitions from zero again
        session.play(&sections, PlayOptions::default().looping(0));
        let events = drive(&mut session, 4);
        assert!(events.contains(&SchedulerEvent::LoopWrapped { repetition: 1 }));
        assert_eq!(ramp_notices(&events), vec![70.0]);
        assert_eq!(session.scheduler().speed_percent(), 70.0);
    }

    #[test]
    fn test_ramp_counts_across_pause_and_resume() {
        let sections = one_bar_loop();
        let settings = AutoRampSettings {
            loops_per_step: 2,
            step_percent: 10.0,
            ..AutoRampSettings::default()
        };
        let mut session = PracticeSession::new(Scheduler::new(ManualTimer::new()), settings);
        session.set_speed_percent(60.0);
        session.enable_auto_ramp();
        session.play(&sections, PlayOptions::default().looping(1));
        assert!(ramp_notices(&drive(&mut session, 4)).is_empty());

        session.pause();
        assert!(ramp_notices(&session.drain_events()).is_empty());
        assert!(session.ramp().is_enabled());

        session.play(&sections, PlayOptions::default().looping(1));
        let events = drive(&mut session, 4);
        assert!(events.contains(&SchedulerEvent::LoopWrapped { repetition: 2 }));
        assert_eq!(ramp_notices(&events), vec![70.0]);
        assert_eq!(session.scheduler().repetition_count(), 2);
    }

    #[test]
    fn test_ramped_speed_reaches_the_beat() {
        let sections = one_bar_loop();
        let settings = AutoRampSettings {
            loops_per_step: 1,
            ..AutoRampSettings::default()
        };
        let mut session = PracticeSession::new(Scheduler::new(ManualTimer::new()), settings);
        session.set_speed_percent(50.0);
        session.enable_auto_ramp();
        session.play(&sections, PlayOptions::default().looping(0));

        drive(&mut session, 5);
        // 120 BPM at 55%
        assert_eq!(session.scheduler().state().current_tempo, 66.0);
    }

    #[test]
    fn test_no_ramp_without_enable() {
        let sections = one_bar_loop();
        let mut session =
            PracticeSession::new(Scheduler::new(ManualTimer::new()), AutoRampSettings::default());
        session.play(&sections, PlayOptions::default().looping(0));

        let events = drive(&mut session, 40);
        assert!(ramp_notices(&events).is_empty());
        assert_eq!(session.scheduler().speed_percent(), 100.0);
    }

    #[test]
    fn test_stop_leaves_practice_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let mut session =
            PracticeSession::new(Scheduler::new(ManualTimer::new()), AutoRampSettings::default())
                .with_settings_path(&path);

        session.set_speed_percent(75.0);
        session.enable_auto_ramp();
        session.set_target(90.0).unwrap();
        let saved = load_auto_ramp(&path);
        assert!(saved.enabled);
        assert_eq!(saved.start_percent, 75.0);
        assert_eq!(saved.target_percent, 90.0);

        session.play(&one_bar_loop(), PlayOptions::default());
        session.stop();
        assert!(!session.ramp().is_enabled());
        assert!(!load_auto_ramp(&path).enabled);
    }
}
