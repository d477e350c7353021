// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Real-time driver.
//!
//! One task owns the practice session. It sleeps until the armed deadline,
//! takes commands from a channel and polls the song watcher, so ticks,
//! commands and reloads never interleave.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::arrangement::Section;
use crate::config::{SongEvent, SongWatcher};
use crate::practice::PracticeSession;

use super::{DeadlineTimer, PlayOptions, PlaybackMode, SchedulerEvent};

/// How often the song watcher is polled
const WATCH_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Requests accepted by [`run`]
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play(PlayOptions),
    Pause,
    Stop,
    SeekBar(u32),
    SeekTime(f64),
    SetMode(PlaybackMode),
    SetTempo(Option<f64>),
    SetSpeed(f64),
    AutoRamp(bool),
    Quit,
}

/// Everything the driver reports
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    Scheduler(SchedulerEvent),
    /// The song file changed; playback was stopped and the new sections loaded
    SongReloaded { name: String, sections: usize },
    /// The song file changed but could not be loaded; the old song stays
    SongError(String),
}

/// Drive `session` until [`Command::Quit`] or the command channel closes.
///
/// Returns the session, stopped.
pub async fn run(
    mut session: PracticeSession<DeadlineTimer>,
    mut sections: Vec<Section>,
    mut commands: mpsc::Receiver<Command>,
    events: mpsc::UnboundedSender<RuntimeEvent>,
    watcher: Option<SongWatcher>,
) -> PracticeSession<DeadlineTimer> {
    let mut poll = interval(WATCH_POLL_INTERVAL);
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(sections = sections.len(), "runtime started");
    loop {
        let deadline = session
            .scheduler()
            .timer()
            .armed()
            .map(|(_, deadline)| deadline);

        tokio::select! {
            _ = wait_for(deadline) => {
                if let Some(handle) = session.scheduler_mut().timer_mut().take_due() {
                    session.scheduler_mut().on_timer(handle);
                }
            }
            command = commands.recv() => {
                match command {
                    Some(Command::Quit) | None => {
                        session.stop();
                        forward(&mut session, &events);
                        break;
                    }
                    Some(command) => apply(&mut session, &sections, command),
                }
            }
            _ = poll.tick(), if watcher.is_some() => {
                let reloads = watcher.as_ref().map(SongWatcher::recv_all).unwrap_or_default();
                for event in reloads {
                    match event {
                        SongEvent::Reloaded(file) => {
                            sections = file.sections;
                            session.load(&sections);
                            info!(name = %file.song.name, sections = sections.len(), "song reloaded");
                            let _ = events.send(RuntimeEvent::SongReloaded {
                                name: file.song.name,
                                sections: sections.len(),
                            });
                        }
                        SongEvent::Error(message) => {
                            warn!(error = %message, "song reload failed");
                            let _ = events.send(RuntimeEvent::SongError(message));
                        }
                    }
                }
            }
        }

        forward(&mut session, &events);
    }
    info!("runtime stopped");
    session
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn apply(session: &mut PracticeSession<DeadlineTimer>, sections: &[Section], command: Command) {
    debug!(?command, "command");
    match command {
        Command::Play(options) => session.play(sections, options),
        Command::Pause => session.pause(),
        Command::Stop => session.stop(),
        Command::SeekBar(bar) => session.seek_to_bar(bar),
        Command::SeekTime(seconds) => session.seek_to_time(seconds),
        Command::SetMode(mode) => session.scheduler_mut().set_playback_mode(mode),
        Command::SetTempo(bpm) => session.scheduler_mut().set_tempo_override(bpm),
        Command::SetSpeed(percent) => session.set_speed_percent(percent),
        Command::AutoRamp(true) => session.enable_auto_ramp(),
        Command::AutoRamp(false) => session.disable_auto_ramp(),
        Command::Quit => {}
    }
}

fn forward(
    session: &mut PracticeSession<DeadlineTimer>,
    events: &mpsc::UnboundedSender<RuntimeEvent>,
) {
    for event in session.drain_events() {
        let _ = events.send(RuntimeEvent::Scheduler(event));
    }
}
