// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use timeline::config::{default_settings_path, validate_song, Settings, SongFile, SongWatcher};
use timeline::practice::{load_auto_ramp, PracticeSession};
use timeline::scheduler::{
    run, Command, DeadlineTimer, PlayOptions, RuntimeEvent, Scheduler, SchedulerEvent,
};
use timeline::timing::{
    seconds_at_global_beat, section_beat_range, song_duration_seconds, tempo_at_beat,
    total_bars, total_beats,
};

fn print_usage() {
    println!("Timeline - Tempo-mapped practice metronome");
    println!();
    println!("Usage: timeline [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --info <SONG>            Print the tempo map of a song file");
    println!("  --play <SONG> [FLAGS]    Play a song file");
    println!("      --tempo <BPM>        Fixed tempo instead of the tempo map");
    println!("      --countoff <BARS>    Count-off bars (default from settings)");
    println!("      --loop <N>           Loop section N (1-based)");
    println!("      --practice           Loop with auto-ramp from the saved settings");
    println!("  --ramp-settings          Show saved auto-ramp settings");
    println!("  --help                   Show this help message");
    println!();
    println!("While playing: p pause, r resume, s stop, b N seek to bar,");
    println!("t SEC seek to seconds, m MODE playback mode, q quit");
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn format_time(seconds: f64) -> String {
    let whole = seconds.max(0.0);
    format!("{}:{:05.2}", (whole / 60.0).floor() as u64, whole % 60.0)
}

fn print_info(path: &Path) -> Result<()> {
    let file = SongFile::load(path)?;
    let sections = &file.sections;

    println!("{}", file.song.name);
    for warning in validate_song(sections) {
        println!("  warning: {}", warning);
    }
    println!();
    println!(
        "  #  {:<12} {:>9}  {:<5} {:>13}  {}",
        "section", "bars", "meter", "tempo", "starts"
    );

    for (index, section) in sections.iter().enumerate() {
        let Some(range) = section_beat_range(sections, index) else {
            continue;
        };
        let first = tempo_at_beat(sections, range.start).tempo;
        let last = tempo_at_beat(sections, range.end.saturating_sub(1).max(range.start)).tempo;
        let tempo = if first == last {
            format!("{:.0}", first)
        } else {
            format!("{:.0} -> {:.0}", first, last)
        };
        println!(
            "{:>3}  {:<12} {:>4}-{:<4}  {:<5} {:>13}  {}",
            index + 1,
            section.id,
            section.start_bar,
            section.end_bar(),
            section.time_signature,
            tempo,
            format_time(seconds_at_global_beat(sections, range.start)),
        );
    }

    println!();
    println!(
        "{} bars, {} beats, {}",
        total_bars(sections),
        total_beats(sections),
        format_time(song_duration_seconds(sections))
    );
    Ok(())
}

fn print_ramp_settings() -> Result<()> {
    let path = default_settings_path();
    let settings = load_auto_ramp(&path);
    println!("Auto-ramp settings ({})", path.display());
    println!("  enabled:        {}", settings.enabled);
    println!("  start:          {:.0}%", settings.start_percent);
    println!("  target:         {:.0}%", settings.target_percent);
    println!("  step:           {:.0}%", settings.step_percent);
    println!("  loops per step: {}", settings.loops_per_step);
    Ok(())
}

/// Flags following `--play <SONG>`
#[derive(Debug, Default)]
struct PlayArgs {
    tempo: Option<f64>,
    countoff: Option<u32>,
    loop_section: Option<usize>,
    practice: bool,
}

fn parse_play_args(args: &[String]) -> Result<PlayArgs> {
    let mut parsed = PlayArgs::default();
    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        let mut value = |name: &str| {
            iter.next()
                .ok_or_else(|| anyhow!("{} requires a value", name))
                .cloned()
        };
        match flag.as_str() {
            "--tempo" => {
                let raw = value("--tempo")?;
                parsed.tempo = Some(raw.parse().with_context(|| format!("Invalid tempo: {}", raw))?);
            }
            "--countoff" => {
                let raw = value("--countoff")?;
                parsed.countoff =
                    Some(raw.parse().with_context(|| format!("Invalid count-off: {}", raw))?);
            }
            "--loop" => {
                let raw = value("--loop")?;
                let section: usize =
                    raw.parse().with_context(|| format!("Invalid section: {}", raw))?;
                if section == 0 {
                    return Err(anyhow!("Sections are numbered from 1"));
                }
                parsed.loop_section = Some(section - 1);
            }
            "--practice" => parsed.practice = true,
            other => return Err(anyhow!("Unknown play option: {}", other)),
        }
    }
    Ok(parsed)
}

fn parse_command(line: &str, options: &PlayOptions) -> Option<Command> {
    let mut words = line.split_whitespace();
    let command = match (words.next()?, words.next()) {
        ("p", None) => Command::Pause,
        ("r", None) => Command::Play(options.clone()),
        ("s", None) => Command::Stop,
        ("q", None) => Command::Quit,
        ("b", Some(bar)) => Command::SeekBar(bar.parse().ok()?),
        ("t", Some(seconds)) => Command::SeekTime(seconds.parse().ok()?),
        ("m", Some(mode)) => Command::SetMode(mode.parse().ok()?),
        _ => return None,
    };
    Some(command)
}

fn print_event(event: &RuntimeEvent) {
    match event {
        RuntimeEvent::Scheduler(SchedulerEvent::Tick(state)) if state.position().is_none() => {
            println!("  count-off {}", state.countoff_beats_remaining + 1);
        }
        RuntimeEvent::Scheduler(SchedulerEvent::Tick(state)) => {
            if let Some(position) = state.position() {
                println!(
                    "{:>6}  {:>4.0} BPM  {}  {}",
                    position.to_string(),
                    state.current_tempo,
                    format_time(state.current_time_seconds),
                    state.current_section_id.as_deref().unwrap_or("-"),
                );
            }
        }
        RuntimeEvent::Scheduler(SchedulerEvent::Seeked(state)) => {
            if let Some(position) = state.position() {
                println!("  -> {}", position);
            }
        }
        RuntimeEvent::Scheduler(SchedulerEvent::Paused(_)) => println!("  paused"),
        RuntimeEvent::Scheduler(SchedulerEvent::LoopWrapped { repetition }) => {
            println!("  loop {}", repetition + 1);
        }
        RuntimeEvent::Scheduler(SchedulerEvent::Finished) => println!("  finished"),
        RuntimeEvent::Scheduler(SchedulerEvent::Stopped) => println!("  stopped"),
        RuntimeEvent::Scheduler(SchedulerEvent::Notice(notice)) => println!("* {}", notice),
        RuntimeEvent::Scheduler(SchedulerEvent::Click { .. }) => {}
        RuntimeEvent::SongReloaded { name, sections } => {
            println!("* Reloaded {} ({} sections)", name, sections);
        }
        RuntimeEvent::SongError(message) => println!("* Reload failed: {}", message),
    }
}

async fn play(path: PathBuf, args: PlayArgs) -> Result<()> {
    let settings_path = default_settings_path();
    let settings = Settings::load_or_default(&settings_path);
    let file = SongFile::load(&path)?;
    for warning in validate_song(&file.sections) {
        warn!("{}", warning);
    }

    let mut options = file.play_options(&settings.playback);
    if let Some(tempo) = args.tempo {
        options.tempo_override = Some(tempo);
    }
    if let Some(bars) = args.countoff {
        options.countoff_bars = bars;
    }
    if args.loop_section.is_some() {
        options.loop_section = args.loop_section;
    }

    let mut scheduler = Scheduler::new(DeadlineTimer::new());
    scheduler.set_playback_mode(file.playback_mode(&settings.playback));
    let mut session =
        PracticeSession::new(scheduler, settings.auto_ramp).with_settings_path(settings_path);

    if args.practice {
        if options.loop_section.is_none() {
            info!("practice mode loops the first section");
            options.loop_section = Some(0);
        }
        session.set_speed_percent(settings.auto_ramp.start_percent);
        session.enable_auto_ramp();
    }

    let watcher = match SongWatcher::new(&path, None) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!(error = %e, "hot reload unavailable");
            None
        }
    };

    let (command_tx, command_rx) = mpsc::channel(16);
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let quit_tx = command_tx.clone();
    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            print_event(&event);
            if matches!(event, RuntimeEvent::Scheduler(SchedulerEvent::Finished)) {
                let _ = quit_tx.send(Command::Quit).await;
            }
        }
    });

    let interrupt_tx = command_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = interrupt_tx.send(Command::Quit).await;
        }
    });

    let stdin_tx = command_tx.clone();
    let resume_options = options.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match parse_command(line.trim(), &resume_options) {
                Some(command) => {
                    if stdin_tx.send(command).await.is_err() {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => println!("? unknown command: {}", line.trim()),
            }
        }
    });

    command_tx
        .send(Command::Play(options))
        .await
        .map_err(|_| anyhow!("Runtime closed before playback started"))?;
    drop(command_tx);

    let session = run(session, file.sections, command_rx, event_tx, watcher).await;
    // the event channel is closed now; let the printer flush
    let _ = printer.await;
    info!(
        speed = session.scheduler().speed_percent(),
        "session ended"
    );
    Ok(())
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("Timeline - Tempo-mapped practice metronome");
        println!("Run with --help for usage information");
        return Ok(());
    }

    init_logging();

    match args[1].as_str() {
        "--info" => {
            if args.len() < 3 {
                eprintln!("Error: --info requires a song file");
                std::process::exit(1);
            }
            print_info(Path::new(&args[2]))?;
        }
        "--play" => {
            if args.len() < 3 {
                eprintln!("Error: --play requires a song file");
                std::process::exit(1);
            }
            let play_args = parse_play_args(&args[3..])?;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to start runtime")?;
            let result = runtime.block_on(play(PathBuf::from(&args[2]), play_args));
            // stdin reads never return on their own
            runtime.shutdown_background();
            result?;
        }
        "--ramp-settings" => {
            print_ramp_settings()?;
        }
        "--help" | "-h" => {
            print_usage();
        }
        _ => {
            eprintln!("Unknown option: {}", args[1]);
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}
