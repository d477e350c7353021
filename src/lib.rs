// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Tempo-mapped timeline scheduler.
//!
//! A song is an ordered list of sections, each with its own bar count, time
//! signature and a tempo that may ramp. This crate maps between global
//! beats, bar/beat positions and seconds under that tempo map, and drives a
//! self-rescheduling beat loop with count-off, looping, seeking and a
//! practice auto-ramp.

pub mod arrangement;
pub mod config;
pub mod error;
pub mod practice;
pub mod scheduler;
pub mod timing;
pub mod transport;

pub use arrangement::{Section, Song, TempoCurve};
pub use error::{Result, TimelineError};
pub use scheduler::{PlayOptions, PlaybackMode, Scheduler, SchedulerEvent};
pub use timing::BarBeat;
pub use transport::{TransportPhase, TransportState};
