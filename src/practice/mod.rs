// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Practice mode.
//!
//! Loops a section and nudges the speed upward every few repetitions until
//! a target percentage is reached.

pub mod auto_ramp;
pub mod persistence;
pub mod session;

pub use auto_ramp::{AutoRamp, AutoRampSettings};
pub use persistence::{load_auto_ramp, save_auto_ramp};
pub use session::PracticeSession;
