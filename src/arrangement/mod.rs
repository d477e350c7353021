// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Song and arrangement system.
//!
//! This module provides:
//! - Sections: bars, time signature and tempo curve
//! - Songs: ordered, contiguous section lists

pub mod section;
pub mod song;

pub use section::{is_contiguous, recalculate_start_bars, Section, TempoCurve};
pub use song::Song;
