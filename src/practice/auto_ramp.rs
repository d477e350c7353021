// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Stepped tempo increase driven by loop repetitions.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TimelineError};

/// Persisted auto-ramp configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoRampSettings {
    pub enabled: bool,
    /// Speed in effect when the ramp was switched on
    pub start_percent: f64,
    /// Ceiling for the ramp
    pub target_percent: f64,
    /// Increase applied per step
    pub step_percent: f64,
    /// Loop repetitions between steps
    pub loops_per_step: u32,
}

impl Default for AutoRampSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            start_percent: 60.0,
            target_percent: 100.0,
            step_percent: 5.0,
            loops_per_step: 4,
        }
    }
}

impl AutoRampSettings {
    /// Replace unusable values with their defaults
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let percent = |value: f64, fallback: f64| {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                fallback
            }
        };
        Self {
            enabled: self.enabled,
            start_percent: percent(self.start_percent, defaults.start_percent),
            target_percent: percent(self.target_percent, defaults.target_percent),
            step_percent: percent(self.step_percent, defaults.step_percent),
            loops_per_step: if self.loops_per_step == 0 {
                defaults.loops_per_step
            } else {
                self.loops_per_step
            },
        }
    }
}

/// Auto-ramp policy.
///
/// Holds no tempo of its own: callers pass in the speed currently in effect
/// and apply whatever step comes back.
#[derive(Debug, Clone, Default)]
pub struct AutoRamp {
    settings: AutoRampSettings,
    last_repetition: u32,
}

impl AutoRamp {
    pub fn new(settings: AutoRampSettings) -> Self {
        Self {
            settings: settings.sanitized(),
            last_repetition: 0,
        }
    }

    pub fn settings(&self) -> &AutoRampSettings {
        &self.settings
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// Switch on, ramping from `current_percent`
    pub fn enable(&mut self, current_percent: f64) {
        self.settings.enabled = true;
        if current_percent.is_finite() && current_percent > 0.0 {
            self.settings.start_percent = current_percent;
        }
        self.last_repetition = 0;
        debug!(start = self.settings.start_percent, "auto-ramp enabled");
    }

    pub fn disable(&mut self) {
        self.settings.enabled = false;
        self.last_repetition = 0;
        debug!("auto-ramp disabled");
    }

    /// Forget the last repetition count seen; playback restarted from 0
    pub fn reset_repetitions(&mut self) {
        self.last_repetition = 0;
    }

    pub fn set_target(&mut self, percent: f64) -> Result<()> {
        self.settings.target_percent = positive_percent("target percent", percent)?;
        Ok(())
    }

    pub fn set_step(&mut self, percent: f64) -> Result<()> {
        self.settings.step_percent = positive_percent("step percent", percent)?;
        Ok(())
    }

    pub fn set_loops_per_step(&mut self, loops: u32) -> Result<()> {
        if loops == 0 {
            return Err(TimelineError::InvalidSetting {
                name: "loops per step",
                value: loops.to_string(),
            });
        }
        self.settings.loops_per_step = loops;
        Ok(())
    }

    /// React to a repetition count.
    ///
    /// Returns the new speed when a step is due. Repeated counts, counts
    /// while stopped and steps that would not raise the speed yield `None`.
    pub fn on_repetition(&mut self, count: u32, current_percent: f64, playing: bool) -> Option<f64> {
        if !self.settings.enabled || !playing || count == self.last_repetition {
            return None;
        }
        self.last_repetition = count;

        if count == 0 || count % self.settings.loops_per_step != 0 {
            return None;
        }
        let next = (current_percent + self.settings.step_percent).min(self.settings.target_percent);
        (next > current_percent).then_some(next)
    }

    /// Fraction of the way from start to target, in `[0, 1]`
    pub fn progress(&self, current_percent: f64) -> f64 {
        let span = self.settings.target_percent - self.settings.start_percent;
        if span.abs() < f64::EPSILON {
            return if current_percent >= self.settings.target_percent {
                1.0
            } else {
                0.0
            };
        }
        ((current_percent - self.settings.start_percent) / span).clamp(0.0, 1.0)
    }

    /// Whether `current_percent` has reached the target
    pub fn is_complete(&self, current_percent: f64) -> bool {
        current_percent >= self.settings.target_percent
    }
}

fn positive_percent(name: &'static str, percent: f64) -> Result<f64> {
    if percent.is_finite() && percent > 0.0 {
        Ok(percent)
    } else {
        Err(TimelineError::InvalidSetting {
            name,
            value: percent.to_string(),
        })
    }
}
