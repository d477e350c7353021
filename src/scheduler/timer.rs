// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! "Wake me after D" primitives for the scheduler loop.
//!
//! The scheduler never sleeps itself. It arms a timer, and whoever drives it
//! hands the fired handle back through `Scheduler::on_timer`. Handles are
//! unique per timer, so a handle that was cancelled can be recognised and
//! dropped if it is delivered anyway.

use std::time::Duration;

use tokio::time::Instant;

/// Identifies one armed wake-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Raw id, for logging
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Source of wake-ups and of "now"
pub trait Timer {
    /// Arm a wake-up `delay` from now
    fn schedule(&mut self, delay: Duration) -> TimerHandle;

    /// Disarm a wake-up; unknown or already fired handles are ignored
    fn cancel(&mut self, handle: TimerHandle);

    /// Time elapsed since the timer's epoch
    fn now(&self) -> Duration;
}

/// Virtual timer that only moves when told to.
///
/// Used by tests and for rendering a session faster than real time.
#[derive(Debug, Default)]
pub struct ManualTimer {
    now: Duration,
    next_id: u64,
    pending: Vec<(TimerHandle, Duration)>,
}

impl ManualTimer {
    /// Create a timer at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of armed wake-ups
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Deadline of the earliest armed wake-up
    pub fn next_deadline(&self) -> Option<Duration> {
        self.pending.iter().map(|(_, deadline)| *deadline).min()
    }

    /// Jump to the earliest deadline and return its handle
    pub fn fire_next(&mut self) -> Option<TimerHandle> {
        let index = self
            .pending
            .iter()
            .enumerate()
            .min_by_key(|(_, (handle, deadline))| (*deadline, handle.0))
            .map(|(index, _)| index)?;
        let (handle, deadline) = self.pending.remove(index);
        self.now = self.now.max(deadline);
        Some(handle)
    }

    /// Move time forward by `by`, returning every handle that came due in
    /// deadline order
    pub fn advance(&mut self, by: Duration) -> Vec<TimerHandle> {
        self.now += by;
        let now = self.now;
        let mut due: Vec<(TimerHandle, Duration)> = Vec::new();
        self.pending.retain(|entry| {
            if entry.1 <= now {
                due.push(*entry);
                false
            } else {
                true
            }
        });
        due.sort_by_key(|(handle, deadline)| (*deadline, handle.0));
        due.into_iter().map(|(handle, _)| handle).collect()
    }
}

impl Timer for ManualTimer {
    fn schedule(&mut self, delay: Duration) -> TimerHandle {
        self.next_id += 1;
        let handle = TimerHandle(self.next_id);
        self.pending.push((handle, self.now + delay));
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.pending.retain(|(pending, _)| *pending != handle);
    }

    fn now(&self) -> Duration {
        self.now
    }
}

/// Single-slot deadline timer for the tokio driver.
///
/// Arming replaces any earlier deadline; the driver sleeps until
/// [`DeadlineTimer::armed`] and then claims the handle with
/// [`DeadlineTimer::take_due`].
#[derive(Debug)]
pub struct DeadlineTimer {
    epoch: Instant,
    next_id: u64,
    armed: Option<(TimerHandle, Instant)>,
}

impl DeadlineTimer {
    /// Create a timer whose epoch is now
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            next_id: 0,
            armed: None,
        }
    }

    /// Currently armed wake-up
    pub fn armed(&self) -> Option<(TimerHandle, Instant)> {
        self.armed
    }

    /// Claim the armed handle if its deadline has passed
    pub fn take_due(&mut self) -> Option<TimerHandle> {
        match self.armed {
            Some((handle, deadline)) if deadline <= Instant::now() => {
                self.armed = None;
                Some(handle)
            }
            _ => None,
        }
    }
}

impl Default for DeadlineTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for DeadlineTimer {
    fn schedule(&mut self, delay: Duration) -> TimerHandle {
        self.next_id += 1;
        let handle = TimerHandle(self.next_id);
        self.armed = Some((handle, Instant::now() + delay));
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if matches!(self.armed, Some((armed, _)) if armed == handle) {
            self.armed = None;
        }
    }

    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}
