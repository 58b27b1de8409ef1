//! Autosave and backup timers driven by explicit `Instant`s.

use crate::config::Settings;
use std::time::{Duration, Instant};

/// Fires at most once per `interval`.
#[derive(Debug, Clone)]
pub struct IntervalTimer {
    interval: Duration,
    next_due: Instant,
}

impl IntervalTimer {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next_due: now + interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn next_due(&self) -> Instant {
        self.next_due
    }

    /// Returns `true` when due and re-arms relative to `now`, so a long
    /// stall fires once instead of catching up.
    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next_due {
            return false;
        }
        self.next_due = now + self.interval;
        true
    }
}

/// Which periodic jobs are due on this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DueTasks {
    pub autosave: bool,
    pub backup: bool,
}

/// Autosave plus optional backup timer. A zero backup interval disables
/// periodic backups.
#[derive(Debug, Clone)]
pub struct Scheduler {
    autosave: IntervalTimer,
    backup: Option<IntervalTimer>,
}

impl Scheduler {
    pub fn new(autosave_interval: Duration, backup_interval: Duration, now: Instant) -> Self {
        let backup = (!backup_interval.is_zero()).then(|| IntervalTimer::new(backup_interval, now));
        Self {
            autosave: IntervalTimer::new(autosave_interval, now),
            backup,
        }
    }

    pub fn from_settings(settings: &Settings, now: Instant) -> Self {
        Self::new(settings.autosave_interval(), settings.backup_interval(), now)
    }

    pub fn poll(&mut self, now: Instant) -> DueTasks {
        DueTasks {
            autosave: self.autosave.poll(now),
            backup: self.backup.as_mut().is_some_and(|timer| timer.poll(now)),
        }
    }
}
