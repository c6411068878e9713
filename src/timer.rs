//! The timer state machine. All transitions are total functions over an owned
//! [TimerState] taking an explicit `now`; invalid transitions (pausing a
//! stopped timer and the like) are no-ops rather than errors, so callers never
//! need to pre-check the status.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TimerStatus {
    #[default]
    Stopped,
    Running,
    Paused,
}

/// The single persisted record of truth for the work timer.
///
/// `elapsed_ms` accumulates finished running intervals of the current session;
/// while Running the authoritative session duration is
/// `elapsed_ms + (now - start_time)`, see [TimerState::current_session_ms].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub status: TimerStatus,
    /// Beginning of the current running interval. Meaningless unless Running.
    pub start_time: Option<DateTime<Utc>>,
    pub elapsed_ms: u64,
    pub today_total_ms: u64,
    pub distraction_ms: u64,
    /// Distinguishes an idle-triggered pause from a deliberate one. Affects
    /// resume UX only.
    pub auto_paused: bool,
    pub last_saved: DateTime<Utc>,
    pub date: NaiveDate,
}

impl TimerState {
    /// A never-used timer: Stopped, all counters zero.
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            status: TimerStatus::Stopped,
            start_time: None,
            elapsed_ms: 0,
            today_total_ms: 0,
            distraction_ms: 0,
            auto_paused: false,
            last_saved: now,
            date: now.date_naive(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    /// Whether the timer is effectively counting. Drives tab tracking, idle
    /// polling, reminders and the lock-in overlay.
    pub fn is_active(&self) -> bool {
        self.status == TimerStatus::Running
    }

    /// Authoritative duration of the current session. Pure read, used by the
    /// display tick.
    pub fn current_session_ms(&self, now: DateTime<Utc>) -> u64 {
        match (self.status, self.start_time) {
            (TimerStatus::Running, Some(start)) => {
                self.elapsed_ms + ms_between(start, now)
            }
            _ => self.elapsed_ms,
        }
    }

    /// Fold the live interval into `elapsed_ms` and rebase `start_time` on
    /// `now`. Persisting a checkpointed record keeps `now - last_saved` equal
    /// to the unaccounted gap a later [TimerState::restore] adds back.
    pub fn checkpoint(&mut self, now: DateTime<Utc>) {
        if let (TimerStatus::Running, Some(start)) = (self.status, self.start_time) {
            self.elapsed_ms += ms_between(start, now);
            self.start_time = Some(now);
        }
    }

    /// Start a stopped timer, or resume a paused one. No-op while Running.
    pub fn start(&mut self, now: DateTime<Utc>) {
        match self.status {
            TimerStatus::Stopped => {
                self.status = TimerStatus::Running;
                self.start_time = Some(now);
                self.elapsed_ms = 0;
                self.auto_paused = false;
            }
            TimerStatus::Paused => {
                self.status = TimerStatus::Running;
                self.start_time = Some(now);
                self.auto_paused = false;
            }
            TimerStatus::Running => {}
        }
    }

    /// Alias of [TimerState::start]; reads better at resume call sites.
    pub fn resume(&mut self, now: DateTime<Utc>) {
        self.start(now);
    }

    /// Freeze the current running interval into `elapsed_ms`. Only valid from
    /// Running.
    pub fn pause(&mut self, now: DateTime<Utc>) {
        self.pause_inner(now, false);
    }

    /// A pause requested by the idle monitor rather than the user.
    pub fn auto_pause(&mut self, now: DateTime<Utc>) {
        self.pause_inner(now, true);
    }

    fn pause_inner(&mut self, now: DateTime<Utc>, auto: bool) {
        if let (TimerStatus::Running, Some(start)) = (self.status, self.start_time) {
            self.elapsed_ms += ms_between(start, now);
            self.status = TimerStatus::Paused;
            self.start_time = None;
            self.auto_paused = auto;
        }
    }

    /// Finish the session: fold its duration into `today_total_ms` and reset
    /// to Stopped. Idempotent on an already-stopped timer.
    pub fn stop(&mut self, now: DateTime<Utc>) {
        if self.status == TimerStatus::Stopped {
            return;
        }
        self.today_total_ms += self.current_session_ms(now);
        self.status = TimerStatus::Stopped;
        self.start_time = None;
        self.elapsed_ms = 0;
        self.auto_paused = false;
    }

    /// Reset the daily aggregates when the stored date differs from `today`.
    /// An in-progress Running/Paused session is left untouched.
    pub fn rollover(&mut self, today: NaiveDate) {
        if self.date != today {
            self.today_total_ms = 0;
            self.distraction_ms = 0;
            self.date = today;
        }
    }

    /// Session restore after a crash or reload. A Running session gains the
    /// gap since the last persist, so at most one persist interval is lost; a
    /// Paused or Stopped record is returned unchanged.
    pub fn restore(&mut self, now: DateTime<Utc>) {
        if self.status == TimerStatus::Running {
            self.elapsed_ms += ms_between(self.last_saved, now);
            self.start_time = Some(now);
        }
    }
}

fn ms_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    (to - from).num_milliseconds().max(0) as u64
}
