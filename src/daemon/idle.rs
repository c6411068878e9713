//! Idle detection. A shared [ActivityClock] is advanced by every observed
//! activity signal; a polling task compares it against the inactivity
//! threshold and requests an auto-pause at most once per idle episode.

use std::{
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::utils::clock::Clock;

use super::messages::{send_or_drop, Message};

/// Seconds of inactivity before the timer auto-pauses.
pub const IDLE_THRESHOLD_SECS: u32 = 60;
/// How often the monitor re-checks.
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Last-observed-activity timestamp, shared between the coordinator (writer)
/// and the idle monitor (reader). Ephemeral process state, never persisted.
#[derive(Clone)]
pub struct ActivityClock(Arc<AtomicI64>);

impl ActivityClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Arc::new(AtomicI64::new(now.timestamp_millis())))
    }

    pub fn touch(&self, now: DateTime<Utc>) {
        self.0.fetch_max(now.timestamp_millis(), Ordering::Relaxed);
    }

    pub fn last(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.0.load(Ordering::Relaxed))
            .unwrap_or(DateTime::UNIX_EPOCH)
    }
}

/// The pure auto-pause decision: threshold comparison plus a latch that keeps
/// one idle episode from firing twice. Any activity re-arms the latch.
pub struct IdleEvaluator {
    threshold_ms: i64,
    fired: bool,
}

impl IdleEvaluator {
    pub fn from_seconds(threshold_s: u32) -> Self {
        Self {
            threshold_ms: i64::from(threshold_s) * 1000,
            fired: false,
        }
    }

    pub fn evaluate(
        &mut self,
        now: DateTime<Utc>,
        last_activity: DateTime<Utc>,
        timer_running: bool,
    ) -> bool {
        let inactive_ms = (now - last_activity).num_milliseconds();
        if inactive_ms <= self.threshold_ms {
            self.fired = false;
            return false;
        }
        if !timer_running || self.fired {
            return false;
        }
        self.fired = true;
        true
    }
}

/// The polling task. While the timer is running it checks the activity clock
/// on a fixed cadence and puts an [Message::AutoPauseTimer] on the bus when
/// an idle episode begins.
pub struct IdleMonitor {
    activity: ActivityClock,
    timer_active: watch::Receiver<bool>,
    bus: mpsc::Sender<Message>,
    evaluator: IdleEvaluator,
    poll_interval: Duration,
    clock: Box<dyn Clock>,
    shutdown: CancellationToken,
}

impl IdleMonitor {
    pub fn new(
        activity: ActivityClock,
        timer_active: watch::Receiver<bool>,
        bus: mpsc::Sender<Message>,
        evaluator: IdleEvaluator,
        poll_interval: Duration,
        clock: Box<dyn Clock>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            activity,
            timer_active,
            bus,
            evaluator,
            poll_interval,
            clock,
            shutdown,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let mut poll_point = self.clock.instant();
        loop {
            poll_point += self.poll_interval;

            tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                _ = self.clock.sleep_until(poll_point) => (),
            }

            let running = *self.timer_active.borrow();
            let now = self.clock.time();
            if self
                .evaluator
                .evaluate(now, self.activity.last(), running)
            {
                info!("Idle episode detected, requesting auto-pause");
                send_or_drop(&self.bus, Message::AutoPauseTimer);
            }
        }
    }
}
