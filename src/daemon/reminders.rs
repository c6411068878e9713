//! Wellness reminders. While the timer is running, posture and eye-rest
//! notifications fire on fixed intervals; pausing or stopping cancels both
//! schedules and a later start re-anchors them from scratch.

use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{host::HostCommand, storage::StateStore, utils::clock::Clock};

pub const POSTURE_INTERVAL: Duration = Duration::from_secs(30 * 60);
pub const EYE_REST_INTERVAL: Duration = Duration::from_secs(20 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reminder {
    Posture,
    EyeRest,
}

impl Reminder {
    fn notification(self) -> HostCommand {
        match self {
            Reminder::Posture => HostCommand::Notify {
                title: "🧘 Posture Check".into(),
                message: "Sit up straight and relax your shoulders.".into(),
            },
            Reminder::EyeRest => HostCommand::Notify {
                title: "👀 Eye Rest".into(),
                message: "Look at something 20 feet away for 20 seconds.".into(),
            },
        }
    }
}

pub struct ReminderScheduler {
    store: StateStore,
    timer_active: watch::Receiver<bool>,
    commands: mpsc::Sender<HostCommand>,
    posture_interval: Duration,
    eye_rest_interval: Duration,
    clock: Box<dyn Clock>,
    shutdown: CancellationToken,
}

impl ReminderScheduler {
    pub fn new(
        store: StateStore,
        timer_active: watch::Receiver<bool>,
        commands: mpsc::Sender<HostCommand>,
        clock: Box<dyn Clock>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            timer_active,
            commands,
            posture_interval: POSTURE_INTERVAL,
            eye_rest_interval: EYE_REST_INTERVAL,
            clock,
            shutdown,
        }
    }

    #[cfg(test)]
    fn with_intervals(mut self, posture: Duration, eye_rest: Duration) -> Self {
        self.posture_interval = posture;
        self.eye_rest_interval = eye_rest;
        self
    }

    pub async fn run(mut self) -> Result<()> {
        loop {
            // Wait out the inactive stretch.
            while !*self.timer_active.borrow_and_update() {
                tokio::select! {
                    _ = self.shutdown.cancelled() => return Ok(()),
                    changed = self.timer_active.changed() => {
                        if changed.is_err() {
                            return Ok(());
                        }
                    }
                }
            }

            info!("Timer active, scheduling reminders");
            let mut posture_at = self.clock.instant() + self.posture_interval;
            let mut eye_rest_at = self.clock.instant() + self.eye_rest_interval;

            'active: loop {
                let (due_at, due) = if posture_at <= eye_rest_at {
                    (posture_at, Reminder::Posture)
                } else {
                    (eye_rest_at, Reminder::EyeRest)
                };

                tokio::select! {
                    _ = self.shutdown.cancelled() => return Ok(()),
                    changed = self.timer_active.changed() => {
                        if changed.is_err() {
                            return Ok(());
                        }
                        if !*self.timer_active.borrow() {
                            // Pause/stop cancels both schedules outright.
                            break 'active;
                        }
                    }
                    _ = self.clock.sleep_until(due_at) => {
                        self.fire(due).await;
                        match due {
                            Reminder::Posture => posture_at += self.posture_interval,
                            Reminder::EyeRest => eye_rest_at += self.eye_rest_interval,
                        }
                    }
                }
            }
        }
    }

    async fn fire(&self, reminder: Reminder) {
        let settings = self.store.load_settings().await;
        let enabled = match reminder {
            Reminder::Posture => settings.posture_enabled,
            Reminder::EyeRest => settings.eye_rest_enabled,
        };
        if !enabled {
            debug!("Reminder {reminder:?} disabled, skipping");
            return;
        }
        if let Err(e) = self.commands.try_send(reminder.notification()) {
            debug!("Dropping reminder, host channel unavailable: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use tempfile::tempdir;
    use tokio::sync::{mpsc, watch};
    use tokio_util::sync::CancellationToken;

    use crate::{host::HostCommand, storage::StateStore, utils::clock::DefaultClock};

    use super::ReminderScheduler;

    fn scheduler(
        store: StateStore,
        timer_active: watch::Receiver<bool>,
        commands: mpsc::Sender<HostCommand>,
        shutdown: CancellationToken,
    ) -> ReminderScheduler {
        ReminderScheduler::new(store, timer_active, commands, Box::new(DefaultClock), shutdown)
            .with_intervals(Duration::from_secs(30), Duration::from_secs(20))
    }

    fn title(command: &HostCommand) -> &str {
        match command {
            HostCommand::Notify { title, .. } => title,
            other => panic!("Unexpected command {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reminders_fire_in_interval_order() -> Result<()> {
        let dir = tempdir()?;
        let store = StateStore::new(dir.path().to_owned())?;
        let (_active_tx, active_rx) = watch::channel(true);
        let (command_tx, mut command_rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(
            scheduler(store, active_rx, command_tx, shutdown.clone()).run(),
        );

        let first = command_rx.recv().await.unwrap();
        assert!(title(&first).contains("Eye Rest"));
        let second = command_rx.recv().await.unwrap();
        assert!(title(&second).contains("Posture"));
        let third = command_rx.recv().await.unwrap();
        assert!(title(&third).contains("Eye Rest"));

        shutdown.cancel();
        task.await??;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_cancels_and_resume_reschedules() -> Result<()> {
        let dir = tempdir()?;
        let store = StateStore::new(dir.path().to_owned())?;
        let (active_tx, active_rx) = watch::channel(true);
        let (command_tx, mut command_rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(
            scheduler(store, active_rx, command_tx, shutdown.clone()).run(),
        );

        let first = command_rx.recv().await.unwrap();
        assert!(title(&first).contains("Eye Rest"));

        // Pause 10s in; nothing may fire while paused.
        active_tx.send(false).unwrap();
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(command_rx.try_recv().is_err());

        // Resume: schedules restart from zero, eye rest first again.
        active_tx.send(true).unwrap();
        let next = command_rx.recv().await.unwrap();
        assert!(title(&next).contains("Eye Rest"));

        shutdown.cancel();
        task.await??;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_reminder_is_skipped() -> Result<()> {
        let dir = tempdir()?;
        let store = StateStore::new(dir.path().to_owned())?;
        let mut settings = store.load_settings().await;
        settings.eye_rest_enabled = false;
        store.save_settings(&settings).await?;

        let (_active_tx, active_rx) = watch::channel(true);
        let (command_tx, mut command_rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(
            scheduler(store, active_rx, command_tx, shutdown.clone()).run(),
        );

        let first = command_rx.recv().await.unwrap();
        assert!(title(&first).contains("Posture"));

        shutdown.cancel();
        task.await??;
        Ok(())
    }
}
