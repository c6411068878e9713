//! The background coordinator: single consumer of the message bus, owner of
//! the daemon-side view of the timer, and the only writer of host commands
//! besides the reminder scheduler.
//!
//! It never caches the persisted records across events. Every decision
//! re-reads the relevant document, so transitions applied by the CLI (or any
//! other writer) are picked up on the next tick or event, matching the
//! shared-storage model the system assumes.

use std::{collections::HashMap, time::Duration};

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    classifier::{domain_of_url, is_trackable_url, Settings},
    host::HostCommand,
    storage::StateStore,
    utils::clock::Clock,
};

use super::{
    idle::ActivityClock,
    messages::{ActiveTab, Message},
};

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// The interval currently being attributed: which tab was active, its domain
/// and since when.
struct Tracking {
    tab_id: u64,
    domain: Option<String>,
    since: DateTime<Utc>,
}

pub struct Coordinator {
    store: StateStore,
    messages: mpsc::Receiver<Message>,
    commands: mpsc::Sender<HostCommand>,
    activity: ActivityClock,
    timer_active: watch::Sender<bool>,
    clock: Box<dyn Clock>,
    shutdown: CancellationToken,
    tick_interval: Duration,
    /// Every tab we have seen an URL for. Unbounded, like the domain ledger;
    /// commands to closed tabs are silent no-ops on the host side.
    tabs: HashMap<u64, String>,
    active_tab: Option<u64>,
    tracking: Option<Tracking>,
    /// Last effective timer state this coordinator acted on.
    active: bool,
}

impl Coordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: StateStore,
        messages: mpsc::Receiver<Message>,
        commands: mpsc::Sender<HostCommand>,
        activity: ActivityClock,
        timer_active: watch::Sender<bool>,
        clock: Box<dyn Clock>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            messages,
            commands,
            activity,
            timer_active,
            clock,
            shutdown,
            tick_interval: TICK_INTERVAL,
            tabs: HashMap::new(),
            active_tab: None,
            tracking: None,
            active: false,
        }
    }

    /// Executes the coordinator event loop.
    pub async fn run(mut self) -> Result<()> {
        self.startup_restore().await;

        let mut tick_point = self.clock.instant() + self.tick_interval;
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    self.finalize().await;
                    return Ok(());
                }
                message = self.messages.recv() => {
                    match message {
                        Some(message) => {
                            debug!("Handling message {:?}", message);
                            self.handle(message).await;
                        }
                        None => {
                            self.finalize().await;
                            return Ok(());
                        }
                    }
                }
                _ = self.clock.sleep_until(tick_point) => {
                    tick_point += self.tick_interval;
                    self.tick().await;
                }
            }
        }
    }

    /// Session restore on daemon start: a Running record gains the gap since
    /// its last persist, daily aggregates roll over, and tracking resumes if
    /// the timer was left running.
    async fn startup_restore(&mut self) {
        let now = self.clock.time();
        let mut timer = self.store.load_timer(now).await;
        timer.restore(now);
        timer.rollover(now.date_naive());
        if let Err(e) = self.store.save_timer(&mut timer, now).await {
            warn!("Failed to persist restored timer: {e:?}");
        }

        let mut ledger = self.store.load_breakdown(now.date_naive()).await;
        if ledger.reset_if_new_day(now.date_naive()) {
            if let Err(e) = self.store.save_breakdown(&ledger).await {
                warn!("Failed to persist breakdown reset: {e:?}");
            }
        }

        if timer.is_active() {
            self.apply_status_change(true, now).await;
        }
    }

    /// The periodic tick: observe external transitions, roll the day over and
    /// persist in-progress state so a crash costs at most one tick.
    async fn tick(&mut self) {
        let now = self.clock.time();
        let mut timer = self.store.load_timer(now).await;
        let date_before = timer.date;
        timer.rollover(now.date_naive());
        let rolled = timer.date != date_before;

        let active = timer.is_active();
        if active || rolled {
            if let Err(e) = self.store.save_timer(&mut timer, now).await {
                warn!("Failed to persist timer on tick: {e:?}");
            }
        }

        if active != self.active {
            info!("Observed external timer transition, active={active}");
            self.apply_status_change(active, now).await;
        }
    }

    async fn handle(&mut self, message: Message) {
        let now = self.clock.time();
        match message {
            Message::TimerStatusChanged { active } => {
                if active != self.active {
                    self.apply_status_change(active, now).await;
                }
            }
            Message::GetTimerStatus { tab_id, url } => {
                self.register_tab(tab_id, &url);
                self.send_status(tab_id).await;
            }
            Message::WatchlistUpdated => {
                self.broadcast_status().await;
            }
            Message::UserActivity => self.activity.touch(now),
            Message::AutoPauseTimer => self.auto_pause(now).await,
            Message::TabActivated { tab_id, url } => {
                self.on_tab_activated(tab_id, url, now).await;
            }
            Message::NavigationCompleted { tab_id, url } => {
                self.on_navigation(tab_id, url, now).await;
            }
            Message::WindowFocusChanged { tab } => {
                self.on_focus_changed(tab, now).await;
            }
            Message::IdleStateChanged { idle } => {
                if idle {
                    self.auto_pause(now).await;
                } else {
                    self.activity.touch(now);
                }
            }
        }
    }

    async fn on_tab_activated(&mut self, tab_id: u64, url: Option<String>, now: DateTime<Utc>) {
        self.activity.touch(now);
        if let Some(url) = &url {
            self.register_tab(tab_id, url);
        }
        self.active_tab = Some(tab_id);

        if self.active {
            self.settle(now).await;
            self.tracking = Some(Tracking {
                tab_id,
                domain: self.domain_of_tab(tab_id),
                since: now,
            });
            self.send_status(tab_id).await;
        }
        self.update_dim().await;
    }

    async fn on_navigation(&mut self, tab_id: u64, url: String, now: DateTime<Utc>) {
        self.activity.touch(now);
        self.register_tab(tab_id, &url);

        let tracked_tab = self.tracking.as_ref().map(|tracking| tracking.tab_id);
        if self.active && tracked_tab == Some(tab_id) {
            // The old page gets its slice before the domain changes.
            self.settle(now).await;
            if let Some(tracking) = &mut self.tracking {
                tracking.domain = domain_of_url(&url);
            }
        }
        self.send_status(tab_id).await;
    }

    async fn on_focus_changed(&mut self, tab: Option<ActiveTab>, now: DateTime<Utc>) {
        match tab {
            None => {
                // Browser lost focus: close the open interval, attribute
                // nothing until focus returns.
                if self.active {
                    self.settle(now).await;
                    self.tracking = None;
                }
                self.active_tab = None;
            }
            Some(tab) => {
                self.activity.touch(now);
                self.register_tab(tab.tab_id, &tab.url);
                self.active_tab = Some(tab.tab_id);
                if self.active {
                    self.settle(now).await;
                    self.tracking = Some(Tracking {
                        tab_id: tab.tab_id,
                        domain: self.domain_of_tab(tab.tab_id),
                        since: now,
                    });
                }
                self.update_dim().await;
            }
        }
    }

    /// Idle-triggered pause. No-op unless the persisted timer is Running.
    async fn auto_pause(&mut self, now: DateTime<Utc>) {
        let mut timer = self.store.load_timer(now).await;
        if !timer.is_running() {
            return;
        }
        timer.auto_pause(now);
        if let Err(e) = self.store.save_timer(&mut timer, now).await {
            warn!("Failed to persist auto-pause: {e:?}");
        }
        info!("Timer auto-paused after inactivity");
        self.send_command(HostCommand::Notify {
            title: "⏸️ Timer Auto-Paused".into(),
            message: "Timer paused due to inactivity. Resume when you're back!".into(),
        });
        self.apply_status_change(false, now).await;
    }

    /// The shared Start/Stop edge: flip tracking, re-arm collaborators and
    /// tell every known tab.
    async fn apply_status_change(&mut self, active: bool, now: DateTime<Utc>) {
        self.active = active;
        let _ = self.timer_active.send(active);
        self.activity.touch(now);

        if active {
            self.tracking = self.active_tab.map(|tab_id| Tracking {
                tab_id,
                domain: self.domain_of_tab(tab_id),
                since: now,
            });
        } else {
            self.settle(now).await;
            self.tracking = None;
        }

        self.broadcast_status().await;
        if active {
            self.update_dim().await;
        } else {
            self.clear_dim();
        }
    }

    /// Close the open attribution interval: credit the elapsed slice to the
    /// active domain and, for blocked domains, to the distraction counter.
    async fn settle(&mut self, now: DateTime<Utc>) {
        let Some(tracking) = &mut self.tracking else {
            return;
        };
        let duration_ms = (now - tracking.since).num_milliseconds().max(0) as u64;
        tracking.since = now;
        let Some(domain) = tracking.domain.clone() else {
            return;
        };
        if duration_ms == 0 {
            return;
        }

        let today = now.date_naive();
        let mut ledger = self.store.load_breakdown(today).await;
        ledger.reset_if_new_day(today);
        ledger.attribute(&domain, duration_ms);
        if let Err(e) = self.store.save_breakdown(&ledger).await {
            warn!("Failed to persist breakdown: {e:?}");
        }

        let settings = self.store.load_settings().await;
        if settings.is_blocked(&domain) {
            let mut timer = self.store.load_timer(now).await;
            timer.distraction_ms += duration_ms;
            if let Err(e) = self.store.save_timer(&mut timer, now).await {
                warn!("Failed to persist distraction time: {e:?}");
            }
        }
    }

    async fn finalize(&mut self) {
        let now = self.clock.time();
        if self.active {
            self.settle(now).await;
            let mut timer = self.store.load_timer(now).await;
            if let Err(e) = self.store.save_timer(&mut timer, now).await {
                warn!("Failed to persist timer on shutdown: {e:?}");
            }
        }
    }

    fn register_tab(&mut self, tab_id: u64, url: &str) {
        if is_trackable_url(url) {
            self.tabs.insert(tab_id, url.to_string());
        }
    }

    fn domain_of_tab(&self, tab_id: u64) -> Option<String> {
        self.tabs.get(&tab_id).and_then(|url| domain_of_url(url))
    }

    fn blocked(&self, settings: &Settings, tab_id: u64) -> bool {
        self.domain_of_tab(tab_id)
            .map(|domain| settings.is_blocked(&domain))
            .unwrap_or(false)
    }

    /// Per-tab status answer; drives the lock-in overlay on the page.
    async fn send_status(&mut self, tab_id: u64) {
        let settings = self.store.load_settings().await;
        let blocked = self.blocked(&settings, tab_id);
        self.send_command(HostCommand::TimerStatusUpdate {
            tab_id,
            active: self.active,
            blocked,
        });
    }

    /// Most-recent-status-wins broadcast to every known tab.
    async fn broadcast_status(&mut self) {
        let settings = self.store.load_settings().await;
        let updates: Vec<_> = self
            .tabs
            .keys()
            .map(|&tab_id| HostCommand::TimerStatusUpdate {
                tab_id,
                active: self.active,
                blocked: self.blocked(&settings, tab_id),
            })
            .collect();
        for update in updates {
            self.send_command(update);
        }
    }

    async fn update_dim(&mut self) {
        let settings = self.store.load_settings().await;
        if !settings.dim_inactive || !self.active {
            return;
        }
        let Some(active_tab) = self.active_tab else {
            return;
        };
        let updates: Vec<_> = self
            .tabs
            .keys()
            .map(|&tab_id| HostCommand::UpdateDimStatus {
                tab_id,
                is_active: tab_id == active_tab,
            })
            .collect();
        for update in updates {
            self.send_command(update);
        }
    }

    /// Undim everything; sent when tracking stops.
    fn clear_dim(&mut self) {
        let updates: Vec<_> = self
            .tabs
            .keys()
            .map(|&tab_id| HostCommand::UpdateDimStatus {
                tab_id,
                is_active: true,
            })
            .collect();
        for update in updates {
            self.send_command(update);
        }
    }

    fn send_command(&mut self, command: HostCommand) {
        if let Err(e) = self.commands.try_send(command) {
            debug!("Dropping host command, nobody listening: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
    use tempfile::{tempdir, TempDir};
    use tokio::sync::{mpsc, watch};
    use tokio_util::sync::CancellationToken;

    use crate::{
        daemon::{
            idle::ActivityClock,
            messages::{send_or_drop, Message},
        },
        host::HostCommand,
        storage::StateStore,
        timer::{TimerState, TimerStatus},
        utils::clock::{test_support::TestClock, Clock},
    };

    use super::Coordinator;

    const TEST_START_DATE: NaiveDateTime =
        NaiveDateTime::new(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(), NaiveTime::MIN);

    struct Harness {
        _dir: TempDir,
        store: StateStore,
        messages: mpsc::Sender<Message>,
        commands: mpsc::Receiver<HostCommand>,
        timer_active: watch::Receiver<bool>,
        shutdown: CancellationToken,
        task: tokio::task::JoinHandle<Result<()>>,
    }

    async fn spawn_coordinator(running: bool) -> Result<Harness> {
        let dir = tempdir()?;
        let store = StateStore::new(dir.path().to_owned())?;
        let clock = TestClock::new(Utc.from_utc_datetime(&TEST_START_DATE));

        if running {
            let mut timer = TimerState::fresh(clock.time());
            timer.start(clock.time());
            store.save_timer(&mut timer, clock.time()).await?;
        }

        let (message_tx, message_rx) = mpsc::channel(16);
        let (command_tx, command_rx) = mpsc::channel(64);
        let (active_tx, active_rx) = watch::channel(false);
        let shutdown = CancellationToken::new();

        let coordinator = Coordinator::new(
            store.clone(),
            message_rx,
            command_tx,
            ActivityClock::new(clock.time()),
            active_tx,
            Box::new(clock),
            shutdown.clone(),
        );
        let task = tokio::spawn(coordinator.run());

        Ok(Harness {
            _dir: dir,
            store,
            messages: message_tx,
            commands: command_rx,
            timer_active: active_rx,
            shutdown,
            task,
        })
    }

    async fn shut_down(harness: Harness) -> Result<()> {
        harness.shutdown.cancel();
        harness.task.await??;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_tab_switch_attributes_time_and_flags_distraction() -> Result<()> {
        let mut harness = spawn_coordinator(true).await?;

        send_or_drop(
            &harness.messages,
            Message::TabActivated {
                tab_id: 1,
                url: Some("https://www.reddit.com/r/rust".into()),
            },
        );
        // Overlay decision for the newly active distracting tab.
        let status = harness.commands.recv().await.unwrap();
        assert_eq!(
            status,
            HostCommand::TimerStatusUpdate {
                tab_id: 1,
                active: true,
                blocked: true
            }
        );
        // Dim directive for the single known tab.
        assert!(matches!(
            harness.commands.recv().await.unwrap(),
            HostCommand::UpdateDimStatus { tab_id: 1, is_active: true }
        ));

        tokio::time::sleep(std::time::Duration::from_secs(5)).await;

        send_or_drop(
            &harness.messages,
            Message::TabActivated {
                tab_id: 2,
                url: Some("https://docs.rs/tokio".into()),
            },
        );
        let status = harness.commands.recv().await.unwrap();
        assert_eq!(
            status,
            HostCommand::TimerStatusUpdate {
                tab_id: 2,
                active: true,
                blocked: false
            }
        );

        let now = Utc.from_utc_datetime(&TEST_START_DATE) + chrono::Duration::seconds(5);
        let ledger = harness.store.load_breakdown(now.date_naive()).await;
        assert_eq!(ledger.sorted(), vec![("reddit.com", 5000)]);

        // reddit.com is on the default watchlist, so the same slice counts
        // as distraction time.
        let timer = harness.store.load_timer(now).await;
        assert_eq!(timer.distraction_ms, 5000);

        shut_down(harness).await
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_pause_request_pauses_and_notifies() -> Result<()> {
        let mut harness = spawn_coordinator(true).await?;

        send_or_drop(&harness.messages, Message::AutoPauseTimer);

        let notify = harness.commands.recv().await.unwrap();
        assert!(matches!(
            notify,
            HostCommand::Notify { ref title, .. } if title.contains("Auto-Paused")
        ));

        let now = Utc.from_utc_datetime(&TEST_START_DATE);
        let timer = harness.store.load_timer(now).await;
        assert_eq!(timer.status, TimerStatus::Paused);
        assert!(timer.auto_paused);

        // A second request against the now-paused timer changes nothing.
        send_or_drop(&harness.messages, Message::AutoPauseTimer);
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(!*harness.timer_active.borrow());
        assert!(harness.commands.try_recv().is_err());

        shut_down(harness).await
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_observes_cli_transition_and_rebroadcasts() -> Result<()> {
        let mut harness = spawn_coordinator(false).await?;

        // A page checks in while the timer is stopped.
        send_or_drop(
            &harness.messages,
            Message::GetTimerStatus {
                tab_id: 7,
                url: "https://www.reddit.com/".into(),
            },
        );
        let status = harness.commands.recv().await.unwrap();
        assert_eq!(
            status,
            HostCommand::TimerStatusUpdate {
                tab_id: 7,
                active: false,
                blocked: true
            }
        );

        // Another process starts the timer behind the daemon's back.
        let now = Utc.from_utc_datetime(&TEST_START_DATE);
        let mut timer = harness.store.load_timer(now).await;
        timer.start(now);
        harness.store.save_timer(&mut timer, now).await?;

        // The next tick notices and re-announces to the known tab.
        let status = harness.commands.recv().await.unwrap();
        assert_eq!(
            status,
            HostCommand::TimerStatusUpdate {
                tab_id: 7,
                active: true,
                blocked: true
            }
        );
        assert!(*harness.timer_active.borrow());

        shut_down(harness).await
    }

    #[tokio::test(start_paused = true)]
    async fn test_focus_loss_closes_the_interval() -> Result<()> {
        let mut harness = spawn_coordinator(true).await?;

        send_or_drop(
            &harness.messages,
            Message::TabActivated {
                tab_id: 1,
                url: Some("https://docs.rs/".into()),
            },
        );
        // Status + dim for tab 1.
        harness.commands.recv().await.unwrap();
        harness.commands.recv().await.unwrap();

        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        send_or_drop(&harness.messages, Message::WindowFocusChanged { tab: None });

        tokio::time::sleep(std::time::Duration::from_secs(10)).await;

        // Only the focused stretch was attributed.
        let now = Utc.from_utc_datetime(&TEST_START_DATE) + chrono::Duration::seconds(13);
        let ledger = harness.store.load_breakdown(now.date_naive()).await;
        assert_eq!(ledger.sorted(), vec![("docs.rs", 3000)]);

        shut_down(harness).await
    }
}
