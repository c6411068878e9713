//! The background daemon: a coordinator fed by one message bus, an idle
//! monitor, a wellness reminder scheduler, and a JSON-lines host bridge on
//! stdin/stdout. Everything shares persisted state through [StateStore] and
//! shuts down through one [CancellationToken].

use std::path::PathBuf;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::{
    host::{self, stdio::StdioHost, HostCommand},
    storage::StateStore,
    utils::clock::{Clock, DefaultClock},
};

pub mod accounting;
pub mod args;
pub mod coordinator;
pub mod idle;
pub mod messages;
pub mod reminders;
pub mod shutdown;

use coordinator::Coordinator;
use idle::{ActivityClock, IdleEvaluator, IdleMonitor, IDLE_POLL_INTERVAL, IDLE_THRESHOLD_SECS};
use messages::Message;
use reminders::ReminderScheduler;

/// Represents the starting point for the daemon.
pub async fn start_daemon(dir: PathBuf) -> Result<()> {
    std::env::set_current_dir("/")?;

    let store = StateStore::new(dir)?;
    let shutdown_token = CancellationToken::new();

    let (message_sender, message_receiver) = mpsc::channel::<Message>(16);
    let (command_sender, command_receiver) = mpsc::channel::<HostCommand>(64);
    let (active_sender, active_receiver) = watch::channel(false);

    let activity = ActivityClock::new(DefaultClock.time());

    let coordinator = create_coordinator(
        store.clone(),
        message_receiver,
        command_sender.clone(),
        activity.clone(),
        active_sender,
        &shutdown_token,
        DefaultClock,
    );
    let idle_monitor = create_idle_monitor(
        activity,
        active_receiver.clone(),
        message_sender.clone(),
        &shutdown_token,
        DefaultClock,
    );
    let reminder_scheduler = ReminderScheduler::new(
        store,
        active_receiver,
        command_sender,
        Box::new(DefaultClock),
        shutdown_token.clone(),
    );

    let (_, coordinator_result, idle_result, reminder_result, bridge_result, delivery_result) =
        tokio::join!(
            shutdown::detect_shutdown(shutdown_token.clone()),
            coordinator.run(),
            idle_monitor.run(),
            reminder_scheduler.run(),
            host::stdio::read_messages(tokio::io::stdin(), message_sender, shutdown_token.clone()),
            host::deliver_commands(StdioHost::new(), command_receiver),
        );

    if let Err(coordinator_result) = coordinator_result {
        error!("Coordinator got an error {:?}", coordinator_result);
    }
    if let Err(idle_result) = idle_result {
        error!("Idle monitor got an error {:?}", idle_result);
    }
    if let Err(reminder_result) = reminder_result {
        error!("Reminder scheduler got an error {:?}", reminder_result);
    }
    if let Err(bridge_result) = bridge_result {
        error!("Host bridge got an error {:?}", bridge_result);
    }
    if let Err(delivery_result) = delivery_result {
        error!("Command delivery got an error {:?}", delivery_result);
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn create_coordinator(
    store: StateStore,
    messages: mpsc::Receiver<Message>,
    commands: mpsc::Sender<HostCommand>,
    activity: ActivityClock,
    timer_active: watch::Sender<bool>,
    shutdown_token: &CancellationToken,
    clock: impl Clock,
) -> Coordinator {
    Coordinator::new(
        store,
        messages,
        commands,
        activity,
        timer_active,
        Box::new(clock),
        shutdown_token.clone(),
    )
}

fn create_idle_monitor(
    activity: ActivityClock,
    timer_active: watch::Receiver<bool>,
    bus: mpsc::Sender<Message>,
    shutdown_token: &CancellationToken,
    clock: impl Clock,
) -> IdleMonitor {
    IdleMonitor::new(
        activity,
        timer_active,
        bus,
        IdleEvaluator::from_seconds(IDLE_THRESHOLD_SECS),
        IDLE_POLL_INTERVAL,
        Box::new(clock),
        shutdown_token.clone(),
    )
}
