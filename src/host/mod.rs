//! The seam between the daemon and whatever renders its side effects: a
//! browser-side shim, a test harness, anything that can show an overlay and
//! raise a notification. Commands are fire-and-forget; a host that is not
//! listening is a silent no-op, never an error the daemon acts on.

pub mod stdio;

use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Directives delivered to the host, mirrored one-to-one as JSON lines on the
/// wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostCommand {
    /// Per-tab timer status. The page overlay shows iff `active && blocked`.
    TimerStatusUpdate {
        tab_id: u64,
        active: bool,
        blocked: bool,
    },
    /// Tab dimming: every tab but the active one dims while the timer runs.
    UpdateDimStatus { tab_id: u64, is_active: bool },
    /// A desktop notification (auto-pause, posture, eye rest).
    Notify { title: String, message: String },
}

/// Contract any host implementation must fulfill.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Host: Send + 'static {
    async fn deliver(&mut self, command: HostCommand) -> Result<()>;
}

/// Drains the command channel into a host. Delivery failures are logged and
/// dropped; the daemon never retries or surfaces them.
pub async fn deliver_commands(
    mut host: impl Host,
    mut commands: mpsc::Receiver<HostCommand>,
) -> Result<()> {
    while let Some(command) = commands.recv().await {
        debug!("Delivering command {:?}", command);
        if let Err(e) = host.deliver(command).await {
            error!("Host rejected command: {e:?}");
        }
    }
    Ok(())
}
